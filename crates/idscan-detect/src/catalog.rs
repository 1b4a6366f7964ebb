//! Serial port catalog
//!
//! This module enumerates candidate ports and applies the exclusion policy.
//! Every call to [`PortCatalog::list`] takes a fresh snapshot; nothing is cached.

use serde::{Deserialize, Serialize};
use serialport::{available_ports, SerialPortType};
use tracing::{info, warn};

use crate::error::DetectError;
use crate::usb_ids::{self, PortClassification};

/// Information about a serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Port name (e.g., /dev/ttyACM0, COM3)
    pub name: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl PortDescriptor {
    /// Create a descriptor with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number.clone(),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self::new(name),
        }
    }

    /// Known adapter or board name from the USB IDs
    pub fn adapter(&self) -> Option<&'static str> {
        usb_ids::adapter_name(self.vid?, self.pid?)
    }

    /// Classification from the USB IDs
    pub fn classification(&self) -> PortClassification {
        usb_ids::classify_port(self.vid, self.pid)
    }

    /// Label for display: name plus the best available description
    pub fn label(&self) -> String {
        match self.product.as_deref().or(self.adapter()) {
            Some(desc) => format!("{} ({})", self.name, desc),
            None => self.name.clone(),
        }
    }
}

impl From<&str> for PortDescriptor {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PortDescriptor {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Anything that can produce an ordered list of candidate ports
pub trait PortSource: Send {
    /// Take a snapshot of candidate ports, in probing order
    fn list(&self) -> Result<Vec<PortDescriptor>, DetectError>;
}

impl PortSource for Vec<PortDescriptor> {
    fn list(&self) -> Result<Vec<PortDescriptor>, DetectError> {
        Ok(self.clone())
    }
}

/// Port catalog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Port names never probed (exact match)
    pub reserved: Vec<String>,
    /// Skip ports whose name contains any of these
    pub skip_patterns: Vec<String>,
    /// Skip debug probe UARTs identified by USB ID
    pub skip_debug_probes: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            reserved: Vec::new(),
            skip_patterns: vec![
                // Bluetooth ports on macOS
                "Bluetooth".to_string(),
                // Debug/logging ports
                "debug".to_string(),
            ],
            skip_debug_probes: true,
        }
    }
}

/// Serial port catalog
#[derive(Debug, Clone, Default)]
pub struct PortCatalog {
    config: CatalogConfig,
}

impl PortCatalog {
    /// Create a catalog with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with custom configuration
    pub fn with_config(config: CatalogConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Enumerate every attached serial port, excluded ones included
    pub fn attached(&self) -> Result<Vec<PortDescriptor>, DetectError> {
        let ports = available_ports().map_err(|e| {
            warn!("Port enumeration failed: {}", e);
            DetectError::EnumerationFailed(e.to_string())
        })?;

        Ok(ports
            .into_iter()
            .map(|p| PortDescriptor::from_serialport(p.port_name, &p.port_type))
            .collect())
    }

    /// Enumerate attached serial ports, minus excluded ones
    pub fn list(&self) -> Result<Vec<PortDescriptor>, DetectError> {
        info!("Enumerating serial ports...");
        let result = self.filter(self.attached()?);

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                info!("  {}", port.label());
            }
        }

        Ok(result)
    }

    /// Apply the exclusion policy, keeping order
    pub fn filter<I>(&self, ports: I) -> Vec<PortDescriptor>
    where
        I: IntoIterator<Item = PortDescriptor>,
    {
        ports
            .into_iter()
            .filter(|p| !self.is_excluded(p))
            .collect()
    }

    /// Check if a port is excluded from probing
    pub fn is_excluded(&self, port: &PortDescriptor) -> bool {
        if self.config.reserved.iter().any(|r| *r == port.name) {
            return true;
        }
        if self.config.skip_debug_probes
            && port.classification() == PortClassification::DebugProbe
        {
            return true;
        }
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.name.contains(pattern.as_str()))
    }
}

impl PortSource for PortCatalog {
    fn list(&self) -> Result<Vec<PortDescriptor>, DetectError> {
        PortCatalog::list(self)
    }
}
