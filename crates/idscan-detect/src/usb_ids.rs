//! USB Vendor/Product ID database for known serial bridges
//!
//! This module contains VID/PID pairs for the USB-to-serial adapters and
//! microcontroller boards that commonly expose identification-capable UARTs.

/// USB Vendor ID / Product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

/// FTDI (Future Technology Devices International)
pub mod ftdi {
    pub const VID: u16 = 0x0403;

    /// All known FTDI product IDs
    pub const ALL_PIDS: &[u16] = &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015];
}

/// Silicon Labs CP210x
pub mod cp210x {
    pub const VID: u16 = 0x10C4;

    /// All known CP210x product IDs
    pub const ALL_PIDS: &[u16] = &[0xEA60, 0xEA70, 0xEA71];
}

/// WCH CH340/CH341
pub mod ch340 {
    pub const VID: u16 = 0x1A86;

    /// All known CH340/341 product IDs
    pub const ALL_PIDS: &[u16] = &[0x7523, 0x5523];
}

/// Prolific PL2303
pub mod prolific {
    pub const VID: u16 = 0x067B;

    /// All known Prolific product IDs
    pub const ALL_PIDS: &[u16] = &[0x2303];
}

/// Raspberry Pi RP2040/RP2350 boards
pub mod raspberry_pi {
    use super::UsbId;

    pub const VID: u16 = 0x2E8A;

    /// MicroPython firmware USB CDC
    pub const MICROPYTHON: UsbId = UsbId::new(VID, 0x0005);
    /// Pico SDK stdio USB CDC
    pub const PICO_SDK_CDC: UsbId = UsbId::new(VID, 0x000A);
    /// Debug Probe (CMSIS-DAP with bridged UART)
    pub const DEBUG_PROBE: UsbId = UsbId::new(VID, 0x000C);
}

/// Port classification used for display and exclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PortClassification {
    /// Microcontroller board with native USB serial
    KnownBoard,
    /// Debug probe UART; reserved for the host console
    DebugProbe,
    /// Known serial adapter (FTDI, CP210x, CH340, PL2303)
    KnownAdapter,
    /// Unknown device
    Unknown,
}

/// Check if a VID/PID is a known serial adapter
pub fn is_known_serial_adapter(vid: u16, pid: u16) -> bool {
    match vid {
        ftdi::VID => ftdi::ALL_PIDS.contains(&pid),
        cp210x::VID => cp210x::ALL_PIDS.contains(&pid),
        ch340::VID => ch340::ALL_PIDS.contains(&pid),
        prolific::VID => prolific::ALL_PIDS.contains(&pid),
        _ => false,
    }
}

/// Get a display name for a VID/PID pair
pub fn adapter_name(vid: u16, pid: u16) -> Option<&'static str> {
    match UsbId::new(vid, pid) {
        raspberry_pi::MICROPYTHON => return Some("Raspberry Pi Pico (MicroPython)"),
        raspberry_pi::PICO_SDK_CDC => return Some("Raspberry Pi Pico"),
        raspberry_pi::DEBUG_PROBE => return Some("Raspberry Pi Debug Probe"),
        _ => {}
    }

    match vid {
        ftdi::VID => Some("FTDI"),
        cp210x::VID => Some("CP210x"),
        ch340::VID => Some("CH340"),
        prolific::VID => Some("PL2303"),
        raspberry_pi::VID => Some("Raspberry Pi"),
        _ => None,
    }
}

/// Classify a port based on its USB IDs
pub fn classify_port(vid: Option<u16>, pid: Option<u16>) -> PortClassification {
    let (Some(vid), Some(pid)) = (vid, pid) else {
        return PortClassification::Unknown;
    };

    if UsbId::new(vid, pid) == raspberry_pi::DEBUG_PROBE {
        return PortClassification::DebugProbe;
    }
    if vid == raspberry_pi::VID {
        return PortClassification::KnownBoard;
    }
    if is_known_serial_adapter(vid, pid) {
        return PortClassification::KnownAdapter;
    }

    PortClassification::Unknown
}
