//! Device registry
//!
//! Discovered devices live in fixed pools of slots, one pool per kind.
//! Slots are allocated once and reused: a scan resets them to empty and then
//! fills them in discovery order.

use std::sync::{Arc, Mutex, MutexGuard};

use idscan_protocol::{DeviceClassifier, DeviceKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistryError;

/// A successfully identified device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Port the device answered on
    pub port: String,
    /// Baud rate that produced the answer
    pub baud_rate: u32,
    /// Classified kind
    pub kind: DeviceKind,
    /// Instance index reported by the device
    pub index: u32,
    /// Response line as received, terminator stripped
    pub raw_response: String,
}

/// Contents of one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "device", rename_all = "snake_case")]
pub enum SlotState {
    Empty,
    Occupied(DeviceRecord),
}

impl SlotState {
    /// The occupying record, if any
    pub fn record(&self) -> Option<&DeviceRecord> {
        match self {
            SlotState::Empty => None,
            SlotState::Occupied(record) => Some(record),
        }
    }
}

/// Read-only view of one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Kind group the slot belongs to
    pub kind: DeviceKind,
    /// Position within the group, from 0
    pub position: usize,
    /// Contents
    pub state: SlotState,
}

/// Registry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Slots per kind group
    pub capacity_per_kind: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity_per_kind: 10,
        }
    }
}

#[derive(Debug, Clone)]
struct KindGroup {
    kind: DeviceKind,
    slots: Vec<SlotState>,
}

/// Slot pools partitioned by kind
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    groups: Vec<KindGroup>,
    config: RegistryConfig,
}

/// Registry handle shared between the coordinator and its readers
pub type SharedRegistry = Arc<Mutex<DeviceRegistry>>;

/// Lock a shared registry
///
/// Every mutation leaves the registry consistent, so a poisoned lock is
/// still safe to use.
pub fn lock_registry(registry: &SharedRegistry) -> MutexGuard<'_, DeviceRegistry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

impl DeviceRegistry {
    /// Create a registry with one group per kind, in the given order
    pub fn new<I, K>(kinds: I, config: RegistryConfig) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<DeviceKind>,
    {
        let mut registry = Self {
            groups: Vec::new(),
            config,
        };
        for kind in kinds {
            registry.add_kind(kind);
        }
        registry
    }

    /// Create a registry with a group for every kind the classifier knows
    pub fn for_classifier(classifier: &DeviceClassifier, config: RegistryConfig) -> Self {
        Self::new(classifier.kinds().iter().cloned(), config)
    }

    /// Add an empty group for `kind`; returns `false` if it already exists
    pub fn add_kind(&mut self, kind: impl Into<DeviceKind>) -> bool {
        let kind = kind.into();
        if self.groups.iter().any(|g| g.kind == kind) {
            return false;
        }
        self.groups.push(KindGroup {
            kind,
            slots: vec![SlotState::Empty; self.config.capacity_per_kind],
        });
        true
    }

    /// Slots per kind group
    pub fn capacity_per_kind(&self) -> usize {
        self.config.capacity_per_kind
    }

    /// Kinds in group order
    pub fn kinds(&self) -> impl Iterator<Item = &DeviceKind> {
        self.groups.iter().map(|g| &g.kind)
    }

    /// Empty every slot
    pub fn reset(&mut self) {
        for group in &mut self.groups {
            group.slots.fill(SlotState::Empty);
        }
        debug!("Registry reset");
    }

    /// Put a record in the first empty slot of its kind group
    ///
    /// Returns the slot position. Occupied slots are never reassigned.
    pub fn place(&mut self, record: DeviceRecord) -> Result<usize, RegistryError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.kind == record.kind)
            .ok_or_else(|| RegistryError::UnknownKind(record.kind.clone()))?;

        let capacity = group.slots.len();
        let Some(position) = group
            .slots
            .iter()
            .position(|s| matches!(s, SlotState::Empty))
        else {
            return Err(RegistryError::NoFreeSlot {
                kind: group.kind.clone(),
                capacity,
            });
        };

        debug!(
            "Placed {}#{} from {} in slot {}",
            record.kind, record.index, record.port, position
        );
        group.slots[position] = SlotState::Occupied(record);
        Ok(position)
    }

    /// All slots, grouped by kind in group order, then by position
    pub fn snapshot(&self) -> Vec<Slot> {
        self.groups
            .iter()
            .flat_map(|g| {
                g.slots.iter().enumerate().map(|(position, state)| Slot {
                    kind: g.kind.clone(),
                    position,
                    state: state.clone(),
                })
            })
            .collect()
    }

    /// Occupied records in snapshot order
    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.groups
            .iter()
            .flat_map(|g| g.slots.iter().filter_map(SlotState::record))
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.devices().count()
    }

    /// Whether every slot is empty
    pub fn is_empty(&self) -> bool {
        self.devices().next().is_none()
    }

    /// Wrap for sharing
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }
}
