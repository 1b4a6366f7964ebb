//! Error types for the discovery engine

use idscan_protocol::DeviceKind;
use thiserror::Error;

/// Errors that can occur placing a device in the registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Every slot for this kind is occupied
    #[error("no free slot for {kind} (capacity {capacity})")]
    NoFreeSlot {
        /// Kind group that is full
        kind: DeviceKind,
        /// Slots in that group
        capacity: usize,
    },

    /// The registry has no partition for this kind
    #[error("no slot group for kind {0}")]
    UnknownKind(DeviceKind),
}
