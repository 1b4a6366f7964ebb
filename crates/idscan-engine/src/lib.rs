//! Device Discovery Engine
//!
//! This crate ties port enumeration, baud probing and classification into
//! scan sessions and keeps what they find in a slot registry.
//!
//! # Architecture
//!
//! - [`ScanCoordinator`] owns the prober, classifier and registry and runs at
//!   most one session at a time on a spawned task
//! - Every step of a session is published as a [`ScanEvent`] to all
//!   subscribers, in the order it happened
//! - [`DeviceRegistry`] gives each device kind a fixed pool of slots; a
//!   session resets it before the first port is probed
//!
//! # Example
//!
//! ```rust,no_run
//! use idscan_detect::{BaudProber, PortCatalog, SerialOpener};
//! use idscan_engine::{DeviceRegistry, RegistryConfig, ScanCoordinator};
//! use idscan_protocol::DeviceClassifier;
//!
//! # async fn run() {
//! let classifier = DeviceClassifier::new();
//! let registry = DeviceRegistry::for_classifier(&classifier, RegistryConfig::default());
//! let coordinator = ScanCoordinator::new(BaudProber::new(SerialOpener), classifier, registry);
//!
//! let mut events = coordinator.subscribe();
//! let session = coordinator.start(PortCatalog::new()).await;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! println!("session {} {}", session.id(), session.wait().await);
//! # }
//! ```

pub mod coordinator;
pub mod error;
pub mod events;
pub mod registry;
pub mod session;

pub use coordinator::ScanCoordinator;
pub use error::RegistryError;
pub use events::{ScanEvent, SessionId, SessionStatus};
pub use registry::{
    lock_registry, DeviceRecord, DeviceRegistry, RegistryConfig, SharedRegistry, Slot, SlotState,
};
pub use session::ScanSession;
