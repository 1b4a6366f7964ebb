//! Serial Peripheral Detection Library
//!
//! This crate provides serial port enumeration and multi-baud identification
//! probing for unknown serial-attached peripherals.
//!
//! # Example
//!
//! ```rust,no_run
//! use idscan_detect::{BaudProber, PortCatalog, SerialOpener};
//!
//! # async fn run() -> Result<(), idscan_detect::DetectError> {
//! let catalog = PortCatalog::new();
//! let prober = BaudProber::new(SerialOpener);
//!
//! for port in catalog.list()? {
//!     let attempt = prober.probe(&port.name).await;
//!     println!("{} @ {}: {:?}", port.name, attempt.baud_rate, attempt.outcome);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod probe;
pub mod transport;
pub mod usb_ids;

pub use catalog::{CatalogConfig, PortCatalog, PortDescriptor, PortSource};
pub use error::DetectError;
pub use probe::{
    BaudLadder, BaudProber, PortProbe, ProbeAttempt, ProbeConfig, ProbeOutcome, DEFAULT_LADDER,
};
pub use transport::{LinkSettings, PortOpener, SerialOpener};
