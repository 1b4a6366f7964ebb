//! Serial Peripheral Identification Protocol
//!
//! This crate provides the wire-level handshake used to identify unknown
//! serial-attached peripherals, and the classification of their answers.
//!
//! # Architecture
//!
//! - [`ident`]: pure codec for the `ID?` query and the
//!   `<PREFIX>:<KIND>_<INDEX>` response line
//! - [`classify`]: maps a decoded response onto a registered [`DeviceKind`]
//!
//! Neither module performs I/O.
//!
//! # Example
//!
//! ```rust
//! use idscan_protocol::{DeviceClassifier, IdentCodec};
//!
//! let codec = IdentCodec::new();
//! assert_eq!(codec.encode_query(), b"ID?\n");
//!
//! let response = codec.decode("PICO:I2C_1\n").unwrap();
//! let class = DeviceClassifier::new().classify(&response).unwrap();
//! assert_eq!(class.kind.as_str(), "I2C");
//! assert_eq!(class.index, 1);
//! ```

pub mod classify;
pub mod error;
pub mod ident;

pub use classify::{Classification, DeviceClassifier, DeviceKind, DEFAULT_KINDS};
pub use error::{ClassifyError, ParseError};
pub use ident::{IdentCodec, IdentificationResponse, DEFAULT_FAMILY, MAX_LINE_LEN, QUERY};
