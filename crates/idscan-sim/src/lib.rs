//! Serial Bus Simulation Library
//!
//! This crate provides a simulated serial bus for testing identification
//! scans without physical hardware. It includes:
//!
//! - **SimulatedDevice**: a scripted peripheral that answers `ID?` at chosen
//!   baud rates, stays silent, garbles, hangs up, or refuses to open
//! - **SimulatedBus**: a set of named ports that acts as both the port
//!   source and the port opener, recording every open, close and query
//!
//! # Example
//!
//! ```rust
//! use idscan_sim::{SimulatedBus, SimulatedDevice};
//!
//! let bus = SimulatedBus::new()
//!     .attach("PORT1", SimulatedDevice::pico("I2C", 1).at_baud(9600))
//!     .attach("PORT2", SimulatedDevice::silent());
//!
//! assert_eq!(bus.port_names(), ["PORT1", "PORT2"]);
//! ```

pub mod bus;
pub mod device;

pub use bus::{BusLog, SimStream, SimulatedBus};
pub use device::SimulatedDevice;
