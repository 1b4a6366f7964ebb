//! Error types for port detection

use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Failed to open serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// I/O error during probe
    #[error("I/O error on {port}: {reason}")]
    IoError { port: String, reason: String },

    /// Port busy or in use
    #[error("port {0} is busy or in use")]
    PortBusy(String),

    /// Baud ladder has no rungs
    #[error("baud ladder is empty")]
    EmptyLadder,

    /// Serial port error
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),
}
