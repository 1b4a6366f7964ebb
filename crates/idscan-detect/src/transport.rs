//! Serial transport seam
//!
//! The prober never touches the OS directly: it asks a [`PortOpener`] for a
//! byte stream configured for one baud rate, and drops that stream to close
//! the port. [`SerialOpener`] is the host implementation on `tokio-serial`.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::trace;

use crate::error::DetectError;

/// Link parameters for a single probe attempt
///
/// The frame is fixed at 8 data bits, no parity, 1 stop bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Baud rate for this attempt
    pub baud_rate: u32,
    /// Budget for reading the response line
    pub read_timeout: Duration,
    /// Budget for writing and flushing the query
    pub write_timeout: Duration,
}

/// Opens ports for probing
pub trait PortOpener: Send + Sync + 'static {
    /// Byte stream for an open port; dropping it closes the port
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open `port` with the given link settings
    fn open(&self, port: &str, settings: &LinkSettings) -> Result<Self::Stream, DetectError>;

    /// Discard bytes buffered before the query is written
    fn clear_input(&self, stream: &mut Self::Stream) -> Result<(), DetectError> {
        let _ = stream;
        Ok(())
    }
}

/// Host serial ports via `tokio-serial`
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    type Stream = SerialStream;

    fn open(&self, port: &str, settings: &LinkSettings) -> Result<SerialStream, DetectError> {
        trace!("Opening {} at {} baud (8N1)", port, settings.baud_rate);
        tokio_serial::new(port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open_native_async()
            .map_err(|e| open_error(port, e))
    }

    fn clear_input(&self, stream: &mut SerialStream) -> Result<(), DetectError> {
        stream
            .clear(ClearBuffer::Input)
            .map_err(|e| DetectError::IoError {
                port: stream.name().unwrap_or_default(),
                reason: e.to_string(),
            })
    }
}

fn open_error(port: &str, e: tokio_serial::Error) -> DetectError {
    match e.kind() {
        tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            DetectError::PortBusy(port.to_string())
        }
        _ => DetectError::OpenFailed {
            port: port.to_string(),
            reason: e.to_string(),
        },
    }
}
