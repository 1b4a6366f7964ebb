//! Simulated serial bus
//!
//! A [`SimulatedBus`] is a named set of [`SimulatedDevice`]s. It lists its
//! ports like a catalog and opens them like the host transport, so a scan
//! can run end to end against it. Every interaction is logged for tests.

use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use idscan_detect::{DetectError, LinkSettings, PortDescriptor, PortOpener, PortSource};
use tokio::io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tracing::debug;

use crate::device::SimulatedDevice;

/// Buffer size of each simulated link
const LINK_BUFFER: usize = 256;

/// Record of everything that happened on the bus
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusLog {
    /// Every open call as (port, baud), including failed ones
    pub open_attempts: Vec<(String, u32)>,
    /// Opens that produced a stream
    pub opened: usize,
    /// Streams dropped (ports closed)
    pub closed: usize,
    /// Input buffer clears
    pub clears: usize,
    /// Lines received by devices as (port, baud, line)
    pub queries: Vec<(String, u32, String)>,
}

impl BusLog {
    /// Baud rates attempted on `port`, in order
    pub fn rates_for(&self, port: &str) -> Vec<u32> {
        self.open_attempts
            .iter()
            .filter(|(p, _)| p == port)
            .map(|(_, baud)| *baud)
            .collect()
    }
}

#[derive(Debug, Default)]
struct BusState {
    ports: Vec<(String, SimulatedDevice)>,
    enumeration_error: Option<String>,
    open_now: HashSet<String>,
    log: BusLog,
}

/// A set of simulated ports
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<BusState>>,
}

impl SimulatedBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        lock(&self.state)
    }

    /// Attach a device under `name` (builder form)
    pub fn attach(self, name: impl Into<String>, device: SimulatedDevice) -> Self {
        self.plug(name, device);
        self
    }

    /// Attach a device, replacing any device already on that port
    pub fn plug(&self, name: impl Into<String>, device: SimulatedDevice) {
        let name = name.into();
        let mut state = self.lock();
        match state.ports.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = device,
            None => state.ports.push((name, device)),
        }
    }

    /// Make the next enumerations fail
    pub fn fail_enumeration(&self, reason: impl Into<String>) {
        self.lock().enumeration_error = Some(reason.into());
    }

    /// Port names in attach order
    pub fn port_names(&self) -> Vec<String> {
        self.lock().ports.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Snapshot of the interaction log
    pub fn log(&self) -> BusLog {
        self.lock().log.clone()
    }

    /// Number of ports currently open
    pub fn open_count(&self) -> usize {
        self.lock().open_now.len()
    }
}

impl PortSource for SimulatedBus {
    fn list(&self) -> Result<Vec<PortDescriptor>, DetectError> {
        let state = self.lock();
        if let Some(reason) = &state.enumeration_error {
            return Err(DetectError::EnumerationFailed(reason.clone()));
        }
        Ok(state
            .ports
            .iter()
            .map(|(name, _)| PortDescriptor::new(name.clone()))
            .collect())
    }
}

impl PortOpener for SimulatedBus {
    type Stream = SimStream;

    fn open(&self, port: &str, settings: &LinkSettings) -> Result<SimStream, DetectError> {
        let baud_rate = settings.baud_rate;
        let device = {
            let mut state = self.lock();
            state.log.open_attempts.push((port.to_string(), baud_rate));

            let device = state
                .ports
                .iter()
                .find(|(n, _)| n == port)
                .map(|(_, d)| d.clone())
                .ok_or_else(|| DetectError::OpenFailed {
                    port: port.to_string(),
                    reason: "no such port".to_string(),
                })?;

            if let Some(reason) = device.open_failure() {
                debug!("Simulated open of {} refused: {}", port, reason);
                return Err(DetectError::PortBusy(port.to_string()));
            }
            if !state.open_now.insert(port.to_string()) {
                return Err(DetectError::PortBusy(port.to_string()));
            }
            state.log.opened += 1;
            device
        };

        let (host, remote) = duplex(LINK_BUFFER);
        let bus = Arc::clone(&self.state);
        let name = port.to_string();
        tokio::spawn(device.serve(remote, baud_rate, move |line| {
            lock(&bus).log.queries.push((name.clone(), baud_rate, line));
        }));

        Ok(SimStream {
            inner: host,
            port: port.to_string(),
            bus: Arc::clone(&self.state),
        })
    }

    fn clear_input(&self, _stream: &mut SimStream) -> Result<(), DetectError> {
        self.lock().log.clears += 1;
        Ok(())
    }
}

fn lock(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Host end of a simulated link; dropping it closes the port
#[derive(Debug)]
pub struct SimStream {
    inner: DuplexStream,
    port: String,
    bus: Arc<Mutex<BusState>>,
}

impl Drop for SimStream {
    fn drop(&mut self) {
        let mut state = lock(&self.bus);
        state.open_now.remove(&self.port);
        state.log.closed += 1;
    }
}

impl AsyncRead for SimStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for SimStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
