//! Baud-rate probing for device identification
//!
//! This module sends the identification query to a port at each rung of a
//! fixed baud ladder and stops at the first valid answer. Every rung opens
//! the port fresh and releases it before the next rung or on return.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use idscan_protocol::{
    IdentCodec, IdentificationResponse, ParseError, DEFAULT_FAMILY, MAX_LINE_LEN,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::error::DetectError;
use crate::transport::{LinkSettings, PortOpener};

/// Default ladder, ordered by how common the rate is on cheap UART bridges
pub const DEFAULT_LADDER: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Ordered, non-empty list of candidate baud rates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct BaudLadder(Vec<u32>);

impl BaudLadder {
    /// Create a ladder; fails if `rates` is empty
    pub fn new(rates: Vec<u32>) -> Result<Self, DetectError> {
        if rates.is_empty() {
            return Err(DetectError::EmptyLadder);
        }
        Ok(Self(rates))
    }

    /// Rates in probing order
    pub fn rates(&self) -> &[u32] {
        &self.0
    }

    /// First rung
    pub fn first(&self) -> u32 {
        self.0[0]
    }

    /// Number of rungs
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed ladder
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for BaudLadder {
    fn default() -> Self {
        Self(DEFAULT_LADDER.to_vec())
    }
}

impl TryFrom<Vec<u32>> for BaudLadder {
    type Error = DetectError;

    fn try_from(rates: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(rates)
    }
}

impl From<BaudLadder> for Vec<u32> {
    fn from(ladder: BaudLadder) -> Self {
        ladder.0
    }
}

/// Configuration for probing
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Baud rates tried per port, in order
    pub ladder: BaudLadder,
    /// Timeout for reading the response line
    pub read_timeout: Duration,
    /// Timeout for writing and flushing the query
    pub write_timeout: Duration,
    /// Delay after opening the port before the query is sent
    pub settle_delay: Duration,
    /// Family prefix that counts as a match
    pub family: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ladder: BaudLadder::default(),
            read_timeout: Duration::from_millis(300),
            write_timeout: Duration::from_millis(200),
            settle_delay: Duration::from_millis(50),
            family: DEFAULT_FAMILY.to_string(),
        }
    }
}

/// Outcome of a single rung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A valid identification from the expected family
    Matched {
        response: IdentificationResponse,
        raw: String,
    },
    /// Nothing came back within the read timeout
    Timeout,
    /// Opening, clearing, writing or reading the port failed
    LinkError(String),
    /// Something came back but it is not a valid identification
    Malformed { raw: String, reason: ParseError },
}

impl ProbeOutcome {
    /// Whether this outcome ends the ladder
    pub fn is_match(&self) -> bool {
        matches!(self, ProbeOutcome::Matched { .. })
    }

    /// The matched response, if any
    pub fn response(&self) -> Option<&IdentificationResponse> {
        match self {
            ProbeOutcome::Matched { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// One rung of the ladder on one port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    /// Port name
    pub port: String,
    /// Baud rate tried
    pub baud_rate: u32,
    /// What happened
    pub outcome: ProbeOutcome,
}

/// All rungs tried on one port
#[derive(Debug, Clone)]
pub struct PortProbe {
    /// Port name
    pub port: String,
    /// Attempts in ladder order; a match is always last
    pub attempts: Vec<ProbeAttempt>,
    /// Cancellation stopped the ladder before it was exhausted
    pub interrupted: bool,
}

impl PortProbe {
    /// The matching attempt, if the ladder found one
    pub fn matched(&self) -> Option<&ProbeAttempt> {
        self.attempts.last().filter(|a| a.outcome.is_match())
    }

    /// The match or, failing that, the last failed rung unchanged
    pub fn into_terminal(mut self) -> Option<ProbeAttempt> {
        self.attempts.pop()
    }
}

/// What reading a response line produced
enum LineRead {
    Line(Vec<u8>),
    Overflow(Vec<u8>),
    Closed,
}

/// Multi-baud identification prober
pub struct BaudProber<O: PortOpener> {
    opener: O,
    codec: IdentCodec,
    config: ProbeConfig,
}

impl<O: PortOpener> BaudProber<O> {
    /// Create a prober with default configuration
    pub fn new(opener: O) -> Self {
        Self::with_config(opener, ProbeConfig::default())
    }

    /// Create a prober with custom configuration
    pub fn with_config(opener: O, config: ProbeConfig) -> Self {
        Self {
            opener,
            codec: IdentCodec::new(),
            config,
        }
    }

    /// Replace the codec (e.g. to accept more families)
    pub fn with_codec(mut self, codec: IdentCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// The port opener
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Probe one port across the whole ladder
    ///
    /// Returns the matching attempt. Once the ladder is exhausted the port has
    /// no device, and the last rung's failure is returned as-is: `Timeout` or
    /// `LinkError`, or `Malformed` with the bytes that last answered. Use
    /// [`probe_with`](Self::probe_with) to see every rung.
    pub async fn probe(&self, port: &str) -> ProbeAttempt {
        let never = AtomicBool::new(false);
        let first = self.config.ladder.first();
        self.probe_with(port, &never, |_| {})
            .await
            .into_terminal()
            .unwrap_or_else(|| ProbeAttempt {
                port: port.to_string(),
                baud_rate: first,
                outcome: ProbeOutcome::Timeout,
            })
    }

    /// Probe one port, reporting each rung before it starts
    ///
    /// `cancel` is checked before every rung; a rung already in flight runs
    /// to completion.
    pub async fn probe_with<F>(
        &self,
        port: &str,
        cancel: &AtomicBool,
        mut on_rate: F,
    ) -> PortProbe
    where
        F: FnMut(u32),
    {
        let mut attempts = Vec::with_capacity(self.config.ladder.len());
        let mut interrupted = false;

        for &baud_rate in self.config.ladder.rates() {
            if cancel.load(Ordering::Acquire) {
                debug!("Probe of {} interrupted before {} baud", port, baud_rate);
                interrupted = true;
                break;
            }

            on_rate(baud_rate);
            let attempt = self.attempt(port, baud_rate).await;
            let matched = attempt.outcome.is_match();
            attempts.push(attempt);

            if matched {
                break;
            }
        }

        if !interrupted && !attempts.iter().any(|a| a.outcome.is_match()) {
            debug!("No device on {} (tried {} rates)", port, attempts.len());
        }

        PortProbe {
            port: port.to_string(),
            attempts,
            interrupted,
        }
    }

    /// Run a single rung
    pub async fn attempt(&self, port: &str, baud_rate: u32) -> ProbeAttempt {
        let outcome = self.exchange(port, baud_rate).await;

        match &outcome {
            ProbeOutcome::Matched { response, .. } => {
                info!("Identified {} on {} at {} baud", response, port, baud_rate)
            }
            ProbeOutcome::Timeout => debug!("{} at {} baud: timeout", port, baud_rate),
            ProbeOutcome::LinkError(reason) => {
                debug!("{} at {} baud: link error: {}", port, baud_rate, reason)
            }
            ProbeOutcome::Malformed { raw, reason } => {
                debug!("{} at {} baud: malformed {:?}: {}", port, baud_rate, raw, reason)
            }
        }

        ProbeAttempt {
            port: port.to_string(),
            baud_rate,
            outcome,
        }
    }

    /// Open, query, read and release
    ///
    /// The stream is owned by this frame, so the port is closed on every
    /// return path.
    async fn exchange(&self, port: &str, baud_rate: u32) -> ProbeOutcome {
        let settings = LinkSettings {
            baud_rate,
            read_timeout: self.config.read_timeout,
            write_timeout: self.config.write_timeout,
        };

        let mut stream = match self.opener.open(port, &settings) {
            Ok(s) => s,
            Err(e) => return ProbeOutcome::LinkError(e.to_string()),
        };

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        if let Err(e) = self.opener.clear_input(&mut stream) {
            return ProbeOutcome::LinkError(e.to_string());
        }

        let query = self.codec.encode_query();
        trace!("Sending {:?} to {}", String::from_utf8_lossy(query), port);

        let write = async {
            stream.write_all(query).await?;
            stream.flush().await
        };
        match timeout(self.config.write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return ProbeOutcome::LinkError(format!("write failed: {}", e)),
            Err(_) => return ProbeOutcome::LinkError("write timed out".to_string()),
        }

        let raw = match timeout(self.config.read_timeout, read_line(&mut stream)).await {
            Ok(Ok(LineRead::Line(bytes))) => bytes,
            Ok(Ok(LineRead::Overflow(bytes))) => {
                return ProbeOutcome::Malformed {
                    raw: String::from_utf8_lossy(&bytes).into_owned(),
                    reason: ParseError::TooLong(bytes.len()),
                }
            }
            Ok(Ok(LineRead::Closed)) => {
                return ProbeOutcome::LinkError("port closed".to_string())
            }
            Ok(Err(e)) => return ProbeOutcome::LinkError(format!("read failed: {}", e)),
            Err(_) => return ProbeOutcome::Timeout,
        };

        trace!("Response from {}: {:?}", port, String::from_utf8_lossy(&raw));
        self.interpret(&raw)
    }

    /// Decode a response line and check its family
    fn interpret(&self, raw: &[u8]) -> ProbeOutcome {
        let text = String::from_utf8_lossy(raw).trim_end().to_string();

        match self.codec.decode_bytes(raw) {
            Ok(response) if response.prefix == self.config.family => ProbeOutcome::Matched {
                response,
                raw: text,
            },
            Ok(response) => ProbeOutcome::Malformed {
                raw: text,
                reason: ParseError::UnknownFamily(response.prefix),
            },
            Err(reason) => ProbeOutcome::Malformed { raw: text, reason },
        }
    }
}

/// Read up to and including `\n`, one byte at a time
///
/// Reading bytewise leaves nothing buffered past the terminator.
async fn read_line<S>(stream: &mut S) -> std::io::Result<LineRead>
where
    S: AsyncRead + Unpin,
{
    let mut line = Vec::with_capacity(MAX_LINE_LEN);
    let mut byte = [0u8; 1];

    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            // Trailing data cut off by end-of-stream is decoded as a line
            return Ok(if line.is_empty() {
                LineRead::Closed
            } else {
                LineRead::Line(line)
            });
        }

        line.push(byte[0]);
        if byte[0] == b'\n' {
            return Ok(LineRead::Line(line));
        }
        if line.len() >= MAX_LINE_LEN {
            return Ok(LineRead::Overflow(line));
        }
    }
}

impl<O: PortOpener + Default> Default for BaudProber<O> {
    fn default() -> Self {
        Self::new(O::default())
    }
}
