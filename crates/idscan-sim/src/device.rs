//! Simulated peripheral
//!
//! Answers the identification query the way the reference firmware does:
//! one response line per `ID?` line, only at the UART rate it is set to.

use std::time::Duration;

use idscan_protocol::{IdentificationResponse, DEFAULT_FAMILY};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tracing::trace;

/// Bytes a receiver sees when the host talks at the wrong rate
const GARBLED: &[u8] = b"\xf8\x80\x7e\xfe\n";

/// What the device does when queried
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Reply with these bytes
    Reply(Vec<u8>),
    /// Never reply
    Silent,
    /// Drop the connection on the first query
    HangUp,
    /// Port cannot be opened
    Unopenable(String),
}

/// A scripted serial peripheral
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub(crate) behavior: Behavior,
    /// Rates the device answers at; empty means any rate
    rates: Vec<u32>,
    /// Reply with line noise at other rates instead of staying silent
    garble_off_rate: bool,
    /// Delay between query and reply
    reply_delay: Duration,
}

impl SimulatedDevice {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            rates: Vec::new(),
            garble_off_rate: false,
            reply_delay: Duration::ZERO,
        }
    }

    /// A device answering with the given identification
    pub fn identifying(response: IdentificationResponse) -> Self {
        Self::with_behavior(Behavior::Reply(response.encode()))
    }

    /// A device of the default family answering `PICO:<kind>_<index>`
    pub fn pico(kind: &str, index: u32) -> Self {
        Self::identifying(IdentificationResponse::new(DEFAULT_FAMILY, kind, index))
    }

    /// A device answering with an arbitrary line (terminator not added)
    pub fn raw(reply: impl Into<Vec<u8>>) -> Self {
        Self::with_behavior(Behavior::Reply(reply.into()))
    }

    /// A port with nothing listening
    pub fn silent() -> Self {
        Self::with_behavior(Behavior::Silent)
    }

    /// A device that disappears as soon as it is queried
    pub fn unplugging() -> Self {
        Self::with_behavior(Behavior::HangUp)
    }

    /// A port held by another process
    pub fn busy() -> Self {
        Self::with_behavior(Behavior::Unopenable("busy".to_string()))
    }

    /// Only answer at `rate` (may be called repeatedly)
    pub fn at_baud(mut self, rate: u32) -> Self {
        self.rates.push(rate);
        self
    }

    /// Emit line noise when queried at a rate the device does not use
    pub fn garbled_off_rate(mut self) -> Self {
        self.garble_off_rate = true;
        self
    }

    /// Wait before replying
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Reason opening fails, if the port is unopenable
    pub(crate) fn open_failure(&self) -> Option<&str> {
        match &self.behavior {
            Behavior::Unopenable(reason) => Some(reason),
            _ => None,
        }
    }

    fn listens_at(&self, baud_rate: u32) -> bool {
        self.rates.is_empty() || self.rates.contains(&baud_rate)
    }

    /// Serve one connection until the host closes it
    ///
    /// `on_query` is called with each line received.
    pub(crate) async fn serve<F>(self, device: DuplexStream, baud_rate: u32, mut on_query: F)
    where
        F: FnMut(String) + Send,
    {
        let mut stream = BufReader::new(device);
        let mut line = String::new();

        loop {
            line.clear();
            match stream.read_line(&mut line).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }

            let query = line.trim_end().to_string();
            trace!("Simulated device at {} baud got {:?}", baud_rate, query);
            on_query(query.clone());

            if query != "ID?" {
                continue;
            }

            let reply: &[u8] = match &self.behavior {
                Behavior::HangUp => return,
                Behavior::Silent | Behavior::Unopenable(_) => continue,
                Behavior::Reply(bytes) if self.listens_at(baud_rate) => bytes,
                Behavior::Reply(_) if self.garble_off_rate => GARBLED,
                Behavior::Reply(_) => continue,
            };

            if !self.reply_delay.is_zero() {
                tokio::time::sleep(self.reply_delay).await;
            }
            if stream.write_all(reply).await.is_err() || stream.flush().await.is_err() {
                return;
            }
        }
    }
}
