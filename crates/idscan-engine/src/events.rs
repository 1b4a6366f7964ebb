//! Ordered event stream for scan sessions
//!
//! Every observable step of a scan is emitted through a single channel per
//! subscriber. Within a session, events for one port are contiguous and
//! ports follow catalog order; `SessionFinished` is always last.

use std::fmt;

use crate::registry::DeviceRecord;

/// Identifier of a scan session, increasing per coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Probing ports
    Running,
    /// Every port was processed
    Completed,
    /// Stopped at a port boundary after a cancel request
    Cancelled,
    /// A precondition failed (e.g. ports could not be enumerated)
    Failed(String),
}

impl SessionStatus {
    /// Whether the session has ended
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Running => f.write_str("running"),
            SessionStatus::Completed => f.write_str("completed"),
            SessionStatus::Cancelled => f.write_str("cancelled"),
            SessionStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Event emitted by a scan session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A probe is about to run on `port` at `baud_rate`
    Progress {
        session: SessionId,
        port: String,
        baud_rate: u32,
    },

    /// A device was identified and classified
    Found {
        session: SessionId,
        record: DeviceRecord,
        /// Slot position within the kind group, `None` if the group was full
        slot: Option<usize>,
    },

    /// Every baud rate was tried on `port` without a match
    PortExhausted { session: SessionId, port: String },

    /// A device answered with a kind the classifier does not know
    Unrecognized {
        session: SessionId,
        port: String,
        baud_rate: u32,
        raw: String,
        reason: String,
    },

    /// The session could not run (always followed by `SessionFinished`)
    SessionError { session: SessionId, reason: String },

    /// The session ended; nothing follows for this session
    SessionFinished {
        session: SessionId,
        status: SessionStatus,
    },
}

impl ScanEvent {
    /// Session this event belongs to
    pub fn session(&self) -> SessionId {
        match self {
            ScanEvent::Progress { session, .. }
            | ScanEvent::Found { session, .. }
            | ScanEvent::PortExhausted { session, .. }
            | ScanEvent::Unrecognized { session, .. }
            | ScanEvent::SessionError { session, .. }
            | ScanEvent::SessionFinished { session, .. } => *session,
        }
    }

    /// Port this event concerns, if any
    pub fn port(&self) -> Option<&str> {
        match self {
            ScanEvent::Progress { port, .. }
            | ScanEvent::PortExhausted { port, .. }
            | ScanEvent::Unrecognized { port, .. } => Some(port),
            ScanEvent::Found { record, .. } => Some(&record.port),
            ScanEvent::SessionError { .. } | ScanEvent::SessionFinished { .. } => None,
        }
    }

    /// Check if this is the last event of its session
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanEvent::SessionFinished { .. })
    }

    /// Check if this event concludes a port
    pub fn is_port_outcome(&self) -> bool {
        matches!(
            self,
            ScanEvent::Found { .. }
                | ScanEvent::PortExhausted { .. }
                | ScanEvent::Unrecognized { .. }
        )
    }
}
