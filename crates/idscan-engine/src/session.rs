//! Scan session handle

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::watch;

use crate::events::{SessionId, SessionStatus};

#[derive(Debug)]
struct SessionShared {
    id: SessionId,
    started_at: SystemTime,
    cancel_requested: AtomicBool,
    events_emitted: AtomicUsize,
    status_tx: watch::Sender<SessionStatus>,
}

/// Handle to one scan session
///
/// Cheap to clone; all clones observe the same session.
#[derive(Debug, Clone)]
pub struct ScanSession {
    shared: Arc<SessionShared>,
    status_rx: watch::Receiver<SessionStatus>,
}

impl ScanSession {
    pub(crate) fn new(id: SessionId) -> Self {
        let (status_tx, status_rx) = watch::channel(SessionStatus::Running);
        Self {
            shared: Arc::new(SessionShared {
                id,
                started_at: SystemTime::now(),
                cancel_requested: AtomicBool::new(false),
                events_emitted: AtomicUsize::new(0),
                status_tx,
            }),
            status_rx,
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// When the session was started
    pub fn started_at(&self) -> SystemTime {
        self.shared.started_at
    }

    /// Current status
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Whether cancellation has been requested
    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::Acquire)
    }

    /// Events emitted so far
    pub fn events_emitted(&self) -> usize {
        self.shared.events_emitted.load(Ordering::Acquire)
    }

    /// Request cancellation
    ///
    /// The session stops before the next port (or the next baud rate of the
    /// current port) and still emits `SessionFinished`.
    pub fn cancel(&self) {
        self.shared.cancel_requested.store(true, Ordering::Release);
    }

    /// Wait until the session reaches a terminal status
    pub async fn wait(&self) -> SessionStatus {
        let mut rx = self.status_rx.clone();
        // The sender lives as long as this handle, so this only returns once
        // the status is terminal
        let _ = rx.wait_for(SessionStatus::is_terminal).await;
        self.status()
    }

    pub(crate) fn cancel_flag(&self) -> &AtomicBool {
        &self.shared.cancel_requested
    }

    pub(crate) fn record_event(&self) {
        self.shared.events_emitted.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn finish(&self, status: SessionStatus) {
        self.shared.status_tx.send_replace(status);
    }
}
