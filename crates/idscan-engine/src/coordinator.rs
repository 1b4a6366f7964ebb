//! Scan coordinator
//!
//! This module runs identification scans on a spawned task so the caller is
//! never blocked. Each session walks its ports in catalog order, probes every
//! port across the baud ladder, classifies what answers, places it in the
//! registry and reports each step through the event stream.
//!
//! # Example
//!
//! ```rust,ignore
//! use idscan_engine::{ScanCoordinator, ScanEvent};
//!
//! let coordinator = ScanCoordinator::new(prober, classifier, registry);
//! let mut events = coordinator.subscribe();
//!
//! let session = coordinator.start(catalog).await;
//! while let Some(event) = events.recv().await {
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use idscan_detect::{
    BaudProber, DetectError, PortDescriptor, PortOpener, PortProbe, PortSource, ProbeOutcome,
};
use idscan_protocol::DeviceClassifier;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{ScanEvent, SessionId, SessionStatus};
use crate::registry::{lock_registry, DeviceRecord, DeviceRegistry, SharedRegistry, Slot};
use crate::session::ScanSession;

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<ScanEvent>>>>;

fn lock_subscribers(
    subscribers: &Subscribers,
) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<ScanEvent>>> {
    subscribers.lock().unwrap_or_else(|e| e.into_inner())
}

/// Fans events out to every live subscriber
#[derive(Clone)]
struct EventSink {
    subscribers: Subscribers,
    session: ScanSession,
}

impl EventSink {
    fn emit(&self, event: ScanEvent) {
        self.session.record_event();
        lock_subscribers(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// The running session and the task driving it
struct ActiveSession {
    session: ScanSession,
    task: JoinHandle<()>,
}

/// Runs scan sessions and publishes their events
pub struct ScanCoordinator<O: PortOpener> {
    prober: Arc<BaudProber<O>>,
    classifier: Arc<DeviceClassifier>,
    registry: SharedRegistry,
    subscribers: Subscribers,
    active: tokio::sync::Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl<O: PortOpener> ScanCoordinator<O> {
    /// Create a coordinator
    pub fn new(
        prober: BaudProber<O>,
        classifier: DeviceClassifier,
        registry: DeviceRegistry,
    ) -> Self {
        Self {
            prober: Arc::new(prober),
            classifier: Arc::new(classifier),
            registry: registry.into_shared(),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            active: tokio::sync::Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Receive every event emitted from now on, in order
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ScanEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock_subscribers(&self.subscribers).push(tx);
        rx
    }

    /// The registry, shared with running sessions
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Read-only view of every slot
    pub fn snapshot(&self) -> Vec<Slot> {
        lock_registry(&self.registry).snapshot()
    }

    /// Start a session over the ports `source` lists
    ///
    /// A session already running is cancelled and awaited first; only then
    /// is the registry reset for the new session.
    pub async fn start<S>(&self, source: S) -> ScanSession
    where
        S: PortSource + 'static,
    {
        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            Self::stop(previous).await;
        }

        lock_registry(&self.registry).reset();

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = ScanSession::new(id);
        let sink = EventSink {
            subscribers: Arc::clone(&self.subscribers),
            session: session.clone(),
        };
        let worker = SessionWorker {
            prober: Arc::clone(&self.prober),
            classifier: Arc::clone(&self.classifier),
            registry: Arc::clone(&self.registry),
            sink: sink.clone(),
        };

        info!("Starting scan session {}", id);
        let task = tokio::spawn(supervise(tokio::spawn(worker.run(source)), sink));
        *active = Some(ActiveSession {
            session: session.clone(),
            task,
        });

        session
    }

    /// Request cancellation of the running session
    ///
    /// Returns the cancelled session, or `None` if nothing was running.
    pub async fn cancel(&self) -> Option<ScanSession> {
        let active = self.active.lock().await;
        let session = active.as_ref().map(|a| a.session.clone())?;
        if session.status().is_terminal() {
            return None;
        }
        info!("Cancelling scan session {}", session.id());
        session.cancel();
        Some(session)
    }

    /// The most recently started session, running or not
    pub async fn active(&self) -> Option<ScanSession> {
        self.active.lock().await.as_ref().map(|a| a.session.clone())
    }

    /// Cancel and wait for the running session, if any
    pub async fn shutdown(&self) {
        if let Some(previous) = self.active.lock().await.take() {
            Self::stop(previous).await;
        }
    }

    /// Cancel a session and wait until its task has emitted its last event
    async fn stop(previous: ActiveSession) {
        let ActiveSession { session, task } = previous;
        if !session.status().is_terminal() {
            debug!("Cancelling session {} before replacing it", session.id());
            session.cancel();
        }

        if let Err(e) = task.await {
            warn!("Supervisor of session {} failed: {}", session.id(), e);
        }
        debug!("Session {} ended: {}", session.id(), session.status());
    }
}

/// Finish a session whose worker died before finishing it
///
/// Subscribers still get exactly one `SessionFinished`, and `wait()` returns.
async fn supervise(worker: JoinHandle<()>, sink: EventSink) {
    let Err(e) = worker.await else {
        return;
    };

    let session = &sink.session;
    if session.status().is_terminal() {
        return;
    }

    let reason = format!("scan task failed: {}", e);
    warn!("Scan session {} {}", session.id(), reason);
    session.finish(SessionStatus::Failed(reason.clone()));
    sink.emit(ScanEvent::SessionFinished {
        session: session.id(),
        status: SessionStatus::Failed(reason),
    });
}

/// State moved into a session's task
struct SessionWorker<O: PortOpener> {
    prober: Arc<BaudProber<O>>,
    classifier: Arc<DeviceClassifier>,
    registry: SharedRegistry,
    sink: EventSink,
}

impl<O: PortOpener> SessionWorker<O> {
    fn session(&self) -> &ScanSession {
        &self.sink.session
    }

    async fn run<S: PortSource>(self, source: S) {
        let listed = source.list();
        drop(source);

        let status = self.scan(listed).await;
        let id = self.session().id();

        info!("Scan session {} {}", id, status);
        self.session().finish(status.clone());
        self.sink.emit(ScanEvent::SessionFinished {
            session: id,
            status,
        });
    }

    async fn scan(&self, listed: Result<Vec<PortDescriptor>, DetectError>) -> SessionStatus {
        let id = self.session().id();

        let ports = match listed {
            Ok(ports) => ports,
            Err(e) => {
                let reason = e.to_string();
                warn!("Scan session {} aborted: {}", id, reason);
                self.sink.emit(ScanEvent::SessionError {
                    session: id,
                    reason: reason.clone(),
                });
                return SessionStatus::Failed(reason);
            }
        };

        info!("Scanning {} port(s)", ports.len());

        for port in &ports {
            if self.session().is_cancel_requested() {
                break;
            }

            let report = self
                .prober
                .probe_with(&port.name, self.session().cancel_flag(), |baud_rate| {
                    self.sink.emit(ScanEvent::Progress {
                        session: id,
                        port: port.name.clone(),
                        baud_rate,
                    })
                })
                .await;

            self.conclude(report);
        }

        if self.session().is_cancel_requested() {
            SessionStatus::Cancelled
        } else {
            SessionStatus::Completed
        }
    }

    /// Turn one port's probe report into exactly one port outcome event
    fn conclude(&self, report: PortProbe) {
        let id = self.session().id();

        let Some(attempt) = report.matched() else {
            if report.interrupted {
                debug!("Port {} abandoned on cancel", report.port);
            } else {
                self.sink.emit(ScanEvent::PortExhausted {
                    session: id,
                    port: report.port.clone(),
                });
            }
            return;
        };

        let ProbeOutcome::Matched { response, raw } = &attempt.outcome else {
            return;
        };

        let class = match self.classifier.classify(response) {
            Ok(class) => class,
            Err(e) => {
                warn!("{} on {}: {}", raw, attempt.port, e);
                self.sink.emit(ScanEvent::Unrecognized {
                    session: id,
                    port: attempt.port.clone(),
                    baud_rate: attempt.baud_rate,
                    raw: raw.clone(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let record = DeviceRecord {
            port: attempt.port.clone(),
            baud_rate: attempt.baud_rate,
            kind: class.kind,
            index: class.index,
            raw_response: raw.clone(),
        };

        let slot = match lock_registry(&self.registry).place(record.clone()) {
            Ok(position) => Some(position),
            Err(e) => {
                warn!("{} on {} not placed: {}", raw, record.port, e);
                None
            }
        };

        info!(
            "Found {} #{} on {} at {} baud",
            record.kind, record.index, record.port, record.baud_rate
        );
        self.sink.emit(ScanEvent::Found {
            session: id,
            record,
            slot,
        });
    }
}
