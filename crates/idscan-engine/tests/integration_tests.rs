//! Integration tests for the scan coordinator
//!
//! Sessions run end to end against a simulated bus with short timeouts.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use idscan_detect::{
    BaudProber, DetectError, PortDescriptor, PortSource, ProbeConfig, ProbeOutcome,
};
use idscan_engine::{
    DeviceRegistry, RegistryConfig, ScanCoordinator, ScanEvent, SessionId, SessionStatus,
    SlotState,
};
use idscan_protocol::{DeviceClassifier, DeviceKind, ParseError};
use idscan_sim::{SimulatedBus, SimulatedDevice};
use tokio::sync::mpsc;

// ============================================================================
// Test Helpers
// ============================================================================

mod helpers {
    use super::*;

    /// Probe settings short enough to keep silent ports cheap
    pub fn fast_config() -> ProbeConfig {
        ProbeConfig {
            read_timeout: Duration::from_millis(30),
            write_timeout: Duration::from_millis(30),
            settle_delay: Duration::ZERO,
            ..ProbeConfig::default()
        }
    }

    pub fn coordinator_with(bus: &SimulatedBus, capacity: usize) -> ScanCoordinator<SimulatedBus> {
        let classifier = DeviceClassifier::new();
        let registry = DeviceRegistry::for_classifier(
            &classifier,
            RegistryConfig {
                capacity_per_kind: capacity,
            },
        );
        let prober = BaudProber::with_config(bus.clone(), fast_config());
        ScanCoordinator::new(prober, classifier, registry)
    }

    pub fn coordinator(bus: &SimulatedBus) -> ScanCoordinator<SimulatedBus> {
        coordinator_with(bus, 10)
    }

    /// Receive the next event, failing the test if none arrives in time
    pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ScanEvent>) -> ScanEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event stream closed")
    }

    /// Collect events up to and including the finish of `session`
    pub async fn collect_session(
        rx: &mut mpsc::UnboundedReceiver<ScanEvent>,
        session: SessionId,
    ) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        loop {
            let event = next_event(rx).await;
            let done = event.is_terminal() && event.session() == session;
            events.push(event);
            if done {
                return events;
            }
        }
    }

    pub fn progress(session: SessionId, port: &str, baud_rate: u32) -> ScanEvent {
        ScanEvent::Progress {
            session,
            port: port.to_string(),
            baud_rate,
        }
    }

    pub fn exhausted(session: SessionId, port: &str) -> ScanEvent {
        ScanEvent::PortExhausted {
            session,
            port: port.to_string(),
        }
    }

    pub fn finished(session: SessionId, status: SessionStatus) -> ScanEvent {
        ScanEvent::SessionFinished { session, status }
    }

    pub fn mentions_port(events: &[ScanEvent], port: &str) -> bool {
        events.iter().any(|e| e.port() == Some(port))
    }
}

// ============================================================================
// Session Flow Tests
// ============================================================================

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn found_then_exhausted_in_catalog_order() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::pico("I2C", 1))
            .attach("PORT2", SimulatedDevice::silent());
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let id = session.id();
        let events = helpers::collect_session(&mut rx, id).await;

        assert_eq!(events.len(), 9, "unexpected events: {:?}", events);
        assert_eq!(events[0], helpers::progress(id, "PORT1", 9600));
        match &events[1] {
            ScanEvent::Found { record, slot, .. } => {
                assert_eq!(record.port, "PORT1");
                assert_eq!(record.baud_rate, 9600);
                assert_eq!(record.kind, DeviceKind::new("I2C"));
                assert_eq!(record.index, 1);
                assert_eq!(record.raw_response, "PICO:I2C_1");
                assert_eq!(*slot, Some(0));
            }
            other => panic!("expected Found, got {:?}", other),
        }
        for (event, rate) in events[2..7].iter().zip([9600, 19200, 38400, 57600, 115200]) {
            assert_eq!(*event, helpers::progress(id, "PORT2", rate));
        }
        assert_eq!(events[7], helpers::exhausted(id, "PORT2"));
        assert_eq!(events[8], helpers::finished(id, SessionStatus::Completed));

        assert_eq!(session.wait().await, SessionStatus::Completed);
        assert_eq!(session.events_emitted(), 9);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn device_found_on_third_rate() {
        let bus =
            SimulatedBus::new().attach("PORT1", SimulatedDevice::pico("ADC", 2).at_baud(38400));
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let events = helpers::collect_session(&mut rx, session.id()).await;

        let rates: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Progress { baud_rate, .. } => Some(*baud_rate),
                _ => None,
            })
            .collect();
        assert_eq!(rates, vec![9600, 19200, 38400]);
        assert_eq!(bus.log().rates_for("PORT1"), vec![9600, 19200, 38400]);

        let slots = coordinator.snapshot();
        let adc = slots
            .iter()
            .find(|s| s.kind == DeviceKind::new("ADC") && s.position == 0)
            .expect("ADC slot 0");
        let record = adc.state.record().expect("ADC slot occupied");
        assert_eq!(record.index, 2);
        assert_eq!(record.baud_rate, 38400);
    }

    #[tokio::test]
    async fn empty_source_only_finishes() {
        let bus = SimulatedBus::new();
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(Vec::<PortDescriptor>::new()).await;
        let events = helpers::collect_session(&mut rx, session.id()).await;

        assert_eq!(
            events,
            vec![helpers::finished(session.id(), SessionStatus::Completed)]
        );
    }

    #[tokio::test]
    async fn enumeration_failure_reports_error_then_finish() {
        let bus = SimulatedBus::new().attach("PORT1", SimulatedDevice::pico("I2C", 1));
        bus.fail_enumeration("usb subsystem unavailable");
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let events = helpers::collect_session(&mut rx, session.id()).await;

        assert_eq!(events.len(), 2);
        match &events[0] {
            ScanEvent::SessionError { reason, .. } => {
                assert!(reason.contains("usb subsystem unavailable"));
            }
            other => panic!("expected SessionError, got {:?}", other),
        }
        assert!(matches!(
            &events[1],
            ScanEvent::SessionFinished {
                status: SessionStatus::Failed(_),
                ..
            }
        ));
        assert!(matches!(session.wait().await, SessionStatus::Failed(_)));
        assert!(bus.log().open_attempts.is_empty());
    }

    #[tokio::test]
    async fn worker_panic_still_finishes_session() {
        struct CrashingSource;

        impl PortSource for CrashingSource {
            fn list(&self) -> Result<Vec<PortDescriptor>, DetectError> {
                panic!("port backend crashed");
            }
        }

        let bus = SimulatedBus::new();
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(CrashingSource).await;
        let status = tokio::time::timeout(Duration::from_secs(5), session.wait())
            .await
            .expect("wait() should return after a worker panic");
        assert!(matches!(status, SessionStatus::Failed(_)));

        let events = helpers::collect_session(&mut rx, session.id()).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ScanEvent::SessionFinished {
                status: SessionStatus::Failed(reason),
                ..
            } if reason.contains("panicked")
        ));

        // The coordinator stays usable
        let next = coordinator.start(Vec::<PortDescriptor>::new()).await;
        assert_eq!(next.wait().await, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn busy_port_is_exhausted_and_scan_continues() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::busy())
            .attach("PORT2", SimulatedDevice::pico("PWM", 1));
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let events = helpers::collect_session(&mut rx, session.id()).await;

        assert!(events.contains(&helpers::exhausted(session.id(), "PORT1")));
        assert!(events
            .iter()
            .any(|e| matches!(e, ScanEvent::Found { record, .. } if record.port == "PORT2")));
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[tokio::test]
    async fn every_port_has_one_outcome() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::pico("I2C", 1))
            .attach("PORT2", SimulatedDevice::silent())
            .attach("PORT3", SimulatedDevice::raw(b"PICO:SPI_1\n".to_vec()))
            .attach("PORT4", SimulatedDevice::unplugging());
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let events = helpers::collect_session(&mut rx, session.id()).await;

        for port in ["PORT1", "PORT2", "PORT3", "PORT4"] {
            let outcomes = events
                .iter()
                .filter(|e| e.is_port_outcome() && e.port() == Some(port))
                .count();
            assert_eq!(outcomes, 1, "{} should conclude exactly once", port);
        }
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }
}

// ============================================================================
// Classification and Registry Tests
// ============================================================================

mod registry_tests {
    use super::*;

    #[tokio::test]
    async fn unknown_kinds_are_reported_not_placed() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::raw(b"PICO:SPI_1\n".to_vec()))
            .attach("PORT2", SimulatedDevice::raw(b"PICO:38400\n".to_vec()));
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let events = helpers::collect_session(&mut rx, session.id()).await;

        let unrecognized: Vec<(&str, &str)> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Unrecognized { port, raw, .. } => Some((port.as_str(), raw.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            unrecognized,
            vec![("PORT1", "PICO:SPI_1"), ("PORT2", "PICO:38400")]
        );

        // A valid reply ends the ladder even when the kind is unknown
        assert_eq!(bus.log().rates_for("PORT1"), vec![9600]);
        assert!(!events
            .iter()
            .any(|e| matches!(e, ScanEvent::Found { .. } | ScanEvent::PortExhausted { .. })));
        assert!(coordinator.registry().lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn punctuated_kind_is_unrecognized_after_one_rate() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::raw(b"PICO:SPI-X_1\n".to_vec()));
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let id = session.id();
        let events = helpers::collect_session(&mut rx, id).await;

        assert_eq!(events.len(), 3, "unexpected events: {:?}", events);
        assert_eq!(events[0], helpers::progress(id, "PORT1", 9600));
        match &events[1] {
            ScanEvent::Unrecognized {
                port,
                baud_rate,
                raw,
                ..
            } => {
                assert_eq!(port, "PORT1");
                assert_eq!(*baud_rate, 9600);
                assert_eq!(raw, "PICO:SPI-X_1");
            }
            other => panic!("expected Unrecognized, got {:?}", other),
        }
        assert_eq!(events[2], helpers::finished(id, SessionStatus::Completed));
        assert_eq!(bus.log().rates_for("PORT1"), vec![9600]);
    }

    #[tokio::test]
    async fn full_kind_group_reports_no_slot() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::pico("I2C", 1))
            .attach("PORT2", SimulatedDevice::pico("I2C", 2));
        let coordinator = helpers::coordinator_with(&bus, 1);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let events = helpers::collect_session(&mut rx, session.id()).await;

        let slots: Vec<(String, Option<usize>)> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Found { record, slot, .. } => Some((record.port.clone(), *slot)),
                _ => None,
            })
            .collect();
        assert_eq!(
            slots,
            vec![("PORT1".to_string(), Some(0)), ("PORT2".to_string(), None)]
        );

        let i2c: Vec<_> = coordinator
            .snapshot()
            .into_iter()
            .filter(|s| s.kind == DeviceKind::new("I2C"))
            .collect();
        assert_eq!(i2c.len(), 1);
        match &i2c[0].state {
            SlotState::Occupied(record) => assert_eq!(record.port, "PORT1"),
            SlotState::Empty => panic!("first device should keep its slot"),
        }
    }

    #[tokio::test]
    async fn kinds_fill_independent_pools() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::pico("I2C", 1))
            .attach("PORT2", SimulatedDevice::pico("PWM", 1))
            .attach("PORT3", SimulatedDevice::pico("I2C", 2));
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let events = helpers::collect_session(&mut rx, session.id()).await;

        let placed: Vec<(String, Option<usize>)> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Found { record, slot, .. } => Some((record.port.clone(), *slot)),
                _ => None,
            })
            .collect();
        assert_eq!(
            placed,
            vec![
                ("PORT1".to_string(), Some(0)),
                ("PORT2".to_string(), Some(0)),
                ("PORT3".to_string(), Some(1)),
            ]
        );
        assert_eq!(coordinator.registry().lock().unwrap().len(), 3);
    }
}

// ============================================================================
// Cancellation and Restart Tests
// ============================================================================

mod cancel_tests {
    use super::*;

    #[tokio::test]
    async fn cancel_stops_before_remaining_ports() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::pico("I2C", 1))
            .attach("PORT2", SimulatedDevice::silent())
            .attach("PORT3", SimulatedDevice::pico("PWM", 1));
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let id = session.id();

        let mut events = Vec::new();
        loop {
            let event = helpers::next_event(&mut rx).await;
            let reached_port2 = event.port() == Some("PORT2");
            events.push(event);
            if reached_port2 {
                break;
            }
        }

        let cancelled = coordinator.cancel().await.expect("session was running");
        assert_eq!(cancelled.id(), id);
        assert!(session.is_cancel_requested());

        events.extend(helpers::collect_session(&mut rx, id).await);

        assert!(!helpers::mentions_port(&events, "PORT3"));
        assert!(!events.contains(&helpers::exhausted(id, "PORT2")));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(
            events.last(),
            Some(&helpers::finished(id, SessionStatus::Cancelled))
        );
        assert_eq!(session.wait().await, SessionStatus::Cancelled);

        // Results gathered before the cancel stay in the registry
        let registry = coordinator.registry();
        let registry = registry.lock().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.devices().next().map(|r| r.port.as_str()), Some("PORT1"));
        drop(registry);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_without_session_is_noop() {
        let bus = SimulatedBus::new();
        let coordinator = helpers::coordinator(&bus);

        assert!(coordinator.cancel().await.is_none());
        assert!(coordinator.active().await.is_none());
    }

    #[tokio::test]
    async fn cancel_after_finish_is_noop() {
        let bus = SimulatedBus::new().attach("PORT1", SimulatedDevice::pico("I2C", 1));
        let coordinator = helpers::coordinator(&bus);

        let session = coordinator.start(bus.clone()).await;
        assert_eq!(session.wait().await, SessionStatus::Completed);

        assert!(coordinator.cancel().await.is_none());
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[tokio::test]
    async fn restart_cancels_and_drains_previous_session() {
        let bus = SimulatedBus::new()
            .attach("SLOW1", SimulatedDevice::silent())
            .attach("SLOW2", SimulatedDevice::silent())
            .attach("FAST", SimulatedDevice::pico("ADC", 1));
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let first_ports: Vec<PortDescriptor> = vec!["SLOW1".into(), "SLOW2".into()];
        let first = coordinator.start(first_ports).await;
        let first_event = helpers::next_event(&mut rx).await;
        assert_eq!(first_event.session(), first.id());

        let second = coordinator
            .start(vec![PortDescriptor::from("FAST")])
            .await;
        assert_ne!(first.id(), second.id());
        assert_eq!(first.status(), SessionStatus::Cancelled);

        let mut events = vec![first_event];
        events.extend(helpers::collect_session(&mut rx, second.id()).await);

        let boundary = events
            .iter()
            .position(|e| e.session() == second.id())
            .expect("second session emitted events");
        assert!(events[..boundary].iter().all(|e| e.session() == first.id()));
        assert!(events[boundary..].iter().all(|e| e.session() == second.id()));
        assert_eq!(
            events[boundary - 1],
            helpers::finished(first.id(), SessionStatus::Cancelled)
        );
        assert!(!helpers::mentions_port(&events[..boundary], "SLOW2"));

        let registry = coordinator.registry();
        let registry = registry.lock().unwrap();
        let ports: Vec<&str> = registry.devices().map(|r| r.port.as_str()).collect();
        assert_eq!(ports, vec!["FAST"]);
    }

    #[tokio::test]
    async fn restart_resets_registry() {
        let bus = SimulatedBus::new().attach("PORT1", SimulatedDevice::pico("I2C", 1));
        let coordinator = helpers::coordinator(&bus);

        let first = coordinator.start(bus.clone()).await;
        first.wait().await;
        assert_eq!(coordinator.registry().lock().unwrap().len(), 1);

        let second = coordinator.start(Vec::<PortDescriptor>::new()).await;
        second.wait().await;
        assert!(coordinator.registry().lock().unwrap().is_empty());
        assert_eq!(
            coordinator.active().await.map(|s| s.id()),
            Some(second.id())
        );
    }

    #[tokio::test]
    async fn shutdown_cancels_running_session() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::silent())
            .attach("PORT2", SimulatedDevice::silent());
        let coordinator = helpers::coordinator(&bus);

        let session = coordinator.start(bus.clone()).await;
        coordinator.shutdown().await;

        assert_eq!(session.status(), SessionStatus::Cancelled);
        assert!(coordinator.active().await.is_none());
    }
}

// ============================================================================
// Resource Release Tests
// ============================================================================

mod release_tests {
    use super::*;

    #[tokio::test]
    async fn every_opened_port_is_closed() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::pico("I2C", 1).at_baud(57600))
            .attach("PORT2", SimulatedDevice::silent())
            .attach("PORT3", SimulatedDevice::unplugging())
            .attach("PORT4", SimulatedDevice::raw(b"garbage\n".to_vec()));
        let coordinator = helpers::coordinator(&bus);

        let session = coordinator.start(bus.clone()).await;
        assert_eq!(session.wait().await, SessionStatus::Completed);
        coordinator.shutdown().await;

        let log = bus.log();
        assert_eq!(bus.open_count(), 0);
        assert_eq!(log.opened, log.closed);
        assert!(log.opened > 0);
    }

    #[tokio::test]
    async fn cancelled_session_releases_ports() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::silent())
            .attach("PORT2", SimulatedDevice::silent());
        let coordinator = helpers::coordinator(&bus);
        let mut rx = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        helpers::next_event(&mut rx).await;
        coordinator.cancel().await;
        assert_eq!(session.wait().await, SessionStatus::Cancelled);
        coordinator.shutdown().await;

        let log = bus.log();
        assert_eq!(bus.open_count(), 0);
        assert_eq!(log.opened, log.closed);
    }
}

// ============================================================================
// Subscriber Tests
// ============================================================================

mod subscriber_tests {
    use super::*;

    #[tokio::test]
    async fn all_subscribers_see_same_sequence() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::pico("PWM", 3))
            .attach("PORT2", SimulatedDevice::silent());
        let coordinator = helpers::coordinator(&bus);
        let mut a = coordinator.subscribe();
        let mut b = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let seen_a = helpers::collect_session(&mut a, session.id()).await;
        let seen_b = helpers::collect_session(&mut b, session.id()).await;

        assert_eq!(seen_a, seen_b);
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_stall_scan() {
        let bus = SimulatedBus::new().attach("PORT1", SimulatedDevice::pico("I2C", 1));
        let coordinator = helpers::coordinator(&bus);
        drop(coordinator.subscribe());
        let mut kept = coordinator.subscribe();

        let session = coordinator.start(bus.clone()).await;
        let events = helpers::collect_session(&mut kept, session.id()).await;

        assert_eq!(session.wait().await, SessionStatus::Completed);
        assert_eq!(events.len(), 3);
    }
}

// ============================================================================
// Wire Behaviour Tests
// ============================================================================

mod wire_tests {
    use super::*;

    async fn ladder(bus: &SimulatedBus, port: &str) -> Vec<ProbeOutcome> {
        let prober = BaudProber::with_config(bus.clone(), helpers::fast_config());
        prober
            .probe_with(port, &AtomicBool::new(false), |_| {})
            .await
            .attempts
            .into_iter()
            .map(|a| a.outcome)
            .collect()
    }

    #[tokio::test]
    async fn every_open_is_cleared_and_queried_once() {
        let bus = SimulatedBus::new()
            .attach("PORT1", SimulatedDevice::pico("I2C", 1).at_baud(38400))
            .attach("PORT2", SimulatedDevice::silent());
        let coordinator = helpers::coordinator(&bus);

        let session = coordinator.start(bus.clone()).await;
        assert_eq!(session.wait().await, SessionStatus::Completed);

        let log = bus.log();
        assert_eq!(log.opened, 3 + 5);
        assert_eq!(log.clears, log.opened);
        assert_eq!(log.queries.len(), log.opened);
        assert!(log.queries.iter().all(|(_, _, line)| line == "ID?"));

        let queried: Vec<(String, u32)> = log
            .queries
            .iter()
            .map(|(port, baud, _)| (port.clone(), *baud))
            .collect();
        assert_eq!(queried, log.open_attempts);
    }

    #[tokio::test]
    async fn late_reply_times_out_on_every_rate() {
        let bus = SimulatedBus::new().attach(
            "PORT1",
            SimulatedDevice::pico("I2C", 1).with_reply_delay(Duration::from_millis(120)),
        );

        let outcomes = ladder(&bus, "PORT1").await;
        assert_eq!(outcomes, vec![ProbeOutcome::Timeout; 5]);
        assert_eq!(bus.open_count(), 0);
    }

    #[tokio::test]
    async fn line_noise_off_rate_until_matching_rate() {
        let bus = SimulatedBus::new().attach(
            "PORT1",
            SimulatedDevice::pico("PWM", 2).at_baud(38400).garbled_off_rate(),
        );

        let outcomes = ladder(&bus, "PORT1").await;
        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes[..2] {
            assert!(matches!(
                outcome,
                ProbeOutcome::Malformed {
                    reason: ParseError::NotAscii,
                    ..
                }
            ));
        }
        assert_eq!(outcomes[2].response().map(|r| r.index), Some(2));
    }

    #[tokio::test]
    async fn unplugged_device_is_link_error_on_every_rate() {
        let bus = SimulatedBus::new().attach("PORT1", SimulatedDevice::unplugging());

        let outcomes = ladder(&bus, "PORT1").await;
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes
            .iter()
            .all(|o| *o == ProbeOutcome::LinkError("port closed".to_string())));
    }
}
