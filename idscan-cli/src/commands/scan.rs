use std::pin::pin;

use idscan_detect::{BaudProber, PortCatalog, PortDescriptor, SerialOpener};
use idscan_engine::{
    DeviceRegistry, ScanCoordinator, ScanEvent, ScanSession, SessionStatus, Slot, SlotState,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::settings::Settings;

/// Final result of a scan, as printed with `--json`
#[derive(Serialize)]
struct ScanReport {
    session: u64,
    status: String,
    slots: Vec<Slot>,
}

pub async fn scan(settings: &Settings, ports: Vec<String>, json: bool) -> anyhow::Result<()> {
    let prober = BaudProber::with_config(SerialOpener, settings.probe_config()?)
        .with_codec(settings.codec());
    let classifier = settings.classifier();
    let registry = DeviceRegistry::for_classifier(&classifier, settings.registry);
    let coordinator = ScanCoordinator::new(prober, classifier, registry);

    let mut events = coordinator.subscribe();
    let session = if ports.is_empty() {
        let catalog = PortCatalog::with_config(settings.catalog.clone());
        coordinator.start(catalog).await
    } else {
        let ports: Vec<PortDescriptor> = ports.into_iter().map(PortDescriptor::from).collect();
        coordinator.start(ports).await
    };

    follow(&session, &mut events, json).await;

    let status = session.wait().await;
    let slots = coordinator.snapshot();

    if json {
        let report = ScanReport {
            session: session.id().0,
            status: status.to_string(),
            slots,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_slots(&slots);
    }

    match status {
        SessionStatus::Failed(reason) => anyhow::bail!("scan failed: {}", reason),
        _ => Ok(()),
    }
}

/// Print events until the session finishes; Ctrl-C cancels it
async fn follow(
    session: &ScanSession,
    events: &mut mpsc::UnboundedReceiver<ScanEvent>,
    quiet: bool,
) {
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if !quiet {
                    print_event(&event);
                }
                if event.is_terminal() && event.session() == session.id() {
                    break;
                }
            }
            _ = &mut ctrl_c, if !session.is_cancel_requested() => {
                info!("Interrupted, cancelling scan");
                session.cancel();
            }
        }
    }
}

fn print_event(event: &ScanEvent) {
    match event {
        ScanEvent::Progress {
            port, baud_rate, ..
        } => println!("  {} @ {} baud", port, baud_rate),
        ScanEvent::Found { record, slot, .. } => {
            let placement = match slot {
                Some(position) => format!("slot {}", position + 1),
                None => "no free slot".to_string(),
            };
            println!(
                "+ {}: {} #{} at {} baud ({})",
                record.port, record.kind, record.index, record.baud_rate, placement
            );
        }
        ScanEvent::PortExhausted { port, .. } => println!("- {}: no response", port),
        ScanEvent::Unrecognized { port, raw, reason, .. } => {
            println!("? {}: {:?} ({})", port, raw, reason)
        }
        ScanEvent::SessionError { reason, .. } => println!("! {}", reason),
        ScanEvent::SessionFinished { session, status } => {
            println!("Session {} {}", session, status)
        }
    }
}

fn print_slots(slots: &[Slot]) {
    let mut current = None;
    for slot in slots {
        if current != Some(&slot.kind) {
            println!("{}", slot.kind);
            current = Some(&slot.kind);
        }
        match &slot.state {
            SlotState::Occupied(record) => println!(
                "  {:>2}  #{} on {} @ {}",
                slot.position + 1,
                record.index,
                record.port,
                record.baud_rate
            ),
            SlotState::Empty => println!("  {:>2}  -", slot.position + 1),
        }
    }
}
