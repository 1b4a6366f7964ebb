use idscan_detect::{PortCatalog, PortDescriptor};

use crate::settings::Settings;

pub fn ports(settings: &Settings, all: bool) -> anyhow::Result<()> {
    let catalog = PortCatalog::with_config(settings.catalog.clone());

    if !all {
        let ports = catalog.list()?;
        if ports.is_empty() {
            println!("No serial ports to probe");
        }
        for port in &ports {
            println!("{}", describe(port));
        }
        return Ok(());
    }

    for port in &catalog.attached()? {
        let marker = if catalog.is_excluded(port) { "x" } else { " " };
        println!("{} {}", marker, describe(port));
    }
    Ok(())
}

fn describe(port: &PortDescriptor) -> String {
    match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => format!("{}  [{:04x}:{:04x}]", port.label(), vid, pid),
        _ => port.label(),
    }
}
