//! Serial peripheral discovery
//!
//! Probes serial ports across a ladder of baud rates, identifies the devices
//! that answer and assigns them to per-kind slots.

mod commands;
mod settings;

use commands::{ports, scan, CommandLine, Commands};
use settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    // Logs go to stderr so stdout stays clean for --json
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "idscan=info,idscan_protocol=info,idscan_detect=info,idscan_engine=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::load(commands.config.as_deref());

    match commands.command {
        Commands::Ports { all } => ports::ports(&settings, all),
        Commands::Scan { ports, json } => scan::scan(&settings, ports, json).await,
        Commands::Settings { save } => {
            println!("{}", settings.to_json()?);
            if save {
                let path = settings.save(commands.config.as_deref())?;
                eprintln!("Saved to {}", path.display());
            }
            Ok(())
        }
    }
}
