pub mod ports;
pub mod scan;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "idscan")]
#[command(about = "Find and identify devices on serial ports.")]
pub struct CommandLine {
    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the serial ports a scan would probe
    #[command(alias = "p")]
    Ports {
        /// Also list ports the catalog excludes
        #[arg(long)]
        all: bool,
    },
    /// Probe ports and identify the devices on them
    #[command(alias = "s")]
    Scan {
        /// Probe only these ports, in this order
        #[arg(long = "port", value_name = "NAME")]
        ports: Vec<String>,
        /// Print the final registry as JSON instead of events
        #[arg(long)]
        json: bool,
    },
    /// Show the effective settings
    Settings {
        /// Write them to the settings file
        #[arg(long)]
        save: bool,
    },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
