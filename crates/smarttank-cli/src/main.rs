//! SmartTank CLI: set up SmartTank water-tank monitors over Bluetooth.

mod cli;
mod commands;
mod config;
mod prompt;
mod style;
mod wifi;

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{
    cmd_config, cmd_devices, cmd_pump, cmd_reset, cmd_scan, cmd_send, cmd_setup, cmd_status,
};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Completions need no logging or config
    if let Commands::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "smarttank", &mut io::stdout());
        return Ok(());
    }

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::path);
    let config = Config::load_from(&config_path);
    let quiet = cli.quiet;

    match cli.command {
        Commands::Scan {
            timeout,
            all,
            format,
        } => cmd_scan(&config, timeout, all, format, quiet).await,
        Commands::Setup {
            device,
            values,
            no_wifi,
        } => cmd_setup(&config, device.device, values, no_wifi, quiet).await,
        Commands::Status { format } => cmd_status(&config, format),
        Commands::Pump { device, state } => cmd_pump(&config, device.device, state, quiet).await,
        Commands::Send { device, command } => {
            cmd_send(&config, device.device, &command, quiet).await
        }
        Commands::Reset { yes } => cmd_reset(&config, yes),
        Commands::Devices { token, format } => cmd_devices(&config, &token, format).await,
        Commands::Config { action } => cmd_config(action, &config_path),
        Commands::Completions { .. } => Ok(()),
    }
}
