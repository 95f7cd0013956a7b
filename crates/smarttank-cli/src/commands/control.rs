//! Direct device commands outside the setup wizard.

use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::warn;

use smarttank_core::CommandChannel;
use smarttank_types::Command;

use super::{connect_device, open_radio, open_store, resolve_device};
use crate::cli::PumpState;
use crate::config::Config;
use crate::style;

pub async fn cmd_pump(
    config: &Config,
    device: Option<String>,
    state: PumpState,
    quiet: bool,
) -> Result<()> {
    let command = Command::Pump(state == PumpState::On);
    send_one(config, device, &command, quiet).await
}

pub async fn cmd_send(
    config: &Config,
    device: Option<String>,
    command: &str,
    quiet: bool,
) -> Result<()> {
    let command = Command::from_str(command)?;
    send_one(config, device, &command, quiet).await
}

async fn send_one(
    config: &Config,
    device: Option<String>,
    command: &Command,
    quiet: bool,
) -> Result<()> {
    let identifier = resolve_device(device, &open_store(config)?)?;
    let radio = open_radio().await?;
    let link = connect_device(radio, config, &identifier, quiet).await?;

    let result = CommandChannel::new(config.payload_encoding)
        .try_send(link.link(), command)
        .await
        .with_context(|| format!("Failed to send {}", command.name()));
    if let Err(e) = link.release().await {
        warn!("Disconnect from {} failed: {}", identifier, e);
    }
    result?;

    if !quiet {
        eprintln!(
            "{}",
            style::success(&format!("Sent {} to {}", command, identifier))
        );
    }
    Ok(())
}
