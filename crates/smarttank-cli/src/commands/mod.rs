//! Command implementations for the CLI.

mod config;
mod control;
mod devices;
mod reset;
mod scan;
mod setup;
mod status;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use smarttank_core::{BleLink, BleRadio, ConnectionManager, LinkGuard, Scanner};
use smarttank_store::Store;
use smarttank_types::{KeyValueStore, keys};

use crate::config::Config;
use crate::style;

pub use config::{ConfigAction, cmd_config};
pub use control::{cmd_pump, cmd_send};
pub use devices::cmd_devices;
pub use reset::cmd_reset;
pub use scan::cmd_scan;
pub use setup::cmd_setup;
pub use status::cmd_status;

/// Whether prompts can be shown.
pub(crate) fn is_interactive() -> bool {
    io::stdin().is_terminal() && io::stderr().is_terminal()
}

pub(crate) fn confirm(prompt: &str, default: bool) -> Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()
        .context("Failed to read confirmation")
}

pub(crate) fn input(prompt: &str) -> Result<String> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact_text()
        .context("Failed to read input")
}

pub(crate) fn open_store(config: &Config) -> Result<Store> {
    let path = config.database_path();
    Store::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

pub(crate) async fn open_radio() -> Result<Arc<BleRadio>> {
    let radio = BleRadio::new()
        .await
        .context("No Bluetooth adapter available")?;
    Ok(Arc::new(radio))
}

/// A token cancelled by Ctrl-C.
pub(crate) fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received");
            child.cancel();
        }
    });
    token
}

/// The device named on the command line, or the last one set up.
pub(crate) fn resolve_device(device: Option<String>, store: &Store) -> Result<String> {
    if let Some(device) = device {
        return Ok(device);
    }
    match store.get(keys::LAST_CONNECTED_DEVICE)? {
        Some(device) => Ok(device),
        None => bail!(
            "No device specified and none set up yet.\n\
             Use --device <ADDRESS> or run 'smarttank setup' first."
        ),
    }
}

/// Scan briefly so the adapter knows the device, then connect.
pub(crate) async fn connect_device(
    radio: Arc<BleRadio>,
    config: &Config,
    identifier: &str,
    quiet: bool,
) -> Result<LinkGuard<BleLink>> {
    let spinner = style::spinner(format!("Connecting to {}...", identifier), quiet);

    let options = config.scan_options(None, true)?;
    let seen = Scanner::new(Arc::clone(&radio))
        .collect(&options, CancellationToken::new())
        .await;
    if let Err(e) = seen {
        debug!("Pre-connect scan failed: {}", e);
    }

    let result = ConnectionManager::new(radio, config.retry_policy()?)
        .connect(identifier)
        .await;
    style::finish(spinner);

    result.with_context(|| format!("Failed to connect to {}", identifier))
}
