//! Scan command implementation.

use std::time::Duration;

use anyhow::{Context, Result};

use smarttank_core::{DiscoveredDevice, Scanner};

use super::{ctrl_c_token, open_radio};
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::style;

pub async fn cmd_scan(
    config: &Config,
    timeout: Option<u64>,
    all: bool,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let options = config.scan_options(timeout.map(Duration::from_secs), all)?;

    let gate = super::setup::permission_gate(config)?;
    gate.request_permissions().await.into_result()?;

    let radio = open_radio().await?;
    let spinner = style::spinner(
        format!(
            "Scanning for SmartTank devices... ({}s, Ctrl-C to stop)",
            options.window.as_secs()
        ),
        quiet || format != OutputFormat::Text,
    );
    let devices = Scanner::new(radio)
        .collect(&options, ctrl_c_token())
        .await;
    style::finish(spinner);
    let devices = devices.context("Failed to scan for devices")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&devices)?),
        OutputFormat::Text => print!("{}", format_devices(&devices, !quiet)),
    }
    Ok(())
}

fn format_devices(devices: &[DiscoveredDevice], tips: bool) -> String {
    if devices.is_empty() {
        let mut out = String::from("No SmartTank devices found.\n");
        if tips {
            out.push_str("Make sure the device is powered on and in setup range.\n");
        }
        return out;
    }

    let width = devices
        .iter()
        .map(|d| d.display_name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = format!("{:<width$}  {:<20}  SIGNAL\n", "NAME", "IDENTIFIER");
    for device in devices {
        out.push_str(&format!(
            "{:<width$}  {:<20}  {}\n",
            device.display_name,
            device.identifier,
            style::rssi(device.signal_strength),
        ));
    }
    if tips {
        out.push_str("\nRun 'smarttank setup --device <IDENTIFIER>' to set one up.\n");
    }
    out
}
