//! Devices command: lists devices registered with the backend.

use anyhow::{Context, Result};

use smarttank_core::api_client::{DeviceApi, DeviceSummary};

use crate::cli::OutputFormat;
use crate::config::Config;

pub async fn cmd_devices(config: &Config, token: &str, format: OutputFormat) -> Result<()> {
    let server = config.server_config()?.context(
        "No backend configured. Add a [server] table with a url to the config file.",
    )?;
    let api = DeviceApi::new(server)?;
    let devices = api.list_devices(token).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&devices)?),
        OutputFormat::Text => print!("{}", format_devices(&devices)),
    }
    Ok(())
}

fn format_devices(devices: &[DeviceSummary]) -> String {
    if devices.is_empty() {
        return "No devices registered to this account.\n".to_string();
    }
    let mut out = String::new();
    for device in devices {
        let name = if device.name.is_empty() {
            "(unnamed)"
        } else {
            &device.name
        };
        out.push_str(&format!("{:<26}  {}\n", device.id, name));
    }
    out
}
