//! Visible Wi-Fi networks, as reported by NetworkManager.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use smarttank_core::{Error, NetworkScanner};

/// Lists networks with `nmcli`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NmcliNetworks;

#[async_trait]
impl NetworkScanner for NmcliNetworks {
    async fn visible_networks(&self) -> smarttank_core::Result<Vec<String>> {
        let output = Command::new("nmcli")
            .args(["-t", "-f", "SSID", "dev", "wifi", "list"])
            .output()
            .await
            .map_err(|e| Error::invalid_config(format!("cannot run nmcli: {}", e)))?;

        if !output.status.success() {
            return Err(Error::invalid_config(format!(
                "nmcli failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let ssids = parse_ssids(&String::from_utf8_lossy(&output.stdout));
        debug!("{} Wi-Fi networks visible", ssids.len());
        Ok(ssids)
    }
}

/// Parse terse `nmcli` output: one SSID per line, `:` escaped as `\:`.
fn parse_ssids(output: &str) -> Vec<String> {
    let mut ssids: Vec<String> = output
        .lines()
        .map(|line| line.trim().replace("\\:", ":"))
        .filter(|ssid| !ssid.is_empty())
        .collect();
    ssids.dedup();
    ssids
}
