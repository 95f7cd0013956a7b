//! Handing a provisioned device over to Wi-Fi.
//!
//! After setup the device can join a Wi-Fi network and report over the
//! network instead of Bluetooth. The handoff only happens when the
//! configured network is currently visible.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use smarttank_types::Command;

use crate::error::{Error, Result};

/// Credentials of the network the device should join.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Network name.
    pub ssid: String,
    /// Network passphrase.
    pub password: String,
}

impl fmt::Debug for HandoffConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffConfig")
            .field("ssid", &self.ssid)
            .field("password", &"***")
            .finish()
    }
}

impl HandoffConfig {
    /// Validate and create handoff credentials.
    ///
    /// The firmware splits its command on `:`, so the SSID must not contain one.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let ssid = ssid.into();
        if ssid.trim().is_empty() {
            return Err(Error::invalid_config("Wi-Fi SSID must not be empty"));
        }
        if ssid.contains(':') {
            return Err(Error::invalid_config("Wi-Fi SSID must not contain ':'"));
        }
        Ok(Self {
            ssid,
            password: password.into(),
        })
    }

    /// The command that hands the device over.
    pub fn command(&self) -> Command {
        Command::ConnectWifi {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
        }
    }
}

/// Lists Wi-Fi networks visible from this host.
#[async_trait]
pub trait NetworkScanner: Send + Sync {
    /// SSIDs currently in range.
    async fn visible_networks(&self) -> Result<Vec<String>>;
}

/// A fixed list of visible networks.
#[derive(Debug, Clone, Default)]
pub struct StaticNetworks {
    ssids: Vec<String>,
}

impl StaticNetworks {
    /// Report `ssids` as visible.
    pub fn new<I, S>(ssids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ssids: ssids.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl NetworkScanner for StaticNetworks {
    async fn visible_networks(&self) -> Result<Vec<String>> {
        Ok(self.ssids.clone())
    }
}

/// A handoff target together with the scanner that checks it is in range.
#[derive(Clone)]
pub struct WifiHandoff {
    config: HandoffConfig,
    scanner: Arc<dyn NetworkScanner>,
}

impl fmt::Debug for WifiHandoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiHandoff")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WifiHandoff {
    /// Create a handoff.
    pub fn new(config: HandoffConfig, scanner: Arc<dyn NetworkScanner>) -> Self {
        Self { config, scanner }
    }

    /// The target network.
    pub fn config(&self) -> &HandoffConfig {
        &self.config
    }

    /// Whether the target network is visible.
    pub async fn is_in_range(&self) -> Result<bool> {
        let networks = self.scanner.visible_networks().await?;
        Ok(networks.iter().any(|ssid| *ssid == self.config.ssid))
    }
}
