//! Configuration file management.
//!
//! ```toml
//! scan_window_ms = 5000
//! name_filters = ["ESP32", "SmartTank"]
//! payload_encoding = "raw"
//! platform = "desktop"
//!
//! [connection]
//! max_attempts = 3
//! attempt_timeout_secs = 10
//! backoff_ms = 1000
//! exponential_backoff = false
//!
//! [handoff]
//! ssid = "HomeNet"
//! password = "secret"
//!
//! [server]
//! url = "http://192.168.10.12:5000/api"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use smarttank_core::api_client::ServerConfig;
use smarttank_core::{
    Backoff, HandoffConfig, NameFilter, PayloadEncoding, RadioPlatform, RetryPolicy, ScanOptions,
};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long a scan listens, in milliseconds
    pub scan_window_ms: u64,

    /// Advertised-name fragments that identify a SmartTank device
    pub name_filters: Vec<String>,

    /// How command text is encoded on the wire
    pub payload_encoding: PayloadEncoding,

    /// Permission model: `desktop` or `android:<version>`
    pub platform: String,

    /// Database path override
    pub database: Option<PathBuf>,

    /// Connection retry settings
    pub connection: ConnectionConfig,

    /// Wi-Fi network to hand the device over to after setup
    pub handoff: Option<HandoffSection>,

    /// Backend server
    pub server: Option<ServerSection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_window_ms: 5000,
            name_filters: vec!["ESP32".to_string(), "SmartTank".to_string()],
            payload_encoding: PayloadEncoding::default(),
            platform: "desktop".to_string(),
            database: None,
            connection: ConnectionConfig::default(),
            handoff: None,
            server: None,
        }
    }
}

/// `[connection]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub max_attempts: u32,
    pub attempt_timeout_secs: u64,
    pub backoff_ms: u64,
    pub exponential_backoff: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout_secs: 10,
            backoff_ms: 1000,
            exponential_backoff: false,
        }
    }
}

/// `[handoff]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffSection {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    /// Send the handoff without checking that the network is visible
    #[serde(default)]
    pub skip_range_check: bool,
}

/// `[server]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    pub url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("smarttank")
            .join("config.toml")
    }

    /// Load config from `path`, or return defaults if missing or invalid
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to parse config {}: {}", path.display(), e),
            },
            Err(e) => warn!("Failed to read config {}: {}", path.display(), e),
        }
        Self::default()
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Scan options, with `window` overriding the configured one
    pub fn scan_options(&self, window: Option<Duration>, all: bool) -> Result<ScanOptions> {
        let filter = if all {
            NameFilter::any()
        } else {
            NameFilter::new(self.name_filters.iter().cloned())
        };
        let options = ScanOptions::new()
            .window(window.unwrap_or(Duration::from_millis(self.scan_window_ms)))
            .filter(filter);
        options.validate().context("Invalid scan settings")?;
        Ok(options)
    }

    /// Retry policy from the `[connection]` table
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let c = &self.connection;
        let backoff_delay = Duration::from_millis(c.backoff_ms);
        let backoff = if c.exponential_backoff {
            Backoff::exponential(backoff_delay)
        } else {
            Backoff::Fixed(backoff_delay)
        };
        let policy = RetryPolicy::default()
            .max_attempts(c.max_attempts)
            .attempt_timeout(Duration::from_secs(c.attempt_timeout_secs))
            .backoff(backoff);
        policy.validate().context("Invalid [connection] settings")?;
        Ok(policy)
    }

    /// The platform whose permission model applies
    pub fn radio_platform(&self) -> Result<RadioPlatform> {
        self.platform
            .parse()
            .with_context(|| format!("Invalid platform '{}'", self.platform))
    }

    /// Handoff credentials, if configured
    pub fn handoff_config(&self) -> Result<Option<HandoffConfig>> {
        self.handoff
            .as_ref()
            .map(|h| HandoffConfig::new(&h.ssid, &h.password))
            .transpose()
            .context("Invalid [handoff] settings")
    }

    /// Backend server, if configured
    pub fn server_config(&self) -> Result<Option<ServerConfig>> {
        let Some(server) = &self.server else {
            return Ok(None);
        };
        let mut config = ServerConfig::new(&server.url).context("Invalid [server] url")?;
        if let Some(secs) = server.timeout_secs {
            config = config.timeout(Duration::from_secs(secs));
        }
        Ok(Some(config))
    }

    /// Where the setup database lives
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(smarttank_store::default_db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scan_window_ms, 5000);
        assert_eq!(config.payload_encoding, PayloadEncoding::Base64);
        assert_eq!(config.radio_platform().unwrap(), RadioPlatform::Desktop);
        assert!(config.handoff_config().unwrap().is_none());
        assert!(config.server_config().unwrap().is_none());

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            scan_window_ms = 8000
            payload_encoding = "raw"
            platform = "android:12"

            [connection]
            max_attempts = 5
            exponential_backoff = true

            [handoff]
            ssid = "HomeNet"
            password = "secret"

            [server]
            url = "http://192.168.10.12:5000/api/"
            "#,
        )
        .unwrap();

        assert_eq!(config.scan_window_ms, 8000);
        assert_eq!(config.payload_encoding, PayloadEncoding::Raw);
        assert_eq!(
            config.radio_platform().unwrap(),
            RadioPlatform::Android { version: 12 }
        );
        // Unset keys keep their defaults.
        assert_eq!(config.name_filters, vec!["ESP32", "SmartTank"]);
        assert_eq!(config.connection.attempt_timeout_secs, 10);

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert!(matches!(policy.backoff, Backoff::Exponential { .. }));

        let handoff = config.handoff_config().unwrap().unwrap();
        assert_eq!(handoff.ssid, "HomeNet");

        let server = config.server_config().unwrap().unwrap();
        assert_eq!(server.base_url, "http://192.168.10.12:5000/api");
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let config = Config {
            platform: "ios".to_string(),
            connection: ConnectionConfig {
                max_attempts: 0,
                ..ConnectionConfig::default()
            },
            ..Config::default()
        };
        assert!(config.radio_platform().is_err());
        assert!(config.retry_policy().is_err());
    }

    #[test]
    fn test_missing_or_broken_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert_eq!(Config::load_from(&missing), Config::default());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "scan_window_ms = \"soon\"").unwrap();
        assert_eq!(Config::load_from(&broken), Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smarttank").join("config.toml");

        let config = Config {
            scan_window_ms: 3000,
            handoff: Some(HandoffSection {
                ssid: "HomeNet".to_string(),
                password: "secret".to_string(),
                skip_range_check: true,
            }),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_scan_options() {
        let config = Config::default();
        let options = config
            .scan_options(Some(Duration::from_secs(2)), false)
            .unwrap();
        assert_eq!(options.window, Duration::from_secs(2));
        assert!(options.filter.matches(Some("ESP32_Tank")));
        assert!(!options.filter.matches(Some("Headphones")));

        let all = config.scan_options(None, true).unwrap();
        assert!(all.filter.matches(Some("Headphones")));
    }
}
