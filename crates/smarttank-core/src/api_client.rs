//! HTTP client for the SmartTank backend.
//!
//! Only device listing is implemented; account management lives elsewhere.
//!
//! # Example
//!
//! ```no_run
//! use smarttank_core::api_client::{DeviceApi, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = DeviceApi::new(ServerConfig::new("http://192.168.10.12:5000/api")?)?;
//! for device in api.list_devices("token").await? {
//!     println!("{} {}", device.id, device.name);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Error type for backend requests.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server is not reachable.
    #[error("Server not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server rejected the token.
    #[error("Not authorized; log in again")]
    Unauthorized,

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },
}

/// Result type for backend requests.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Where the backend lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL including the `/api` prefix, without a trailing slash.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl ServerConfig {
    /// Validate `base_url` and use a ten second timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ApiError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }
        Ok(Self {
            base_url,
            timeout: Duration::from_secs(10),
        })
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A device registered to the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Backend identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Client for the device endpoints.
#[derive(Debug, Clone)]
pub struct DeviceApi {
    client: Client,
    config: ServerConfig,
}

impl DeviceApi {
    /// Create a client for `config`.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Request)?;
        Ok(Self { client, config })
    }

    /// The server this client talks to.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    /// List the account's devices.
    pub async fn list_devices(&self, token: &str) -> Result<Vec<DeviceSummary>> {
        let url = self.url("devices");
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::NotReachable {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(ApiError::Request);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| error_message(&v))
            .unwrap_or_else(|| status.to_string());
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(|m| m.as_str()))
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config() {
        let config = ServerConfig::new("http://localhost:5000/api/").unwrap();
        assert_eq!(config.base_url, "http://localhost:5000/api");
        assert_eq!(config.timeout, Duration::from_secs(10));

        assert!(matches!(
            ServerConfig::new("localhost:5000"),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_device_url() {
        let api = DeviceApi::new(ServerConfig::new("https://tank.example/api").unwrap()).unwrap();
        assert_eq!(api.url("devices"), "https://tank.example/api/devices");
    }

    #[test]
    fn test_device_summary_json() {
        let devices: Vec<DeviceSummary> =
            serde_json::from_str(r#"[{"_id":"65f0","name":"Roof tank"},{"_id":"65f1"}]"#).unwrap();
        assert_eq!(devices[0].id, "65f0");
        assert_eq!(devices[0].name, "Roof tank");
        assert_eq!(devices[1].name, "");
    }

    #[test]
    fn test_error_message() {
        let body = serde_json::json!({"message": "Invalid token"});
        assert_eq!(error_message(&body).as_deref(), Some("Invalid token"));
        assert_eq!(error_message(&serde_json::json!({})), None);
    }
}
