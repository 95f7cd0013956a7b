//! Writing text commands to the control characteristic.
//!
//! Delivery is at-most-once and unconfirmed: the write is issued without a
//! response and no acknowledgment is read back. [`CommandChannel::send`]
//! reports whether the write was handed to the radio, never whether the
//! device acted on it.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use smarttank_types::Command;

use crate::error::{Error, Result};
use crate::traits::Link;

/// How command text is turned into characteristic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    /// UTF-8 text, base64 encoded.
    #[default]
    Base64,
    /// UTF-8 text as is.
    Raw,
}

impl PayloadEncoding {
    /// Encode command text.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            PayloadEncoding::Base64 => STANDARD.encode(text).into_bytes(),
            PayloadEncoding::Raw => text.as_bytes().to_vec(),
        }
    }

    /// Decode bytes produced by [`PayloadEncoding::encode`].
    pub fn decode(self, payload: &[u8]) -> Option<String> {
        let bytes = match self {
            PayloadEncoding::Base64 => STANDARD.decode(payload).ok()?,
            PayloadEncoding::Raw => payload.to_vec(),
        };
        String::from_utf8(bytes).ok()
    }
}

impl fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadEncoding::Base64 => write!(f, "base64"),
            PayloadEncoding::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for PayloadEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "base64" => Ok(PayloadEncoding::Base64),
            "raw" | "text" => Ok(PayloadEncoding::Raw),
            other => Err(Error::invalid_config(format!(
                "unknown payload encoding '{}' (expected base64 or raw)",
                other
            ))),
        }
    }
}

/// Sends [`Command`]s over a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandChannel {
    encoding: PayloadEncoding,
    write_timeout: Duration,
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new(PayloadEncoding::default())
    }
}

impl CommandChannel {
    /// Channel with the given encoding and a five second write timeout.
    pub fn new(encoding: PayloadEncoding) -> Self {
        Self {
            encoding,
            write_timeout: Duration::from_secs(5),
        }
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// The payload encoding in use.
    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    /// Write `command`, reporting failures as errors.
    pub async fn try_send<L: Link + ?Sized>(&self, link: &L, command: &Command) -> Result<()> {
        let payload = self.encoding.encode(&command.to_wire());
        debug!(
            "Sending {} to {} ({} bytes, {})",
            command,
            link.identifier(),
            payload.len(),
            self.encoding
        );

        match timeout(self.write_timeout, link.write_control(&payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::CommandFailed(format!("{}: {}", command.name(), e))),
            Err(_) => Err(Error::timeout(
                format!("write {}", command.name()),
                self.write_timeout,
            )),
        }
    }

    /// Write `command` and return whether the write went out.
    ///
    /// Failures are logged and never propagated.
    pub async fn send<L: Link + ?Sized>(&self, link: &L, command: &Command) -> bool {
        match self.try_send(link, command).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send {} to {}: {}", command.name(), link.identifier(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLink;

    #[test]
    fn test_base64_payload() {
        let payload = PayloadEncoding::Base64.encode("SETUP_MODE");
        assert_eq!(payload, b"U0VUVVBfTU9ERQ==");
        assert_eq!(
            PayloadEncoding::Base64.decode(&payload).as_deref(),
            Some("SETUP_MODE")
        );
        assert_eq!(PayloadEncoding::Raw.encode("SETUP_DONE"), b"SETUP_DONE");
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!(
            "BASE64".parse::<PayloadEncoding>().unwrap(),
            PayloadEncoding::Base64
        );
        assert_eq!("raw".parse::<PayloadEncoding>().unwrap(), PayloadEncoding::Raw);
        assert!("hex".parse::<PayloadEncoding>().is_err());
    }

    #[tokio::test]
    async fn test_send_writes_encoded_command() {
        let link = MockLink::new("dev-1");
        let channel = CommandChannel::default();
        assert!(channel.send(&link, &Command::SetupMode).await);
        assert_eq!(link.written(), vec![b"U0VUVVBfTU9ERQ==".to_vec()]);
        assert_eq!(link.commands(PayloadEncoding::Base64), vec!["SETUP_MODE"]);
    }

    #[tokio::test]
    async fn test_write_failure_returns_false() {
        let link = MockLink::new("dev-1");
        link.set_fail_writes(true);
        let channel = CommandChannel::new(PayloadEncoding::Raw);
        assert!(!channel.send(&link, &Command::SetupDone).await);
        assert!(matches!(
            channel.try_send(&link, &Command::SetupDone).await,
            Err(Error::CommandFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout_returns_false() {
        let link = MockLink::new("dev-1");
        link.set_write_latency(Duration::from_secs(30));
        let channel = CommandChannel::new(PayloadEncoding::Raw).write_timeout(Duration::from_secs(1));
        assert!(!channel.send(&link, &Command::Pump(true)).await);
    }
}
