//! Trait abstractions over the Bluetooth radio.
//!
//! [`Radio`] and [`Link`] separate the provisioning logic from btleplug so
//! the wizard runs unchanged against real hardware ([`crate::ble`]) and the
//! in-memory mock ([`crate::mock`]).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;

/// Power state of the local Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// Ready to scan and connect.
    PoweredOn,
    /// Present but switched off.
    PoweredOff,
    /// The platform cannot tell.
    Unknown,
}

/// A single advertisement seen while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Stable identifier used to connect (MAC address, or a UUID on macOS).
    pub identifier: String,
    /// Advertised local name, if any.
    pub local_name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: Option<i16>,
}

impl Advertisement {
    /// Create an advertisement.
    pub fn new(identifier: impl Into<String>, local_name: Option<&str>, rssi: Option<i16>) -> Self {
        Self {
            identifier: identifier.into(),
            local_name: local_name.map(str::to_string),
            rssi,
        }
    }
}

/// Stream of advertisements produced by [`Radio::start_scan`].
pub type AdvertisementStream = Pin<Box<dyn Stream<Item = Result<Advertisement>> + Send>>;

/// A local Bluetooth adapter.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Connection type produced by [`Radio::connect`].
    type Link: Link;

    /// Current adapter power state.
    async fn state(&self) -> Result<RadioState>;

    /// Start scanning and return the advertisement stream.
    ///
    /// The stream may repeat an identifier; deduplication is the caller's job.
    async fn start_scan(&self) -> Result<AdvertisementStream>;

    /// Stop a scan started with [`Radio::start_scan`].
    async fn stop_scan(&self) -> Result<()>;

    /// Open a connection to a device seen while scanning.
    ///
    /// Services are not discovered yet; see [`Link::discover_services`].
    async fn connect(&self, identifier: &str) -> Result<Self::Link>;
}

/// An open connection to a SmartTank device.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Identifier the link was opened with.
    fn identifier(&self) -> &str;

    /// Discover GATT services and locate the control characteristic.
    async fn discover_services(&self) -> Result<()>;

    /// Write bytes to the control characteristic without waiting for a response.
    async fn write_control(&self, payload: &[u8]) -> Result<()>;

    /// Whether the link is still up.
    async fn is_connected(&self) -> bool;

    /// Close the connection.
    async fn disconnect(&self) -> Result<()>;
}
