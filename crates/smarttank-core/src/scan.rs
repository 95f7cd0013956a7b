//! Device discovery.
//!
//! [`Scanner::scan`] turns the radio's raw advertisement stream into a
//! stream of [`ScanEvent`]s: each matching device is reported once, and the
//! stream ends when the scan window elapses or the scan is cancelled. If
//! nothing matched, [`ScanEvent::NoDevicesFound`] is the last item.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::{Advertisement, AdvertisementStream, Radio, RadioState};

/// A SmartTank device found while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Identifier to connect with.
    pub identifier: String,
    /// Advertised name, or the identifier when the device has none.
    pub display_name: String,
    /// RSSI in dBm at first sight.
    pub signal_strength: Option<i16>,
}

impl From<Advertisement> for DiscoveredDevice {
    fn from(ad: Advertisement) -> Self {
        Self {
            display_name: ad.local_name.unwrap_or_else(|| ad.identifier.clone()),
            identifier: ad.identifier,
            signal_strength: ad.rssi,
        }
    }
}

/// Matches advertised names against a list of needles.
///
/// A name matches when it contains any needle, ignoring case. An empty
/// filter matches every device, named or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    needles: Vec<String>,
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::new(["ESP32", "SmartTank"])
    }
}

impl NameFilter {
    /// Filter on the given needles.
    pub fn new<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            needles: needles
                .into_iter()
                .map(|n| n.into().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// A filter that accepts every device.
    pub fn any() -> Self {
        Self {
            needles: Vec::new(),
        }
    }

    /// Whether an advertised name passes the filter.
    pub fn matches(&self, name: Option<&str>) -> bool {
        if self.needles.is_empty() {
            return true;
        }
        let Some(name) = name else {
            return false;
        };
        let name = name.to_lowercase();
        self.needles.iter().any(|needle| name.contains(needle))
    }
}

/// Options for scanning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// How long to scan.
    pub window: Duration,
    /// Which advertisements count as SmartTank devices.
    pub filter: NameFilter,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(5000),
            filter: NameFilter::default(),
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan window.
    #[must_use]
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the name filter.
    #[must_use]
    pub fn filter(mut self, filter: NameFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Check the options describe a usable scan.
    pub fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(Error::invalid_config("scan window must be non-zero"));
        }
        Ok(())
    }
}

/// Items produced by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A matching device, reported once per identifier.
    Discovered(DiscoveredDevice),
    /// The scan ended without a match.
    NoDevicesFound,
}

/// Stream returned by [`Scanner::scan`].
pub type ScanStream = Pin<Box<dyn Stream<Item = Result<ScanEvent>> + Send>>;

/// Scans for SmartTank devices.
pub struct Scanner<R: Radio> {
    radio: Arc<R>,
}

impl<R: Radio> Clone for Scanner<R> {
    fn clone(&self) -> Self {
        Self {
            radio: Arc::clone(&self.radio),
        }
    }
}

struct ScanState<R: Radio> {
    radio: Arc<R>,
    advertisements: AdvertisementStream,
    filter: NameFilter,
    seen: HashSet<String>,
    deadline: Instant,
    cancel: CancellationToken,
    finished: bool,
}

impl<R: Radio> ScanState<R> {
    async fn stop(&mut self) {
        self.finished = true;
        if let Err(e) = self.radio.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
    }

    /// Wait for the next item; `None` ends the stream.
    async fn next_event(&mut self) -> Option<Result<ScanEvent>> {
        if self.finished {
            return None;
        }
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Scan cancelled");
                    break;
                }
                _ = sleep_until(self.deadline) => {
                    break;
                }
                item = self.advertisements.next() => match item {
                    Some(Ok(ad)) => {
                        if !self.filter.matches(ad.local_name.as_deref()) {
                            continue;
                        }
                        if !self.seen.insert(ad.identifier.clone()) {
                            debug!("Suppressing repeat advertisement from {}", ad.identifier);
                            continue;
                        }
                        let device = DiscoveredDevice::from(ad);
                        info!("Found device: {} ({})", device.display_name, device.identifier);
                        return Some(Ok(ScanEvent::Discovered(device)));
                    }
                    Some(Err(e)) => {
                        warn!("Advertisement stream failed: {}", e);
                        self.stop().await;
                        let err = match e {
                            Error::ScanFailed(_) => e,
                            other => Error::ScanFailed(other.to_string()),
                        };
                        return Some(Err(err));
                    }
                    None => break,
                },
            }
        }

        self.stop().await;
        info!("Scan complete. Found {} device(s)", self.seen.len());
        if self.seen.is_empty() {
            Some(Ok(ScanEvent::NoDevicesFound))
        } else {
            None
        }
    }
}

impl<R: Radio + 'static> Scanner<R> {
    /// Create a scanner on `radio`.
    pub fn new(radio: Arc<R>) -> Self {
        Self { radio }
    }

    /// Start a scan.
    ///
    /// Fails with [`Error::RadioUnavailable`] unless the adapter is powered
    /// on. The radio scan is stopped when the returned stream ends.
    pub async fn scan(
        &self,
        filter: NameFilter,
        window: Duration,
        cancel: CancellationToken,
    ) -> Result<ScanStream> {
        match self.radio.state().await {
            Ok(RadioState::PoweredOn) => {}
            Ok(state) => {
                warn!("Bluetooth adapter is not powered on: {:?}", state);
                return Err(Error::RadioUnavailable);
            }
            Err(e) => {
                warn!("Could not read adapter state: {}", e);
                return Err(Error::RadioUnavailable);
            }
        }

        info!("Starting BLE scan for {:?}...", window);
        let advertisements = self.radio.start_scan().await?;
        let state = ScanState {
            radio: Arc::clone(&self.radio),
            advertisements,
            filter,
            seen: HashSet::new(),
            deadline: Instant::now() + window,
            cancel,
            finished: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            let event = state.next_event().await?;
            Some((event, state))
        });
        Ok(Box::pin(stream))
    }

    /// Run a scan to completion and return the devices found.
    ///
    /// An empty list means nothing matched; the first stream error is
    /// returned as is.
    pub async fn collect(
        &self,
        options: &ScanOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<DiscoveredDevice>> {
        options.validate()?;
        let mut stream = self
            .scan(options.filter.clone(), options.window, cancel)
            .await?;

        let mut devices = Vec::new();
        while let Some(event) = stream.next().await {
            match event? {
                ScanEvent::Discovered(device) => devices.push(device),
                ScanEvent::NoDevicesFound => {}
            }
        }
        Ok(devices)
    }
}
