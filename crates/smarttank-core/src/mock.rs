//! Mock radio implementation for testing.
//!
//! This module provides a [`MockRadio`] and [`MockLink`] that implement the
//! [`Radio`] and [`Link`] traits without Bluetooth hardware, plus a
//! [`MockPrompt`] that answers permission requests from a script.
//!
//! # Features
//!
//! - **Scripted scans**: Queue advertisements and stream errors
//! - **Failure injection**: Fail a number of connects, discoveries or writes
//! - **Latency simulation**: Delay connects and writes to exercise timeouts
//! - **Recording**: Every payload written to a link is kept for inspection

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::channel::PayloadEncoding;
use crate::error::{Error, Result};
use crate::permission::{Permission, PermissionDecision, PermissionPrompt};
use crate::traits::{Advertisement, AdvertisementStream, Link, Radio, RadioState};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn mock_failure(message: &str) -> Error {
    Error::Bluetooth(btleplug::Error::Other(message.to_string().into()))
}

#[derive(Debug, Clone)]
enum ScriptItem {
    Advertisement(Advertisement),
    Error(String),
}

/// A mock Bluetooth adapter.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use smarttank_core::{Advertisement, MockRadio, ScanOptions, Scanner};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> smarttank_core::Result<()> {
/// let radio = Arc::new(MockRadio::new());
/// radio.push_advertisements([Advertisement::new("AA:BB", Some("ESP32_01"), Some(-55))]);
///
/// let options = ScanOptions::new().window(std::time::Duration::from_millis(50));
/// let devices = Scanner::new(radio).collect(&options, CancellationToken::new()).await?;
/// assert_eq!(devices.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MockRadio {
    state: Mutex<RadioState>,
    script: Mutex<Vec<ScriptItem>>,
    start_scan_count: AtomicU32,
    stop_scan_count: AtomicU32,
    connect_attempts: AtomicU32,
    /// Connects to fail before succeeding.
    connect_failures: AtomicU32,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
    /// Links whose service discovery should fail.
    discovery_failures: AtomicU32,
    /// Discovery latency given to new links, in milliseconds.
    discovery_latency_ms: AtomicU64,
    /// New links reject every write.
    fail_writes: AtomicBool,
    links: Mutex<Vec<MockLink>>,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRadio {
    /// A powered-on radio with nothing to discover.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RadioState::PoweredOn),
            script: Mutex::new(Vec::new()),
            start_scan_count: AtomicU32::new(0),
            stop_scan_count: AtomicU32::new(0),
            connect_attempts: AtomicU32::new(0),
            connect_failures: AtomicU32::new(0),
            connect_latency_ms: AtomicU64::new(0),
            discovery_failures: AtomicU32::new(0),
            discovery_latency_ms: AtomicU64::new(0),
            fail_writes: AtomicBool::new(false),
            links: Mutex::new(Vec::new()),
        }
    }

    /// Set the adapter power state.
    pub fn set_state(&self, state: RadioState) {
        *lock(&self.state) = state;
    }

    /// Queue advertisements delivered on every scan.
    pub fn push_advertisements<I>(&self, ads: I)
    where
        I: IntoIterator<Item = Advertisement>,
    {
        lock(&self.script).extend(ads.into_iter().map(ScriptItem::Advertisement));
    }

    /// Queue a stream error delivered on every scan.
    pub fn push_scan_error(&self, message: &str) {
        lock(&self.script).push(ScriptItem::Error(message.to_string()));
    }

    /// Remove every queued advertisement and error.
    pub fn clear_advertisements(&self) {
        lock(&self.script).clear();
    }

    /// Fail the next `count` connects. `u32::MAX` fails them all.
    pub fn set_connect_failures(&self, count: u32) {
        self.connect_failures.store(count, Ordering::Relaxed);
    }

    /// Make the service discovery of the next `count` links fail.
    pub fn set_discovery_failures(&self, count: u32) {
        self.discovery_failures.store(count, Ordering::Relaxed);
    }

    /// Set simulated connect latency.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Set simulated service discovery latency for links opened from now on.
    pub fn set_discovery_latency(&self, latency: Duration) {
        self.discovery_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Make links opened from now on reject writes.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Number of scans started.
    pub fn start_scan_count(&self) -> u32 {
        self.start_scan_count.load(Ordering::Relaxed)
    }

    /// Number of scans stopped.
    pub fn stop_scan_count(&self) -> u32 {
        self.stop_scan_count.load(Ordering::Relaxed)
    }

    /// Number of connect calls, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Every link opened so far, oldest first.
    pub fn links(&self) -> Vec<MockLink> {
        lock(&self.links).clone()
    }

    /// The most recently opened link.
    pub fn last_link(&self) -> Option<MockLink> {
        lock(&self.links).last().cloned()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Radio for MockRadio {
    type Link = MockLink;

    async fn state(&self) -> Result<RadioState> {
        Ok(*lock(&self.state))
    }

    async fn start_scan(&self) -> Result<AdvertisementStream> {
        self.start_scan_count.fetch_add(1, Ordering::Relaxed);
        let items: Vec<Result<Advertisement>> = lock(&self.script)
            .iter()
            .cloned()
            .map(|item| match item {
                ScriptItem::Advertisement(ad) => Ok(ad),
                ScriptItem::Error(message) => Err(Error::ScanFailed(message)),
            })
            .collect();
        // A real scan stays open until stopped.
        let stream = futures::stream::iter(items).chain(futures::stream::pending());
        Ok(Box::pin(stream))
    }

    async fn stop_scan(&self) -> Result<()> {
        self.stop_scan_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn connect(&self, identifier: &str) -> Result<MockLink> {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);

        let latency = self.connect_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if Self::take_failure(&self.connect_failures) {
            return Err(mock_failure("mock connect failure"));
        }

        let link = MockLink::new(identifier);
        if Self::take_failure(&self.discovery_failures) {
            link.set_fail_discovery(true);
        }
        link.inner.discovery_latency_ms.store(
            self.discovery_latency_ms.load(Ordering::Relaxed),
            Ordering::Relaxed,
        );
        link.set_fail_writes(self.fail_writes.load(Ordering::Relaxed));
        lock(&self.links).push(link.clone());
        Ok(link)
    }
}

#[derive(Debug)]
struct LinkState {
    identifier: String,
    connected: AtomicBool,
    fail_discovery: AtomicBool,
    fail_writes: AtomicBool,
    /// Simulated discovery latency in milliseconds (0 = no delay).
    discovery_latency_ms: AtomicU64,
    /// Simulated write latency in milliseconds (0 = no delay).
    write_latency_ms: AtomicU64,
    written: Mutex<Vec<Vec<u8>>>,
    disconnect_count: AtomicU32,
}

/// A mock connection. Clones share state.
#[derive(Debug, Clone)]
pub struct MockLink {
    inner: Arc<LinkState>,
}

impl MockLink {
    /// An open link to `identifier`.
    pub fn new(identifier: &str) -> Self {
        Self {
            inner: Arc::new(LinkState {
                identifier: identifier.to_string(),
                connected: AtomicBool::new(true),
                fail_discovery: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                discovery_latency_ms: AtomicU64::new(0),
                write_latency_ms: AtomicU64::new(0),
                written: Mutex::new(Vec::new()),
                disconnect_count: AtomicU32::new(0),
            }),
        }
    }

    /// Make service discovery fail.
    pub fn set_fail_discovery(&self, fail: bool) {
        self.inner.fail_discovery.store(fail, Ordering::Relaxed);
    }

    /// Make writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Set simulated write latency.
    pub fn set_write_latency(&self, latency: Duration) {
        self.inner
            .write_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Raw payloads written so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.inner.written).clone()
    }

    /// Payloads written so far, decoded to command text.
    pub fn commands(&self, encoding: PayloadEncoding) -> Vec<String> {
        lock(&self.inner.written)
            .iter()
            .filter_map(|payload| encoding.decode(payload))
            .collect()
    }

    /// Number of disconnect calls.
    pub fn disconnect_count(&self) -> u32 {
        self.inner.disconnect_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Link for MockLink {
    fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    async fn discover_services(&self) -> Result<()> {
        let latency = self.inner.discovery_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.inner.fail_discovery.load(Ordering::Relaxed) {
            return Err(Error::CharacteristicNotFound(
                smarttank_types::uuids::CONTROL.to_string(),
            ));
        }
        Ok(())
    }

    async fn write_control(&self, payload: &[u8]) -> Result<()> {
        let latency = self.inner.write_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.inner.connected.load(Ordering::Relaxed) {
            return Err(mock_failure("not connected"));
        }
        if self.inner.fail_writes.load(Ordering::Relaxed) {
            return Err(mock_failure("mock write failure"));
        }
        lock(&self.inner.written).push(payload.to_vec());
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Relaxed)
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.disconnect_count.fetch_add(1, Ordering::Relaxed);
        self.inner.connected.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Debug)]
struct PromptState {
    default: PermissionDecision,
    overrides: Mutex<HashMap<Permission, PermissionDecision>>,
    failure: Option<String>,
    requested: Mutex<Vec<Vec<Permission>>>,
}

/// A permission prompt that answers from a script. Clones share state.
#[derive(Debug, Clone)]
pub struct MockPrompt {
    inner: Arc<PromptState>,
}

impl MockPrompt {
    fn with_default(default: PermissionDecision, failure: Option<String>) -> Self {
        Self {
            inner: Arc::new(PromptState {
                default,
                overrides: Mutex::new(HashMap::new()),
                failure,
                requested: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Grant everything.
    pub fn granting_all() -> Self {
        Self::with_default(PermissionDecision::Granted, None)
    }

    /// Deny everything.
    pub fn denying_all() -> Self {
        Self::with_default(PermissionDecision::Denied, None)
    }

    /// Fail every request.
    pub fn failing(message: &str) -> Self {
        Self::with_default(PermissionDecision::Denied, Some(message.to_string()))
    }

    /// Answer `decision` for `permission`.
    #[must_use]
    pub fn with_decision(self, permission: Permission, decision: PermissionDecision) -> Self {
        self.set_decision(permission, decision);
        self
    }

    /// Change the answer for `permission`.
    pub fn set_decision(&self, permission: Permission, decision: PermissionDecision) {
        lock(&self.inner.overrides).insert(permission, decision);
    }

    /// Permission sets requested so far, one entry per request.
    pub fn requested(&self) -> Vec<Vec<Permission>> {
        lock(&self.inner.requested).clone()
    }
}

#[async_trait]
impl PermissionPrompt for MockPrompt {
    async fn request(
        &self,
        permissions: &[Permission],
    ) -> Result<HashMap<Permission, PermissionDecision>> {
        lock(&self.inner.requested).push(permissions.to_vec());
        if let Some(message) = &self.inner.failure {
            return Err(Error::Prompt(message.clone()));
        }
        let overrides = lock(&self.inner.overrides);
        Ok(permissions
            .iter()
            .map(|p| (*p, overrides.get(p).copied().unwrap_or(self.inner.default)))
            .collect())
    }
}
