//! The setup wizard.
//!
//! A [`Provisioner`] walks one device through setup:
//!
//! ```text
//! Scanning(1) -> Selecting(2) -> ConfiguringDimensions(3) -> ConfiguringCost(4) -> Finalizing(5) -> Done
//! ```
//!
//! Each operation is only valid in its step; calling it elsewhere returns
//! [`Error::InvalidTransition`] and changes nothing. A failed operation
//! records the failure in [`ProvisioningSession::last_error`] and leaves
//! the step where it was. Operations take `&mut self`, so two transitions
//! can never run at once.
//!
//! A step only advances once its command was written to the device; a
//! value is written to the [`KeyValueStore`] only after its command went
//! out. Writes are not acknowledged by the device (see [`CommandChannel`]).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use smarttank_types::{
    Command, CostConfig, KeyValueStore, NormalizedDimensions, TankDimensions, keys,
};

use crate::channel::{CommandChannel, PayloadEncoding};
use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, SetupEvent};
use crate::guard::LinkGuard;
use crate::handoff::WifiHandoff;
use crate::permission::{PermissionGate, PermissionOutcome};
use crate::retry::RetryPolicy;
use crate::scan::{DiscoveredDevice, ScanOptions, Scanner};
use crate::traits::Radio;

/// Steps of the setup wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    /// Looking for devices.
    #[default]
    Scanning,
    /// Choosing one of the discovered devices.
    Selecting,
    /// Entering the tank height and diameter.
    ConfiguringDimensions,
    /// Entering the cost.
    ConfiguringCost,
    /// Ready to finish.
    Finalizing,
    /// Setup complete.
    Done,
}

impl SetupStep {
    /// Number of steps shown to the user.
    pub const COUNT: u8 = 5;

    /// 1-based step number, `None` once done.
    pub fn number(self) -> Option<u8> {
        match self {
            SetupStep::Scanning => Some(1),
            SetupStep::Selecting => Some(2),
            SetupStep::ConfiguringDimensions => Some(3),
            SetupStep::ConfiguringCost => Some(4),
            SetupStep::Finalizing => Some(5),
            SetupStep::Done => None,
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SetupStep::Scanning => "scanning",
            SetupStep::Selecting => "selecting a device",
            SetupStep::ConfiguringDimensions => "configuring dimensions",
            SetupStep::ConfiguringCost => "configuring cost",
            SetupStep::Finalizing => "finalizing",
            SetupStep::Done => "done",
        };
        f.write_str(text)
    }
}

/// Foreground state of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// In the foreground.
    #[default]
    Active,
    /// Visible but not focused.
    Inactive,
    /// In the background.
    Background,
}

/// A recorded failure, kept on the session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupFailure {
    /// Human-readable message.
    pub message: String,
    /// The wizard advanced anyway.
    pub soft: bool,
    /// The user should be offered a link to the system settings.
    pub offers_settings_link: bool,
}

impl From<&Error> for SetupFailure {
    fn from(err: &Error) -> Self {
        Self {
            message: err.to_string(),
            soft: err.is_soft(),
            offers_settings_link: err.offers_settings_link(),
        }
    }
}

/// State of one run through the wizard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisioningSession {
    /// Current step.
    pub step: SetupStep,
    /// Devices found by the last scan.
    pub discovered: Vec<DiscoveredDevice>,
    /// Identifier chosen from `discovered`.
    pub selected_device: Option<String>,
    /// Dimensions sent to the device.
    pub dimensions: Option<NormalizedDimensions>,
    /// Cost sent to the device.
    pub cost: Option<CostConfig>,
    /// Most recent failure, cleared by the next successful operation.
    pub last_error: Option<SetupFailure>,
}

impl ProvisioningSession {
    /// Return to the initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Drives a device through setup.
pub struct Provisioner<R: Radio, S: KeyValueStore> {
    session: ProvisioningSession,
    radio: Arc<R>,
    gate: PermissionGate,
    scanner: Scanner<R>,
    connections: ConnectionManager<R>,
    channel: CommandChannel,
    store: Arc<S>,
    link: Option<LinkGuard<R::Link>>,
    handoff: Option<WifiHandoff>,
    scan_options: ScanOptions,
    scan_cancel: CancellationToken,
    events: EventDispatcher,
    app_state: AppState,
}

impl<R: Radio + 'static, S: KeyValueStore> Provisioner<R, S> {
    /// Create a wizard with the default retry policy, scan options and encoding.
    pub fn new(radio: Arc<R>, store: Arc<S>, gate: PermissionGate) -> Self {
        let events = EventDispatcher::default();
        Self {
            session: ProvisioningSession::default(),
            gate,
            scanner: Scanner::new(Arc::clone(&radio)),
            connections: ConnectionManager::new(Arc::clone(&radio), RetryPolicy::default())
                .with_events(events.clone()),
            radio,
            channel: CommandChannel::default(),
            store,
            link: None,
            handoff: None,
            scan_options: ScanOptions::default(),
            scan_cancel: CancellationToken::new(),
            events,
            app_state: AppState::Active,
        }
    }

    /// Use `policy` when connecting.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.connections = ConnectionManager::new(Arc::clone(&self.radio), policy)
            .with_events(self.events.clone());
        self
    }

    /// Use `options` when scanning.
    #[must_use]
    pub fn with_scan_options(mut self, options: ScanOptions) -> Self {
        self.scan_options = options;
        self
    }

    /// Encode command payloads with `encoding`.
    #[must_use]
    pub fn with_encoding(mut self, encoding: PayloadEncoding) -> Self {
        self.channel = CommandChannel::new(encoding);
        self
    }

    /// Hand the device over to Wi-Fi when finishing, if the network is in range.
    #[must_use]
    pub fn with_handoff(mut self, handoff: WifiHandoff) -> Self {
        self.handoff = Some(handoff);
        self
    }

    /// Current session state.
    pub fn session(&self) -> &ProvisioningSession {
        &self.session
    }

    /// Current step.
    pub fn step(&self) -> SetupStep {
        self.session.step
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Token that cancels the scan in progress.
    ///
    /// Cancelling ends the scan early with whatever was found so far.
    pub fn scan_cancellation(&self) -> CancellationToken {
        self.scan_cancel.clone()
    }

    /// Whether a device link is open.
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// Scan for devices and move to [`SetupStep::Selecting`].
    ///
    /// Allowed while scanning or selecting (to scan again). An empty result
    /// still advances, with a soft [`Error::NoDevicesFound`] recorded.
    #[tracing::instrument(level = "info", skip(self), fields(step = %self.session.step))]
    pub async fn scan(&mut self) -> Result<&[DiscoveredDevice]> {
        self.expect_step(&[SetupStep::Scanning, SetupStep::Selecting], "scan")?;

        self.session.discovered.clear();
        self.session.selected_device = None;

        let devices = match self.run_scan().await {
            Ok(devices) => devices,
            Err(e) => return self.fail(e),
        };

        for device in &devices {
            self.events.send(SetupEvent::Discovered {
                identifier: device.identifier.clone(),
                name: device.display_name.clone(),
                rssi: device.signal_strength,
            });
        }

        self.session.discovered = devices;
        self.session.last_error = if self.session.discovered.is_empty() {
            info!("No devices found; scan again to retry");
            Some(SetupFailure::from(&Error::NoDevicesFound))
        } else {
            None
        };
        self.transition(SetupStep::Selecting);
        Ok(&self.session.discovered)
    }

    async fn run_scan(&mut self) -> Result<Vec<DiscoveredDevice>> {
        self.gate.request_permissions().await.into_result()?;
        if self.scan_cancel.is_cancelled() {
            self.scan_cancel = CancellationToken::new();
        }
        self.scanner
            .collect(&self.scan_options, self.scan_cancel.clone())
            .await
    }

    /// Choose a device from the last scan.
    pub fn select_device(&mut self, identifier: &str) -> Result<()> {
        self.expect_step(&[SetupStep::Selecting], "select a device")?;

        if !self
            .session
            .discovered
            .iter()
            .any(|d| d.identifier == identifier)
        {
            return self.fail(Error::DeviceNotSelected(format!(
                "'{}' was not found by the last scan",
                identifier
            )));
        }

        debug!("Selected {}", identifier);
        self.session.selected_device = Some(identifier.to_string());
        self.session.last_error = None;
        Ok(())
    }

    /// Connect to the selected device and put it into setup mode.
    ///
    /// Persists the identifier as the last connected device. If `SETUP_MODE`
    /// cannot be written the link is closed and the step stays put.
    #[tracing::instrument(level = "info", skip(self), fields(device = ?self.session.selected_device))]
    pub async fn confirm_device(&mut self) -> Result<()> {
        self.expect_step(&[SetupStep::Selecting], "confirm the device")?;

        let Some(identifier) = self.session.selected_device.clone() else {
            return self.fail(Error::DeviceNotSelected("no device selected".to_string()));
        };

        self.release_link().await;

        let guard = match self.connections.connect(&identifier).await {
            Ok(guard) => guard,
            Err(e) => return self.fail(e),
        };

        self.link = Some(guard);
        if let Err(e) = self.send(&Command::SetupMode).await {
            self.release_link().await;
            return self.fail(e);
        }

        if let Err(e) = self.persist(&[(keys::LAST_CONNECTED_DEVICE, identifier.clone())]) {
            self.release_link().await;
            return self.fail(e);
        }

        self.session.last_error = None;
        self.transition(SetupStep::ConfiguringDimensions);
        Ok(())
    }

    /// Validate the tank size, send it, and persist it.
    ///
    /// Nothing is persisted unless the command was written. Nothing is sent unless the dimensions normalize to a positive height
    /// and diameter.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn submit_dimensions(
        &mut self,
        dimensions: TankDimensions,
    ) -> Result<NormalizedDimensions> {
        self.expect_step(&[SetupStep::ConfiguringDimensions], "submit dimensions")?;

        let normalized = match dimensions.normalize() {
            Ok(normalized) => normalized,
            Err(e) => return self.fail(e.into()),
        };

        if let Err(e) = self.send(&Command::SetTankDimensions(normalized)).await {
            return self.fail(e);
        }

        let pairs = [
            (keys::TANK_HEIGHT, normalized.height_cm.to_string()),
            (keys::TANK_HEIGHT_UNIT, dimensions.height_unit.to_string()),
            (keys::TANK_DIAMETER, normalized.diameter_cm.to_string()),
            (keys::TANK_DIAMETER_UNIT, dimensions.diameter_unit.to_string()),
        ];
        if let Err(e) = self.persist(&pairs) {
            return self.fail(e);
        }

        self.session.dimensions = Some(normalized);
        self.session.last_error = None;
        self.transition(SetupStep::ConfiguringCost);
        Ok(normalized)
    }

    /// Send and persist the cost.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn submit_cost(&mut self, cost: CostConfig) -> Result<()> {
        self.expect_step(&[SetupStep::ConfiguringCost], "submit the cost")?;

        if let Err(e) = self.send(&Command::SetCost(cost.clone())).await {
            return self.fail(e);
        }

        let pairs = [
            (keys::DEVICE_COST_TYPE, cost.kind().to_string()),
            (keys::DEVICE_COST, cost.amount().to_string()),
        ];
        if let Err(e) = self.persist(&pairs) {
            return self.fail(e);
        }

        self.session.cost = Some(cost);
        self.session.last_error = None;
        self.transition(SetupStep::Finalizing);
        Ok(())
    }

    /// Finish setup, optionally hand the device to Wi-Fi, and close the link.
    ///
    /// A failed `SETUP_DONE` write fails the operation and keeps the link.
    /// Handoff problems are logged and never fail the operation.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn finalize(&mut self) -> Result<()> {
        self.expect_step(&[SetupStep::Finalizing], "finalize")?;

        if let Err(e) = self.send(&Command::SetupDone).await {
            return self.fail(e);
        }

        if let Err(e) = self.persist(&[(keys::DEVICE_SETUP_DONE, "true".to_string())]) {
            return self.fail(e);
        }

        self.try_handoff().await;
        self.release_link().await;

        self.session.last_error = None;
        self.transition(SetupStep::Done);
        info!("Setup complete");
        Ok(())
    }

    async fn try_handoff(&mut self) {
        let Some(handoff) = self.handoff.clone() else {
            return;
        };
        let ssid = handoff.config().ssid.clone();

        match handoff.is_in_range().await {
            Ok(true) => {}
            Ok(false) => {
                info!("Wi-Fi network {} not in range; staying on Bluetooth", ssid);
                return;
            }
            Err(e) => {
                warn!("Could not list Wi-Fi networks: {}", e);
                return;
            }
        }

        if let Err(e) = self.send(&handoff.config().command()).await {
            warn!("Wi-Fi handoff to {} was not sent: {}", ssid, e);
            return;
        }

        info!("Device handed over to Wi-Fi network {}", ssid);
        self.release_link().await;
        if let Err(e) = self.persist(&[(keys::WIFI_CONNECTED, "true".to_string())]) {
            warn!("Failed to record Wi-Fi handoff: {}", e);
        }
        self.events.send(SetupEvent::WifiHandoff { ssid });
    }

    /// React to the host app changing foreground state.
    ///
    /// Returning to the foreground re-checks permissions, since the user may
    /// have changed them in the system settings. The link is left alone.
    pub async fn on_app_state(&mut self, state: AppState) -> Option<PermissionOutcome> {
        let previous = std::mem::replace(&mut self.app_state, state);
        if previous == AppState::Active || state != AppState::Active {
            return None;
        }

        debug!("App returned to the foreground; re-checking permissions");
        let outcome = self.gate.request_permissions().await;
        if let Err(e) = outcome.into_result() {
            warn!("Permissions lost while in the background: {}", e);
            self.session.last_error = Some(SetupFailure::from(&e));
        }
        Some(outcome)
    }

    /// Cancel any scan, close the link, and start over.
    pub async fn abandon(&mut self) {
        info!("Abandoning setup at step: {}", self.session.step);
        self.scan_cancel.cancel();
        self.scan_cancel = CancellationToken::new();
        self.release_link().await;

        let from = self.session.step;
        self.session.reset();
        if from != SetupStep::Scanning {
            self.events.send(SetupEvent::StepChanged {
                from,
                to: SetupStep::Scanning,
            });
        }
    }

    fn expect_step(&self, allowed: &[SetupStep], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.session.step) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                step: self.session.step,
                operation,
            })
        }
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        warn!("Setup step '{}' failed: {}", self.session.step, err);
        self.session.last_error = Some(SetupFailure::from(&err));
        self.events.send(SetupEvent::Failed {
            step: self.session.step,
            error: err.to_string(),
        });
        Err(err)
    }

    fn transition(&mut self, to: SetupStep) {
        let from = self.session.step;
        if from == to {
            return;
        }
        info!("Setup step: {} -> {}", from, to);
        self.session.step = to;
        self.events.send(SetupEvent::StepChanged { from, to });
    }

    fn persist(&self, pairs: &[(&str, String)]) -> Result<()> {
        self.store.set_many(pairs).map_err(Error::persistence)?;
        self.events.send(SetupEvent::Persisted {
            keys: pairs.iter().map(|(key, _)| (*key).to_string()).collect(),
        });
        Ok(())
    }

    async fn send(&self, command: &Command) -> Result<()> {
        let result = match &self.link {
            Some(link) => self.channel.try_send(link.link(), command).await,
            None => Err(Error::CommandFailed(format!(
                "{}: no open link",
                command.name()
            ))),
        };
        self.events.send(SetupEvent::CommandSent {
            command: command.to_string(),
            delivered: result.is_ok(),
        });
        result.map_err(|e| match e {
            Error::CommandFailed(_) => e,
            other => Error::CommandFailed(format!("{}: {}", command.name(), other)),
        })
    }

    async fn release_link(&mut self) {
        if let Some(link) = self.link.take()
            && let Err(e) = link.release().await
        {
            warn!("Failed to release link: {}", e);
        }
    }
}
