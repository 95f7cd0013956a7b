//! BLE provisioning library for SmartTank water-tank monitors.
//!
//! A SmartTank device is an ESP32 with an ultrasonic level sensor. Before it
//! reports levels it must learn the size of the tank and the price used for
//! cost estimates. This crate walks a device through that setup over
//! Bluetooth Low Energy.
//!
//! # Features
//!
//! - **Permission gate**: platform permission checks before any scan
//! - **Scanning**: time-boxed, cancellable, deduplicated device discovery
//! - **Connections**: retries with a configurable [`RetryPolicy`]
//! - **Commands**: text commands written to the control characteristic
//! - **Setup wizard**: the [`Provisioner`] state machine with persistence
//! - **Wi-Fi handoff**: optional, when the target network is in range
//!
//! # Setup steps
//!
//! | Step | Operation | Sends |
//! |------|-----------|-------|
//! | 1. Scanning | [`Provisioner::scan`] | |
//! | 2. Selecting | [`Provisioner::confirm_device`] | `SETUP_MODE` |
//! | 3. Configuring dimensions | [`Provisioner::submit_dimensions`] | `SET_TANK_DIMENSIONS` |
//! | 4. Configuring cost | [`Provisioner::submit_cost`] | `SET_COST` |
//! | 5. Finalizing | [`Provisioner::finalize`] | `SETUP_DONE` |
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use smarttank_core::{BleRadio, PermissionGate, Provisioner};
//! use smarttank_types::{CostConfig, CostKind, LengthUnit, MemoryStore, TankDimensions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let radio = Arc::new(BleRadio::new().await?);
//!     let store = Arc::new(MemoryStore::new());
//!     let mut wizard = Provisioner::new(radio, store, PermissionGate::desktop());
//!
//!     let devices = wizard.scan().await?.to_vec();
//!     let Some(device) = devices.first() else {
//!         return Ok(());
//!     };
//!     wizard.select_device(&device.identifier)?;
//!     wizard.confirm_device().await?;
//!     wizard
//!         .submit_dimensions(TankDimensions::new(150.0, LengthUnit::Cm, 60.0, LengthUnit::Cm))
//!         .await?;
//!     wizard
//!         .submit_cost(CostConfig::new(CostKind::Electricity, "20")?)
//!         .await?;
//!     wizard.finalize().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Testing without hardware
//!
//! [`MockRadio`] and [`MockLink`] implement the radio traits in memory with
//! failure injection, and [`MockPrompt`] answers permission requests.

#[cfg(feature = "api-client")]
pub mod api_client;
pub mod ble;
pub mod channel;
pub mod connection;
pub mod error;
pub mod events;
pub mod guard;
pub mod handoff;
pub mod mock;
pub mod permission;
pub mod provisioning;
pub mod retry;
pub mod scan;
pub mod traits;

// Core exports
pub use error::{Error, Result};
pub use provisioning::{AppState, ProvisioningSession, Provisioner, SetupFailure, SetupStep};
pub use traits::{Advertisement, AdvertisementStream, Link, Radio, RadioState};

pub use ble::{BleLink, BleRadio, create_identifier, format_peripheral_id};
pub use channel::{CommandChannel, PayloadEncoding};
pub use connection::ConnectionManager;
pub use events::{EventDispatcher, EventReceiver, EventSender, SetupEvent};
pub use guard::LinkGuard;
pub use handoff::{HandoffConfig, NetworkScanner, StaticNetworks, WifiHandoff};
pub use mock::{MockLink, MockPrompt, MockRadio};
pub use permission::{
    Permission, PermissionDecision, PermissionGate, PermissionOutcome, PermissionPrompt,
    RadioPlatform,
};
pub use retry::{Backoff, RetryPolicy};
pub use scan::{DiscoveredDevice, NameFilter, ScanEvent, ScanOptions, ScanStream, Scanner};

// Re-export from smarttank-types
pub use smarttank_types::uuid as uuids;
pub use smarttank_types::{
    Command, CostConfig, CostKind, KeyValueStore, LengthUnit, MemoryStore, NormalizedDimensions,
    TankDimensions, keys,
};
