//! btleplug implementation of [`Radio`] and [`Link`].
//!
//! Device identification varies by platform:
//!
//! - **macOS**: CoreBluetooth hides MAC addresses, so devices are identified
//!   by a per-host UUID.
//! - **Linux/Windows**: devices are identified by their MAC address
//!   (e.g. `AA:BB:CC:DD:EE:FF`).

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::{Advertisement, AdvertisementStream, Link, Radio, RadioState};
use smarttank_types::uuids::CONTROL;

const UNKNOWN_ADDRESS: &str = "00:00:00:00:00:00";

/// Format a peripheral ID as a plain string.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// The identifier to connect with: the address, or the peripheral ID where
/// the platform hides addresses.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    identifier_from(address, &format_peripheral_id(peripheral_id))
}

fn identifier_from(address: &str, peripheral_id: &str) -> String {
    if address == UNKNOWN_ADDRESS {
        peripheral_id.to_string()
    } else {
        address.to_string()
    }
}

/// Whether a peripheral with `address` and `peripheral_id` is the one named by `wanted`.
///
/// Comparison ignores case, and addresses also match without separators.
fn matches_identifier(address: &str, peripheral_id: &str, wanted: &str) -> bool {
    let wanted = wanted.to_lowercase();
    if peripheral_id.to_lowercase() == wanted {
        return true;
    }
    let address = address.to_lowercase();
    address != UNKNOWN_ADDRESS
        && (address == wanted || address.replace(':', "") == wanted.replace(':', ""))
}

/// The local Bluetooth adapter.
#[derive(Debug, Clone)]
pub struct BleRadio {
    adapter: Adapter,
}

impl BleRadio {
    /// Use the first adapter on the system.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RadioUnavailable`] when the system has no adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::RadioUnavailable)?;
        Ok(Self::from_adapter(adapter))
    }

    /// Use a specific adapter.
    pub fn from_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    async fn find_peripheral(&self, identifier: &str) -> Result<Option<Peripheral>> {
        for peripheral in self.adapter.peripherals().await? {
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            let address = props.address.to_string();
            let peripheral_id = format_peripheral_id(&peripheral.id());
            if matches_identifier(&address, &peripheral_id, identifier) {
                debug!("Matched {} to peripheral {}", identifier, peripheral_id);
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }
}

async fn advertisement_for(adapter: &Adapter, id: &PeripheralId) -> Option<Result<Advertisement>> {
    let peripheral = match adapter.peripheral(id).await {
        Ok(peripheral) => peripheral,
        Err(e) => {
            debug!("Discovered peripheral vanished: {}", e);
            return None;
        }
    };
    match peripheral.properties().await {
        Ok(Some(props)) => {
            let identifier = create_identifier(&props.address.to_string(), id);
            Some(Ok(Advertisement::new(
                identifier,
                props.local_name.as_deref(),
                props.rssi,
            )))
        }
        Ok(None) => None,
        Err(e) => Some(Err(Error::ScanFailed(e.to_string()))),
    }
}

#[async_trait]
impl Radio for BleRadio {
    type Link = BleLink;

    async fn state(&self) -> Result<RadioState> {
        let state = match self.adapter.adapter_state().await? {
            CentralState::PoweredOn => RadioState::PoweredOn,
            CentralState::PoweredOff => RadioState::PoweredOff,
            CentralState::Unknown => RadioState::Unknown,
        };
        Ok(state)
    }

    async fn start_scan(&self) -> Result<AdvertisementStream> {
        let events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| Error::ScanFailed(e.to_string()))?;
        debug!("BLE scan started");

        let adapter = self.adapter.clone();
        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        advertisement_for(&adapter, &id).await
                    }
                    _ => None,
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn stop_scan(&self) -> Result<()> {
        self.adapter.stop_scan().await?;
        debug!("BLE scan stopped");
        Ok(())
    }

    async fn connect(&self, identifier: &str) -> Result<BleLink> {
        let peripheral = self
            .find_peripheral(identifier)
            .await?
            .ok_or(Error::Bluetooth(btleplug::Error::DeviceNotFound))?;

        peripheral.connect().await?;
        info!("Connected to {}", identifier);

        Ok(BleLink {
            peripheral,
            identifier: identifier.to_string(),
            control: RwLock::new(None),
        })
    }
}

/// A connection to a SmartTank device over btleplug.
pub struct BleLink {
    peripheral: Peripheral,
    identifier: String,
    control: RwLock<Option<Characteristic>>,
}

impl std::fmt::Debug for BleLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleLink")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Link for BleLink {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn discover_services(&self) -> Result<()> {
        self.peripheral.discover_services().await?;

        let control = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == CONTROL)
            .ok_or_else(|| Error::CharacteristicNotFound(CONTROL.to_string()))?;

        debug!("Found control characteristic on {}", self.identifier);
        *self.control.write().await = Some(control);
        Ok(())
    }

    async fn write_control(&self, payload: &[u8]) -> Result<()> {
        let guard = self.control.read().await;
        let control = guard.as_ref().ok_or_else(|| {
            Error::CharacteristicNotFound(format!("{} (services not discovered)", CONTROL))
        })?;
        self.peripheral
            .write(control, payload, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Err(e) = self.peripheral.disconnect().await {
            warn!("Disconnect from {} failed: {}", self.identifier, e);
            return Err(e.into());
        }
        *self.control.write().await = None;
        info!("Disconnected from {}", self.identifier);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_prefers_address() {
        assert_eq!(
            identifier_from("AA:BB:CC:DD:EE:FF", "hci0/dev_AA_BB"),
            "AA:BB:CC:DD:EE:FF"
        );
        assert_eq!(
            identifier_from(UNKNOWN_ADDRESS, "3f1b7c2e-0000-4d2a-9c1e-5b2e7f0a1c3d"),
            "3f1b7c2e-0000-4d2a-9c1e-5b2e7f0a1c3d"
        );
    }

    #[test]
    fn test_matches_address_ignoring_case_and_separators() {
        assert!(matches_identifier("AA:BB:CC:DD:EE:FF", "x", "aa:bb:cc:dd:ee:ff"));
        assert!(matches_identifier("AA:BB:CC:DD:EE:FF", "x", "aabbccddeeff"));
        assert!(!matches_identifier("AA:BB:CC:DD:EE:FF", "x", "aa:bb:cc:dd:ee:00"));
    }

    #[test]
    fn test_matches_peripheral_id_on_hidden_address() {
        let id = "3F1B7C2E-0000-4D2A-9C1E-5B2E7F0A1C3D";
        assert!(matches_identifier(UNKNOWN_ADDRESS, id, &id.to_lowercase()));
        // An all-zero address never matches by address.
        assert!(!matches_identifier(UNKNOWN_ADDRESS, id, UNKNOWN_ADDRESS));
    }
}
