//! Key-value persistence for confirmed setup values.
//!
//! The setup wizard writes each confirmed value under a fixed string key.
//! Values are plain strings; numbers use Rust's shortest round-trip
//! formatting and booleans are `"true"`/`"false"`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Keys written by the setup wizard.
pub mod keys {
    /// Identifier of the device most recently connected for setup.
    pub const LAST_CONNECTED_DEVICE: &str = "last_connected_device";
    /// Usable tank height in centimeters.
    pub const TANK_HEIGHT: &str = "tank_height";
    /// Unit the height was entered in.
    pub const TANK_HEIGHT_UNIT: &str = "tank_height_unit";
    /// Tank diameter in centimeters.
    pub const TANK_DIAMETER: &str = "tank_diameter";
    /// Unit the diameter was entered in.
    pub const TANK_DIAMETER_UNIT: &str = "tank_diameter_unit";
    /// `electricity` or `water`.
    pub const DEVICE_COST_TYPE: &str = "device_costType";
    /// Cost amount as entered.
    pub const DEVICE_COST: &str = "device_cost";
    /// `"true"` once the device acknowledged the end of setup.
    pub const DEVICE_SETUP_DONE: &str = "device_setup_done";
    /// `"true"` once the device was handed over to Wi-Fi.
    pub const WIFI_CONNECTED: &str = "wifi_connected";

    /// Every key the wizard may write, in write order.
    pub const ALL: [&str; 9] = [
        LAST_CONNECTED_DEVICE,
        TANK_HEIGHT,
        TANK_HEIGHT_UNIT,
        TANK_DIAMETER,
        TANK_DIAMETER_UNIT,
        DEVICE_COST_TYPE,
        DEVICE_COST,
        DEVICE_SETUP_DONE,
        WIFI_CONNECTED,
    ];
}

/// A string key-value store.
///
/// Implementations must make `set_many` atomic: either every pair is
/// written or none is.
pub trait KeyValueStore: Send + Sync {
    /// Error returned by the backing storage.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Write several values at once.
    fn set_many(&self, pairs: &[(&str, String)]) -> Result<(), Self::Error>;

    /// Delete a value. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;

    /// Delete every value.
    fn clear(&self) -> Result<(), Self::Error>;
}

/// In-memory store, used by tests and when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored pair.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    type Error = std::convert::Infallible;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_many(&self, pairs: &[(&str, String)]) -> Result<(), Self::Error> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in pairs {
            values.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), Self::Error> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.set(keys::DEVICE_SETUP_DONE, "true").unwrap();
        assert_eq!(
            store.get(keys::DEVICE_SETUP_DONE).unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(store.get(keys::WIFI_CONNECTED).unwrap(), None);
    }

    #[test]
    fn test_set_many_and_clear() {
        let store = MemoryStore::new();
        store
            .set_many(&[
                (keys::TANK_HEIGHT, "120".to_string()),
                (keys::TANK_HEIGHT_UNIT, "cm".to_string()),
            ])
            .unwrap();
        assert_eq!(store.len(), 2);

        store.remove(keys::TANK_HEIGHT).unwrap();
        store.remove("missing").unwrap();
        assert_eq!(store.len(), 1);

        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_cost_type_key_keeps_camel_case() {
        assert_eq!(keys::DEVICE_COST_TYPE, "device_costType");
        assert_eq!(keys::ALL.len(), 9);
    }
}
