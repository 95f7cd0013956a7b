//! Bluetooth UUIDs for SmartTank devices.
//!
//! The firmware exposes a single primary service with two characteristics:
//! a sensor characteristic the app reads (or subscribes to) and a control
//! characteristic that accepts text commands.

use uuid::{Uuid, uuid};

/// SmartTank primary GATT service.
pub const SMARTTANK_SERVICE: Uuid = uuid!("4fafc201-1fb5-459e-8fcc-c5c9c331914b");

/// Sensor data characteristic (read/notify).
pub const SENSOR_DATA: Uuid = uuid!("beb5483e-36e1-4688-b7f5-ea07361b26a8");

/// Control characteristic (write). Setup commands are written here.
pub const CONTROL: Uuid = uuid!("beb5483f-36e1-4688-b7f5-ea07361b26a8");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_uuid() {
        assert_eq!(
            SMARTTANK_SERVICE.to_string(),
            "4fafc201-1fb5-459e-8fcc-c5c9c331914b"
        );
    }

    #[test]
    fn test_characteristics_share_base() {
        // Sensor and control differ only in the first group.
        let sensor = SENSOR_DATA.to_string();
        let control = CONTROL.to_string();
        assert_eq!(&sensor[8..], &control[8..]);
        assert_ne!(SENSOR_DATA, CONTROL);
    }
}
