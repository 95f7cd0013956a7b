//! End-to-end setup against the mock radio.

use std::sync::Arc;
use std::time::Duration;

use smarttank_core::{
    Advertisement, Error, MockRadio, PayloadEncoding, PermissionGate, Provisioner, RetryPolicy,
    SetupEvent, SetupStep,
};
use smarttank_types::{
    CostConfig, CostKind, KeyValueStore, LengthUnit, MemoryStore, TankDimensions, keys,
};

fn radio_with_one_device() -> Arc<MockRadio> {
    let radio = Arc::new(MockRadio::new());
    radio.push_advertisements([
        Advertisement::new("AA:BB:CC:DD:EE:01", Some("ESP32_Tank"), Some(-52)),
        Advertisement::new("AA:BB:CC:DD:EE:01", Some("ESP32_Tank"), Some(-50)),
        Advertisement::new("11:22:33:44:55:66", Some("Headphones"), Some(-70)),
    ]);
    radio
}

#[tokio::test(start_paused = true)]
async fn test_full_setup() {
    let radio = radio_with_one_device();
    radio.set_connect_failures(1);
    let store = Arc::new(MemoryStore::new());
    let mut wizard = Provisioner::new(
        Arc::clone(&radio),
        Arc::clone(&store),
        PermissionGate::desktop(),
    );
    let mut events = wizard.subscribe();

    let devices = wizard.scan().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].display_name, "ESP32_Tank");
    assert_eq!(wizard.step(), SetupStep::Selecting);

    wizard.select_device("AA:BB:CC:DD:EE:01").unwrap();
    wizard.confirm_device().await.unwrap();
    assert_eq!(radio.connect_attempts(), 2);
    assert_eq!(wizard.step(), SetupStep::ConfiguringDimensions);

    let normalized = wizard
        .submit_dimensions(TankDimensions::new(
            150.0,
            LengthUnit::Cm,
            60.0,
            LengthUnit::Cm,
        ))
        .await
        .unwrap();
    assert_eq!(normalized.height_cm, 120.0);

    wizard
        .submit_cost(CostConfig::new(CostKind::Electricity, "20").unwrap())
        .await
        .unwrap();
    wizard.finalize().await.unwrap();
    assert_eq!(wizard.step(), SetupStep::Done);
    assert!(wizard.session().last_error.is_none());

    let link = radio.last_link().unwrap();
    assert_eq!(
        link.commands(PayloadEncoding::Base64),
        vec![
            "SETUP_MODE",
            "SET_TANK_DIMENSIONS:120.0:60.0",
            "SET_COST:electricity:20",
            "SETUP_DONE",
        ]
    );
    assert_eq!(link.disconnect_count(), 1);

    let get = |key: &str| store.get(key).unwrap();
    assert_eq!(get(keys::DEVICE_SETUP_DONE).as_deref(), Some("true"));
    assert_eq!(
        get(keys::LAST_CONNECTED_DEVICE).as_deref(),
        Some("AA:BB:CC:DD:EE:01")
    );
    assert_eq!(get(keys::TANK_HEIGHT).as_deref(), Some("120"));
    assert_eq!(get(keys::TANK_DIAMETER).as_deref(), Some("60"));
    assert_eq!(get(keys::DEVICE_COST_TYPE).as_deref(), Some("electricity"));
    assert_eq!(get(keys::DEVICE_COST).as_deref(), Some("20"));
    assert_eq!(get(keys::WIFI_CONNECTED), None);

    let mut steps = Vec::new();
    let mut connected_after = None;
    while let Ok(event) = events.try_recv() {
        match event {
            SetupEvent::StepChanged { to, .. } => steps.push(to),
            SetupEvent::Connected { attempts, .. } => connected_after = Some(attempts),
            _ => {}
        }
    }
    assert_eq!(
        steps,
        vec![
            SetupStep::Selecting,
            SetupStep::ConfiguringDimensions,
            SetupStep::ConfiguringCost,
            SetupStep::Finalizing,
            SetupStep::Done,
        ]
    );
    assert_eq!(connected_after, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_device_uses_three_attempts() {
    let radio = radio_with_one_device();
    radio.set_connect_failures(u32::MAX);
    let mut wizard = Provisioner::new(
        Arc::clone(&radio),
        Arc::new(MemoryStore::new()),
        PermissionGate::desktop(),
    );

    wizard.scan().await.unwrap();
    wizard.select_device("AA:BB:CC:DD:EE:01").unwrap();

    let started = tokio::time::Instant::now();
    let err = wizard.confirm_device().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionFailed { attempts: 3, .. }));
    assert_eq!(radio.connect_attempts(), 3);
    // Two backoff sleeps of one second, none after the last attempt.
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(wizard.step(), SetupStep::Selecting);

    // The user can pick the device again once it is back in range.
    radio.set_connect_failures(0);
    wizard.confirm_device().await.unwrap();
    assert_eq!(wizard.step(), SetupStep::ConfiguringDimensions);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy() {
    let radio = radio_with_one_device();
    radio.set_connect_failures(1);
    let mut wizard = Provisioner::new(
        Arc::clone(&radio),
        Arc::new(MemoryStore::new()),
        PermissionGate::desktop(),
    )
    .with_retry_policy(RetryPolicy::once());

    wizard.scan().await.unwrap();
    wizard.select_device("AA:BB:CC:DD:EE:01").unwrap();
    let err = wizard.confirm_device().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionFailed { attempts: 1, .. }));
    assert_eq!(
        wizard.session().last_error.as_ref().map(|f| f.soft),
        Some(false)
    );
}

#[tokio::test(start_paused = true)]
async fn test_rescan_replaces_results() {
    let radio = radio_with_one_device();
    let mut wizard = Provisioner::new(
        Arc::clone(&radio),
        Arc::new(MemoryStore::new()),
        PermissionGate::desktop(),
    );

    wizard.scan().await.unwrap();
    wizard.select_device("AA:BB:CC:DD:EE:01").unwrap();

    radio.clear_advertisements();
    radio.push_advertisements([Advertisement::new(
        "AA:BB:CC:DD:EE:02",
        Some("SmartTank-2"),
        None,
    )]);
    let devices = wizard.scan().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].identifier, "AA:BB:CC:DD:EE:02");
    assert!(wizard.session().selected_device.is_none());
    assert!(wizard.select_device("AA:BB:CC:DD:EE:01").is_err());
}
