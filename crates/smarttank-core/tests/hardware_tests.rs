//! Hardware tests for smarttank-core
//!
//! These tests require a powered-on adapter and a SmartTank device in setup
//! range, and should be run with:
//! ```
//! cargo test --package smarttank-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! Set `SMARTTANK_DEVICE` to the identifier of the device to connect to.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use smarttank_core::{
    BleRadio, Command, CommandChannel, ConnectionManager, Link, RetryPolicy, ScanOptions, Scanner,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Default timeout for BLE operations
const BLE_TIMEOUT: Duration = Duration::from_secs(30);

fn get_device() -> Option<String> {
    env::var("SMARTTANK_DEVICE").ok().filter(|s| !s.is_empty())
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_scan_finds_devices() {
    let radio = Arc::new(BleRadio::new().await.expect("no Bluetooth adapter"));
    let options = ScanOptions::new().window(Duration::from_secs(10));

    let devices = timeout(
        BLE_TIMEOUT,
        Scanner::new(radio).collect(&options, CancellationToken::new()),
    )
    .await
    .expect("scan timed out")
    .expect("scan failed");

    println!("Found {} devices", devices.len());
    for device in &devices {
        println!(
            "  {} ({}) {:?} dBm",
            device.display_name, device.identifier, device.signal_strength
        );
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_connect_and_request_config() {
    let Some(identifier) = get_device() else {
        println!("SMARTTANK_DEVICE not set, skipping");
        return;
    };

    let radio = Arc::new(BleRadio::new().await.expect("no Bluetooth adapter"));
    // Populate the adapter's peripheral cache.
    Scanner::new(Arc::clone(&radio))
        .collect(
            &ScanOptions::new().window(Duration::from_secs(5)),
            CancellationToken::new(),
        )
        .await
        .expect("scan failed");

    let guard = ConnectionManager::new(radio, RetryPolicy::default())
        .connect(&identifier)
        .await
        .expect("connect failed");
    assert!(guard.is_connected().await);

    let sent = CommandChannel::default()
        .send(guard.link(), &Command::GetConfig)
        .await;
    println!("GET_CONFIG sent: {}", sent);

    guard.release().await.expect("disconnect failed");
}
