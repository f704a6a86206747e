//! Hardware integration tests for nearby-core
//!
//! These tests require a Bluetooth adapter and should be run with:
//! ```text
//! cargo test --package nearby-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! Set `NEARBY_SCAN_SECS` to change how long the live scan runs (default 10).

use std::env;
use std::sync::Arc;
use std::time::Duration;

use nearby_core::{
    BtleplugAdapter, MemorySink, RadioAdapter, ScanSessionController, SessionState, SightingLogger,
};
use tokio::time::timeout;

/// Default timeout for adapter operations
const BLE_TIMEOUT: Duration = Duration::from_secs(30);

fn scan_duration() -> Duration {
    let secs = env::var("NEARBY_SCAN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);
    Duration::from_secs(secs)
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_adapter_is_available() {
    let adapter = timeout(BLE_TIMEOUT, BtleplugAdapter::first_available())
        .await
        .expect("timed out")
        .expect("no adapter");
    println!("Adapter: {}", adapter.describe().await.unwrap());
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_bonded_devices() {
    let adapter = BtleplugAdapter::first_available().await.unwrap();
    let bonded = timeout(BLE_TIMEOUT, adapter.bonded_devices())
        .await
        .expect("timed out")
        .unwrap();

    println!("Found {} bonded devices", bonded.len());
    for device in bonded {
        println!(
            "  {} ({})",
            device.name.as_deref().unwrap_or("Unknown"),
            device.address.as_deref().unwrap_or("-")
        );
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_live_session() {
    let adapter = Arc::new(BtleplugAdapter::first_available().await.unwrap());
    let sink = MemorySink::new();
    let logger = SightingLogger::spawn(sink.clone(), SightingLogger::DEFAULT_QUEUE_CAPACITY).unwrap();
    let mut session = ScanSessionController::new(adapter.clone(), Arc::new(|| true), logger);

    timeout(BLE_TIMEOUT, session.start())
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(session.state(), SessionState::Scanning);
    assert!(adapter.is_discovering());

    tokio::time::sleep(scan_duration()).await;
    session.stop().await;
    assert!(!adapter.is_discovering());

    session.logger().flush().await;
    for line in sink.lines() {
        println!("{}", line);
    }
    println!("{:?}", session.stats());
}
