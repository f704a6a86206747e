//! Mock radio adapter for testing.
//!
//! This module provides a [`MockAdapter`] that implements [`RadioAdapter`]
//! without Bluetooth hardware, so a whole scan session can be driven from
//! a test.
//!
//! # Features
//!
//! - **Bonded snapshot**: any list of raw devices, including malformed ones
//! - **Live pushes**: [`MockAdapter::push`] delivers a found-device
//!   notification while discovery is active
//! - **Failure injection**: make enumeration or discovery fail

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::traits::{DiscoveryStream, RadioAdapter, RawDevice};

/// A mock radio adapter for testing.
///
/// # Example
///
/// ```
/// use nearby_core::{MockAdapterBuilder, RadioAdapter, RawDevice};
///
/// #[tokio::main]
/// async fn main() {
///     let adapter = MockAdapterBuilder::new()
///         .bonded("11:22", Some("Watch"))
///         .build();
///
///     let bonded = adapter.bonded_devices().await.unwrap();
///     assert_eq!(bonded.len(), 1);
///
///     // Not discovering yet, so the push goes nowhere.
///     assert!(!adapter.push(RawDevice::new("33:44", None)));
/// }
/// ```
#[derive(Default)]
pub struct MockAdapter {
    bonded: Mutex<Vec<RawDevice>>,
    live: Mutex<Option<mpsc::UnboundedSender<RawDevice>>>,
    fail_bonded: AtomicBool,
    fail_discovery: AtomicBool,
    start_count: AtomicU32,
    stop_count: AtomicU32,
}

impl std::fmt::Debug for MockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAdapter")
            .field("discovering", &self.is_discovering())
            .field("start_count", &self.start_count())
            .field("stop_count", &self.stop_count())
            .finish()
    }
}

impl MockAdapter {
    /// Create a mock adapter with no bonded devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bonded-device snapshot.
    pub fn set_bonded(&self, devices: Vec<RawDevice>) {
        *self.bonded.lock().unwrap_or_else(PoisonError::into_inner) = devices;
    }

    /// Make `bonded_devices` fail.
    pub fn set_fail_bonded(&self, fail: bool) {
        self.fail_bonded.store(fail, Ordering::Relaxed);
    }

    /// Make `start_discovery` fail.
    pub fn set_fail_discovery(&self, fail: bool) {
        self.fail_discovery.store(fail, Ordering::Relaxed);
    }

    /// Deliver a found-device notification.
    ///
    /// Returns `false` if discovery is not active and the notification
    /// was discarded.
    pub fn push(&self, device: RawDevice) -> bool {
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        match live.as_ref() {
            Some(tx) => tx.send(device).is_ok(),
            None => false,
        }
    }

    /// Whether a discovery subscription is active.
    pub fn is_discovering(&self) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of `start_discovery` calls.
    pub fn start_count(&self) -> u32 {
        self.start_count.load(Ordering::Relaxed)
    }

    /// Number of `stop_discovery` calls.
    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RadioAdapter for MockAdapter {
    async fn bonded_devices(&self) -> Result<Vec<RawDevice>> {
        if self.fail_bonded.load(Ordering::Relaxed) {
            return Err(Error::adapter_unavailable("mock adapter is powered off"));
        }
        Ok(self
            .bonded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn start_discovery(&self) -> Result<DiscoveryStream> {
        self.start_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_discovery.load(Ordering::Relaxed) {
            return Err(Error::adapter_unavailable("mock discovery failure"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.live.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|device| (device, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.stop_count.fetch_add(1, Ordering::Relaxed);
        // Dropping the sender ends the stream once it is drained.
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// Builder for creating mock adapters with custom settings.
#[derive(Debug, Default)]
pub struct MockAdapterBuilder {
    bonded: Vec<RawDevice>,
    fail_bonded: bool,
    fail_discovery: bool,
}

impl MockAdapterBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bonded device.
    #[must_use]
    pub fn bonded(mut self, address: &str, name: Option<&str>) -> Self {
        self.bonded.push(RawDevice::new(address, name));
        self
    }

    /// Add an arbitrary raw handle to the bonded snapshot.
    #[must_use]
    pub fn bonded_raw(mut self, device: RawDevice) -> Self {
        self.bonded.push(device);
        self
    }

    /// Make enumeration fail.
    #[must_use]
    pub fn fail_bonded(mut self, fail: bool) -> Self {
        self.fail_bonded = fail;
        self
    }

    /// Make discovery fail.
    #[must_use]
    pub fn fail_discovery(mut self, fail: bool) -> Self {
        self.fail_discovery = fail;
        self
    }

    /// Build the mock adapter.
    #[must_use]
    pub fn build(self) -> MockAdapter {
        let adapter = MockAdapter::new();
        adapter.set_bonded(self.bonded);
        adapter.set_fail_bonded(self.fail_bonded);
        adapter.set_fail_discovery(self.fail_discovery);
        adapter
    }
}
