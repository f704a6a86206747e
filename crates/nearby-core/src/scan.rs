//! Radio adapter backed by btleplug.
//!
//! [`BtleplugAdapter`] implements [`RadioAdapter`] on top of the host
//! Bluetooth stack (BlueZ, CoreBluetooth or WinRT).
//!
//! # Bonded devices
//!
//! btleplug has no portable notion of bonding. The adapter treats the
//! peripherals the host stack already knows about, and that report an
//! active link when the session starts, as the bonded snapshot.
//!
//! # Device addresses
//!
//! On macOS the hardware address is hidden and reported as
//! `00:00:00:00:00:00`; the CoreBluetooth peripheral id is used instead.
//! On Linux and Windows the MAC address is used.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::traits::{DiscoveryStream, RadioAdapter, RawDevice};

/// Get the first available Bluetooth adapter.
///
/// # Errors
///
/// Returns [`Error::AdapterUnavailable`] if the host has no adapter, or a
/// Bluetooth error if the stack cannot be queried.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| Error::adapter_unavailable("no Bluetooth adapter found"))
}

/// Bluetooth adapter power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterState {
    /// Adapter is available and powered on.
    PoweredOn,
    /// Adapter is available but powered off. Discovery finds nothing.
    PoweredOff,
    /// The platform did not report a state.
    Unknown,
}

impl From<CentralState> for AdapterState {
    fn from(state: CentralState) -> Self {
        match state {
            CentralState::PoweredOn => AdapterState::PoweredOn,
            CentralState::PoweredOff => AdapterState::PoweredOff,
            _ => AdapterState::Unknown,
        }
    }
}

/// Format a peripheral ID as a string.
fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Pick the identifier for a peripheral: its address, unless the platform
/// hides it behind the all-zero placeholder.
fn identifier_for(address: BDAddr, fallback: impl FnOnce() -> String) -> String {
    if address == BDAddr::default() {
        fallback()
    } else {
        address.to_string()
    }
}

async fn describe_peripheral(peripheral: &Peripheral) -> RawDevice {
    let properties = match peripheral.properties().await {
        Ok(props) => props,
        Err(e) => {
            debug!("Could not read properties of {:?}: {}", peripheral.id(), e);
            None
        }
    };

    let address = properties
        .as_ref()
        .map(|p| p.address)
        .unwrap_or_else(|| peripheral.address());
    let identifier = identifier_for(address, || format_peripheral_id(&peripheral.id()));
    let name = properties.and_then(|p| p.local_name);

    RawDevice {
        address: Some(identifier).filter(|id| !id.is_empty()),
        name,
    }
}

/// A [`RadioAdapter`] over a btleplug [`Adapter`].
pub struct BtleplugAdapter {
    adapter: Adapter,
    /// Cancelled on `stop_discovery` to end the current discovery stream.
    discovery: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for BtleplugAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugAdapter")
            .field("discovering", &self.is_discovering())
            .finish_non_exhaustive()
    }
}

impl BtleplugAdapter {
    /// Wrap an existing btleplug adapter.
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            discovery: Mutex::new(None),
        }
    }

    /// Use the first adapter the host reports.
    ///
    /// # Errors
    ///
    /// See [`get_adapter`].
    pub async fn first_available() -> Result<Self> {
        Ok(Self::new(get_adapter().await?))
    }

    /// Human-readable description of the adapter.
    ///
    /// # Errors
    ///
    /// Returns a Bluetooth error if the stack cannot be queried.
    pub async fn describe(&self) -> Result<String> {
        Ok(self.adapter.adapter_info().await?)
    }

    /// Current power state of the adapter.
    ///
    /// # Errors
    ///
    /// Returns a Bluetooth error if the stack cannot be queried.
    pub async fn state(&self) -> Result<AdapterState> {
        Ok(self.adapter.adapter_state().await?.into())
    }

    /// Whether a discovery subscription is active.
    pub fn is_discovering(&self) -> bool {
        self.discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[async_trait]
impl RadioAdapter for BtleplugAdapter {
    async fn bonded_devices(&self) -> Result<Vec<RawDevice>> {
        let peripherals = self.adapter.peripherals().await?;
        let mut bonded = Vec::new();

        for peripheral in peripherals {
            match peripheral.is_connected().await {
                Ok(true) => bonded.push(describe_peripheral(&peripheral).await),
                Ok(false) => {}
                Err(e) => debug!("Skipping {:?}: {}", peripheral.id(), e),
            }
        }

        info!("Found {} bonded device(s)", bonded.len());
        Ok(bonded)
    }

    async fn start_discovery(&self) -> Result<DiscoveryStream> {
        // Subscribe before scanning so early discoveries are not missed.
        let events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let token = CancellationToken::new();
        let previous = self
            .discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        info!("Discovery started");

        let adapter = self.adapter.clone();
        let stream = events
            .take_until(token.cancelled_owned())
            .filter_map(move |event| {
                let adapter = adapter.clone();
                async move {
                    match event {
                        CentralEvent::DeviceDiscovered(id) => match adapter.peripheral(&id).await {
                            Ok(peripheral) => Some(describe_peripheral(&peripheral).await),
                            Err(e) => {
                                debug!("Discovered peripheral vanished before lookup: {}", e);
                                None
                            }
                        },
                        _ => None,
                    }
                }
            });

        Ok(Box::pin(stream))
    }

    async fn stop_discovery(&self) -> Result<()> {
        let token = self
            .discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match token {
            Some(token) => {
                token.cancel();
                self.adapter.stop_scan().await?;
                info!("Discovery stopped");
            }
            None => debug!("stop_discovery called while not discovering"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_state_from_central_state() {
        assert_eq!(AdapterState::from(CentralState::PoweredOn), AdapterState::PoweredOn);
        assert_eq!(AdapterState::from(CentralState::PoweredOff), AdapterState::PoweredOff);
        assert_eq!(AdapterState::from(CentralState::Unknown), AdapterState::Unknown);
    }

    #[test]
    fn test_identifier_uses_real_address() {
        let address = BDAddr::from([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let id = identifier_for(address, || "fallback".to_string());
        assert_eq!(id, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_identifier_falls_back_on_placeholder() {
        let id = identifier_for(BDAddr::default(), || "5A1F-UUID".to_string());
        assert_eq!(id, "5A1F-UUID");
    }
}
