//! Collaborator abstractions consumed by a scan session.
//!
//! The session never talks to a Bluetooth stack or a permission system
//! directly. It goes through these traits, which are implemented by
//! [`crate::scan::BtleplugAdapter`] for real hardware and by
//! [`crate::mock::MockAdapter`] for tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;

/// A device handle as reported by the platform, before validation.
///
/// Platforms can report devices without a usable address (for example a
/// broadcast whose payload was truncated); such handles are dropped by the
/// event sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDevice {
    /// Hardware address, if the platform supplied one.
    pub address: Option<String>,
    /// Device name, if the platform supplied one.
    pub name: Option<String>,
}

impl RawDevice {
    /// Create a raw handle with an address and optional name.
    pub fn new(address: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            address: Some(address.into()),
            name: name.map(str::to_string),
        }
    }

    /// Create a raw handle with no address.
    pub fn without_address(name: Option<&str>) -> Self {
        Self {
            address: None,
            name: name.map(str::to_string),
        }
    }
}

/// Push stream of raw devices delivered while discovery is active.
pub type DiscoveryStream = Pin<Box<dyn Stream<Item = RawDevice> + Send>>;

/// Reports whether the radio-access capability has been granted.
///
/// Any `Fn() -> bool` closure is an authorization, which keeps shells and
/// tests free of boilerplate:
///
/// ```
/// use nearby_core::Authorization;
///
/// let granted = || true;
/// assert!(granted.authorized());
/// ```
pub trait Authorization: Send + Sync {
    /// Whether the session may use the radio.
    fn authorized(&self) -> bool;
}

impl<F> Authorization for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn authorized(&self) -> bool {
        self()
    }
}

/// The radio adapter a session enumerates and subscribes to.
#[async_trait]
pub trait RadioAdapter: Send + Sync {
    /// Enumerate the devices bonded (paired) with the adapter.
    ///
    /// The result is a finite snapshot taken at call time.
    async fn bonded_devices(&self) -> Result<Vec<RawDevice>>;

    /// Start discovery and register for found-device notifications.
    ///
    /// The returned stream yields one item per notification for as long as
    /// discovery stays active. It ends after [`RadioAdapter::stop_discovery`].
    async fn start_discovery(&self) -> Result<DiscoveryStream>;

    /// Stop discovery and unregister.
    ///
    /// Calling this when discovery is not active must succeed.
    async fn stop_discovery(&self) -> Result<()>;
}
