//! Core types for device sightings.

use core::fmt;
use core::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{RecordError, RecordResult};

/// Where a sighting came from.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new origins
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum SightingOrigin {
    /// Enumerated from the adapter's bonded (paired) devices at session start.
    Bonded,
    /// Reported by a live discovery broadcast while scanning.
    Broadcast,
}

impl SightingOrigin {
    /// Whether a sighting of this origin implies an established link.
    ///
    /// Bonded devices count as connected; a broadcast only proves the
    /// device is in range.
    #[must_use]
    pub fn implies_connected(self) -> bool {
        matches!(self, SightingOrigin::Bonded)
    }
}

impl fmt::Display for SightingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SightingOrigin::Bonded => write!(f, "bonded"),
            SightingOrigin::Broadcast => write!(f, "broadcast"),
        }
    }
}

/// Normalize a hardware address.
///
/// Trims surrounding whitespace and upper-cases ASCII letters so that
/// `aa:bb:cc:dd:ee:ff` and `AA:BB:CC:DD:EE:FF` key the same record.
/// Returns `None` when nothing is left.
///
/// # Examples
///
/// ```
/// use nearby_types::normalize_address;
///
/// assert_eq!(normalize_address(" aa:bb:cc "), Some("AA:BB:CC".to_string()));
/// assert_eq!(normalize_address("   "), None);
/// ```
#[must_use]
pub fn normalize_address(address: &str) -> Option<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_uppercase())
    }
}

/// Normalize an advertised device name.
///
/// Control characters (line breaks, tabs, escapes) become spaces, so a name
/// always fits on one line. Surrounding whitespace is trimmed and a blank
/// name counts as unknown.
///
/// # Examples
///
/// ```
/// use nearby_types::normalize_name;
///
/// assert_eq!(normalize_name(Some("Evil\nName".into())), Some("Evil Name".to_string()));
/// assert_eq!(normalize_name(Some(" \t ".into())), None);
/// ```
#[must_use]
pub fn normalize_name(name: Option<String>) -> Option<String> {
    name.map(|n| {
        n.chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect::<String>()
            .trim()
            .to_string()
    })
    .filter(|n| !n.is_empty())
}

/// A single observation of a device, before it is merged into a registry.
///
/// Fields are public so that adapters and tests can describe arbitrary
/// payloads; the factories below are the validated way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sighting {
    /// Hardware address (MAC on Linux/Windows, CoreBluetooth UUID on macOS).
    pub address: String,
    /// Advertised or cached device name, if known.
    pub name: Option<String>,
    /// Whether the device is known to be connected/bonded.
    pub is_connected: bool,
    /// Which input channel produced this sighting.
    pub origin: SightingOrigin,
}

impl Sighting {
    /// Build a sighting from raw platform fields.
    ///
    /// The address is normalized with [`normalize_address`]; a blank name is
    /// treated as unknown. The connection flag follows the origin.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyAddress`] if the address is missing or blank.
    pub fn from_raw(
        origin: SightingOrigin,
        address: Option<&str>,
        name: Option<String>,
    ) -> RecordResult<Self> {
        let address = address
            .and_then(normalize_address)
            .ok_or(RecordError::EmptyAddress)?;
        Ok(Self {
            address,
            name: normalize_name(name),
            is_connected: origin.implies_connected(),
            origin,
        })
    }

    /// Build a sighting for a bonded device.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyAddress`] if the address is blank.
    pub fn bonded(address: &str, name: Option<&str>) -> RecordResult<Self> {
        Self::from_raw(
            SightingOrigin::Bonded,
            Some(address),
            name.map(str::to_string),
        )
    }

    /// Build a sighting for a device found by a live broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyAddress`] if the address is blank.
    pub fn broadcast(address: &str, name: Option<&str>) -> RecordResult<Self> {
        Self::from_raw(
            SightingOrigin::Broadcast,
            Some(address),
            name.map(str::to_string),
        )
    }
}

/// Canonical record of a device seen during a session.
///
/// Two records are equal when their addresses are equal; the remaining
/// fields describe the latest known state of that device.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceRecord {
    /// Hardware address, never empty.
    pub address: String,
    /// Device name, if any sighting supplied one.
    pub name: Option<String>,
    /// Whether the device has been seen connected/bonded during this session.
    pub is_connected: bool,
    /// When the device was first seen (UTC).
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub first_seen: OffsetDateTime,
    /// When the device was most recently seen (UTC).
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub last_seen: OffsetDateTime,
}

impl DeviceRecord {
    /// Create the first record for a sighting observed at `seen_at`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyAddress`] if the sighting's address is blank.
    pub fn first_sighting(sighting: Sighting, seen_at: OffsetDateTime) -> RecordResult<Self> {
        let address = normalize_address(&sighting.address).ok_or(RecordError::EmptyAddress)?;
        Ok(Self {
            address,
            name: normalize_name(sighting.name),
            is_connected: sighting.is_connected,
            first_seen: seen_at,
            last_seen: seen_at,
        })
    }

    /// Display name, falling back to `"unknown"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }
}

impl PartialEq for DeviceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for DeviceRecord {}

impl Hash for DeviceRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}
