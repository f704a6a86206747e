//! Platform-agnostic types for nearby Bluetooth device sightings.
//!
//! This crate provides the value types shared by the sighting pipeline
//! (nearby-core) and any shell that displays its output.
//!
//! # Features
//!
//! - [`Sighting`]: one observation of a device, as produced by an event source
//! - [`DeviceRecord`]: the canonical per-address record held by a registry
//! - [`SightingOrigin`]: bonded snapshot vs. live broadcast
//! - Error types for record construction
//!
//! # Example
//!
//! ```
//! use nearby_types::{Sighting, SightingOrigin};
//!
//! let sighting = Sighting::bonded("11:22:33:44:55:66", Some("Watch")).unwrap();
//! assert!(sighting.is_connected);
//! assert_eq!(sighting.origin, SightingOrigin::Bonded);
//! ```

pub mod error;
pub mod types;

pub use error::{RecordError, RecordResult};
pub use types::{DeviceRecord, Sighting, SightingOrigin, normalize_address, normalize_name};
