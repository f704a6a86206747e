//! Error types for record construction in nearby-types.

use thiserror::Error;

/// Errors that can occur when building a device record or sighting.
///
/// This error type is platform-agnostic and does not include
/// Bluetooth-specific errors (those belong in nearby-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RecordError {
    /// The hardware address was missing, empty, or only whitespace.
    #[error("device address is empty")]
    EmptyAddress,
}

/// Result type alias using nearby-types' RecordError type.
pub type RecordResult<T> = std::result::Result<T, RecordError>;
