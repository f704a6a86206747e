//! Error types for nearby-core.
//!
//! This module defines the errors a scan session can surface to its owner.
//! Per-event problems (a malformed broadcast, a failed sink write) are never
//! returned as errors; they are logged and counted in [`crate::metrics`] so
//! that a single bad event cannot end a session.
//!
//! | Error | Raised by | Effect on the session |
//! |-------|-----------|-----------------------|
//! | [`Error::InvalidRecord`] | [`crate::DeviceRegistry::upsert`] | Sighting rejected, registry unchanged |
//! | [`Error::Unauthorized`] | [`crate::ScanSessionController::start`] | Controller stays `Idle` |
//! | [`Error::AdapterUnavailable`] | [`crate::scan::get_adapter`] | No session can be built |
//! | [`Error::Bluetooth`] | adapter collaborators | `start()` fails before enumerating |
//! | [`Error::InvalidState`] | [`crate::ScanSessionController::start`] | No change |

use thiserror::Error;

use nearby_types::RecordError;

use crate::session::SessionState;

/// Errors that can occur in the sighting pipeline.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A sighting could not be stored because its record is invalid.
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    /// The radio-access capability has not been granted.
    #[error("Bluetooth access is not authorized")]
    Unauthorized,

    /// No usable Bluetooth adapter is present.
    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Bluetooth Low Energy error from the platform stack.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// An operation was attempted in a state that does not allow it.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the session was in.
        state: SessionState,
    },

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an adapter-unavailable error.
    pub fn adapter_unavailable(reason: impl Into<String>) -> Self {
        Self::AdapterUnavailable(reason.into())
    }

    /// Create an invalid-state error.
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Self::InvalidState { operation, state }
    }
}

/// Result type alias using nearby-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(RecordError::EmptyAddress);
        assert_eq!(err.to_string(), "Invalid record: device address is empty");

        let err = Error::Unauthorized;
        assert_eq!(err.to_string(), "Bluetooth access is not authorized");

        let err = Error::adapter_unavailable("no adapters found");
        assert!(err.to_string().contains("no adapters found"));

        let err = Error::invalid_state("start", SessionState::Stopped);
        assert_eq!(err.to_string(), "Cannot start while session is stopped");
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("sink closed"));
    }
}
