//! Sighting pipeline for nearby Bluetooth devices.
//!
//! This crate turns the two ways a host learns about Bluetooth devices (the
//! bonded devices it already knows, and live discovery broadcasts) into a
//! single de-duplicated registry and one log line per sighting.
//!
//! # Features
//!
//! - **Device registry**: one record per address, with first/last seen
//!   timestamps, name preservation and monotonic connection status
//! - **Event sources**: bonded snapshot and live discovery, with malformed
//!   events dropped and counted
//! - **Non-blocking logger**: sightings are formatted and queued for a
//!   writer thread, so a slow sink never stalls ingestion
//! - **Scan sessions**: `Idle -> Enumerating -> Scanning -> Stopped`
//!   lifecycle with idempotent stop
//! - **btleplug adapter**: runs a session against the host Bluetooth stack
//! - **Mock adapter**: runs a session without hardware
//!
//! # Pipeline
//!
//! ```text
//! RadioAdapter ──bonded──► BondedSnapshotSource ─┐
//!              ──live────► LiveScanSource ───────┤
//!                                                ▼
//!                               DeviceRegistry::upsert
//!                                                ▼
//!                      SightingLogger::record ─► LogSink (writer thread)
//!                                                ▼
//!                               SightingEvent broadcast
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use nearby_core::{BtleplugAdapter, ConsoleSink, ScanSessionController, SightingLogger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = Arc::new(BtleplugAdapter::first_available().await?);
//!     let logger = SightingLogger::spawn(ConsoleSink, SightingLogger::DEFAULT_QUEUE_CAPACITY)?;
//!
//!     let mut session = ScanSessionController::new(adapter, Arc::new(|| true), logger.clone());
//!     session.start().await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     session.stop().await;
//!     logger.flush().await;
//!
//!     println!("Saw {} devices", session.registry().len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod events;
pub mod logger;
pub mod metrics;
pub mod mock;
pub mod registry;
pub mod scan;
pub mod session;
pub mod source;
pub mod traits;

// Core exports
pub use error::{Error, Result};
pub use registry::{DeviceRegistry, UpsertOutcome};
pub use session::{ScanSessionController, SessionConfig, SessionState};
pub use traits::{Authorization, DiscoveryStream, RadioAdapter, RawDevice};

pub use events::{EventDispatcher, EventReceiver, EventSender, SightingEvent};
pub use logger::{
    ConsoleSink, FileSink, LogSink, MemorySink, SightingLogger, TracingSink, format_line,
};
pub use metrics::{LoggerStats, PipelineStats, SessionStats};
pub use mock::{MockAdapter, MockAdapterBuilder};
pub use scan::{AdapterState, BtleplugAdapter, get_adapter};
pub use source::{BondedSnapshotSource, LiveScanSource};

// Re-export from nearby-types
pub use nearby_types::{DeviceRecord, RecordError, Sighting, SightingOrigin};
