//! Session and logger counters.
//!
//! Nothing in the pipeline is allowed to lose an event silently. Every
//! dropped or rejected sighting and every failed sink write increments one
//! of these counters, and the owner of a session can read them at any time
//! as a serializable [`SessionStats`] snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Sightings that made it through the registry.
    pub sightings_routed: u64,
    /// Sightings that created a new record.
    pub devices_added: u64,
    /// Platform events dropped because they had no usable address.
    pub malformed_dropped: u64,
    /// Sightings the registry rejected as invalid records.
    pub invalid_rejected: u64,
}

/// Point-in-time view of the logger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerStats {
    /// Lines handed to the sink successfully.
    pub lines_written: u64,
    /// Lines dropped because the write queue was full or closed.
    pub lines_dropped: u64,
    /// Sink writes that returned an error.
    pub sink_failures: u64,
}

/// Combined counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Registry and source counters.
    #[serde(flatten)]
    pub pipeline: PipelineStats,
    /// Sighting logger counters.
    #[serde(flatten)]
    pub logger: LoggerStats,
}

impl SessionStats {
    /// Total number of sightings that did not produce a log line.
    pub fn lost_sightings(&self) -> u64 {
        self.pipeline.malformed_dropped
            + self.pipeline.invalid_rejected
            + self.logger.lines_dropped
            + self.logger.sink_failures
    }
}

/// Thread-safe pipeline counters.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    sightings_routed: AtomicU64,
    devices_added: AtomicU64,
    malformed_dropped: AtomicU64,
    invalid_rejected: AtomicU64,
}

impl SessionMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting accepted by the registry.
    pub fn record_routed(&self, is_new: bool) {
        self.sightings_routed.fetch_add(1, Ordering::Relaxed);
        if is_new {
            self.devices_added.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a malformed platform event.
    pub fn record_malformed(&self) {
        self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a sighting rejected by the registry.
    pub fn record_invalid(&self) {
        self.invalid_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the counters.
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            sightings_routed: self.sightings_routed.load(Ordering::Relaxed),
            devices_added: self.devices_added.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            invalid_rejected: self.invalid_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Thread-safe logger counters.
#[derive(Debug, Default)]
pub struct LoggerMetrics {
    lines_written: AtomicU64,
    lines_dropped: AtomicU64,
    sink_failures: AtomicU64,
}

impl LoggerMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful sink write.
    pub fn record_written(&self) {
        self.lines_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped line and return the new drop total.
    pub fn record_dropped(&self) -> u64 {
        self.lines_dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a failed sink write and return the new failure total.
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get a snapshot of the counters.
    pub fn snapshot(&self) -> LoggerStats {
        LoggerStats {
            lines_written: self.lines_written.load(Ordering::Relaxed),
            lines_dropped: self.lines_dropped.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}
