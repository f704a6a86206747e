//! Event sources that turn platform device handles into sightings.
//!
//! There are two sources, one per input channel:
//!
//! - [`BondedSnapshotSource`]: the finite list of bonded devices, read once
//!   at session start. Every sighting is marked connected.
//! - [`LiveScanSource`]: the push stream of found-device notifications.
//!   Every sighting is marked not connected.
//!
//! A handle without a usable address is malformed. Both sources drop it
//! with a warning and bump the shared malformed counter instead of failing.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use nearby_types::{Sighting, SightingOrigin};

use crate::metrics::SessionMetrics;
use crate::traits::{DiscoveryStream, RawDevice};

/// Normalize a raw handle for the given origin, or log and count it.
fn normalize(origin: SightingOrigin, raw: RawDevice, metrics: &SessionMetrics) -> Option<Sighting> {
    match Sighting::from_raw(origin, raw.address.as_deref(), raw.name) {
        Ok(sighting) => Some(sighting),
        Err(e) => {
            metrics.record_malformed();
            warn!("Dropping malformed {} event: {}", origin, e);
            None
        }
    }
}

/// Finite source over the adapter's bonded devices.
#[derive(Debug)]
pub struct BondedSnapshotSource {
    devices: std::vec::IntoIter<RawDevice>,
    metrics: Arc<SessionMetrics>,
}

impl BondedSnapshotSource {
    /// Wrap a bonded-device snapshot.
    pub fn new(devices: Vec<RawDevice>, metrics: Arc<SessionMetrics>) -> Self {
        debug!("Bonded snapshot holds {} device(s)", devices.len());
        Self {
            devices: devices.into_iter(),
            metrics,
        }
    }
}

impl Iterator for BondedSnapshotSource {
    type Item = Sighting;

    fn next(&mut self) -> Option<Sighting> {
        for raw in self.devices.by_ref() {
            if let Some(sighting) = normalize(SightingOrigin::Bonded, raw, &self.metrics) {
                return Some(sighting);
            }
        }
        None
    }
}

/// Unbounded source over live found-device notifications.
pub struct LiveScanSource {
    stream: DiscoveryStream,
    metrics: Arc<SessionMetrics>,
}

impl std::fmt::Debug for LiveScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveScanSource").finish_non_exhaustive()
    }
}

impl LiveScanSource {
    /// Wrap a discovery stream.
    pub fn new(stream: DiscoveryStream, metrics: Arc<SessionMetrics>) -> Self {
        Self { stream, metrics }
    }

    /// Wait for the next well-formed sighting.
    ///
    /// Malformed notifications are skipped. Returns `None` once the
    /// underlying stream has ended.
    pub async fn next(&mut self) -> Option<Sighting> {
        while let Some(raw) = self.stream.next().await {
            if let Some(sighting) = normalize(SightingOrigin::Broadcast, raw, &self.metrics) {
                return Some(sighting);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_bonded_source_marks_connected() {
        let metrics = Arc::new(SessionMetrics::new());
        let source = BondedSnapshotSource::new(
            vec![
                RawDevice::new("11:22", Some("Watch")),
                RawDevice::new("33:44", None),
            ],
            Arc::clone(&metrics),
        );

        let sightings: Vec<Sighting> = source.collect();
        assert_eq!(sightings.len(), 2);
        assert!(sightings.iter().all(|s| s.is_connected));
        assert!(sightings.iter().all(|s| s.origin == SightingOrigin::Bonded));
        assert_eq!(metrics.snapshot().malformed_dropped, 0);
    }

    #[test]
    fn test_bonded_source_skips_missing_address() {
        let metrics = Arc::new(SessionMetrics::new());
        let source = BondedSnapshotSource::new(
            vec![
                RawDevice::without_address(Some("Ghost")),
                RawDevice::new("11:22", Some("Watch")),
            ],
            Arc::clone(&metrics),
        );

        let sightings: Vec<Sighting> = source.collect();
        assert_eq!(sightings.len(), 1);
        assert_eq!(sightings[0].address, "11:22");
        assert_eq!(metrics.snapshot().malformed_dropped, 1);
    }

    #[tokio::test]
    async fn test_live_source_marks_disconnected_and_skips_malformed() {
        let metrics = Arc::new(SessionMetrics::new());
        let raw = stream::iter(vec![
            RawDevice::new("", Some("Blank")),
            RawDevice::new("33:44", Some("Headset")),
            RawDevice::without_address(None),
        ]);
        let mut source = LiveScanSource::new(raw.boxed(), Arc::clone(&metrics));

        let sighting = source.next().await.unwrap();
        assert_eq!(sighting.address, "33:44");
        assert!(!sighting.is_connected);
        assert_eq!(sighting.origin, SightingOrigin::Broadcast);

        assert!(source.next().await.is_none());
        assert_eq!(metrics.snapshot().malformed_dropped, 2);
    }
}
