//! Scan session lifecycle.
//!
//! A [`ScanSessionController`] owns everything one session needs: the
//! registry, the logger handle, the event dispatcher and the task that
//! drains the live discovery stream. It moves through
//! `Idle -> Enumerating -> Scanning -> Stopped` and never back.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nearby_core::{MemorySink, MockAdapterBuilder, ScanSessionController, SightingLogger};
//!
//! #[tokio::main]
//! async fn main() -> nearby_core::Result<()> {
//!     let adapter = Arc::new(MockAdapterBuilder::new().bonded("11:22", Some("Watch")).build());
//!     let sink = MemorySink::new();
//!     let logger = SightingLogger::spawn(sink.clone(), 16)?;
//!
//!     let mut session = ScanSessionController::new(adapter, Arc::new(|| true), logger.clone());
//!     session.start().await?;
//!     session.stop().await;
//!     logger.flush().await;
//!
//!     assert_eq!(sink.lines().len(), 1);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nearby_types::Sighting;

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, SightingEvent};
use crate::logger::SightingLogger;
use crate::metrics::{SessionMetrics, SessionStats};
use crate::registry::{DeviceRegistry, UpsertOutcome};
use crate::source::{BondedSnapshotSource, LiveScanSource};
use crate::traits::{Authorization, RadioAdapter};

/// Lifecycle state of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Constructed, nothing subscribed.
    Idle,
    /// Draining the bonded-device snapshot.
    Enumerating,
    /// Subscribed to live discovery.
    Scanning,
    /// Torn down. Terminal.
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Enumerating => "enumerating",
            SessionState::Scanning => "scanning",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Options for a scan session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the sighting event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: 100,
        }
    }
}

impl SessionConfig {
    /// Set the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// Registry, logger and dispatcher shared by the enumeration path and the
/// live task.
#[derive(Debug, Clone)]
struct SightingPipeline {
    registry: Arc<DeviceRegistry>,
    logger: SightingLogger,
    events: EventDispatcher,
    metrics: Arc<SessionMetrics>,
}

impl SightingPipeline {
    /// Apply one sighting: upsert, then log, then publish.
    fn route(&self, sighting: Sighting) {
        let origin = sighting.origin;
        match self.registry.upsert(sighting) {
            Ok(UpsertOutcome { record, is_new }) => {
                self.metrics.record_routed(is_new);
                debug!(
                    "Routed {} sighting of {} (new: {})",
                    origin, record.address, is_new
                );
                self.logger.record(&record, is_new);
                self.events.send(SightingEvent {
                    record,
                    is_new,
                    origin,
                });
            }
            Err(e) => {
                self.metrics.record_invalid();
                warn!("Registry rejected {} sighting: {}", origin, e);
            }
        }
    }
}

/// Background task state for live discovery.
struct LiveTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drive the live source until it ends or the session is cancelled.
async fn run_live(mut source: LiveScanSource, pipeline: SightingPipeline, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Live task cancelled");
                break;
            }
            next = source.next() => match next {
                Some(sighting) => pipeline.route(sighting),
                None => {
                    info!("Discovery stream ended");
                    break;
                }
            }
        }
    }
}

/// Orchestrates one scan session.
///
/// The controller is single-use: once stopped, build a new one for the next
/// session.
pub struct ScanSessionController {
    adapter: Arc<dyn RadioAdapter>,
    authorization: Arc<dyn Authorization>,
    pipeline: SightingPipeline,
    state: SessionState,
    live: Option<LiveTask>,
}

impl fmt::Debug for ScanSessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSessionController")
            .field("state", &self.state)
            .field("devices", &self.pipeline.registry.len())
            .finish_non_exhaustive()
    }
}

impl ScanSessionController {
    /// Create an idle controller with default options.
    pub fn new(
        adapter: Arc<dyn RadioAdapter>,
        authorization: Arc<dyn Authorization>,
        logger: SightingLogger,
    ) -> Self {
        Self::with_config(adapter, authorization, logger, SessionConfig::default())
    }

    /// Create an idle controller with custom options.
    pub fn with_config(
        adapter: Arc<dyn RadioAdapter>,
        authorization: Arc<dyn Authorization>,
        logger: SightingLogger,
        config: SessionConfig,
    ) -> Self {
        Self {
            adapter,
            authorization,
            pipeline: SightingPipeline {
                registry: Arc::new(DeviceRegistry::new()),
                logger,
                events: EventDispatcher::new(config.event_capacity),
                metrics: Arc::new(SessionMetrics::new()),
            },
            state: SessionState::Idle,
            live: None,
        }
    }

    /// Start the session.
    ///
    /// Enumerates the bonded devices, routing each through the pipeline,
    /// then subscribes to live discovery. Returns once the controller is
    /// `Scanning`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the controller is `Idle`.
    /// - [`Error::Unauthorized`] if radio access has not been granted.
    /// - Any adapter error from the bonded enumeration. The controller
    ///   stays `Idle` in all three cases.
    /// - Any adapter error from subscribing to discovery. The bonded
    ///   devices have been routed by then, and the controller moves to
    ///   `Stopped`.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::invalid_state("start", self.state));
        }
        if !self.authorization.authorized() {
            warn!("Refusing to start session: Bluetooth access not authorized");
            return Err(Error::Unauthorized);
        }

        let bonded = self.adapter.bonded_devices().await?;

        self.state = SessionState::Enumerating;
        info!("Enumerating {} bonded device(s)", bonded.len());
        let source = BondedSnapshotSource::new(bonded, Arc::clone(&self.pipeline.metrics));
        for sighting in source {
            self.pipeline.route(sighting);
        }

        let stream = match self.adapter.start_discovery().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to start discovery: {}", e);
                self.state = SessionState::Stopped;
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let source = LiveScanSource::new(stream, Arc::clone(&self.pipeline.metrics));
        let handle = tokio::spawn(run_live(source, self.pipeline.clone(), cancel.clone()));
        self.live = Some(LiveTask { cancel, handle });
        self.state = SessionState::Scanning;
        info!("Session scanning");
        Ok(())
    }

    /// Stop the session.
    ///
    /// Once this returns, nothing from the live source reaches the registry
    /// or the logger. Calling it on an idle or already stopped controller
    /// does nothing.
    pub async fn stop(&mut self) {
        match self.state {
            SessionState::Idle | SessionState::Stopped => {
                debug!("stop() on {} session ignored", self.state);
                return;
            }
            SessionState::Enumerating | SessionState::Scanning => {}
        }

        if let Some(live) = self.live.take() {
            live.cancel.cancel();
            if let Err(e) = live.handle.await {
                error!("Live task failed: {}", e);
            }
        }

        if let Err(e) = self.adapter.stop_discovery().await {
            warn!("Failed to stop discovery: {}", e);
        }

        self.state = SessionState::Stopped;
        let stats = self.stats();
        info!(
            "Session stopped: {} device(s), {} sighting(s) routed, {} lost",
            self.pipeline.registry.len(),
            stats.pipeline.sightings_routed,
            stats.lost_sightings()
        );
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The session's device registry.
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.pipeline.registry
    }

    /// The session's logger handle.
    pub fn logger(&self) -> &SightingLogger {
        &self.pipeline.logger
    }

    /// Subscribe to sighting events.
    ///
    /// Subscribe before [`start`](Self::start) to see the bonded devices.
    pub fn subscribe(&self) -> EventReceiver {
        self.pipeline.events.subscribe()
    }

    /// Snapshot of the pipeline and logger counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            pipeline: self.pipeline.metrics.snapshot(),
            logger: self.pipeline.logger.stats(),
        }
    }
}

/// Dropping a scanning controller cancels the live task and, when a tokio
/// runtime is available, unsubscribes from the adapter in the background.
/// Await [`ScanSessionController::stop`] instead to know when teardown is
/// complete.
impl Drop for ScanSessionController {
    fn drop(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };
        live.cancel.cancel();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let adapter = Arc::clone(&self.adapter);
                handle.spawn(async move {
                    if let Err(e) = adapter.stop_discovery().await {
                        warn!("Failed to stop discovery for dropped session: {}", e);
                    }
                });
            }
            Err(_) => {
                warn!("Session dropped outside a runtime while scanning; discovery left running")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemorySink;
    use crate::mock::{MockAdapter, MockAdapterBuilder};
    use crate::traits::RawDevice;

    fn controller(adapter: Arc<MockAdapter>, authorized: bool) -> ScanSessionController {
        let logger = SightingLogger::spawn(MemorySink::new(), 16).unwrap();
        ScanSessionController::new(adapter, Arc::new(move || authorized), logger)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Enumerating.to_string(), "enumerating");
        assert_eq!(SessionState::Scanning.to_string(), "scanning");
        assert_eq!(SessionState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&SessionState::Scanning).unwrap();
        assert_eq!(json, "\"scanning\"");
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let adapter = Arc::new(MockAdapterBuilder::new().bonded("11:22", None).build());
        let mut session = controller(Arc::clone(&adapter), true);
        assert_eq!(session.state(), SessionState::Idle);

        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Scanning);
        assert!(adapter.is_discovering());
        assert_eq!(session.registry().len(), 1);

        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!adapter.is_discovering());
        assert_eq!(adapter.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_on_idle_is_noop() {
        let adapter = Arc::new(MockAdapter::new());
        let mut session = controller(Arc::clone(&adapter), true);

        session.stop().await;
        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(adapter.stop_count(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let adapter = Arc::new(MockAdapter::new());
        let mut session = controller(adapter, true);
        session.start().await.unwrap();

        let err = session.start().await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                operation: "start",
                state: SessionState::Scanning
            }
        ));
        session.stop().await;
    }

    #[tokio::test]
    async fn test_unauthorized_stays_idle() {
        let adapter = Arc::new(MockAdapterBuilder::new().bonded("11:22", None).build());
        let mut session = controller(Arc::clone(&adapter), false);

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.registry().is_empty());
        assert_eq!(adapter.start_count(), 0);
    }

    #[tokio::test]
    async fn test_bonded_failure_stays_idle() {
        let adapter = Arc::new(MockAdapterBuilder::new().fail_bonded(true).build());
        let mut session = controller(Arc::clone(&adapter), true);

        assert!(session.start().await.is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(adapter.start_count(), 0);
    }

    #[tokio::test]
    async fn test_discovery_failure_stops_session() {
        let adapter = Arc::new(
            MockAdapterBuilder::new()
                .bonded("11:22", Some("Watch"))
                .fail_discovery(true)
                .build(),
        );
        let mut session = controller(adapter, true);

        assert!(session.start().await.is_err());
        assert_eq!(session.state(), SessionState::Stopped);
        // Bonded devices were routed before discovery failed.
        assert_eq!(session.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_live_sightings_are_routed() {
        let adapter = Arc::new(MockAdapter::new());
        let mut session = controller(Arc::clone(&adapter), true);
        let mut events = session.subscribe();
        session.start().await.unwrap();

        assert!(adapter.push(RawDevice::new("33:44", Some("Headset"))));
        let event = events.recv().await.unwrap();
        assert_eq!(event.record.address, "33:44");
        assert!(!event.record.is_connected);
        assert!(event.is_new);

        session.stop().await;
        assert_eq!(session.stats().pipeline.sightings_routed, 1);
    }

    #[tokio::test]
    async fn test_drop_while_scanning_stops_discovery() {
        let adapter = Arc::new(MockAdapter::new());
        let mut session = controller(Arc::clone(&adapter), true);
        session.start().await.unwrap();
        assert!(adapter.is_discovering());

        drop(session);

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while adapter.is_discovering() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("discovery still active after drop");
        assert_eq!(adapter.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_after_stop_does_not_unsubscribe_again() {
        let adapter = Arc::new(MockAdapter::new());
        let mut session = controller(Arc::clone(&adapter), true);
        session.start().await.unwrap();
        session.stop().await;

        drop(session);
        tokio::task::yield_now().await;
        assert_eq!(adapter.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_stream_end_keeps_state_until_stop() {
        let adapter = Arc::new(MockAdapter::new());
        let mut session = controller(Arc::clone(&adapter), true);
        session.start().await.unwrap();

        // Ending the stream from the adapter side does not change the state.
        adapter.stop_discovery().await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(session.state(), SessionState::Scanning);

        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
    }
}
