//! Scan command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use nearby_core::{
    AdapterState, BtleplugAdapter, ConsoleSink, Error, FileSink, ScanSessionController,
    SessionConfig, SightingLogger, TracingSink,
};
use tracing::{debug, info, warn};

use crate::cli::{OutputFormat, SinkKind};
use crate::config::ScanSettings;
use crate::format::{SessionSummary, StopReason, format_summary_json, format_summary_text};
use crate::util::write_output;

/// Start the writer thread for the configured sink.
fn build_logger(settings: &ScanSettings) -> Result<SightingLogger> {
    let capacity = settings.queue_capacity;
    let logger = match settings.sink {
        SinkKind::Console => SightingLogger::spawn(ConsoleSink, capacity),
        SinkKind::Tracing => SightingLogger::spawn(TracingSink, capacity),
        SinkKind::File => {
            let path = settings
                .log_file
                .as_ref()
                .ok_or_else(|| anyhow!("The file sink needs a log file"))?;
            let sink = FileSink::append(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            SightingLogger::spawn(sink, capacity)
        }
    };
    logger.context("Failed to start sighting writer")
}

/// Warning shown before scanning with an adapter in this state, if any.
fn power_warning(state: AdapterState) -> Option<&'static str> {
    match state {
        AdapterState::PoweredOff => Some(
            "Bluetooth is turned off; no nearby devices will be found until it is turned on",
        ),
        AdapterState::PoweredOn | AdapterState::Unknown => None,
    }
}

/// Wait until Ctrl-C or the configured duration, whichever comes first.
async fn wait_for_stop(settings: &ScanSettings) -> Result<StopReason> {
    match settings.duration {
        Some(duration) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for Ctrl-C")?;
                    Ok(StopReason::Interrupted)
                }
                _ = tokio::time::sleep(duration) => Ok(StopReason::DurationElapsed),
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            Ok(StopReason::Interrupted)
        }
    }
}

pub async fn cmd_scan(
    settings: &ScanSettings,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
) -> Result<()> {
    let adapter = match BtleplugAdapter::first_available().await {
        Ok(adapter) => adapter,
        Err(e @ Error::AdapterUnavailable(_)) => {
            return Err(anyhow!(e).context("This machine doesn't appear to support Bluetooth"));
        }
        Err(e) => return Err(anyhow!(e).context("Failed to open the Bluetooth adapter")),
    };

    // The host stack refuses adapter queries when access has not been granted.
    let authorized = match adapter.describe().await {
        Ok(info) => {
            debug!("Using adapter: {}", info);
            true
        }
        Err(e) => {
            debug!("Adapter query failed: {}", e);
            false
        }
    };

    match adapter.state().await {
        Ok(state) => {
            if let Some(message) = power_warning(state) {
                warn!("{}", message);
            }
        }
        Err(e) => debug!("Could not read adapter state: {}", e),
    }

    let logger = build_logger(settings)?;
    let config = SessionConfig::default().event_capacity(settings.event_capacity);
    let mut session = ScanSessionController::with_config(
        Arc::new(adapter),
        Arc::new(move || authorized),
        logger.clone(),
        config,
    );

    session
        .start()
        .await
        .context("Failed to start scan session")?;

    if !quiet {
        match settings.duration {
            Some(d) => info!("Scanning for {}s (Ctrl-C to stop early)...", d.as_secs()),
            None => info!("Scanning until Ctrl-C..."),
        }
    }

    let stop_reason = wait_for_stop(settings).await;
    session.stop().await;
    logger.flush().await;
    let stop_reason = stop_reason?;

    let summary = SessionSummary {
        stop_reason,
        devices: session.registry().snapshot(),
        stats: session.stats(),
    };
    let content = match format {
        OutputFormat::Text => format_summary_text(&summary),
        OutputFormat::Json => format_summary_json(&summary)?,
    };
    write_output(output, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearby_core::Sighting;

    fn settings(sink: SinkKind, log_file: Option<PathBuf>) -> ScanSettings {
        ScanSettings {
            sink,
            log_file,
            queue_capacity: 4,
            event_capacity: 4,
            duration: None,
        }
    }

    #[tokio::test]
    async fn test_file_logger_appends_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sightings.log");
        let logger = build_logger(&settings(SinkKind::File, Some(path.clone()))).unwrap();

        let record = nearby_core::DeviceRecord::first_sighting(
            Sighting::bonded("11:22", Some("Watch")).unwrap(),
            time::OffsetDateTime::UNIX_EPOCH,
        )
        .unwrap();
        logger.record(&record, true);
        logger.flush().await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Connected device new: name=Watch"));
    }

    #[test]
    fn test_powered_off_adapter_warns() {
        assert!(power_warning(AdapterState::PoweredOff).is_some());
        assert!(power_warning(AdapterState::PoweredOn).is_none());
        assert!(power_warning(AdapterState::Unknown).is_none());
    }

    #[test]
    fn test_file_logger_requires_path() {
        assert!(build_logger(&settings(SinkKind::File, None)).is_err());
    }

    #[test]
    fn test_file_logger_reports_unopenable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("sightings.log");
        assert!(build_logger(&settings(SinkKind::File, Some(path))).is_err());
    }
}
