//! Session summary formatting.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use nearby_core::logger::format_timestamp;
use nearby_core::{DeviceRecord, SessionStats};
use serde::Serialize;

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Interrupted,
    DurationElapsed,
}

impl StopReason {
    fn describe(self) -> &'static str {
        match self {
            StopReason::Interrupted => "interrupted",
            StopReason::DurationElapsed => "duration elapsed",
        }
    }
}

/// Everything printed after a session ends.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub stop_reason: StopReason,
    pub devices: Vec<DeviceRecord>,
    pub stats: SessionStats,
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Format the summary as a plain-text table.
pub fn format_summary_text(summary: &SessionSummary) -> String {
    let mut out = String::new();
    let connected = summary.devices.iter().filter(|d| d.is_connected).count();
    let _ = writeln!(
        out,
        "Session ended ({}): {} device(s), {} connected",
        summary.stop_reason.describe(),
        summary.devices.len(),
        connected
    );

    if !summary.devices.is_empty() {
        let addr_width = summary
            .devices
            .iter()
            .map(|d| d.address.len())
            .max()
            .unwrap_or(0)
            .max("ADDRESS".len());
        let name_width = summary
            .devices
            .iter()
            .map(|d| d.display_name().len())
            .max()
            .unwrap_or(0)
            .max("NAME".len());

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<addr_width$}  {:<name_width$}  {:<9}  {:<20}  LAST SEEN",
            "ADDRESS", "NAME", "CONNECTED", "FIRST SEEN"
        );
        for device in &summary.devices {
            let _ = writeln!(
                out,
                "{:<addr_width$}  {:<name_width$}  {:<9}  {:<20}  {}",
                device.address,
                device.display_name(),
                yes_no(device.is_connected),
                format_timestamp(device.first_seen),
                format_timestamp(device.last_seen),
            );
        }
    }

    let stats = &summary.stats;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Sightings: {} routed, {} lost (malformed {}, rejected {}, dropped {}, sink failures {})",
        stats.pipeline.sightings_routed,
        stats.lost_sightings(),
        stats.pipeline.malformed_dropped,
        stats.pipeline.invalid_rejected,
        stats.logger.lines_dropped,
        stats.logger.sink_failures,
    );
    out
}

/// Format the summary as pretty JSON.
pub fn format_summary_json(summary: &SessionSummary) -> Result<String> {
    let mut json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearby_core::{LoggerStats, PipelineStats, Sighting};
    use time::macros::datetime;

    fn summary() -> SessionSummary {
        let watch = DeviceRecord::first_sighting(
            Sighting::bonded("11:22", Some("Watch")).unwrap(),
            datetime!(2024-05-01 12:00:00 UTC),
        )
        .unwrap();
        let unnamed = DeviceRecord::first_sighting(
            Sighting::broadcast("33:44", None).unwrap(),
            datetime!(2024-05-01 12:00:05 UTC),
        )
        .unwrap();
        SessionSummary {
            stop_reason: StopReason::DurationElapsed,
            devices: vec![watch, unnamed],
            stats: SessionStats {
                pipeline: PipelineStats {
                    sightings_routed: 3,
                    devices_added: 2,
                    malformed_dropped: 1,
                    invalid_rejected: 0,
                },
                logger: LoggerStats {
                    lines_written: 3,
                    lines_dropped: 0,
                    sink_failures: 0,
                },
            },
        }
    }

    #[test]
    fn test_text_summary() {
        let text = format_summary_text(&summary());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Session ended (duration elapsed): 2 device(s), 1 connected"
        );
        assert!(lines[2].starts_with("ADDRESS"));
        assert!(lines[3].starts_with("11:22"));
        assert!(lines[3].contains("Watch"));
        assert!(lines[3].contains("yes"));
        assert!(lines[4].contains("unknown"));
        assert!(lines[4].contains("2024-05-01T12:00:05Z"));
        assert_eq!(
            lines[6],
            "Sightings: 3 routed, 1 lost (malformed 1, rejected 0, dropped 0, sink failures 0)"
        );
    }

    #[test]
    fn test_text_summary_without_devices() {
        let mut empty = summary();
        empty.devices.clear();
        let text = format_summary_text(&empty);
        assert!(!text.contains("ADDRESS"));
        assert!(text.starts_with("Session ended (duration elapsed): 0 device(s)"));
    }

    #[test]
    fn test_json_summary() {
        let json = format_summary_json(&summary()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["stop_reason"], "duration_elapsed");
        assert_eq!(value["devices"][0]["address"], "11:22");
        assert_eq!(value["devices"][0]["first_seen"], "2024-05-01T12:00:00Z");
        assert_eq!(value["stats"]["malformed_dropped"], 1);
    }
}
