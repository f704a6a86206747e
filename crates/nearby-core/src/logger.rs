//! Sighting log lines and the sinks they are written to.
//!
//! [`SightingLogger::record`] formats one line per sighting and queues it
//! for a dedicated writer thread that owns the [`LogSink`]. Ingestion never
//! waits for the sink: when the bounded queue is full the line is dropped
//! and counted, and a warning is logged.
//!
//! Line format:
//!
//! ```text
//! Connected device new: name=Watch address=11:22 first_seen=2024-05-01T12:00:00Z last_seen=2024-05-01T12:00:00Z
//! ```

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use nearby_types::DeviceRecord;

use crate::metrics::{LoggerMetrics, LoggerStats};

/// Destination for formatted sighting lines.
///
/// A sink is owned by the logger's writer thread, so implementations may
/// block and need no internal locking.
pub trait LogSink: Send + 'static {
    /// Write one line (without trailing newline).
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes lines to standard output.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(io::stdout().lock(), "{}", line)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// Appends lines to a file.
#[derive(Debug)]
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed.
    pub fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", line)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Emits lines as `tracing` events at INFO level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        info!(target: "nearby::sighting", "{}", line);
        Ok(())
    }
}

/// Collects lines in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for MemorySink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

enum WriterMsg {
    Line(String),
    Flush(oneshot::Sender<()>),
}

/// Format a timestamp as RFC 3339.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

/// Replace control characters so a field cannot break the line.
fn single_line(field: &str) -> Cow<'_, str> {
    if field.chars().any(char::is_control) {
        Cow::Owned(
            field
                .chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(field)
    }
}

/// Format the log line for a sighting.
///
/// Always a single line, even for records built by hand with control
/// characters in the name or address.
pub fn format_line(record: &DeviceRecord, is_new: bool) -> String {
    let status = if record.is_connected {
        "Connected"
    } else {
        "Disconnected"
    };
    let freshness = if is_new { "new" } else { "seen again" };
    format!(
        "{} device {}: name={} address={} first_seen={} last_seen={}",
        status,
        freshness,
        single_line(record.display_name()),
        single_line(&record.address),
        format_timestamp(record.first_seen),
        format_timestamp(record.last_seen),
    )
}

/// Formats sightings and hands them to a sink without blocking the caller.
///
/// Clones share the same queue, writer thread and counters. The writer
/// thread exits once every clone has been dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct SightingLogger {
    tx: mpsc::Sender<WriterMsg>,
    metrics: Arc<LoggerMetrics>,
}

impl std::fmt::Debug for WriterMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterMsg::Line(line) => f.debug_tuple("Line").field(line).finish(),
            WriterMsg::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl SightingLogger {
    /// Default number of lines that may wait for the sink.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

    /// Start a writer thread for `sink` with the given queue capacity.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the writer thread cannot be spawned.
    pub fn spawn(sink: impl LogSink, queue_capacity: usize) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(LoggerMetrics::new());

        let writer_metrics = Arc::clone(&metrics);
        std::thread::Builder::new()
            .name("sighting-writer".to_string())
            .spawn(move || run_writer(sink, rx, writer_metrics))?;

        Ok(Self { tx, metrics })
    }

    /// Queue the line for one sighting.
    ///
    /// Never blocks. If the queue is full the line is dropped and counted.
    pub fn record(&self, record: &DeviceRecord, is_new: bool) {
        let line = format_line(record, is_new);
        match self.tx.try_send(WriterMsg::Line(line)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.metrics.record_dropped();
                if dropped.is_power_of_two() {
                    warn!(
                        "Sighting log queue full, dropped line for {} ({} dropped so far)",
                        record.address, dropped
                    );
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                let dropped = self.metrics.record_dropped();
                warn!(
                    "Sighting writer has stopped, dropped line for {} ({} dropped so far)",
                    record.address, dropped
                );
            }
        }
    }

    /// Wait until every line queued before this call has reached the sink,
    /// then flush the sink.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriterMsg::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Get a snapshot of the logger counters.
    pub fn stats(&self) -> LoggerStats {
        self.metrics.snapshot()
    }
}

fn run_writer(mut sink: impl LogSink, mut rx: mpsc::Receiver<WriterMsg>, metrics: Arc<LoggerMetrics>) {
    debug!("Sighting writer started");
    while let Some(msg) = rx.blocking_recv() {
        match msg {
            WriterMsg::Line(line) => match sink.write_line(&line) {
                Ok(()) => metrics.record_written(),
                Err(e) => {
                    let failures = metrics.record_sink_failure();
                    error!(
                        "Sighting sink write failed ({} failures so far): {}; line was: {}",
                        failures, e, line
                    );
                }
            },
            WriterMsg::Flush(done) => {
                if let Err(e) = sink.flush() {
                    error!("Sighting sink flush failed: {}", e);
                }
                let _ = done.send(());
            }
        }
    }
    if let Err(e) = sink.flush() {
        error!("Sighting sink flush failed: {}", e);
    }
    debug!("Sighting writer stopped");
}
