//! The telemetry logger: encoder, channel writers, and background timers.
//!
//! One [`TelemetryLogger`] owns the whole pipeline. Each channel writer lives
//! behind its own lock - the two channels share no file, buffer, or counter,
//! so there is no cross-channel contention. Three independent periodic tasks
//! drive flushing, rotation checks, and archiving; each is idempotent and
//! safe to run while the others are delayed or skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::archive::Archiver;
use crate::clock::{Clock, SystemClock};
use crate::config::TelemetryConfig;
use crate::encode::RecordEncoder;
use crate::error::{Error, Result};
use crate::files;
use crate::metrics::{ChannelLabels, TelemetryMetrics};
use crate::model::{Channel, CompactRecord, Exchange};
use crate::writer::{ChannelWriter, WriterConfig};

/// Records returned by [`TelemetryLogger::recent`] are capped regardless of
/// the requested limit.
const MAX_RECENT_RECORDS: usize = 1000;

/// Aggregate statistics for the inspection API.
#[derive(Debug, Serialize)]
pub struct LoggerStats {
    pub active: ActiveStats,
    pub archive: ArchiveDirStats,
    pub config: ConfigStats,
}

/// State of the active directory and both writers.
#[derive(Debug, Serialize)]
pub struct ActiveStats {
    pub files: usize,
    pub total_bytes: u64,
    pub access_file: String,
    pub access_file_bytes: u64,
    pub access_buffer_depth: usize,
    pub error_file: String,
    pub error_file_bytes: u64,
    pub error_buffer_depth: usize,
}

/// State of the archive directory.
#[derive(Debug, Serialize)]
pub struct ArchiveDirStats {
    pub files: usize,
    pub total_bytes: u64,
}

/// Effective configuration, echoed for inspection.
#[derive(Debug, Serialize)]
pub struct ConfigStats {
    pub max_file_size: u64,
    pub max_active_files: usize,
    pub max_archive_files: usize,
    pub buffer_size: usize,
    pub archive_size_threshold: u64,
    pub compress_archives: bool,
}

struct LoggerInner {
    config: TelemetryConfig,
    encoder: RecordEncoder,
    clock: Arc<dyn Clock>,
    access: Mutex<ChannelWriter>,
    error: Mutex<ChannelWriter>,
    archiver: Archiver,
    metrics: TelemetryMetrics,
}

impl LoggerInner {
    fn writer(&self, channel: Channel) -> &Mutex<ChannelWriter> {
        match channel {
            Channel::Access => &self.access,
            Channel::Error => &self.error,
        }
    }

    /// Paths of the files currently open for writing, which archiving must
    /// skip.
    async fn open_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(2);
        if let Some(path) = self.access.lock().await.current_path() {
            paths.push(path.to_path_buf());
        }
        if let Some(path) = self.error.lock().await.current_path() {
            paths.push(path.to_path_buf());
        }
        paths
    }
}

/// Converts completed HTTP exchanges into compact records and owns their
/// journey to disk: buffering, flushing, rotation, and archiving.
///
/// Nothing here blocks the request path beyond encoding and an in-memory
/// push; file I/O happens on flush, and faults are reported through logging
/// rather than surfaced to callers.
pub struct TelemetryLogger {
    inner: Arc<LoggerInner>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl TelemetryLogger {
    /// Opens the logger: creates the active and archive directories, opens
    /// both channel writers (resuming any existing files), and starts the
    /// flush, rotation, and archive timers.
    pub async fn open(config: TelemetryConfig) -> Result<Self> {
        let active_dir = config.active_dir();
        let archive_dir = config.archive_dir();
        tokio::fs::create_dir_all(&active_dir).await?;
        tokio::fs::create_dir_all(&archive_dir).await?;

        let metrics = TelemetryMetrics::new();
        let writer_config = WriterConfig {
            buffer_size: config.buffer_size,
            max_file_size: config.max_file_size,
        };
        let access = ChannelWriter::open(
            Channel::Access,
            &active_dir,
            writer_config.clone(),
            metrics.clone(),
        )
        .await?;
        let error =
            ChannelWriter::open(Channel::Error, &active_dir, writer_config, metrics.clone())
                .await?;
        let archiver = Archiver::new(
            active_dir,
            archive_dir,
            config.archive_size_threshold,
            config.max_archive_files,
            config.compress_archives,
            metrics.clone(),
        );

        let inner = Arc::new(LoggerInner {
            encoder: RecordEncoder::new(config.environment),
            clock: Arc::new(SystemClock),
            access: Mutex::new(access),
            error: Mutex::new(error),
            archiver,
            metrics,
            config,
        });

        let logger = Self {
            inner,
            tasks: parking_lot::Mutex::new(Vec::new()),
        };
        logger.spawn_timers();
        Ok(logger)
    }

    /// Encodes one exchange and appends it to the access channel; server
    /// faults (status >= 500) additionally go to the error channel. This is
    /// the call site that enforces the error-channel gate.
    ///
    /// Faults in here are reported through logging and never reach the
    /// caller's request path.
    pub async fn record(&self, exchange: &Exchange) {
        let now = self.inner.clock.now();
        let record = self.inner.encoder.encode(exchange, now);
        let line = match record.to_line() {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(%err, "failed to serialize telemetry record");
                return;
            }
        };

        // Statuses 400-499 (including not-found) never reach the error
        // channel.
        let error_line = (exchange.status >= 500).then(|| line.clone());

        self.inner
            .metrics
            .records
            .get_or_create(&ChannelLabels::new(Channel::Access))
            .inc();
        if let Err(err) = self.inner.access.lock().await.append(line).await {
            tracing::error!(%err, "access channel rejected record");
        }

        if let Some(line) = error_line {
            self.inner
                .metrics
                .records
                .get_or_create(&ChannelLabels::new(Channel::Error))
                .inc();
            if let Err(err) = self.inner.error.lock().await.append(line).await {
                tracing::error!(%err, "error channel rejected record");
            }
        }
    }

    /// Flushes both channels now.
    pub async fn flush_all(&self) {
        self.inner.access.lock().await.flush().await;
        self.inner.error.lock().await.flush().await;
    }

    /// Runs one archive pass immediately, the same work the periodic timer
    /// performs.
    pub async fn run_archive_pass(&self) -> Result<()> {
        let in_use = self.inner.open_paths().await;
        self.inner.archiver.run_pass(&in_use).await?;
        Ok(())
    }

    /// Stops the background timers, then makes a best-effort flush of both
    /// channels bounded by the configured grace period before closing the
    /// file handles. Records still buffered when the window expires are lost;
    /// this bounded data-loss window is part of the shutdown contract.
    pub async fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        let grace = self.inner.config.shutdown_grace;
        let inner = Arc::clone(&self.inner);
        let flushed = time::timeout(grace, async move {
            inner.access.lock().await.close().await;
            inner.error.lock().await.close().await;
        })
        .await;

        if flushed.is_err() {
            tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                "shutdown flush did not finish within the grace period; buffered records lost"
            );
        }
    }

    /// Aggregate statistics over both directories and writers.
    pub async fn stats(&self) -> Result<LoggerStats> {
        let active_files = files::list_dir(&self.inner.config.active_dir()).await?;
        let archive_files = files::list_dir(&self.inner.config.archive_dir()).await?;
        let access = self.inner.access.lock().await;
        let error = self.inner.error.lock().await;

        Ok(LoggerStats {
            active: ActiveStats {
                files: active_files.len(),
                total_bytes: active_files.iter().map(|f| f.size).sum(),
                access_file: access.current_file_name().unwrap_or_default(),
                access_file_bytes: access.tracked_bytes(),
                access_buffer_depth: access.buffer_depth(),
                error_file: error.current_file_name().unwrap_or_default(),
                error_file_bytes: error.tracked_bytes(),
                error_buffer_depth: error.buffer_depth(),
            },
            archive: ArchiveDirStats {
                files: archive_files.len(),
                total_bytes: archive_files.iter().map(|f| f.size).sum(),
            },
            config: ConfigStats {
                max_file_size: self.inner.config.max_file_size,
                max_active_files: self.inner.config.max_active_files,
                max_archive_files: self.inner.config.max_archive_files,
                buffer_size: self.inner.config.buffer_size,
                archive_size_threshold: self.inner.config.archive_size_threshold,
                compress_archives: self.inner.config.compress_archives,
            },
        })
    }

    /// The most recent `limit` records (capped at 1000) from the channel's
    /// current active file, oldest first. Unparseable lines are skipped.
    pub async fn recent(&self, channel: Channel, limit: usize) -> Result<Vec<CompactRecord>> {
        let limit = limit.min(MAX_RECENT_RECORDS);
        let path = {
            let writer = self.inner.writer(channel).lock().await;
            writer.current_path().map(Path::to_path_buf)
        };
        let Some(path) = path else {
            return Ok(Vec::new());
        };

        let content = tokio::fs::read_to_string(&path).await?;
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(limit);
        Ok(lines[start..]
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Validates a requested file name against the active-file pattern and
    /// returns its path when such a file exists. The pattern check runs
    /// before any filesystem access.
    pub async fn resolve_download(&self, name: &str) -> Result<PathBuf> {
        if files::parse_active_file_name(name).is_none() {
            return Err(Error::InvalidFileName(name.to_string()));
        }
        let path = self.inner.config.active_dir().join(name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::NotFound,
            )));
        }
        Ok(path)
    }

    /// Registers the pipeline metrics into the server's registry.
    pub fn register_metrics(&self, registry: &mut prometheus_client::registry::Registry) {
        self.inner.metrics.register(registry);
    }

    /// Pipeline metrics handle.
    pub fn metrics(&self) -> &TelemetryMetrics {
        &self.inner.metrics
    }

    /// Starts the three independent background tasks. Each touches only the
    /// state of the component it drives, and each tick is idempotent.
    fn spawn_timers(&self) {
        let mut tasks = self.tasks.lock();

        // Periodic flush: bounds record staleness under low traffic.
        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move {
            let mut tick = time::interval(inner.config.flush_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                inner.access.lock().await.flush().await;
                inner.error.lock().await.flush().await;
            }
        }));

        // Periodic rotation check.
        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move {
            let mut tick = time::interval(inner.config.rotation_check_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                for channel in [Channel::Access, Channel::Error] {
                    let mut writer = inner.writer(channel).lock().await;
                    if let Err(err) = writer.maybe_rotate().await {
                        tracing::error!(channel = channel.as_str(), %err, "rotation check failed");
                    }
                }
            }
        }));

        // Periodic archive pass; the first tick waits one full interval.
        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move {
            let period = inner.config.archive_check_interval;
            let mut tick = time::interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let in_use = inner.open_paths().await;
                if let Err(err) = inner.archiver.run_pass(&in_use).await {
                    tracing::error!(%err, "archive pass failed, retrying next interval");
                }
            }
        }));
    }
}

impl Drop for TelemetryLogger {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
