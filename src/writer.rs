//! Buffered append-only channel writer with size-based rotation.
//!
//! Each channel owns exactly one writer: an in-memory buffer of serialized
//! records, the currently open active file, and the byte counter the rotation
//! check consults. Delivery to disk is at-most-once: a failed flush drops its
//! batch and is reported through logging only - records are never re-buffered
//! or retried.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::files::{self, active_file_name};
use crate::metrics::{ChannelLabels, TelemetryMetrics};
use crate::model::Channel;

/// Tunables for a single channel writer.
#[derive(Debug, Clone)]
pub(crate) struct WriterConfig {
    /// Buffered entries that trigger a synchronous flush.
    pub buffer_size: usize,
    /// Tracked file size that triggers rotation.
    pub max_file_size: u64,
}

/// Writer lifecycle. Rotation is the transition that swaps one `Open` state
/// for the next; it is never observable as a resting state.
enum WriterState {
    Uninitialized,
    Open {
        file: File,
        path: PathBuf,
        sequence: u32,
        bytes: u64,
    },
    Closed,
}

pub(crate) struct ChannelWriter {
    channel: Channel,
    dir: PathBuf,
    config: WriterConfig,
    state: WriterState,
    buffer: Vec<String>,
    metrics: TelemetryMetrics,
}

impl ChannelWriter {
    /// Opens the writer for a channel.
    ///
    /// Scans the active directory for this channel's files: if any exist, the
    /// highest-numbered one is reopened in append mode and its current size
    /// recovered from the filesystem, so sequence numbers are never reused
    /// across restarts. Otherwise sequence 1 is created.
    pub(crate) async fn open(
        channel: Channel,
        dir: &Path,
        config: WriterConfig,
        metrics: TelemetryMetrics,
    ) -> Result<Self> {
        let mut writer = Self {
            channel,
            dir: dir.to_path_buf(),
            config,
            state: WriterState::Uninitialized,
            buffer: Vec::new(),
            metrics,
        };

        match files::latest_active_file(dir, channel).await? {
            Some((sequence, path, bytes)) => {
                let file = OpenOptions::new().append(true).open(&path).await?;
                tracing::info!(
                    channel = channel.as_str(),
                    file = %path.display(),
                    bytes,
                    "resuming active log file"
                );
                writer.state = WriterState::Open {
                    file,
                    path,
                    sequence,
                    bytes,
                };
            }
            None => writer.rotate().await?,
        }

        Ok(writer)
    }

    /// Queues one serialized record.
    ///
    /// Reaching the configured buffer threshold triggers a synchronous flush;
    /// this is the only backpressure point in the pipeline.
    pub(crate) async fn append(&mut self, line: String) -> Result<()> {
        if matches!(self.state, WriterState::Closed) {
            return Err(Error::WriterClosed(self.channel.as_str()));
        }
        self.buffer.push(line);
        if self.buffer.len() >= self.config.buffer_size {
            self.flush().await;
        }
        Ok(())
    }

    /// Writes all buffered records to the active file.
    ///
    /// The buffer is swapped for an empty one before writing. On a write
    /// fault the captured batch is dropped and reported; the writer stays
    /// open and accepts subsequent appends.
    pub(crate) async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let WriterState::Open { file, bytes, .. } = &mut self.state else {
            return;
        };

        let batch = std::mem::take(&mut self.buffer);
        let count = batch.len();
        let payload = Bytes::from(batch.concat());

        match file.write_all(&payload).await {
            Ok(()) => {
                *bytes += payload.len() as u64;
                let labels = ChannelLabels::new(self.channel);
                self.metrics.flushes.get_or_create(&labels).inc();
                self.metrics
                    .flushed_bytes
                    .get_or_create(&labels)
                    .inc_by(payload.len() as u64);
            }
            Err(err) => {
                self.metrics
                    .records_dropped
                    .get_or_create(&ChannelLabels::new(self.channel))
                    .inc_by(count as u64);
                tracing::error!(
                    channel = self.channel.as_str(),
                    records = count,
                    %err,
                    "log write failed, dropping batch"
                );
            }
        }
    }

    /// Rotates if the tracked size exceeds the configured maximum. Returns
    /// whether a rotation happened; at or below the limit this is a no-op and
    /// the sequence number is untouched.
    pub(crate) async fn maybe_rotate(&mut self) -> Result<bool> {
        let oversized = matches!(
            &self.state,
            WriterState::Open { bytes, .. } if *bytes > self.config.max_file_size
        );
        if !oversized {
            return Ok(false);
        }
        self.rotate().await?;
        Ok(true)
    }

    /// Closes the current file handle, increments the sequence counter, and
    /// opens the next active file with a zeroed byte counter. Buffered
    /// records carry over to the new file, preserving append order.
    async fn rotate(&mut self) -> Result<()> {
        let next = match &self.state {
            WriterState::Open { sequence, .. } => sequence + 1,
            _ => 1,
        };
        let name = active_file_name(self.channel, next);
        let path = self.dir.join(&name);
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;

        self.state = WriterState::Open {
            file,
            path,
            sequence: next,
            bytes: 0,
        };
        self.metrics
            .rotations
            .get_or_create(&ChannelLabels::new(self.channel))
            .inc();
        tracing::info!(channel = self.channel.as_str(), file = %name, "opened new active log file");
        Ok(())
    }

    /// Flushes pending records and closes the writer. Further appends are
    /// rejected.
    pub(crate) async fn close(&mut self) {
        self.flush().await;
        if let WriterState::Open { file, .. } = &mut self.state {
            if let Err(err) = file.sync_all().await {
                tracing::warn!(
                    channel = self.channel.as_str(),
                    %err,
                    "failed to sync log file on close"
                );
            }
        }
        self.state = WriterState::Closed;
    }

    /// Records currently waiting in the buffer.
    pub(crate) fn buffer_depth(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes tracked for the current active file.
    pub(crate) fn tracked_bytes(&self) -> u64 {
        match &self.state {
            WriterState::Open { bytes, .. } => *bytes,
            _ => 0,
        }
    }

    /// Path of the currently open active file.
    pub(crate) fn current_path(&self) -> Option<&Path> {
        match &self.state {
            WriterState::Open { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Name of the currently open active file.
    pub(crate) fn current_file_name(&self) -> Option<String> {
        self.current_path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    /// Sequence number of the currently open active file.
    #[cfg(test)]
    pub(crate) fn current_sequence(&self) -> Option<u32> {
        match &self.state {
            WriterState::Open { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }
}
