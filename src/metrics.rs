//! Prometheus metrics for the record pipeline.
//!
//! The logger owns these counters and registers them into the server's
//! registry at startup, the same hand-off the HTTP metrics use.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use crate::model::Channel;

/// Channel label value for per-channel counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ChannelLabel {
    Access,
    Error,
}

impl From<Channel> for ChannelLabel {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Access => ChannelLabel::Access,
            Channel::Error => ChannelLabel::Error,
        }
    }
}

/// Label set for per-channel counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ChannelLabels {
    pub channel: ChannelLabel,
}

impl ChannelLabels {
    pub(crate) fn new(channel: Channel) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

/// Counters for the record pipeline. Cloning shares the underlying metrics.
#[derive(Clone)]
pub struct TelemetryMetrics {
    /// Records accepted per channel.
    pub records: Family<ChannelLabels, Counter>,
    /// Records dropped because a flush failed.
    pub records_dropped: Family<ChannelLabels, Counter>,
    /// Completed flushes per channel.
    pub flushes: Family<ChannelLabels, Counter>,
    /// Bytes written to active files per channel.
    pub flushed_bytes: Family<ChannelLabels, Counter>,
    /// File rotations per channel.
    pub rotations: Family<ChannelLabels, Counter>,
    /// Files moved into the archive directory.
    pub files_archived: Counter,
    /// Archive files deleted by the count ceiling.
    pub archives_deleted: Counter,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            records: Family::default(),
            records_dropped: Family::default(),
            flushes: Family::default(),
            flushed_bytes: Family::default(),
            rotations: Family::default(),
            files_archived: Counter::default(),
            archives_deleted: Counter::default(),
        }
    }

    /// Registers all pipeline metrics into the given registry.
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "sitelog_records",
            "Records accepted by channel",
            self.records.clone(),
        );
        registry.register(
            "sitelog_records_dropped",
            "Records dropped because a flush failed",
            self.records_dropped.clone(),
        );
        registry.register(
            "sitelog_flushes",
            "Buffer flushes completed by channel",
            self.flushes.clone(),
        );
        registry.register(
            "sitelog_flushed_bytes",
            "Bytes written to active log files by channel",
            self.flushed_bytes.clone(),
        );
        registry.register(
            "sitelog_rotations",
            "Active file rotations by channel",
            self.rotations.clone(),
        );
        registry.register(
            "sitelog_files_archived",
            "Files moved into the archive directory",
            self.files_archived.clone(),
        );
        registry.register(
            "sitelog_archives_deleted",
            "Archive files deleted by the count ceiling",
            self.archives_deleted.clone(),
        );
    }

    /// Convenience accessor for a per-channel counter value in tests and
    /// stats.
    pub fn records_for(&self, channel: Channel) -> u64 {
        self.records.get_or_create(&ChannelLabels::new(channel)).get()
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}
