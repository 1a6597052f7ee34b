//! Log file naming and directory scans.
//!
//! Active files follow `{channel-prefix}-{6-digit sequence}.jsonl`; archived
//! files keep the same name with an optional `.gz` suffix. The parser here is
//! also the validator used by the download endpoint: a name that does not
//! round-trip through it never reaches the filesystem.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;
use crate::model::Channel;

/// Extension shared by active and archived log files.
pub(crate) const LOG_EXTENSION: &str = "jsonl";

/// Suffix appended to a compressed archive file.
pub(crate) const COMPRESSED_SUFFIX: &str = ".gz";

const SEQUENCE_DIGITS: usize = 6;

/// Builds the name of a channel's active file, e.g. `a-000001.jsonl`.
pub(crate) fn active_file_name(channel: Channel, sequence: u32) -> String {
    format!(
        "{}-{:0width$}.{}",
        channel.prefix(),
        sequence,
        LOG_EXTENSION,
        width = SEQUENCE_DIGITS
    )
}

/// Parses an active file name back into channel and sequence.
///
/// Returns `None` unless the name matches the pattern exactly: a known
/// channel prefix, a dash, exactly six digits, and the `.jsonl` extension.
pub(crate) fn parse_active_file_name(name: &str) -> Option<(Channel, u32)> {
    let (prefix, rest) = name.split_once('-')?;
    let channel = match prefix {
        "a" => Channel::Access,
        "e" => Channel::Error,
        _ => return None,
    };
    let digits = rest.strip_suffix(LOG_EXTENSION)?.strip_suffix('.')?;
    if digits.len() != SEQUENCE_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sequence = digits.parse().ok()?;
    Some((channel, sequence))
}

/// First run of digits embedded in a file name, used for oldest-first
/// ordering of archive files (compressed or not).
pub(crate) fn embedded_sequence(name: &str) -> Option<u64> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Whether a name looks like a log file this system produced, compressed or
/// not.
pub(crate) fn is_log_file(name: &str) -> bool {
    name.ends_with(".jsonl") || name.ends_with(".jsonl.gz")
}

/// A directory entry with the metadata the controllers need.
#[derive(Debug, Clone)]
pub(crate) struct FileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Lists the regular files of a directory with size and mtime.
///
/// Entries whose metadata cannot be read are skipped with a warning rather
/// than failing the listing. Callers re-read this on every timer tick; the
/// listing is never cached.
pub(crate) async fn list_dir(dir: &Path) -> Result<Vec<FileInfo>> {
    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(file = %name, %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        entries.push(FileInfo {
            path: entry.path(),
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            name,
        });
    }
    Ok(entries)
}

/// Finds the highest-numbered active file for a channel, with its path and
/// current size. `None` when the channel has no files yet.
///
/// The sequence comes from file names alone, so it is recovered even when a
/// size lookup fails - in that case the tracked size restarts at 0 rather
/// than risking a reused sequence number.
pub(crate) async fn latest_active_file(
    dir: &Path,
    channel: Channel,
) -> Result<Option<(u32, PathBuf, u64)>> {
    let mut latest: Option<(u32, PathBuf)> = None;
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let Some((file_channel, sequence)) = parse_active_file_name(&name) else {
            continue;
        };
        if file_channel != channel {
            continue;
        }
        if latest.as_ref().map_or(true, |(s, _)| sequence > *s) {
            latest = Some((sequence, entry.path()));
        }
    }

    let Some((sequence, path)) = latest else {
        return Ok(None);
    };
    let size = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        Err(err) => {
            tracing::warn!(file = %path.display(), %err, "could not read active file size");
            0
        }
    };
    Ok(Some((sequence, path, size)))
}
