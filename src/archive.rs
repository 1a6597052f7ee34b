//! Size-based archiving with compression and the archive-count ceiling.
//!
//! Two responsibilities with different triggers: a periodic pass that keeps
//! the active directory under a soft size budget by migrating the oldest
//! files into the archive, and a hard cap on archive file count that deletes
//! the oldest excess unconditionally. Archived data is otherwise retained
//! indefinitely.

use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::Result;
use crate::files::{self, COMPRESSED_SUFFIX, FileInfo};
use crate::metrics::TelemetryMetrics;

/// Outcome of one size-based archiving pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ArchiveSummary {
    /// Files moved into the archive directory.
    pub archived: usize,
    /// Bytes those files held when moved.
    pub archived_bytes: u64,
    /// Archive files deleted by the count ceiling.
    pub deleted: usize,
}

pub(crate) struct Archiver {
    active_dir: PathBuf,
    archive_dir: PathBuf,
    size_threshold: u64,
    max_archive_files: usize,
    compress: bool,
    metrics: TelemetryMetrics,
}

impl Archiver {
    pub(crate) fn new(
        active_dir: PathBuf,
        archive_dir: PathBuf,
        size_threshold: u64,
        max_archive_files: usize,
        compress: bool,
        metrics: TelemetryMetrics,
    ) -> Self {
        Self {
            active_dir,
            archive_dir,
            size_threshold,
            max_archive_files,
            compress,
            metrics,
        }
    }

    /// One size-based pass over the active directory.
    ///
    /// Lists all active files fresh (never cached), and when their total size
    /// exceeds the threshold, moves the oldest files - skipping the paths in
    /// `in_use`, which are the files currently open for writing - until the
    /// total falls to the threshold or candidates run out. This is soft
    /// enforcement: writers are never blocked and the total may transiently
    /// exceed the budget between passes. Ends with the count-ceiling check.
    pub(crate) async fn run_pass(&self, in_use: &[PathBuf]) -> Result<ArchiveSummary> {
        let mut candidates = files::list_dir(&self.active_dir).await?;
        let mut total: u64 = candidates.iter().map(|f| f.size).sum();
        let mut summary = ArchiveSummary::default();

        if total > self.size_threshold {
            tracing::info!(
                total_bytes = total,
                threshold = self.size_threshold,
                "active directory over size threshold"
            );
            // Oldest first; name as a deterministic tie-break.
            candidates.sort_by(|a, b| {
                a.modified
                    .cmp(&b.modified)
                    .then_with(|| a.name.cmp(&b.name))
            });

            for info in &candidates {
                if in_use.contains(&info.path) {
                    continue;
                }
                self.move_to_archive(info).await?;
                summary.archived += 1;
                summary.archived_bytes += info.size;
                total = total.saturating_sub(info.size);
                if total <= self.size_threshold {
                    break;
                }
            }

            if summary.archived > 0 {
                tracing::info!(
                    files = summary.archived,
                    bytes = summary.archived_bytes,
                    "archived active log files"
                );
            }
        }

        summary.deleted = self.enforce_cap().await?;
        Ok(summary)
    }

    /// Renames the file into the archive directory, then optionally
    /// compresses it. Active-directory accounting is correct as soon as the
    /// rename completes; compression happens on the archived copy.
    async fn move_to_archive(&self, info: &FileInfo) -> Result<()> {
        let target = self.archive_dir.join(&info.name);
        tokio::fs::rename(&info.path, &target).await?;
        self.metrics.files_archived.inc();

        if self.compress {
            if let Err(err) = self.compress_archived(&target).await {
                // The uncompressed archive stays in place; only the space
                // savings are lost.
                tracing::warn!(file = %target.display(), %err, "archive compression failed");
            }
        }
        Ok(())
    }

    /// Streams the file through gzip into a `.gz` sibling and removes the
    /// uncompressed copy only on success. A failed attempt removes the
    /// partial output and keeps the original.
    async fn compress_archived(&self, path: &Path) -> Result<()> {
        let source = path.to_path_buf();
        let mut target_name = source.clone().into_os_string();
        target_name.push(COMPRESSED_SUFFIX);
        let target = PathBuf::from(target_name);

        let outcome = tokio::task::spawn_blocking({
            let source = source.clone();
            let target = target.clone();
            move || gzip_file(&source, &target)
        })
        .await;

        match outcome {
            Ok(Ok(())) => {
                tokio::fs::remove_file(&source).await?;
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = tokio::fs::remove_file(&target).await;
                Err(err.into())
            }
            Err(join_err) => {
                let _ = tokio::fs::remove_file(&target).await;
                Err(std::io::Error::other(join_err).into())
            }
        }
    }

    /// Deletes the oldest archive files beyond the hard cap, ordered by the
    /// sequence number embedded in the name. A safety valve, not a retention
    /// policy: below the cap nothing is ever deleted.
    pub(crate) async fn enforce_cap(&self) -> Result<usize> {
        let mut archived: Vec<FileInfo> = files::list_dir(&self.archive_dir)
            .await?
            .into_iter()
            .filter(|f| files::is_log_file(&f.name))
            .collect();

        if archived.len() <= self.max_archive_files {
            return Ok(0);
        }

        archived.sort_by(|a, b| {
            files::embedded_sequence(&a.name)
                .cmp(&files::embedded_sequence(&b.name))
                .then_with(|| a.name.cmp(&b.name))
        });

        let excess = archived.len() - self.max_archive_files;
        let mut deleted = 0;
        for info in archived.iter().take(excess) {
            match tokio::fs::remove_file(&info.path).await {
                Ok(()) => {
                    deleted += 1;
                    self.metrics.archives_deleted.inc();
                    tracing::warn!(file = %info.name, "removed archive file over the count ceiling");
                }
                Err(err) => {
                    tracing::warn!(file = %info.name, %err, "failed to remove archive file");
                }
            }
        }
        Ok(deleted)
    }
}

/// Gzip `source` into `target`. Blocking; runs under `spawn_blocking`.
fn gzip_file(source: &Path, target: &Path) -> std::io::Result<()> {
    let mut input = std::fs::File::open(source)?;
    let output = std::fs::File::create(target)?;
    let mut encoder = GzEncoder::new(output, Compression::new(6));
    std::io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::model::Channel;

    struct Fixture {
        _root: tempfile::TempDir,
        active: PathBuf,
        archive: PathBuf,
    }

    impl Fixture {
        async fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let active = root.path().join("active");
            let archive = root.path().join("archive");
            tokio::fs::create_dir_all(&active).await.unwrap();
            tokio::fs::create_dir_all(&archive).await.unwrap();
            Self {
                _root: root,
                active,
                archive,
            }
        }

        fn archiver(&self, threshold: u64, cap: usize, compress: bool) -> Archiver {
            Archiver::new(
                self.active.clone(),
                self.archive.clone(),
                threshold,
                cap,
                compress,
                TelemetryMetrics::new(),
            )
        }

        /// Writes sequentially named active files of `size` bytes each,
        /// oldest first, and returns their paths.
        async fn seed_active(&self, channel: Channel, count: u32, size: usize) -> Vec<PathBuf> {
            let mut paths = Vec::new();
            for seq in 1..=count {
                let path = self.active.join(files::active_file_name(channel, seq));
                tokio::fs::write(&path, vec![b'x'; size]).await.unwrap();
                paths.push(path);
                // Keep mtimes strictly ordered even on coarse filesystems.
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            paths
        }

        async fn names_in(&self, dir: &Path) -> Vec<String> {
            let mut names: Vec<String> = files::list_dir(dir)
                .await
                .unwrap()
                .into_iter()
                .map(|f| f.name)
                .collect();
            names.sort();
            names
        }
    }

    #[tokio::test]
    async fn should_archive_oldest_files_until_total_reaches_threshold() {
        // given: 6 files x 200 bytes = 1200 total against a 1000 threshold
        let fx = Fixture::new().await;
        let paths = fx.seed_active(Channel::Access, 6, 200).await;
        let in_use = vec![paths[4].clone(), paths[5].clone()];
        let archiver = fx.archiver(1000, 100, false);

        // when
        let summary = archiver.run_pass(&in_use).await.unwrap();

        // then: one oldest file moved brings the total to exactly 1000
        assert_eq!(summary.archived, 1);
        assert_eq!(summary.archived_bytes, 200);
        assert_eq!(fx.names_in(&fx.archive).await, vec!["a-000001.jsonl"]);
        assert_eq!(fx.names_in(&fx.active).await.len(), 5);
    }

    #[tokio::test]
    async fn should_skip_currently_open_files_even_when_oldest() {
        // given: the two oldest files are the ones open for writing
        let fx = Fixture::new().await;
        let paths = fx.seed_active(Channel::Access, 3, 500).await;
        let in_use = vec![paths[0].clone(), paths[1].clone()];
        let archiver = fx.archiver(1000, 100, false);

        // when: total 1500 > 1000
        let summary = archiver.run_pass(&in_use).await.unwrap();

        // then: only the newest (non-open) file is a candidate
        assert_eq!(summary.archived, 1);
        assert_eq!(fx.names_in(&fx.archive).await, vec!["a-000003.jsonl"]);
        assert!(fx.active.join("a-000001.jsonl").exists());
        assert!(fx.active.join("a-000002.jsonl").exists());
    }

    #[tokio::test]
    async fn should_do_nothing_at_or_below_threshold() {
        // given
        let fx = Fixture::new().await;
        fx.seed_active(Channel::Access, 2, 500).await;
        let archiver = fx.archiver(1000, 100, false);

        // when: total is exactly the threshold
        let summary = archiver.run_pass(&[]).await.unwrap();

        // then
        assert_eq!(summary, ArchiveSummary::default());
        assert_eq!(fx.names_in(&fx.active).await.len(), 2);
        assert!(fx.names_in(&fx.archive).await.is_empty());
    }

    #[tokio::test]
    async fn should_exhaust_candidates_without_going_below_threshold() {
        // given: everything except the in-use file must move and the total
        // still stays above the threshold
        let fx = Fixture::new().await;
        let paths = fx.seed_active(Channel::Access, 3, 400).await;
        let in_use = vec![paths[2].clone()];
        let archiver = fx.archiver(100, 100, false);

        // when
        let summary = archiver.run_pass(&in_use).await.unwrap();

        // then
        assert_eq!(summary.archived, 2);
        assert_eq!(fx.names_in(&fx.active).await, vec!["a-000003.jsonl"]);
    }

    #[tokio::test]
    async fn should_compress_archived_file_and_drop_uncompressed_copy() {
        // given
        let fx = Fixture::new().await;
        let content = "line-1\nline-2\nline-3\n".repeat(40);
        let path = fx.active.join("a-000001.jsonl");
        tokio::fs::write(&path, &content).await.unwrap();
        let archiver = fx.archiver(0, 100, true);

        // when
        let summary = archiver.run_pass(&[]).await.unwrap();

        // then: only the .gz remains, and it decompresses to the original bytes
        assert_eq!(summary.archived, 1);
        assert_eq!(fx.names_in(&fx.archive).await, vec!["a-000001.jsonl.gz"]);

        let gz = std::fs::File::open(fx.archive.join("a-000001.jsonl.gz")).unwrap();
        let mut decoded = String::new();
        flate2::read::GzDecoder::new(gz)
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, content);
    }

    #[tokio::test]
    async fn should_delete_exactly_the_oldest_files_over_the_cap() {
        // given: 12 archive files against a cap of 10
        let fx = Fixture::new().await;
        for seq in 1..=12u32 {
            let name = files::active_file_name(Channel::Access, seq);
            tokio::fs::write(fx.archive.join(name), "x").await.unwrap();
        }
        let archiver = fx.archiver(u64::MAX, 10, false);

        // when
        let deleted = archiver.enforce_cap().await.unwrap();

        // then: the two lowest sequences are gone, the rest remain
        assert_eq!(deleted, 2);
        let remaining = fx.names_in(&fx.archive).await;
        assert_eq!(remaining.len(), 10);
        assert_eq!(remaining.first().map(String::as_str), Some("a-000003.jsonl"));
        assert_eq!(remaining.last().map(String::as_str), Some("a-000012.jsonl"));
    }

    #[tokio::test]
    async fn should_order_cap_by_embedded_sequence_across_compressed_files() {
        // given: mixed compressed and plain archives, written out of order
        let fx = Fixture::new().await;
        tokio::fs::write(fx.archive.join("a-000005.jsonl"), "x")
            .await
            .unwrap();
        tokio::fs::write(fx.archive.join("a-000001.jsonl.gz"), "x")
            .await
            .unwrap();
        tokio::fs::write(fx.archive.join("a-000003.jsonl.gz"), "x")
            .await
            .unwrap();
        let archiver = fx.archiver(u64::MAX, 2, false);

        // when
        let deleted = archiver.enforce_cap().await.unwrap();

        // then: the lowest embedded sequence goes first
        assert_eq!(deleted, 1);
        let remaining = fx.names_in(&fx.archive).await;
        assert_eq!(remaining, vec!["a-000003.jsonl.gz", "a-000005.jsonl"]);
    }

    #[tokio::test]
    async fn should_delete_two_hundred_of_twelve_hundred_at_default_cap() {
        // given: 1200 archive files against the default cap of 1000
        let fx = Fixture::new().await;
        for seq in 1..=1200u32 {
            let name = files::active_file_name(Channel::Access, seq);
            tokio::fs::write(fx.archive.join(name), "").await.unwrap();
        }
        let archiver = fx.archiver(u64::MAX, 1000, false);

        // when
        let deleted = archiver.enforce_cap().await.unwrap();

        // then: exactly the 200 oldest-by-sequence files are gone
        assert_eq!(deleted, 200);
        let remaining = fx.names_in(&fx.archive).await;
        assert_eq!(remaining.len(), 1000);
        assert_eq!(remaining.first().map(String::as_str), Some("a-000201.jsonl"));
        assert_eq!(remaining.last().map(String::as_str), Some("a-001200.jsonl"));
    }

    #[tokio::test]
    async fn should_never_delete_at_or_below_the_cap() {
        // given
        let fx = Fixture::new().await;
        for seq in 1..=5u32 {
            let name = files::active_file_name(Channel::Error, seq);
            tokio::fs::write(fx.archive.join(name), "x").await.unwrap();
        }
        let archiver = fx.archiver(u64::MAX, 5, false);

        // when
        let deleted = archiver.enforce_cap().await.unwrap();

        // then
        assert_eq!(deleted, 0);
        assert_eq!(fx.names_in(&fx.archive).await.len(), 5);
    }

    #[tokio::test]
    async fn should_ignore_foreign_files_in_archive_cap() {
        // given: a stray file that is not a log
        let fx = Fixture::new().await;
        tokio::fs::write(fx.archive.join("README.txt"), "keep me")
            .await
            .unwrap();
        tokio::fs::write(fx.archive.join("a-000001.jsonl"), "x")
            .await
            .unwrap();
        tokio::fs::write(fx.archive.join("a-000002.jsonl"), "x")
            .await
            .unwrap();
        let archiver = fx.archiver(u64::MAX, 1, false);

        // when
        let deleted = archiver.enforce_cap().await.unwrap();

        // then: only log files count toward (and are deleted by) the cap
        assert_eq!(deleted, 1);
        let remaining = fx.names_in(&fx.archive).await;
        assert_eq!(remaining, vec!["README.txt", "a-000002.jsonl"]);
    }
}
