//! Configuration for the telemetry logger.
//!
//! All tunables live in one struct constructed at startup. The
//! production/development split is an explicit [`Environment`] value injected
//! into the components that need it, never read from ambient process state.

use std::path::PathBuf;
use std::time::Duration;

const GIB: u64 = 1024 * 1024 * 1024;

/// Deployment environment.
///
/// Controls whether client addresses are truncated in records and whether the
/// log inspection endpoints are served at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Returns true for production deployments.
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Single-letter tag persisted in each record.
    pub(crate) fn tag(self) -> char {
        match self {
            Environment::Production => 'p',
            Environment::Development => 'd',
        }
    }
}

/// Configuration for opening a [`TelemetryLogger`](crate::TelemetryLogger).
///
/// Defaults match the intended production posture: 1 GiB files, a 1 GiB
/// active-directory budget, compressed archives capped at 1000 files.
///
/// # Example
///
/// ```
/// use sitelog::TelemetryConfig;
///
/// let config = TelemetryConfig {
///     root_dir: "logs".into(),
///     ..TelemetryConfig::default()
/// };
/// assert_eq!(config.buffer_size, 200);
/// ```
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Directory holding the `active/` and `archive/` subdirectories.
    pub root_dir: PathBuf,

    /// Active file size that triggers rotation.
    pub max_file_size: u64,

    /// Informational budget for simultaneously active files. Reported in
    /// stats; not directly enforced.
    pub max_active_files: usize,

    /// Hard cap on archive file count. Oldest files beyond the cap are
    /// deleted unconditionally.
    pub max_archive_files: usize,

    /// Buffered records that trigger a synchronous flush.
    pub buffer_size: usize,

    /// Cadence of the periodic buffer flush. Bounds record staleness under
    /// low traffic.
    pub flush_interval: Duration,

    /// Cadence of the periodic rotation size check.
    pub rotation_check_interval: Duration,

    /// Cadence of the archive size check. The first pass runs one full
    /// interval after startup.
    pub archive_check_interval: Duration,

    /// Total active-directory size above which old files are archived. Soft
    /// budget: writers are never blocked and the total may transiently exceed
    /// it between checks.
    pub archive_size_threshold: u64,

    /// Gzip files after moving them into the archive directory.
    pub compress_archives: bool,

    /// Bound on the best-effort flush during shutdown. Records still buffered
    /// when it expires are lost.
    pub shutdown_grace: Duration,

    /// Deployment environment, injected at construction time.
    pub environment: Environment,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("logs"),
            max_file_size: GIB,
            max_active_files: 2,
            max_archive_files: 1000,
            buffer_size: 200,
            flush_interval: Duration::from_secs(3),
            rotation_check_interval: Duration::from_secs(10),
            archive_check_interval: Duration::from_secs(60),
            archive_size_threshold: GIB,
            compress_archives: true,
            shutdown_grace: Duration::from_secs(1),
            environment: Environment::Development,
        }
    }
}

impl TelemetryConfig {
    /// Directory holding the currently writable and recently closed files.
    pub fn active_dir(&self) -> PathBuf {
        self.root_dir.join("active")
    }

    /// Directory holding archived (possibly compressed) files.
    pub fn archive_dir(&self) -> PathBuf {
        self.root_dir.join("archive")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_documented_limits() {
        // given/when
        let config = TelemetryConfig::default();

        // then
        assert_eq!(config.max_file_size, GIB);
        assert_eq!(config.archive_size_threshold, GIB);
        assert_eq!(config.max_archive_files, 1000);
        assert_eq!(config.buffer_size, 200);
        assert_eq!(config.flush_interval, Duration::from_secs(3));
        assert!(config.compress_archives);
    }

    #[test]
    fn should_derive_subdirectories_from_root() {
        // given
        let config = TelemetryConfig {
            root_dir: PathBuf::from("/var/log/site"),
            ..TelemetryConfig::default()
        };

        // when/then
        assert_eq!(config.active_dir(), PathBuf::from("/var/log/site/active"));
        assert_eq!(config.archive_dir(), PathBuf::from("/var/log/site/archive"));
    }

    #[test]
    fn should_tag_environment_with_single_letter() {
        assert_eq!(Environment::Production.tag(), 'p');
        assert_eq!(Environment::Development.tag(), 'd');
        assert!(Environment::Production.is_production());
        assert!(!Environment::Development.is_production());
    }
}
