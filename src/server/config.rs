//! CLI arguments and server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{Environment, TelemetryConfig};

/// Command-line arguments for the sitelog server binary.
#[derive(Parser, Debug)]
#[command(name = "sitelog", about = "Web server with compact request telemetry")]
pub struct CliArgs {
    /// Port to listen on.
    #[arg(long, default_value_t = 3000)]
    pub port: u16,

    /// Directory holding the active/ and archive/ log subdirectories.
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Deployment environment. Production disables the inspection API and
    /// truncates client addresses in records.
    #[arg(long, value_enum, default_value = "development")]
    pub environment: Environment,

    /// Active file size in bytes that triggers rotation.
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Hard cap on archive file count.
    #[arg(long)]
    pub max_archive_files: Option<usize>,

    /// Buffered records that trigger a flush.
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Seconds between periodic buffer flushes.
    #[arg(long)]
    pub flush_interval_secs: Option<u64>,

    /// Seconds between archive size checks.
    #[arg(long)]
    pub archive_interval_secs: Option<u64>,

    /// Active-directory size in bytes that triggers archiving.
    #[arg(long)]
    pub archive_size_threshold: Option<u64>,

    /// Disable gzip compression of archived files.
    #[arg(long)]
    pub no_compress_archives: bool,
}

impl CliArgs {
    /// Builds the telemetry configuration: defaults overlaid with any
    /// command-line overrides.
    pub fn to_telemetry_config(&self) -> TelemetryConfig {
        let mut config = TelemetryConfig {
            root_dir: self.log_dir.clone(),
            environment: self.environment,
            ..TelemetryConfig::default()
        };
        if let Some(max_file_size) = self.max_file_size {
            config.max_file_size = max_file_size;
        }
        if let Some(max_archive_files) = self.max_archive_files {
            config.max_archive_files = max_archive_files;
        }
        if let Some(buffer_size) = self.buffer_size {
            config.buffer_size = buffer_size;
        }
        if let Some(secs) = self.flush_interval_secs {
            config.flush_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.archive_interval_secs {
            config.archive_check_interval = Duration::from_secs(secs);
        }
        if let Some(threshold) = self.archive_size_threshold {
            config.archive_size_threshold = threshold;
        }
        if self.no_compress_archives {
            config.compress_archives = false;
        }
        config
    }
}

/// Settings for the HTTP server itself.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: Environment,
}

impl From<&CliArgs> for ServerConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            port: args.port,
            environment: args.environment,
        }
    }
}
