//! sitelog - a small web server built around a compact request-telemetry logger.
//!
//! Every completed HTTP exchange is encoded into one dense, analytics-ready
//! record and appended to a rotating on-disk log without ever blocking the
//! request path.
//!
//! # Architecture
//!
//! The pipeline is a chain of five components, leaves first:
//!
//! - **Field compaction** ([`compact_url`], [`referrer_domain`]): pure, lossy
//!   shrinking of URLs and referrers into short canonical tokens.
//! - **Record encoding**: one [`CompactRecord`] per exchange, derived from
//!   request/response metadata. Every derivation has a safe default; encoding
//!   never fails a record.
//! - **Buffered channel writers** (one per [`Channel`]): in-memory buffers
//!   appended to the currently open active file on threshold or timer.
//! - **Rotation**: size-triggered file swaps with monotonic per-channel
//!   sequence numbers, recovered across restarts by scanning the active
//!   directory.
//! - **Archiving**: periodic migration of old active files into a compressed
//!   archive directory under a soft size budget and a hard count ceiling.
//!
//! # Example
//!
//! ```ignore
//! use sitelog::{TelemetryConfig, TelemetryLogger};
//!
//! let logger = TelemetryLogger::open(TelemetryConfig::default()).await?;
//! logger.record(&exchange).await;
//! logger.shutdown().await;
//! ```

mod archive;
mod clock;
mod compact;
mod config;
mod encode;
mod error;
mod files;
mod logger;
mod mem;
mod metrics;
mod model;
pub mod server;
mod writer;

pub use compact::{compact_url, referrer_domain};
pub use config::{Environment, TelemetryConfig};
pub use error::{Error, Result};
pub use logger::{LoggerStats, TelemetryLogger};
pub use metrics::TelemetryMetrics;
pub use model::{Channel, CompactRecord, DeviceClass, Exchange, ReferrerClass};
