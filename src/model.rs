//! Core data types: channels, exchanges, and compact records.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One of the two independent log streams.
///
/// The access channel receives every exchange; the error channel only
/// server-fault exchanges (status >= 500). Each channel owns its own file,
/// buffer, and counters - they never touch shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Access,
    Error,
}

impl Channel {
    /// File-name prefix for this channel's log files.
    pub fn prefix(self) -> &'static str {
        match self {
            Channel::Access => "a",
            Channel::Error => "e",
        }
    }

    /// Human-readable channel name.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Access => "access",
            Channel::Error => "error",
        }
    }
}

/// Transient description of one completed HTTP exchange.
///
/// Created by the HTTP layer, consumed once by the record encoder, then
/// discarded.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Request method ("GET", "POST", ...).
    pub method: String,
    /// Request target as received: path plus query string.
    pub url: String,
    /// Response status code.
    pub status: u16,
    /// Time from request arrival to response completion.
    pub duration: Duration,
    /// Response size in bytes, 0 when unknown.
    pub response_size: u64,
    /// Client address.
    pub client_addr: String,
    /// User-Agent header value, empty when absent.
    pub user_agent: String,
    /// Referer header value, empty when absent.
    pub referrer: String,
    /// Content-Type header value of the request.
    pub content_type: Option<String>,
    /// Number of query parameters on the request.
    pub query_param_count: u32,
    /// Host the request was addressed to.
    pub host: String,
}

/// Device class derived from the user agent. Bot detection wins over the
/// other axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    #[serde(rename = "d")]
    Desktop,
    #[serde(rename = "m")]
    Mobile,
    #[serde(rename = "b")]
    Bot,
}

/// How the visitor arrived at the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferrerClass {
    /// No referrer header.
    #[serde(rename = "d")]
    Direct,
    /// Referred by a known search engine.
    #[serde(rename = "s")]
    Search,
    /// Referred by a known social network.
    #[serde(rename = "m")]
    Social,
    /// Referred by this site itself.
    #[serde(rename = "i")]
    Internal,
    /// Any other referrer.
    #[serde(rename = "e")]
    External,
}

/// The persisted unit: one compact, immutable record per HTTP exchange.
///
/// Serialized as a single JSON line with short field names. Every field is
/// present or explicitly omitted; no field exceeds its declared length cap
/// (`u` <= 200 chars, `ua` <= 80, `ct` <= 20, `sid` = 8 hex, `id` = 6 hex).
/// The format is lossy by design - built for analytics aggregation, not
/// request reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactRecord {
    /// Unix timestamp, seconds.
    pub t: u64,
    /// Short random request id, 6 hex chars.
    pub id: String,
    /// Session fingerprint, 8 hex chars. One-way hash of client address and
    /// user agent; intentionally collision-prone across users sharing both.
    pub sid: String,
    /// Method initial (G, P, ...).
    pub m: char,
    /// Compacted URL.
    pub u: String,
    /// Status code.
    pub s: u16,
    /// Response time, whole milliseconds.
    pub rt: u64,
    /// Response size, bytes.
    pub sz: u64,
    /// Device class.
    pub d: DeviceClass,
    /// Browser code: c, f, s, e, i, o.
    pub br: char,
    /// Operating system code: w, m, l, a, i, o.
    pub os: char,
    /// Client address, truncated in production.
    pub ip: String,
    /// Page-type code.
    pub p: char,
    /// Referrer classification.
    #[serde(rename = "ref")]
    pub ref_type: ReferrerClass,
    /// Referrer domain label, empty for direct visits.
    pub rf: String,
    /// Truncated user agent.
    pub ua: String,
    /// Environment tag: p or d.
    pub env: char,
    /// 1 only for server faults (status >= 500). Statuses 400-499 are
    /// deliberately not errors.
    pub err: u8,
    /// Status code when `err` is 1, else 0.
    pub errc: u16,
    /// Query parameter count, omitted when zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qp: Option<u32>,
    /// Content-type prefix, omitted when the request carried none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<String>,
    /// Resident memory of the server process, MB.
    pub mem: u64,
}

impl CompactRecord {
    /// Serializes the record to one newline-terminated JSON line.
    pub fn to_line(&self) -> crate::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> CompactRecord {
        CompactRecord {
            t: 1_700_000_000,
            id: "a1b2c3".to_string(),
            sid: "deadbeef".to_string(),
            m: 'G',
            u: "/".to_string(),
            s: 200,
            rt: 12,
            sz: 1024,
            d: DeviceClass::Desktop,
            br: 'c',
            os: 'l',
            ip: "203.0.113.7".to_string(),
            p: 'h',
            ref_type: ReferrerClass::Direct,
            rf: String::new(),
            ua: "curl/8.0".to_string(),
            env: 'd',
            err: 0,
            errc: 0,
            qp: None,
            ct: None,
            mem: 42,
        }
    }

    #[test]
    fn should_serialize_to_single_newline_terminated_line() {
        // given
        let record = sample_record();

        // when
        let line = record.to_line().unwrap();

        // then
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn should_omit_absent_optional_fields() {
        // given
        let record = sample_record();

        // when
        let line = record.to_line().unwrap();

        // then
        assert!(!line.contains("\"qp\""));
        assert!(!line.contains("\"ct\""));
    }

    #[test]
    fn should_round_trip_through_jsonl() {
        // given
        let record = CompactRecord {
            qp: Some(3),
            ct: Some("application/json".to_string()),
            ref_type: ReferrerClass::Search,
            rf: "google".to_string(),
            d: DeviceClass::Bot,
            ..sample_record()
        };

        // when
        let line = record.to_line().unwrap();
        let parsed: CompactRecord = serde_json::from_str(line.trim_end()).unwrap();

        // then
        assert_eq!(parsed, record);
    }

    #[test]
    fn should_use_short_codes_for_classifications() {
        // given
        let record = CompactRecord {
            d: DeviceClass::Mobile,
            ref_type: ReferrerClass::Social,
            ..sample_record()
        };

        // when
        let line = record.to_line().unwrap();

        // then
        assert!(line.contains("\"d\":\"m\""));
        assert!(line.contains("\"ref\":\"m\""));
    }

    #[test]
    fn should_expose_channel_prefixes() {
        assert_eq!(Channel::Access.prefix(), "a");
        assert_eq!(Channel::Error.prefix(), "e");
        assert_eq!(Channel::Access.as_str(), "access");
        assert_eq!(Channel::Error.as_str(), "error");
    }
}
