//! Compact record encoding.
//!
//! Turns one [`Exchange`] into one [`CompactRecord`]. Classification runs
//! ordered rule lists over the user agent and URL - first match wins, with
//! an "other" default on every axis. No derivation can fail a record: every
//! path has a safe default value.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::compact::{compact_url, referrer_domain, truncate_chars};
use crate::config::Environment;
use crate::mem::MemorySampler;
use crate::model::{CompactRecord, DeviceClass, Exchange, ReferrerClass};

const MAX_USER_AGENT_LEN: usize = 80;
const MAX_CONTENT_TYPE_LEN: usize = 20;
const MAX_CLIENT_ADDR_LEN: usize = 15;
const FINGERPRINT_HEX_LEN: usize = 8;

const BOT_MARKERS: &[&str] = &["bot", "crawler", "spider"];
const MOBILE_MARKERS: &[&str] = &["mobile", "android", "iphone", "ipad", "ipod"];

/// Browser detection rules, first match wins.
const BROWSER_RULES: &[(&str, char)] = &[
    ("chrome", 'c'),
    ("firefox", 'f'),
    ("safari", 's'),
    ("edge", 'e'),
    ("msie", 'i'),
    ("trident", 'i'),
];

/// OS detection rules, first match wins. Note the ordering quirk inherited
/// from the rule set: Android user agents advertise "Linux" and therefore
/// classify as `l`.
const OS_RULES: &[(&str, char)] = &[
    ("windows", 'w'),
    ("mac os x", 'm'),
    ("linux", 'l'),
    ("android", 'a'),
    ("ios", 'i'),
    ("iphone", 'i'),
    ("ipad", 'i'),
];

const HOMEPAGE_ALIASES: &[&str] = &[
    "/",
    "/index",
    "/index.html",
    "/index.htm",
    "/index.php",
    "/index.aspx",
    "/default",
    "/default.html",
];

const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "woff", "woff2", "ttf", "eot",
];

const SEARCH_MARKERS: &[&str] = &["google", "bing", "yahoo", "duckduckgo"];
const SOCIAL_MARKERS: &[&str] = &[
    "facebook",
    "twitter",
    "linkedin",
    "instagram",
    "youtube",
    "reddit",
    "pinterest",
];

/// Builds one [`CompactRecord`] per completed HTTP exchange.
///
/// Stateless apart from the environment injected at construction and the
/// memory sampler.
pub(crate) struct RecordEncoder {
    environment: Environment,
    memory: MemorySampler,
}

impl RecordEncoder {
    pub(crate) fn new(environment: Environment) -> Self {
        Self {
            environment,
            memory: MemorySampler::new(),
        }
    }

    /// Encodes an exchange at the given wall-clock time. Total: never fails.
    pub(crate) fn encode(&self, exchange: &Exchange, now: SystemTime) -> CompactRecord {
        let timestamp = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        let ua_lower = exchange.user_agent.to_ascii_lowercase();
        let is_error = exchange.status >= 500;
        let (ref_type, rf) = classify_referrer(&exchange.referrer, &exchange.host);

        CompactRecord {
            t: timestamp,
            id: request_id(),
            sid: session_fingerprint(&exchange.client_addr, &exchange.user_agent),
            m: exchange
                .method
                .chars()
                .next()
                .unwrap_or('G')
                .to_ascii_uppercase(),
            u: compact_url(&exchange.url),
            s: exchange.status,
            rt: exchange.duration.as_millis() as u64,
            sz: exchange.response_size,
            d: classify_device(&ua_lower),
            br: classify_browser(&ua_lower),
            os: classify_os(&ua_lower),
            ip: self.client_addr(&exchange.client_addr),
            p: classify_page(&exchange.url),
            ref_type,
            rf,
            ua: truncate_chars(&exchange.user_agent, MAX_USER_AGENT_LEN),
            env: self.environment.tag(),
            err: u8::from(is_error),
            errc: if is_error { exchange.status } else { 0 },
            qp: (exchange.query_param_count > 0).then_some(exchange.query_param_count),
            ct: exchange
                .content_type
                .as_deref()
                .map(|ct| truncate_chars(ct, MAX_CONTENT_TYPE_LEN)),
            mem: self.memory.resident_mb(),
        }
    }

    fn client_addr(&self, addr: &str) -> String {
        if self.environment.is_production() {
            truncate_chars(addr, MAX_CLIENT_ADDR_LEN)
        } else {
            addr.to_string()
        }
    }
}

/// 3 random bytes as 6 hex chars.
fn request_id() -> String {
    let bytes: [u8; 3] = rand::rng().random();
    hex::encode(bytes)
}

/// Coarse session proxy: one-way hash of address + user agent, truncated to
/// 8 hex chars. Intentionally collision-prone across users sharing both.
fn session_fingerprint(addr: &str, user_agent: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(addr.as_bytes());
    hasher.update(user_agent.as_bytes());
    hasher.finalize().to_hex().as_str()[..FINGERPRINT_HEX_LEN].to_string()
}

fn classify_device(ua_lower: &str) -> DeviceClass {
    if BOT_MARKERS.iter().any(|marker| ua_lower.contains(marker)) {
        return DeviceClass::Bot;
    }
    if MOBILE_MARKERS.iter().any(|marker| ua_lower.contains(marker)) {
        return DeviceClass::Mobile;
    }
    DeviceClass::Desktop
}

fn classify_browser(ua_lower: &str) -> char {
    BROWSER_RULES
        .iter()
        .find(|(marker, _)| ua_lower.contains(marker))
        .map(|(_, code)| *code)
        .unwrap_or('o')
}

fn classify_os(ua_lower: &str) -> char {
    OS_RULES
        .iter()
        .find(|(marker, _)| ua_lower.contains(marker))
        .map(|(_, code)| *code)
        .unwrap_or('o')
}

/// Page-type classification over the raw URL, first match wins.
fn classify_page(url: &str) -> char {
    if HOMEPAGE_ALIASES.contains(&url) {
        return 'h';
    }
    let lower = url.to_ascii_lowercase();
    if has_extension(&lower, STATIC_EXTENSIONS) {
        return 'r';
    }
    if lower.contains("/api/") || lower.starts_with("/api") {
        return 'x';
    }
    if lower.contains("/about") {
        return 'a';
    }
    if lower.contains("/contact") {
        return 'c';
    }
    if lower.contains("/service") {
        return 's';
    }
    if ["/product", "/shop", "/store"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return 'p';
    }
    if ["/blog", "/post", "/article", "/news"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return 'b';
    }
    if ["/admin", "/dashboard", "/cp", "/control"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return 'd';
    }
    if has_extension(&lower, &["html", "htm"]) {
        return 'h';
    }
    if has_extension(&lower, &["php", "asp", "aspx", "jsp"]) {
        return 's';
    }
    if has_extension(&lower, &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx"]) {
        return 'f';
    }
    'o'
}

fn has_extension(url: &str, extensions: &[&str]) -> bool {
    let Some((_, ext)) = url.rsplit_once('.') else {
        return false;
    };
    extensions.contains(&ext)
}

fn classify_referrer(referrer: &str, host: &str) -> (ReferrerClass, String) {
    if referrer.is_empty() {
        return (ReferrerClass::Direct, String::new());
    }
    let domain = referrer_domain(referrer);
    if SEARCH_MARKERS.iter().any(|m| domain.contains(m)) {
        return (ReferrerClass::Search, domain);
    }
    if SOCIAL_MARKERS.iter().any(|m| domain.contains(m)) {
        return (ReferrerClass::Social, domain);
    }
    if !host.is_empty() && referrer.contains(host) {
        return (ReferrerClass::Internal, domain);
    }
    (ReferrerClass::External, domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(status: u16) -> Exchange {
        Exchange {
            method: "GET".to_string(),
            url: "/".to_string(),
            status,
            duration: Duration::from_millis(12),
            response_size: 512,
            client_addr: "203.0.113.7".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0".to_string(),
            referrer: String::new(),
            content_type: None,
            query_param_count: 0,
            host: "example.com".to_string(),
        }
    }

    fn encoder() -> RecordEncoder {
        RecordEncoder::new(Environment::Development)
    }

    #[test]
    fn should_flag_errors_only_for_server_faults() {
        // given
        let enc = encoder();

        // when/then: 5xx sets the flag and carries the status
        for status in [500, 502, 503, 599] {
            let record = enc.encode(&exchange(status), SystemTime::now());
            assert_eq!(record.err, 1, "status {status}");
            assert_eq!(record.errc, status);
        }

        // then: 4xx (including 404) is deliberately not an error
        for status in [200, 301, 400, 404, 418, 499] {
            let record = enc.encode(&exchange(status), SystemTime::now());
            assert_eq!(record.err, 0, "status {status}");
            assert_eq!(record.errc, 0);
        }
    }

    #[test]
    fn should_derive_stable_session_fingerprint() {
        // given
        let enc = encoder();

        // when
        let a = enc.encode(&exchange(200), SystemTime::now());
        let b = enc.encode(&exchange(200), SystemTime::now());

        // then: same address + agent hash to the same 8 hex chars
        assert_eq!(a.sid, b.sid);
        assert_eq!(a.sid.len(), 8);
        assert!(a.sid.bytes().all(|b| b.is_ascii_hexdigit()));
        // while request ids stay distinct
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 6);
    }

    #[test]
    fn should_classify_devices_with_bot_priority() {
        // given: a bot advertising a mobile platform
        let mut ex = exchange(200);
        ex.user_agent = "SomeBot/2.0 (Android; Mobile)".to_string();

        // when
        let record = encoder().encode(&ex, SystemTime::now());

        // then: bot wins
        assert_eq!(record.d, DeviceClass::Bot);
    }

    #[test]
    fn should_classify_mobile_and_desktop() {
        let enc = encoder();

        let mut ex = exchange(200);
        ex.user_agent = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)".to_string();
        assert_eq!(enc.encode(&ex, SystemTime::now()).d, DeviceClass::Mobile);

        ex.user_agent = "Mozilla/5.0 (Windows NT 10.0; Win64) Firefox/121.0".to_string();
        let record = enc.encode(&ex, SystemTime::now());
        assert_eq!(record.d, DeviceClass::Desktop);
        assert_eq!(record.br, 'f');
        assert_eq!(record.os, 'w');
    }

    #[test]
    fn should_default_browser_and_os_to_other() {
        // given
        let mut ex = exchange(200);
        ex.user_agent = "curl/8.5.0".to_string();

        // when
        let record = encoder().encode(&ex, SystemTime::now());

        // then
        assert_eq!(record.br, 'o');
        assert_eq!(record.os, 'o');
    }

    #[test]
    fn should_classify_page_types_in_rule_order() {
        let cases = [
            ("/", 'h'),
            ("/index.html", 'h'),
            ("/assets/app.css", 'r'),
            ("/img/logo.svg", 'r'),
            ("/api/v1/users", 'x'),
            ("/about-us", 'a'),
            ("/contact", 'c'),
            ("/services/consulting", 's'),
            ("/products/widget-9", 'p'),
            ("/blog/2024/01/hello", 'b'),
            ("/admin/settings", 'd'),
            ("/legal/terms.html", 'h'),
            ("/legacy/page.php", 's'),
            ("/files/report.pdf", 'f'),
            ("/something-else", 'o'),
        ];

        for (url, expected) in cases {
            assert_eq!(classify_page(url), expected, "url {url}");
        }
    }

    #[test]
    fn should_classify_referrers() {
        let cases = [
            ("", "", ReferrerClass::Direct),
            ("https://www.google.com/search?q=x", "", ReferrerClass::Search),
            ("https://reddit.com/r/rust", "", ReferrerClass::Social),
            ("https://example.com/other-page", "example.com", ReferrerClass::Internal),
            ("https://partner.org/link", "example.com", ReferrerClass::External),
        ];

        for (referrer, host, expected) in cases {
            let (class, _) = classify_referrer(referrer, host);
            assert_eq!(class, expected, "referrer {referrer:?}");
        }
    }

    #[test]
    fn should_record_referrer_domain_label() {
        // given
        let mut ex = exchange(200);
        ex.referrer = "https://www.google.com/search?q=telemetry".to_string();

        // when
        let record = encoder().encode(&ex, SystemTime::now());

        // then
        assert_eq!(record.ref_type, ReferrerClass::Search);
        assert_eq!(record.rf, "google");
    }

    #[test]
    fn should_include_optional_fields_only_when_present() {
        // given
        let enc = encoder();
        let mut ex = exchange(200);

        // when: no query params, no content type
        let bare = enc.encode(&ex, SystemTime::now());

        // then
        assert_eq!(bare.qp, None);
        assert_eq!(bare.ct, None);

        // when: both present
        ex.query_param_count = 3;
        ex.content_type = Some("application/x-www-form-urlencoded".to_string());
        let full = enc.encode(&ex, SystemTime::now());

        // then: content type capped at 20 chars
        assert_eq!(full.qp, Some(3));
        assert_eq!(full.ct.as_deref(), Some("application/x-www-fo"));
    }

    #[test]
    fn should_truncate_client_addr_in_production_only() {
        // given
        let mut ex = exchange(200);
        ex.client_addr = "2001:db8:85a3::8a2e:370:7334".to_string();

        // when
        let dev = RecordEncoder::new(Environment::Development).encode(&ex, SystemTime::now());
        let prod = RecordEncoder::new(Environment::Production).encode(&ex, SystemTime::now());

        // then
        assert_eq!(dev.ip, ex.client_addr);
        assert_eq!(prod.ip, "2001:db8:85a3::");
        assert_eq!(dev.env, 'd');
        assert_eq!(prod.env, 'p');
    }

    #[test]
    fn should_truncate_user_agent_to_eighty_chars() {
        // given
        let mut ex = exchange(200);
        ex.user_agent = "U".repeat(300);

        // when
        let record = encoder().encode(&ex, SystemTime::now());

        // then
        assert_eq!(record.ua.len(), 80);
    }

    #[test]
    fn should_use_wall_clock_seconds_and_method_initial() {
        // given
        let mut ex = exchange(200);
        ex.method = "post".to_string();
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        // when
        let record = encoder().encode(&ex, now);

        // then
        assert_eq!(record.t, 1_700_000_000);
        assert_eq!(record.m, 'P');
        assert_eq!(record.rt, 12);
    }

    #[test]
    fn should_survive_empty_exchange_fields() {
        // given: everything empty or zero
        let ex = Exchange {
            method: String::new(),
            url: String::new(),
            status: 0,
            duration: Duration::ZERO,
            response_size: 0,
            client_addr: String::new(),
            user_agent: String::new(),
            referrer: String::new(),
            content_type: None,
            query_param_count: 0,
            host: String::new(),
        };

        // when
        let record = encoder().encode(&ex, SystemTime::now());

        // then: safe defaults everywhere, record still produced
        assert_eq!(record.m, 'G');
        assert_eq!(record.u, "");
        assert_eq!(record.d, DeviceClass::Desktop);
        assert_eq!(record.ref_type, ReferrerClass::Direct);
        assert_eq!(record.err, 0);
    }
}
