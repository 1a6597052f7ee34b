//! URL and referrer compaction.
//!
//! Lossy, analytics-oriented shrinking: long URLs are rewritten with a fixed
//! table of token substitutions and truncated, referrers are reduced to a
//! short domain label. There is no decode path.

const MIN_COMPACT_LEN: usize = 30;
const MAX_URL_LEN: usize = 200;

/// Top-level domains rewritten to 1-2 character codes. Applied only when the
/// match is followed by a path separator, query, fragment, or end of string,
/// so unrelated substrings stay intact. Order matters: `.co.uk` must be
/// tried before a bare `.co` would swallow it.
const TLD_REPLACEMENTS: &[(&str, &str)] = &[
    (".com", ".c"),
    (".org", ".o"),
    (".net", ".n"),
    (".io", ".i"),
    (".gov", ".g"),
    (".edu", ".e"),
    (".co.uk", ".uk"),
];

/// File extensions rewritten when they terminate the path.
const EXTENSION_REPLACEMENTS: &[(&str, &str)] = &[
    (".html", ".h"),
    (".htm", ".h"),
    (".php", ".p"),
    (".aspx", ".a"),
    (".jsp", ".j"),
    (".asp", ".a"),
    (".css", ".c"),
    (".js", ".j"),
    (".json", ".j"),
    (".xml", ".x"),
];

/// Common path prefixes collapsed to short codes wherever they occur.
const PATH_REPLACEMENTS: &[(&str, &str)] = &[
    ("/api/", "/a/"),
    ("/admin/", "/ad/"),
    ("/dashboard/", "/d/"),
    ("/account/", "/ac/"),
    ("/user/", "/u/"),
    ("/product/", "/p/"),
    ("/service/", "/s/"),
    ("/contact/", "/c/"),
    ("/about/", "/ab/"),
    ("/blog/", "/b/"),
    ("/post/", "/po/"),
    ("/article/", "/ar/"),
];

/// Well-known referrer domains mapped to bare labels.
const WELL_KNOWN_DOMAINS: &[(&str, &str)] = &[
    ("google.com", "google"),
    ("bing.com", "bing"),
    ("yahoo.com", "yahoo"),
    ("duckduckgo.com", "duckduckgo"),
    ("facebook.com", "facebook"),
    ("twitter.com", "twitter"),
    ("linkedin.com", "linkedin"),
    ("instagram.com", "instagram"),
    ("youtube.com", "youtube"),
    ("reddit.com", "reddit"),
    ("pinterest.com", "pinterest"),
    ("tumblr.com", "tumblr"),
];

/// What may legally follow a rewritten token.
#[derive(Clone, Copy)]
enum Boundary {
    /// Any position - plain substring replacement.
    Anywhere,
    /// End of string, `?`, or `#`.
    Terminal,
    /// End of string, `?`, `#`, or `/`.
    Segment,
}

impl Boundary {
    fn accepts(self, next: Option<u8>) -> bool {
        match (self, next) {
            (Boundary::Anywhere, _) => true,
            (_, None | Some(b'?') | Some(b'#')) => true,
            (Boundary::Segment, Some(b'/')) => true,
            _ => false,
        }
    }
}

/// Shrinks a URL into a short canonical token.
///
/// URLs shorter than 30 characters pass through unchanged. Longer ones lose
/// their scheme, leading `www.`, query string and fragment; common TLDs,
/// file extensions, `/index` files, and path prefixes collapse to 1-2
/// character codes; the result is capped at 200 characters. Lossy by design:
/// there is no guarantee of decodability.
pub fn compact_url(raw: &str) -> String {
    if raw.chars().count() < MIN_COMPACT_LEN {
        return raw.to_string();
    }

    let mut url = strip_scheme_and_www(raw).to_string();
    for (find, replacement) in TLD_REPLACEMENTS {
        url = replace_token(&url, find, replacement, Boundary::Segment);
    }
    for (find, replacement) in EXTENSION_REPLACEMENTS {
        url = replace_token(&url, find, replacement, Boundary::Terminal);
    }
    url = collapse_index(&url);
    for (find, replacement) in PATH_REPLACEMENTS {
        url = replace_token(&url, find, replacement, Boundary::Anywhere);
    }
    if let Some(pos) = url.find(['?', '#']) {
        url.truncate(pos);
    }
    truncate_chars(&url, MAX_URL_LEN)
}

/// Reduces a referrer header to a short domain label.
///
/// Strips scheme and `www.`, keeps the part before the first path separator,
/// maps well-known domains to bare labels, and otherwise returns the
/// second-level domain component. Empty input yields empty output; the
/// function is total and never panics.
pub fn referrer_domain(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let stripped = strip_scheme_and_www(raw);
    let domain = stripped.split('/').next().unwrap_or("");

    if let Some((_, label)) = WELL_KNOWN_DOMAINS.iter().find(|(known, _)| *known == domain) {
        return (*label).to_string();
    }

    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2].to_string()
    } else {
        domain.to_string()
    }
}

fn strip_scheme_and_www(raw: &str) -> &str {
    let no_scheme = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    no_scheme.strip_prefix("www.").unwrap_or(no_scheme)
}

/// Replaces every case-insensitive occurrence of `needle` that is followed
/// by an accepted boundary character. Needles are ASCII, so byte offsets
/// that survive a match are always char boundaries.
fn replace_token(haystack: &str, needle: &str, replacement: &str, boundary: Boundary) -> String {
    let lower = haystack.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut i = 0;

    while i < haystack.len() {
        if lower[i..].starts_with(needle)
            && boundary.accepts(haystack.as_bytes().get(i + needle.len()).copied())
        {
            out.push_str(replacement);
            i += needle.len();
            continue;
        }
        let Some(ch) = haystack[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

/// Collapses `/index` with an optional extension (`/index.html`, `/index.php`)
/// to `/i` when it terminates a path segment.
fn collapse_index(haystack: &str) -> String {
    let lower = haystack.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut out = String::with_capacity(haystack.len());
    let mut i = 0;

    while i < haystack.len() {
        if lower[i..].starts_with("/index") {
            let mut end = i + "/index".len();
            if bytes.get(end) == Some(&b'.') {
                let ext_end = end
                    + 1
                    + bytes[end + 1..]
                        .iter()
                        .take_while(|b| b.is_ascii_alphabetic())
                        .count();
                if ext_end > end + 1 {
                    end = ext_end;
                }
            }
            if Boundary::Segment.accepts(bytes.get(end).copied()) {
                out.push_str("/i");
                i = end;
                continue;
            }
        }
        let Some(ch) = haystack[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

/// Truncates a string to at most `max` characters, never splitting a char.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
