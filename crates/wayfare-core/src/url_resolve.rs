#![forbid(unsafe_code)]

//! Location resolution and the `_suid` disambiguation suffix.
//!
//! [`UrlContext`] turns the short forms callers hand the engine
//! (`"/a"`, `"?q=1"`, `"#section"`, `"relative"`) into canonical absolute
//! locations and back into short forms suitable for display and hashing.
//! Absolute resolution delegates to the `url` crate (RFC 3986 join); the
//! `_suid` suffix is plain string surgery so that encode/extract
//! round-trips are exact.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Unparseable base/page | Input returned unchanged |
//! | Escaped-twice input | Decoded to fixpoint |
//! | Malformed `_suid` tail | Treated as ordinary query text |

use percent_encoding::percent_decode_str;
use url::Url;

use crate::state::StateId;

const SUID_KEY: &str = "&_suid=";

/// Root/base configuration for resolving short locations.
#[derive(Debug, Clone)]
pub struct UrlContext {
    root_url: String,
    base_url: String,
}

impl UrlContext {
    /// Build a context from the application's root URL and an optional
    /// base URL for plain-relative inputs (defaults to the root).
    ///
    /// Trailing slashes are normalized so prefix stripping in
    /// [`UrlContext::short_url`] behaves predictably.
    pub fn new(root_url: impl Into<String>, base_url: Option<String>) -> Self {
        let mut root = root_url.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        let mut base = base_url.unwrap_or_else(|| root.clone());
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            root_url: root,
            base_url: base,
        }
    }

    /// The normalized root URL (always trailing-slashed).
    #[must_use]
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Resolve `input` to an absolute location.
    ///
    /// Fragment-only and query-only inputs resolve against `page` (the
    /// current location); root-relative inputs against the page's origin;
    /// plain-relative inputs against the configured base. A trailing
    /// empty fragment is dropped.
    #[must_use]
    pub fn full_url(&self, input: &str, page: &str) -> String {
        let resolved = if let Ok(abs) = Url::parse(input) {
            abs.to_string()
        } else {
            let base = match input.as_bytes().first() {
                Some(b'#' | b'?' | b'/') if !page.is_empty() => page,
                _ => self.base_url.as_str(),
            };
            match Url::parse(base).and_then(|b| b.join(input)) {
                Ok(joined) => joined.to_string(),
                Err(_) => input.to_owned(),
            }
        };
        match resolved.strip_suffix('#') {
            Some(stripped) => stripped.to_owned(),
            None => resolved,
        }
    }

    /// Reduce an absolute location to its short/relative form.
    ///
    /// `strip_base` removes the configured base prefix as well (used when
    /// navigation is emulated and locations are session-relative); the
    /// root prefix always collapses to `/`. Short forms that would read
    /// as a traditional anchor are prefixed with `./` so they stay
    /// recognizable as states.
    #[must_use]
    pub fn short_url(&self, url: &str, strip_base: bool) -> String {
        let mut short = url.to_owned();
        if strip_base {
            short = short.replacen(&self.base_url, "", 1);
        }
        short = short.replacen(&self.root_url, "/", 1);
        if is_traditional_anchor(&short) {
            short = format!("./{short}");
        }
        while short.starts_with("././") {
            short.replace_range(..2, "");
        }
        match short.strip_suffix('#') {
            Some(stripped) => stripped.to_owned(),
            None => short,
        }
    }

    /// Percent-decode to fixpoint (inputs may arrive escaped repeatedly).
    #[must_use]
    pub fn unescape(input: &str) -> String {
        let mut current = input.to_owned();
        loop {
            let decoded = percent_decode_str(&current)
                .decode_utf8()
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| current.clone());
            if decoded == current {
                return current;
            }
            current = decoded;
        }
    }
}

/// A hash with no path, query, or extension separators is a plain
/// same-page anchor, not a state encoding.
#[must_use]
pub fn is_traditional_anchor(url_or_hash: &str) -> bool {
    !url_or_hash.contains(['/', '?', '.'])
}

/// Extract a trailing `_suid` id, if present and well-formed.
#[must_use]
pub fn extract_suid(url_or_hash: &str) -> Option<StateId> {
    let at = url_or_hash.rfind(SUID_KEY)?;
    let digits = &url_or_hash[at + SUID_KEY.len()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(StateId::new(digits))
}

/// Remove a `_suid` tail (and the bare `?` that may precede it).
#[must_use]
pub fn strip_suid(url: &str) -> String {
    match url.find(SUID_KEY) {
        None => url.to_owned(),
        Some(at) => {
            let cut = if at > 0 && url.as_bytes()[at - 1] == b'?' {
                at - 1
            } else {
                at
            };
            url[..cut].to_owned()
        }
    }
}

/// Append a `_suid` suffix to a short form, inserting the query
/// separator when the short form has none.
#[must_use]
pub fn append_suid(hash: &str, id: &StateId) -> String {
    let mut out = hash.to_owned();
    if !out.contains('?') {
        out.push('?');
    }
    out.push_str(SUID_KEY);
    out.push_str(id.as_str());
    out
}

/// The fragment portion of a URL (between the first and any second `#`),
/// percent-decoded.
#[must_use]
pub fn fragment_of(url: &str) -> String {
    let fragment = url.split('#').nth(1).unwrap_or("");
    UrlContext::unescape(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> UrlContext {
        UrlContext::new("https://example.test", None)
    }

    const PAGE: &str = "https://example.test/app/index";

    #[test]
    fn absolute_inputs_pass_through() {
        assert_eq!(
            ctx().full_url("https://other.test/x", PAGE),
            "https://other.test/x"
        );
    }

    #[test]
    fn root_relative_resolves_against_origin() {
        assert_eq!(ctx().full_url("/a", PAGE), "https://example.test/a");
    }

    #[test]
    fn fragment_resolves_against_page() {
        assert_eq!(
            ctx().full_url("#section", PAGE),
            "https://example.test/app/index#section"
        );
    }

    #[test]
    fn query_resolves_against_page() {
        assert_eq!(
            ctx().full_url("?q=1", PAGE),
            "https://example.test/app/index?q=1"
        );
    }

    #[test]
    fn plain_relative_resolves_against_base() {
        let ctx = UrlContext::new("https://example.test", Some("https://example.test/app/".into()));
        assert_eq!(ctx.full_url("page", PAGE), "https://example.test/app/page");
    }

    #[test]
    fn trailing_empty_fragment_dropped() {
        assert_eq!(ctx().full_url("/a#", PAGE), "https://example.test/a");
    }

    #[test]
    fn short_url_collapses_root() {
        assert_eq!(ctx().short_url("https://example.test/a?b=1", false), "/a?b=1");
    }

    #[test]
    fn short_url_guards_traditional_anchors() {
        let ctx = UrlContext::new("https://example.test", None);
        // Stripping the base of "https://example.test/abc" would leave
        // "abc", indistinguishable from a plain anchor.
        let short = ctx.short_url("https://example.test/abc", true);
        assert_eq!(short, "./abc");
    }

    #[test]
    fn unescape_reaches_fixpoint() {
        assert_eq!(UrlContext::unescape("a%252Fb"), "a/b");
        assert_eq!(UrlContext::unescape("plain"), "plain");
    }

    #[test]
    fn traditional_anchor_detection() {
        assert!(is_traditional_anchor("section-2"));
        assert!(!is_traditional_anchor("/a"));
        assert!(!is_traditional_anchor("a?b"));
        assert!(!is_traditional_anchor("page.html"));
    }

    #[test]
    fn suid_extract_and_strip() {
        let id = extract_suid("/a?&_suid=123").expect("suid present");
        assert_eq!(id.as_str(), "123");
        assert_eq!(strip_suid("/a?&_suid=123"), "/a");
        assert_eq!(strip_suid("/a?x=1&_suid=123"), "/a?x=1");
        assert_eq!(strip_suid("/a"), "/a");
    }

    #[test]
    fn suid_rejects_malformed_tails() {
        assert!(extract_suid("/a?&_suid=").is_none());
        assert!(extract_suid("/a?&_suid=12x").is_none());
        assert!(extract_suid("/a").is_none());
    }

    #[test]
    fn suid_append_round_trips() {
        let id = StateId::from("987");
        let bare = append_suid("/a", &id);
        assert_eq!(bare, "/a?&_suid=987");
        assert_eq!(extract_suid(&bare), Some(id.clone()));

        let with_query = append_suid("/a?x=1", &id);
        assert_eq!(with_query, "/a?x=1&_suid=987");
        assert_eq!(extract_suid(&with_query), Some(id));
        assert_eq!(strip_suid(&with_query), "/a?x=1");
    }

    #[test]
    fn fragment_extraction() {
        assert_eq!(fragment_of("https://x/a#sec"), "sec");
        assert_eq!(fragment_of("https://x/a"), "");
        assert_eq!(fragment_of("https://x/a#one#two"), "one");
    }
}
