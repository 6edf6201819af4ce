#![forbid(unsafe_code)]

//! State records and content fingerprints.
//!
//! A [`State`] is an immutable snapshot of one navigable position: caller
//! payload, title, and the canonical location, stamped with a stable
//! [`StateId`]. Identity is content-addressed: two states whose
//! `(data, title, url)` content is identical carry the same id for the
//! whole session.
//!
//! # Invariants
//!
//! 1. `State::fingerprint` is a pure function of `(data, title, url)`.
//! 2. An id, once bound to a fingerprint, is never rebound to a different
//!    fingerprint within a session.
//! 3. `hash` embeds the id (as a `_suid` suffix) if and only if the state
//!    is content-bearing (non-empty title or non-empty payload).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable, opaque identifier for a logical state.
///
/// Minted ids are digits-only (a millisecond timestamp prefix plus a
/// sequence suffix) so they survive embedding in a URL query suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    /// Wrap a raw id string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

/// Raw caller triple before normalization.
///
/// `url` may be relative, root-relative, query-only, or fragment-only;
/// the codec resolves it against the engine's URL context.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSeed {
    /// Arbitrary caller payload. `Null` and `{}` count as empty.
    pub data: Value,
    /// Display title; empty string means "no title".
    pub title: String,
    /// Target location in any short or absolute form.
    pub url: String,
}

impl StateSeed {
    /// Build a seed from its parts.
    pub fn new(data: Value, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            data,
            title: title.into(),
            url: url.into(),
        }
    }

    /// Seed with no payload and no title.
    pub fn bare(url: impl Into<String>) -> Self {
        Self::new(Value::Null, "", url)
    }
}

/// Immutable record of one navigable position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Stable identity (see [`StateId`]).
    pub id: StateId,
    /// Caller payload, carried verbatim.
    pub data: Value,
    /// Display title.
    pub title: String,
    /// Canonical absolute location, query-normalized, `_suid`-free.
    pub url: String,
    /// Short/relative form; `_suid`-suffixed when content-bearing.
    pub hash: String,
    /// Absolute form of `hash`.
    pub hashed_url: String,
}

impl State {
    /// Canonical content string used for identity dedup.
    ///
    /// Serialized field order is fixed (`data`, `title`, `url`) and
    /// `serde_json` object keys sort deterministically, so equal content
    /// always produces byte-equal fingerprints.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.data, &self.title, &self.url)
    }

    /// Whether this state carries more than a bare location.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.title.is_empty() || !data_is_empty(&self.data)
    }

    /// Recover the raw triple this state was normalized from.
    #[must_use]
    pub fn seed(&self) -> StateSeed {
        StateSeed::new(self.data.clone(), self.title.clone(), self.url.clone())
    }
}

/// Canonical fingerprint of a `(data, title, url)` triple.
#[must_use]
pub fn fingerprint_of(data: &Value, title: &str, url: &str) -> String {
    #[derive(Serialize)]
    struct Parts<'a> {
        data: &'a Value,
        title: &'a str,
        url: &'a str,
    }
    serde_json::to_string(&Parts { data, title, url })
        .unwrap_or_else(|_| format!("{title}\u{1}{url}"))
}

/// Payload emptiness: `Null` and `{}` are empty, everything else counts
/// as content.
#[must_use]
pub fn data_is_empty(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(id: &str, url: &str) -> State {
        State {
            id: StateId::from(id),
            data: Value::Null,
            title: String::new(),
            url: url.to_owned(),
            hash: "/".to_owned(),
            hashed_url: url.to_owned(),
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint_of(&json!({"b": 1, "a": 2}), "t", "https://x/");
        let b = fingerprint_of(&json!({"a": 2, "b": 1}), "t", "https://x/");
        assert_eq!(a, b, "object key order must not affect the fingerprint");
    }

    #[test]
    fn fingerprint_distinguishes_content() {
        let base = fingerprint_of(&Value::Null, "t", "https://x/");
        assert_ne!(base, fingerprint_of(&Value::Null, "u", "https://x/"));
        assert_ne!(base, fingerprint_of(&Value::Null, "t", "https://x/a"));
        assert_ne!(base, fingerprint_of(&json!({"k": 1}), "t", "https://x/"));
    }

    #[test]
    fn empty_payload_forms() {
        assert!(data_is_empty(&Value::Null));
        assert!(data_is_empty(&json!({})));
        assert!(!data_is_empty(&json!({"k": 1})));
        assert!(!data_is_empty(&json!([])));
        assert!(!data_is_empty(&json!(0)));
    }

    #[test]
    fn content_detection() {
        let mut state = sample("1", "https://x/");
        assert!(!state.has_content());
        state.title = "T".to_owned();
        assert!(state.has_content());
        state.title.clear();
        state.data = json!({"k": 1});
        assert!(state.has_content());
    }

    #[test]
    fn seed_round_trips_content() {
        let state = State {
            id: StateId::from("42"),
            data: json!({"k": 1}),
            title: "T".to_owned(),
            url: "https://x/a".to_owned(),
            hash: "/a?&_suid=42".to_owned(),
            hashed_url: "https://x/a?&_suid=42".to_owned(),
        };
        let seed = state.seed();
        assert_eq!(
            fingerprint_of(&seed.data, &seed.title, &seed.url),
            state.fingerprint()
        );
    }

    #[test]
    fn state_serde_round_trip() {
        let state = sample("7", "https://x/p");
        let json = serde_json::to_string(&state).unwrap();
        let back: State = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
