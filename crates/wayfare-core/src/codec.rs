#![forbid(unsafe_code)]

//! Seed → [`State`] normalization and id minting.
//!
//! [`StateCodec::normalize`] is the single place raw caller triples
//! become canonical states:
//!
//! 1. resolve the target to an absolute, unescaped location and strip
//!    any embedded `_suid` suffix;
//! 2. settle identity: an explicit `_suid` wins, then a fingerprint
//!    match (live, then overlay), then a freshly minted id;
//! 3. derive the short `hash` form, `_suid`-suffixed when the state is
//!    content-bearing, and its absolute `hashed_url`;
//! 4. if the platform cannot let two states share one location and the
//!    clean location already belongs to a different id, fall back to the
//!    `hashed_url` as the state's effective location.
//!
//! Normalization is idempotent at the content level: feeding a produced
//! state's `(data, title, url)` back through yields the same id.

use crate::capabilities::PlatformCapabilities;
use crate::registry::StateRegistry;
use crate::state::{State, StateId, StateSeed, data_is_empty, fingerprint_of};
use crate::url_resolve::{self, UrlContext};

/// Time-prefixed, collision-checked id source.
///
/// Ids are `{unix-millis-at-construction}{4-digit sequence}`: unique
/// across sessions by the time prefix, unique within a session by the
/// sequence, and collision-checked against both live and persisted id
/// maps anyway (the persisted overlay may span sessions).
#[derive(Debug)]
struct IdMinter {
    prefix: u128,
    seq: u64,
}

impl IdMinter {
    fn new() -> Self {
        let prefix = web_time::SystemTime::now()
            .duration_since(web_time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self { prefix, seq: 0 }
    }

    /// Mint the next id not rejected by `taken`.
    fn mint(&mut self, taken: impl Fn(&StateId) -> bool) -> StateId {
        loop {
            let candidate = StateId::new(format!("{}{:04}", self.prefix, self.seq));
            self.seq += 1;
            if !taken(&candidate) {
                return candidate;
            }
        }
    }
}

/// Canonicalizes raw `(data, title, url)` triples into [`State`] records.
#[derive(Debug)]
pub struct StateCodec {
    urls: UrlContext,
    caps: PlatformCapabilities,
    minter: IdMinter,
}

impl StateCodec {
    /// Build a codec for the given URL context and platform.
    #[must_use]
    pub fn new(urls: UrlContext, caps: PlatformCapabilities) -> Self {
        Self {
            urls,
            caps,
            minter: IdMinter::new(),
        }
    }

    /// The codec's URL context.
    #[must_use]
    pub fn urls(&self) -> &UrlContext {
        &self.urls
    }

    /// Normalize a seed against the current page location.
    ///
    /// New identities are registered with `registry` as a side effect
    /// (fingerprint→id and id→state; the location index is only written
    /// when the engine records a constructed state).
    pub fn normalize(
        &mut self,
        seed: &StateSeed,
        page: &str,
        registry: &mut StateRegistry,
    ) -> State {
        let raw = if seed.url.is_empty() {
            page
        } else {
            seed.url.as_str()
        };
        let full = self.urls.full_url(&UrlContext::unescape(raw), page);
        let clean_url = url_resolve::strip_suid(&full);

        // An embedded _suid is an explicit identity claim and bypasses
        // content addressing entirely.
        let suid = url_resolve::extract_suid(&full);
        let fingerprint = fingerprint_of(&seed.data, &seed.title, &clean_url);
        let id = match &suid {
            Some(id) => id.clone(),
            None => match registry.resolve_by_fingerprint(&fingerprint) {
                Some(id) => id,
                None => self.minter.mint(|candidate| registry.contains_id(candidate)),
            },
        };

        let strip_base = !self.caps.contains(PlatformCapabilities::NATIVE_PUSH);
        let mut hash = self.urls.short_url(&clean_url, strip_base);
        if !seed.title.is_empty() || !data_is_empty(&seed.data) {
            hash = url_resolve::append_suid(&hash, &id);
        }
        let hashed_url = self.urls.full_url(&hash, page);

        let mut url = clean_url.clone();
        if self.caps.needs_distinct_locations()
            && registry
                .resolve_by_location(&clean_url)
                .is_some_and(|other| other != id)
        {
            // Two distinct states must not share one visible location
            // here; the suffixed form keeps them addressable.
            url = hashed_url.clone();
        }

        let state = State {
            id,
            data: seed.data.clone(),
            title: seed.title.clone(),
            url,
            hash,
            hashed_url,
        };
        if suid.is_none() {
            registry.bind_identity(fingerprint, &state);
        }
        state
    }

    /// Convenience composition of [`StateCodec::normalize`] over the
    /// raw parts.
    pub fn create_state(
        &mut self,
        data: serde_json::Value,
        title: &str,
        url: &str,
        page: &str,
        registry: &mut StateRegistry,
    ) -> State {
        self.normalize(&StateSeed::new(data, title, url), page, registry)
    }
}
