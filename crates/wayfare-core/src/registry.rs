#![forbid(unsafe_code)]

//! The state registry: three mutually consistent indexes plus a
//! read-through persisted overlay.
//!
//! # Invariants
//!
//! 1. For any id present in the live id map, the fingerprint of its state
//!    and every location ever recorded for it map back to that id.
//! 2. An id→state binding, once made, is never replaced within a session.
//! 3. The overlay is loaded once at construction and only ever read;
//!    mid-session writes go to the live maps exclusively.
//! 4. Lookups check live maps first, then the overlay, never the
//!    reverse.
//!
//! Absence is represented (`Option`), never thrown: no registry
//! operation can fail.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::state::{State, StateId};

/// Hot-path map keyed with `ahash` (the registry is consulted on every
/// normalization and every confirmation).
type FastMap<K, V> = HashMap<K, V, ahash::RandomState>;

/// Serializable snapshot of the three registry maps.
///
/// This is both the persisted-store payload and the overlay format;
/// plain `std` maps keep the serde representation independent of the
/// live hasher choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Authoritative id → state bindings.
    #[serde(default)]
    pub id_to_state: HashMap<StateId, State>,
    /// Content fingerprint → id.
    #[serde(default)]
    pub fingerprint_to_id: HashMap<String, StateId>,
    /// Visible location → id.
    #[serde(default)]
    pub location_to_id: HashMap<String, StateId>,
}

impl RegistrySnapshot {
    /// True when all three maps are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_state.is_empty()
            && self.fingerprint_to_id.is_empty()
            && self.location_to_id.is_empty()
    }
}

/// Live registry with read-through overlay.
#[derive(Debug, Default)]
pub struct StateRegistry {
    id_to_state: FastMap<StateId, State>,
    fingerprint_to_id: FastMap<String, StateId>,
    location_to_id: FastMap<String, StateId>,
    overlay: RegistrySnapshot,
}

impl StateRegistry {
    /// Empty registry with an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry backed by a previously persisted overlay.
    #[must_use]
    pub fn with_overlay(overlay: RegistrySnapshot) -> Self {
        Self {
            overlay,
            ..Self::default()
        }
    }

    /// Resolve a state by id, live map first, then overlay.
    #[must_use]
    pub fn resolve_by_id(&self, id: &StateId) -> Option<&State> {
        self.id_to_state
            .get(id)
            .or_else(|| self.overlay.id_to_state.get(id))
    }

    /// Resolve an id by content fingerprint.
    #[must_use]
    pub fn resolve_by_fingerprint(&self, fingerprint: &str) -> Option<StateId> {
        self.fingerprint_to_id
            .get(fingerprint)
            .or_else(|| self.overlay.fingerprint_to_id.get(fingerprint))
            .cloned()
    }

    /// Resolve an id by visible location.
    #[must_use]
    pub fn resolve_by_location(&self, url: &str) -> Option<StateId> {
        self.location_to_id
            .get(url)
            .or_else(|| self.overlay.location_to_id.get(url))
            .cloned()
    }

    /// Whether an id is known to the live maps or the overlay.
    ///
    /// Used by the id minter to collision-check fresh candidates.
    #[must_use]
    pub fn contains_id(&self, id: &StateId) -> bool {
        self.id_to_state.contains_key(id) || self.overlay.id_to_state.contains_key(id)
    }

    /// Bind a fingerprint and its state to an id without touching the
    /// location index. First binding wins on both maps.
    pub fn bind_identity(&mut self, fingerprint: String, state: &State) {
        self.fingerprint_to_id
            .entry(fingerprint)
            .or_insert_with(|| state.id.clone());
        self.id_to_state
            .entry(state.id.clone())
            .or_insert_with(|| state.clone());
    }

    /// Idempotent upsert of a state into all three live maps.
    pub fn record(&mut self, state: &State) {
        self.bind_identity(state.fingerprint(), state);
        self.location_to_id
            .insert(state.url.clone(), state.id.clone());
    }

    /// Pure merge of the live maps over a persisted snapshot: on key
    /// collision, the live entry wins.
    #[must_use]
    pub fn merge_into_overlay(&self, mut base: RegistrySnapshot) -> RegistrySnapshot {
        for (id, state) in &self.id_to_state {
            base.id_to_state.insert(id.clone(), state.clone());
        }
        for (fingerprint, id) in &self.fingerprint_to_id {
            base.fingerprint_to_id
                .insert(fingerprint.clone(), id.clone());
        }
        for (url, id) in &self.location_to_id {
            base.location_to_id.insert(url.clone(), id.clone());
        }
        base
    }

    /// Number of states in the live id map.
    #[must_use]
    pub fn live_states(&self) -> usize {
        self.id_to_state.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn state(id: &str, url: &str) -> State {
        State {
            id: StateId::from(id),
            data: Value::Null,
            title: String::new(),
            url: url.to_owned(),
            hash: url.to_owned(),
            hashed_url: url.to_owned(),
        }
    }

    #[test]
    fn record_makes_all_indexes_consistent() {
        let mut registry = StateRegistry::new();
        let s = state("1", "https://x/a");
        registry.record(&s);

        assert_eq!(registry.resolve_by_id(&s.id), Some(&s));
        assert_eq!(registry.resolve_by_fingerprint(&s.fingerprint()), Some(s.id.clone()));
        assert_eq!(registry.resolve_by_location("https://x/a"), Some(s.id.clone()));
    }

    #[test]
    fn record_is_idempotent() {
        let mut registry = StateRegistry::new();
        let s = state("1", "https://x/a");
        registry.record(&s);
        registry.record(&s);
        assert_eq!(registry.live_states(), 1);
    }

    #[test]
    fn first_id_binding_wins() {
        let mut registry = StateRegistry::new();
        let original = state("1", "https://x/a");
        registry.record(&original);

        let mut impostor = state("1", "https://x/b");
        impostor.title = "other".to_owned();
        registry.record(&impostor);

        // The id binding is permanent for the session.
        assert_eq!(registry.resolve_by_id(&original.id), Some(&original));
    }

    #[test]
    fn overlay_is_read_through_only() {
        let mut overlay = RegistrySnapshot::default();
        let persisted = state("9", "https://x/old");
        overlay.id_to_state.insert(persisted.id.clone(), persisted.clone());
        overlay
            .location_to_id
            .insert(persisted.url.clone(), persisted.id.clone());

        let registry = StateRegistry::with_overlay(overlay);
        assert_eq!(registry.resolve_by_id(&persisted.id), Some(&persisted));
        assert_eq!(
            registry.resolve_by_location("https://x/old"),
            Some(persisted.id.clone())
        );
        assert!(registry.contains_id(&persisted.id));
        assert_eq!(registry.live_states(), 0);
    }

    #[test]
    fn live_entries_shadow_overlay() {
        let mut overlay = RegistrySnapshot::default();
        let old = state("9", "https://x/loc");
        overlay.id_to_state.insert(old.id.clone(), old.clone());
        overlay.location_to_id.insert(old.url.clone(), old.id.clone());

        let mut registry = StateRegistry::with_overlay(overlay);
        let fresh = state("10", "https://x/loc");
        registry.record(&fresh);

        // Same location now resolves to the live id, not the overlay's.
        assert_eq!(registry.resolve_by_location("https://x/loc"), Some(fresh.id));
    }

    #[test]
    fn merge_prefers_live_entries() {
        let mut registry = StateRegistry::new();
        let live = state("1", "https://x/loc");
        registry.record(&live);

        let mut base = RegistrySnapshot::default();
        let stale = state("2", "https://x/loc");
        base.id_to_state.insert(stale.id.clone(), stale.clone());
        base.location_to_id.insert(stale.url.clone(), stale.id.clone());

        let merged = registry.merge_into_overlay(base);
        assert_eq!(merged.location_to_id.get("https://x/loc"), Some(&live.id));
        // Non-colliding persisted entries survive the merge.
        assert!(merged.id_to_state.contains_key(&stale.id));
        assert!(merged.id_to_state.contains_key(&live.id));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut registry = StateRegistry::new();
        registry.record(&state("1", "https://x/a"));

        let once = registry.merge_into_overlay(RegistrySnapshot::default());
        let twice = registry.merge_into_overlay(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn snapshot_serde_round_trip() {
        let mut registry = StateRegistry::new();
        registry.record(&state("1", "https://x/a"));
        let snapshot = registry.merge_into_overlay(RegistrySnapshot::default());

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: RegistrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
