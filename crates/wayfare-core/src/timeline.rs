#![forbid(unsafe_code)]

//! Constructed and confirmed state logs.
//!
//! Two append-only sequences with different meanings:
//!
//! - **constructed**: every state the codec ever produced, in
//!   production order;
//! - **confirmed**: states the navigation primitive actually settled
//!   on. Consecutive duplicates by id are suppressed; this is the sole
//!   dedup gate for "did anything actually change".
//!
//! Only `confirmed` answers "where the user actually is".
//!
//! ```text
//! push /a        constructed: [a]        confirmed: [a]
//! push /b        constructed: [a, b]     confirmed: [a, b]
//! push /b again  constructed: [a, b, b]  confirmed: [a, b]   (no-op)
//! back           constructed: [a, b, b]  confirmed: [a, b, a]
//! ```

use crate::state::{State, StateId};

/// Ordered logs of constructed and confirmed states.
#[derive(Debug, Default)]
pub struct Timeline {
    constructed: Vec<State>,
    confirmed: Vec<State>,
}

impl Timeline {
    /// Empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the constructed log (no dedup).
    pub fn append_constructed(&mut self, state: State) {
        self.constructed.push(state);
    }

    /// Confirm a state: append unless it repeats the current top by id.
    ///
    /// Returns whether the confirmed log changed.
    pub fn confirm(&mut self, state: State) -> bool {
        if self.is_current(&state.id) {
            return false;
        }
        self.confirmed.push(state);
        true
    }

    /// The state the primitive last settled on.
    #[must_use]
    pub fn current(&self) -> Option<&State> {
        self.confirmed.last()
    }

    /// Whether `id` is the current top of the confirmed log.
    #[must_use]
    pub fn is_current(&self, id: &StateId) -> bool {
        self.current().is_some_and(|top| &top.id == id)
    }

    /// Confirmed state by position; negative indices count from the end.
    #[must_use]
    pub fn confirmed_at(&self, index: isize) -> Option<&State> {
        resolve_index(self.confirmed.len(), index).and_then(|i| self.confirmed.get(i))
    }

    /// Constructed state by position; negative indices count from the end.
    #[must_use]
    pub fn constructed_at(&self, index: isize) -> Option<&State> {
        resolve_index(self.constructed.len(), index).and_then(|i| self.constructed.get(i))
    }

    /// Length of the confirmed log.
    #[must_use]
    pub fn confirmed_len(&self) -> usize {
        self.confirmed.len()
    }

    /// Length of the constructed log.
    #[must_use]
    pub fn constructed_len(&self) -> usize {
        self.constructed.len()
    }
}

fn resolve_index(len: usize, index: isize) -> Option<usize> {
    if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        let index = index as usize;
        (index < len).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateId;
    use serde_json::Value;

    fn state(id: &str) -> State {
        State {
            id: StateId::from(id),
            data: Value::Null,
            title: String::new(),
            url: format!("https://x/{id}"),
            hash: format!("/{id}"),
            hashed_url: format!("https://x/{id}"),
        }
    }

    #[test]
    fn confirm_appends_and_reports_change() {
        let mut timeline = Timeline::new();
        assert!(timeline.confirm(state("1")));
        assert!(timeline.confirm(state("2")));
        assert_eq!(timeline.confirmed_len(), 2);
        assert_eq!(timeline.current().unwrap().id.as_str(), "2");
    }

    #[test]
    fn confirm_suppresses_consecutive_duplicates() {
        let mut timeline = Timeline::new();
        assert!(timeline.confirm(state("1")));
        assert!(!timeline.confirm(state("1")));
        assert_eq!(timeline.confirmed_len(), 1);
    }

    #[test]
    fn confirm_allows_nonconsecutive_repeats() {
        let mut timeline = Timeline::new();
        timeline.confirm(state("1"));
        timeline.confirm(state("2"));
        assert!(timeline.confirm(state("1")), "A-B-A is a real sequence");
        assert_eq!(timeline.confirmed_len(), 3);
    }

    #[test]
    fn constructed_log_keeps_duplicates() {
        let mut timeline = Timeline::new();
        timeline.append_constructed(state("1"));
        timeline.append_constructed(state("1"));
        assert_eq!(timeline.constructed_len(), 2);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let mut timeline = Timeline::new();
        timeline.confirm(state("1"));
        timeline.confirm(state("2"));
        timeline.confirm(state("3"));

        assert_eq!(timeline.confirmed_at(-1).unwrap().id.as_str(), "3");
        assert_eq!(timeline.confirmed_at(-3).unwrap().id.as_str(), "1");
        assert_eq!(timeline.confirmed_at(0).unwrap().id.as_str(), "1");
        assert!(timeline.confirmed_at(-4).is_none());
        assert!(timeline.confirmed_at(3).is_none());
    }

    #[test]
    fn empty_timeline_has_no_current() {
        let timeline = Timeline::new();
        assert!(timeline.current().is_none());
        assert!(timeline.confirmed_at(0).is_none());
        assert!(timeline.constructed_at(-1).is_none());
        assert!(!timeline.is_current(&StateId::from("1")));
    }
}
