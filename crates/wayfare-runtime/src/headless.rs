#![forbid(unsafe_code)]

//! Headless collaborators: an in-memory navigation primitive, recording
//! sinks, and a manually advanced clock.
//!
//! These back the engine in tests and in hosts that have no real
//! location bar. [`HeadlessNavigator`] keeps an honest history stack and
//! reproduces the awkward parts of the real channel on demand (dropped
//! and duplicated move notifications) so reliability handling can be
//! exercised deterministically.

use std::cell::Cell;
use std::collections::VecDeque;

use web_time::Duration;

use wayfare_backend::{
    ChangeKind, Clock, EngineEvent, EventSink, LocationChanged, NavigationPrimitive, Platform,
    TitleSink,
};
use wayfare_core::state::StateId;

use crate::persistence::MemoryStore;

/// One entry in the simulated history stack.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HistoryEntry {
    id: Option<StateId>,
    url: String,
}

/// Record of every call the engine made into the primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveCall {
    /// `change_location` with the given kind and target.
    Change {
        /// Push or replace.
        kind: ChangeKind,
        /// State id handed to the primitive.
        id: StateId,
        /// Target location.
        url: String,
    },
    /// `step_by` with the given offset.
    Step {
        /// Relative offset.
        offset: i32,
    },
}

/// In-memory navigation primitive with a scriptable notification channel.
#[derive(Debug)]
pub struct HeadlessNavigator {
    entries: Vec<HistoryEntry>,
    index: usize,
    pending: VecDeque<LocationChanged>,
    calls: Vec<PrimitiveCall>,
    drop_next_move_notifications: usize,
}

impl HeadlessNavigator {
    /// Navigator positioned at `initial_url`.
    #[must_use]
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            entries: vec![HistoryEntry {
                id: None,
                url: initial_url.into(),
            }],
            index: 0,
            pending: VecDeque::new(),
            calls: Vec::new(),
            drop_next_move_notifications: 0,
        }
    }

    /// Every call the engine has made, in order.
    #[must_use]
    pub fn calls(&self) -> &[PrimitiveCall] {
        &self.calls
    }

    /// Number of `change_location`/`step_by` calls observed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Swallow the notifications for the next `n` effective moves,
    /// simulating the channel losing them.
    pub fn drop_next_move_notifications(&mut self, n: usize) {
        self.drop_next_move_notifications = n;
    }

    /// Re-deliver the last delivered notification shape for the current
    /// entry, simulating a duplicated notification.
    pub fn duplicate_current_notification(&mut self) {
        let id = self.entries[self.index].id.clone();
        self.pending.push_back(LocationChanged { state_id: id });
    }

    /// Notifications still waiting to be polled.
    #[must_use]
    pub fn pending_notifications(&self) -> usize {
        self.pending.len()
    }
}

impl NavigationPrimitive for HeadlessNavigator {
    fn change_location(&mut self, kind: ChangeKind, id: &StateId, _title: &str, url: &str) {
        self.calls.push(PrimitiveCall::Change {
            kind,
            id: id.clone(),
            url: url.to_owned(),
        });
        let entry = HistoryEntry {
            id: Some(id.clone()),
            url: url.to_owned(),
        };
        match kind {
            ChangeKind::Push => {
                self.entries.truncate(self.index + 1);
                self.entries.push(entry);
                self.index += 1;
            }
            ChangeKind::Replace => {
                self.entries[self.index] = entry;
            }
        }
        // Direct changes emit no notification of their own; the engine
        // runs its confirmation path synchronously instead.
    }

    fn step_by(&mut self, offset: i32) {
        self.calls.push(PrimitiveCall::Step { offset });
        let target = self
            .index
            .saturating_add_signed(offset as isize)
            .min(self.entries.len() - 1);
        // A step past either end still announces the (unchanged) entry,
        // like a real channel re-firing on a no-op traversal.
        self.index = target;
        if self.drop_next_move_notifications > 0 {
            self.drop_next_move_notifications -= 1;
            return;
        }
        self.pending.push_back(LocationChanged {
            state_id: self.entries[self.index].id.clone(),
        });
    }

    fn location(&self) -> String {
        self.entries[self.index].url.clone()
    }

    fn poll_notification(&mut self) -> Option<LocationChanged> {
        self.pending.pop_front()
    }
}

/// Event sink that records every announcement.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    /// Announced events, in order.
    pub events: Vec<EngineEvent>,
}

impl RecordingEvents {
    /// Count of `StateChanged` announcements.
    #[must_use]
    pub fn state_changes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, EngineEvent::StateChanged { .. }))
            .count()
    }

    /// Count of `AnchorChanged` announcements.
    #[must_use]
    pub fn anchor_changes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, EngineEvent::AnchorChanged { .. }))
            .count()
    }
}

impl EventSink for RecordingEvents {
    fn notify(&mut self, event: EngineEvent) {
        self.events.push(event);
    }
}

/// Title sink that records every applied title.
#[derive(Debug, Default)]
pub struct RecordingTitles {
    /// Applied titles, in order.
    pub titles: Vec<String>,
}

impl RecordingTitles {
    /// The most recently applied title.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.titles.last().map(String::as_str)
    }
}

impl TitleSink for RecordingTitles {
    fn set_title(&mut self, title: &str) {
        self.titles.push(title.to_owned());
    }
}

/// Manually advanced clock for deterministic scheduling tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// Clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now_mono(&self) -> Duration {
        self.now.get()
    }
}

/// All headless collaborators bundled as a [`Platform`].
#[derive(Debug)]
pub struct HeadlessPlatform {
    /// Simulated navigation primitive.
    pub nav: HeadlessNavigator,
    /// In-memory snapshot store.
    pub store: MemoryStore,
    /// Recorded event announcements.
    pub events: RecordingEvents,
    /// Recorded title applications.
    pub titles: RecordingTitles,
    /// Manual clock.
    pub clock: ManualClock,
}

impl HeadlessPlatform {
    /// Platform positioned at `initial_url` with an empty store.
    #[must_use]
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            nav: HeadlessNavigator::new(initial_url),
            store: MemoryStore::new(),
            events: RecordingEvents::default(),
            titles: RecordingTitles::default(),
            clock: ManualClock::new(),
        }
    }
}

impl Platform for HeadlessPlatform {
    type Nav = HeadlessNavigator;
    type Store = MemoryStore;
    type Events = RecordingEvents;
    type Titles = RecordingTitles;
    type Clock = ManualClock;

    fn nav(&mut self) -> &mut Self::Nav {
        &mut self.nav
    }

    fn store(&mut self) -> &mut Self::Store {
        &mut self.store
    }

    fn events(&mut self) -> &mut Self::Events {
        &mut self.events
    }

    fn titles(&mut self) -> &mut Self::Titles {
        &mut self.titles
    }

    fn clock(&self) -> &Self::Clock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_truncates_forward_entries() {
        let mut nav = HeadlessNavigator::new("https://x/");
        nav.change_location(ChangeKind::Push, &StateId::from("1"), "", "https://x/a");
        nav.change_location(ChangeKind::Push, &StateId::from("2"), "", "https://x/b");
        nav.step_by(-1);
        nav.poll_notification();

        nav.change_location(ChangeKind::Push, &StateId::from("3"), "", "https://x/c");
        assert_eq!(nav.location(), "https://x/c");
        // Forward entry "b" is gone: stepping forward stays put.
        nav.step_by(1);
        assert_eq!(nav.location(), "https://x/c");
    }

    #[test]
    fn replace_rewrites_in_place() {
        let mut nav = HeadlessNavigator::new("https://x/");
        nav.change_location(ChangeKind::Push, &StateId::from("1"), "", "https://x/a");
        nav.change_location(ChangeKind::Replace, &StateId::from("2"), "", "https://x/b");

        assert_eq!(nav.location(), "https://x/b");
        nav.step_by(-1);
        nav.poll_notification();
        assert_eq!(nav.location(), "https://x/");
    }

    #[test]
    fn moves_notify_with_entry_id() {
        let mut nav = HeadlessNavigator::new("https://x/");
        nav.change_location(ChangeKind::Push, &StateId::from("1"), "", "https://x/a");
        nav.step_by(-1);

        let note = nav.poll_notification().expect("move notifies");
        assert_eq!(note.state_id, None); // the initial entry has no id
        nav.step_by(1);
        let note = nav.poll_notification().unwrap();
        assert_eq!(note.state_id, Some(StateId::from("1")));
    }

    #[test]
    fn dropped_notifications_are_swallowed() {
        let mut nav = HeadlessNavigator::new("https://x/");
        nav.change_location(ChangeKind::Push, &StateId::from("1"), "", "https://x/a");
        nav.drop_next_move_notifications(1);

        nav.step_by(-1);
        assert_eq!(nav.pending_notifications(), 0);
        assert_eq!(nav.location(), "https://x/");

        nav.step_by(1);
        assert_eq!(nav.pending_notifications(), 1);
    }

    #[test]
    fn stepping_past_the_edge_stays_put_but_announces() {
        let mut nav = HeadlessNavigator::new("https://x/");
        nav.step_by(-1);
        nav.step_by(1);
        assert_eq!(nav.pending_notifications(), 2);
        assert_eq!(nav.location(), "https://x/");
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_mono(), Duration::ZERO);
        clock.advance(Duration::from_millis(300));
        assert_eq!(clock.now_mono(), Duration::from_millis(300));
    }
}
