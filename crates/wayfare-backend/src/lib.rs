#![forbid(unsafe_code)]
#![doc = "Collaborator traits for Wayfare: the boundary between the engine and its platform."]
#![doc = ""]
#![doc = "The engine consumes four collaborators (the navigation primitive, the"]
#![doc = "persisted store, the event sink, and the title sink) plus a monotonic"]
#![doc = "clock. This crate defines those contracts; implementations live with"]
#![doc = "embedders (and `wayfare-runtime` ships headless in-memory ones)."]

use core::fmt;
use web_time::{Duration, Instant};

use wayfare_core::registry::RegistrySnapshot;
use wayfare_core::state::{State, StateId};

/// How the primitive should install a new location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Append a new entry and make it current.
    Push,
    /// Rewrite the current entry in place.
    Replace,
}

/// A "location changed" notification from the primitive.
///
/// The channel is unreliable by contract: a notification may be missing,
/// duplicated, or late, and `state_id` is only present when the
/// primitive retained the id it was handed at change time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationChanged {
    /// Id carried by the underlying entry, when known.
    pub state_id: Option<StateId>,
}

impl LocationChanged {
    /// Notification with no id payload.
    #[must_use]
    pub fn anonymous() -> Self {
        Self { state_id: None }
    }

    /// Notification carrying the entry's id.
    #[must_use]
    pub fn carrying(id: StateId) -> Self {
        Self {
            state_id: Some(id),
        }
    }
}

/// The underlying navigation primitive: one mutable "current location"
/// plus an asynchronous notification channel.
///
/// Notifications are pulled, not pushed: the engine pumps
/// [`NavigationPrimitive::poll_notification`] from its tick so the whole
/// system stays on one cooperative thread of control.
pub trait NavigationPrimitive {
    /// Install a new location. The primitive may or may not emit a
    /// notification of its own for this call; the engine compensates.
    fn change_location(&mut self, kind: ChangeKind, id: &StateId, title: &str, url: &str);

    /// Move by a relative offset in the primitive's own history.
    /// Confirmation only ever arrives via the notification channel.
    fn step_by(&mut self, offset: i32);

    /// The current absolute location.
    fn location(&self) -> String;

    /// Drain one pending notification, if any.
    fn poll_notification(&mut self) -> Option<LocationChanged>;
}

/// Session-persistent snapshot storage.
pub trait StateStore {
    /// Platform-specific error type. The engine never propagates these:
    /// a failed read degrades to an empty snapshot, a failed write is
    /// logged and dropped.
    type Error: fmt::Debug + fmt::Display;

    /// Read the persisted snapshot. `Ok(None)` means "nothing persisted
    /// yet" and is not an error.
    fn read(&self) -> Result<Option<RegistrySnapshot>, Self::Error>;

    /// Replace the persisted snapshot.
    fn write(&mut self, snapshot: &RegistrySnapshot) -> Result<(), Self::Error>;
}

/// Engine-level events announced to the rest of the application.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The confirmed state changed.
    StateChanged {
        /// The newly confirmed state.
        state: State,
    },
    /// The location moved to a plain same-page anchor; no state
    /// transition occurred.
    AnchorChanged {
        /// The anchor fragment, percent-decoded.
        hash: String,
    },
}

/// Outbound event dispatch. The engine only produces events; it never
/// consumes them.
pub trait EventSink {
    /// Announce an engine event.
    fn notify(&mut self, event: EngineEvent);
}

/// Where confirmed titles are applied.
pub trait TitleSink {
    /// Apply a title.
    fn set_title(&mut self, title: &str);
}

/// Monotonic clock abstraction.
///
/// The engine never calls `Instant::now()` directly; all deadlines are
/// `Duration` offsets on this clock's timeline, which keeps scheduling
/// deterministic under test.
pub trait Clock {
    /// Elapsed time since an unspecified epoch, monotonically increasing.
    fn now_mono(&self) -> Duration;
}

/// Wall-clock backed [`Clock`], anchored at construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_mono(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Unified platform bundling the engine's collaborators.
///
/// The engine is generic over this trait; embedders supply one value
/// owning all five collaborators, and `wayfare-runtime` ships a
/// headless implementation for tests and non-browser hosts.
pub trait Platform {
    /// Navigation primitive implementation.
    type Nav: NavigationPrimitive;
    /// Persisted store implementation.
    type Store: StateStore;
    /// Event sink implementation.
    type Events: EventSink;
    /// Title sink implementation.
    type Titles: TitleSink;
    /// Clock implementation.
    type Clock: Clock;

    /// Access the navigation primitive.
    fn nav(&mut self) -> &mut Self::Nav;
    /// Access the persisted store.
    fn store(&mut self) -> &mut Self::Store;
    /// Access the event sink.
    fn events(&mut self) -> &mut Self::Events;
    /// Access the title sink.
    fn titles(&mut self) -> &mut Self::Titles;
    /// Access the monotonic clock.
    fn clock(&self) -> &Self::Clock;
}
