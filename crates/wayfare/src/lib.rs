#![forbid(unsafe_code)]

//! Wayfare public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users. It
//! re-exports common types from the internal crates and offers a
//! lightweight prelude for day-to-day usage.

// --- Core re-exports -------------------------------------------------------

pub use wayfare_core::capabilities::PlatformCapabilities;
pub use wayfare_core::codec::StateCodec;
pub use wayfare_core::error::{NavError, Result};
pub use wayfare_core::registry::{RegistrySnapshot, StateRegistry};
pub use wayfare_core::state::{State, StateId, StateSeed};
pub use wayfare_core::timeline::Timeline;
pub use wayfare_core::url_resolve::UrlContext;

// --- Backend re-exports ----------------------------------------------------

pub use wayfare_backend::{
    ChangeKind, Clock, EngineEvent, EventSink, LocationChanged, MonotonicClock,
    NavigationPrimitive, Platform, StateStore, TitleSink,
};

// --- Runtime re-exports ----------------------------------------------------

pub use wayfare_runtime::{
    EngineConfig, FileStore, HeadlessNavigator, HeadlessPlatform, ManualClock, MemoryStore,
    NavigationEngine, PrimitiveCall, Queue, RecordingEvents, RecordingTitles, Submission,
};

/// One-line import for the common embedding flow.
pub mod prelude {
    pub use crate::{
        EngineConfig, EngineEvent, NavError, NavigationEngine, Platform, PlatformCapabilities,
        Queue, State, StateId, Submission,
    };
}
