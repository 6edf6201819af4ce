#![forbid(unsafe_code)]

//! Wayfare Runtime
//!
//! This crate ties the core state machinery to a platform's
//! collaborators and gives client applications browser-style navigation
//! over a single mutable "current location" primitive.
//!
//! # Key Components
//!
//! - [`NavigationEngine`] - the engine: operations, confirmation, tick
//! - [`OperationScheduler`] - busy gate + numbered FIFO queues
//! - [`RetryWatchdog`] - deadline retry for relative moves
//! - [`persistence`] - snapshot stores and the teardown merge
//! - [`headless`] - in-memory collaborators for tests and plain hosts
//!
//! # Role in Wayfare
//! `wayfare-runtime` is the orchestrator. It consumes notifications from
//! the platform's navigation primitive, resolves them against the
//! `wayfare-core` registry and timeline, and announces confirmed state
//! changes back through the platform's sinks.

pub mod engine;
pub mod headless;
pub mod persistence;
pub mod scheduler;
pub mod watchdog;

pub use engine::{EngineConfig, NavigationEngine, Submission};
pub use headless::{
    HeadlessNavigator, HeadlessPlatform, ManualClock, PrimitiveCall, RecordingEvents,
    RecordingTitles,
};
pub use persistence::{FileStore, MemoryStore, StoreError};
pub use scheduler::{Admit, NavOp, OperationScheduler, Queue, QueuedOperation, SchedulerStats};
pub use watchdog::RetryWatchdog;
