#![forbid(unsafe_code)]

//! The navigation engine.
//!
//! [`NavigationEngine`] owns the registry, timeline, scheduler, and
//! watchdog, and drives them against a [`Platform`]'s collaborators.
//! Everything runs on one cooperative thread of control: public
//! operations either execute immediately (up to the point where control
//! passes to the navigation primitive) or park behind the busy gate, and
//! [`NavigationEngine::tick`] is the single time-aware entry point that
//! pumps notifications and fires due deadlines.
//!
//! # Busy-gate discipline
//!
//! Every path that sets the gate has a matching path that clears it:
//! the confirmation handler (real change, duplicate notification, or
//! plain anchor), the short-circuit "already current" branch of
//! push/replace, and `teardown`. The gate is never left held.

use tracing::{debug, trace};
use web_time::Duration;

use wayfare_backend::{
    ChangeKind, Clock, EngineEvent, EventSink, LocationChanged, NavigationPrimitive, Platform,
    TitleSink,
};
use wayfare_core::capabilities::PlatformCapabilities;
use wayfare_core::codec::StateCodec;
use wayfare_core::error::{NavError, Result};
use wayfare_core::registry::StateRegistry;
use wayfare_core::state::{State, StateId, StateSeed};
use wayfare_core::timeline::Timeline;
use wayfare_core::url_resolve::{self, UrlContext};

use crate::persistence;
use crate::scheduler::{Admit, NavOp, OperationScheduler, Queue, QueuedOperation, SchedulerStats};
use crate::watchdog::RetryWatchdog;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// What the platform's primitive can be trusted to do.
    pub capabilities: PlatformCapabilities,
    /// Application root URL (origin).
    pub root_url: String,
    /// Base URL for plain-relative targets; defaults to the root.
    pub base_url: Option<String>,
    /// Pacing delay between queued-operation replays.
    pub busy_delay: Duration,
    /// How long a relative move may go unconfirmed before one retry.
    pub watchdog_deadline: Duration,
    /// Fallback persistence interval (armed only without a reliable
    /// teardown signal).
    pub store_interval: Duration,
    /// Title applied when the initial state's title is empty.
    pub initial_title: String,
}

impl EngineConfig {
    /// Defaults for the given root URL: native capabilities, 250ms
    /// replay pacing, 500ms watchdog deadline, 1s store interval.
    #[must_use]
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            capabilities: PlatformCapabilities::native(),
            root_url: root_url.into(),
            base_url: None,
            busy_delay: Duration::from_millis(250),
            watchdog_deadline: Duration::from_millis(500),
            store_interval: Duration::from_millis(1000),
            initial_title: String::new(),
        }
    }

    /// Set the capability flags.
    #[must_use]
    pub fn with_capabilities(mut self, caps: PlatformCapabilities) -> Self {
        self.capabilities = caps;
        self
    }

    /// Set the base URL for plain-relative targets.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the replay pacing delay.
    #[must_use]
    pub fn with_busy_delay(mut self, delay: Duration) -> Self {
        self.busy_delay = delay;
        self
    }

    /// Set the watchdog deadline.
    #[must_use]
    pub fn with_watchdog_deadline(mut self, deadline: Duration) -> Self {
        self.watchdog_deadline = deadline;
        self
    }

    /// Set the fallback persistence interval.
    #[must_use]
    pub fn with_store_interval(mut self, interval: Duration) -> Self {
        self.store_interval = interval;
        self
    }

    /// Set the initial title.
    #[must_use]
    pub fn with_initial_title(mut self, title: impl Into<String>) -> Self {
        self.initial_title = title.into();
        self
    }
}

/// What happened to a submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Executed immediately (handed to the primitive, or confirmed
    /// synchronously).
    Executed,
    /// Parked behind the busy gate; will replay on drain.
    Deferred,
    /// Short-circuited: the target is already the current state.
    Noop,
}

/// One navigation engine per application.
#[derive(Debug)]
pub struct NavigationEngine<P: Platform> {
    platform: P,
    caps: PlatformCapabilities,
    codec: StateCodec,
    registry: StateRegistry,
    timeline: Timeline,
    scheduler: OperationScheduler,
    watchdog: RetryWatchdog,
    expected_id: Option<StateId>,
    watchdog_deadline: Duration,
    store_interval: Duration,
    initial_title: String,
    store_sync_at: Option<Duration>,
}

impl<P: Platform> NavigationEngine<P> {
    /// Build an engine over `platform`.
    ///
    /// Loads the persisted overlay (read failures degrade to empty),
    /// then captures and confirms a state for the primitive's current
    /// location so the engine starts anchored.
    pub fn new(mut platform: P, config: EngineConfig) -> Self {
        let overlay = persistence::load_overlay(platform.store());
        let registry = StateRegistry::with_overlay(overlay);
        let codec = StateCodec::new(
            UrlContext::new(config.root_url, config.base_url),
            config.capabilities,
        );
        let store_sync_at = if config
            .capabilities
            .contains(PlatformCapabilities::RELIABLE_TEARDOWN)
        {
            None
        } else {
            Some(platform.clock().now_mono() + config.store_interval)
        };

        let mut engine = Self {
            platform,
            caps: config.capabilities,
            codec,
            registry,
            timeline: Timeline::new(),
            scheduler: OperationScheduler::new(config.busy_delay),
            watchdog: RetryWatchdog::new(),
            expected_id: None,
            watchdog_deadline: config.watchdog_deadline,
            store_interval: config.store_interval,
            initial_title: config.initial_title,
            store_sync_at,
        };
        engine.capture_initial_state();
        engine
    }

    // ── Public surface ──────────────────────────────────────────────

    /// Append a new state and make it current.
    pub fn push(
        &mut self,
        data: serde_json::Value,
        title: &str,
        url: &str,
        queue: Queue,
    ) -> Result<Submission> {
        self.apply(
            ChangeKind::Push,
            StateSeed::new(data, title, url),
            queue.number(),
            true,
        )
    }

    /// Rewrite the current state in place.
    pub fn replace(
        &mut self,
        data: serde_json::Value,
        title: &str,
        url: &str,
        queue: Queue,
    ) -> Result<Submission> {
        self.apply(
            ChangeKind::Replace,
            StateSeed::new(data, title, url),
            queue.number(),
            true,
        )
    }

    /// Move one entry back.
    pub fn back(&mut self, queue: Queue) -> Submission {
        self.submit_step(NavOp::StepBack, queue.number(), true)
    }

    /// Move one entry forward.
    pub fn forward(&mut self, queue: Queue) -> Submission {
        self.submit_step(NavOp::StepForward, queue.number(), true)
    }

    /// Move by a relative offset, expanded into unit steps so each move
    /// gets its own confirmation cycle. Zero is a caller error.
    pub fn go(&mut self, offset: i32, queue: Queue) -> Result<Submission> {
        if offset == 0 {
            return Err(NavError::InvalidArgument(
                "go requires a positive or negative offset".to_owned(),
            ));
        }
        let op = if offset > 0 {
            NavOp::StepForward
        } else {
            NavOp::StepBack
        };
        let mut last = Submission::Noop;
        for _ in 0..offset.unsigned_abs() {
            last = self.submit_step(op.clone(), queue.number(), true);
        }
        Ok(last)
    }

    /// The state the primitive last settled on.
    #[must_use]
    pub fn current_state(&self) -> Option<&State> {
        self.timeline.current()
    }

    /// Resolve a state by id, live registry first, then overlay.
    #[must_use]
    pub fn state_by_id(&self, id: &StateId) -> Option<State> {
        self.registry.resolve_by_id(id).cloned()
    }

    /// Pump pending notifications and fire due deadlines.
    ///
    /// Call regularly from the host's event loop; this is the only
    /// entry point that consumes time.
    pub fn tick(&mut self) {
        while let Some(note) = self.platform.nav().poll_notification() {
            self.on_location_changed(note);
        }

        let now = self.platform.clock().now_mono();
        if let Some(op) = self.watchdog.take_due(now) {
            self.submit_step(op, 0, false);
        }

        let now = self.platform.clock().now_mono();
        if let Some(item) = self.scheduler.take_due(now) {
            self.replay(item);
        }

        if let Some(at) = self.store_sync_at
            && self.platform.clock().now_mono() >= at
        {
            persistence::sync(&self.registry, self.platform.store());
            self.store_sync_at = Some(self.platform.clock().now_mono() + self.store_interval);
        }
    }

    /// Persist the registry and reset all scheduling state.
    ///
    /// Wired to both teardown triggers ("about to unload" and
    /// "unloaded"); invoking it more than once is safe.
    pub fn teardown(&mut self) {
        persistence::sync(&self.registry, self.platform.store());
        self.scheduler.clear();
        self.watchdog.disarm();
        self.expected_id = None;
    }

    /// Whether an operation currently holds the busy gate.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.scheduler.is_busy()
    }

    /// Operations parked behind the gate.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.scheduler.pending()
    }

    /// Scheduler counters.
    #[must_use]
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// The timeline (read-only).
    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The capability flags this engine was built with.
    #[must_use]
    pub fn capabilities(&self) -> PlatformCapabilities {
        self.caps
    }

    /// The underlying platform.
    #[must_use]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable access to the underlying platform (hosts feed teardown
    /// signals and tests drive the clock through this).
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    // ── Operation execution ─────────────────────────────────────────

    fn apply(
        &mut self,
        kind: ChangeKind,
        seed: StateSeed,
        queue_number: usize,
        allow_queue: bool,
    ) -> Result<Submission> {
        // Fragment-addressed states are unrepresentable without direct
        // location assignment; reject before any queueing.
        if !url_resolve::fragment_of(&seed.url).is_empty()
            && !self.caps.contains(PlatformCapabilities::FRAGMENT_PUSH)
        {
            return Err(NavError::UnsupportedHashState { url: seed.url });
        }
        let op = match kind {
            ChangeKind::Push => NavOp::Push(seed),
            ChangeKind::Replace => NavOp::Replace(seed),
        };
        match self.scheduler.admit(op, queue_number, allow_queue) {
            Admit::Deferred => Ok(Submission::Deferred),
            Admit::Execute(op) => Ok(self.execute(op)),
        }
    }

    fn submit_step(&mut self, op: NavOp, queue_number: usize, allow_queue: bool) -> Submission {
        match self.scheduler.admit(op, queue_number, allow_queue) {
            Admit::Deferred => Submission::Deferred,
            Admit::Execute(op) => self.execute(op),
        }
    }

    /// Execute an admitted operation. The busy gate is already held.
    fn execute(&mut self, op: NavOp) -> Submission {
        match op {
            NavOp::Push(seed) => self.execute_change(ChangeKind::Push, seed),
            NavOp::Replace(seed) => self.execute_change(ChangeKind::Replace, seed),
            NavOp::StepBack => self.execute_step(-1),
            NavOp::StepForward => self.execute_step(1),
        }
    }

    fn execute_change(&mut self, kind: ChangeKind, seed: StateSeed) -> Submission {
        let page = self.page();
        let state = self.codec.normalize(&seed, &page, &mut self.registry);

        if self.timeline.is_current(&state.id) {
            debug!(id = %state.id, "target equals current state; short-circuit");
            self.clear_busy();
            return Submission::Noop;
        }

        self.registry.record(&state);
        self.timeline.append_constructed(state.clone());
        self.expected_id = Some(state.id.clone());
        debug!(id = %state.id, url = %state.url, op = ?kind, "changing location");
        self.platform
            .nav()
            .change_location(kind, &state.id, &state.title, &state.url);
        // The primitive may not emit a distinct notification for a
        // direct change in every environment; run the confirmation path
        // once either way so the timeline stays consistent.
        self.on_location_changed(LocationChanged::anonymous());
        Submission::Executed
    }

    fn execute_step(&mut self, offset: i32) -> Submission {
        if !self
            .caps
            .contains(PlatformCapabilities::RELIABLE_MOVE_NOTIFY)
        {
            let now = self.platform.clock().now_mono();
            let op = if offset < 0 {
                NavOp::StepBack
            } else {
                NavOp::StepForward
            };
            self.watchdog.arm(op, now + self.watchdog_deadline);
        }
        debug!(offset, "stepping");
        self.platform.nav().step_by(offset);
        Submission::Executed
    }

    fn replay(&mut self, item: QueuedOperation) {
        match item.op {
            NavOp::Push(seed) => {
                // The fragment guard ran before this op was queued, so
                // replay cannot surface an error.
                let _ = self.apply(ChangeKind::Push, seed, item.queue_number, false);
            }
            NavOp::Replace(seed) => {
                let _ = self.apply(ChangeKind::Replace, seed, item.queue_number, false);
            }
            op @ (NavOp::StepBack | NavOp::StepForward) => {
                self.submit_step(op, item.queue_number, false);
            }
        }
    }

    // ── Confirmation handler ────────────────────────────────────────

    fn on_location_changed(&mut self, note: LocationChanged) {
        self.watchdog.mark_changed();

        let location = self.platform.nav().location();
        let fragment = url_resolve::fragment_of(&location);
        if !fragment.is_empty() {
            let known = self.extract_state(&fragment, true);
            self.expected_id = None;
            match known {
                Some(state) => {
                    // A state-encoded fragment is a navigation in
                    // disguise; route it through replace, queue bypassed.
                    let _ = self.apply(ChangeKind::Replace, state.seed(), 0, false);
                }
                None => {
                    debug!(anchor = %fragment, "plain anchor movement");
                    self.platform
                        .events()
                        .notify(EngineEvent::AnchorChanged { hash: fragment });
                    self.clear_busy();
                }
            }
            return;
        }

        let mut resolved = None;
        if let Some(id) = &note.state_id {
            resolved = self.registry.resolve_by_id(id).cloned();
        }
        if resolved.is_none()
            && let Some(id) = self.expected_id.clone()
        {
            resolved = self.registry.resolve_by_id(&id).cloned();
        }
        if resolved.is_none() {
            resolved = self.extract_state(&location, false);
        }
        let state = match resolved {
            Some(state) => state,
            None => {
                let page = self.page();
                self.codec
                    .normalize(&StateSeed::bare(location), &page, &mut self.registry)
            }
        };
        self.expected_id = None;

        if self.timeline.is_current(&state.id) {
            trace!(id = %state.id, "notification resolves to the current state");
            self.clear_busy();
            return;
        }

        self.registry.record(&state);
        self.timeline.append_constructed(state.clone());
        self.timeline.confirm(state.clone());
        self.apply_title(&state);
        debug!(id = %state.id, url = %state.url, "state confirmed");
        self.platform
            .events()
            .notify(EngineEvent::StateChanged { state });
        self.clear_busy();
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Resolve a state from a URL or hash: embedded `_suid` id first,
    /// then the location index, then (optionally) a fresh state;
    /// except for traditional anchors, which are never states.
    fn extract_state(&mut self, url_or_hash: &str, create: bool) -> Option<State> {
        if let Some(id) = url_resolve::extract_suid(url_or_hash)
            && let Some(state) = self.registry.resolve_by_id(&id)
        {
            return Some(state.clone());
        }
        let page = self.page();
        let full = self.codec.urls().full_url(url_or_hash, &page);
        if let Some(id) = self.registry.resolve_by_location(&full)
            && let Some(state) = self.registry.resolve_by_id(&id)
        {
            return Some(state.clone());
        }
        if create && !url_resolve::is_traditional_anchor(url_or_hash) {
            return Some(
                self.codec
                    .normalize(&StateSeed::bare(url_or_hash), &page, &mut self.registry),
            );
        }
        None
    }

    fn capture_initial_state(&mut self) {
        let location = self.platform.nav().location();
        if let Some(state) = self.extract_state(&location, true) {
            trace!(id = %state.id, url = %state.url, "initial state captured");
            self.registry.record(&state);
            self.timeline.append_constructed(state.clone());
            self.timeline.confirm(state);
        }
    }

    /// The location state resolution is relative to: the current
    /// confirmed state's url, or the primitive's raw location before
    /// anything is confirmed.
    fn page(&mut self) -> String {
        self.timeline
            .current()
            .map(|state| state.url.clone())
            .unwrap_or_else(|| self.platform.nav().location())
    }

    fn apply_title(&mut self, state: &State) {
        let mut title = state.title.clone();
        if title.is_empty()
            && let Some(first) = self.timeline.confirmed_at(0)
            && first.url == state.url
        {
            title = if first.title.is_empty() {
                self.initial_title.clone()
            } else {
                first.title.clone()
            };
        }
        self.platform.titles().set_title(&title);
    }

    fn clear_busy(&mut self) {
        let now = self.platform.clock().now_mono();
        self.scheduler.clear_busy(now);
    }
}
