#![forbid(unsafe_code)]

//! Deadline retry for relative moves.
//!
//! Step-back/step-forward have no synchronous confirmation: the only
//! signal is the primitive's (unreliable) notification. The watchdog
//! remembers the issued move and, if no confirmation lands before the
//! deadline, hands it back for re-issue, exactly once per arming.
//!
//! Only one watchdog timer is ever live: re-arming replaces the
//! previous deadline.

use tracing::warn;
use web_time::Duration;

use crate::scheduler::NavOp;

/// Exactly-once deadline retry for an outstanding relative move.
#[derive(Debug, Default)]
pub struct RetryWatchdog {
    state_changed: bool,
    deadline: Option<Duration>,
    pending: Option<NavOp>,
}

impl RetryWatchdog {
    /// Disarmed watchdog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for a move: clears the change flag and replaces any previous
    /// deadline and pending retry.
    pub fn arm(&mut self, op: NavOp, deadline: Duration) {
        self.state_changed = false;
        self.deadline = Some(deadline);
        self.pending = Some(op);
    }

    /// Record that a confirmation arrived; disarms the deadline.
    pub fn mark_changed(&mut self) {
        self.state_changed = true;
        self.deadline = None;
        self.pending = None;
    }

    /// Drop any pending retry without recording a change.
    pub fn disarm(&mut self) {
        self.deadline = None;
        self.pending = None;
    }

    /// Whether a deadline is outstanding.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Take the retry if the deadline has passed without a confirmation.
    /// Consuming it disarms the watchdog, so each arming retries at most
    /// once.
    pub fn take_due(&mut self, now: Duration) -> Option<NavOp> {
        let due = self.deadline.is_some_and(|at| now >= at);
        if !due || self.state_changed {
            return None;
        }
        self.deadline = None;
        let op = self.pending.take();
        if let Some(op) = &op {
            warn!(op = op.label(), "move confirmation missed; re-issuing once");
        }
        op
    }
}
