#![forbid(unsafe_code)]

//! Single-flight operation scheduling.
//!
//! The scheduler is a busy gate plus a set of numbered FIFO sub-queues.
//! At most one navigation operation is ever in flight; operations
//! submitted while the gate is held are deferred into their queue and
//! replayed one per drain deadline once the gate clears.
//!
//! # Key Invariants
//!
//! 1. **Single flight**: `admit` hands back at most one executable
//!    operation per gate acquisition; the gate stays held until a
//!    confirmation (or short-circuit) clears it.
//! 2. **FIFO within a queue number**: deferred operations replay in
//!    submission order.
//! 3. **Priority across queue numbers**: higher numbers drain first;
//!    there is no global FIFO across differing numbers.
//! 4. **Paced drain**: each due deadline releases at most one operation,
//!    so the platform's own pending notification can settle between
//!    replays.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Drain due while gate held | Nothing fires; re-armed on next clear |
//! | All queues empty at drain | Deadline disarmed |
//! | `clear()` | Gate reset, queues dropped, deadline disarmed |

use std::collections::VecDeque;

use tracing::debug;
use web_time::Duration;

use wayfare_core::state::StateSeed;

/// A navigation request, immutable once enqueued.
#[derive(Debug, Clone, PartialEq)]
pub enum NavOp {
    /// Append a new state.
    Push(StateSeed),
    /// Rewrite the current state.
    Replace(StateSeed),
    /// Move one entry back.
    StepBack,
    /// Move one entry forward.
    StepForward,
}

impl NavOp {
    /// Short label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Push(_) => "push",
            Self::Replace(_) => "replace",
            Self::StepBack => "back",
            Self::StepForward => "forward",
        }
    }
}

/// Caller-facing queue selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Queue {
    /// Queue number 0.
    #[default]
    Default,
    /// An explicit queue number; higher numbers drain first.
    Numbered(usize),
}

impl Queue {
    /// The underlying queue number.
    #[must_use]
    pub fn number(self) -> usize {
        match self {
            Self::Default => 0,
            Self::Numbered(n) => n,
        }
    }
}

/// A deferred operation with its replay bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedOperation {
    /// The deferred request.
    pub op: NavOp,
    /// Queue number it was submitted under.
    pub queue_number: usize,
    /// Global submission sequence (diagnostic ordering).
    pub seq: u64,
}

/// Outcome of an admission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Admit {
    /// Gate acquired; the caller must execute the operation now.
    Execute(NavOp),
    /// Gate was held; the operation is parked in its queue.
    Deferred,
}

/// Scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Operations submitted (admitted or deferred).
    pub total_submitted: u64,
    /// Operations deferred into a queue.
    pub total_deferred: u64,
    /// Operations replayed by the drain loop.
    pub total_drained: u64,
}

/// Busy gate plus numbered FIFO queues.
#[derive(Debug)]
pub struct OperationScheduler {
    busy: bool,
    queues: Vec<VecDeque<QueuedOperation>>,
    drain_at: Option<Duration>,
    busy_delay: Duration,
    next_seq: u64,
    stats: SchedulerStats,
}

impl OperationScheduler {
    /// Scheduler with the given replay pacing delay.
    #[must_use]
    pub fn new(busy_delay: Duration) -> Self {
        Self {
            busy: false,
            queues: Vec::new(),
            drain_at: None,
            busy_delay,
            next_seq: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// Whether an operation currently holds the gate.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Total operations parked across all queues.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Try to acquire the gate for `op`.
    ///
    /// With `allow_queue` and the gate held, the operation is parked
    /// instead. `allow_queue = false` is the replay/retry path: it takes
    /// the gate unconditionally (re-entering from the confirmation
    /// handler or the watchdog, where the gate is legitimately held).
    pub fn admit(&mut self, op: NavOp, queue_number: usize, allow_queue: bool) -> Admit {
        self.stats.total_submitted += 1;
        if allow_queue && self.busy {
            let seq = self.next_seq;
            self.next_seq += 1;
            if self.queues.len() <= queue_number {
                self.queues.resize_with(queue_number + 1, VecDeque::new);
            }
            debug!(op = op.label(), queue = queue_number, seq, "gate busy; deferring");
            self.queues[queue_number].push_back(QueuedOperation {
                op,
                queue_number,
                seq,
            });
            self.stats.total_deferred += 1;
            return Admit::Deferred;
        }
        self.busy = true;
        Admit::Execute(op)
    }

    /// Release the gate and arm the drain deadline.
    pub fn clear_busy(&mut self, now: Duration) {
        self.busy = false;
        self.drain_at = Some(now + self.busy_delay);
    }

    /// Pop the next replayable operation if the drain deadline is due
    /// and the gate is free. Scans queue numbers high→low, FIFO within
    /// a queue; at most one operation per due deadline.
    pub fn take_due(&mut self, now: Duration) -> Option<QueuedOperation> {
        if self.busy {
            return None;
        }
        let due = self.drain_at.is_some_and(|at| now >= at);
        if !due {
            return None;
        }
        for queue in self.queues.iter_mut().rev() {
            if let Some(item) = queue.pop_front() {
                // The replay itself re-arms pacing when it clears the gate.
                self.drain_at = None;
                self.stats.total_drained += 1;
                debug!(
                    op = item.op.label(),
                    queue = item.queue_number,
                    seq = item.seq,
                    "draining deferred operation"
                );
                return Some(item);
            }
        }
        self.drain_at = None;
        None
    }

    /// Reset the gate and discard every pending queue.
    pub fn clear(&mut self) {
        self.busy = false;
        self.queues.clear();
        self.drain_at = None;
    }
}
