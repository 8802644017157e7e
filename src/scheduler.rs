//! Deferred confirmation-timeout checks.
//!
//! The coordinator never cancels a scheduled check.  When a check wakes,
//! the coordinator compares its session against the live one and ignores
//! it if that session already resolved.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Identity of one confirmation session.  Strictly increasing per coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A wake-up request: "look at session `session` at `deadline_s`".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutCheck {
    pub session: SessionId,
    pub deadline_s: f64,
}

/// Arranges for a `TimeoutCheck` to be handed back to the coordinator at
/// (or after) its deadline.
pub trait TimeoutScheduler {
    fn schedule(&mut self, check: TimeoutCheck);
}

// ── DeadlineQueue ───────────────────────────────────────────

/// Polled scheduler: checks sit in a shared queue until the driver asks
/// for the ones due at its current time.  Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct DeadlineQueue {
    pending: Arc<Mutex<Vec<TimeoutCheck>>>,
}

impl DeadlineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_pending<R>(&self, f: impl FnOnce(&mut Vec<TimeoutCheck>) -> R) -> R {
        match self.pending.lock() {
            Ok(mut pending) => f(&mut pending),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Remove and return every check with `deadline_s <= now_s`, earliest first.
    pub fn take_due(&self, now_s: f64) -> Vec<TimeoutCheck> {
        self.with_pending(|pending| {
            let mut due: Vec<TimeoutCheck> = Vec::new();
            pending.retain(|check| {
                if check.deadline_s <= now_s {
                    due.push(*check);
                    false
                } else {
                    true
                }
            });
            due.sort_by(|a, b| {
                a.deadline_s
                    .partial_cmp(&b.deadline_s)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            due
        })
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<f64> {
        self.with_pending(|pending| {
            pending
                .iter()
                .map(|c| c.deadline_s)
                .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
        })
    }

    pub fn len(&self) -> usize {
        self.with_pending(|pending| pending.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimeoutScheduler for DeadlineQueue {
    fn schedule(&mut self, check: TimeoutCheck) {
        self.with_pending(|pending| pending.push(check));
    }
}
