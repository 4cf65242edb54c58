//! Single-shot timers.
//!
//! A [`Timer`] is a deadline plus the operations on it. It never sleeps by
//! itself: the owner calls [`Timer::fire`] with the current time whenever the
//! driver delivers a tick, and reports [`Timer::deadline`] so the driver knows
//! when that tick is due. Cancellation is dropping the deadline.

use std::time::Duration;

use crate::env::Instant;

/// Cancellable single-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer<I> {
    deadline: Option<I>,
}

impl<I: Instant> Default for Timer<I> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<I: Instant> Timer<I> {
    /// Timer with nothing scheduled.
    pub fn idle() -> Self {
        Self { deadline: None }
    }

    /// Arm the timer to fire `delay` after `now`, replacing any earlier
    /// schedule.
    pub fn schedule(&mut self, now: I, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    /// Disarm. Returns true if something was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Whether the timer is armed.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the timer will fire. `None` if idle.
    pub fn deadline(&self) -> Option<I> {
        self.deadline
    }

    /// Fire if the deadline has passed.
    ///
    /// Returns true exactly once per schedule; the timer is idle afterwards.
    pub fn fire(&mut self, now: I) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            },
            _ => false,
        }
    }
}

/// Earliest of a set of optional deadlines.
pub fn earliest<I: Instant>(deadlines: impl IntoIterator<Item = Option<I>>) -> Option<I> {
    deadlines.into_iter().flatten().min()
}
