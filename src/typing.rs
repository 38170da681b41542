//! Typing notifier — debounces local keystrokes into start/stop events.
//!
//! DESIGN
//! ======
//! Two states, `Idle` and `Typing`. The first keystroke out of `Idle` emits
//! `typing: true`; every keystroke re-arms a single-shot [`DebounceTimer`].
//! When the timer comes due with no further keystroke the notifier returns to
//! `Idle` and emits `typing: false`.
//!
//! The timer holds a deadline rather than a task handle. Re-arming moves the
//! deadline; the event loop sleeps until whatever deadline is current, so at
//! most one timer is ever pending.

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;

use std::time::Duration;

use tokio::time::Instant;

/// Quiet period after the last keystroke before `typing: false` is sent.
pub const TYPING_IDLE_TIMEOUT: Duration = Duration::from_millis(3000);

// =============================================================================
// DEBOUNCE TIMER
// =============================================================================

/// Cancel-and-reschedule single-shot timer.
#[derive(Clone, Copy, Debug)]
pub struct DebounceTimer {
    window: Duration,
    deadline: Option<Instant>,
}

impl DebounceTimer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, deadline: None }
    }

    /// Cancel any pending deadline and schedule a new one `window` after `now`.
    pub fn rearm(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// Resolve at `deadline`, or never when there is none.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// NOTIFIER
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypingState {
    Idle,
    Typing,
}

#[derive(Clone, Copy, Debug)]
pub struct TypingNotifier {
    state: TypingState,
    timer: DebounceTimer,
}

impl TypingNotifier {
    #[must_use]
    pub fn new(idle_after: Duration) -> Self {
        Self { state: TypingState::Idle, timer: DebounceTimer::new(idle_after) }
    }

    #[must_use]
    pub fn state(&self) -> TypingState {
        self.state
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Record a keystroke. Returns `Some(true)` on the Idle → Typing edge.
    pub fn keystroke(&mut self, now: Instant) -> Option<bool> {
        self.timer.rearm(now);
        match self.state {
            TypingState::Idle => {
                self.state = TypingState::Typing;
                Some(true)
            }
            TypingState::Typing => None,
        }
    }

    /// Fire the timer if due. Returns `Some(false)` on the Typing → Idle edge.
    pub fn expire(&mut self, now: Instant) -> Option<bool> {
        if !self.timer.is_due(now) {
            return None;
        }
        self.timer.cancel();
        match self.state {
            TypingState::Typing => {
                self.state = TypingState::Idle;
                Some(false)
            }
            TypingState::Idle => None,
        }
    }

    /// Drop back to `Idle` without emitting anything.
    pub fn reset(&mut self) {
        self.timer.cancel();
        self.state = TypingState::Idle;
    }
}

impl Default for TypingNotifier {
    fn default() -> Self {
        Self::new(TYPING_IDLE_TIMEOUT)
    }
}
