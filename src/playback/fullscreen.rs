//! Theater presentation state
//!
//! Mirrors the host window's fullscreen flag and, while fullscreen, hides the
//! control overlay and the pointer after a period without pointer movement.
//! The host offers no change notification, so the flag is polled.

use std::time::Duration;
use tokio::time::Instant;

use crate::models::FullscreenState;

/// Overlay hides this long after the last pointer movement
pub const OVERLAY_HIDE_DELAY: Duration = Duration::from_millis(3000);

/// Pointer hides this long after the last pointer movement
pub const POINTER_HIDE_DELAY: Duration = Duration::from_millis(2000);

/// How often the host fullscreen flag is polled
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

// =============================================================================
// Restartable Timer
// =============================================================================

/// One-shot timer that can be re-armed from zero at any time.
///
/// It owns only a deadline; the session loop sleeps until the earliest
/// deadline and then asks each timer whether it is due.
#[derive(Debug, Clone)]
pub struct RestartableTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl RestartableTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Arm (or re-arm) the timer to fire `delay` after `now`
    pub fn restart(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before firing, if armed
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    /// Disarm and return true if the deadline has passed
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// What Escape should do in the current presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeAction {
    ExitFullscreen,
    CloseSession,
}

/// Fullscreen state machine with the overlay/pointer auto-hide sub-machine
#[derive(Debug, Clone)]
pub struct FullscreenCoordinator {
    state: FullscreenState,
    overlay_timer: RestartableTimer,
    pointer_timer: RestartableTimer,
    poll_in_flight: bool,
}

impl Default for FullscreenCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl FullscreenCoordinator {
    pub fn new() -> Self {
        Self {
            state: FullscreenState::default(),
            overlay_timer: RestartableTimer::new(OVERLAY_HIDE_DELAY),
            pointer_timer: RestartableTimer::new(POINTER_HIDE_DELAY),
            poll_in_flight: false,
        }
    }

    pub fn state(&self) -> FullscreenState {
        self.state
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state.is_fullscreen
    }

    /// Pointer moved over the player. Ignored while windowed.
    pub fn pointer_moved(&mut self, now: Instant) {
        if !self.state.is_fullscreen {
            return;
        }
        self.state.overlay_visible = true;
        self.state.pointer_hidden = false;
        self.overlay_timer.restart(now);
        self.pointer_timer.restart(now);
    }

    /// Pointer left the player area
    pub fn pointer_left(&mut self) {
        self.reset_chrome();
    }

    /// Apply the host's fullscreen flag (from a poll or a toggle reply).
    ///
    /// Entering fullscreen behaves like a pointer movement so the controls
    /// are briefly visible; leaving resets everything. Returns whether the
    /// fullscreen flag changed.
    pub fn host_reported(&mut self, is_fullscreen: bool, now: Instant) -> bool {
        if is_fullscreen == self.state.is_fullscreen {
            return false;
        }

        if is_fullscreen {
            tracing::debug!("entered fullscreen");
            self.state.is_fullscreen = true;
            self.pointer_moved(now);
        } else {
            tracing::debug!("left fullscreen");
            self.state.is_fullscreen = false;
            self.reset_chrome();
        }
        true
    }

    /// Fire any due timers. Returns whether visible state changed.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if self.overlay_timer.fire_if_due(now) {
            changed |= self.state.overlay_visible;
            self.state.overlay_visible = false;
        }
        if self.pointer_timer.fire_if_due(now) {
            changed |= !self.state.pointer_hidden;
            self.state.pointer_hidden = true;
        }
        changed
    }

    /// Earliest armed timer deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.overlay_timer.deadline(), self.pointer_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn overlay_remaining(&self, now: Instant) -> Option<Duration> {
        self.overlay_timer.remaining(now)
    }

    pub fn pointer_remaining(&self, now: Instant) -> Option<Duration> {
        self.pointer_timer.remaining(now)
    }

    pub fn escape(&self) -> EscapeAction {
        if self.state.is_fullscreen {
            EscapeAction::ExitFullscreen
        } else {
            EscapeAction::CloseSession
        }
    }

    /// Claim the poll slot. False means a poll is still outstanding.
    pub fn begin_poll(&mut self) -> bool {
        if self.poll_in_flight {
            return false;
        }
        self.poll_in_flight = true;
        true
    }

    pub fn finish_poll(&mut self) {
        self.poll_in_flight = false;
    }

    /// Drop all state and timers (session close)
    pub fn reset(&mut self) {
        self.state = FullscreenState::default();
        self.overlay_timer.cancel();
        self.pointer_timer.cancel();
        self.poll_in_flight = false;
    }

    fn reset_chrome(&mut self) {
        self.overlay_timer.cancel();
        self.pointer_timer.cancel();
        self.state.overlay_visible = false;
        self.state.pointer_hidden = false;
    }
}
