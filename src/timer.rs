use std::time::{Duration, Instant};

/// Default time the start key must be held before the timer arms
pub const DEFAULT_HOLD_THRESHOLD_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Idle,
    /// Key is down but not long enough yet
    Holding { since: Instant },
    /// Held past the threshold, starts on release
    Ready,
    Running { started: Instant },
    Stopped { elapsed_ms: u64 },
}

/// Hold-to-start stopwatch driven by key events.
///
/// Terminals that report key releases get the full hold/release flow. Others
/// fall back to tap mode: a press starts, the next press stops, and presses
/// arriving within the hold threshold of a start are treated as auto-repeat.
#[derive(Debug, Clone)]
pub struct HoldTimer {
    phase: TimerPhase,
    hold_threshold: Duration,
    release_events: bool,
}

impl HoldTimer {
    pub fn new(hold_threshold: Duration, release_events: bool) -> Self {
        Self {
            phase: TimerPhase::Idle,
            hold_threshold,
            release_events,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, TimerPhase::Running { .. })
    }

    pub fn is_arming(&self) -> bool {
        matches!(self.phase, TimerPhase::Holding { .. } | TimerPhase::Ready)
    }

    pub fn uses_release_events(&self) -> bool {
        self.release_events
    }

    /// Handle a key press. Returns the solve time in milliseconds when the
    /// press stopped a running timer.
    pub fn on_press(&mut self, now: Instant) -> Option<u64> {
        match self.phase {
            TimerPhase::Running { started } => {
                let elapsed = now.saturating_duration_since(started);
                if !self.release_events && elapsed < self.hold_threshold {
                    return None;
                }
                let elapsed_ms = elapsed.as_millis() as u64;
                self.phase = TimerPhase::Stopped { elapsed_ms };
                Some(elapsed_ms)
            }
            TimerPhase::Idle | TimerPhase::Stopped { .. } => {
                self.phase = if self.release_events {
                    TimerPhase::Holding { since: now }
                } else {
                    TimerPhase::Running { started: now }
                };
                None
            }
            TimerPhase::Holding { .. } | TimerPhase::Ready => None,
        }
    }

    pub fn on_release(&mut self, now: Instant) {
        match self.phase {
            TimerPhase::Holding { since } => {
                self.phase = if now.saturating_duration_since(since) >= self.hold_threshold {
                    TimerPhase::Running { started: now }
                } else {
                    TimerPhase::Idle
                };
            }
            TimerPhase::Ready => self.phase = TimerPhase::Running { started: now },
            _ => {}
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        if let TimerPhase::Holding { since } = self.phase {
            if now.saturating_duration_since(since) >= self.hold_threshold {
                self.phase = TimerPhase::Ready;
            }
        }
    }

    /// Abandon an armed hold without starting
    pub fn cancel(&mut self) {
        if self.is_arming() {
            self.phase = TimerPhase::Idle;
        }
    }

    /// Milliseconds to show: running time, or the last stopped time
    pub fn display_ms(&self, now: Instant) -> Option<u64> {
        match self.phase {
            TimerPhase::Running { started } => {
                Some(now.saturating_duration_since(started).as_millis() as u64)
            }
            TimerPhase::Stopped { elapsed_ms } => Some(elapsed_ms),
            _ => None,
        }
    }
}
