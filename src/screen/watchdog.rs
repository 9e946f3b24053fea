//! Capture validity watchdog.
//!
//! The active backend's capture surface can resize, swap identity or go
//! blank without raising any event, so validity is polled: a frame counts
//! valid when present and at least the minimum size in both dimensions.
//! Each check fires at most one notification of each kind, after which the
//! caller recomputes and re-propagates the resolved screen state
//! ("notification, then consistent state").
//!
//! Cadence is adaptive: every tick while playback is not running, an
//! escalating tick backoff while running-but-invalid, and a fixed idle
//! interval once stably valid. The pending flag keeps at most one check
//! queued at a time.

use std::time::Duration;

use log::trace;

use crate::core::events::ScreenEvent;
use crate::entities::capture::{CaptureFrame, TextureRef};

/// When the next check should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextCheck {
    Ticks(u64),
    After(Duration),
}

/// Outcome of one validity check.
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    /// At most one of each notification kind.
    pub events: Vec<ScreenEvent>,
    /// The capture resolution changed (render targets may need resizing).
    pub resized: Option<(u32, u32)>,
}

/// Maximum backoff between checks while playing with an invalid capture.
const MAX_INVALID_BACKOFF_TICKS: u64 = 32;

#[derive(Debug)]
pub struct CaptureWatchdog {
    min_size: u32,
    idle_interval: Duration,
    valid: bool,
    last_texture: Option<TextureRef>,
    last_size: Option<(u32, u32)>,
    invalid_streak: u32,
    check_cycles: u32,
    pending: bool,
}

impl CaptureWatchdog {
    pub fn new(min_size: u32, idle_interval: Duration) -> Self {
        Self {
            min_size,
            idle_interval,
            valid: false,
            last_texture: None,
            last_size: None,
            invalid_streak: 0,
            check_cycles: 0,
            pending: false,
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Consecutive checks spent invalid while playing; drives the
    /// loading-then-audio-only placeholder staging.
    pub fn check_cycles(&self) -> u32 {
        self.check_cycles
    }

    /// Claim the pending-check slot. Returns false while a check is
    /// already queued (the request is a no-op).
    pub fn try_queue(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Run one check against the current capture frame. Releases the
    /// pending slot.
    pub fn check(&mut self, frame: Option<CaptureFrame>, playing: bool) -> CheckOutcome {
        self.pending = false;
        let mut outcome = CheckOutcome::default();

        let now_valid = frame.map(|f| f.meets_min(self.min_size)).unwrap_or(false);
        let texture = frame.map(|f| f.texture);
        let size = frame.map(|f| f.resolution());

        if now_valid != self.valid {
            self.valid = now_valid;
            outcome.events.push(if now_valid {
                ScreenEvent::CaptureValid
            } else {
                ScreenEvent::CaptureInvalid
            });
        }
        if texture != self.last_texture {
            self.last_texture = texture;
            outcome.events.push(ScreenEvent::CaptureTextureChanged);
        }
        if size != self.last_size {
            self.last_size = size;
            outcome.events.push(ScreenEvent::CaptureResolutionChanged);
            if let Some((w, h)) = size {
                outcome.resized = Some((w, h));
            }
        }

        if now_valid {
            self.invalid_streak = 0;
            self.check_cycles = 0;
        } else {
            self.invalid_streak = self.invalid_streak.saturating_add(1);
            if playing {
                self.check_cycles = self.check_cycles.saturating_add(1);
            }
        }

        trace!(
            "capture check: valid={} playing={} streak={} cycles={}",
            now_valid, playing, self.invalid_streak, self.check_cycles
        );
        outcome
    }

    /// Delay until the next check, given the state just observed.
    pub fn next_check(&self, playing: bool) -> NextCheck {
        if !playing {
            return NextCheck::Ticks(1);
        }
        if self.valid {
            return NextCheck::After(self.idle_interval);
        }
        let exponent = self.invalid_streak.saturating_sub(1).min(5);
        NextCheck::Ticks((1u64 << exponent).min(MAX_INVALID_BACKOFF_TICKS))
    }

    /// Forget the observed capture (after a stop or source switch) so the
    /// next frame re-fires the change notifications.
    pub fn reset(&mut self) {
        self.valid = false;
        self.last_texture = None;
        self.last_size = None;
        self.invalid_streak = 0;
        self.check_cycles = 0;
    }
}
