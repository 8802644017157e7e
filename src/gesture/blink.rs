//! Blink recognition: turns per-frame eyelid booleans into a single
//! "blink detected" report per qualifying repetition sequence.
//!
//! The coordinator only sees the `BlinkRecognizer` trait; the default
//! `RepetitionBlinkRecognizer` counts both-eye closures of plausible length
//! and reports once `required_count` of them land inside the time window.

use std::collections::VecDeque;
use tracing::{debug, info};

use crate::sexp::bool_atom;

/// Maximum recognized blinks kept for rate statistics.
const BLINK_HISTORY: usize = 50;

/// Window the reported blink rate is measured over (seconds).
const RATE_WINDOW_S: f64 = 60.0;

// ── Eye state ───────────────────────────────────────────────

/// Per-frame eyelid state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeState {
    pub left_open: bool,
    pub right_open: bool,
}

impl EyeState {
    pub fn new(left_open: bool, right_open: bool) -> Self {
        Self {
            left_open,
            right_open,
        }
    }

    /// Derive open/closed from openness values: an eye is closed when its
    /// openness falls below `closed_threshold`.  Non-finite readings count
    /// as open.
    pub fn from_openness(left: f64, right: f64, closed_threshold: f64) -> Self {
        let open = |v: f64| !v.is_finite() || v >= closed_threshold;
        Self {
            left_open: open(left),
            right_open: open(right),
        }
    }

    pub fn both_closed(&self) -> bool {
        !self.left_open && !self.right_open
    }
}

// ── Recognizer settings ─────────────────────────────────────

/// Timing rules a recognizer applies, derived from the active policy.
#[derive(Debug, Clone, PartialEq)]
pub struct BlinkSettings {
    /// Closures shorter than this are noise (seconds).
    pub min_duration_s: f64,
    /// Closures at or beyond this are excluded (seconds).  `None` when
    /// long closures have no separate meaning.
    pub max_duration_s: Option<f64>,
    /// Blinks needed for one report.
    pub required_count: u32,
    /// Window the repetitions must fit in (seconds).
    pub time_window_s: f64,
}

impl Default for BlinkSettings {
    fn default() -> Self {
        Self {
            min_duration_s: 0.05,
            max_duration_s: None,
            required_count: 1,
            time_window_s: 1.0,
        }
    }
}

/// Recognizes intentional blink sequences from raw eyelid state.
pub trait BlinkRecognizer {
    /// Apply new timing rules.  Clears any in-progress sequence.
    fn configure(&mut self, settings: &BlinkSettings);

    /// Feed one frame.  Returns true exactly once per qualifying sequence.
    fn update(&mut self, eyes: EyeState, timestamp_s: f64) -> bool;

    /// Forget closures and partial sequences.
    fn reset(&mut self);

    /// Generate s-expression for status reporting.
    fn status_sexp(&self) -> String;
}

// ── Default recognizer ──────────────────────────────────────

/// A single recognized blink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizedBlink {
    /// Closure duration (seconds).
    pub duration_s: f64,
    /// Reopening time (seconds).
    pub timestamp_s: f64,
}

/// Counts both-eye closures and reports on the N-th within the window.
#[derive(Debug)]
pub struct RepetitionBlinkRecognizer {
    settings: BlinkSettings,
    /// Whether both eyes are currently closed.
    closed: bool,
    /// When the current closure began.
    closed_since: Option<f64>,
    /// Reopening times of blinks in the current sequence.
    sequence: VecDeque<f64>,
    /// Ring buffer of recognized blinks.
    history: VecDeque<RecognizedBlink>,
}

impl Default for RepetitionBlinkRecognizer {
    fn default() -> Self {
        Self::new(BlinkSettings::default())
    }
}

impl RepetitionBlinkRecognizer {
    pub fn new(settings: BlinkSettings) -> Self {
        Self {
            settings,
            closed: false,
            closed_since: None,
            sequence: VecDeque::new(),
            history: VecDeque::with_capacity(BLINK_HISTORY),
        }
    }

    pub fn settings(&self) -> &BlinkSettings {
        &self.settings
    }

    /// Whether a closure is in progress.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Blinks counted toward the current sequence.
    pub fn pending_count(&self) -> usize {
        self.sequence.len()
    }

    /// Blinks per minute over the last `window_s` seconds of history,
    /// measured back from the most recent blink.
    pub fn blink_rate(&self, window_s: f64) -> f64 {
        let Some(last) = self.history.back() else {
            return 0.0;
        };
        if window_s <= 0.0 {
            return 0.0;
        }
        let cutoff = last.timestamp_s - window_s;
        let count = self
            .history
            .iter()
            .filter(|b| b.timestamp_s >= cutoff)
            .count();
        (count as f64 / window_s) * 60.0
    }

    fn push_history(&mut self, blink: RecognizedBlink) {
        if self.history.len() >= BLINK_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(blink);
    }

    /// Count a finished closure.  Returns true when the sequence completes.
    fn count_blink(&mut self, duration_s: f64, timestamp_s: f64) -> bool {
        if duration_s < self.settings.min_duration_s {
            debug!("Blink noise rejected: {:.0}ms", duration_s * 1000.0);
            return false;
        }
        if let Some(max) = self.settings.max_duration_s {
            if duration_s >= max {
                debug!(
                    "Long closure excluded from blink count: {:.0}ms",
                    duration_s * 1000.0
                );
                return false;
            }
        }

        self.push_history(RecognizedBlink {
            duration_s,
            timestamp_s,
        });

        let cutoff = timestamp_s - self.settings.time_window_s;
        while self.sequence.front().is_some_and(|t| *t < cutoff) {
            self.sequence.pop_front();
        }
        self.sequence.push_back(timestamp_s);

        let required = self.settings.required_count.max(1) as usize;
        debug!(
            "Blink {}/{}: {:.0}ms",
            self.sequence.len(),
            required,
            duration_s * 1000.0
        );
        if self.sequence.len() >= required {
            self.sequence.clear();
            info!("Blink sequence recognized at {:.3}s", timestamp_s);
            return true;
        }
        false
    }
}

impl BlinkRecognizer for RepetitionBlinkRecognizer {
    fn configure(&mut self, settings: &BlinkSettings) {
        self.settings = settings.clone();
        self.reset();
    }

    fn update(&mut self, eyes: EyeState, timestamp_s: f64) -> bool {
        if eyes.both_closed() && !self.closed {
            self.closed = true;
            self.closed_since = Some(timestamp_s);
            debug!("Eyes closed at {:.3}s", timestamp_s);
            false
        } else if !eyes.both_closed() && self.closed {
            self.closed = false;
            match self.closed_since.take() {
                Some(since) => self.count_blink((timestamp_s - since).max(0.0), timestamp_s),
                None => false,
            }
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.closed = false;
        self.closed_since = None;
        self.sequence.clear();
    }

    fn status_sexp(&self) -> String {
        format!(
            "(:closed {} :pending {} :required {} :blinks-per-minute {:.1})",
            bool_atom(self.is_closed()),
            self.pending_count(),
            self.settings.required_count,
            self.blink_rate(RATE_WINDOW_S),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: EyeState = EyeState {
        left_open: true,
        right_open: true,
    };
    const CLOSED: EyeState = EyeState {
        left_open: false,
        right_open: false,
    };

    fn blink(r: &mut RepetitionBlinkRecognizer, start: f64, duration: f64) -> bool {
        let closed = r.update(CLOSED, start);
        assert!(!closed, "closing never reports");
        r.update(OPEN, start + duration)
    }

    #[test]
    fn test_single_blink_reports() {
        let mut r = RepetitionBlinkRecognizer::default();
        assert!(!r.update(OPEN, 0.0));
        assert!(blink(&mut r, 0.1, 0.15));
        assert!(!r.is_closed());
    }

    #[test]
    fn test_noise_rejected() {
        let mut r = RepetitionBlinkRecognizer::default();
        assert!(!blink(&mut r, 0.0, 0.01));
        assert_eq!(r.pending_count(), 0);
    }

    #[test]
    fn test_one_eye_is_not_a_blink() {
        let mut r = RepetitionBlinkRecognizer::default();
        assert!(!r.update(EyeState::new(false, true), 0.0));
        assert!(!r.update(OPEN, 0.3));
        assert!(!r.is_closed());
    }

    #[test]
    fn test_repetition_required() {
        let mut r = RepetitionBlinkRecognizer::new(BlinkSettings {
            required_count: 2,
            ..BlinkSettings::default()
        });
        assert!(!blink(&mut r, 0.0, 0.1));
        assert_eq!(r.pending_count(), 1);
        assert!(blink(&mut r, 0.3, 0.1));
        assert_eq!(r.pending_count(), 0);
        // A third blink starts a new sequence
        assert!(!blink(&mut r, 0.6, 0.1));
    }

    #[test]
    fn test_repetitions_outside_window() {
        let mut r = RepetitionBlinkRecognizer::new(BlinkSettings {
            required_count: 2,
            time_window_s: 1.0,
            ..BlinkSettings::default()
        });
        assert!(!blink(&mut r, 0.0, 0.1));
        assert!(!blink(&mut r, 2.0, 0.1));
        assert_eq!(r.pending_count(), 1);
        assert!(blink(&mut r, 2.5, 0.1));
    }

    #[test]
    fn test_long_closure_excluded() {
        let mut r = RepetitionBlinkRecognizer::new(BlinkSettings {
            max_duration_s: Some(0.5),
            ..BlinkSettings::default()
        });
        assert!(!blink(&mut r, 0.0, 0.7));
        assert!(blink(&mut r, 1.0, 0.2));
    }

    #[test]
    fn test_configure_resets_sequence() {
        let mut r = RepetitionBlinkRecognizer::new(BlinkSettings {
            required_count: 2,
            ..BlinkSettings::default()
        });
        blink(&mut r, 0.0, 0.1);
        r.update(CLOSED, 0.5);
        r.configure(&BlinkSettings {
            required_count: 3,
            ..BlinkSettings::default()
        });
        assert_eq!(r.pending_count(), 0);
        assert!(!r.is_closed());
        assert_eq!(r.settings().required_count, 3);
        // Reopening after reconfigure is not a blink
        assert!(!r.update(OPEN, 0.6));
    }

    #[test]
    fn test_blink_rate() {
        let mut r = RepetitionBlinkRecognizer::default();
        assert_eq!(r.blink_rate(60.0), 0.0);
        for i in 0..10 {
            blink(&mut r, i as f64 * 6.0, 0.1);
        }
        let rate = r.blink_rate(60.0);
        assert!((rate - 10.0).abs() < 1e-9, "got {rate}");
    }

    #[test]
    fn test_status_sexp() {
        let mut r = RepetitionBlinkRecognizer::new(BlinkSettings {
            required_count: 2,
            ..BlinkSettings::default()
        });
        assert_eq!(
            r.status_sexp(),
            "(:closed nil :pending 0 :required 2 :blinks-per-minute 0.0)"
        );
        blink(&mut r, 0.0, 0.1);
        r.update(CLOSED, 0.5);
        assert_eq!(
            r.status_sexp(),
            "(:closed t :pending 1 :required 2 :blinks-per-minute 1.0)"
        );
    }

    #[test]
    fn test_eye_state_from_openness() {
        let eyes = EyeState::from_openness(0.1, 0.9, 0.25);
        assert!(!eyes.left_open);
        assert!(eyes.right_open);
        assert!(EyeState::from_openness(0.1, 0.2, 0.25).both_closed());
        assert!(EyeState::from_openness(f64::NAN, 0.1, 0.25).left_open);
    }
}
