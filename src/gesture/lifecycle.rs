//! Per-gesture lifecycle tracking: turns a stream of intensity readings
//! for each gesture kind into at most one triggered event per continuous
//! occurrence.
//!
//! Every kind runs an independent idle → active → triggered lifecycle with
//! a sensitivity-scaled intensity threshold, a minimum-duration gate, and
//! a fixed inactivity expiry.  Kinds never share state.

use tracing::{debug, info, warn};

use crate::sexp::bool_atom;

use super::history::{GestureStats, IntensityHistory};
use super::kind::{effective_threshold, GestureKind, GestureObservation};

/// Seconds without a qualifying observation before an activation closes.
pub const INACTIVITY_WINDOW_S: f64 = 1.0;

// ── Config ──────────────────────────────────────────────────

/// Tuning for the lifecycle tracker.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Enable secondary gesture tracking.
    pub enabled: bool,
    /// User sensitivity (0.0 conservative, 1.0 permissive).
    pub sensitivity: f64,
    /// Minimum activation length (seconds) before a trigger is emitted.
    pub min_gesture_duration_s: f64,
    /// Minimum producer confidence for a reading to count.
    pub min_confidence: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitivity: 0.5,
            min_gesture_duration_s: 0.15,
            min_confidence: 0.5,
        }
    }
}

// ── Lifecycle state ─────────────────────────────────────────

/// Coarse phase of one kind's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Idle,
    Active,
    Triggered,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Triggered => "triggered",
        }
    }
}

/// Mutable lifecycle record for one gesture kind.
///
/// `has_triggered` is only ever true while `is_active` is true.
#[derive(Debug, Clone)]
pub struct GestureLifecycle {
    pub is_active: bool,
    pub has_triggered: bool,
    /// Start of the current activation (seconds).
    pub start_time_s: f64,
    /// Time of the last qualifying observation (seconds).
    pub last_update_s: f64,
    /// Recent intensities of the current activation.
    pub recent: IntensityHistory,
    /// Number of closed activations.
    pub detection_count: u64,
}

impl GestureLifecycle {
    fn new() -> Self {
        Self {
            is_active: false,
            has_triggered: false,
            start_time_s: 0.0,
            last_update_s: 0.0,
            recent: IntensityHistory::default(),
            detection_count: 0,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        match (self.is_active, self.has_triggered) {
            (false, _) => LifecyclePhase::Idle,
            (true, false) => LifecyclePhase::Active,
            (true, true) => LifecyclePhase::Triggered,
        }
    }

    /// Seconds since the activation started (0.0 when idle).
    pub fn elapsed_s(&self, now_s: f64) -> f64 {
        if self.is_active {
            (now_s - self.start_time_s).max(0.0)
        } else {
            0.0
        }
    }

    /// Whether an active lifecycle has gone quiet for longer than the
    /// inactivity window.
    pub fn is_expired(&self, now_s: f64) -> bool {
        self.is_active && now_s - self.last_update_s > INACTIVITY_WINDOW_S
    }

    fn open(&mut self, intensity: f64, now_s: f64) {
        self.is_active = true;
        self.has_triggered = false;
        self.start_time_s = now_s;
        self.last_update_s = now_s;
        self.recent.clear();
        self.recent.push(intensity);
    }

    fn refresh(&mut self, intensity: f64, now_s: f64) {
        self.recent.push(intensity);
        self.last_update_s = now_s;
    }

    fn close(&mut self) {
        self.is_active = false;
        self.has_triggered = false;
        self.recent.clear();
        self.detection_count += 1;
    }
}

// ── Events ──────────────────────────────────────────────────

/// Emitted once per activation when the minimum duration is exceeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureTriggered {
    pub kind: GestureKind,
    /// Running average intensity of the activation.
    pub intensity: f64,
    /// Seconds between activation start and the triggering reading.
    pub duration_s: f64,
    /// Time of the triggering reading (seconds).
    pub timestamp_s: f64,
}

impl GestureTriggered {
    pub fn to_sexp(&self) -> String {
        format!(
            "(:type :event :event :gesture-triggered :kind :{} :intensity {:.2} :duration-ms {:.0} :timestamp {:.3})",
            self.kind.as_str(),
            self.intensity,
            self.duration_s * 1000.0,
            self.timestamp_s,
        )
    }
}

// ── Tracker ─────────────────────────────────────────────────

/// Owns one lifecycle record per gesture kind, created on first use.
pub struct LifecycleTracker {
    config: LifecycleConfig,
    base_thresholds: [f64; GestureKind::COUNT],
    thresholds: [f64; GestureKind::COUNT],
    lifecycles: [Option<GestureLifecycle>; GestureKind::COUNT],
    stats: [GestureStats; GestureKind::COUNT],
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}

impl LifecycleTracker {
    pub fn new(config: LifecycleConfig) -> Self {
        let mut base_thresholds = [0.0; GestureKind::COUNT];
        for kind in GestureKind::ALL {
            base_thresholds[kind.index()] = kind.base_threshold();
        }
        let mut tracker = Self {
            config,
            base_thresholds,
            thresholds: [0.0; GestureKind::COUNT],
            lifecycles: Default::default(),
            stats: Default::default(),
        };
        tracker.config.sensitivity = tracker.config.sensitivity.clamp(0.0, 1.0);
        tracker.recompute_thresholds();
        tracker
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn sensitivity(&self) -> f64 {
        self.config.sensitivity
    }

    /// Change sensitivity and recompute every effective threshold.
    pub fn set_sensitivity(&mut self, sensitivity: f64) {
        if !sensitivity.is_finite() {
            warn!("Ignoring non-finite sensitivity");
            return;
        }
        self.config.sensitivity = sensitivity.clamp(0.0, 1.0);
        self.recompute_thresholds();
        info!("Gesture sensitivity set to {:.2}", self.config.sensitivity);
    }

    /// Effective intensity threshold for a kind at the current sensitivity.
    pub fn threshold(&self, kind: GestureKind) -> f64 {
        self.thresholds[kind.index()]
    }

    fn recompute_thresholds(&mut self) {
        for kind in GestureKind::ALL {
            let i = kind.index();
            self.thresholds[i] = effective_threshold(self.base_thresholds[i], self.config.sensitivity);
        }
    }

    /// Feed one reading.  Returns a triggered event when this reading
    /// carries its activation past the minimum duration for the first time.
    pub fn observe(&mut self, obs: GestureObservation) -> Option<GestureTriggered> {
        if !self.config.enabled || !obs.is_well_formed() {
            return None;
        }

        let i = obs.kind.index();
        let now = obs.timestamp_s;

        if obs.intensity < self.thresholds[i] || obs.confidence < self.config.min_confidence {
            self.stats[i].record_rejection();
            return None;
        }

        let min_duration = self.config.min_gesture_duration_s;
        let lifecycle = self.lifecycles[i].get_or_insert_with(GestureLifecycle::new);

        if lifecycle.is_active && now < lifecycle.last_update_s {
            // Stale frame for this kind
            debug!(
                "Stale {} reading at {:.3}s (last {:.3}s)",
                obs.kind.as_str(),
                now,
                lifecycle.last_update_s
            );
            self.stats[i].record_rejection();
            return None;
        }

        if lifecycle.is_expired(now) {
            debug!(
                "{} activation expired after {:.0}ms",
                obs.kind.as_str(),
                (lifecycle.last_update_s - lifecycle.start_time_s) * 1000.0
            );
            lifecycle.close();
        }

        self.stats[i].record_observation(obs.intensity);

        if !lifecycle.is_active {
            lifecycle.open(obs.intensity, now);
            self.stats[i].record_activation();
            debug!(
                "{} activated at {:.3}s (intensity {:.2})",
                obs.kind.as_str(),
                now,
                obs.intensity
            );
        } else {
            lifecycle.refresh(obs.intensity, now);
        }

        let elapsed = lifecycle.elapsed_s(now);
        if elapsed > min_duration && !lifecycle.has_triggered {
            lifecycle.has_triggered = true;
            let intensity = lifecycle.recent.average();
            self.stats[i].record_trigger(intensity);
            info!(
                "Gesture triggered: {} after {:.0}ms (avg intensity {:.2})",
                obs.kind.as_str(),
                elapsed * 1000.0,
                intensity
            );
            return Some(GestureTriggered {
                kind: obs.kind,
                intensity,
                duration_s: elapsed,
                timestamp_s: now,
            });
        }

        None
    }

    /// Close every activation that has been quiet past the inactivity
    /// window.  Returns the kinds that closed.
    pub fn expire_idle(&mut self, now_s: f64) -> Vec<GestureKind> {
        let mut closed = Vec::new();
        for kind in GestureKind::ALL {
            if let Some(lifecycle) = self.lifecycles[kind.index()].as_mut() {
                if lifecycle.is_expired(now_s) {
                    lifecycle.close();
                    debug!("{} expired at {:.3}s", kind.as_str(), now_s);
                    closed.push(kind);
                }
            }
        }
        closed
    }

    /// Explicitly close a kind's activation.  Returns true if one was open.
    pub fn close(&mut self, kind: GestureKind) -> bool {
        match self.lifecycles[kind.index()].as_mut() {
            Some(lifecycle) if lifecycle.is_active => {
                lifecycle.close();
                true
            }
            _ => false,
        }
    }

    pub fn lifecycle(&self, kind: GestureKind) -> Option<&GestureLifecycle> {
        self.lifecycles[kind.index()].as_ref()
    }

    pub fn phase(&self, kind: GestureKind) -> LifecyclePhase {
        self.lifecycle(kind)
            .map(GestureLifecycle::phase)
            .unwrap_or(LifecyclePhase::Idle)
    }

    pub fn is_active(&self, kind: GestureKind) -> bool {
        self.phase(kind) != LifecyclePhase::Idle
    }

    pub fn stats(&self, kind: GestureKind) -> &GestureStats {
        &self.stats[kind.index()]
    }

    /// Drop every lifecycle record.  Statistics are kept.
    pub fn reset(&mut self) {
        self.lifecycles = Default::default();
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        let mut s = format!(
            "(:enabled {} :sensitivity {:.2} :kinds (",
            bool_atom(self.config.enabled),
            self.config.sensitivity,
        );
        let mut first = true;
        for kind in GestureKind::ALL {
            let Some(lifecycle) = self.lifecycle(kind) else {
                continue;
            };
            if !first {
                s.push(' ');
            }
            first = false;
            s.push_str(&format!(
                "(:kind :{} :phase :{} :detections {} :stats {})",
                kind.as_str(),
                lifecycle.phase().as_str(),
                lifecycle.detection_count,
                self.stats(kind).to_sexp(),
            ));
        }
        s.push_str("))");
        s
    }

    /// Generate s-expression for the tracker configuration.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:enabled {} :sensitivity {:.2} :min-gesture-duration-ms {:.0} :min-confidence {:.2} :inactivity-window-ms {:.0})",
            bool_atom(self.config.enabled),
            self.config.sensitivity,
            self.config.min_gesture_duration_s * 1000.0,
            self.config.min_confidence,
            INACTIVITY_WINDOW_S * 1000.0,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
