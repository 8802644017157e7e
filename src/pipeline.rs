//! Per-capture-stream processing: routes each producer frame to the
//! coordinator (paging channels) and the lifecycle tracker (secondary
//! gestures).  Owns both, so a policy swap resets them together.

use tracing::warn;

use crate::coordinator::GestureCoordinator;
use crate::gesture::{
    EyeState, GestureObservation, HeadShakeDirection, LifecycleConfig, LifecycleTracker,
};
use crate::policy::{Instrument, InstrumentMode};
use crate::scheduler::{TimeoutCheck, TimeoutScheduler};
use crate::sink::CommandSink;

/// One processed camera frame as reported by the producer.  Every field
/// but the timestamp is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerFrame {
    pub timestamp_s: f64,
    /// Eyelid booleans, when the producer classifies them itself.
    pub eyes: Option<EyeState>,
    /// Raw eye openness (left, right), converted with the policy's blink
    /// threshold when `eyes` is absent.
    pub eye_openness: Option<(f64, f64)>,
    pub head_shake: Option<HeadShakeDirection>,
    /// Head yaw in degrees (positive = right), fed to the shake classifier.
    pub head_yaw_deg: Option<f64>,
    pub micro: Vec<GestureObservation>,
}

impl ProducerFrame {
    pub fn at(timestamp_s: f64) -> Self {
        Self {
            timestamp_s,
            ..Self::default()
        }
    }
}

pub struct GesturePipeline {
    coordinator: GestureCoordinator,
    tracker: LifecycleTracker,
    frames: u64,
    /// Frames dropped for running backwards in time.
    out_of_order: u64,
    last_timestamp_s: Option<f64>,
}

impl GesturePipeline {
    pub fn new(
        policy: InstrumentMode,
        lifecycle: LifecycleConfig,
        sink: impl CommandSink + 'static,
        scheduler: impl TimeoutScheduler + 'static,
    ) -> Self {
        Self {
            coordinator: GestureCoordinator::new(policy, sink, scheduler),
            tracker: LifecycleTracker::new(lifecycle),
            frames: 0,
            out_of_order: 0,
            last_timestamp_s: None,
        }
    }

    pub fn coordinator(&self) -> &GestureCoordinator {
        &self.coordinator
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    pub fn policy(&self) -> &InstrumentMode {
        self.coordinator.policy()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    /// Process one frame.  Frames may arrive at any cadence; all timing
    /// comes from `timestamp_s`.  A frame stamped earlier than the last
    /// processed one is skipped whole, so durations never run negative.
    /// Equal timestamps are processed.
    pub fn process_frame(&mut self, frame: &ProducerFrame) {
        let now = frame.timestamp_s;
        if !now.is_finite() {
            warn!("Dropping frame with non-finite timestamp");
            return;
        }
        if let Some(last) = self.last_timestamp_s {
            if now < last {
                self.out_of_order += 1;
                warn!("Dropping frame at {:.3}s, already at {:.3}s", now, last);
                return;
            }
        }
        self.last_timestamp_s = Some(now);
        self.frames += 1;

        let threshold = self.coordinator.policy().blink().intensity_threshold;
        let eyes = frame
            .eyes
            .or_else(|| frame.eye_openness.map(|(l, r)| EyeState::from_openness(l, r, threshold)));
        if let Some(eyes) = eyes {
            self.coordinator.on_eye_state(eyes, now);
        }

        if let Some(direction) = frame.head_shake {
            self.coordinator.on_head_shake(direction, now);
        }
        if let Some(yaw) = frame.head_yaw_deg {
            self.coordinator.on_head_yaw(yaw, now);
        }

        for obs in &frame.micro {
            if let Some(event) = self.tracker.observe(*obs) {
                self.coordinator.report_gesture(event);
            }
        }
        self.tracker.expire_idle(now);
    }

    /// Hand a woken timeout check to the coordinator.
    pub fn on_confirmation_deadline(&mut self, check: TimeoutCheck) -> bool {
        self.coordinator.on_confirmation_deadline(check)
    }

    /// Swap the active policy and reset every gesture lifecycle with it.
    pub fn set_policy(&mut self, policy: InstrumentMode) {
        self.coordinator.set_policy(policy);
        self.tracker.reset();
    }

    pub fn switch_to_instrument(&mut self, instrument: Instrument) {
        self.set_policy(InstrumentMode::for_instrument(instrument));
    }

    pub fn set_sensitivity(&mut self, sensitivity: f64) {
        self.tracker.set_sensitivity(sensitivity);
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:frames {} :out-of-order {} :coordinator {} :gestures {})",
            self.frames,
            self.out_of_order,
            self.coordinator.status_sexp(),
            self.tracker.status_sexp(),
        )
    }
}
