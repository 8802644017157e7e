//! Gesture signal processing: per-kind lifecycles for secondary gestures,
//! blink recognition and head-shake classification for the paging channels.

pub mod blink;
pub mod head_shake;
pub mod history;
pub mod kind;
pub mod lifecycle;

pub use blink::{BlinkRecognizer, BlinkSettings, EyeState, RepetitionBlinkRecognizer};
pub use head_shake::{HeadShakeDetector, HeadShakeDirection, HeadShakeSettings};
pub use history::{GestureStats, IntensityHistory};
pub use kind::{GestureKind, GestureObservation};
pub use lifecycle::{GestureTriggered, LifecycleConfig, LifecyclePhase, LifecycleTracker};
