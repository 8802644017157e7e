//! Gesture kinds and raw observations from the signal producer.

// ── GestureKind ─────────────────────────────────────────────

/// Monitored gesture categories.  Each kind owns an independent lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GestureKind {
    /// Both eyelids closing and reopening.
    Blink,
    /// Lateral head rotation past the yaw threshold.
    HeadShake,
    /// Brow landmarks lifting relative to the eye line.
    EyebrowRaise,
    /// Mouth corners widening.
    Smile,
    /// Iris moving off-center without head motion.
    GazeShift,
    /// Nostril width increasing.
    NostrilFlare,
    /// Lips pushed forward and narrowed.
    LipPurse,
}

impl GestureKind {
    /// Number of gesture kinds (size of per-kind arenas).
    pub const COUNT: usize = 7;

    /// Every kind, in index order.
    pub const ALL: [GestureKind; Self::COUNT] = [
        Self::Blink,
        Self::HeadShake,
        Self::EyebrowRaise,
        Self::Smile,
        Self::GazeShift,
        Self::NostrilFlare,
        Self::LipPurse,
    ];

    /// Dense index into per-kind arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Blink => 0,
            Self::HeadShake => 1,
            Self::EyebrowRaise => 2,
            Self::Smile => 3,
            Self::GazeShift => 4,
            Self::NostrilFlare => 5,
            Self::LipPurse => 6,
        }
    }

    /// String representation for s-expressions and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blink => "blink",
            Self::HeadShake => "head-shake",
            Self::EyebrowRaise => "eyebrow-raise",
            Self::Smile => "smile",
            Self::GazeShift => "gaze-shift",
            Self::NostrilFlare => "nostril-flare",
            Self::LipPurse => "lip-purse",
        }
    }

    /// Parse a kind from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Whether the coordinator consumes this kind directly (eyelid and
    /// head-shake channels) rather than through the lifecycle tracker.
    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Blink | Self::HeadShake)
    }

    /// Intensity a reading must reach at full sensitivity.
    pub fn base_threshold(&self) -> f64 {
        match self {
            Self::Blink => 0.5,
            Self::HeadShake => 0.5,
            Self::EyebrowRaise => 0.3,
            Self::Smile => 0.4,
            Self::GazeShift => 0.35,
            Self::NostrilFlare => 0.5,
            Self::LipPurse => 0.4,
        }
    }
}

/// Scale a base threshold by user sensitivity in [0, 1].
/// Sensitivity 1.0 keeps the base, 0.0 doubles it.
pub fn effective_threshold(base: f64, sensitivity: f64) -> f64 {
    base * (2.0 - sensitivity.clamp(0.0, 1.0))
}

// ── GestureObservation ──────────────────────────────────────

/// One reading of a gesture kind from the producer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureObservation {
    pub kind: GestureKind,
    /// Producer confidence (0.0 to 1.0).
    pub confidence: f64,
    /// Derived gesture intensity (0.0 to 1.0).
    pub intensity: f64,
    /// Observation time (seconds).
    pub timestamp_s: f64,
}

impl GestureObservation {
    pub fn new(kind: GestureKind, confidence: f64, intensity: f64, timestamp_s: f64) -> Self {
        Self {
            kind,
            confidence,
            intensity,
            timestamp_s,
        }
    }

    /// Whether all numeric fields are finite.  Non-finite readings are
    /// discarded before they reach any lifecycle.
    pub fn is_well_formed(&self) -> bool {
        self.confidence.is_finite() && self.intensity.is_finite() && self.timestamp_s.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (i, kind) in GestureKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_kind_str_roundtrip() {
        for kind in GestureKind::ALL {
            assert_eq!(GestureKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(GestureKind::from_str("wink"), None);
    }

    #[test]
    fn test_primary_kinds() {
        assert!(GestureKind::Blink.is_primary());
        assert!(GestureKind::HeadShake.is_primary());
        assert!(!GestureKind::Smile.is_primary());
    }

    #[test]
    fn test_effective_threshold_scaling() {
        assert!((effective_threshold(0.4, 1.0) - 0.4).abs() < 1e-9);
        assert!((effective_threshold(0.4, 0.0) - 0.8).abs() < 1e-9);
        assert!((effective_threshold(0.4, 0.5) - 0.6).abs() < 1e-9);
        // Out-of-range sensitivity is clamped
        assert!((effective_threshold(0.4, 3.0) - 0.4).abs() < 1e-9);
        assert!((effective_threshold(0.4, -1.0) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_observation_well_formed() {
        let ok = GestureObservation::new(GestureKind::Smile, 0.9, 0.5, 1.0);
        assert!(ok.is_well_formed());
        let bad = GestureObservation::new(GestureKind::Smile, 0.9, f64::NAN, 1.0);
        assert!(!bad.is_well_formed());
    }
}
