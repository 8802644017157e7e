//! Head-shake classification: maps a per-frame yaw angle to a discrete
//! shake direction with sustain and cooldown timing, and maps shake
//! directions to page directions.

use tracing::{debug, info};

use crate::sink::PageDirection;

// ── Direction ───────────────────────────────────────────────

/// Direction reported by the head-pose classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadShakeDirection {
    None,
    Left,
    Right,
    Up,
    Down,
}

impl HeadShakeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    /// Page direction for this shake.  Only lateral shakes map; everything
    /// else is discarded before reaching the coordinator's state machine.
    pub fn page_direction(&self) -> Option<PageDirection> {
        match self {
            Self::Left => Some(PageDirection::Previous),
            Self::Right => Some(PageDirection::Next),
            Self::None | Self::Up | Self::Down => None,
        }
    }
}

// ── Settings ────────────────────────────────────────────────

/// Timing and angle rules, derived from the active policy.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadShakeSettings {
    /// Absolute yaw (degrees) that counts as turned.
    pub angle_threshold_deg: f64,
    /// How long the turn must be held (seconds).
    pub sustain_s: f64,
    /// Dead time after a recognized shake (seconds).
    pub cooldown_s: f64,
}

impl Default for HeadShakeSettings {
    fn default() -> Self {
        Self {
            angle_threshold_deg: 20.0,
            sustain_s: 0.15,
            cooldown_s: 1.0,
        }
    }
}

// ── Detector ────────────────────────────────────────────────

/// Internal state for shake classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShakeState {
    /// Head near center.
    Neutral,
    /// Head turned past threshold, accumulating sustain time.
    Turning {
        direction: HeadShakeDirection,
        since_s: f64,
    },
    /// Shake recognized; blocked until the cooldown ends and the head
    /// has come back to center.
    Latched { until_s: f64, returned: bool },
}

/// Yaw-angle head-shake detector.
#[derive(Debug)]
pub struct HeadShakeDetector {
    pub state: ShakeState,
    settings: HeadShakeSettings,
}

impl Default for HeadShakeDetector {
    fn default() -> Self {
        Self::new(HeadShakeSettings::default())
    }
}

impl HeadShakeDetector {
    pub fn new(settings: HeadShakeSettings) -> Self {
        Self {
            state: ShakeState::Neutral,
            settings,
        }
    }

    pub fn settings(&self) -> &HeadShakeSettings {
        &self.settings
    }

    /// Apply new rules and drop any in-progress turn or cooldown.
    pub fn configure(&mut self, settings: HeadShakeSettings) {
        self.settings = settings;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.state = ShakeState::Neutral;
    }

    /// Whether a recognized shake is still blocking new ones.
    pub fn in_cooldown(&self) -> bool {
        matches!(self.state, ShakeState::Latched { .. })
    }

    fn classify(&self, yaw_deg: f64) -> HeadShakeDirection {
        let threshold = self.settings.angle_threshold_deg.abs();
        if yaw_deg >= threshold {
            HeadShakeDirection::Right
        } else if yaw_deg <= -threshold {
            HeadShakeDirection::Left
        } else {
            HeadShakeDirection::None
        }
    }

    /// Feed one yaw sample (degrees, positive = right).  Returns a
    /// direction once per sustained turn.
    pub fn update(&mut self, yaw_deg: f64, timestamp_s: f64) -> Option<HeadShakeDirection> {
        if !yaw_deg.is_finite() || !timestamp_s.is_finite() {
            return None;
        }
        let direction = self.classify(yaw_deg);

        if let ShakeState::Latched { until_s, returned } = self.state {
            let returned = returned || direction == HeadShakeDirection::None;
            if returned && timestamp_s >= until_s {
                self.state = ShakeState::Neutral;
            } else {
                self.state = ShakeState::Latched { until_s, returned };
                return None;
            }
        }

        match self.state {
            ShakeState::Turning {
                direction: current,
                since_s,
            } if current == direction => {
                if timestamp_s - since_s >= self.settings.sustain_s {
                    return Some(self.latch(direction, timestamp_s));
                }
                None
            }
            _ => {
                if direction == HeadShakeDirection::None {
                    self.state = ShakeState::Neutral;
                    return None;
                }
                debug!("Head turning {} at {:.3}s", direction.as_str(), timestamp_s);
                self.state = ShakeState::Turning {
                    direction,
                    since_s: timestamp_s,
                };
                if self.settings.sustain_s <= 0.0 {
                    return Some(self.latch(direction, timestamp_s));
                }
                None
            }
        }
    }

    fn latch(&mut self, direction: HeadShakeDirection, timestamp_s: f64) -> HeadShakeDirection {
        self.state = ShakeState::Latched {
            until_s: timestamp_s + self.settings.cooldown_s,
            returned: false,
        };
        info!("Head shake {} at {:.3}s", direction.as_str(), timestamp_s);
        direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> HeadShakeDetector {
        HeadShakeDetector::new(HeadShakeSettings {
            angle_threshold_deg: 20.0,
            sustain_s: 0.2,
            cooldown_s: 1.0,
        })
    }

    #[test]
    fn test_direction_mapping() {
        assert_eq!(
            HeadShakeDirection::Left.page_direction(),
            Some(PageDirection::Previous)
        );
        assert_eq!(
            HeadShakeDirection::Right.page_direction(),
            Some(PageDirection::Next)
        );
        assert_eq!(HeadShakeDirection::None.page_direction(), None);
        assert_eq!(HeadShakeDirection::Up.page_direction(), None);
        assert_eq!(HeadShakeDirection::Down.page_direction(), None);
    }

    #[test]
    fn test_direction_str_roundtrip() {
        for d in [
            HeadShakeDirection::None,
            HeadShakeDirection::Left,
            HeadShakeDirection::Right,
            HeadShakeDirection::Up,
            HeadShakeDirection::Down,
        ] {
            assert_eq!(HeadShakeDirection::from_str(d.as_str()), Some(d));
        }
        assert_eq!(HeadShakeDirection::from_str("sideways"), None);
    }

    #[test]
    fn test_sustained_turn_emits_once() {
        let mut d = detector();
        assert_eq!(d.update(25.0, 0.0), None);
        assert_eq!(d.update(26.0, 0.1), None);
        assert_eq!(d.update(27.0, 0.2), Some(HeadShakeDirection::Right));
        assert_eq!(d.update(27.0, 0.3), None);
        assert!(d.in_cooldown());
    }

    #[test]
    fn test_brief_turn_ignored() {
        let mut d = detector();
        d.update(-30.0, 0.0);
        assert_eq!(d.update(5.0, 0.1), None);
        assert_eq!(d.state, ShakeState::Neutral);
        assert_eq!(d.update(-30.0, 0.15), None);
        assert_eq!(d.update(-30.0, 0.3), None);
        assert_eq!(d.update(-30.0, 0.4), Some(HeadShakeDirection::Left));
    }

    #[test]
    fn test_direction_flip_restarts_sustain() {
        let mut d = detector();
        d.update(30.0, 0.0);
        d.update(-30.0, 0.1);
        assert_eq!(d.update(-30.0, 0.2), None);
        assert_eq!(d.update(-30.0, 0.35), Some(HeadShakeDirection::Left));
    }

    #[test]
    fn test_cooldown_requires_return_to_center() {
        let mut d = detector();
        d.update(30.0, 0.0);
        assert!(d.update(30.0, 0.2).is_some());
        // Still turned after cooldown: stays latched
        assert_eq!(d.update(30.0, 1.5), None);
        assert!(d.in_cooldown());
        // Back to center re-arms
        assert_eq!(d.update(0.0, 1.6), None);
        assert!(!d.in_cooldown());
        d.update(30.0, 1.7);
        assert_eq!(d.update(30.0, 2.0), Some(HeadShakeDirection::Right));
    }

    #[test]
    fn test_return_during_cooldown_waits_for_expiry() {
        let mut d = detector();
        d.update(30.0, 0.0);
        d.update(30.0, 0.2);
        assert_eq!(d.update(0.0, 0.5), None);
        assert!(d.in_cooldown());
        assert_eq!(d.update(30.0, 1.0), None);
        // Cooldown over; the earlier return to center counts
        assert_eq!(d.update(30.0, 1.3), None);
        assert!(!d.in_cooldown());
        assert_eq!(d.update(30.0, 1.6), Some(HeadShakeDirection::Right));
    }

    #[test]
    fn test_zero_sustain_emits_immediately() {
        let mut d = HeadShakeDetector::new(HeadShakeSettings {
            sustain_s: 0.0,
            ..HeadShakeSettings::default()
        });
        assert_eq!(d.update(-45.0, 0.0), Some(HeadShakeDirection::Left));
    }

    #[test]
    fn test_configure_resets() {
        let mut d = detector();
        d.update(30.0, 0.0);
        d.update(30.0, 0.2);
        d.configure(HeadShakeSettings {
            angle_threshold_deg: 10.0,
            ..HeadShakeSettings::default()
        });
        assert_eq!(d.state, ShakeState::Neutral);
        assert_eq!(d.settings().angle_threshold_deg, 10.0);
    }

    #[test]
    fn test_non_finite_ignored() {
        let mut d = detector();
        assert_eq!(d.update(f64::NAN, 0.0), None);
        assert_eq!(d.state, ShakeState::Neutral);
    }
}
