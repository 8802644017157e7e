//! Instrument policies: which channels page, and with what timing.
//!
//! An `InstrumentMode` is built once (from an instrument default, a
//! builder, or a policy file), validated, and then only ever replaced
//! whole.  The coordinator derives recognizer and classifier settings
//! from it on every swap.

use thiserror::Error;
use tracing::warn;

use crate::gesture::{BlinkSettings, HeadShakeSettings};
use crate::sexp::{self, bool_atom};

// ── Instrument ──────────────────────────────────────────────

/// Instrument the performer is playing.  Picks the default policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Piano,
    Organ,
    Violin,
    Viola,
    Cello,
    Guitar,
    Woodwind,
    Brass,
    Voice,
    Percussion,
}

impl Instrument {
    pub const ALL: [Instrument; 10] = [
        Instrument::Piano,
        Instrument::Organ,
        Instrument::Violin,
        Instrument::Viola,
        Instrument::Cello,
        Instrument::Guitar,
        Instrument::Woodwind,
        Instrument::Brass,
        Instrument::Voice,
        Instrument::Percussion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Piano => "piano",
            Self::Organ => "organ",
            Self::Violin => "violin",
            Self::Viola => "viola",
            Self::Cello => "cello",
            Self::Guitar => "guitar",
            Self::Woodwind => "woodwind",
            Self::Brass => "brass",
            Self::Voice => "voice",
            Self::Percussion => "percussion",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == s)
    }
}

// ── Errors ──────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("{field} must be finite")]
    NonFinite { field: &'static str },

    #[error("{field} = {value} outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("blink repetition count must be at least 1")]
    ZeroRepetitions,

    #[error("policy enables neither blink nor head-shake")]
    NoChannelEnabled,

    #[error("confirmation requires both blink and head-shake to be enabled")]
    ConfirmationWithoutBothChannels,

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("malformed policy: {0}")]
    Malformed(String),
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), PolicyError> {
    if !value.is_finite() {
        return Err(PolicyError::NonFinite { field });
    }
    if value < min || value > max {
        return Err(PolicyError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

// ── Parameters ──────────────────────────────────────────────

/// Blink channel parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BlinkParams {
    /// Eye openness below which an eye counts as closed.
    pub intensity_threshold: f64,
    /// Window the repetitions must fit in (seconds).
    pub time_window_s: f64,
    /// Shortest closure that counts as a blink (seconds).
    pub min_duration_s: f64,
    pub required_count: u32,
    /// Closure length that turns back a page (seconds).
    pub long_hold_s: f64,
    pub enable_long_blink: bool,
}

impl Default for BlinkParams {
    fn default() -> Self {
        Self {
            intensity_threshold: 0.25,
            time_window_s: 1.0,
            min_duration_s: 0.05,
            required_count: 1,
            long_hold_s: 0.5,
            enable_long_blink: false,
        }
    }
}

/// Head-shake channel parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadShakeParams {
    pub angle_threshold_deg: f64,
    pub sustain_s: f64,
    pub cooldown_s: f64,
}

impl Default for HeadShakeParams {
    fn default() -> Self {
        Self {
            angle_threshold_deg: 20.0,
            sustain_s: 0.15,
            cooldown_s: 1.0,
        }
    }
}

/// Derived shape of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyClass {
    /// Head-shake proposes, blink confirms.
    Hybrid,
    BlinkOnly,
    ShakeOnly,
    /// Both channels page directly.
    Dual,
}

impl PolicyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::BlinkOnly => "blink-only",
            Self::ShakeOnly => "shake-only",
            Self::Dual => "dual",
        }
    }
}

// ── InstrumentMode ──────────────────────────────────────────

/// The active policy.  Fields are read-only; build a new one to change it.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentMode {
    instrument: Instrument,
    enable_blink: bool,
    enable_head_shake: bool,
    blink: BlinkParams,
    head_shake: HeadShakeParams,
    requires_confirmation: bool,
    confirmation_timeout_s: f64,
}

impl Default for InstrumentMode {
    fn default() -> Self {
        Self::for_instrument(Instrument::Piano)
    }
}

impl InstrumentMode {
    /// Default policy for an instrument.
    pub fn for_instrument(instrument: Instrument) -> Self {
        let mut mode = Self {
            instrument,
            enable_blink: true,
            enable_head_shake: true,
            blink: BlinkParams::default(),
            head_shake: HeadShakeParams::default(),
            requires_confirmation: false,
            confirmation_timeout_s: 2.0,
        };
        match instrument {
            Instrument::Piano | Instrument::Organ => {
                mode.requires_confirmation = true;
            }
            Instrument::Violin | Instrument::Viola | Instrument::Cello | Instrument::Guitar => {
                mode.enable_head_shake = false;
                mode.blink.required_count = 2;
                mode.blink.enable_long_blink = true;
            }
            Instrument::Woodwind | Instrument::Brass => {
                // Embouchure makes deliberate blinks unreliable
                mode.enable_blink = false;
                mode.head_shake.angle_threshold_deg = 15.0;
                mode.head_shake.sustain_s = 0.2;
                mode.head_shake.cooldown_s = 1.2;
            }
            Instrument::Voice => {
                mode.blink.required_count = 2;
                mode.head_shake.angle_threshold_deg = 25.0;
            }
            Instrument::Percussion => {
                mode.enable_head_shake = false;
                mode.blink.required_count = 3;
                mode.blink.time_window_s = 1.5;
            }
        }
        mode
    }

    /// Start a builder from this instrument's default.
    pub fn builder(instrument: Instrument) -> InstrumentModeBuilder {
        InstrumentModeBuilder {
            mode: Self::for_instrument(instrument),
        }
    }

    /// Start a builder from this policy.
    pub fn to_builder(&self) -> InstrumentModeBuilder {
        InstrumentModeBuilder { mode: self.clone() }
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    pub fn enable_blink(&self) -> bool {
        self.enable_blink
    }

    pub fn enable_head_shake(&self) -> bool {
        self.enable_head_shake
    }

    pub fn blink(&self) -> &BlinkParams {
        &self.blink
    }

    pub fn head_shake(&self) -> &HeadShakeParams {
        &self.head_shake
    }

    pub fn requires_confirmation(&self) -> bool {
        self.requires_confirmation
    }

    pub fn confirmation_timeout_s(&self) -> f64 {
        self.confirmation_timeout_s
    }

    /// Closure length that means "previous page", when enabled.
    pub fn long_blink_s(&self) -> Option<f64> {
        (self.enable_blink && self.blink.enable_long_blink).then_some(self.blink.long_hold_s)
    }

    pub fn classification(&self) -> PolicyClass {
        match (self.enable_blink, self.enable_head_shake) {
            (true, true) if self.requires_confirmation => PolicyClass::Hybrid,
            (true, true) => PolicyClass::Dual,
            (true, false) => PolicyClass::BlinkOnly,
            _ => PolicyClass::ShakeOnly,
        }
    }

    pub fn is_hybrid(&self) -> bool {
        self.classification() == PolicyClass::Hybrid
    }

    pub fn is_blink_only(&self) -> bool {
        self.classification() == PolicyClass::BlinkOnly
    }

    pub fn is_shake_only(&self) -> bool {
        self.classification() == PolicyClass::ShakeOnly
    }

    /// Recognizer rules.  Closures at or past the long-hold length are
    /// excluded from counting only when long blinks have a meaning.
    pub fn blink_settings(&self) -> BlinkSettings {
        BlinkSettings {
            min_duration_s: self.blink.min_duration_s,
            max_duration_s: self.long_blink_s(),
            required_count: self.blink.required_count,
            time_window_s: self.blink.time_window_s,
        }
    }

    pub fn head_shake_settings(&self) -> HeadShakeSettings {
        HeadShakeSettings {
            angle_threshold_deg: self.head_shake.angle_threshold_deg,
            sustain_s: self.head_shake.sustain_s,
            cooldown_s: self.head_shake.cooldown_s,
        }
    }

    /// Check every invariant a policy must hold before it can go active.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.enable_blink && !self.enable_head_shake {
            return Err(PolicyError::NoChannelEnabled);
        }
        if self.requires_confirmation && !(self.enable_blink && self.enable_head_shake) {
            return Err(PolicyError::ConfirmationWithoutBothChannels);
        }

        let b = &self.blink;
        check_range("blink-threshold", b.intensity_threshold, 0.0, 1.0)?;
        check_range("blink-window", b.time_window_s, 0.1, 10.0)?;
        check_range("blink-min-duration", b.min_duration_s, 0.0, 2.0)?;
        check_range("long-blink-duration", b.long_hold_s, 0.1, 5.0)?;
        if b.required_count == 0 {
            return Err(PolicyError::ZeroRepetitions);
        }
        check_range("blink-count", b.required_count as f64, 1.0, 5.0)?;
        if b.enable_long_blink && b.min_duration_s >= b.long_hold_s {
            return Err(PolicyError::OutOfRange {
                field: "blink-min-duration",
                value: b.min_duration_s,
                min: 0.0,
                max: b.long_hold_s,
            });
        }

        let h = &self.head_shake;
        check_range("shake-angle", h.angle_threshold_deg, 1.0, 90.0)?;
        check_range("shake-sustain", h.sustain_s, 0.0, 2.0)?;
        check_range("shake-cooldown", h.cooldown_s, 0.0, 10.0)?;

        check_range("confirmation-timeout", self.confirmation_timeout_s, 0.1, 30.0)?;
        Ok(())
    }

    // ── S-expression persistence ────────────────────────────

    /// Serialize as a policy-file plist.  Durations are written in
    /// seconds at full precision, so `from_sexp` reads back an equal policy.
    pub fn to_sexp(&self) -> String {
        format!(
            "(:instrument :{} :enable-blink {} :enable-head-shake {} \
             :blink-threshold {} :blink-window-s {} :blink-min-s {} \
             :blink-count {} :long-blink {} :long-blink-s {} \
             :shake-angle-deg {} :shake-sustain-s {} :shake-cooldown-s {} \
             :require-confirmation {} :confirmation-timeout-s {})",
            self.instrument.as_str(),
            bool_atom(self.enable_blink),
            bool_atom(self.enable_head_shake),
            self.blink.intensity_threshold,
            self.blink.time_window_s,
            self.blink.min_duration_s,
            self.blink.required_count,
            bool_atom(self.blink.enable_long_blink),
            self.blink.long_hold_s,
            self.head_shake.angle_threshold_deg,
            self.head_shake.sustain_s,
            self.head_shake.cooldown_s,
            bool_atom(self.requires_confirmation),
            self.confirmation_timeout_s,
        )
    }

    /// Parse a policy-file plist.  Starts from the default of `:instrument`
    /// (or `fallback` when absent) and overrides whatever keys are present.
    /// A duration `:<name>-s` is in seconds; hand-written files may use
    /// `:<name>-ms` instead.
    pub fn from_sexp(raw: &str, fallback: Instrument) -> Result<Self, PolicyError> {
        let value = sexp::parse(raw).map_err(|e| PolicyError::Malformed(e.to_string()))?;

        let instrument = match sexp::get_keyword(&value, "instrument") {
            Some(name) => Instrument::from_str(&name)
                .ok_or_else(|| PolicyError::UnknownInstrument(name.clone()))?,
            None => fallback,
        };

        let number = |key: &str| -> Result<Option<f64>, PolicyError> {
            match sexp::get_value(&value, key) {
                None => Ok(None),
                Some(v) => v
                    .as_f64()
                    .map(Some)
                    .ok_or_else(|| PolicyError::Malformed(format!(":{key} {v}"))),
            }
        };
        let duration = |name: &str| -> Result<Option<f64>, PolicyError> {
            match number(&format!("{name}-s"))? {
                Some(seconds) => Ok(Some(seconds)),
                None => Ok(number(&format!("{name}-ms"))?.map(|ms| ms / 1000.0)),
            }
        };

        let mut builder = Self::builder(instrument);
        if let Some(v) = sexp::get_bool(&value, "enable-blink") {
            builder = builder.enable_blink(v);
        }
        if let Some(v) = sexp::get_bool(&value, "enable-head-shake") {
            builder = builder.enable_head_shake(v);
        }
        if let Some(v) = number("blink-threshold")? {
            builder = builder.blink_threshold(v);
        }
        if let Some(v) = duration("blink-window")? {
            builder = builder.blink_window(v);
        }
        if let Some(v) = duration("blink-min")? {
            builder = builder.blink_min_duration(v);
        }
        if let Some(v) = sexp::get_value(&value, "blink-count") {
            let count = v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| PolicyError::Malformed(format!(":blink-count {v}")))?;
            builder = builder.blink_count(count);
        }
        if let Some(v) = sexp::get_bool(&value, "long-blink") {
            builder = builder.long_blink(v);
        }
        if let Some(v) = duration("long-blink")? {
            builder = builder.long_blink_duration(v);
        }
        if let Some(v) = number("shake-angle-deg")? {
            builder = builder.shake_angle(v);
        }
        if let Some(v) = duration("shake-sustain")? {
            builder = builder.shake_sustain(v);
        }
        if let Some(v) = duration("shake-cooldown")? {
            builder = builder.shake_cooldown(v);
        }
        if let Some(v) = sexp::get_bool(&value, "require-confirmation") {
            builder = builder.requires_confirmation(v);
        }
        if let Some(v) = duration("confirmation-timeout")? {
            builder = builder.confirmation_timeout(v);
        }

        builder.build().inspect_err(|e| warn!("Rejected policy: {}", e))
    }

    /// Compact summary for status output.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:instrument :{} :class :{} :long-blink-ms {} :confirmation-timeout-ms {:.0})",
            self.instrument.as_str(),
            self.classification().as_str(),
            self.long_blink_s()
                .map(|s| format!("{:.0}", s * 1000.0))
                .unwrap_or_else(|| "nil".to_string()),
            self.confirmation_timeout_s * 1000.0,
        )
    }
}

// ── Builder ─────────────────────────────────────────────────

/// Field-by-field construction; `build` validates the whole policy.
#[derive(Debug, Clone)]
pub struct InstrumentModeBuilder {
    mode: InstrumentMode,
}

impl InstrumentModeBuilder {
    pub fn enable_blink(mut self, on: bool) -> Self {
        self.mode.enable_blink = on;
        self
    }

    pub fn enable_head_shake(mut self, on: bool) -> Self {
        self.mode.enable_head_shake = on;
        self
    }

    pub fn blink_threshold(mut self, threshold: f64) -> Self {
        self.mode.blink.intensity_threshold = threshold;
        self
    }

    pub fn blink_window(mut self, seconds: f64) -> Self {
        self.mode.blink.time_window_s = seconds;
        self
    }

    pub fn blink_min_duration(mut self, seconds: f64) -> Self {
        self.mode.blink.min_duration_s = seconds;
        self
    }

    pub fn blink_count(mut self, count: u32) -> Self {
        self.mode.blink.required_count = count;
        self
    }

    pub fn long_blink(mut self, on: bool) -> Self {
        self.mode.blink.enable_long_blink = on;
        self
    }

    pub fn long_blink_duration(mut self, seconds: f64) -> Self {
        self.mode.blink.long_hold_s = seconds;
        self
    }

    pub fn shake_angle(mut self, degrees: f64) -> Self {
        self.mode.head_shake.angle_threshold_deg = degrees;
        self
    }

    pub fn shake_sustain(mut self, seconds: f64) -> Self {
        self.mode.head_shake.sustain_s = seconds;
        self
    }

    pub fn shake_cooldown(mut self, seconds: f64) -> Self {
        self.mode.head_shake.cooldown_s = seconds;
        self
    }

    pub fn requires_confirmation(mut self, on: bool) -> Self {
        self.mode.requires_confirmation = on;
        self
    }

    pub fn confirmation_timeout(mut self, seconds: f64) -> Self {
        self.mode.confirmation_timeout_s = seconds;
        self
    }

    pub fn build(self) -> Result<InstrumentMode, PolicyError> {
        self.mode.validate()?;
        Ok(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_instrument_str_roundtrip() {
        for i in Instrument::ALL {
            assert_eq!(Instrument::from_str(i.as_str()), Some(i));
        }
        assert_eq!(Instrument::from_str("kazoo"), None);
    }

    #[test]
    fn test_every_default_is_valid() {
        for i in Instrument::ALL {
            let mode = InstrumentMode::for_instrument(i);
            assert_eq!(mode.validate(), Ok(()), "{}", i.as_str());
            assert_eq!(mode.instrument(), i);
        }
    }

    #[test]
    fn test_default_classifications() {
        let class = |i| InstrumentMode::for_instrument(i).classification();
        assert_eq!(class(Instrument::Piano), PolicyClass::Hybrid);
        assert_eq!(class(Instrument::Organ), PolicyClass::Hybrid);
        assert_eq!(class(Instrument::Violin), PolicyClass::BlinkOnly);
        assert_eq!(class(Instrument::Guitar), PolicyClass::BlinkOnly);
        assert_eq!(class(Instrument::Brass), PolicyClass::ShakeOnly);
        assert_eq!(class(Instrument::Voice), PolicyClass::Dual);
        assert_eq!(class(Instrument::Percussion), PolicyClass::BlinkOnly);
    }

    #[test]
    fn test_string_default_long_blink() {
        let violin = InstrumentMode::for_instrument(Instrument::Cello);
        assert!(violin.is_blink_only());
        assert_eq!(violin.long_blink_s(), Some(0.5));
        assert_eq!(violin.blink().required_count, 2);
        let settings = violin.blink_settings();
        assert_eq!(settings.max_duration_s, Some(0.5));
        assert_eq!(settings.time_window_s, 1.0);

        let piano = InstrumentMode::for_instrument(Instrument::Piano);
        assert_eq!(piano.long_blink_s(), None);
        assert_eq!(piano.blink_settings().max_duration_s, None);
        assert_eq!(piano.confirmation_timeout_s(), 2.0);
    }

    #[test]
    fn test_percussion_needs_three_blinks() {
        let mode = InstrumentMode::for_instrument(Instrument::Percussion);
        assert_eq!(mode.blink().required_count, 3);
        assert_eq!(mode.long_blink_s(), None);
    }

    #[test]
    fn test_builder_validation() {
        assert_eq!(
            InstrumentMode::builder(Instrument::Piano)
                .enable_blink(false)
                .build(),
            Err(PolicyError::ConfirmationWithoutBothChannels)
        );
        assert_eq!(
            InstrumentMode::builder(Instrument::Voice)
                .enable_blink(false)
                .enable_head_shake(false)
                .build(),
            Err(PolicyError::NoChannelEnabled)
        );
        assert_eq!(
            InstrumentMode::builder(Instrument::Violin).blink_count(0).build(),
            Err(PolicyError::ZeroRepetitions)
        );
        assert_eq!(
            InstrumentMode::builder(Instrument::Violin)
                .blink_threshold(f64::NAN)
                .build(),
            Err(PolicyError::NonFinite {
                field: "blink-threshold"
            })
        );
        assert!(matches!(
            InstrumentMode::builder(Instrument::Piano)
                .confirmation_timeout(0.0)
                .build(),
            Err(PolicyError::OutOfRange {
                field: "confirmation-timeout",
                ..
            })
        ));
        assert!(matches!(
            InstrumentMode::builder(Instrument::Violin)
                .blink_min_duration(0.6)
                .build(),
            Err(PolicyError::OutOfRange {
                field: "blink-min-duration",
                ..
            })
        ));
    }

    #[test]
    fn test_builder_overrides() {
        let mode = InstrumentMode::builder(Instrument::Piano)
            .confirmation_timeout(3.5)
            .shake_angle(30.0)
            .build()
            .unwrap();
        assert_eq!(mode.confirmation_timeout_s(), 3.5);
        assert_eq!(mode.head_shake_settings().angle_threshold_deg, 30.0);
        assert!(mode.is_hybrid());

        let relaxed = mode.to_builder().requires_confirmation(false).build().unwrap();
        assert_eq!(relaxed.classification(), PolicyClass::Dual);
        assert_eq!(relaxed.confirmation_timeout_s(), 3.5);
    }

    #[test]
    fn test_sexp_roundtrip() {
        for i in Instrument::ALL {
            let mode = InstrumentMode::for_instrument(i);
            let parsed = InstrumentMode::from_sexp(&mode.to_sexp(), Instrument::Piano).unwrap();
            assert_eq!(parsed, mode, "{}", i.as_str());
        }
    }

    #[test]
    fn test_sexp_keeps_full_precision() {
        let mode = InstrumentMode::builder(Instrument::Piano)
            .shake_angle(22.25)
            .blink_threshold(0.2345)
            .confirmation_timeout(2.0004)
            .blink_window(1.0 / 3.0)
            .build()
            .unwrap();
        let back = InstrumentMode::from_sexp(&mode.to_sexp(), Instrument::Violin).unwrap();
        assert_eq!(back, mode);
        assert_eq!(back.head_shake().angle_threshold_deg, 22.25);
        assert_eq!(back.confirmation_timeout_s(), 2.0004);
    }

    #[test]
    fn test_sexp_duration_units() {
        let seconds =
            InstrumentMode::from_sexp("(:confirmation-timeout-s 2.5)", Instrument::Piano).unwrap();
        let millis =
            InstrumentMode::from_sexp("(:confirmation-timeout-ms 2500)", Instrument::Piano)
                .unwrap();
        assert_eq!(seconds.confirmation_timeout_s(), 2.5);
        assert_eq!(seconds, millis);
    }

    #[test]
    fn test_sexp_partial_override() {
        let mode = InstrumentMode::from_sexp(
            "(:instrument :violin :blink-count 3 :long-blink-ms 800)",
            Instrument::Piano,
        )
        .unwrap();
        assert_eq!(mode.instrument(), Instrument::Violin);
        assert_eq!(mode.blink().required_count, 3);
        assert_eq!(mode.long_blink_s(), Some(0.8));
        assert!(!mode.enable_head_shake());
    }

    #[test]
    fn test_sexp_fallback_instrument() {
        let mode = InstrumentMode::from_sexp("(:confirmation-timeout-ms 1500)", Instrument::Organ)
            .unwrap();
        assert_eq!(mode.instrument(), Instrument::Organ);
        assert_eq!(mode.confirmation_timeout_s(), 1.5);
    }

    #[test]
    fn test_sexp_errors() {
        assert_eq!(
            InstrumentMode::from_sexp("(:instrument :kazoo)", Instrument::Piano),
            Err(PolicyError::UnknownInstrument("kazoo".to_string()))
        );
        assert!(matches!(
            InstrumentMode::from_sexp("(:blink-count many)", Instrument::Violin),
            Err(PolicyError::Malformed(_))
        ));
        assert!(matches!(
            InstrumentMode::from_sexp("(:instrument", Instrument::Piano),
            Err(PolicyError::Malformed(_))
        ));
        assert_eq!(
            InstrumentMode::from_sexp("(:enable-blink nil)", Instrument::Piano),
            Err(PolicyError::ConfirmationWithoutBothChannels)
        );
    }

    #[test]
    fn test_config_sexp() {
        let s = InstrumentMode::for_instrument(Instrument::Viola).config_sexp();
        assert!(s.contains(":instrument :viola"));
        assert!(s.contains(":class :blink-only"));
        assert!(s.contains(":long-blink-ms 500"));
    }

    proptest! {
        #[test]
        fn test_sexp_roundtrip_any_valid_policy(
            instrument in 0usize..Instrument::ALL.len(),
            class in 0usize..4,
            threshold in 0.0f64..=1.0,
            window in 0.1f64..10.0,
            min_duration in 0.0f64..0.1,
            count in 1u32..=5,
            long_blink in any::<bool>(),
            long_hold in 0.1f64..5.0,
            angle in 1.0f64..90.0,
            (sustain, cooldown) in (0.0f64..2.0, 0.0f64..10.0),
            timeout in 0.1f64..30.0,
        ) {
            let (blink, shake, confirm) = match class {
                0 => (true, true, true),
                1 => (true, true, false),
                2 => (true, false, false),
                _ => (false, true, false),
            };
            let mode = InstrumentMode::builder(Instrument::ALL[instrument])
                .enable_blink(blink)
                .enable_head_shake(shake)
                .requires_confirmation(confirm)
                .blink_threshold(threshold)
                .blink_window(window)
                .blink_min_duration(min_duration)
                .blink_count(count)
                .long_blink(long_blink)
                .long_blink_duration(long_hold)
                .shake_angle(angle)
                .shake_sustain(sustain)
                .shake_cooldown(cooldown)
                .confirmation_timeout(timeout)
                .build()
                .unwrap();
            let back = InstrumentMode::from_sexp(&mode.to_sexp(), Instrument::Piano).unwrap();
            prop_assert_eq!(back, mode);
        }
    }
}
