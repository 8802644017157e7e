//! Recorded producer output, one s-expression per line.
//!
//! ```text
//! ; frames
//! (:t 0.10 :eyes (t t) :yaw 3.5)
//! (:t 0.13 :openness (0.12 0.08) :shake :right)
//! (:t 0.16 :micro ((:kind :smile :confidence 0.9 :intensity 0.7)))
//! ; directives
//! (:t 4.00 :policy :violin)
//! (:t 4.00 :sensitivity 0.8)
//! ```
//!
//! A directive line carries exactly one directive and no frame data.
//! Unknown shake directions and gesture kinds are dropped with a warning,
//! like any malformed observation.  Unparseable lines are errors.

use thiserror::Error;
use tracing::warn;

use crate::gesture::{EyeState, GestureKind, GestureObservation, HeadShakeDirection};
use crate::pipeline::{GesturePipeline, ProducerFrame};
use crate::policy::Instrument;
use crate::sexp::{self, atom_string, is_truthy, list_items};

#[derive(Debug, Error, PartialEq)]
pub enum TraceError {
    #[error("malformed s-expression: {0}")]
    Syntax(String),

    #[error("missing :t timestamp")]
    MissingTimestamp,

    #[error("invalid :{key} value {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("line mixes {0}")]
    MixedLine(String),

    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<TraceError>,
    },
}

/// One line of a trace.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Frame(ProducerFrame),
    SwitchInstrument {
        timestamp_s: f64,
        instrument: Instrument,
    },
    SetSensitivity {
        timestamp_s: f64,
        sensitivity: f64,
    },
}

impl TraceEvent {
    pub fn timestamp_s(&self) -> f64 {
        match self {
            Self::Frame(frame) => frame.timestamp_s,
            Self::SwitchInstrument { timestamp_s, .. } | Self::SetSensitivity { timestamp_s, .. } => {
                *timestamp_s
            }
        }
    }

    /// Feed this event into a pipeline.
    pub fn apply(&self, pipeline: &mut GesturePipeline) {
        match self {
            Self::Frame(frame) => pipeline.process_frame(frame),
            Self::SwitchInstrument { instrument, .. } => pipeline.switch_to_instrument(*instrument),
            Self::SetSensitivity { sensitivity, .. } => pipeline.set_sensitivity(*sensitivity),
        }
    }
}

/// Keys that make a line a frame.
const FRAME_KEYS: [&str; 5] = ["eyes", "openness", "shake", "yaw", "micro"];

/// Keys that make a line a directive.
const DIRECTIVE_KEYS: [&str; 2] = ["policy", "sensitivity"];

fn float_value(value: &lexpr::Value, key: &'static str) -> Result<f64, TraceError> {
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(TraceError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

/// Reject a directive that shares its line with another directive or
/// with frame data, since only one of them could be applied.
fn check_directive(value: &lexpr::Value) -> Result<(), TraceError> {
    let present = |keys: &[&'static str]| -> Vec<&'static str> {
        keys.iter()
            .copied()
            .filter(|key| sexp::get_value(value, key).is_some())
            .collect()
    };
    let directives = present(&DIRECTIVE_KEYS);
    if directives.is_empty() {
        return Ok(());
    }
    let frame = present(&FRAME_KEYS);
    if directives.len() > 1 || !frame.is_empty() {
        let keys: Vec<String> = directives
            .iter()
            .chain(frame.iter())
            .map(|key| format!(":{key}"))
            .collect();
        return Err(TraceError::MixedLine(keys.join(" ")));
    }
    Ok(())
}

fn float_pair(value: &lexpr::Value, key: &'static str) -> Result<(f64, f64), TraceError> {
    match list_items(value).as_slice() {
        [a, b] => Ok((float_value(a, key)?, float_value(b, key)?)),
        _ => Err(TraceError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_micro(value: &lexpr::Value, timestamp_s: f64) -> Result<Vec<GestureObservation>, TraceError> {
    let mut readings = Vec::new();
    for item in list_items(value) {
        let Some(name) = sexp::get_keyword(item, "kind") else {
            return Err(TraceError::InvalidValue {
                key: "micro",
                value: item.to_string(),
            });
        };
        let Some(kind) = GestureKind::from_str(&name) else {
            warn!("Dropping reading for unknown gesture kind {}", name);
            continue;
        };
        let intensity = match sexp::get_value(item, "intensity") {
            Some(v) => float_value(v, "intensity")?,
            None => {
                return Err(TraceError::InvalidValue {
                    key: "micro",
                    value: item.to_string(),
                })
            }
        };
        let confidence = match sexp::get_value(item, "confidence") {
            Some(v) => float_value(v, "confidence")?,
            None => 1.0,
        };
        readings.push(GestureObservation::new(kind, confidence, intensity, timestamp_s));
    }
    Ok(readings)
}

fn parse_event(value: &lexpr::Value, timestamp_s: f64) -> Result<TraceEvent, TraceError> {
    check_directive(value)?;
    if let Some(name) = sexp::get_keyword(value, "policy") {
        let instrument =
            Instrument::from_str(&name).ok_or(TraceError::UnknownInstrument(name))?;
        return Ok(TraceEvent::SwitchInstrument {
            timestamp_s,
            instrument,
        });
    }
    if let Some(v) = sexp::get_value(value, "sensitivity") {
        return Ok(TraceEvent::SetSensitivity {
            timestamp_s,
            sensitivity: float_value(v, "sensitivity")?,
        });
    }

    let mut frame = ProducerFrame::at(timestamp_s);
    if let Some(v) = sexp::get_value(value, "eyes") {
        frame.eyes = match list_items(v).as_slice() {
            [left, right] => Some(EyeState::new(
                is_truthy(&atom_string(left)),
                is_truthy(&atom_string(right)),
            )),
            _ => {
                return Err(TraceError::InvalidValue {
                    key: "eyes",
                    value: v.to_string(),
                })
            }
        };
    }
    if let Some(v) = sexp::get_value(value, "openness") {
        frame.eye_openness = Some(float_pair(v, "openness")?);
    }
    if let Some(name) = sexp::get_keyword(value, "shake") {
        match HeadShakeDirection::from_str(&name) {
            Some(direction) => frame.head_shake = Some(direction),
            None => warn!("Dropping unknown head shake direction {}", name),
        }
    }
    if let Some(v) = sexp::get_value(value, "yaw") {
        frame.head_yaw_deg = Some(float_value(v, "yaw")?);
    }
    if let Some(v) = sexp::get_value(value, "micro") {
        frame.micro = parse_micro(v, timestamp_s)?;
    }
    Ok(TraceEvent::Frame(frame))
}

fn is_blank(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with(';')
}

fn parse_value(line: &str) -> Result<lexpr::Value, TraceError> {
    sexp::parse(line).map_err(|e| TraceError::Syntax(e.to_string()))
}

/// Parse one recorded line.  Blank and `;` comment lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<TraceEvent>, TraceError> {
    if is_blank(line) {
        return Ok(None);
    }
    let value = parse_value(line)?;
    let timestamp_s = match sexp::get_value(&value, "t") {
        Some(v) => float_value(v, "t")?,
        None => return Err(TraceError::MissingTimestamp),
    };
    parse_event(&value, timestamp_s).map(Some)
}

/// Parse one live line, stamped with its arrival time.  Any `:t` in the
/// line is ignored.
pub fn parse_line_at(line: &str, arrival_s: f64) -> Result<Option<TraceEvent>, TraceError> {
    if is_blank(line) {
        return Ok(None);
    }
    let value = parse_value(line)?;
    parse_event(&value, arrival_s).map(Some)
}

/// Parse a whole trace.  Errors carry their 1-based line number.
pub fn parse_trace(text: &str) -> Result<Vec<TraceEvent>, TraceError> {
    let mut events = Vec::new();
    for (i, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => {
                return Err(TraceError::AtLine {
                    line: i + 1,
                    source: Box::new(e),
                })
            }
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(line: &str) -> ProducerFrame {
        match parse_line(line) {
            Ok(Some(TraceEvent::Frame(frame))) => frame,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_eyes_and_shake() {
        let f = frame("(:t 0.5 :eyes (t nil) :shake :left)");
        assert_eq!(f.timestamp_s, 0.5);
        assert_eq!(f.eyes, Some(EyeState::new(true, false)));
        assert_eq!(f.head_shake, Some(HeadShakeDirection::Left));
        assert_eq!(f.head_yaw_deg, None);
    }

    #[test]
    fn test_parse_openness_and_yaw() {
        let f = frame("(:t 1 :openness (0.1 0.2) :yaw -22.5)");
        assert_eq!(f.eye_openness, Some((0.1, 0.2)));
        assert_eq!(f.head_yaw_deg, Some(-22.5));
    }

    #[test]
    fn test_parse_micro() {
        let f = frame(
            "(:t 2.0 :micro ((:kind :smile :confidence 0.9 :intensity 0.7) (:kind :lip-purse :intensity 0.5)))",
        );
        assert_eq!(
            f.micro,
            vec![
                GestureObservation::new(GestureKind::Smile, 0.9, 0.7, 2.0),
                GestureObservation::new(GestureKind::LipPurse, 1.0, 0.5, 2.0),
            ]
        );
    }

    #[test]
    fn test_unknown_names_dropped() {
        let f = frame("(:t 0 :shake :sideways :micro ((:kind :wink :intensity 0.9)))");
        assert_eq!(f.head_shake, None);
        assert!(f.micro.is_empty());
    }

    #[test]
    fn test_parse_directives() {
        assert_eq!(
            parse_line("(:t 3 :policy :cello)"),
            Ok(Some(TraceEvent::SwitchInstrument {
                timestamp_s: 3.0,
                instrument: Instrument::Cello,
            }))
        );
        assert_eq!(
            parse_line("(:t 3 :sensitivity 0.8)"),
            Ok(Some(TraceEvent::SetSensitivity {
                timestamp_s: 3.0,
                sensitivity: 0.8,
            }))
        );
        assert_eq!(
            parse_line("(:t 3 :policy :kazoo)"),
            Err(TraceError::UnknownInstrument("kazoo".to_string()))
        );
    }

    #[test]
    fn test_mixed_lines_rejected() {
        assert_eq!(
            parse_line("(:t 3 :policy :cello :sensitivity 0.8)"),
            Err(TraceError::MixedLine(":policy :sensitivity".to_string()))
        );
        assert_eq!(
            parse_line("(:t 3 :sensitivity 0.8 :eyes (t t))"),
            Err(TraceError::MixedLine(":sensitivity :eyes".to_string()))
        );
        assert!(matches!(
            parse_trace("(:t 0 :eyes (t t))\n(:t 1 :policy :brass :shake :left)"),
            Err(TraceError::AtLine { line: 2, .. })
        ));
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   ; warm-up"), Ok(None));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_line("(:eyes (t t))"), Err(TraceError::MissingTimestamp));
        assert!(matches!(parse_line("(:t 0"), Err(TraceError::Syntax(_))));
        assert!(matches!(
            parse_line("(:t 0 :eyes (t))"),
            Err(TraceError::InvalidValue { key: "eyes", .. })
        ));
        assert!(matches!(
            parse_line("(:t soon)"),
            Err(TraceError::InvalidValue { key: "t", .. })
        ));
        assert!(matches!(
            parse_line("(:t 0 :micro ((:kind :smile)))"),
            Err(TraceError::InvalidValue { key: "micro", .. })
        ));
    }

    #[test]
    fn test_parse_trace_line_numbers() {
        let text = "; header\n(:t 0 :eyes (t t))\n\n(:t 1 :yaw x)\n";
        match parse_trace(text) {
            Err(TraceError::AtLine { line, source }) => {
                assert_eq!(line, 4);
                assert!(matches!(*source, TraceError::InvalidValue { key: "yaw", .. }));
            }
            other => panic!("expected line error, got {other:?}"),
        }
        let ok = parse_trace("(:t 0 :eyes (t t))\n(:t 0.1 :policy :brass)").unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[1].timestamp_s(), 0.1);
    }

    #[test]
    fn test_parse_line_at_stamps_arrival() {
        match parse_line_at("(:t 99 :shake :right)", 1.25) {
            Ok(Some(TraceEvent::Frame(f))) => assert_eq!(f.timestamp_s, 1.25),
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(matches!(
            parse_line_at("(:shake :left)", 0.5),
            Ok(Some(TraceEvent::Frame(_)))
        ));
    }
}
