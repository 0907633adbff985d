//! Parameter types: the engineering-value meaning layered on top of a raw
//! [`crate::encoding::DataEncoding`] (component D).

use crate::calibration::{CalibratedValue, CalibratorSet};
use crate::context::DecodedFields;
use crate::encoding::DataEncoding;
use crate::error::{PacketError, WarningKind};
use crate::sink::Sink;
use crate::value::{DerivedValue, RawValue};

/// How an Absolute/Relative Time parameter maps raw units onto seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeScale {
    pub epoch: String,
    pub units_per_second: f64,
    pub calibrator: Option<CalibratorSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterTypeKind {
    Integer { calibrator: Option<CalibratorSet> },
    Float { calibrator: Option<CalibratorSet> },
    Boolean { one_is: String, zero_is: String },
    Enumerated { labels: Vec<EnumEntry> },
    String,
    Binary,
    AbsoluteTime(TimeScale),
    RelativeTime(TimeScale),
}

/// An enumeration's raw key, matching whichever of the three backing
/// encodings (integer, float, or string) section 3 allows for
/// `Enumerated` (`integer-or-string-or-float backing encoding`).
#[derive(Debug, Clone, PartialEq)]
pub enum EnumRaw {
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for EnumRaw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnumRaw::Int(v) => write!(f, "{v}"),
            EnumRaw::Float(v) => write!(f, "{v}"),
            EnumRaw::Str(v) => write!(f, "{v}"),
        }
    }
}

impl EnumRaw {
    /// Converts a decoded [`RawValue`] to the key shape used by enumeration
    /// label lookups, regardless of which backing encoding produced it.
    /// Byte-backed (string) raw values are read as UTF-8, matching the
    /// same simplification `ParameterTypeKind::String` makes in `derive`.
    fn from_raw(raw: &RawValue) -> Self {
        match raw {
            RawValue::UInt(v) => EnumRaw::Int(*v as i64),
            RawValue::Int(v) => EnumRaw::Int(*v),
            RawValue::Float(v) => EnumRaw::Float(*v),
            RawValue::Bytes(b) => EnumRaw::Str(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumEntry {
    pub raw: EnumRaw,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterType {
    pub name: String,
    pub encoding: DataEncoding,
    pub kind: ParameterTypeKind,
}

impl ParameterType {
    /// Decode a raw value and derive its engineering value, reporting
    /// unknown enum labels and out-of-range booleans through `sink` rather
    /// than failing the packet (section 4.D).
    pub fn derive(
        &self,
        raw: &RawValue,
        context: &dyn DecodedFields,
        sink: &mut dyn Sink,
    ) -> Result<DerivedValue, PacketError> {
        match &self.kind {
            ParameterTypeKind::Integer { calibrator } => {
                let raw_f = raw
                    .as_f64()
                    .ok_or_else(|| PacketError::Malformed(format!("{}: non-numeric raw value", self.name)))?;
                Ok(apply_optional_calibrator(calibrator, raw_f, context, raw))
            }
            ParameterTypeKind::Float { calibrator } => {
                let raw_f = raw
                    .as_f64()
                    .ok_or_else(|| PacketError::Malformed(format!("{}: non-numeric raw value", self.name)))?;
                Ok(apply_optional_calibrator(calibrator, raw_f, context, raw))
            }
            ParameterTypeKind::Boolean { .. } => {
                // Section 4.D: derived is always the raw-nonzero boolean, not
                // the oneStringValue/zeroStringValue display labels (those
                // are carried only for round-tripping through the writer).
                let raw_i = raw.as_i64().unwrap_or(0);
                Ok(DerivedValue::Bool(raw_i != 0))
            }
            ParameterTypeKind::Enumerated { labels } => {
                let key = EnumRaw::from_raw(raw);
                match labels.iter().find(|e| e.raw == key) {
                    Some(entry) => Ok(DerivedValue::Str(entry.label.clone())),
                    None => {
                        sink.warn(WarningKind::UnknownEnumValue { parameter: self.name.clone(), raw: key.to_string() });
                        // Raw value is retained (never masked by the missing
                        // label), but its derived shape still follows the
                        // backing encoding's own type, not always an Int.
                        Ok(match key {
                            EnumRaw::Int(v) => DerivedValue::Int(v),
                            EnumRaw::Float(v) => DerivedValue::Float(v),
                            EnumRaw::Str(v) => DerivedValue::Str(v),
                        })
                    }
                }
            }
            ParameterTypeKind::String => match raw {
                RawValue::Bytes(bytes) => Ok(DerivedValue::Str(String::from_utf8_lossy(bytes).into_owned())),
                other => Ok(DerivedValue::Str(format!("{:?}", other))),
            },
            ParameterTypeKind::Binary => match raw {
                RawValue::Bytes(bytes) => Ok(DerivedValue::Bytes(bytes.clone())),
                _ => Err(PacketError::Malformed(format!("{}: expected binary raw value", self.name))),
            },
            ParameterTypeKind::AbsoluteTime(scale) | ParameterTypeKind::RelativeTime(scale) => {
                let raw_f = raw
                    .as_f64()
                    .ok_or_else(|| PacketError::Malformed(format!("{}: non-numeric time raw value", self.name)))?;
                // Section 4.D: derived = epoch + calibrated raw * scale. The
                // epoch name is metadata only (TAI/J2000/UNIX/an ISO-8601
                // instant are not arithmetic offsets); implementations model
                // the numeric derived value as calibrated seconds since that
                // epoch, per section 9's note.
                let calibrated = match &scale.calibrator {
                    Some(set) => match set.apply(raw_f, context) {
                        Ok(CalibratedValue::Number(v)) => v,
                        Ok(CalibratedValue::Text(_)) => raw_f,
                        Err(_) => raw_f,
                    },
                    None => raw_f,
                };
                Ok(DerivedValue::Time(calibrated / scale.units_per_second))
            }
        }
    }
}

fn apply_optional_calibrator(
    calibrator: &Option<CalibratorSet>,
    raw_f: f64,
    context: &dyn DecodedFields,
    raw: &RawValue,
) -> DerivedValue {
    match calibrator {
        Some(set) => match set.apply(raw_f, context) {
            Ok(CalibratedValue::Number(v)) => DerivedValue::Float(v),
            Ok(CalibratedValue::Text(s)) => DerivedValue::Str(s),
            Err(_) => match raw {
                RawValue::Int(v) => DerivedValue::Int(*v),
                RawValue::UInt(v) => DerivedValue::UInt(*v),
                _ => DerivedValue::Float(raw_f),
            },
        },
        None => match raw {
            RawValue::Int(v) => DerivedValue::Int(*v),
            RawValue::UInt(v) => DerivedValue::UInt(*v),
            _ => DerivedValue::Float(raw_f),
        },
    }
}

/// A named, typed field inside a container: the binding between a
/// [`ParameterType`] and a name the record is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
    pub short_desc: Option<String>,
    pub long_desc: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::EmptyFields;
    use crate::encoding::DataEncoding;
    use crate::sink::VecSink;

    fn uint_encoding() -> DataEncoding {
        DataEncoding::Integer { bits: 8, encoding: crate::bitcursor::IntegerEncoding::Unsigned }
    }

    #[test]
    fn enumerated_lookup_reports_unknown_value() {
        let ptype = ParameterType {
            name: "MODE".into(),
            encoding: uint_encoding(),
            kind: ParameterTypeKind::Enumerated {
                labels: vec![EnumEntry { raw: EnumRaw::Int(0), label: "SAFE".into() }, EnumEntry { raw: EnumRaw::Int(1), label: "NOMINAL".into() }],
            },
        };
        let mut sink = VecSink::default();
        let derived = ptype.derive(&RawValue::UInt(9), &EmptyFields, &mut sink).unwrap();
        assert_eq!(derived, DerivedValue::Int(9));
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn enumerated_lookup_keeps_falsy_raw_value_scenario_s3() {
        let ptype = ParameterType {
            name: "RELAY".into(),
            encoding: uint_encoding(),
            kind: ParameterTypeKind::Enumerated {
                labels: vec![EnumEntry { raw: EnumRaw::Int(0), label: "OFF".into() }, EnumEntry { raw: EnumRaw::Int(1), label: "ON".into() }],
            },
        };
        let mut sink = VecSink::default();
        let derived = ptype.derive(&RawValue::UInt(0), &EmptyFields, &mut sink).unwrap();
        assert_eq!(derived, DerivedValue::Str("OFF".into()));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn boolean_maps_zero_and_nonzero() {
        let ptype = ParameterType {
            name: "FLAG".into(),
            encoding: uint_encoding(),
            kind: ParameterTypeKind::Boolean { one_is: "TRUE".into(), zero_is: "FALSE".into() },
        };
        let mut sink = VecSink::default();
        assert_eq!(ptype.derive(&RawValue::UInt(0), &EmptyFields, &mut sink).unwrap(), DerivedValue::Bool(false));
        assert_eq!(ptype.derive(&RawValue::UInt(1), &EmptyFields, &mut sink).unwrap(), DerivedValue::Bool(true));
    }

    #[test]
    fn relative_time_scales_by_units_per_second() {
        let ptype = ParameterType {
            name: "ELAPSED".into(),
            encoding: uint_encoding(),
            kind: ParameterTypeKind::RelativeTime(TimeScale { epoch: "TAI".into(), units_per_second: 1000.0, calibrator: None }),
        };
        let mut sink = VecSink::default();
        let derived = ptype.derive(&RawValue::UInt(5000), &EmptyFields, &mut sink).unwrap();
        assert_eq!(derived, DerivedValue::Time(5.0));
    }

    #[test]
    fn relative_time_applies_calibrator_before_scaling() {
        use crate::calibration::CalibratorSet;

        let ptype = ParameterType {
            name: "ELAPSED".into(),
            encoding: uint_encoding(),
            kind: ParameterTypeKind::RelativeTime(TimeScale {
                epoch: "TAI".into(),
                units_per_second: 10.0,
                calibrator: Some(CalibratorSet {
                    default: Some(crate::calibration::Calibrator::Polynomial(vec![0.0, 2.0])),
                    context: vec![],
                }),
            }),
        };
        let mut sink = VecSink::default();
        // raw=50 -> calibrated 100 -> /10 units-per-second = 10.0s.
        let derived = ptype.derive(&RawValue::UInt(50), &EmptyFields, &mut sink).unwrap();
        assert_eq!(derived, DerivedValue::Time(10.0));
    }
}
