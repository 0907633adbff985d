//! Scalar values shared across encodings (C), parameter types (D), and
//! match criteria (E): the raw bits as decoded, and the derived engineering
//! value produced after calibration.

use serde::Serialize;

/// A value as decoded from bits, before calibration or label lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    UInt(u64),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

/// A value after calibration, label lookup, or time conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DerivedValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    /// Seconds since the parameter type's epoch, for Absolute/Relative Time.
    Time(f64),
}

impl RawValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::UInt(v) => Some(*v as f64),
            RawValue::Int(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v),
            RawValue::Bytes(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::UInt(v) => i64::try_from(*v).ok(),
            RawValue::Int(v) => Some(*v),
            RawValue::Float(v) => Some(*v as i64),
            RawValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RawValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl DerivedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DerivedValue::Int(v) => Some(*v as f64),
            DerivedValue::UInt(v) => Some(*v as f64),
            DerivedValue::Float(v) => Some(*v),
            DerivedValue::Time(v) => Some(*v),
            DerivedValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            DerivedValue::Str(_) | DerivedValue::Bytes(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DerivedValue::Str(v) => Some(v),
            _ => None,
        }
    }
}
