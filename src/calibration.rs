//! Calibrators: raw scalar -> derived scalar transforms (component B).

use crate::context::DecodedFields;
use crate::criteria::MatchCriterion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    ZeroOrderHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extrapolation {
    Extrapolate,
    Clamp,
    Error,
}

/// What a [`Calibrator`] produces: most calibrators emit a number, but an
/// enumerated lookup emits an informational label instead.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibratedValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplinePoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteCase {
    pub criterion: MatchCriterion,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscreteDefault {
    PassThrough,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumLabel {
    pub raw: i64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Calibrator {
    Polynomial(Vec<f64>),
    Spline {
        points: Vec<SplinePoint>,
        interpolation: Interpolation,
        extrapolation: Extrapolation,
    },
    DiscreteLookup {
        cases: Vec<DiscreteCase>,
        default: DiscreteDefault,
    },
    EnumeratedLookup(Vec<EnumLabel>),
}

#[derive(Debug, Clone)]
pub enum CalibrationError {
    NoMatch,
    Extrapolation(f64),
}

impl Calibrator {
    pub fn apply(&self, raw: f64, context: &dyn DecodedFields) -> Result<CalibratedValue, CalibrationError> {
        match self {
            Calibrator::Polynomial(coefficients) => {
                let mut derived = 0.0;
                for (power, c) in coefficients.iter().enumerate() {
                    derived += c * raw.powi(power as i32);
                }
                Ok(CalibratedValue::Number(derived))
            }
            Calibrator::Spline { points, interpolation, extrapolation } => {
                spline_apply(points, *interpolation, *extrapolation, raw).map(CalibratedValue::Number)
            }
            Calibrator::DiscreteLookup { cases, default } => {
                for case in cases {
                    if case.criterion.eval(context).unwrap_or(false) {
                        return Ok(CalibratedValue::Number(case.value));
                    }
                }
                match default {
                    DiscreteDefault::PassThrough => Ok(CalibratedValue::Number(raw)),
                    DiscreteDefault::Error => Err(CalibrationError::NoMatch),
                }
            }
            Calibrator::EnumeratedLookup(labels) => {
                let raw_i = raw.round() as i64;
                match labels.iter().find(|l| l.raw == raw_i) {
                    Some(label) => Ok(CalibratedValue::Text(label.label.clone())),
                    None => Ok(CalibratedValue::Number(raw)),
                }
            }
        }
    }
}

/// Ties on `x` resolve to the last matching point, per section 4.B.
fn spline_apply(
    points: &[SplinePoint],
    interpolation: Interpolation,
    extrapolation: Extrapolation,
    x: f64,
) -> Result<f64, CalibrationError> {
    if points.is_empty() {
        return Err(CalibrationError::NoMatch);
    }

    if x < points[0].x {
        let next = points.get(1);
        return extrapolate(&points[0], next, x, extrapolation);
    }
    if x > points[points.len() - 1].x {
        let last = &points[points.len() - 1];
        let prev = if points.len() >= 2 { Some(&points[points.len() - 2]) } else { None };
        return extrapolate(last, prev, x, extrapolation);
    }

    // Find the last point with x <= target, so ties resolve to the last one.
    let mut lower = 0;
    for (i, p) in points.iter().enumerate() {
        if p.x <= x {
            lower = i;
        } else {
            break;
        }
    }

    if points[lower].x == x {
        return Ok(points[lower].y);
    }

    let upper = lower + 1;
    match interpolation {
        Interpolation::ZeroOrderHold => Ok(points[lower].y),
        Interpolation::Linear => {
            let (x0, y0) = (points[lower].x, points[lower].y);
            let (x1, y1) = (points[upper].x, points[upper].y);
            let t = (x - x0) / (x1 - x0);
            Ok(y0 + t * (y1 - y0))
        }
    }
}

/// `edge` is the nearest in-range point to `x`; `neighbor`, when present, is
/// the next point inward, used to derive a slope for genuine linear
/// extrapolation. With only one point in the spline there is no slope to
/// take, so `Extrapolate` falls back to the flat edge value.
fn extrapolate(edge: &SplinePoint, neighbor: Option<&SplinePoint>, x: f64, mode: Extrapolation) -> Result<f64, CalibrationError> {
    match mode {
        Extrapolation::Clamp => Ok(edge.y),
        Extrapolation::Error => Err(CalibrationError::Extrapolation(x)),
        Extrapolation::Extrapolate => match neighbor {
            Some(neighbor) if neighbor.x != edge.x => {
                let slope = (neighbor.y - edge.y) / (neighbor.x - edge.x);
                Ok(edge.y + slope * (x - edge.x))
            }
            _ => Ok(edge.y),
        },
    }
}

/// The default calibrator plus zero or more context overrides, owned by a
/// [`crate::ptype::ParameterType`]. The first matching context calibrator
/// wins; otherwise the default applies; otherwise the raw value passes
/// through unchanged (section 4.B / 9, Open Question #1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibratorSet {
    pub default: Option<Calibrator>,
    pub context: Vec<ContextCalibrator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextCalibrator {
    pub criterion: MatchCriterion,
    pub calibrator: Calibrator,
}

impl CalibratorSet {
    pub fn apply(&self, raw: f64, context: &dyn DecodedFields) -> Result<CalibratedValue, CalibrationError> {
        for ctx in &self.context {
            if ctx.criterion.eval(context).unwrap_or(false) {
                return ctx.calibrator.apply(raw, context);
            }
        }
        match &self.default {
            Some(cal) => cal.apply(raw, context),
            None => Ok(CalibratedValue::Number(raw)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::EmptyFields;

    #[test]
    fn polynomial_evaluates_in_double_precision() {
        let cal = Calibrator::Polynomial(vec![1.0, 2.0, 3.0]); // 1 + 2x + 3x^2
        let CalibratedValue::Number(v) = cal.apply(2.0, &EmptyFields).unwrap() else {
            panic!("expected number")
        };
        assert_eq!(v, 1.0 + 4.0 + 12.0);
    }

    #[test]
    fn spline_linear_interpolation() {
        let cal = Calibrator::Spline {
            points: vec![
                SplinePoint { x: 0.0, y: 0.0 },
                SplinePoint { x: 10.0, y: 100.0 },
            ],
            interpolation: Interpolation::Linear,
            extrapolation: Extrapolation::Clamp,
        };
        let CalibratedValue::Number(v) = cal.apply(5.0, &EmptyFields).unwrap() else {
            panic!("expected number")
        };
        assert_eq!(v, 50.0);
    }

    #[test]
    fn spline_clamp_extrapolation() {
        let cal = Calibrator::Spline {
            points: vec![SplinePoint { x: 0.0, y: 1.0 }, SplinePoint { x: 1.0, y: 2.0 }],
            interpolation: Interpolation::Linear,
            extrapolation: Extrapolation::Clamp,
        };
        let CalibratedValue::Number(v) = cal.apply(5.0, &EmptyFields).unwrap() else {
            panic!("expected number")
        };
        assert_eq!(v, 2.0);
    }

    #[test]
    fn spline_linear_extrapolation_continues_the_slope() {
        let cal = Calibrator::Spline {
            points: vec![
                SplinePoint { x: 0.0, y: 0.0 },
                SplinePoint { x: 10.0, y: 100.0 },
            ],
            interpolation: Interpolation::Linear,
            extrapolation: Extrapolation::Extrapolate,
        };
        // slope is 10/unit on both sides; extrapolating past either edge
        // should continue that slope rather than clamp flat.
        let CalibratedValue::Number(below) = cal.apply(-5.0, &EmptyFields).unwrap() else {
            panic!("expected number")
        };
        assert_eq!(below, -50.0);
        let CalibratedValue::Number(above) = cal.apply(15.0, &EmptyFields).unwrap() else {
            panic!("expected number")
        };
        assert_eq!(above, 150.0);
    }

    #[test]
    fn spline_ties_resolve_to_last_point() {
        let cal = Calibrator::Spline {
            points: vec![
                SplinePoint { x: 1.0, y: 10.0 },
                SplinePoint { x: 1.0, y: 20.0 },
            ],
            interpolation: Interpolation::ZeroOrderHold,
            extrapolation: Extrapolation::Clamp,
        };
        let CalibratedValue::Number(v) = cal.apply(1.0, &EmptyFields).unwrap() else {
            panic!("expected number")
        };
        assert_eq!(v, 20.0);
    }

    #[test]
    fn enumerated_lookup_duplicate_labels_permitted() {
        let cal = Calibrator::EnumeratedLookup(vec![
            EnumLabel { raw: 0, label: "OFF".into() },
            EnumLabel { raw: 1, label: "ON".into() },
            EnumLabel { raw: 2, label: "ON".into() },
        ]);
        assert_eq!(cal.apply(2.0, &EmptyFields).unwrap(), CalibratedValue::Text("ON".into()));
    }
}
