//! Boolean match criteria over an in-progress decode (component E).

use crate::context::DecodedFields;
use crate::error::PacketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// The literal right-hand side of a [`Comparison`].
#[derive(Debug, Clone, PartialEq)]
pub enum CriterionValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub parameter: String,
    pub operator: ComparisonOperator,
    pub value: CriterionValue,
    /// Compare against the calibrated (derived) value instead of the raw one.
    pub use_calibrated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BooleanExpr {
    And(Vec<BooleanExpr>),
    Or(Vec<BooleanExpr>),
    Cond(Comparison),
}

/// A restriction or match criterion, recursively composed (section 4.E).
#[derive(Debug, Clone, PartialEq)]
pub enum MatchCriterion {
    Comparison(Comparison),
    /// An implicit AND of several comparisons.
    ComparisonList(Vec<Comparison>),
    BooleanExpression(BooleanExpr),
}

impl MatchCriterion {
    pub fn eval(&self, record: &dyn DecodedFields) -> Result<bool, PacketError> {
        match self {
            MatchCriterion::Comparison(cmp) => eval_comparison(cmp, record),
            MatchCriterion::ComparisonList(list) => {
                for cmp in list {
                    if !eval_comparison(cmp, record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            MatchCriterion::BooleanExpression(expr) => eval_expr(expr, record),
        }
    }
}

fn eval_expr(expr: &BooleanExpr, record: &dyn DecodedFields) -> Result<bool, PacketError> {
    match expr {
        BooleanExpr::And(items) => {
            for item in items {
                if !eval_expr(item, record)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        BooleanExpr::Or(items) => {
            for item in items {
                if eval_expr(item, record)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        BooleanExpr::Cond(cmp) => eval_comparison(cmp, record),
    }
}

fn eval_comparison(cmp: &Comparison, record: &dyn DecodedFields) -> Result<bool, PacketError> {
    if cmp.use_calibrated {
        let derived = record
            .derived(&cmp.parameter)
            .ok_or_else(|| PacketError::UnresolvedReference(cmp.parameter.clone()))?;
        compare_derived(derived, cmp.operator, &cmp.value)
    } else {
        let raw = record
            .raw(&cmp.parameter)
            .ok_or_else(|| PacketError::UnresolvedReference(cmp.parameter.clone()))?;
        compare_raw(raw, cmp.operator, &cmp.value)
    }
}

fn apply_ordering(ordering: std::cmp::Ordering, op: ComparisonOperator) -> bool {
    use std::cmp::Ordering::*;
    match op {
        ComparisonOperator::Eq => ordering == Equal,
        ComparisonOperator::Ne => ordering != Equal,
        ComparisonOperator::Lt => ordering == Less,
        ComparisonOperator::Le => ordering != Greater,
        ComparisonOperator::Gt => ordering == Greater,
        ComparisonOperator::Ge => ordering != Less,
    }
}

fn compare_raw(raw: &crate::value::RawValue, op: ComparisonOperator, value: &CriterionValue) -> Result<bool, PacketError> {
    use crate::value::RawValue;
    match (raw, value) {
        (RawValue::Bytes(bytes), CriterionValue::Str(s)) => {
            Ok(apply_ordering(bytes.as_slice().cmp(s.as_bytes()), op))
        }
        _ => {
            let lhs = raw
                .as_f64()
                .ok_or_else(|| PacketError::Malformed("cannot compare binary raw value numerically".into()))?;
            let rhs = numeric(value)?;
            Ok(apply_ordering(lhs.partial_cmp(&rhs).unwrap_or(std::cmp::Ordering::Less), op))
        }
    }
}

fn compare_derived(
    derived: &crate::value::DerivedValue,
    op: ComparisonOperator,
    value: &CriterionValue,
) -> Result<bool, PacketError> {
    use crate::value::DerivedValue;
    match (derived, value) {
        (DerivedValue::Str(s), CriterionValue::Str(rhs)) => Ok(apply_ordering(s.as_str().cmp(rhs.as_str()), op)),
        (DerivedValue::Bool(b), CriterionValue::Bool(rhs)) => Ok(apply_ordering(b.cmp(rhs), op)),
        _ => {
            let lhs = derived
                .as_f64()
                .ok_or_else(|| PacketError::Malformed("cannot compare non-numeric derived value numerically".into()))?;
            let rhs = numeric(value)?;
            Ok(apply_ordering(lhs.partial_cmp(&rhs).unwrap_or(std::cmp::Ordering::Less), op))
        }
    }
}

fn numeric(value: &CriterionValue) -> Result<f64, PacketError> {
    match value {
        CriterionValue::Int(v) => Ok(*v as f64),
        CriterionValue::Float(v) => Ok(*v),
        CriterionValue::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
        CriterionValue::Str(_) => Err(PacketError::Malformed("cannot compare a string criterion value numerically".into())),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::{DerivedValue, RawValue};
    use std::collections::HashMap;

    struct FakeRecord {
        raw: HashMap<String, RawValue>,
        derived: HashMap<String, DerivedValue>,
    }

    impl DecodedFields for FakeRecord {
        fn raw(&self, name: &str) -> Option<&RawValue> {
            self.raw.get(name)
        }
        fn derived(&self, name: &str) -> Option<&DerivedValue> {
            self.derived.get(name)
        }
    }

    fn record_with_apid(apid: u16) -> FakeRecord {
        let mut raw = HashMap::new();
        raw.insert("PKT_APID".to_string(), RawValue::UInt(apid as u64));
        FakeRecord { raw, derived: HashMap::new() }
    }

    #[test]
    fn comparison_matches_raw_apid() {
        let record = record_with_apid(11);
        let cmp = MatchCriterion::Comparison(Comparison {
            parameter: "PKT_APID".into(),
            operator: ComparisonOperator::Eq,
            value: CriterionValue::Int(11),
            use_calibrated: false,
        });
        assert!(cmp.eval(&record).unwrap());
    }

    #[test]
    fn comparison_list_is_implicit_and() {
        let mut record = record_with_apid(11);
        record.raw.insert("MODE".into(), RawValue::UInt(2));
        let list = MatchCriterion::ComparisonList(vec![
            Comparison { parameter: "PKT_APID".into(), operator: ComparisonOperator::Eq, value: CriterionValue::Int(11), use_calibrated: false },
            Comparison { parameter: "MODE".into(), operator: ComparisonOperator::Eq, value: CriterionValue::Int(3), use_calibrated: false },
        ]);
        assert!(!list.eval(&record).unwrap());
    }

    #[test]
    fn boolean_expression_or_short_circuits_true() {
        let record = record_with_apid(12);
        let expr = MatchCriterion::BooleanExpression(BooleanExpr::Or(vec![
            BooleanExpr::Cond(Comparison { parameter: "PKT_APID".into(), operator: ComparisonOperator::Eq, value: CriterionValue::Int(11), use_calibrated: false }),
            BooleanExpr::Cond(Comparison { parameter: "PKT_APID".into(), operator: ComparisonOperator::Eq, value: CriterionValue::Int(12), use_calibrated: false }),
        ]));
        assert!(expr.eval(&record).unwrap());
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let record = record_with_apid(11);
        let cmp = MatchCriterion::Comparison(Comparison {
            parameter: "NOT_YET_DECODED".into(),
            operator: ComparisonOperator::Eq,
            value: CriterionValue::Int(1),
            use_calibrated: false,
        });
        assert!(matches!(cmp.eval(&record), Err(PacketError::UnresolvedReference(_))));
    }
}
