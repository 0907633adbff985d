//! Parses an XTCE document into a [`TypeSystem`] (component G).

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use crate::bitcursor::IntegerEncoding;
use crate::calibration::{Calibrator, CalibratorSet, ContextCalibrator, Extrapolation, Interpolation, SplinePoint};
use crate::container::{BaseContainer, ContainerEntry, SequenceContainer, TypeSystem, ROOT_CONTAINER_NAME};
use crate::criteria::{BooleanExpr, Comparison, ComparisonOperator, CriterionValue, MatchCriterion};
use crate::encoding::{Charset, DataEncoding, FloatEncoding, SizeInBits, StringLength};
use crate::error::{XtceError, XtceResult};
use crate::ptype::{EnumEntry, EnumRaw, Parameter, ParameterType, ParameterTypeKind, TimeScale};

use super::xml::{parse_document, XmlNode};

pub const NAMESPACE_2018: &str = "http://www.omg.org/spec/XTCE/20180204";
pub const NAMESPACE_LEGACY: &str = "http://www.omg.org/space/xtce";

/// A loaded document: the type system plus the namespace URI it declared,
/// so the writer can round-trip it unchanged.
pub struct LoadedDocument {
    pub type_system: TypeSystem,
    pub space_system_name: String,
    pub namespace: String,
}

pub fn load<R: BufRead>(reader: R) -> XtceResult<LoadedDocument> {
    let doc = parse_document(reader)?;
    if doc.root.name != "SpaceSystem" {
        return Err(XtceError::UnknownElement(doc.root.name));
    }
    let space_system_name = doc.root.attr("name").unwrap_or("SpaceSystem").to_string();
    let namespace = doc.namespace.unwrap_or_else(|| NAMESPACE_2018.to_string());
    log::debug!("loading XTCE document '{space_system_name}'");

    let mut ts = TypeSystem::default();
    ts.containers.insert(
        ROOT_CONTAINER_NAME.to_string(),
        SequenceContainer { name: ROOT_CONTAINER_NAME.to_string(), abstract_: true, base: None, entries: vec![] },
    );

    if let Some(meta) = doc.root.child("TelemetryMetaData") {
        if let Some(pts) = meta.child("ParameterTypeSet") {
            load_parameter_types(pts, &mut ts)?;
        }
        if let Some(ps) = meta.child("ParameterSet") {
            load_parameters(ps, &mut ts)?;
        }
        if let Some(cs) = meta.child("ContainerSet") {
            load_containers(cs, &mut ts)?;
        }
    }

    validate(&ts)?;
    log::debug!(
        "loaded '{space_system_name}': {} parameter types, {} parameters, {} containers",
        ts.parameter_types.len(),
        ts.parameters.len(),
        ts.containers.len()
    );
    Ok(LoadedDocument { type_system: ts, space_system_name, namespace })
}

fn insert_unique<T>(map: &mut HashMap<String, T>, kind: &'static str, name: String, value: T) -> XtceResult<()> {
    if map.contains_key(&name) {
        return Err(XtceError::DuplicateName { kind, name });
    }
    map.insert(name, value);
    Ok(())
}

fn load_parameter_types(node: &XmlNode, ts: &mut TypeSystem) -> XtceResult<()> {
    for child in &node.children {
        let name = child.attr("name").ok_or_else(|| XtceError::Malformed { position: 0, message: "parameter type missing name".into() })?.to_string();
        let kind_and_encoding = match child.name.as_str() {
            "IntegerParameterType" => load_integer_type(child)?,
            "FloatParameterType" => load_float_type(child)?,
            "BooleanParameterType" => load_boolean_type(child)?,
            "EnumeratedParameterType" => load_enumerated_type(child)?,
            "StringParameterType" => load_string_type(child)?,
            "BinaryParameterType" => load_binary_type(child)?,
            "AbsoluteTimeParameterType" => load_time_type(child, true)?,
            "RelativeTimeParameterType" => load_time_type(child, false)?,
            other => return Err(XtceError::UnknownElement(other.to_string())),
        };
        let (kind, encoding) = kind_and_encoding;
        encoding.validate()?;
        insert_unique(&mut ts.parameter_types, "ParameterType", name.clone(), ParameterType { name, encoding, kind })?;
    }
    Ok(())
}

fn load_integer_encoding(node: &XmlNode) -> XtceResult<DataEncoding> {
    let enc_node = node
        .child("IntegerDataEncoding")
        .ok_or_else(|| XtceError::Malformed { position: 0, message: "missing IntegerDataEncoding".into() })?;
    let bits: u32 = enc_node.attr("sizeInBits").unwrap_or("8").parse().map_err(|_| XtceError::Malformed {
        position: 0,
        message: "non-numeric sizeInBits".into(),
    })?;
    let encoding = match enc_node.attr("encoding").unwrap_or("unsigned") {
        "unsigned" => IntegerEncoding::Unsigned,
        "twosComplement" => IntegerEncoding::TwosComplement,
        "signMagnitude" => IntegerEncoding::SignMagnitude,
        "onesComplement" => IntegerEncoding::OnesComplement,
        other => {
            return Err(XtceError::UnsupportedEncoding {
                element: "IntegerDataEncoding".into(),
                reason: format!("unknown encoding '{other}'"),
            })
        }
    };
    Ok(DataEncoding::Integer { bits, encoding })
}

fn load_default_calibrator(node: &XmlNode) -> XtceResult<Option<CalibratorSet>> {
    let default = match node.child("DefaultCalibrator") {
        Some(cal_node) => Some(load_calibrator(cal_node)?),
        None => None,
    };
    let context: XtceResult<Vec<ContextCalibrator>> = node
        .child("ContextCalibratorList")
        .map(|list| {
            list.children_named("ContextCalibrator")
                .map(|c| {
                    let criterion_node = c
                        .child("ContextMatch")
                        .ok_or_else(|| XtceError::Malformed { position: 0, message: "ContextCalibrator missing ContextMatch".into() })?;
                    let criterion = load_match_criterion(criterion_node)?;
                    let cal_node = c
                        .child("Calibrator")
                        .ok_or_else(|| XtceError::Malformed { position: 0, message: "ContextCalibrator missing Calibrator".into() })?;
                    let calibrator = load_calibrator(cal_node)?;
                    Ok(ContextCalibrator { criterion, calibrator })
                })
                .collect()
        })
        .unwrap_or(Ok(Vec::new()));

    if default.is_none() && context.as_ref().map(|c| c.is_empty()).unwrap_or(true) {
        return Ok(None);
    }
    Ok(Some(CalibratorSet { default, context: context? }))
}

fn load_calibrator(node: &XmlNode) -> XtceResult<Calibrator> {
    if let Some(poly) = node.child("PolynomialCalibrator") {
        let mut terms: Vec<(u32, f64)> = poly
            .children_named("Term")
            .map(|t| {
                let exponent: u32 = t.attr("exponent").unwrap_or("0").parse().unwrap_or(0);
                let coefficient: f64 = t.attr("coefficient").unwrap_or("0").parse().unwrap_or(0.0);
                (exponent, coefficient)
            })
            .collect();
        terms.sort_by_key(|(exp, _)| *exp);
        let highest = terms.last().map(|(e, _)| *e).unwrap_or(0);
        let mut coefficients = vec![0.0; highest as usize + 1];
        for (exp, coeff) in terms {
            coefficients[exp as usize] = coeff;
        }
        return Ok(Calibrator::Polynomial(coefficients));
    }
    if let Some(spline) = node.child("SplineCalibrator") {
        let points = spline
            .children_named("SplinePoint")
            .map(|p| {
                let x: f64 = p.attr("raw").unwrap_or("0").parse().unwrap_or(0.0);
                let y: f64 = p.attr("calibrated").unwrap_or("0").parse().unwrap_or(0.0);
                SplinePoint { x, y }
            })
            .collect();
        let interpolation = match spline.attr("interpolation").unwrap_or("linear") {
            "zeroOrderHold" => Interpolation::ZeroOrderHold,
            _ => Interpolation::Linear,
        };
        let extrapolation = match spline.attr("extrapolate").unwrap_or("clamp") {
            "true" => Extrapolation::Extrapolate,
            "error" => Extrapolation::Error,
            _ => Extrapolation::Clamp,
        };
        return Ok(Calibrator::Spline { points, interpolation, extrapolation });
    }
    if let Some(discrete) = node.child("DiscreteLookupCalibrator") {
        let cases = discrete
            .children_named("DiscreteLookup")
            .map(|d| {
                let value: f64 = d.attr("value").unwrap_or("0").parse().unwrap_or(0.0);
                let criterion_node = d
                    .child("Comparison")
                    .ok_or_else(|| XtceError::Malformed { position: 0, message: "DiscreteLookup missing Comparison".into() })?;
                let criterion = MatchCriterion::Comparison(load_comparison(criterion_node)?);
                Ok(crate::calibration::DiscreteCase { criterion, value })
            })
            .collect::<XtceResult<Vec<_>>>()?;
        let default = match discrete.attr("default").unwrap_or("error") {
            "passThrough" => crate::calibration::DiscreteDefault::PassThrough,
            _ => crate::calibration::DiscreteDefault::Error,
        };
        return Ok(Calibrator::DiscreteLookup { cases, default });
    }
    Err(XtceError::UnknownElement("Calibrator".into()))
}

fn load_float_type(node: &XmlNode) -> XtceResult<(ParameterTypeKind, DataEncoding)> {
    let enc_node = node
        .child("FloatDataEncoding")
        .ok_or_else(|| XtceError::Malformed { position: 0, message: "missing FloatDataEncoding".into() })?;
    let bits: u32 = enc_node.attr("sizeInBits").unwrap_or("32").parse().map_err(|_| XtceError::Malformed {
        position: 0,
        message: "non-numeric sizeInBits".into(),
    })?;
    let encoding = match (bits, enc_node.attr("encoding").unwrap_or("IEEE754_1985")) {
        (16, _) => FloatEncoding::Ieee754_16,
        (32, "MIL-1750A") => FloatEncoding::Mil1750a32,
        (32, _) => FloatEncoding::Ieee754_32,
        (64, _) => FloatEncoding::Ieee754_64,
        (other, _) => {
            return Err(XtceError::UnsupportedEncoding {
                element: "FloatDataEncoding".into(),
                reason: format!("unsupported float size {other}"),
            })
        }
    };
    let calibrator = load_default_calibrator(node)?;
    Ok((ParameterTypeKind::Float { calibrator }, DataEncoding::Float { encoding }))
}

fn load_integer_type(node: &XmlNode) -> XtceResult<(ParameterTypeKind, DataEncoding)> {
    let encoding = load_integer_encoding(node)?;
    let calibrator = load_default_calibrator(node)?;
    Ok((ParameterTypeKind::Integer { calibrator }, encoding))
}

fn load_boolean_type(node: &XmlNode) -> XtceResult<(ParameterTypeKind, DataEncoding)> {
    let encoding = load_integer_encoding(node)?;
    let one_is = node.attr("oneStringValue").unwrap_or("true").to_string();
    let zero_is = node.attr("zeroStringValue").unwrap_or("false").to_string();
    Ok((ParameterTypeKind::Boolean { one_is, zero_is }, encoding))
}

/// Section 3 allows an `Enumerated` type to be backed by an integer, a
/// float, or a string encoding; the backing encoding child present on the
/// node (mirroring `IntegerParameterType`/`FloatParameterType`/
/// `StringParameterType`'s own direct-child shape) decides which.
fn load_enumerated_type(node: &XmlNode) -> XtceResult<(ParameterTypeKind, DataEncoding)> {
    let list = node.child("EnumerationList");
    if node.child("FloatDataEncoding").is_some() {
        let (_, encoding) = load_float_type(node)?;
        let labels = list
            .map(|list| {
                list.children_named("Enumeration")
                    .map(|e| {
                        let raw: f64 = e.attr("value").unwrap_or("0").parse().unwrap_or(0.0);
                        let label = e.attr("label").unwrap_or("").to_string();
                        EnumEntry { raw: EnumRaw::Float(raw), label }
                    })
                    .collect()
            })
            .unwrap_or_default();
        return Ok((ParameterTypeKind::Enumerated { labels }, encoding));
    }
    if node.child("StringDataEncoding").is_some() {
        let (_, encoding) = load_string_type(node)?;
        let labels = list
            .map(|list| {
                list.children_named("Enumeration")
                    .map(|e| {
                        let raw = e.attr("value").unwrap_or("").to_string();
                        let label = e.attr("label").unwrap_or("").to_string();
                        EnumEntry { raw: EnumRaw::Str(raw), label }
                    })
                    .collect()
            })
            .unwrap_or_default();
        return Ok((ParameterTypeKind::Enumerated { labels }, encoding));
    }
    let encoding = load_integer_encoding(node)?;
    let labels = list
        .map(|list| {
            list.children_named("Enumeration")
                .map(|e| {
                    let raw: i64 = e.attr("value").unwrap_or("0").parse().unwrap_or(0);
                    let label = e.attr("label").unwrap_or("").to_string();
                    EnumEntry { raw: EnumRaw::Int(raw), label }
                })
                .collect()
        })
        .unwrap_or_default();
    Ok((ParameterTypeKind::Enumerated { labels }, encoding))
}

fn load_string_type(node: &XmlNode) -> XtceResult<(ParameterTypeKind, DataEncoding)> {
    let enc_node = node
        .child("StringDataEncoding")
        .ok_or_else(|| XtceError::Malformed { position: 0, message: "missing StringDataEncoding".into() })?;
    let charset = match enc_node.attr("encoding").unwrap_or("UTF-8") {
        "UTF-16LE" => Charset::Utf16Le,
        "UTF-16BE" => Charset::Utf16Be,
        _ => Charset::Utf8,
    };
    let length = if let Some(size_node) = enc_node.child("SizeInBits") {
        if let Some(fixed) = size_node.child("Fixed") {
            let bits: u32 = fixed
                .child("FixedValue")
                .and_then(|v| v.text.parse().ok())
                .or_else(|| fixed.attr("value").and_then(|v| v.parse().ok()))
                .unwrap_or(0);
            StringLength::Fixed { bits }
        } else if let Some(dyn_value) = size_node.child("DynamicValue") {
            let reference = dyn_value
                .child("ParameterInstanceRef")
                .and_then(|r| r.attr("parameterRef"))
                .unwrap_or("")
                .to_string();
            StringLength::PrefixedBy { length_parameter: reference }
        } else {
            StringLength::Fixed { bits: 0 }
        }
    } else if let Some(term_node) = enc_node.child("Termination") {
        let terminator_hex = term_node.text.trim();
        let terminator = parse_hex_bytes(terminator_hex).unwrap_or_else(|| vec![0]);
        StringLength::Terminated { terminator }
    } else {
        StringLength::Fixed { bits: 0 }
    };
    Ok((ParameterTypeKind::String, DataEncoding::String { charset, length }))
}

fn parse_hex_bytes(text: &str) -> Option<Vec<u8>> {
    let trimmed = text.trim_start_matches("0x");
    if trimmed.is_empty() || trimmed.len() % 2 != 0 {
        return None;
    }
    (0..trimmed.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&trimmed[i..i + 2], 16).ok())
        .collect()
}

fn load_binary_type(node: &XmlNode) -> XtceResult<(ParameterTypeKind, DataEncoding)> {
    let enc_node = node
        .child("BinaryDataEncoding")
        .ok_or_else(|| XtceError::Malformed { position: 0, message: "missing BinaryDataEncoding".into() })?;
    let size = if let Some(size_node) = enc_node.child("SizeInBits") {
        if let Some(fixed) = size_node.child("FixedValue") {
            SizeInBits::Fixed(fixed.text.parse().unwrap_or(0))
        } else if let Some(dyn_value) = size_node.child("DynamicValue") {
            let reference = dyn_value
                .child("ParameterInstanceRef")
                .and_then(|r| r.attr("parameterRef"))
                .unwrap_or("")
                .to_string();
            SizeInBits::DynamicRef(reference)
        } else {
            SizeInBits::Fixed(0)
        }
    } else {
        SizeInBits::Fixed(0)
    };
    Ok((ParameterTypeKind::Binary, DataEncoding::Binary { size }))
}

fn load_time_type(node: &XmlNode, absolute: bool) -> XtceResult<(ParameterTypeKind, DataEncoding)> {
    let encoding_node = node
        .child("Encoding")
        .ok_or_else(|| XtceError::Malformed { position: 0, message: "time type missing Encoding".into() })?;
    let encoding = load_integer_encoding(encoding_node)?;
    let epoch = node
        .child("ReferenceTime")
        .and_then(|r| r.child("Epoch"))
        .map(|e| e.text.clone())
        .unwrap_or_else(|| "TAI".to_string());
    let units_per_second: f64 = node
        .child("ReferenceTime")
        .and_then(|r| r.attr("unitsPerSecond"))
        .and_then(|v| v.parse().ok())
        .unwrap_or(1.0);
    let calibrator = load_default_calibrator(node)?;
    let scale = TimeScale { epoch, units_per_second, calibrator };
    let kind = if absolute { ParameterTypeKind::AbsoluteTime(scale) } else { ParameterTypeKind::RelativeTime(scale) };
    Ok((kind, encoding))
}

fn load_parameters(node: &XmlNode, ts: &mut TypeSystem) -> XtceResult<()> {
    for child in node.children_named("Parameter") {
        let name = child.attr("name").ok_or_else(|| XtceError::Malformed { position: 0, message: "parameter missing name".into() })?.to_string();
        let type_name = child
            .attr("parameterTypeRef")
            .ok_or_else(|| XtceError::Malformed { position: 0, message: format!("parameter '{name}' missing parameterTypeRef") })?
            .to_string();
        let short_desc = child.attr("shortDescription").map(str::to_string);
        let long_desc = child.child("LongDescription").map(|d| d.text.clone());
        insert_unique(
            &mut ts.parameters,
            "Parameter",
            name.clone(),
            Parameter { name, type_name, short_desc, long_desc },
        )?;
    }
    Ok(())
}

fn load_containers(node: &XmlNode, ts: &mut TypeSystem) -> XtceResult<()> {
    for child in node.children_named("SequenceContainer") {
        let name = child.attr("name").ok_or_else(|| XtceError::Malformed { position: 0, message: "container missing name".into() })?.to_string();
        if name == ROOT_CONTAINER_NAME {
            return Err(XtceError::DuplicateName { kind: "SequenceContainer", name });
        }
        let abstract_ = child.attr("abstract").map(|v| v == "true").unwrap_or(false);

        let entries = child
            .child("EntryList")
            .map(|list| {
                list.children
                    .iter()
                    .filter_map(|entry| match entry.name.as_str() {
                        "ParameterRefEntry" => entry.attr("parameterRef").map(|r| ContainerEntry::Parameter(r.to_string())),
                        "ContainerRefEntry" => entry.attr("containerRef").map(|r| ContainerEntry::Container(r.to_string())),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let base = match child.child("BaseContainer") {
            Some(base_node) => {
                let base_name = base_node
                    .attr("containerRef")
                    .ok_or_else(|| XtceError::Malformed { position: 0, message: format!("container '{name}' BaseContainer missing containerRef") })?
                    .to_string();
                let restriction = match base_node.child("RestrictionCriteria") {
                    Some(rc) => Some(load_restriction(rc)?),
                    None => None,
                };
                Some(BaseContainer { base_name, restriction })
            }
            None => Some(BaseContainer { base_name: ROOT_CONTAINER_NAME.to_string(), restriction: None }),
        };

        ts.container_order.push(name.clone());
        insert_unique(&mut ts.containers, "SequenceContainer", name.clone(), SequenceContainer { name, abstract_, base, entries })?;
    }

    for name in &ts.container_order {
        let container = &ts.containers[name];
        if let Some(base) = &container.base {
            if base.base_name != ROOT_CONTAINER_NAME && !ts.containers.contains_key(&base.base_name) {
                return Err(XtceError::DanglingReference { kind: "SequenceContainer", name: base.base_name.clone() });
            }
            if base.base_name == ROOT_CONTAINER_NAME {
                ts.root_containers.push(container.name.clone());
            }
        }
    }
    Ok(())
}

/// A `RestrictionCriteria` element wraps exactly one of Comparison,
/// ComparisonList, or BooleanExpression (section 4.E / 4.F).
fn load_restriction(node: &XmlNode) -> XtceResult<MatchCriterion> {
    if let Some(cmp) = node.child("Comparison") {
        return Ok(MatchCriterion::Comparison(load_comparison(cmp)?));
    }
    if let Some(list) = node.child("ComparisonList") {
        let comparisons = list.children_named("Comparison").map(load_comparison).collect::<XtceResult<Vec<_>>>()?;
        return Ok(MatchCriterion::ComparisonList(comparisons));
    }
    if let Some(expr) = node.child("BooleanExpression") {
        return Ok(MatchCriterion::BooleanExpression(load_boolean_expr(expr)?));
    }
    Err(XtceError::Malformed { position: 0, message: "RestrictionCriteria has no recognized child".into() })
}

fn load_boolean_expr(node: &XmlNode) -> XtceResult<BooleanExpr> {
    if let Some(and_node) = node.child("ANDedConditions") {
        let items = and_node.children.iter().map(load_condition).collect::<XtceResult<Vec<_>>>()?;
        return Ok(BooleanExpr::And(items));
    }
    if let Some(or_node) = node.child("ORedConditions") {
        let items = or_node.children.iter().map(load_condition).collect::<XtceResult<Vec<_>>>()?;
        return Ok(BooleanExpr::Or(items));
    }
    load_condition(node)
}

fn load_condition(node: &XmlNode) -> XtceResult<BooleanExpr> {
    match node.name.as_str() {
        "Comparison" => Ok(BooleanExpr::Cond(load_comparison(node)?)),
        "ANDedConditions" | "ORedConditions" => load_boolean_expr(node),
        other => Err(XtceError::UnknownElement(other.to_string())),
    }
}

fn load_comparison(node: &XmlNode) -> XtceResult<Comparison> {
    let parameter = node
        .attr("parameterRef")
        .ok_or_else(|| XtceError::Malformed { position: 0, message: "Comparison missing parameterRef".into() })?
        .to_string();
    let operator = match node.attr("comparisonOperator").unwrap_or("==") {
        "==" => ComparisonOperator::Eq,
        "!=" => ComparisonOperator::Ne,
        "<" => ComparisonOperator::Lt,
        "<=" => ComparisonOperator::Le,
        ">" => ComparisonOperator::Gt,
        ">=" => ComparisonOperator::Ge,
        other => {
            return Err(XtceError::Malformed { position: 0, message: format!("unknown comparisonOperator '{other}'") })
        }
    };
    let raw_value = node.attr("value").unwrap_or("0");
    let value = if let Ok(i) = raw_value.parse::<i64>() {
        CriterionValue::Int(i)
    } else if let Ok(f) = raw_value.parse::<f64>() {
        CriterionValue::Float(f)
    } else {
        CriterionValue::Str(raw_value.to_string())
    };
    let use_calibrated = node.attr("useCalibratedValue").map(|v| v == "true").unwrap_or(false);
    Ok(Comparison { parameter, operator, value, use_calibrated })
}

fn validate(ts: &TypeSystem) -> XtceResult<()> {
    for parameter in ts.parameters.values() {
        if !ts.parameter_types.contains_key(&parameter.type_name) {
            return Err(XtceError::DanglingReference { kind: "ParameterType", name: parameter.type_name.clone() });
        }
    }
    for container in ts.containers.values() {
        for entry in &container.entries {
            match entry {
                ContainerEntry::Parameter(name) if !ts.parameters.contains_key(name) => {
                    return Err(XtceError::DanglingReference { kind: "Parameter", name: name.clone() })
                }
                ContainerEntry::Container(name) if !ts.containers.contains_key(name) => {
                    return Err(XtceError::DanglingReference { kind: "SequenceContainer", name: name.clone() })
                }
                _ => {}
            }
        }
    }

    let mut visiting = HashSet::new();
    let mut done = HashSet::new();
    for name in ts.containers.keys() {
        detect_cycle(ts, name, &mut visiting, &mut done)?;
    }
    Ok(())
}

fn detect_cycle<'a>(
    ts: &'a TypeSystem,
    name: &'a str,
    visiting: &mut HashSet<String>,
    done: &mut HashSet<String>,
) -> XtceResult<()> {
    if done.contains(name) {
        return Ok(());
    }
    if !visiting.insert(name.to_string()) {
        return Err(XtceError::InheritanceCycle(name.to_string()));
    }
    if let Some(container) = ts.containers.get(name) {
        if let Some(base) = &container.base {
            if base.base_name != name {
                detect_cycle(ts, &base.base_name, visiting, done)?;
            }
        }
    }
    visiting.remove(name);
    done.insert(name.to_string());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = r#"
        <SpaceSystem xmlns="http://www.omg.org/spec/XTCE/20180204" name="Demo">
          <TelemetryMetaData>
            <ParameterTypeSet>
              <IntegerParameterType name="U8Type">
                <IntegerDataEncoding sizeInBits="8" encoding="unsigned"/>
              </IntegerParameterType>
              <EnumeratedParameterType name="ModeType">
                <IntegerDataEncoding sizeInBits="8" encoding="unsigned"/>
                <EnumerationList>
                  <Enumeration value="0" label="SAFE"/>
                  <Enumeration value="1" label="NOMINAL"/>
                </EnumerationList>
              </EnumeratedParameterType>
            </ParameterTypeSet>
            <ParameterSet>
              <Parameter name="MODE" parameterTypeRef="ModeType"/>
              <Parameter name="COUNTER" parameterTypeRef="U8Type"/>
            </ParameterSet>
            <ContainerSet>
              <SequenceContainer name="Telemetry" abstract="true">
                <EntryList>
                  <ParameterRefEntry parameterRef="MODE"/>
                </EntryList>
              </SequenceContainer>
              <SequenceContainer name="NominalTelemetry">
                <EntryList>
                  <ParameterRefEntry parameterRef="COUNTER"/>
                </EntryList>
                <BaseContainer containerRef="Telemetry">
                  <RestrictionCriteria>
                    <Comparison parameterRef="MODE" value="1" comparisonOperator="=="/>
                  </RestrictionCriteria>
                </BaseContainer>
              </SequenceContainer>
            </ContainerSet>
          </TelemetryMetaData>
        </SpaceSystem>
    "#;

    #[test]
    fn loads_parameter_types_parameters_and_containers() {
        let loaded = load(SAMPLE.as_bytes()).unwrap();
        assert_eq!(loaded.space_system_name, "Demo");
        assert!(loaded.type_system.parameter_type("U8Type").is_some());
        assert!(loaded.type_system.parameter("COUNTER").is_some());
        assert!(loaded.type_system.container("NominalTelemetry").is_some());
    }

    #[test]
    fn loads_string_backed_enumerated_type() {
        let xml = r#"
            <SpaceSystem xmlns="http://www.omg.org/spec/XTCE/20180204" name="Demo">
              <TelemetryMetaData>
                <ParameterTypeSet>
                  <EnumeratedParameterType name="RelayType">
                    <StringDataEncoding encoding="UTF-8">
                      <SizeInBits><Fixed><FixedValue>24</FixedValue></Fixed></SizeInBits>
                    </StringDataEncoding>
                    <EnumerationList>
                      <Enumeration value="OFF" label="Relay Off"/>
                      <Enumeration value="ON" label="Relay On"/>
                    </EnumerationList>
                  </EnumeratedParameterType>
                </ParameterTypeSet>
              </TelemetryMetaData>
            </SpaceSystem>
        "#;
        let loaded = load(xml.as_bytes()).unwrap();
        let ptype = loaded.type_system.parameter_type("RelayType").unwrap();
        assert!(matches!(ptype.encoding, DataEncoding::String { .. }));
        let ParameterTypeKind::Enumerated { labels } = &ptype.kind else { panic!("expected Enumerated") };
        assert_eq!(labels[0].raw, EnumRaw::Str("OFF".into()));
        assert_eq!(labels[1].raw, EnumRaw::Str("ON".into()));
    }

    #[test]
    fn loads_float_backed_enumerated_type() {
        let xml = r#"
            <SpaceSystem xmlns="http://www.omg.org/spec/XTCE/20180204" name="Demo">
              <TelemetryMetaData>
                <ParameterTypeSet>
                  <EnumeratedParameterType name="ThresholdType">
                    <FloatDataEncoding sizeInBits="32" encoding="IEEE754_1985"/>
                    <EnumerationList>
                      <Enumeration value="0.5" label="LOW"/>
                      <Enumeration value="1.5" label="HIGH"/>
                    </EnumerationList>
                  </EnumeratedParameterType>
                </ParameterTypeSet>
              </TelemetryMetaData>
            </SpaceSystem>
        "#;
        let loaded = load(xml.as_bytes()).unwrap();
        let ptype = loaded.type_system.parameter_type("ThresholdType").unwrap();
        assert!(matches!(ptype.encoding, DataEncoding::Float { .. }));
        let ParameterTypeKind::Enumerated { labels } = &ptype.kind else { panic!("expected Enumerated") };
        assert_eq!(labels[0].raw, EnumRaw::Float(0.5));
        assert_eq!(labels[1].raw, EnumRaw::Float(1.5));
    }

    #[test]
    fn dangling_parameter_reference_is_rejected() {
        let xml = r#"
            <SpaceSystem xmlns="http://www.omg.org/spec/XTCE/20180204" name="Bad">
              <TelemetryMetaData>
                <ContainerSet>
                  <SequenceContainer name="Telemetry">
                    <EntryList>
                      <ParameterRefEntry parameterRef="MISSING"/>
                    </EntryList>
                  </SequenceContainer>
                </ContainerSet>
              </TelemetryMetaData>
            </SpaceSystem>
        "#;
        let err = load(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, XtceError::DanglingReference { .. }));
    }

    #[test]
    fn duplicate_parameter_name_is_rejected() {
        let xml = r#"
            <SpaceSystem xmlns="http://www.omg.org/spec/XTCE/20180204" name="Bad">
              <TelemetryMetaData>
                <ParameterTypeSet>
                  <IntegerParameterType name="U8Type">
                    <IntegerDataEncoding sizeInBits="8" encoding="unsigned"/>
                  </IntegerParameterType>
                </ParameterTypeSet>
                <ParameterSet>
                  <Parameter name="X" parameterTypeRef="U8Type"/>
                  <Parameter name="X" parameterTypeRef="U8Type"/>
                </ParameterSet>
              </TelemetryMetaData>
            </SpaceSystem>
        "#;
        let err = load(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, XtceError::DuplicateName { .. }));
    }

    #[test]
    fn container_inheritance_cycle_is_rejected() {
        let xml = r#"
            <SpaceSystem xmlns="http://www.omg.org/spec/XTCE/20180204" name="Bad">
              <TelemetryMetaData>
                <ContainerSet>
                  <SequenceContainer name="A">
                    <BaseContainer containerRef="B"/>
                  </SequenceContainer>
                  <SequenceContainer name="B">
                    <BaseContainer containerRef="A"/>
                  </SequenceContainer>
                </ContainerSet>
              </TelemetryMetaData>
            </SpaceSystem>
        "#;
        let err = load(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, XtceError::InheritanceCycle(_)));
    }
}
