//! Serializes a [`TypeSystem`] back to an XTCE document (component K). A
//! structural mirror of the loader: every element the loader accepts, the
//! writer can produce, and nothing else.

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::bitcursor::IntegerEncoding;
use crate::calibration::{Calibrator, CalibratorSet, Extrapolation, Interpolation};
use crate::container::{ContainerEntry, TypeSystem, ROOT_CONTAINER_NAME};
use crate::criteria::{BooleanExpr, Comparison, ComparisonOperator, CriterionValue, MatchCriterion};
use crate::encoding::{Charset, DataEncoding, FloatEncoding, SizeInBits, StringLength};
use crate::error::XtceResult;
use crate::ptype::ParameterTypeKind;

use super::load::{LoadedDocument, NAMESPACE_2018};

pub fn write<W: Write>(doc: &LoadedDocument, sink: W) -> XtceResult<()> {
    let mut writer = Writer::new_with_indent(sink, b' ', 2);
    write_space_system(&mut writer, doc)?;
    Ok(())
}

fn write_space_system<W: Write>(writer: &mut Writer<W>, doc: &LoadedDocument) -> XtceResult<()> {
    let mut root = BytesStart::new("SpaceSystem");
    root.push_attribute(("xmlns", doc.namespace.as_str()));
    root.push_attribute(("name", doc.space_system_name.as_str()));
    writer.write_event(Event::Start(root)).map_err(crate::error::XtceError::Xml)?;

    writer.write_event(Event::Start(BytesStart::new("TelemetryMetaData"))).map_err(crate::error::XtceError::Xml)?;
    write_parameter_type_set(writer, &doc.type_system)?;
    write_parameter_set(writer, &doc.type_system)?;
    write_container_set(writer, &doc.type_system)?;
    writer.write_event(Event::End(BytesEnd::new("TelemetryMetaData"))).map_err(crate::error::XtceError::Xml)?;

    writer.write_event(Event::End(BytesEnd::new("SpaceSystem"))).map_err(crate::error::XtceError::Xml)?;
    Ok(())
}

fn start_with_attrs(name: &str, attrs: &[(&str, String)]) -> BytesStart<'static> {
    let mut el = BytesStart::new(name.to_string());
    for (k, v) in attrs {
        el.push_attribute((*k, v.as_str()));
    }
    el
}

fn write_parameter_type_set<W: Write>(writer: &mut Writer<W>, ts: &TypeSystem) -> XtceResult<()> {
    writer.write_event(Event::Start(BytesStart::new("ParameterTypeSet"))).map_err(crate::error::XtceError::Xml)?;

    let mut names: Vec<&String> = ts.parameter_types.keys().collect();
    names.sort();
    for name in names {
        let ptype = &ts.parameter_types[name];
        write_parameter_type(writer, name, ptype)?;
    }

    writer.write_event(Event::End(BytesEnd::new("ParameterTypeSet"))).map_err(crate::error::XtceError::Xml)?;
    Ok(())
}

fn write_integer_encoding<W: Write>(writer: &mut Writer<W>, bits: u32, encoding: IntegerEncoding) -> XtceResult<()> {
    let encoding_name = match encoding {
        IntegerEncoding::Unsigned => "unsigned",
        IntegerEncoding::TwosComplement => "twosComplement",
        IntegerEncoding::SignMagnitude => "signMagnitude",
        IntegerEncoding::OnesComplement => "onesComplement",
    };
    let el = start_with_attrs(
        "IntegerDataEncoding",
        &[("sizeInBits", bits.to_string()), ("encoding", encoding_name.to_string())],
    );
    writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
    Ok(())
}

fn write_float_encoding<W: Write>(writer: &mut Writer<W>, encoding: FloatEncoding) -> XtceResult<()> {
    let (bits, name_attr) = match encoding {
        FloatEncoding::Ieee754_16 => (16, "IEEE754_1985"),
        FloatEncoding::Ieee754_32 => (32, "IEEE754_1985"),
        FloatEncoding::Ieee754_64 => (64, "IEEE754_1985"),
        FloatEncoding::Mil1750a32 => (32, "MIL-1750A"),
    };
    let el = start_with_attrs("FloatDataEncoding", &[("sizeInBits", bits.to_string()), ("encoding", name_attr.to_string())]);
    writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
    Ok(())
}

fn write_string_encoding<W: Write>(writer: &mut Writer<W>, charset: Charset, length: &StringLength) -> XtceResult<()> {
    let charset_name = match charset {
        Charset::Utf8 => "UTF-8",
        Charset::Utf16Le => "UTF-16LE",
        Charset::Utf16Be => "UTF-16BE",
    };
    let enc_start = start_with_attrs("StringDataEncoding", &[("encoding", charset_name.to_string())]);
    writer.write_event(Event::Start(enc_start)).map_err(crate::error::XtceError::Xml)?;
    match length {
        StringLength::Fixed { bits } => {
            writer.write_event(Event::Start(BytesStart::new("SizeInBits"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Start(BytesStart::new("Fixed"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Start(BytesStart::new("FixedValue"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Text(BytesText::new(&bits.to_string()))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("FixedValue"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("Fixed"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("SizeInBits"))).map_err(crate::error::XtceError::Xml)?;
        }
        StringLength::PrefixedBy { length_parameter } => {
            writer.write_event(Event::Start(BytesStart::new("SizeInBits"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Start(BytesStart::new("DynamicValue"))).map_err(crate::error::XtceError::Xml)?;
            let el = start_with_attrs("ParameterInstanceRef", &[("parameterRef", length_parameter.clone())]);
            writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("DynamicValue"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("SizeInBits"))).map_err(crate::error::XtceError::Xml)?;
        }
        StringLength::Terminated { terminator } => {
            let hex: String = terminator.iter().map(|b| format!("{b:02X}")).collect();
            writer.write_event(Event::Start(BytesStart::new("Termination"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Text(BytesText::new(&hex))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("Termination"))).map_err(crate::error::XtceError::Xml)?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("StringDataEncoding"))).map_err(crate::error::XtceError::Xml)?;
    Ok(())
}

fn write_calibrator_set<W: Write>(writer: &mut Writer<W>, calibrator: &Option<CalibratorSet>) -> XtceResult<()> {
    let Some(set) = calibrator else { return Ok(()) };
    if let Some(default) = &set.default {
        writer.write_event(Event::Start(BytesStart::new("DefaultCalibrator"))).map_err(crate::error::XtceError::Xml)?;
        write_calibrator(writer, default)?;
        writer.write_event(Event::End(BytesEnd::new("DefaultCalibrator"))).map_err(crate::error::XtceError::Xml)?;
    }
    if !set.context.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("ContextCalibratorList"))).map_err(crate::error::XtceError::Xml)?;
        for ctx in &set.context {
            writer.write_event(Event::Start(BytesStart::new("ContextCalibrator"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Start(BytesStart::new("ContextMatch"))).map_err(crate::error::XtceError::Xml)?;
            write_match_criterion(writer, &ctx.criterion)?;
            writer.write_event(Event::End(BytesEnd::new("ContextMatch"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Start(BytesStart::new("Calibrator"))).map_err(crate::error::XtceError::Xml)?;
            write_calibrator(writer, &ctx.calibrator)?;
            writer.write_event(Event::End(BytesEnd::new("Calibrator"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("ContextCalibrator"))).map_err(crate::error::XtceError::Xml)?;
        }
        writer.write_event(Event::End(BytesEnd::new("ContextCalibratorList"))).map_err(crate::error::XtceError::Xml)?;
    }
    Ok(())
}

fn write_calibrator<W: Write>(writer: &mut Writer<W>, calibrator: &Calibrator) -> XtceResult<()> {
    match calibrator {
        Calibrator::Polynomial(coefficients) => {
            writer.write_event(Event::Start(BytesStart::new("PolynomialCalibrator"))).map_err(crate::error::XtceError::Xml)?;
            for (exponent, coefficient) in coefficients.iter().enumerate() {
                let term = start_with_attrs("Term", &[("exponent", exponent.to_string()), ("coefficient", coefficient.to_string())]);
                writer.write_event(Event::Empty(term)).map_err(crate::error::XtceError::Xml)?;
            }
            writer.write_event(Event::End(BytesEnd::new("PolynomialCalibrator"))).map_err(crate::error::XtceError::Xml)?;
        }
        Calibrator::Spline { points, interpolation, extrapolation } => {
            let interpolation_name = match interpolation {
                Interpolation::Linear => "linear",
                Interpolation::ZeroOrderHold => "zeroOrderHold",
            };
            let extrapolate_name = match extrapolation {
                Extrapolation::Extrapolate => "true",
                Extrapolation::Clamp => "clamp",
                Extrapolation::Error => "error",
            };
            let start =
                start_with_attrs("SplineCalibrator", &[("interpolation", interpolation_name.to_string()), ("extrapolate", extrapolate_name.to_string())]);
            writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;
            for point in points {
                let el = start_with_attrs("SplinePoint", &[("raw", point.x.to_string()), ("calibrated", point.y.to_string())]);
                writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
            }
            writer.write_event(Event::End(BytesEnd::new("SplineCalibrator"))).map_err(crate::error::XtceError::Xml)?;
        }
        Calibrator::DiscreteLookup { cases, default } => {
            let default_name = match default {
                crate::calibration::DiscreteDefault::PassThrough => "passThrough",
                crate::calibration::DiscreteDefault::Error => "error",
            };
            let start = start_with_attrs("DiscreteLookupCalibrator", &[("default", default_name.to_string())]);
            writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;
            for case in cases {
                let el = start_with_attrs("DiscreteLookup", &[("value", case.value.to_string())]);
                writer.write_event(Event::Start(el)).map_err(crate::error::XtceError::Xml)?;
                if let MatchCriterion::Comparison(cmp) = &case.criterion {
                    write_comparison(writer, cmp)?;
                }
                writer.write_event(Event::End(BytesEnd::new("DiscreteLookup"))).map_err(crate::error::XtceError::Xml)?;
            }
            writer.write_event(Event::End(BytesEnd::new("DiscreteLookupCalibrator"))).map_err(crate::error::XtceError::Xml)?;
        }
        Calibrator::EnumeratedLookup(_) => {
            // Modeled directly on ParameterTypeKind::Enumerated instead; not
            // produced as a standalone calibrator by this writer.
        }
    }
    Ok(())
}

fn write_parameter_type<W: Write>(writer: &mut Writer<W>, name: &str, ptype: &crate::ptype::ParameterType) -> XtceResult<()> {
    match &ptype.kind {
        ParameterTypeKind::Integer { calibrator } => {
            let start = start_with_attrs("IntegerParameterType", &[("name", name.to_string())]);
            writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;
            if let DataEncoding::Integer { bits, encoding } = &ptype.encoding {
                write_integer_encoding(writer, *bits, *encoding)?;
            }
            write_calibrator_set(writer, calibrator)?;
            writer.write_event(Event::End(BytesEnd::new("IntegerParameterType"))).map_err(crate::error::XtceError::Xml)?;
        }
        ParameterTypeKind::Float { calibrator } => {
            let start = start_with_attrs("FloatParameterType", &[("name", name.to_string())]);
            writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;
            if let DataEncoding::Float { encoding } = &ptype.encoding {
                write_float_encoding(writer, *encoding)?;
            }
            write_calibrator_set(writer, calibrator)?;
            writer.write_event(Event::End(BytesEnd::new("FloatParameterType"))).map_err(crate::error::XtceError::Xml)?;
        }
        ParameterTypeKind::Boolean { one_is, zero_is } => {
            let start = start_with_attrs(
                "BooleanParameterType",
                &[("name", name.to_string()), ("oneStringValue", one_is.clone()), ("zeroStringValue", zero_is.clone())],
            );
            writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;
            if let DataEncoding::Integer { bits, encoding } = &ptype.encoding {
                write_integer_encoding(writer, *bits, *encoding)?;
            }
            writer.write_event(Event::End(BytesEnd::new("BooleanParameterType"))).map_err(crate::error::XtceError::Xml)?;
        }
        ParameterTypeKind::Enumerated { labels } => {
            let start = start_with_attrs("EnumeratedParameterType", &[("name", name.to_string())]);
            writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;
            // Section 3: an Enumerated type's backing encoding is integer,
            // float, or string; emit whichever one this type actually
            // carries, mirroring IntegerParameterType/FloatParameterType/
            // StringParameterType's own child element.
            match &ptype.encoding {
                DataEncoding::Integer { bits, encoding } => write_integer_encoding(writer, *bits, *encoding)?,
                DataEncoding::Float { encoding } => write_float_encoding(writer, *encoding)?,
                DataEncoding::String { charset, length } => write_string_encoding(writer, *charset, length)?,
                DataEncoding::Binary { .. } => {}
            }
            writer.write_event(Event::Start(BytesStart::new("EnumerationList"))).map_err(crate::error::XtceError::Xml)?;
            for label in labels {
                let el = start_with_attrs("Enumeration", &[("value", label.raw.to_string()), ("label", label.label.clone())]);
                writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
            }
            writer.write_event(Event::End(BytesEnd::new("EnumerationList"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("EnumeratedParameterType"))).map_err(crate::error::XtceError::Xml)?;
        }
        ParameterTypeKind::String => {
            let start = start_with_attrs("StringParameterType", &[("name", name.to_string())]);
            writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;
            if let DataEncoding::String { charset, length } = &ptype.encoding {
                write_string_encoding(writer, *charset, length)?;
            }
            writer.write_event(Event::End(BytesEnd::new("StringParameterType"))).map_err(crate::error::XtceError::Xml)?;
        }
        ParameterTypeKind::Binary => {
            let start = start_with_attrs("BinaryParameterType", &[("name", name.to_string())]);
            writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;
            if let DataEncoding::Binary { size } = &ptype.encoding {
                writer.write_event(Event::Start(BytesStart::new("BinaryDataEncoding"))).map_err(crate::error::XtceError::Xml)?;
                writer.write_event(Event::Start(BytesStart::new("SizeInBits"))).map_err(crate::error::XtceError::Xml)?;
                match size {
                    SizeInBits::Fixed(bits) => {
                        writer.write_event(Event::Start(BytesStart::new("FixedValue"))).map_err(crate::error::XtceError::Xml)?;
                        writer.write_event(Event::Text(BytesText::new(&bits.to_string()))).map_err(crate::error::XtceError::Xml)?;
                        writer.write_event(Event::End(BytesEnd::new("FixedValue"))).map_err(crate::error::XtceError::Xml)?;
                    }
                    SizeInBits::DynamicRef(reference) => {
                        writer.write_event(Event::Start(BytesStart::new("DynamicValue"))).map_err(crate::error::XtceError::Xml)?;
                        let el = start_with_attrs("ParameterInstanceRef", &[("parameterRef", reference.clone())]);
                        writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
                        writer.write_event(Event::End(BytesEnd::new("DynamicValue"))).map_err(crate::error::XtceError::Xml)?;
                    }
                }
                writer.write_event(Event::End(BytesEnd::new("SizeInBits"))).map_err(crate::error::XtceError::Xml)?;
                writer.write_event(Event::End(BytesEnd::new("BinaryDataEncoding"))).map_err(crate::error::XtceError::Xml)?;
            }
            writer.write_event(Event::End(BytesEnd::new("BinaryParameterType"))).map_err(crate::error::XtceError::Xml)?;
        }
        ParameterTypeKind::AbsoluteTime(scale) | ParameterTypeKind::RelativeTime(scale) => {
            let tag = if matches!(ptype.kind, ParameterTypeKind::AbsoluteTime(_)) { "AbsoluteTimeParameterType" } else { "RelativeTimeParameterType" };
            let start = start_with_attrs(tag, &[("name", name.to_string())]);
            writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Start(BytesStart::new("Encoding"))).map_err(crate::error::XtceError::Xml)?;
            if let DataEncoding::Integer { bits, encoding } = &ptype.encoding {
                write_integer_encoding(writer, *bits, *encoding)?;
            }
            writer.write_event(Event::End(BytesEnd::new("Encoding"))).map_err(crate::error::XtceError::Xml)?;
            let ref_time = start_with_attrs("ReferenceTime", &[("unitsPerSecond", scale.units_per_second.to_string())]);
            writer.write_event(Event::Start(ref_time)).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Start(BytesStart::new("Epoch"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::Text(BytesText::new(&scale.epoch))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("Epoch"))).map_err(crate::error::XtceError::Xml)?;
            writer.write_event(Event::End(BytesEnd::new("ReferenceTime"))).map_err(crate::error::XtceError::Xml)?;
            write_calibrator_set(writer, &scale.calibrator)?;
            writer.write_event(Event::End(BytesEnd::new(tag))).map_err(crate::error::XtceError::Xml)?;
        }
    }
    Ok(())
}

fn write_parameter_set<W: Write>(writer: &mut Writer<W>, ts: &TypeSystem) -> XtceResult<()> {
    writer.write_event(Event::Start(BytesStart::new("ParameterSet"))).map_err(crate::error::XtceError::Xml)?;
    let mut names: Vec<&String> = ts.parameters.keys().collect();
    names.sort();
    for name in names {
        let parameter = &ts.parameters[name];
        let mut attrs = vec![("name", parameter.name.clone()), ("parameterTypeRef", parameter.type_name.clone())];
        if let Some(short) = &parameter.short_desc {
            attrs.push(("shortDescription", short.clone()));
        }
        let el = start_with_attrs("Parameter", &attrs);
        writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
    }
    writer.write_event(Event::End(BytesEnd::new("ParameterSet"))).map_err(crate::error::XtceError::Xml)?;
    Ok(())
}

fn write_container_set<W: Write>(writer: &mut Writer<W>, ts: &TypeSystem) -> XtceResult<()> {
    writer.write_event(Event::Start(BytesStart::new("ContainerSet"))).map_err(crate::error::XtceError::Xml)?;
    let mut names: Vec<&String> = ts.containers.keys().filter(|n| n.as_str() != ROOT_CONTAINER_NAME).collect();
    names.sort();
    for name in names {
        let container = &ts.containers[name];
        let attrs = vec![("name", container.name.clone()), ("abstract", container.abstract_.to_string())];
        let start = start_with_attrs("SequenceContainer", &attrs);
        writer.write_event(Event::Start(start)).map_err(crate::error::XtceError::Xml)?;

        writer.write_event(Event::Start(BytesStart::new("EntryList"))).map_err(crate::error::XtceError::Xml)?;
        for entry in &container.entries {
            match entry {
                ContainerEntry::Parameter(p) => {
                    let el = start_with_attrs("ParameterRefEntry", &[("parameterRef", p.clone())]);
                    writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
                }
                ContainerEntry::Container(c) => {
                    let el = start_with_attrs("ContainerRefEntry", &[("containerRef", c.clone())]);
                    writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new("EntryList"))).map_err(crate::error::XtceError::Xml)?;

        if let Some(base) = &container.base {
            if base.base_name != ROOT_CONTAINER_NAME {
                let el = start_with_attrs("BaseContainer", &[("containerRef", base.base_name.clone())]);
                match &base.restriction {
                    Some(criterion) => {
                        writer.write_event(Event::Start(el)).map_err(crate::error::XtceError::Xml)?;
                        writer.write_event(Event::Start(BytesStart::new("RestrictionCriteria"))).map_err(crate::error::XtceError::Xml)?;
                        write_match_criterion(writer, criterion)?;
                        writer.write_event(Event::End(BytesEnd::new("RestrictionCriteria"))).map_err(crate::error::XtceError::Xml)?;
                        writer.write_event(Event::End(BytesEnd::new("BaseContainer"))).map_err(crate::error::XtceError::Xml)?;
                    }
                    None => {
                        writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
                    }
                }
            }
        }

        writer.write_event(Event::End(BytesEnd::new("SequenceContainer"))).map_err(crate::error::XtceError::Xml)?;
    }
    writer.write_event(Event::End(BytesEnd::new("ContainerSet"))).map_err(crate::error::XtceError::Xml)?;
    Ok(())
}

fn write_match_criterion<W: Write>(writer: &mut Writer<W>, criterion: &MatchCriterion) -> XtceResult<()> {
    match criterion {
        MatchCriterion::Comparison(cmp) => write_comparison(writer, cmp)?,
        MatchCriterion::ComparisonList(list) => {
            writer.write_event(Event::Start(BytesStart::new("ComparisonList"))).map_err(crate::error::XtceError::Xml)?;
            for cmp in list {
                write_comparison(writer, cmp)?;
            }
            writer.write_event(Event::End(BytesEnd::new("ComparisonList"))).map_err(crate::error::XtceError::Xml)?;
        }
        MatchCriterion::BooleanExpression(expr) => {
            writer.write_event(Event::Start(BytesStart::new("BooleanExpression"))).map_err(crate::error::XtceError::Xml)?;
            write_boolean_expr(writer, expr)?;
            writer.write_event(Event::End(BytesEnd::new("BooleanExpression"))).map_err(crate::error::XtceError::Xml)?;
        }
    }
    Ok(())
}

fn write_boolean_expr<W: Write>(writer: &mut Writer<W>, expr: &BooleanExpr) -> XtceResult<()> {
    match expr {
        BooleanExpr::And(items) => {
            writer.write_event(Event::Start(BytesStart::new("ANDedConditions"))).map_err(crate::error::XtceError::Xml)?;
            for item in items {
                write_boolean_expr(writer, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new("ANDedConditions"))).map_err(crate::error::XtceError::Xml)?;
        }
        BooleanExpr::Or(items) => {
            writer.write_event(Event::Start(BytesStart::new("ORedConditions"))).map_err(crate::error::XtceError::Xml)?;
            for item in items {
                write_boolean_expr(writer, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new("ORedConditions"))).map_err(crate::error::XtceError::Xml)?;
        }
        BooleanExpr::Cond(cmp) => write_comparison(writer, cmp)?,
    }
    Ok(())
}

fn write_comparison<W: Write>(writer: &mut Writer<W>, cmp: &Comparison) -> XtceResult<()> {
    let operator_name = match cmp.operator {
        ComparisonOperator::Eq => "==",
        ComparisonOperator::Ne => "!=",
        ComparisonOperator::Lt => "<",
        ComparisonOperator::Le => "<=",
        ComparisonOperator::Gt => ">",
        ComparisonOperator::Ge => ">=",
    };
    let value = match &cmp.value {
        CriterionValue::Int(v) => v.to_string(),
        CriterionValue::Float(v) => v.to_string(),
        CriterionValue::Str(v) => v.clone(),
        CriterionValue::Bool(v) => v.to_string(),
    };
    let mut attrs = vec![
        ("parameterRef", cmp.parameter.clone()),
        ("value", value),
        ("comparisonOperator", operator_name.to_string()),
    ];
    if cmp.use_calibrated {
        attrs.push(("useCalibratedValue", "true".to_string()));
    }
    let el = start_with_attrs("Comparison", &attrs);
    writer.write_event(Event::Empty(el)).map_err(crate::error::XtceError::Xml)?;
    Ok(())
}

pub fn default_namespace() -> &'static str {
    NAMESPACE_2018
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::xtce::load::load;

    #[test]
    fn round_trips_a_simple_type_system() {
        let xml = r#"
            <SpaceSystem xmlns="http://www.omg.org/spec/XTCE/20180204" name="RoundTrip">
              <TelemetryMetaData>
                <ParameterTypeSet>
                  <IntegerParameterType name="U8Type">
                    <IntegerDataEncoding sizeInBits="8" encoding="unsigned"/>
                  </IntegerParameterType>
                </ParameterTypeSet>
                <ParameterSet>
                  <Parameter name="COUNTER" parameterTypeRef="U8Type"/>
                </ParameterSet>
                <ContainerSet>
                  <SequenceContainer name="Telemetry">
                    <EntryList>
                      <ParameterRefEntry parameterRef="COUNTER"/>
                    </EntryList>
                  </SequenceContainer>
                </ContainerSet>
              </TelemetryMetaData>
            </SpaceSystem>
        "#;
        let loaded = load(xml.as_bytes()).unwrap();

        let mut buf = Vec::new();
        write(&loaded, &mut buf).unwrap();

        let reloaded = load(buf.as_slice()).unwrap();
        assert_eq!(reloaded.type_system.parameter_types.len(), loaded.type_system.parameter_types.len());
        assert_eq!(reloaded.type_system.parameters.len(), loaded.type_system.parameters.len());
        assert_eq!(reloaded.type_system.containers.len(), loaded.type_system.containers.len());
        assert!(reloaded.type_system.container("Telemetry").is_some());
    }
}
