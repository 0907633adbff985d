//! Data encodings: how to turn a bit range into a [`RawValue`] (component C).

use crate::bitcursor::{BitCursor, IntegerEncoding};
use crate::context::DecodedFields;
use crate::error::{PacketError, XtceError};
use crate::value::RawValue;

/// Supported IEEE-754 widths plus the mission-specific MIL-STD-1750A format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatEncoding {
    Ieee754_16,
    Ieee754_32,
    Ieee754_64,
    Mil1750a32,
}

impl FloatEncoding {
    pub fn bits(self) -> u32 {
        match self {
            FloatEncoding::Ieee754_16 => 16,
            FloatEncoding::Ieee754_32 | FloatEncoding::Mil1750a32 => 32,
            FloatEncoding::Ieee754_64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// How a string's length in bits is determined (section 4.C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringLength {
    Fixed { bits: u32 },
    Terminated { terminator: Vec<u8> },
    PrefixedBy { length_parameter: String },
}

/// How a binary or string field's bit size is determined when it is not fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeInBits {
    Fixed(u32),
    DynamicRef(String),
}

/// A declared wire encoding, owned by exactly one [`crate::ptype::ParameterType`].
#[derive(Debug, Clone, PartialEq)]
pub enum DataEncoding {
    Integer { bits: u32, encoding: IntegerEncoding },
    Float { encoding: FloatEncoding },
    String { charset: Charset, length: StringLength },
    Binary { size: SizeInBits },
}

/// What a decoded String/Binary field carries in addition to its [`RawValue`].
pub enum DecodedText {
    Text(String),
    Bytes(Vec<u8>),
}

impl DataEncoding {
    /// Invariant checks the loader runs once, at load time (section 3).
    pub fn validate(&self) -> Result<(), XtceError> {
        match self {
            DataEncoding::Integer { bits, encoding } => {
                if *bits == 0 || *bits > 64 {
                    return Err(XtceError::UnsupportedEncoding {
                        element: "IntegerDataEncoding".into(),
                        reason: format!("bit size {bits} outside 1..=64"),
                    });
                }
                if *encoding != IntegerEncoding::Unsigned && *bits < 2 {
                    return Err(XtceError::UnsupportedEncoding {
                        element: "IntegerDataEncoding".into(),
                        reason: "signed encodings require size >= 2".into(),
                    });
                }
                Ok(())
            }
            DataEncoding::Float { encoding } => match encoding {
                FloatEncoding::Ieee754_16 | FloatEncoding::Ieee754_32 | FloatEncoding::Ieee754_64 => Ok(()),
                FloatEncoding::Mil1750a32 => Ok(()),
            },
            DataEncoding::String { length, .. } => {
                if let StringLength::Fixed { bits } = length {
                    if *bits == 0 {
                        return Err(XtceError::UnsupportedEncoding {
                            element: "StringDataEncoding".into(),
                            reason: "fixed bit size must be >= 1".into(),
                        });
                    }
                }
                Ok(())
            }
            DataEncoding::Binary { size } => {
                if let SizeInBits::Fixed(bits) = size {
                    if *bits == 0 {
                        return Err(XtceError::UnsupportedEncoding {
                            element: "BinaryDataEncoding".into(),
                            reason: "fixed bit size must be >= 1".into(),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    /// Decodes one field at the cursor's current position, consulting
    /// `context` for dynamically-referenced sizes or prefix lengths.
    pub fn decode(
        &self,
        cursor: &mut BitCursor,
        context: &dyn DecodedFields,
    ) -> Result<(RawValue, Option<DecodedText>), PacketError> {
        match self {
            DataEncoding::Integer { bits, encoding } => {
                let raw = cursor.read_int(*bits as usize, *encoding)?;
                let value = if *encoding == IntegerEncoding::Unsigned {
                    RawValue::UInt(raw as u64)
                } else {
                    RawValue::Int(raw)
                };
                Ok((value, None))
            }
            DataEncoding::Float { encoding } => {
                let bits = cursor.read_uint(encoding.bits() as usize)?;
                let value = decode_float(*encoding, bits);
                Ok((RawValue::Float(value), None))
            }
            DataEncoding::String { charset, length } => decode_string(cursor, *charset, length, context),
            DataEncoding::Binary { size } => {
                let bits = resolve_size(size, context)?;
                let bytes = cursor.read_bytes(bits as usize)?;
                let text = DecodedText::Bytes(bytes.clone());
                Ok((RawValue::Bytes(bytes), Some(text)))
            }
        }
    }
}

fn resolve_size(size: &SizeInBits, context: &dyn DecodedFields) -> Result<u32, PacketError> {
    match size {
        SizeInBits::Fixed(bits) => Ok(*bits),
        SizeInBits::DynamicRef(name) => {
            let raw = context
                .raw(name)
                .ok_or_else(|| PacketError::UnresolvedReference(name.clone()))?;
            let value = raw
                .as_i64()
                .ok_or_else(|| PacketError::Malformed(format!("'{name}' is not an integer size reference")))?;
            if value < 0 {
                return Err(PacketError::Malformed(format!("negative dynamic size from '{name}'")));
            }
            Ok(value as u32)
        }
    }
}

fn decode_string(
    cursor: &mut BitCursor,
    charset: Charset,
    length: &StringLength,
    context: &dyn DecodedFields,
) -> Result<(RawValue, Option<DecodedText>), PacketError> {
    let bytes = match length {
        StringLength::Fixed { bits } => cursor.read_bytes(*bits as usize)?,
        StringLength::PrefixedBy { length_parameter } => {
            let raw = context
                .raw(length_parameter)
                .ok_or_else(|| PacketError::UnresolvedReference(length_parameter.clone()))?;
            let n_bytes = raw
                .as_i64()
                .ok_or_else(|| PacketError::Malformed(format!("'{length_parameter}' is not a length reference")))?;
            if n_bytes < 0 {
                return Err(PacketError::Malformed(format!("negative prefix length from '{length_parameter}'")));
            }
            cursor.read_bytes(n_bytes as usize * 8)?
        }
        StringLength::Terminated { terminator } => read_until_terminator(cursor, terminator)?,
    };

    let text = decode_charset(&bytes, charset)?;
    Ok((RawValue::Bytes(bytes), Some(DecodedText::Text(text))))
}

fn read_until_terminator(cursor: &mut BitCursor, terminator: &[u8]) -> Result<Vec<u8>, PacketError> {
    let mut out = Vec::new();
    loop {
        if cursor.remaining() < terminator.len() * 8 {
            return Err(PacketError::OutOfData {
                requested: terminator.len() * 8,
                remaining: cursor.remaining(),
            });
        }
        let probe_bit = cursor.position();
        let mut matched = true;
        for (i, &term_byte) in terminator.iter().enumerate() {
            let byte = cursor.peek_uint(probe_bit + i * 8, 8)? as u8;
            if byte != term_byte {
                matched = false;
                break;
            }
        }
        if matched {
            cursor.skip(terminator.len() * 8)?;
            return Ok(out);
        }
        out.push(cursor.read_uint(8)? as u8);
    }
}

fn decode_charset(bytes: &[u8], charset: Charset) -> Result<String, PacketError> {
    match charset {
        Charset::Utf8 => {
            String::from_utf8(bytes.to_vec()).map_err(|e| PacketError::Malformed(format!("invalid utf-8: {e}")))
        }
        Charset::Utf16Le | Charset::Utf16Be => {
            if bytes.len() % 2 != 0 {
                return Err(PacketError::Malformed("utf-16 string has an odd byte length".into()));
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| match charset {
                    Charset::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
                    _ => u16::from_be_bytes([pair[0], pair[1]]),
                })
                .collect();
            String::from_utf16(&units).map_err(|e| PacketError::Malformed(format!("invalid utf-16: {e}")))
        }
    }
}

fn decode_float(encoding: FloatEncoding, bits: u64) -> f64 {
    match encoding {
        FloatEncoding::Ieee754_16 => f16_to_f64(bits as u16),
        FloatEncoding::Ieee754_32 => f32::from_bits(bits as u32) as f64,
        FloatEncoding::Ieee754_64 => f64::from_bits(bits),
        FloatEncoding::Mil1750a32 => mil1750a_to_f64(bits as u32),
    }
}

/// IEEE-754 binary16 -> f64, faithful for denormals, infinities, and NaN.
fn f16_to_f64(bits: u16) -> f64 {
    let sign = u64::from((bits >> 15) & 0x1);
    let exponent = (bits >> 10) & 0x1F;
    let mantissa = u64::from(bits & 0x3FF);

    let value: f64 = if exponent == 0 {
        if mantissa == 0 {
            0.0
        } else {
            (mantissa as f64) * 2f64.powi(-24)
        }
    } else if exponent == 0x1F {
        if mantissa == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        (1.0 + (mantissa as f64) / 1024.0) * 2f64.powi(i32::from(exponent) - 15)
    };

    if sign == 1 {
        -value
    } else {
        value
    }
}

/// MIL-STD-1750A 32-bit float: 24-bit two's-complement mantissa in bits
/// [31..8], 8-bit two's-complement exponent in bits [7..0];
/// value = mantissa * 2^(exponent - 23).
fn mil1750a_to_f64(bits: u32) -> f64 {
    let mantissa_raw = (bits >> 8) & 0x00FF_FFFF;
    let mantissa = if mantissa_raw & 0x0080_0000 != 0 {
        (mantissa_raw as i32) - (1 << 24)
    } else {
        mantissa_raw as i32
    };

    let exponent_raw = (bits & 0xFF) as u8;
    let exponent = if exponent_raw & 0x80 != 0 {
        (exponent_raw as i32) - 256
    } else {
        exponent_raw as i32
    };

    (mantissa as f64) * 2f64.powi(exponent - 23)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::EmptyFields;

    #[test]
    fn decodes_unsigned_integer() {
        let encoding = DataEncoding::Integer { bits: 12, encoding: IntegerEncoding::Unsigned };
        let buf = [0x0B, 0x00];
        let mut cursor = BitCursor::new(&buf);
        let (raw, _) = encoding.decode(&mut cursor, &EmptyFields).unwrap();
        assert_eq!(raw, RawValue::UInt(11 << 4));
    }

    #[test]
    fn mil1750a_scenario_s6() {
        // Section 8, S6's worked example is maximal positive 24-bit mantissa
        // (0x7FFFFF = 2^23 - 1) with exponent *6*, decoding to just under
        // 2^6 (~63.9999999). The literal byte string the prose also gives,
        // `0x7FFFFF7F`, actually carries exponent byte 0x7F (127), not 6 --
        // see `decodes_the_literal_s6_mil1750a_vector` below for what that
        // byte string really decodes to. This test exercises the worked
        // example's intended exponent of 6 (0x7FFF_FF06) instead.
        let value = mil1750a_to_f64(0x7FFF_FF06);
        let expected = 8_388_607.0_f64 * 2f64.powi(6 - 23);
        assert!((value - 63.999_992_370_605_47).abs() < 1e-9);
        assert!((value - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn decodes_the_literal_s6_mil1750a_vector() {
        // The literal hex byte string section 8, S6 gives is
        // `0x7FFFFF7F`: mantissa bits 0x7FFFFF (8_388_607, same as the
        // worked example) but *exponent byte* 0x7F (127), not the 6 the
        // prose's "≈63.9999999" result depends on. Decoded as written, that
        // byte string is nowhere near 64 -- it's mantissa * 2^(127 - 23), a
        // number on the order of 8.39e6 * 2^104. Documented here rather than
        // silently decoding a different byte string than the one section 8
        // actually spells out.
        let value = mil1750a_to_f64(0x7FFF_FF7F);
        let expected = 8_388_607.0_f64 * 2f64.powi(127 - 23);
        assert_eq!(value, expected);
        assert!(value > 1.0e36);
    }

    #[test]
    fn mil1750a_negative_mantissa_near_extreme() {
        // Mantissa 0x800000 is the most negative 24-bit two's-complement value.
        let value = mil1750a_to_f64(0x8000_0000);
        assert_eq!(value, -1.0);
    }

    #[test]
    fn ieee754_denormal_and_inf() {
        assert_eq!(decode_float(FloatEncoding::Ieee754_32, 0), 0.0);
        assert!(decode_float(FloatEncoding::Ieee754_32, 0x7F80_0000).is_infinite());
        assert!(decode_float(FloatEncoding::Ieee754_32, 0x7FC0_0000).is_nan());
    }

    #[test]
    fn fixed_string_strips_nothing_but_decodes_utf8() {
        let encoding = DataEncoding::String {
            charset: Charset::Utf8,
            length: StringLength::Fixed { bits: 40 },
        };
        let buf = b"hello";
        let mut cursor = BitCursor::new(buf);
        let (raw, text) = encoding.decode(&mut cursor, &EmptyFields).unwrap();
        assert_eq!(raw, RawValue::Bytes(b"hello".to_vec()));
        match text {
            Some(DecodedText::Text(s)) => assert_eq!(s, "hello"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn terminated_string_consumes_but_excludes_terminator() {
        let encoding = DataEncoding::String {
            charset: Charset::Utf8,
            length: StringLength::Terminated { terminator: vec![0] },
        };
        let buf = b"hi\0trailing";
        let mut cursor = BitCursor::new(buf);
        let (_, text) = encoding.decode(&mut cursor, &EmptyFields).unwrap();
        match text {
            Some(DecodedText::Text(s)) => assert_eq!(s, "hi"),
            _ => panic!("expected text"),
        }
        assert_eq!(cursor.position(), 3 * 8);
    }
}
