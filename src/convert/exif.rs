use crate::error::{Error, Result};
use crate::registry::ExifType;
use crate::value::{Rational, RawValue, Value, is_integer_literal};

pub(super) fn decode(ty: ExifType, repeatable: bool, raw: &RawValue) -> Result<Value> {
    let RawValue::Text(text) = raw else {
        return Err(Error::conversion(raw, "EXIF text"));
    };
    match ty {
        ExifType::Ascii => Ok(Value::Text(text.trim_end_matches('\0').to_string())),
        ExifType::Comment => Ok(Value::Text(comment_text(text).to_string())),
        ExifType::Undefined => decode_bytes(text).map(Value::Bytes),
        _ => {
            let items = text
                .split_whitespace()
                .map(|c| decode_component(ty, c))
                .collect::<Result<Vec<_>>>()?;
            if repeatable {
                return Ok(Value::List(items));
            }
            let mut items = items.into_iter();
            match (items.next(), items.next()) {
                (Some(single), None) => Ok(single),
                _ => Err(Error::conversion(text, format!("single {}", ty.name()))),
            }
        }
    }
}

pub(super) fn encode(ty: ExifType, value: &Value) -> Result<RawValue> {
    let wrong = || Error::conversion(value, ty.name());
    let text = match ty {
        ExifType::Ascii | ExifType::Comment => match value {
            Value::Text(s) => s.clone(),
            _ => return Err(wrong()),
        },
        ExifType::Undefined => match value {
            Value::Bytes(b) => encode_bytes(b),
            Value::Text(s) => encode_bytes(s.as_bytes()),
            _ => return Err(wrong()),
        },
        _ => match value {
            Value::List(items) => items
                .iter()
                .map(|v| encode_component(ty, v))
                .collect::<Result<Vec<_>>>()?
                .join(" "),
            scalar => encode_component(ty, scalar)?,
        },
    };
    Ok(RawValue::Text(text))
}

/// Text of a `UserComment` raw value, without its `charset=...` prefix.
pub(crate) fn comment_text(raw: &str) -> &str {
    match raw.strip_prefix("charset=") {
        Some(rest) => rest.split_once(' ').map(|(_, text)| text).unwrap_or(""),
        None => raw,
    }
}

/// Number of stored components of a numeric raw value.
pub(crate) fn component_count(ty: ExifType, raw: &RawValue) -> usize {
    match raw {
        RawValue::Text(text) if ty.is_numeric() => text.split_whitespace().count(),
        _ => 1,
    }
}

fn decode_bytes(text: &str) -> Result<Vec<u8>> {
    text.split_whitespace()
        .map(|c| c.parse::<u8>().map_err(|_| Error::conversion(text, "Undefined")))
        .collect()
}

fn encode_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(" ")
}

fn integer_range(ty: ExifType) -> Option<(i64, i64)> {
    Some(match ty {
        ExifType::Byte => (0, u8::MAX.into()),
        ExifType::Short => (0, u16::MAX.into()),
        ExifType::Long => (0, u32::MAX.into()),
        ExifType::SByte => (i8::MIN.into(), i8::MAX.into()),
        ExifType::SShort => (i16::MIN.into(), i16::MAX.into()),
        ExifType::SLong => (i32::MIN.into(), i32::MAX.into()),
        _ => return None,
    })
}

fn rational_in_range(ty: ExifType, r: &Rational) -> bool {
    let (lo, hi): (i64, i64) = match ty {
        ExifType::Rational => (0, u32::MAX.into()),
        _ => (i32::MIN.into(), i32::MAX.into()),
    };
    (lo..=hi).contains(&r.numerator) && (lo..=hi).contains(&r.denominator)
}

fn decode_component(ty: ExifType, c: &str) -> Result<Value> {
    let wrong = || Error::conversion(c, ty.name());
    if let Some((lo, hi)) = integer_range(ty) {
        if !is_integer_literal(c) {
            return Err(wrong());
        }
        return match c.parse::<i64>() {
            Ok(n) if (lo..=hi).contains(&n) => Ok(Value::Integer(n)),
            _ => Err(wrong()),
        };
    }
    match ty {
        ExifType::Rational | ExifType::SRational => {
            let r: Rational = c.parse().map_err(|_| wrong())?;
            if rational_in_range(ty, &r) {
                Ok(Value::Rational(r))
            } else {
                Err(wrong())
            }
        }
        ExifType::Float | ExifType::Double => c.parse::<f64>().map(Value::Real).map_err(|_| wrong()),
        _ => Err(wrong()),
    }
}

fn encode_component(ty: ExifType, value: &Value) -> Result<String> {
    let wrong = || Error::conversion(value, ty.name());
    if let Some((lo, hi)) = integer_range(ty) {
        return match value {
            Value::Integer(n) if (lo..=hi).contains(n) => Ok(n.to_string()),
            _ => Err(wrong()),
        };
    }
    match (ty, value) {
        (ExifType::Rational | ExifType::SRational, Value::Rational(r)) if rational_in_range(ty, r) => {
            Ok(r.to_string())
        }
        (ExifType::Float | ExifType::Double, Value::Real(x)) if x.is_finite() => Ok(x.to_string()),
        _ => Err(wrong()),
    }
}
