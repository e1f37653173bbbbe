use chrono::{FixedOffset, NaiveDate, NaiveTime, Timelike};

use super::{fixed_digits, parse_offset};
use crate::error::{Error, Result};
use crate::registry::{XmpScalar, XmpType};
use crate::value::{Rational, RawValue, Value, format_offset, is_integer_literal};

pub(super) fn decode(ty: XmpType, raw: &RawValue) -> Result<Value> {
    match (ty, raw) {
        (XmpType::Simple(scalar), RawValue::Text(text)) => decode_scalar(scalar, text),
        (XmpType::Bag(scalar) | XmpType::Seq(scalar) | XmpType::Alt(scalar), RawValue::Array(items)) => items
            .iter()
            .map(|item| decode_scalar(scalar, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        // A lone value stored where an array is declared.
        (XmpType::Bag(scalar) | XmpType::Seq(scalar) | XmpType::Alt(scalar), RawValue::Text(text)) => {
            Ok(Value::List(vec![decode_scalar(scalar, text)?]))
        }
        (XmpType::LangAlt, RawValue::LangAlt(entries)) => Ok(Value::LangAlt(entries.clone())),
        (XmpType::LangAlt, RawValue::Text(text)) => Ok(Value::lang_default(text.as_str())),
        _ => Err(Error::conversion(raw, ty)),
    }
}

/// Language alternatives are stored with `x-default` first; the other
/// entries keep their order.
pub(super) fn encode(ty: XmpType, value: &Value) -> Result<RawValue> {
    match (ty, value) {
        (XmpType::Simple(scalar), v) => encode_scalar(scalar, v).map(RawValue::Text),
        (XmpType::Bag(scalar) | XmpType::Seq(scalar) | XmpType::Alt(scalar), Value::List(items)) => items
            .iter()
            .map(|v| encode_scalar(scalar, v))
            .collect::<Result<Vec<_>>>()
            .map(RawValue::Array),
        (XmpType::LangAlt, Value::LangAlt(entries)) => {
            let (mut ordered, rest): (Vec<_>, Vec<_>) =
                entries.iter().cloned().partition(|(lang, _)| lang == "x-default");
            ordered.extend(rest);
            Ok(RawValue::LangAlt(ordered))
        }
        _ => Err(Error::conversion(value, ty)),
    }
}

fn decode_scalar(scalar: XmpScalar, text: &str) -> Result<Value> {
    let wrong = || Error::conversion(text, scalar.name());
    match scalar {
        XmpScalar::Integer => {
            if !is_integer_literal(text) {
                return Err(wrong());
            }
            text.parse().map(Value::Integer).map_err(|_| wrong())
        }
        XmpScalar::Real => match text.parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(Value::Real(x)),
            _ => Err(wrong()),
        },
        XmpScalar::Boolean => match text {
            "True" => Ok(Value::Boolean(true)),
            "False" => Ok(Value::Boolean(false)),
            _ => Err(wrong()),
        },
        XmpScalar::Rational => text.parse::<Rational>().map(Value::Rational).map_err(|_| wrong()),
        XmpScalar::Date => parse_date(text).ok_or_else(wrong),
        XmpScalar::Text
        | XmpScalar::Uri
        | XmpScalar::MimeType
        | XmpScalar::ProperName
        | XmpScalar::AgentName
        | XmpScalar::Locale => Ok(Value::Text(text.to_string())),
    }
}

fn encode_scalar(scalar: XmpScalar, value: &Value) -> Result<String> {
    let wrong = || Error::conversion(value, scalar.name());
    match (scalar, value) {
        (XmpScalar::Integer, Value::Integer(n)) => Ok(n.to_string()),
        (XmpScalar::Real, Value::Real(x)) if x.is_finite() => Ok(x.to_string()),
        (XmpScalar::Boolean, Value::Boolean(b)) => Ok(if *b { "True" } else { "False" }.to_string()),
        (XmpScalar::Rational, Value::Rational(r)) => Ok(r.to_string()),
        (XmpScalar::Date, Value::Date(d)) => Ok(d.format("%Y-%m-%d").to_string()),
        (XmpScalar::Date, Value::DateTime(dt, offset)) => {
            let mut out = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
            let nanos = dt.nanosecond() % 1_000_000_000;
            if nanos > 0 {
                let fraction = format!("{nanos:09}");
                out.push('.');
                out.push_str(fraction.trim_end_matches('0'));
            }
            out.push_str(&format_tzd(offset.as_ref()));
            Ok(out)
        }
        (
            XmpScalar::Text
            | XmpScalar::Uri
            | XmpScalar::MimeType
            | XmpScalar::ProperName
            | XmpScalar::AgentName
            | XmpScalar::Locale,
            Value::Text(s),
        ) => Ok(s.clone()),
        _ => Err(wrong()),
    }
}

fn format_tzd(offset: Option<&FixedOffset>) -> String {
    match offset {
        None => String::new(),
        Some(o) if o.local_minus_utc() == 0 => "Z".to_string(),
        Some(o) => format_offset(o),
    }
}

/// W3C-DTF: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, optionally followed by
/// `Thh:mm[:ss[.s+]]` and a `Z` or `±hh:mm` designator.
fn parse_date(text: &str) -> Option<Value> {
    let (date_part, time_part) = match text.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (text, None),
    };
    let mut fields = date_part.split('-');
    let year = fixed_digits(fields.next()?, 4)? as i32;
    let month = fields.next().map(|m| fixed_digits(m, 2)).unwrap_or(Some(1))?;
    let day = fields.next().map(|d| fixed_digits(d, 2)).unwrap_or(Some(1))?;
    if fields.next().is_some() {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let Some(time_part) = time_part else {
        return Some(Value::Date(date));
    };
    if date_part.len() != 10 {
        return None;
    }
    let (clock, offset) = split_tzd(time_part)?;
    Some(Value::DateTime(date.and_time(parse_clock(clock)?), offset))
}

fn split_tzd(time: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(clock) = time.strip_suffix('Z') {
        return Some((clock, FixedOffset::east_opt(0)));
    }
    match time.find(['+', '-']) {
        Some(idx) => Some((&time[..idx], Some(parse_offset(&time[idx..])?))),
        None => Some((time, None)),
    }
}

/// `hh:mm`, `hh:mm:ss` or `hh:mm:ss.s+`
fn parse_clock(clock: &str) -> Option<NaiveTime> {
    let (hms, fraction) = match clock.split_once('.') {
        Some((hms, f)) => (hms, Some(f)),
        None => (clock, None),
    };
    let mut fields = hms.split(':');
    let hour = fixed_digits(fields.next()?, 2)?;
    let minute = fixed_digits(fields.next()?, 2)?;
    let second = match fields.next() {
        Some(s) => fixed_digits(s, 2)?,
        None if fraction.is_none() => 0,
        None => return None,
    };
    if fields.next().is_some() {
        return None;
    }
    let nanos = match fraction {
        Some(f) if !f.is_empty() && f.len() <= 9 && f.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{f:0<9}").parse().ok()?
        }
        Some(_) => return None,
        None => 0,
    };
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    fn date_time(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    // ── Scalars ──

    #[test]
    fn booleans() {
        let ty = XmpType::Simple(XmpScalar::Boolean);
        assert_eq!(decode(ty, &text("True")).unwrap(), Value::Boolean(true));
        assert_eq!(decode(ty, &text("False")).unwrap(), Value::Boolean(false));
        assert!(decode(ty, &text("yes")).is_err());
        assert_eq!(encode(ty, &Value::Boolean(true)).unwrap(), text("True"));
    }

    #[test]
    fn integers_and_rationals() {
        assert_eq!(decode(XmpType::Simple(XmpScalar::Integer), &text("-12")).unwrap(), Value::Integer(-12));
        assert!(decode(XmpType::Simple(XmpScalar::Integer), &text("1.5")).is_err());
        assert_eq!(
            decode(XmpType::Simple(XmpScalar::Rational), &text("5/3")).unwrap(),
            Value::Rational(Rational::new(5, 3))
        );
    }

    #[test]
    fn reals_must_be_finite() {
        let ty = XmpType::Simple(XmpScalar::Real);
        assert_eq!(decode(ty, &text("2.5")).unwrap(), Value::Real(2.5));
        for bad in ["NaN", "inf", "-infinity", "1e999"] {
            assert!(decode(ty, &text(bad)).is_err(), "{bad}");
        }
        assert!(encode(ty, &Value::Real(f64::NAN)).is_err());
    }

    // ── Dates ──

    #[test]
    fn date_precisions() {
        let ty = XmpType::Simple(XmpScalar::Date);
        assert_eq!(
            decode(ty, &text("1999")).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap())
        );
        assert_eq!(
            decode(ty, &text("1999-10")).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1999, 10, 1).unwrap())
        );
        assert_eq!(
            decode(ty, &text("1999-10-13T05:03Z")).unwrap(),
            Value::DateTime(date_time("1999-10-13 05:03:00"), FixedOffset::east_opt(0))
        );
        assert_eq!(
            decode(ty, &text("1999-10-13T05:03:54.721-06:00")).unwrap(),
            Value::DateTime(date_time("1999-10-13 05:03:54.721"), FixedOffset::west_opt(6 * 3600))
        );
        for bad in ["99", "1999-13", "1999-10T05:03Z", "1999-10-13T25:00Z", "1999-10-13T05:03:54.Z"] {
            assert!(decode(ty, &text(bad)).is_err(), "{bad}");
        }
    }

    #[test]
    fn date_encoding() {
        let ty = XmpType::Simple(XmpScalar::Date);
        let v = Value::DateTime(date_time("2009-02-04 10:52:04.5"), FixedOffset::east_opt(0));
        assert_eq!(encode(ty, &v).unwrap(), text("2009-02-04T10:52:04.5Z"));
        let v = Value::DateTime(date_time("2009-02-04 10:52:04"), FixedOffset::east_opt(5 * 3600 + 1800));
        assert_eq!(encode(ty, &v).unwrap(), text("2009-02-04T10:52:04+05:30"));
        let v = Value::DateTime(date_time("2009-02-04 10:52:04"), None);
        assert_eq!(encode(ty, &v).unwrap(), text("2009-02-04T10:52:04"));
    }

    // ── Arrays ──

    #[test]
    fn bag_keeps_order() {
        let ty = XmpType::Bag(XmpScalar::Text);
        let raw = RawValue::Array(vec!["sky".into(), "blue".into(), "cloud".into()]);
        let v = decode(ty, &raw).unwrap();
        assert_eq!(v, Value::from(vec!["sky", "blue", "cloud"]));
        assert_eq!(encode(ty, &v).unwrap(), raw);
        assert!(encode(ty, &Value::from("sky")).is_err());
    }

    #[test]
    fn lang_alt_default_first() {
        let v = Value::LangAlt(vec![
            ("fr-FR".into(), "Bonjour".into()),
            ("x-default".into(), "Hello".into()),
            ("de-DE".into(), "Hallo".into()),
        ]);
        let raw = encode(XmpType::LangAlt, &v).unwrap();
        assert_eq!(
            raw,
            RawValue::LangAlt(vec![
                ("x-default".into(), "Hello".into()),
                ("fr-FR".into(), "Bonjour".into()),
                ("de-DE".into(), "Hallo".into()),
            ])
        );
        assert!(encode(XmpType::LangAlt, &Value::from("Hello")).is_err());
        assert_eq!(decode(XmpType::LangAlt, &text("Hi")).unwrap(), Value::lang_default("Hi"));
    }
}
