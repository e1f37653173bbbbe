use chrono::{NaiveDate, NaiveTime};

use super::{fixed_digits, parse_offset};
use crate::charset::Charset;
use crate::error::{Error, Result};
use crate::registry::IptcType;
use crate::value::{RawValue, Value, format_offset, is_integer_literal};

/// Shorts are stored as 16-bit big-endian binary and read back signed.
const SHORT_RANGE: std::ops::RangeInclusive<i64> = -32768..=32767;

pub(super) fn decode(ty: IptcType, repeatable: bool, raw: &RawValue, charset: Charset) -> Result<Value> {
    let RawValue::Datasets(datasets) = raw else {
        return Err(Error::conversion(raw, "IPTC datasets"));
    };
    if repeatable {
        let items = datasets
            .iter()
            .map(|d| decode_scalar(ty, d, charset))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Value::List(items));
    }
    match datasets.as_slice() {
        [single] => decode_scalar(ty, single, charset),
        _ => Err(Error::conversion(raw, format!("single {}", ty.name()))),
    }
}

pub(super) fn encode(ty: IptcType, value: &Value) -> Result<RawValue> {
    let datasets = match value {
        Value::List(items) => items
            .iter()
            .map(|v| encode_scalar(ty, v))
            .collect::<Result<Vec<_>>>()?,
        scalar => vec![encode_scalar(ty, scalar)?],
    };
    Ok(RawValue::Datasets(datasets))
}

fn as_str(ty: IptcType, bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::conversion(String::from_utf8_lossy(bytes), ty.name()))
}

fn decode_scalar(ty: IptcType, bytes: &[u8], charset: Charset) -> Result<Value> {
    match ty {
        IptcType::Short => {
            let s = as_str(ty, bytes)?;
            if !is_integer_literal(s) {
                return Err(Error::conversion(s, "Short"));
            }
            match s.parse::<i64>() {
                Ok(n) if SHORT_RANGE.contains(&n) => Ok(Value::Integer(n)),
                _ => Err(Error::conversion(s, "Short")),
            }
        }
        IptcType::String => charset.decode_text(bytes).map(Value::Text),
        IptcType::Date => {
            let s = as_str(ty, bytes)?;
            parse_date(s).map(Value::Date).ok_or_else(|| Error::conversion(s, "Date"))
        }
        IptcType::Time => {
            let s = as_str(ty, bytes)?;
            parse_time(s).ok_or_else(|| Error::conversion(s, "Time"))
        }
        IptcType::Undefined => Ok(Value::Bytes(bytes.to_vec())),
    }
}

fn encode_scalar(ty: IptcType, value: &Value) -> Result<Vec<u8>> {
    let wrong = || Error::conversion(value, ty.name());
    match ty {
        IptcType::Short => match value {
            Value::Integer(n) if SHORT_RANGE.contains(n) => Ok(n.to_string().into_bytes()),
            _ => Err(wrong()),
        },
        IptcType::String => match value {
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(wrong()),
        },
        IptcType::Date => match value {
            Value::Date(d) => Ok(d.format("%Y-%m-%d").to_string().into_bytes()),
            Value::DateTime(dt, _) => Ok(dt.date().format("%Y-%m-%d").to_string().into_bytes()),
            _ => Err(wrong()),
        },
        IptcType::Time => {
            let (time, offset) = match value {
                Value::Time(t, offset) => (*t, *offset),
                Value::DateTime(dt, offset) => (dt.time(), *offset),
                _ => return Err(wrong()),
            };
            let offset = offset.map(|o| format_offset(&o)).unwrap_or_else(|| "+00:00".to_string());
            Ok(format!("{}{offset}", time.format("%H:%M:%S")).into_bytes())
        }
        IptcType::Undefined => match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::List(_) | Value::LangAlt(_) => Err(wrong()),
            other => Ok(other.to_string().into_bytes()),
        },
    }
}

/// Exactly `YYYY-MM-DD`.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('-');
    let year = fixed_digits(parts.next()?, 4)?;
    let month = fixed_digits(parts.next()?, 2)?;
    let day = fixed_digits(parts.next()?, 2)?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

/// Exactly `HH:MM:SS±HH:MM`.
fn parse_time(s: &str) -> Option<Value> {
    if s.len() != 14 || !s.is_char_boundary(8) {
        return None;
    }
    let (clock, offset) = s.split_at(8);
    let mut parts = clock.split(':');
    let hour = fixed_digits(parts.next()?, 2)?;
    let minute = fixed_digits(parts.next()?, 2)?;
    let second = fixed_digits(parts.next()?, 2)?;
    if parts.next().is_some() || second > 59 {
        return None;
    }
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(Value::Time(time, Some(parse_offset(offset)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDateTime};

    fn raw(text: &str) -> RawValue {
        RawValue::datasets([text])
    }

    fn dec(ty: IptcType, text: &str) -> Result<Value> {
        decode(ty, false, &raw(text), Charset::Legacy)
    }

    fn enc(ty: IptcType, value: Value) -> Result<RawValue> {
        encode(ty, &value)
    }

    fn dt(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32, micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_micro_opt(hh, mm, ss, micro)
            .unwrap()
    }

    // ── Short ──

    #[test]
    fn short_decode() {
        assert_eq!(dec(IptcType::Short, "23").unwrap(), Value::Integer(23));
        assert_eq!(dec(IptcType::Short, "+5628").unwrap(), Value::Integer(5628));
        assert_eq!(dec(IptcType::Short, "-4").unwrap(), Value::Integer(-4));
        for bad in ["abc", "5,64", "47.0001", "1E3", "70000", "40000"] {
            assert!(matches!(dec(IptcType::Short, bad), Err(Error::ValueConversion { .. })), "{bad}");
        }
    }

    #[test]
    fn short_encode() {
        assert_eq!(enc(IptcType::Short, Value::Integer(123)).unwrap(), raw("123"));
        assert_eq!(enc(IptcType::Short, Value::Integer(-57)).unwrap(), raw("-57"));
        assert!(enc(IptcType::Short, Value::from("invalid")).is_err());
        assert!(enc(IptcType::Short, Value::Real(3.14)).is_err());
        assert!(enc(IptcType::Short, Value::Integer(32768)).is_err());
    }

    // ── String ──

    #[test]
    fn string_round_trip() {
        let text = "Some text with exotic chàräctérʐ.";
        assert_eq!(dec(IptcType::String, text).unwrap(), Value::from(text));
        assert_eq!(
            enc(IptcType::String, Value::from(text)).unwrap(),
            RawValue::Datasets(vec![b"Some text with exotic ch\xc3\xa0r\xc3\xa4ct\xc3\xa9r\xca\x90.".to_vec()])
        );
        assert!(enc(IptcType::String, Value::Integer(1)).is_err());
    }

    // ── Date ──

    #[test]
    fn date_decode() {
        assert_eq!(
            dec(IptcType::Date, "1999-10-13").unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1999, 10, 13).unwrap())
        );
        for bad in ["invalid", "11/10/1983", "-1000", "2009-02", "2009-10-32", "2009-02-24T22:12:54"] {
            assert!(dec(IptcType::Date, bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn date_encode() {
        let d = NaiveDate::from_ymd_opt(2009, 2, 4).unwrap();
        assert_eq!(enc(IptcType::Date, Value::Date(d)).unwrap(), raw("2009-02-04"));
        assert_eq!(
            enc(IptcType::Date, Value::DateTime(dt(1899, 12, 31, 23, 59, 59, 0), None)).unwrap(),
            raw("1899-12-31")
        );
        assert!(enc(IptcType::Date, Value::from("invalid")).is_err());
    }

    // ── Time ──

    #[test]
    fn time_decode() {
        let t = NaiveTime::from_hms_opt(5, 3, 54).unwrap();
        assert_eq!(
            dec(IptcType::Time, "05:03:54+00:00").unwrap(),
            Value::Time(t, FixedOffset::east_opt(0))
        );
        assert_eq!(
            dec(IptcType::Time, "05:03:54+06:00").unwrap(),
            Value::Time(t, FixedOffset::east_opt(6 * 3600))
        );
        assert_eq!(
            dec(IptcType::Time, "05:03:54-10:30").unwrap(),
            Value::Time(t, FixedOffset::west_opt(10 * 3600 + 30 * 60))
        );
        for bad in [
            "invalid",
            "23:12:42",
            "25:12:42+00:00",
            "21:77:42+00:00",
            "21:12:98+00:00",
            "081242+0000",
        ] {
            assert!(dec(IptcType::Time, bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn time_encode() {
        let t = NaiveTime::from_hms_micro_opt(10, 52, 4, 574).unwrap();
        assert_eq!(enc(IptcType::Time, Value::Time(t, None)).unwrap(), raw("10:52:04+00:00"));
        assert_eq!(
            enc(IptcType::Time, Value::Time(t, FixedOffset::east_opt(5 * 3600 + 30 * 60))).unwrap(),
            raw("10:52:04+05:30")
        );
        assert_eq!(
            enc(
                IptcType::Time,
                Value::DateTime(dt(2007, 2, 7, 10, 52, 4, 478), FixedOffset::west_opt(4 * 3600))
            )
            .unwrap(),
            raw("10:52:04-04:00")
        );
        assert!(enc(IptcType::Time, Value::from("invalid")).is_err());
    }

    // ── Undefined ──

    #[test]
    fn undefined_is_bytes() {
        let bytes = vec![0xff, 0x00, 0x8c, 0x31];
        let v = decode(IptcType::Undefined, false, &RawValue::Datasets(vec![bytes.clone()]), Charset::Utf8).unwrap();
        assert_eq!(v, Value::Bytes(bytes.clone()));
        assert_eq!(enc(IptcType::Undefined, v).unwrap(), RawValue::Datasets(vec![bytes]));
        assert_eq!(
            enc(IptcType::Undefined, Value::from("Some binary data.")).unwrap(),
            raw("Some binary data.")
        );
    }

    // ── Cardinality ──

    #[test]
    fn repeatable_decodes_to_list() {
        let v = decode(IptcType::String, true, &RawValue::datasets(["a", "b"]), Charset::Legacy).unwrap();
        assert_eq!(v, Value::from(vec!["a", "b"]));
        let v = decode(IptcType::String, true, &RawValue::Datasets(vec![]), Charset::Legacy).unwrap();
        assert_eq!(v, Value::List(vec![]));
    }

    #[test]
    fn single_requires_one_dataset() {
        assert!(decode(IptcType::String, false, &RawValue::datasets(["a", "b"]), Charset::Legacy).is_err());
        assert!(decode(IptcType::String, false, &RawValue::Text("a".into()), Charset::Legacy).is_err());
    }
}
