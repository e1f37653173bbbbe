//! Native and raw tag values.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A numerator/denominator pair, as stored by EXIF (signed and unsigned) and XMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: i64,
    pub denominator: i64,
}

impl Rational {
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self { numerator, denominator }
    }

    /// Float value of the fraction. A zero denominator yields the numerator.
    pub fn to_f64(&self) -> f64 {
        if self.denominator == 0 {
            self.numerator as f64
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Rational {
    type Err = ();

    /// Parse `n/d` with optional signs and no surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s.split_once('/').ok_or(())?;
        if !is_integer_literal(num) || !is_integer_literal(den) {
            return Err(());
        }
        Ok(Rational::new(
            num.parse().map_err(|_| ())?,
            den.parse().map_err(|_| ())?,
        ))
    }
}

/// `[+-]?[0-9]+`
pub(crate) fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// The decoded, typed value of a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Rational(Rational),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    /// A wall-clock time with an optional UTC offset.
    Time(NaiveTime, Option<FixedOffset>),
    /// A date and time with an optional UTC offset.
    DateTime(NaiveDateTime, Option<FixedOffset>),
    /// The ordered values of a repeatable tag.
    List(Vec<Value>),
    /// XMP language alternative: `(language, text)` pairs in stored order.
    LangAlt(Vec<(String, String)>),
}

impl Value {
    /// A language alternative holding only the `x-default` entry.
    pub fn lang_default(text: impl Into<String>) -> Self {
        Value::LangAlt(vec![("x-default".to_string(), text.into())])
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_rational(&self) -> Option<Rational> {
        match self {
            Value::Rational(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Boolean(_) => "boolean",
            Value::Rational(_) => "rational",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(..) => "time",
            Value::DateTime(..) => "datetime",
            Value::List(_) => "list",
            Value::LangAlt(_) => "lang-alt",
        }
    }
}

/// `+HH:MM` rendering of an offset.
pub(crate) fn format_offset(offset: &FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("{sign}{:02}:{:02}", secs / 3600, (secs % 3600) / 60)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::Boolean(b) => f.write_str(if *b { "True" } else { "False" }),
            Value::Rational(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => f.write_str(s),
                Err(_) => {
                    let parts: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
                    f.write_str(&parts.join(" "))
                }
            },
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t, offset) => {
                write!(f, "{}", t.format("%H:%M:%S"))?;
                match offset {
                    Some(o) => f.write_str(&format_offset(o)),
                    None => Ok(()),
                }
            }
            Value::DateTime(dt, offset) => {
                write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))?;
                match offset {
                    Some(o) => f.write_str(&format_offset(o)),
                    None => Ok(()),
                }
            }
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
            Value::LangAlt(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(lang, text)| format!("lang=\"{lang}\" {text}"))
                    .collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Integer(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Rational> for Value {
    fn from(r: Rational) -> Self {
        Value::Rational(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t, None)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt, None)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// The on-the-wire representation of a tag value, as the backend presents it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// EXIF values and simple XMP properties.
    Text(String),
    /// IPTC: one entry per dataset occurrence.
    Datasets(Vec<Vec<u8>>),
    /// XMP bag, seq and alt items.
    Array(Vec<String>),
    /// XMP language alternative entries.
    LangAlt(Vec<(String, String)>),
}

impl RawValue {
    /// IPTC raw value from text components.
    pub fn datasets<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        RawValue::Datasets(items.into_iter().map(|s| s.as_ref().to_vec()).collect())
    }

    /// Number of stored components.
    pub fn len(&self) -> usize {
        match self {
            RawValue::Text(_) => 1,
            RawValue::Datasets(items) => items.len(),
            RawValue::Array(items) => items.len(),
            RawValue::LangAlt(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => f.write_str(s),
            RawValue::Datasets(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|d| String::from_utf8_lossy(d).into_owned())
                    .collect();
                write!(f, "[{}]", parts.join(", "))
            }
            RawValue::Array(items) => write!(f, "[{}]", items.join(", ")),
            RawValue::LangAlt(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|(lang, text)| format!("{lang}: {text}"))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_parse() {
        assert_eq!("1/60".parse::<Rational>(), Ok(Rational::new(1, 60)));
        assert_eq!("-7/3".parse::<Rational>(), Ok(Rational::new(-7, 3)));
        assert!("1.5/2".parse::<Rational>().is_err());
        assert!("1 / 2".parse::<Rational>().is_err());
        assert!("12".parse::<Rational>().is_err());
    }

    #[test]
    fn rational_zero_denominator_is_numerator() {
        assert_eq!(Rational::new(5, 0).to_f64(), 5.0);
        assert_eq!(Rational::new(1, 4).to_f64(), 0.25);
    }

    #[test]
    fn integer_literal() {
        assert!(is_integer_literal("23"));
        assert!(is_integer_literal("+5628"));
        assert!(is_integer_literal("-4"));
        assert!(!is_integer_literal("-"));
        assert!(!is_integer_literal("1E3"));
        assert!(!is_integer_literal("5,64"));
    }

    #[test]
    fn display_time_with_offset() {
        let t = NaiveTime::from_hms_opt(5, 3, 54).unwrap();
        let v = Value::Time(t, FixedOffset::west_opt(10 * 3600 + 30 * 60));
        assert_eq!(v.to_string(), "05:03:54-10:30");
    }

    #[test]
    fn vec_into_list() {
        let v: Value = vec!["a", "b"].into();
        assert_eq!(v, Value::List(vec![Value::from("a"), Value::from("b")]));
    }
}
