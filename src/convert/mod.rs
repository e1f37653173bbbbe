//! Raw ⇄ native conversion, one submodule per family.
//!
//! Converters are pure: they see the declared type and the value and nothing
//! else. Cardinality against the registry is enforced by [`Tag`](crate::Tag)
//! before a value reaches `encode`.

mod exif;
mod iptc;
mod xmp;

use chrono::FixedOffset;

use crate::charset::Charset;
use crate::error::Result;
use crate::registry::{TagInfo, TagType};
use crate::value::{RawValue, Value};

pub(crate) use exif::{comment_text, component_count};

pub(crate) fn decode(info: &TagInfo, raw: &RawValue, charset: Charset) -> Result<Value> {
    match info.tag_type {
        TagType::Exif(ty) => exif::decode(ty, info.repeatable, raw),
        TagType::Iptc(ty) => iptc::decode(ty, info.repeatable, raw, charset),
        TagType::Xmp(ty) => xmp::decode(ty, raw),
    }
}

pub(crate) fn encode(info: &TagInfo, value: &Value) -> Result<RawValue> {
    match info.tag_type {
        TagType::Exif(ty) => exif::encode(ty, value),
        TagType::Iptc(ty) => iptc::encode(ty, value),
        TagType::Xmp(ty) => xmp::encode(ty, value),
    }
}

/// Exactly `len` ASCII digits.
fn fixed_digits(s: &str, len: usize) -> Option<u32> {
    if s.len() != len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `±HH:MM`
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let sign = match s.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let (hh, mm) = s[1..].split_once(':')?;
    let hours = fixed_digits(hh, 2)?;
    let minutes = fixed_digits(mm, 2)?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    let secs = (hours * 3600 + minutes * 60) as i32;
    FixedOffset::east_opt(sign * secs)
}
