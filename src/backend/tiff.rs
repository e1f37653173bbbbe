//! EXIF block of a JPEG: IFD0 with its Exif, GPS and Interop sub-IFDs, and
//! IFD1 with the JPEG thumbnail.
//!
//! The TIFF structure is read and written by `kamadak-exif`; this module maps
//! its fields to `Exif.<group>.<name>` keys and exchanges values as plain
//! text (`1/60`, `48 50 51 48`, `charset="Ascii" text`). Sub-IFD and
//! thumbnail pointers are rebuilt by the writer and never exposed as tags.

use std::io::Cursor;

use exif::experimental::Writer;
use exif::{Context, Field, In, Rational, Reader, SRational, Tag, Value};
use log::{debug, warn};

use super::RawTag;
use crate::convert::comment_text;
use crate::error::{Error, Result};
use crate::registry::exif::{self as dict, ExifGroup};
use crate::registry::{ExifType, TagInfo, TagType};
use crate::value::RawValue;

const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_INTEROP_IFD: u16 = 0xA005;
const TAG_THUMBNAIL_OFFSET: u16 = 0x0201;
const TAG_THUMBNAIL_LENGTH: u16 = 0x0202;
const TAG_STRIP_OFFSETS: u16 = 0x0111;
const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
const TAG_USER_COMMENT: u16 = 0x9286;
const TAG_COMPRESSION: u16 = 0x0103;

const COMPRESSION_JPEG: u16 = 6;

const COMMENT_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const COMMENT_UNICODE: &[u8; 8] = b"UNICODE\0";
const COMMENT_JIS: &[u8; 8] = b"JIS\0\0\0\0\0";

#[derive(Debug, Clone)]
pub(crate) struct ExifBlock {
    little_endian: bool,
    fields: Vec<Field>,
    thumbnail: Option<Vec<u8>>,
}

impl ExifBlock {
    /// An empty little-endian block.
    pub(crate) fn new() -> Self {
        Self {
            little_endian: true,
            fields: Vec::new(),
            thumbnail: None,
        }
    }

    /// Parse the TIFF structure following the `Exif\0\0` header.
    pub(crate) fn parse(tiff: &[u8]) -> Result<Self> {
        let exif = Reader::new().read_raw(tiff.to_vec())?;
        let mut block = Self {
            little_endian: exif.little_endian(),
            fields: Vec::new(),
            thumbnail: None,
        };

        let mut thumb_offset = None;
        let mut thumb_length = None;
        for field in exif.fields() {
            let Some(group) = group_of(field) else {
                debug!("Skipping EXIF tag {} in IFD {}", field.tag, field.ifd_num);
                continue;
            };
            let id = field.tag.number();
            match (group, id) {
                (ExifGroup::Thumbnail, TAG_THUMBNAIL_OFFSET) => thumb_offset = field.value.get_uint(0),
                (ExifGroup::Thumbnail, TAG_THUMBNAIL_LENGTH) => thumb_length = field.value.get_uint(0),
                (ExifGroup::Thumbnail, TAG_STRIP_OFFSETS | TAG_STRIP_BYTE_COUNTS) => {
                    warn!("Dropping uncompressed EXIF thumbnail strips");
                }
                _ if is_managed(group, id) => {}
                _ if matches!(field.value, Value::Unknown(..)) => {
                    warn!("Skipping EXIF tag {} with an unknown format", field.tag);
                }
                _ => block.fields.push(field.clone()),
            }
        }

        if let (Some(offset), Some(length)) = (thumb_offset, thumb_length) {
            let (start, length) = (offset as usize, length as usize);
            match start.checked_add(length).and_then(|end| exif.buf().get(start..end)) {
                Some(data) => block.thumbnail = Some(data.to_vec()),
                None => warn!("EXIF thumbnail extends beyond the block, ignoring it"),
            }
        }

        debug!(
            "Parsed EXIF block: {} entries, thumbnail: {}",
            block.fields.len(),
            block.thumbnail.is_some()
        );
        Ok(block)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.thumbnail.is_none()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        ExifGroup::ALL
            .iter()
            .flat_map(|&group| {
                self.fields
                    .iter()
                    .filter(move |f| group_of(f) == Some(group))
                    .map(move |f| dict::key_for(group, f.tag.number()))
            })
            .collect()
    }

    pub(crate) fn get(&self, key: &str) -> Option<RawTag> {
        let (group, id) = dict::locate(key)?;
        let field = self.field(group, id)?;
        let hint = value_type(&field.value)
            .map(|ty| TagInfo::new(TagType::Exif(ty), ty.is_numeric() && component_count(&field.value) > 1));
        Some(RawTag {
            key: key.to_string(),
            raw: RawValue::Text(self.value_text(group, field)),
            hint,
        })
    }

    pub(crate) fn set(&mut self, key: &str, raw: &RawValue) -> Result<()> {
        let (group, id) = dict::locate(key).ok_or_else(|| Error::invalid_key(key, "unknown EXIF tag"))?;
        if is_managed(group, id) {
            return Err(Error::invalid_key(key, "pointer tags are managed by the EXIF codec"));
        }
        let RawValue::Text(text) = raw else {
            return Err(Error::conversion(raw, "EXIF text"));
        };
        let (tag, ifd_num) = location(group, id);
        let existing = self.fields.iter().position(|f| f.tag == tag && f.ifd_num == ifd_num);
        let declared = dict::by_id(group, id).map(|d| d.ty);
        let ty = match (declared, existing) {
            (Some(ExifType::Comment), _) => ExifType::Comment,
            (_, Some(idx)) => value_type(&self.fields[idx].value).unwrap_or(ExifType::Undefined),
            (Some(ty), None) => ty,
            (None, None) => ExifType::Undefined,
        };
        let field = Field {
            tag,
            ifd_num,
            value: encode_value(ty, text, self.little_endian)?,
        };
        match existing {
            Some(idx) => self.fields[idx] = field,
            None => self.fields.push(field),
        }
        Ok(())
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        let Some((group, id)) = dict::locate(key) else {
            return false;
        };
        let (tag, ifd_num) = location(group, id);
        let before = self.fields.len();
        self.fields.retain(|f| f.tag != tag || f.ifd_num != ifd_num);
        self.fields.len() != before
    }

    pub(crate) fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    /// Replace the IFD1 thumbnail with a JPEG image, or drop it together with
    /// the other IFD1 tags.
    pub(crate) fn set_thumbnail(&mut self, data: Option<Vec<u8>>) {
        let (compression, ifd_num) = location(ExifGroup::Thumbnail, TAG_COMPRESSION);
        match data {
            Some(data) => {
                self.fields.retain(|f| f.tag != compression || f.ifd_num != ifd_num);
                self.fields.push(Field {
                    tag: compression,
                    ifd_num,
                    value: Value::Short(vec![COMPRESSION_JPEG]),
                });
                self.thumbnail = Some(data);
            }
            None => {
                self.fields.retain(|f| group_of(f) != Some(ExifGroup::Thumbnail));
                self.thumbnail = None;
            }
        }
    }

    /// Serialize as a complete TIFF structure.
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        for field in &self.fields {
            writer.push_field(field);
        }
        if let Some(thumbnail) = &self.thumbnail {
            writer.set_jpeg(thumbnail, In::THUMBNAIL);
        }
        let mut out = Cursor::new(Vec::new());
        writer.write(&mut out, self.little_endian)?;
        Ok(out.into_inner())
    }

    fn field(&self, group: ExifGroup, id: u16) -> Option<&Field> {
        let (tag, ifd_num) = location(group, id);
        self.fields.iter().find(|f| f.tag == tag && f.ifd_num == ifd_num)
    }

    fn value_text(&self, group: ExifGroup, field: &Field) -> String {
        fn join<T: ToString>(values: &[T]) -> String {
            values.iter().map(T::to_string).collect::<Vec<_>>().join(" ")
        }
        match &field.value {
            Value::Ascii(strings) => strings
                .first()
                .map(|s| String::from_utf8_lossy(s).trim_end_matches('\0').to_string())
                .unwrap_or_default(),
            Value::Undefined(data, _) if group == ExifGroup::Photo && field.tag.number() == TAG_USER_COMMENT => {
                read_comment(data, self.little_endian)
            }
            Value::Byte(data) | Value::Undefined(data, _) => join(data),
            Value::SByte(data) => join(data),
            Value::Short(data) => join(data),
            Value::SShort(data) => join(data),
            Value::Long(data) => join(data),
            Value::SLong(data) => join(data),
            Value::Rational(data) => data
                .iter()
                .map(|r| format!("{}/{}", r.num, r.denom))
                .collect::<Vec<_>>()
                .join(" "),
            Value::SRational(data) => data
                .iter()
                .map(|r| format!("{}/{}", r.num, r.denom))
                .collect::<Vec<_>>()
                .join(" "),
            Value::Float(data) => join(data),
            Value::Double(data) => join(data),
            _ => String::new(),
        }
    }
}

/// Key group of a field, or `None` for IFDs this model does not expose.
fn group_of(field: &Field) -> Option<ExifGroup> {
    match (field.tag.context(), field.ifd_num) {
        (Context::Tiff, In::PRIMARY) => Some(ExifGroup::Image),
        (Context::Exif, In::PRIMARY) => Some(ExifGroup::Photo),
        (Context::Gps, In::PRIMARY) => Some(ExifGroup::GpsInfo),
        (Context::Interop, In::PRIMARY) => Some(ExifGroup::Iop),
        (Context::Tiff, In::THUMBNAIL) => Some(ExifGroup::Thumbnail),
        _ => None,
    }
}

fn location(group: ExifGroup, id: u16) -> (Tag, In) {
    match group {
        ExifGroup::Image => (Tag(Context::Tiff, id), In::PRIMARY),
        ExifGroup::Photo => (Tag(Context::Exif, id), In::PRIMARY),
        ExifGroup::GpsInfo => (Tag(Context::Gps, id), In::PRIMARY),
        ExifGroup::Iop => (Tag(Context::Interop, id), In::PRIMARY),
        ExifGroup::Thumbnail => (Tag(Context::Tiff, id), In::THUMBNAIL),
    }
}

fn is_managed(group: ExifGroup, id: u16) -> bool {
    match group {
        ExifGroup::Image => matches!(id, TAG_EXIF_IFD | TAG_GPS_IFD),
        ExifGroup::Photo => id == TAG_INTEROP_IFD,
        ExifGroup::Thumbnail => matches!(
            id,
            TAG_THUMBNAIL_OFFSET | TAG_THUMBNAIL_LENGTH | TAG_STRIP_OFFSETS | TAG_STRIP_BYTE_COUNTS
        ),
        _ => false,
    }
}

fn value_type(value: &Value) -> Option<ExifType> {
    Some(match value {
        Value::Byte(_) => ExifType::Byte,
        Value::Ascii(_) => ExifType::Ascii,
        Value::Short(_) => ExifType::Short,
        Value::Long(_) => ExifType::Long,
        Value::Rational(_) => ExifType::Rational,
        Value::SByte(_) => ExifType::SByte,
        Value::Undefined(..) => ExifType::Undefined,
        Value::SShort(_) => ExifType::SShort,
        Value::SLong(_) => ExifType::SLong,
        Value::SRational(_) => ExifType::SRational,
        Value::Float(_) => ExifType::Float,
        Value::Double(_) => ExifType::Double,
        _ => return None,
    })
}

fn component_count(value: &Value) -> usize {
    match value {
        Value::Byte(v) | Value::Undefined(v, _) => v.len(),
        Value::Ascii(v) => v.len(),
        Value::Short(v) => v.len(),
        Value::Long(v) => v.len(),
        Value::Rational(v) => v.len(),
        Value::SByte(v) => v.len(),
        Value::SShort(v) => v.len(),
        Value::SLong(v) => v.len(),
        Value::SRational(v) => v.len(),
        Value::Float(v) => v.len(),
        Value::Double(v) => v.len(),
        _ => 0,
    }
}

fn read_comment(data: &[u8], little_endian: bool) -> String {
    if data.len() < 8 {
        return String::from_utf8_lossy(data).trim_end_matches('\0').to_string();
    }
    let (code, body) = data.split_at(8);
    let (charset, text) = if code == COMMENT_ASCII {
        ("Ascii", String::from_utf8_lossy(body).into_owned())
    } else if code == COMMENT_UNICODE {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|c| {
                let pair = [c[0], c[1]];
                if little_endian { u16::from_le_bytes(pair) } else { u16::from_be_bytes(pair) }
            })
            .collect();
        ("Unicode", String::from_utf16_lossy(&units))
    } else if code == COMMENT_JIS {
        ("Jis", String::from_utf8_lossy(body).into_owned())
    } else {
        ("Undefined", String::from_utf8_lossy(body).into_owned())
    };
    format!("charset=\"{charset}\" {}", text.trim_end_matches('\0'))
}

fn encode_value(ty: ExifType, text: &str, little_endian: bool) -> Result<Value> {
    let wrong = || Error::conversion(text, ty.name());
    fn parse_all<T: std::str::FromStr>(text: &str, wrong: impl Fn() -> Error) -> Result<Vec<T>> {
        text.split_whitespace().map(|c| c.parse().map_err(|_| wrong())).collect()
    }
    fn fraction<N: std::str::FromStr>(c: &str) -> Option<(N, N)> {
        let (n, d) = c.split_once('/')?;
        Some((n.parse().ok()?, d.parse().ok()?))
    }

    Ok(match ty {
        ExifType::Ascii => Value::Ascii(vec![text.as_bytes().to_vec()]),
        ExifType::Comment => {
            let text = comment_text(text);
            let mut data = Vec::new();
            if text.is_ascii() {
                data.extend_from_slice(COMMENT_ASCII);
                data.extend_from_slice(text.as_bytes());
            } else {
                data.extend_from_slice(COMMENT_UNICODE);
                for unit in text.encode_utf16() {
                    let bytes = if little_endian { unit.to_le_bytes() } else { unit.to_be_bytes() };
                    data.extend_from_slice(&bytes);
                }
            }
            Value::Undefined(data, 0)
        }
        ExifType::Byte => Value::Byte(parse_all(text, wrong)?),
        ExifType::Undefined => Value::Undefined(parse_all(text, wrong)?, 0),
        ExifType::SByte => Value::SByte(parse_all(text, wrong)?),
        ExifType::Short => Value::Short(parse_all(text, wrong)?),
        ExifType::SShort => Value::SShort(parse_all(text, wrong)?),
        ExifType::Long => Value::Long(parse_all(text, wrong)?),
        ExifType::SLong => Value::SLong(parse_all(text, wrong)?),
        ExifType::Rational => Value::Rational(
            text.split_whitespace()
                .map(|c| fraction(c).map(|(num, denom)| Rational { num, denom }).ok_or_else(wrong))
                .collect::<Result<_>>()?,
        ),
        ExifType::SRational => Value::SRational(
            text.split_whitespace()
                .map(|c| fraction(c).map(|(num, denom)| SRational { num, denom }).ok_or_else(wrong))
                .collect::<Result<_>>()?,
        ),
        ExifType::Float => Value::Float(parse_all(text, wrong)?),
        ExifType::Double => Value::Double(parse_all(text, wrong)?),
    })
}
