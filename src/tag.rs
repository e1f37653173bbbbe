//! A single metadata tag: key, declared type, raw storage form and native value.

use std::fmt;

use log::debug;

use crate::backend::RawTag;
use crate::charset::Charset;
use crate::convert;
use crate::error::{Error, Result};
use crate::key::{Family, split_key};
use crate::registry::{self, TagInfo, TagType, XmpType};
use crate::value::{RawValue, Value};

/// A typed metadata tag.
///
/// The raw and native values are kept in step: every successful mutation
/// updates both, a failed one leaves both untouched.
///
/// ```rust
/// use imgmeta::{Tag, Value};
///
/// let mut tag = Tag::with_value("Iptc.Application2.Keywords", vec!["sky", "sea"]).unwrap();
/// assert!(tag.is_repeatable());
///
/// // A single value is refused for a repeatable tag.
/// assert!(tag.set_value("sun").is_err());
/// assert_eq!(tag.value(), Some(&Value::from(vec!["sky", "sea"])));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    key: String,
    info: TagInfo,
    raw: Option<RawValue>,
    value: Option<Value>,
    charset: Charset,
}

impl Tag {
    /// An unset tag. Unlisted keys get their family's default type.
    pub fn new(key: &str) -> Result<Self> {
        let info = registry::resolve(key)?;
        Ok(Self {
            key: key.to_string(),
            info,
            raw: None,
            value: None,
            charset: Charset::default(),
        })
    }

    pub fn with_value(key: &str, value: impl Into<Value>) -> Result<Self> {
        let mut tag = Self::new(key)?;
        tag.set_value(value)?;
        Ok(tag)
    }

    /// Materialize a tag read from storage.
    ///
    /// The registry takes precedence over the backend's storage hint. A
    /// stored value with more components than a single tag can hold is read
    /// as repeatable rather than rejected.
    pub fn from_raw(raw_tag: RawTag, charset: Charset) -> Result<Self> {
        let RawTag { key, raw, hint } = raw_tag;
        let parts = split_key(&key)?;
        let mut info = registry::lookup(&key)
            .or(hint)
            .unwrap_or_else(|| TagInfo::default_for(parts.family));
        if !info.repeatable && stored_components(&info, &raw) > 1 {
            debug!("{key}: {} stored components, reading as repeatable", raw.len());
            info.repeatable = true;
        }
        let value = convert::decode(&info, &raw, charset)?;
        Ok(Self {
            key,
            info,
            raw: Some(raw),
            value: Some(value),
            charset,
        })
    }

    /// Build a tag from command-line text.
    ///
    /// Repeatable IPTC and XMP values are separated by `;`. Language
    /// alternatives get the `x-default` language. EXIF text is the raw form
    /// (`1/60`, `48 50 51 48`, ...).
    pub fn parse(key: &str, text: &str) -> Result<Self> {
        let mut tag = Self::new(key)?;
        let split = || text.split(';').map(str::trim).map(str::to_string);
        let raw = match tag.info.tag_type {
            TagType::Exif(_) => RawValue::Text(text.to_string()),
            TagType::Iptc(_) if tag.info.repeatable => RawValue::datasets(split()),
            TagType::Iptc(_) => RawValue::datasets([text]),
            TagType::Xmp(XmpType::LangAlt) => RawValue::LangAlt(vec![("x-default".to_string(), text.to_string())]),
            TagType::Xmp(ty) if ty.is_array() => RawValue::Array(split().collect()),
            TagType::Xmp(_) => RawValue::Text(text.to_string()),
        };
        tag.set_raw_value(raw)?;
        Ok(tag)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn family(&self) -> Family {
        self.info.tag_type.family()
    }

    /// Last component of the key.
    pub fn name(&self) -> &str {
        self.key.rsplit('.').next().unwrap_or(&self.key)
    }

    pub fn info(&self) -> TagInfo {
        self.info
    }

    pub fn tag_type(&self) -> TagType {
        self.info.tag_type
    }

    pub fn is_repeatable(&self) -> bool {
        self.info.repeatable
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn raw_value(&self) -> Option<&RawValue> {
        self.raw.as_ref()
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Replace the native value, re-encoding the raw form.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_cardinality(&value)?;
        let raw = self.encode(&value)?;
        self.raw = Some(raw);
        self.value = Some(value);
        Ok(())
    }

    /// Replace the raw value, decoding the native form.
    pub fn set_raw_value(&mut self, raw: RawValue) -> Result<()> {
        let value = self.decode(&raw)?;
        self.raw = Some(raw);
        self.value = Some(value);
        Ok(())
    }

    /// Decode a raw value as this tag would, without changing it.
    pub fn decode(&self, raw: &RawValue) -> Result<Value> {
        convert::decode(&self.info, raw, self.charset)
    }

    /// Encode a native value as this tag would, without changing it.
    pub fn encode(&self, value: &Value) -> Result<RawValue> {
        convert::encode(&self.info, value)
    }

    fn check_cardinality(&self, value: &Value) -> Result<()> {
        match (self.info.repeatable, value.is_list()) {
            (true, false) => Err(Error::Cardinality {
                key: self.key.clone(),
                reason: "is repeatable and takes a list of values".to_string(),
            }),
            (false, true) => Err(Error::Cardinality {
                key: self.key.clone(),
                reason: "is not repeatable and takes a single value".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn stored_components(info: &TagInfo, raw: &RawValue) -> usize {
    match (info.tag_type, raw) {
        (TagType::Exif(ty), raw) => convert::component_count(ty, raw),
        (TagType::Iptc(_), RawValue::Datasets(items)) => items.len(),
        _ => 1,
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} [{}] = ", self.key, self.info.tag_type)?;
        match &self.value {
            Some(v) => write!(f, "{v}>"),
            None => f.write_str("(unset)>"),
        }
    }
}
