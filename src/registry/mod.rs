//! Static tag dictionaries: declared type and repeatability per known key.
//!
//! Lookups are case-sensitive on the exact key. Keys absent from the tables
//! are free-form: they get the family's default type and are not repeatable.

pub(crate) mod exif;
pub(crate) mod iptc;
pub(crate) mod xmp;

use std::fmt;

use crate::error::Result;
use crate::key::{Family, split_key};

pub use xmp::{namespace_prefix, namespace_uri, register_namespace, unregister_namespace};

/// EXIF/TIFF field types, plus the `Comment` type of `UserComment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExifType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Comment,
}

impl ExifType {
    /// Numeric types whose raw form is a list of components.
    pub(crate) fn is_numeric(self) -> bool {
        !matches!(self, ExifType::Ascii | ExifType::Undefined | ExifType::Comment)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExifType::Byte => "Byte",
            ExifType::Ascii => "Ascii",
            ExifType::Short => "Short",
            ExifType::Long => "Long",
            ExifType::Rational => "Rational",
            ExifType::SByte => "SByte",
            ExifType::Undefined => "Undefined",
            ExifType::SShort => "SShort",
            ExifType::SLong => "SLong",
            ExifType::SRational => "SRational",
            ExifType::Float => "Float",
            ExifType::Double => "Double",
            ExifType::Comment => "Comment",
        }
    }
}

/// IPTC-IIM dataset types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IptcType {
    Short,
    String,
    Date,
    Time,
    Undefined,
}

impl IptcType {
    pub fn name(&self) -> &'static str {
        match self {
            IptcType::Short => "Short",
            IptcType::String => "String",
            IptcType::Date => "Date",
            IptcType::Time => "Time",
            IptcType::Undefined => "Undefined",
        }
    }
}

/// Value type of a simple XMP property or of the items of an XMP array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XmpScalar {
    Text,
    Integer,
    Real,
    Boolean,
    Date,
    Rational,
    Uri,
    MimeType,
    ProperName,
    AgentName,
    Locale,
}

impl XmpScalar {
    pub fn name(&self) -> &'static str {
        match self {
            XmpScalar::Text => "Text",
            XmpScalar::Integer => "Integer",
            XmpScalar::Real => "Real",
            XmpScalar::Boolean => "Boolean",
            XmpScalar::Date => "Date",
            XmpScalar::Rational => "Rational",
            XmpScalar::Uri => "URI",
            XmpScalar::MimeType => "MIMEType",
            XmpScalar::ProperName => "ProperName",
            XmpScalar::AgentName => "AgentName",
            XmpScalar::Locale => "Locale",
        }
    }
}

/// XMP property shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XmpType {
    Simple(XmpScalar),
    /// Unordered array.
    Bag(XmpScalar),
    /// Ordered array.
    Seq(XmpScalar),
    /// Alternative array.
    Alt(XmpScalar),
    /// Language alternative (`rdf:Alt` with `xml:lang` on every item).
    LangAlt,
}

impl XmpType {
    pub(crate) fn is_array(&self) -> bool {
        matches!(self, XmpType::Bag(_) | XmpType::Seq(_) | XmpType::Alt(_))
    }
}

impl fmt::Display for XmpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmpType::Simple(s) => f.write_str(s.name()),
            XmpType::Bag(s) => write!(f, "bag {}", s.name()),
            XmpType::Seq(s) => write!(f, "seq {}", s.name()),
            XmpType::Alt(s) => write!(f, "alt {}", s.name()),
            XmpType::LangAlt => f.write_str("Lang Alt"),
        }
    }
}

/// Declared type of a tag, by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    Exif(ExifType),
    Iptc(IptcType),
    Xmp(XmpType),
}

impl TagType {
    pub fn family(&self) -> Family {
        match self {
            TagType::Exif(_) => Family::Exif,
            TagType::Iptc(_) => Family::Iptc,
            TagType::Xmp(_) => Family::Xmp,
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagType::Exif(t) => f.write_str(t.name()),
            TagType::Iptc(t) => f.write_str(t.name()),
            TagType::Xmp(t) => write!(f, "{t}"),
        }
    }
}

/// What the registry knows about a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagInfo {
    pub tag_type: TagType,
    pub repeatable: bool,
}

impl TagInfo {
    pub const fn new(tag_type: TagType, repeatable: bool) -> Self {
        Self { tag_type, repeatable }
    }

    /// Type given to keys the dictionaries do not list.
    pub fn default_for(family: Family) -> Self {
        let tag_type = match family {
            Family::Exif => TagType::Exif(ExifType::Undefined),
            Family::Iptc => TagType::Iptc(IptcType::String),
            Family::Xmp => TagType::Xmp(XmpType::Simple(XmpScalar::Text)),
        };
        Self::new(tag_type, false)
    }
}

/// Look up a key in its family's dictionary.
pub fn lookup(key: &str) -> Option<TagInfo> {
    match Family::from_key(key).ok()? {
        Family::Exif => exif::lookup(key).map(|def| def.info()),
        Family::Iptc => iptc::lookup(key).map(|def| def.info()),
        Family::Xmp => xmp::lookup(key),
    }
}

/// Registry entry for `key`, or the family default when the key is unlisted.
pub fn resolve(key: &str) -> Result<TagInfo> {
    let parts = split_key(key)?;
    Ok(lookup(key).unwrap_or_else(|| TagInfo::default_for(parts.family)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iptc_lookups() {
        let info = lookup("Iptc.Envelope.FileFormat").unwrap();
        assert_eq!(info.tag_type, TagType::Iptc(IptcType::Short));
        assert!(!info.repeatable);

        let info = lookup("Iptc.Application2.Keywords").unwrap();
        assert_eq!(info.tag_type, TagType::Iptc(IptcType::String));
        assert!(info.repeatable);
    }

    #[test]
    fn exif_lookups() {
        let info = lookup("Exif.Photo.ExposureTime").unwrap();
        assert_eq!(info.tag_type, TagType::Exif(ExifType::Rational));
        let info = lookup("Exif.GPSInfo.GPSLatitude").unwrap();
        assert!(info.repeatable);
    }

    #[test]
    fn xmp_lookups() {
        let info = lookup("Xmp.dc.subject").unwrap();
        assert_eq!(info.tag_type, TagType::Xmp(XmpType::Bag(XmpScalar::Text)));
        assert!(info.repeatable);
        let info = lookup("Xmp.dc.rights").unwrap();
        assert_eq!(info.tag_type, TagType::Xmp(XmpType::LangAlt));
        assert!(!info.repeatable);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(lookup("Exif.Photo.exposuretime").is_none());
        assert!(lookup("exif.Photo.ExposureTime").is_some());
    }

    #[test]
    fn unknown_keys_default() {
        let info = resolve("Exif.Image.0x9999").unwrap();
        assert_eq!(info, TagInfo::default_for(Family::Exif));
        let info = resolve("Xmp.tutor.lastEditorName").unwrap();
        assert_eq!(info.tag_type, TagType::Xmp(XmpType::Simple(XmpScalar::Text)));
        assert!(!info.repeatable);
    }

    #[test]
    fn malformed_key_is_an_error() {
        assert!(resolve("Exif.Image").is_err());
        assert!(resolve("Jpeg.Image.Make").is_err());
    }

    #[test]
    fn type_names() {
        assert_eq!(TagType::Iptc(IptcType::Short).to_string(), "Short");
        assert_eq!(TagType::Xmp(XmpType::Seq(XmpScalar::ProperName)).to_string(), "seq ProperName");
        assert_eq!(TagType::Xmp(XmpType::LangAlt).to_string(), "Lang Alt");
    }
}
