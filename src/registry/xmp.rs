use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use log::debug;

use super::{TagInfo, TagType, XmpScalar, XmpType};
use crate::error::{Error, Result};

// ── Namespaces ──────────────────────────────────────────────────────────────

const BUILTIN_NAMESPACES: &[(&str, &str)] = &[
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("xmp", "http://ns.adobe.com/xap/1.0/"),
    ("xmpRights", "http://ns.adobe.com/xap/1.0/rights/"),
    ("xmpMM", "http://ns.adobe.com/xap/1.0/mm/"),
    ("photoshop", "http://ns.adobe.com/photoshop/1.0/"),
    ("tiff", "http://ns.adobe.com/tiff/1.0/"),
    ("exif", "http://ns.adobe.com/exif/1.0/"),
    ("aux", "http://ns.adobe.com/exif/1.0/aux/"),
    ("Iptc4xmpCore", "http://iptc.org/std/Iptc4xmpCore/1.0/xmlns/"),
    ("lr", "http://ns.adobe.com/lightroom/1.0/"),
    ("crs", "http://ns.adobe.com/camera-raw-settings/1.0/"),
    ("pdf", "http://ns.adobe.com/pdf/1.3/"),
    ("plus", "http://ns.useplus.org/ldf/xmp/1.0/"),
];

struct Namespace {
    prefix: String,
    uri: String,
    builtin: bool,
}

static NAMESPACES: LazyLock<RwLock<Vec<Namespace>>> = LazyLock::new(|| {
    RwLock::new(
        BUILTIN_NAMESPACES
            .iter()
            .map(|(prefix, uri)| Namespace {
                prefix: prefix.to_string(),
                uri: uri.to_string(),
                builtin: true,
            })
            .collect(),
    )
});

/// Register a custom XMP namespace so that `Xmp.<prefix>.*` keys can be written.
///
/// The URI must end with `/` and neither the URI nor the prefix may already
/// be registered.
///
/// ```rust
/// imgmeta::register_namespace("http://example.org/imgmeta-doc/", "imgdoc").unwrap();
/// assert_eq!(
///     imgmeta::namespace_uri("imgdoc").as_deref(),
///     Some("http://example.org/imgmeta-doc/")
/// );
/// imgmeta::unregister_namespace("http://example.org/imgmeta-doc/").unwrap();
/// ```
pub fn register_namespace(uri: &str, prefix: &str) -> Result<()> {
    if !uri.ends_with('/') {
        return Err(Error::InvalidNamespace(format!("{uri}: URI must end with '/'")));
    }
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(Error::InvalidNamespace(format!("{prefix}: not a valid prefix")));
    }
    let mut namespaces = NAMESPACES.write().unwrap_or_else(|e| e.into_inner());
    if namespaces.iter().any(|ns| ns.prefix == prefix) {
        return Err(Error::InvalidNamespace(format!("prefix {prefix} is already registered")));
    }
    if namespaces.iter().any(|ns| ns.uri == uri) {
        return Err(Error::InvalidNamespace(format!("{uri} is already registered")));
    }
    debug!("Registered XMP namespace {prefix} = {uri}");
    namespaces.push(Namespace {
        prefix: prefix.to_string(),
        uri: uri.to_string(),
        builtin: false,
    });
    Ok(())
}

/// Remove a namespace added with [`register_namespace`]. Built-in namespaces
/// cannot be removed.
pub fn unregister_namespace(uri: &str) -> Result<()> {
    let mut namespaces = NAMESPACES.write().unwrap_or_else(|e| e.into_inner());
    let idx = namespaces
        .iter()
        .position(|ns| ns.uri == uri)
        .ok_or_else(|| Error::InvalidNamespace(format!("{uri} is not registered")))?;
    if namespaces[idx].builtin {
        return Err(Error::InvalidNamespace(format!("{uri} is a built-in namespace")));
    }
    namespaces.remove(idx);
    Ok(())
}

pub fn namespace_uri(prefix: &str) -> Option<String> {
    let namespaces = NAMESPACES.read().unwrap_or_else(|e| e.into_inner());
    namespaces.iter().find(|ns| ns.prefix == prefix).map(|ns| ns.uri.clone())
}

pub fn namespace_prefix(uri: &str) -> Option<String> {
    let namespaces = NAMESPACES.read().unwrap_or_else(|e| e.into_inner());
    namespaces.iter().find(|ns| ns.uri == uri).map(|ns| ns.prefix.clone())
}

// ── Properties ──────────────────────────────────────────────────────────────

use XmpScalar::{AgentName, Boolean, Date, Integer, Locale, MimeType, ProperName, Rational, Real, Text, Uri};

const fn simple(s: XmpScalar) -> XmpType {
    XmpType::Simple(s)
}

const LANG_ALT: XmpType = XmpType::LangAlt;

static XMP_PROPERTIES: &[(&str, XmpType)] = &[
    // Dublin Core
    ("dc.contributor", XmpType::Bag(ProperName)),
    ("dc.coverage", simple(Text)),
    ("dc.creator", XmpType::Seq(ProperName)),
    ("dc.date", XmpType::Seq(Date)),
    ("dc.description", LANG_ALT),
    ("dc.format", simple(MimeType)),
    ("dc.identifier", simple(Text)),
    ("dc.language", XmpType::Bag(Locale)),
    ("dc.publisher", XmpType::Bag(ProperName)),
    ("dc.relation", XmpType::Bag(Text)),
    ("dc.rights", LANG_ALT),
    ("dc.source", simple(Text)),
    ("dc.subject", XmpType::Bag(Text)),
    ("dc.title", LANG_ALT),
    ("dc.type", XmpType::Bag(Text)),
    // XMP basic
    ("xmp.CreateDate", simple(Date)),
    ("xmp.CreatorTool", simple(AgentName)),
    ("xmp.Identifier", XmpType::Bag(Text)),
    ("xmp.Label", simple(Text)),
    ("xmp.MetadataDate", simple(Date)),
    ("xmp.ModifyDate", simple(Date)),
    ("xmp.Nickname", simple(Text)),
    ("xmp.Rating", simple(Integer)),
    // Rights management
    ("xmpRights.Certificate", simple(Uri)),
    ("xmpRights.Marked", simple(Boolean)),
    ("xmpRights.Owner", XmpType::Bag(ProperName)),
    ("xmpRights.UsageTerms", LANG_ALT),
    ("xmpRights.WebStatement", simple(Uri)),
    // Media management
    ("xmpMM.DocumentID", simple(Uri)),
    ("xmpMM.InstanceID", simple(Uri)),
    ("xmpMM.OriginalDocumentID", simple(Uri)),
    // Photoshop
    ("photoshop.AuthorsPosition", simple(Text)),
    ("photoshop.CaptionWriter", simple(ProperName)),
    ("photoshop.Category", simple(Text)),
    ("photoshop.City", simple(Text)),
    ("photoshop.Country", simple(Text)),
    ("photoshop.Credit", simple(Text)),
    ("photoshop.DateCreated", simple(Date)),
    ("photoshop.Headline", simple(Text)),
    ("photoshop.Instructions", simple(Text)),
    ("photoshop.Source", simple(Text)),
    ("photoshop.State", simple(Text)),
    ("photoshop.SupplementalCategories", XmpType::Bag(Text)),
    ("photoshop.TransmissionReference", simple(Text)),
    ("photoshop.Urgency", simple(Integer)),
    // TIFF and EXIF mirrors
    ("tiff.Make", simple(ProperName)),
    ("tiff.Model", simple(ProperName)),
    ("tiff.Orientation", simple(Integer)),
    ("tiff.ImageWidth", simple(Integer)),
    ("tiff.ImageLength", simple(Integer)),
    ("tiff.Artist", simple(ProperName)),
    ("tiff.Software", simple(AgentName)),
    ("tiff.XResolution", simple(Rational)),
    ("tiff.YResolution", simple(Rational)),
    ("exif.ExposureTime", simple(Rational)),
    ("exif.FNumber", simple(Rational)),
    ("exif.FocalLength", simple(Rational)),
    ("exif.ISOSpeedRatings", XmpType::Seq(Integer)),
    ("exif.DateTimeOriginal", simple(Date)),
    ("exif.DateTimeDigitized", simple(Date)),
    ("exif.ExposureBiasValue", simple(Rational)),
    ("exif.Flash", simple(Text)),
    ("exif.UserComment", LANG_ALT),
    ("exif.GPSLatitude", simple(Text)),
    ("exif.GPSLongitude", simple(Text)),
    ("exif.GPSAltitude", simple(Rational)),
    ("aux.Lens", simple(Text)),
    ("aux.SerialNumber", simple(Text)),
    ("aux.ApproximateFocusDistance", simple(Rational)),
    ("crs.Exposure", simple(Real)),
    ("crs.HasCrop", simple(Boolean)),
    // IPTC Core and Lightroom
    ("Iptc4xmpCore.CountryCode", simple(Text)),
    ("Iptc4xmpCore.IntellectualGenre", simple(Text)),
    ("Iptc4xmpCore.Location", simple(Text)),
    ("Iptc4xmpCore.Scene", XmpType::Bag(Text)),
    ("Iptc4xmpCore.SubjectCode", XmpType::Bag(Text)),
    ("lr.hierarchicalSubject", XmpType::Bag(Text)),
    ("pdf.Keywords", simple(Text)),
    ("pdf.Producer", simple(AgentName)),
];

static BY_NAME: LazyLock<HashMap<&'static str, XmpType>> =
    LazyLock::new(|| XMP_PROPERTIES.iter().copied().collect());

/// Registry entry of a listed property. Arrays are repeatable; language
/// alternatives are not (they carry a single `LangAlt` value).
pub(crate) fn lookup(key: &str) -> Option<TagInfo> {
    let (_, path) = key.split_once('.')?;
    let ty = *BY_NAME.get(path)?;
    Some(TagInfo::new(TagType::Xmp(ty), ty.is_array()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_prefixes_resolve() {
        assert_eq!(namespace_uri("dc").as_deref(), Some("http://purl.org/dc/elements/1.1/"));
        assert_eq!(namespace_prefix("http://ns.adobe.com/xap/1.0/rights/").as_deref(), Some("xmpRights"));
        assert!(namespace_uri("nope").is_none());
    }

    #[test]
    fn register_and_unregister() {
        register_namespace("www.imgmeta-test.org/", "regtest").unwrap();
        assert_eq!(namespace_uri("regtest").as_deref(), Some("www.imgmeta-test.org/"));

        // same prefix twice
        assert!(matches!(
            register_namespace("www.other-test.org/", "regtest"),
            Err(Error::InvalidNamespace(_))
        ));

        unregister_namespace("www.imgmeta-test.org/").unwrap();
        assert!(namespace_uri("regtest").is_none());
        assert!(unregister_namespace("www.imgmeta-test.org/").is_err());
    }

    #[test]
    fn rejects_bad_registrations() {
        assert!(register_namespace("http://example.org/no-slash", "noslash").is_err());
        assert!(register_namespace("http://purl.org/dc/elements/1.1/", "dc2").is_err());
        assert!(unregister_namespace("http://purl.org/dc/elements/1.1/").is_err());
    }

    #[test]
    fn property_shapes() {
        let info = lookup("Xmp.dc.creator").unwrap();
        assert_eq!(info.tag_type, TagType::Xmp(XmpType::Seq(ProperName)));
        assert!(info.repeatable);
        let info = lookup("Xmp.xmpRights.Marked").unwrap();
        assert_eq!(info.tag_type, TagType::Xmp(XmpType::Simple(Boolean)));
        assert!(lookup("Xmp.dc.nothing").is_none());
    }
}
