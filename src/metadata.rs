//! The metadata container for one image.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use log::debug;
use serde::Serialize;

use crate::backend::{self, ImageBackend, RawTag, Source};
use crate::charset::{CHARSET_KEY, Charset};
use crate::config::WriteOptions;
use crate::error::{Error, Result};
use crate::key::{Family, split_key};
use crate::preview::Preview;
use crate::tag::Tag;
use crate::value::{RawValue, Rational, Value};

/// Which parts of the metadata [`ImageMetadata::copy_to`] transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    pub exif: bool,
    pub iptc: bool,
    pub xmp: bool,
    pub comment: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            exif: true,
            iptc: true,
            xmp: true,
            comment: true,
        }
    }
}

impl CopyOptions {
    fn families(&self) -> Vec<Family> {
        Family::ALL
            .into_iter()
            .filter(|family| match family {
                Family::Exif => self.exif,
                Family::Iptc => self.iptc,
                Family::Xmp => self.xmp,
            })
            .collect()
    }
}

/// Exposure parameters, from the EXIF photo tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureData {
    pub iso: Option<i64>,
    pub shutter_speed: Option<Rational>,
    pub focal_length: Option<f64>,
    pub aperture: Option<f64>,
    pub orientation: i64,
}

impl ExposureData {
    pub fn shutter_speed_secs(&self) -> Option<f64> {
        self.shutter_speed.map(|r| r.to_f64())
    }
}

/// Authorship and copyright, from EXIF and XMP.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RightsData {
    /// `Xmp.dc.creator`
    pub creator: Option<Vec<String>>,
    /// `Exif.Image.Artist`
    pub artist: Option<String>,
    /// `Xmp.dc.rights`
    pub rights: Option<Vec<(String, String)>>,
    /// `Exif.Image.Copyright`
    pub copyright: Option<String>,
    /// `Xmp.xmpRights.Marked`
    pub marked: Option<bool>,
    /// `Xmp.xmpRights.UsageTerms`
    pub usage: Option<Vec<(String, String)>>,
}

#[derive(Debug, Default)]
struct FamilyCache {
    /// `None` until first listed.
    keys: Option<Vec<String>>,
    tags: HashMap<String, Tag>,
}

/// EXIF, IPTC and XMP metadata of one image.
///
/// Nothing is loaded until [`read`](Self::read); every accessor fails with
/// [`Error::Unbound`] before that. Tags are materialized on first access and
/// cached. Changes go straight to the image backend and reach the file on
/// [`write`](Self::write).
///
/// ```rust,no_run
/// use imgmeta::{ImageMetadata, Value};
///
/// let mut metadata = ImageMetadata::new("photo.jpg");
/// metadata.read()?;
/// for key in metadata.exif_keys()? {
///     println!("{}", metadata.get(&key)?);
/// }
/// metadata.set("Iptc.Application2.Keywords", vec!["beach", "sunset"])?;
/// metadata.set("Exif.Photo.UserComment", "déjà vu")?;
/// metadata.write(false)?;
/// # Ok::<(), imgmeta::Error>(())
/// ```
pub struct ImageMetadata {
    path: Option<PathBuf>,
    source: Option<Source>,
    image: Option<Box<dyn ImageBackend>>,
    read: bool,
    /// Access and modification times recorded when the file was opened.
    timestamps: Option<(FileTime, FileTime)>,
    cache: [FamilyCache; 3],
}

impl fmt::Debug for ImageMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageMetadata")
            .field("path", &self.path)
            .field("read", &self.read)
            .finish_non_exhaustive()
    }
}

impl ImageMetadata {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::unbound(Some(path.clone()), Some(Source::Path(path)), None)
    }

    /// Metadata of an image held in memory. Writes update the buffer
    /// returned by [`buffer`](Self::buffer).
    pub fn from_buffer(data: Vec<u8>) -> Self {
        Self::unbound(None, Some(Source::Buffer(data)), None)
    }

    /// Metadata behind a custom backend.
    pub fn with_backend(image: Box<dyn ImageBackend>) -> Self {
        Self::unbound(None, None, Some(image))
    }

    fn unbound(path: Option<PathBuf>, source: Option<Source>, image: Option<Box<dyn ImageBackend>>) -> Self {
        Self {
            path,
            source,
            image,
            read: false,
            timestamps: None,
            cache: Default::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the metadata from the image. Reading again discards every cached
    /// tag and key list.
    pub fn read(&mut self) -> Result<()> {
        if self.image.is_none() {
            let source = self.source.clone().ok_or(Error::Unbound)?;
            if let Some(path) = self.path.as_deref().filter(|p| p.is_file()) {
                self.timestamps = Some(file_times(path)?);
            }
            self.image = Some(backend::open(source)?);
            self.source = None;
        }
        let image = self.image.as_deref_mut().ok_or(Error::Unbound)?;
        image.read_metadata()?;
        self.read = true;
        for family in Family::ALL {
            self.invalidate_family(family);
        }
        debug!("Read metadata of {}", self.describe());
        Ok(())
    }

    /// Commit the metadata to the image.
    ///
    /// For a file, `preserve_timestamps` restores the access and modification
    /// times it had when read; otherwise the new times become the reference.
    pub fn write(&mut self, preserve_timestamps: bool) -> Result<()> {
        self.write_with(&WriteOptions { preserve_timestamps })
    }

    pub fn write_with(&mut self, options: &WriteOptions) -> Result<()> {
        self.image_mut()?.write_metadata()?;
        let Some(path) = &self.path else {
            return Ok(());
        };
        if options.preserve_timestamps {
            if let Some((atime, mtime)) = self.timestamps {
                filetime::set_file_times(path, atime, mtime)?;
                debug!("Restored timestamps of {}", path.display());
            }
        } else {
            self.timestamps = Some(file_times(path)?);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "in-memory image".to_string(),
        }
    }

    fn image(&self) -> Result<&dyn ImageBackend> {
        if !self.read {
            return Err(Error::Unbound);
        }
        self.image.as_deref().ok_or(Error::Unbound)
    }

    fn image_mut(&mut self) -> Result<&mut dyn ImageBackend> {
        if !self.read {
            return Err(Error::Unbound);
        }
        match self.image.as_deref_mut() {
            Some(image) => Ok(image),
            None => Err(Error::Unbound),
        }
    }

    // ── Keys ────────────────────────────────────────────────────────────────

    fn key_list(&mut self, family: Family) -> Result<&mut Vec<String>> {
        if !self.read {
            return Err(Error::Unbound);
        }
        let image = self.image.as_deref().ok_or(Error::Unbound)?;
        let cache = &mut self.cache[family.index()];
        Ok(cache.keys.get_or_insert_with(|| {
            let keys = image.keys(family);
            debug!("Listed {} {family} keys", keys.len());
            keys
        }))
    }

    /// Keys of the tags of a family, in storage order.
    pub fn keys(&mut self, family: Family) -> Result<Vec<String>> {
        Ok(self.key_list(family)?.clone())
    }

    pub fn exif_keys(&mut self) -> Result<Vec<String>> {
        self.keys(Family::Exif)
    }

    pub fn iptc_keys(&mut self) -> Result<Vec<String>> {
        self.keys(Family::Iptc)
    }

    pub fn xmp_keys(&mut self) -> Result<Vec<String>> {
        self.keys(Family::Xmp)
    }

    /// EXIF, then IPTC, then XMP keys.
    pub fn all_keys(&mut self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for family in Family::ALL {
            keys.extend(self.keys(family)?);
        }
        Ok(keys)
    }

    pub fn contains_key(&mut self, key: &str) -> Result<bool> {
        let (family, key) = canonical_key(key)?;
        Ok(self.key_list(family)?.contains(&key))
    }

    pub fn len(&mut self) -> Result<usize> {
        let mut len = 0;
        for family in Family::ALL {
            len += self.key_list(family)?.len();
        }
        Ok(len)
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // ── Tags ────────────────────────────────────────────────────────────────

    /// The tag stored under `key`.
    pub fn get(&mut self, key: &str) -> Result<&Tag> {
        let (family, key) = canonical_key(key)?;
        let idx = family.index();
        if !self.cache[idx].tags.contains_key(&key) {
            let charset = match family {
                Family::Iptc => self.iptc_charset()?.unwrap_or_default(),
                _ => Charset::default(),
            };
            let raw = self.image()?.get_tag(family, &key)?;
            let tag = Tag::from_raw(raw, charset)?;
            debug!("Cached {key}");
            self.cache[idx].tags.insert(key.clone(), tag);
        }
        self.cache[idx].tags.get(&key).ok_or(Error::KeyNotFound(key))
    }

    /// The native value of the tag stored under `key`.
    pub fn value(&mut self, key: &str) -> Result<&Value> {
        self.get(key)?
            .value()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Set a tag from a native value, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let (_, key) = canonical_key(key)?;
        self.image()?;
        let tag = Tag::with_value(&key, value)?;
        self.set_tag(tag)
    }

    /// Store a tag, replacing any tag with the same key.
    pub fn set_tag(&mut self, tag: Tag) -> Result<()> {
        let (family, key) = canonical_key(tag.key())?;
        let image = self.image_mut()?;
        let raw = tag
            .raw_value()
            .ok_or_else(|| Error::conversion("(unset)", tag.tag_type()))?;
        image.set_tag(family, &key, raw)?;

        let cache = &mut self.cache[family.index()];
        if let Some(keys) = &mut cache.keys {
            if !keys.contains(&key) {
                keys.push(key.clone());
            }
        }
        if key == CHARSET_KEY {
            debug!("IPTC charset changed, dropping cached IPTC tags");
            cache.tags.clear();
        }
        cache.tags.insert(key, tag);
        Ok(())
    }

    /// Remove a tag from the image.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let (family, key) = canonical_key(key)?;
        if !self.key_list(family)?.contains(&key) {
            return Err(Error::KeyNotFound(key));
        }
        self.image_mut()?.delete_tag(family, &key)?;
        let cache = &mut self.cache[family.index()];
        if let Some(keys) = &mut cache.keys {
            keys.retain(|k| *k != key);
        }
        if key == CHARSET_KEY {
            debug!("IPTC charset removed, dropping cached IPTC tags");
            cache.tags.clear();
        } else {
            cache.tags.remove(&key);
        }
        Ok(())
    }

    /// Forget the key list and cached tags of a family.
    pub fn invalidate_family(&mut self, family: Family) {
        self.cache[family.index()] = FamilyCache::default();
    }

    /// Drop one cached tag. The key list is kept. Returns whether a tag was
    /// cached.
    pub fn evict_key(&mut self, key: &str) -> bool {
        match canonical_key(key) {
            Ok((family, key)) => self.cache[family.index()].tags.remove(&key).is_some(),
            Err(_) => false,
        }
    }

    /// Replace the selected metadata of `other` with this image's.
    ///
    /// A copied family is overwritten wholesale: tags `other` has and this
    /// image lacks are removed.
    pub fn copy_to(&self, other: &mut ImageMetadata, options: CopyOptions) -> Result<()> {
        let source = self.image()?;
        let target = other.image_mut()?;
        let families = options.families();
        backend::copy_metadata(source, target, &families)?;
        if options.comment {
            match source.comment() {
                Some(comment) => target.set_comment(&comment),
                None => target.clear_comment(),
            }
        }
        for family in families {
            other.invalidate_family(family);
        }
        Ok(())
    }

    // ── Image ───────────────────────────────────────────────────────────────

    pub fn comment(&self) -> Result<Option<String>> {
        Ok(self.image()?.comment())
    }

    pub fn set_comment(&mut self, comment: &str) -> Result<()> {
        self.image_mut()?.set_comment(comment);
        Ok(())
    }

    pub fn clear_comment(&mut self) -> Result<()> {
        self.image_mut()?.clear_comment();
        Ok(())
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        self.image()?.pixel_dimensions()
    }

    pub fn mime_type(&self) -> Result<String> {
        Ok(self.image()?.mime_type())
    }

    /// The image file with the current metadata.
    pub fn buffer(&self) -> Result<Vec<u8>> {
        self.image()?.data_buffer()
    }

    /// Embedded previews, smallest first.
    pub fn previews(&self) -> Result<Vec<Preview>> {
        let mut previews = self.image()?.previews();
        previews.sort_by_key(Preview::size);
        Ok(previews)
    }

    /// The JPEG thumbnail stored in the EXIF data, if any.
    pub fn exif_thumbnail(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.image()?.thumbnail())
    }

    /// Store `data`, a JPEG image, as the EXIF thumbnail.
    pub fn set_exif_thumbnail(&mut self, data: &[u8]) -> Result<()> {
        self.image_mut()?.set_thumbnail(Some(data))?;
        self.invalidate_family(Family::Exif);
        Ok(())
    }

    /// Remove the EXIF thumbnail and its `Exif.Thumbnail.*` tags.
    pub fn erase_exif_thumbnail(&mut self) -> Result<()> {
        self.image_mut()?.set_thumbnail(None)?;
        self.invalidate_family(Family::Exif);
        Ok(())
    }

    // ── IPTC charset ────────────────────────────────────────────────────────

    /// The charset declared in the IPTC envelope, if any.
    pub fn iptc_charset(&self) -> Result<Option<Charset>> {
        let marker = match self.image()?.get_tag(Family::Iptc, CHARSET_KEY) {
            Ok(RawTag {
                raw: RawValue::Datasets(values),
                ..
            }) => values.into_iter().next(),
            Ok(_) | Err(Error::KeyNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let Some(marker) = marker else {
            return Ok(None);
        };
        let charset = Charset::from_marker(&marker);
        if charset.is_none() {
            debug!("Unrecognized IPTC charset marker {marker:?}");
        }
        Ok(charset)
    }

    /// Declare the IPTC charset by name (`utf-8` and its aliases), or remove
    /// the declaration with `None`.
    pub fn set_iptc_charset(&mut self, charset: Option<&str>) -> Result<()> {
        let Some(name) = charset else {
            return match self.delete(CHARSET_KEY) {
                Err(Error::KeyNotFound(_)) => Ok(()),
                other => other,
            };
        };
        let marker = Charset::from_name(name)?
            .marker()
            .ok_or_else(|| Error::UnsupportedCharset(name.to_string()))?;
        self.set(CHARSET_KEY, Value::Bytes(marker.to_vec()))
    }

    // ── Convenience accessors ───────────────────────────────────────────────

    /// Value of `key`, or `None` when the tag is absent.
    fn optional(&mut self, key: &str) -> Result<Option<Value>> {
        match self.get(key) {
            Ok(tag) => Ok(tag.value().cloned()),
            Err(Error::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn optional_with<T>(&mut self, key: &str, extract: impl Fn(&Value) -> Option<T>, expected: &str) -> Result<Option<T>> {
        self.optional(key)?
            .map(|value| extract(scalar(&value)).ok_or_else(|| Error::conversion(&value, expected)))
            .transpose()
    }

    /// `Exif.Photo.ISOSpeedRatings`
    pub fn iso(&mut self) -> Result<Option<i64>> {
        self.optional_with("Exif.Photo.ISOSpeedRatings", Value::as_integer, "integer")
    }

    /// `Exif.Photo.ExposureTime` as a fraction of seconds.
    pub fn shutter_speed(&mut self) -> Result<Option<Rational>> {
        self.optional_with("Exif.Photo.ExposureTime", Value::as_rational, "rational")
    }

    pub fn shutter_speed_secs(&mut self) -> Result<Option<f64>> {
        Ok(self.shutter_speed()?.map(|r| r.to_f64()))
    }

    /// `Exif.Photo.FocalLength` in millimetres, rounded to two decimals.
    pub fn focal_length(&mut self) -> Result<Option<f64>> {
        Ok(self
            .optional_with("Exif.Photo.FocalLength", Value::as_rational, "rational")?
            .map(round2))
    }

    /// `Exif.Photo.FNumber`, rounded to two decimals.
    pub fn aperture(&mut self) -> Result<Option<f64>> {
        Ok(self
            .optional_with("Exif.Photo.FNumber", Value::as_rational, "rational")?
            .map(round2))
    }

    /// `Exif.Image.Orientation`, 1 when absent.
    pub fn orientation(&mut self) -> Result<i64> {
        Ok(self
            .optional_with("Exif.Image.Orientation", Value::as_integer, "integer")?
            .unwrap_or(1))
    }

    pub fn exposure_data(&mut self) -> Result<ExposureData> {
        Ok(ExposureData {
            iso: self.iso()?,
            shutter_speed: self.shutter_speed()?,
            focal_length: self.focal_length()?,
            aperture: self.aperture()?,
            orientation: self.orientation()?,
        })
    }

    pub fn rights_data(&mut self) -> Result<RightsData> {
        let text = |v: &Value| v.as_text().map(str::to_string);
        let lang_alt = |v: &Value| match v {
            Value::LangAlt(items) => Some(items.clone()),
            _ => None,
        };
        let creator = match self.optional("Xmp.dc.creator")? {
            Some(value) => Some(text_list(&value).ok_or_else(|| Error::conversion(&value, "list of text"))?),
            None => None,
        };
        Ok(RightsData {
            creator,
            artist: self.optional_with("Exif.Image.Artist", text, "text")?,
            rights: self.optional_with("Xmp.dc.rights", lang_alt, "lang-alt")?,
            copyright: self.optional_with("Exif.Image.Copyright", text, "text")?,
            marked: self.optional_with(
                "Xmp.xmpRights.Marked",
                |v| match v {
                    Value::Boolean(b) => Some(*b),
                    _ => None,
                },
                "boolean",
            )?,
            usage: self.optional_with("Xmp.xmpRights.UsageTerms", lang_alt, "lang-alt")?,
        })
    }
}

/// `family.group.name` with the family in its canonical spelling.
fn canonical_key(key: &str) -> Result<(Family, String)> {
    let parts = split_key(key)?;
    Ok((
        parts.family,
        format!("{}.{}.{}", parts.family.key_prefix(), parts.group, parts.name),
    ))
}

fn file_times(path: &Path) -> Result<(FileTime, FileTime)> {
    let meta = std::fs::metadata(path)?;
    Ok((
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    ))
}

/// First item of a list, or the value itself.
fn scalar(value: &Value) -> &Value {
    match value {
        Value::List(items) => items.first().unwrap_or(value),
        other => other,
    }
}

fn text_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::List(items) => items.iter().map(|v| v.as_text().map(str::to_string)).collect(),
        Value::Text(text) => Some(vec![text.clone()]),
        _ => None,
    }
}

fn round2(r: Rational) -> f64 {
    (r.to_f64() * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockImage;
    use crate::testutil::jpeg_fixture;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    fn mock(tags: &[(&str, RawValue)]) -> ImageMetadata {
        let mut metadata = ImageMetadata::with_backend(Box::new(MockImage::with_tags(tags)));
        metadata.read().unwrap();
        metadata
    }

    fn fixture_file(dir: &Path) -> PathBuf {
        let path = dir.join("photo.jpg");
        std::fs::write(&path, jpeg_fixture()).unwrap();
        path
    }

    // ── Lifecycle ──

    #[test]
    fn unread_metadata_is_unbound() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = ImageMetadata::new(fixture_file(dir.path()));
        assert!(matches!(metadata.get("Exif.Image.Make"), Err(Error::Unbound)));
        assert!(matches!(metadata.exif_keys(), Err(Error::Unbound)));
        assert!(matches!(metadata.set("Exif.Image.Make", "Canon"), Err(Error::Unbound)));
        assert!(matches!(metadata.delete("Exif.Image.Make"), Err(Error::Unbound)));
        assert!(matches!(metadata.write(false), Err(Error::Unbound)));
        assert!(matches!(metadata.comment(), Err(Error::Unbound)));

        let mut backed = ImageMetadata::with_backend(Box::new(MockImage::default()));
        assert!(matches!(backed.iptc_keys(), Err(Error::Unbound)));
        backed.read().unwrap();
        assert!(backed.iptc_keys().unwrap().is_empty());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = ImageMetadata::new(dir.path().join("absent.jpg"));
        assert!(matches!(metadata.read(), Err(Error::NotFound(_))));
        assert!(matches!(metadata.xmp_keys(), Err(Error::Unbound)));
    }

    #[test]
    fn unicode_user_comment_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(dir.path());

        let mut metadata = ImageMetadata::new(&path);
        metadata.read().unwrap();
        metadata.set("Exif.Photo.UserComment", "déjà vu").unwrap();
        metadata.write(false).unwrap();

        let mut reread = ImageMetadata::new(&path);
        reread.read().unwrap();
        assert_eq!(reread.exif_keys().unwrap(), vec!["Exif.Photo.UserComment"]);
        assert_eq!(reread.value("Exif.Photo.UserComment").unwrap(), &Value::from("déjà vu"));
    }

    #[test]
    fn buffer_round_trip() {
        let mut metadata = ImageMetadata::from_buffer(jpeg_fixture());
        metadata.read().unwrap();
        metadata.set("Iptc.Application2.Keywords", vec!["sky", "sea"]).unwrap();
        metadata.set("Xmp.dc.rights", Value::lang_default("CC-BY")).unwrap();
        metadata.set_comment("a comment").unwrap();
        metadata.write(false).unwrap();
        assert_eq!(metadata.dimensions().unwrap(), (8, 8));
        assert_eq!(metadata.mime_type().unwrap(), "image/jpeg");

        let mut reread = ImageMetadata::from_buffer(metadata.buffer().unwrap());
        reread.read().unwrap();
        assert_eq!(
            reread.value("Iptc.Application2.Keywords").unwrap(),
            &Value::from(vec!["sky", "sea"])
        );
        assert_eq!(reread.value("Xmp.dc.rights").unwrap(), &Value::lang_default("CC-BY"));
        assert_eq!(reread.comment().unwrap().as_deref(), Some("a comment"));
    }

    #[test]
    fn negative_iptc_short_through_buffer() {
        let mut metadata = ImageMetadata::from_buffer(jpeg_fixture());
        metadata.read().unwrap();
        metadata.set("Iptc.Envelope.FileFormat", -4).unwrap();
        metadata.write(false).unwrap();

        let mut reread = ImageMetadata::from_buffer(metadata.buffer().unwrap());
        reread.read().unwrap();
        assert_eq!(reread.value("Iptc.Envelope.FileFormat").unwrap(), &Value::Integer(-4));
    }

    #[test]
    fn timestamps_preserved_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(dir.path());
        let old = FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_times(&path, old, old).unwrap();

        let mut metadata = ImageMetadata::new(&path);
        metadata.read().unwrap();
        metadata.set("Exif.Image.Make", "Canon").unwrap();
        metadata.write(true).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);

        metadata.write(false).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert_ne!(FileTime::from_last_modification_time(&meta), old);
    }

    // ── Tags ──

    #[test]
    fn keys_and_lookup() {
        let mut metadata = mock(&[
            ("Exif.Image.Make", text("Canon")),
            ("Iptc.Application2.City", RawValue::datasets(["Paris"])),
            ("Xmp.dc.subject", RawValue::Array(vec!["sky".into()])),
        ]);
        assert_eq!(
            metadata.all_keys().unwrap(),
            vec!["Exif.Image.Make", "Iptc.Application2.City", "Xmp.dc.subject"]
        );
        assert_eq!(metadata.len().unwrap(), 3);
        assert!(metadata.contains_key("exif.Image.Make").unwrap());
        assert_eq!(metadata.value("EXIF.Image.Make").unwrap(), &Value::from("Canon"));
        assert!(matches!(metadata.get("Exif.Image.Model"), Err(Error::KeyNotFound(_))));
        assert!(matches!(metadata.get("Png.Text.Author"), Err(Error::InvalidKey { .. })));
    }

    #[test]
    fn set_updates_key_list_in_place() {
        let mut metadata = mock(&[("Exif.Image.Make", text("Canon"))]);
        assert_eq!(metadata.exif_keys().unwrap(), vec!["Exif.Image.Make"]);

        metadata.set("Exif.Image.Make", "Nikon").unwrap();
        metadata.set("Exif.Image.Model", "D90").unwrap();
        assert_eq!(metadata.exif_keys().unwrap(), vec!["Exif.Image.Make", "Exif.Image.Model"]);
        assert_eq!(metadata.value("Exif.Image.Make").unwrap(), &Value::from("Nikon"));

        let tag = Tag::with_value("Iptc.Application2.Keywords", vec!["a", "b"]).unwrap();
        metadata.set_tag(tag).unwrap();
        assert_eq!(metadata.iptc_keys().unwrap(), vec!["Iptc.Application2.Keywords"]);

        assert!(matches!(
            metadata.set_tag(Tag::new("Exif.Image.Artist").unwrap()),
            Err(Error::ValueConversion { .. })
        ));
    }

    #[test]
    fn failed_set_changes_nothing() {
        let mut metadata = mock(&[("Iptc.Application2.City", RawValue::datasets(["Paris"]))]);
        assert!(matches!(
            metadata.set("Iptc.Application2.City", vec!["Lyon", "Nice"]),
            Err(Error::Cardinality { .. })
        ));
        assert!(metadata.set("Iptc.Envelope.DateSent", "yesterday").is_err());
        assert_eq!(metadata.iptc_keys().unwrap(), vec!["Iptc.Application2.City"]);
        assert_eq!(metadata.value("Iptc.Application2.City").unwrap(), &Value::from("Paris"));
    }

    #[test]
    fn delete() {
        let mut metadata = mock(&[("Exif.Image.Make", text("Canon")), ("Exif.Image.Model", text("D90"))]);
        metadata.get("Exif.Image.Make").unwrap();
        metadata.delete("Exif.Image.Make").unwrap();
        assert_eq!(metadata.exif_keys().unwrap(), vec!["Exif.Image.Model"]);
        assert!(matches!(metadata.get("Exif.Image.Make"), Err(Error::KeyNotFound(_))));
        assert!(matches!(metadata.delete("Exif.Image.Make"), Err(Error::KeyNotFound(_))));

        metadata.invalidate_family(Family::Exif);
        assert_eq!(metadata.exif_keys().unwrap(), vec!["Exif.Image.Model"]);
    }

    #[test]
    fn evict_key() {
        let mut metadata = mock(&[("Exif.Image.Make", text("Canon"))]);
        assert!(!metadata.evict_key("Exif.Image.Make"));
        metadata.get("Exif.Image.Make").unwrap();
        assert!(metadata.evict_key("Exif.Image.Make"));
        assert_eq!(metadata.value("Exif.Image.Make").unwrap(), &Value::from("Canon"));
        assert!(!metadata.evict_key("nonsense"));
    }

    #[test]
    fn malformed_storage_surfaces() {
        let mut metadata = mock(&[("Exif.Photo.ISOSpeedRatings", text("fast"))]);
        assert!(matches!(
            metadata.get("Exif.Photo.ISOSpeedRatings"),
            Err(Error::ValueConversion { .. })
        ));
        assert!(metadata.iso().is_err());
    }

    // ── Copy ──

    #[test]
    fn copy_only_exif() {
        let source = mock(&[("Exif.Image.Make", text("Canon")), ("Xmp.dc.format", text("image/jpeg"))]);
        let mut target = mock(&[
            ("Exif.Image.Model", text("D90")),
            ("Iptc.Application2.City", RawValue::datasets(["Paris"])),
        ]);
        target.get("Exif.Image.Model").unwrap();
        target.set_comment("kept").unwrap();

        let options = CopyOptions {
            exif: true,
            iptc: false,
            xmp: false,
            comment: false,
        };
        source.copy_to(&mut target, options).unwrap();
        assert_eq!(target.exif_keys().unwrap(), vec!["Exif.Image.Make"]);
        assert!(matches!(target.get("Exif.Image.Model"), Err(Error::KeyNotFound(_))));
        assert_eq!(target.iptc_keys().unwrap(), vec!["Iptc.Application2.City"]);
        assert!(target.xmp_keys().unwrap().is_empty());
        assert_eq!(target.comment().unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn copy_everything() {
        let source = mock(&[("Iptc.Application2.City", RawValue::datasets(["Lyon"]))]);
        let mut target = mock(&[("Exif.Image.Model", text("D90"))]);
        target.set_comment("gone").unwrap();
        source.copy_to(&mut target, CopyOptions::default()).unwrap();
        assert!(target.exif_keys().unwrap().is_empty());
        assert_eq!(target.value("Iptc.Application2.City").unwrap(), &Value::from("Lyon"));
        assert_eq!(target.comment().unwrap(), None);
    }

    #[test]
    fn copying_exif_replaces_the_thumbnail() {
        let mut source = ImageMetadata::from_buffer(jpeg_fixture());
        source.read().unwrap();
        source.set("Exif.Image.Make", "Canon").unwrap();

        let mut target = ImageMetadata::from_buffer(jpeg_fixture());
        target.read().unwrap();
        target.set("Exif.Image.Model", "D90").unwrap();
        target.set_exif_thumbnail(&jpeg_fixture()).unwrap();
        assert_eq!(target.previews().unwrap().len(), 1);

        let options = CopyOptions {
            exif: true,
            iptc: false,
            xmp: false,
            comment: false,
        };
        source.copy_to(&mut target, options).unwrap();
        assert!(target.previews().unwrap().is_empty());
        assert_eq!(target.exif_keys().unwrap(), vec!["Exif.Image.Make"]);
    }

    // ── Thumbnail ──

    #[test]
    fn exif_thumbnail_set_and_erase() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(dir.path());

        let mut metadata = ImageMetadata::new(&path);
        metadata.read().unwrap();
        assert_eq!(metadata.exif_thumbnail().unwrap(), None);
        metadata.set("Exif.Image.Make", "Canon").unwrap();
        metadata.set_exif_thumbnail(&jpeg_fixture()).unwrap();
        metadata.write(false).unwrap();

        let mut reread = ImageMetadata::new(&path);
        reread.read().unwrap();
        assert_eq!(reread.exif_thumbnail().unwrap(), Some(jpeg_fixture()));
        assert_eq!(reread.value("Exif.Thumbnail.Compression").unwrap(), &Value::Integer(6));

        reread.erase_exif_thumbnail().unwrap();
        assert_eq!(reread.exif_keys().unwrap(), vec!["Exif.Image.Make"]);
        reread.write(false).unwrap();

        let mut again = ImageMetadata::new(&path);
        again.read().unwrap();
        assert_eq!(again.exif_thumbnail().unwrap(), None);
        assert!(again.previews().unwrap().is_empty());
    }

    #[test]
    fn thumbnail_requires_read() {
        let mut metadata = ImageMetadata::from_buffer(jpeg_fixture());
        assert!(matches!(metadata.exif_thumbnail(), Err(Error::Unbound)));
        assert!(matches!(metadata.set_exif_thumbnail(&jpeg_fixture()), Err(Error::Unbound)));
    }

    // ── Charset ──

    #[test]
    fn charset_marker() {
        let mut metadata = mock(&[]);
        assert_eq!(metadata.iptc_charset().unwrap(), None);
        metadata.set_iptc_charset(Some("UTF8")).unwrap();
        assert_eq!(metadata.iptc_charset().unwrap(), Some(Charset::Utf8));
        assert_eq!(
            metadata.value(CHARSET_KEY).unwrap(),
            &Value::Bytes(b"\x1b%G".to_vec())
        );

        assert!(matches!(
            metadata.set_iptc_charset(Some("latin-1")),
            Err(Error::UnsupportedCharset(name)) if name == "latin-1"
        ));
        assert_eq!(metadata.iptc_charset().unwrap(), Some(Charset::Utf8));

        metadata.set_iptc_charset(None).unwrap();
        assert_eq!(metadata.iptc_charset().unwrap(), None);
        metadata.set_iptc_charset(None).unwrap();
    }

    #[test]
    fn charset_change_redecodes_strings() {
        let mut metadata = mock(&[("Iptc.Application2.City", RawValue::Datasets(vec![b"caf\xe9".to_vec()]))]);
        assert_eq!(metadata.value("Iptc.Application2.City").unwrap(), &Value::from("café"));

        metadata.set_iptc_charset(Some("utf-8")).unwrap();
        assert!(matches!(
            metadata.get("Iptc.Application2.City"),
            Err(Error::ValueConversion { .. })
        ));
        assert_eq!(metadata.iptc_keys().unwrap(), vec!["Iptc.Application2.City", CHARSET_KEY]);
    }

    // ── Convenience accessors ──

    #[test]
    fn exposure_data() {
        let mut metadata = mock(&[
            ("Exif.Photo.ISOSpeedRatings", text("200")),
            ("Exif.Photo.ExposureTime", text("1/60")),
            ("Exif.Photo.FocalLength", text("355/10")),
            ("Exif.Photo.FNumber", text("28/0")),
        ]);
        let data = metadata.exposure_data().unwrap();
        assert_eq!(data.iso, Some(200));
        assert_eq!(data.shutter_speed, Some(Rational::new(1, 60)));
        assert!((data.shutter_speed_secs().unwrap() - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(data.focal_length, Some(35.5));
        assert_eq!(data.aperture, Some(28.0));
        assert_eq!(data.orientation, 1);
    }

    #[test]
    fn missing_exposure_tags() {
        let mut metadata = mock(&[("Exif.Image.Orientation", text("6"))]);
        assert_eq!(metadata.iso().unwrap(), None);
        assert_eq!(metadata.shutter_speed_secs().unwrap(), None);
        assert_eq!(metadata.orientation().unwrap(), 6);
    }

    #[test]
    fn rights_data() {
        let mut metadata = mock(&[
            ("Xmp.dc.creator", RawValue::Array(vec!["Ann".into(), "Bob".into()])),
            ("Exif.Image.Artist", text("Ann")),
            (
                "Xmp.dc.rights",
                RawValue::LangAlt(vec![("x-default".into(), "All rights reserved".into())]),
            ),
            ("Xmp.xmpRights.Marked", text("True")),
        ]);
        let rights = metadata.rights_data().unwrap();
        assert_eq!(rights.creator, Some(vec!["Ann".to_string(), "Bob".to_string()]));
        assert_eq!(rights.artist.as_deref(), Some("Ann"));
        assert_eq!(
            rights.rights,
            Some(vec![("x-default".to_string(), "All rights reserved".to_string())])
        );
        assert_eq!(rights.copyright, None);
        assert_eq!(rights.marked, Some(true));
        assert_eq!(rights.usage, None);
    }
}
