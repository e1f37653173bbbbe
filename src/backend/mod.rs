//! Storage backends.
//!
//! A backend owns the bytes of one image and the metadata blocks parsed out of
//! it. It speaks raw values only; typing happens in [`Tag`](crate::Tag).
//!
//! The crate ships [`JpegImage`], which handles EXIF (APP1), XMP (APP1),
//! IPTC (APP13) and the JPEG comment. Other containers can be supported by
//! implementing [`ImageBackend`] and passing it to
//! [`ImageMetadata::with_backend`](crate::ImageMetadata::with_backend).

mod iim;
mod jpeg;
mod tiff;
mod xmp;

pub use jpeg::JpegImage;

use std::path::PathBuf;

use log::debug;

use crate::error::{Error, Result};
use crate::key::Family;
use crate::preview::Preview;
use crate::registry::TagInfo;
use crate::value::RawValue;

/// A raw value as read from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTag {
    pub key: String,
    pub raw: RawValue,
    /// Type and repeatability derived from how the value is stored, for keys
    /// the registry does not list.
    pub hint: Option<TagInfo>,
}

/// Where image bytes come from.
#[derive(Debug, Clone)]
pub enum Source {
    Path(PathBuf),
    Buffer(Vec<u8>),
}

/// The metadata codec behind an [`ImageMetadata`](crate::ImageMetadata).
pub trait ImageBackend {
    /// Parse the metadata blocks of the image.
    fn read_metadata(&mut self) -> Result<()>;
    /// Serialize the metadata blocks back into the image, and into its file
    /// when it was opened from a path.
    fn write_metadata(&mut self) -> Result<()>;

    /// Keys of the stored tags of a family, in storage order.
    fn keys(&self, family: Family) -> Vec<String>;
    fn get_tag(&self, family: Family, key: &str) -> Result<RawTag>;
    fn set_tag(&mut self, family: Family, key: &str, raw: &RawValue) -> Result<()>;
    fn delete_tag(&mut self, family: Family, key: &str) -> Result<()>;

    fn pixel_dimensions(&self) -> Result<(u32, u32)>;
    fn mime_type(&self) -> String;
    fn comment(&self) -> Option<String>;
    fn set_comment(&mut self, comment: &str);
    fn clear_comment(&mut self);
    /// The full image file as it would be written.
    fn data_buffer(&self) -> Result<Vec<u8>>;
    fn previews(&self) -> Vec<Preview>;

    /// JPEG thumbnail stored with the EXIF data.
    fn thumbnail(&self) -> Option<Vec<u8>>;
    /// Replace the EXIF thumbnail, or erase it with `None`.
    fn set_thumbnail(&mut self, data: Option<&[u8]>) -> Result<()>;
}

/// Open the bundled backend for a source.
pub fn open(source: Source) -> Result<Box<dyn ImageBackend>> {
    let (data, path) = match source {
        Source::Path(path) => {
            if !path.is_file() {
                return Err(Error::NotFound(path));
            }
            debug!("Reading {}", path.display());
            (std::fs::read(&path)?, Some(path))
        }
        Source::Buffer(data) => (data, None),
    };
    if !jpeg::is_jpeg(&data) {
        let kind = image::guess_format(&data)
            .map(|f| format!("{f:?}"))
            .unwrap_or_else(|_| "unknown".to_string());
        return Err(Error::UnsupportedFormat(kind));
    }
    Ok(Box::new(JpegImage::new(data, path)))
}

/// Replace the selected families of `dst` with those of `src`.
pub fn copy_metadata(
    src: &dyn ImageBackend,
    dst: &mut dyn ImageBackend,
    families: &[Family],
) -> Result<()> {
    for &family in families {
        for key in dst.keys(family) {
            dst.delete_tag(family, &key)?;
        }
        if family == Family::Exif {
            dst.set_thumbnail(src.thumbnail().as_deref())?;
        }
        for key in src.keys(family) {
            let tag = src.get_tag(family, &key)?;
            dst.set_tag(family, &key, &tag.raw)?;
        }
        debug!("Copied {} metadata", family);
    }
    Ok(())
}
