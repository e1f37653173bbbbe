//! # imgmeta
//!
//! Typed access to the EXIF, IPTC and XMP metadata of image files.
//!
//! Tags are addressed by dotted `family.group.name` keys such as
//! `Exif.Image.Make`, `Iptc.Application2.Keywords` or `Xmp.dc.subject`. Each
//! tag has a declared type from the built-in registry and converts between
//! its stored string/byte form and a native [`Value`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgmeta::{ImageMetadata, Value};
//!
//! fn main() -> imgmeta::Result<()> {
//!     let mut metadata = ImageMetadata::new("photo.jpg");
//!     metadata.read()?;
//!
//!     for key in metadata.all_keys()? {
//!         println!("{}", metadata.get(&key)?);
//!     }
//!
//!     let exposure = metadata.exposure_data()?;
//!     println!("ISO {:?}, f/{:?}", exposure.iso, exposure.aperture);
//!
//!     metadata.set("Xmp.dc.rights", Value::lang_default("All rights reserved"))?;
//!     metadata.set_iptc_charset(Some("utf-8"))?;
//!     metadata.set("Iptc.Application2.City", "Zürich")?;
//!     metadata.write(true)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Metadata |
//! |--------|----------|
//! | JPEG (`.jpg`, `.jpeg`) | EXIF (APP1), XMP (APP1), IPTC (APP13), comment (COM), EXIF thumbnail |
//!
//! Other containers can be plugged in through [`backend::ImageBackend`].
//!
//! ## Modules
//!
//! - [`backend`]: Storage backends and the bundled JPEG codec
//! - [`config`]: Configuration types and loading/saving

pub mod backend;
mod charset;
pub mod config;
mod convert;
mod error;
mod key;
mod metadata;
mod preview;
mod registry;
mod tag;
mod value;

pub use backend::JpegImage;
pub use charset::{Charset, UTF8_ESCAPE};
pub use config::{Config, WriteOptions};
pub use error::{Error, Result};
pub use key::Family;
pub use metadata::{CopyOptions, ExposureData, ImageMetadata, RightsData};
pub use preview::Preview;
pub use registry::{
    ExifType, IptcType, TagInfo, TagType, XmpScalar, XmpType, lookup, namespace_prefix,
    namespace_uri, register_namespace, resolve, unregister_namespace,
};
pub use tag::Tag;
pub use value::{RawValue, Rational, Value};

#[cfg(test)]
pub(crate) mod testutil {
    /// A small baseline JPEG with no metadata segments.
    pub(crate) fn jpeg_fixture() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 120, 40]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }
}
