use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by metadata operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The image source does not exist or is not a regular file.
    #[error("No such file: {}", .0.display())]
    NotFound(PathBuf),

    /// Metadata was accessed before [`ImageMetadata::read`](crate::ImageMetadata::read).
    #[error("Image metadata has not been read yet")]
    Unbound,

    /// No tag with this key is present.
    #[error("Tag not found: {0}")]
    KeyNotFound(String),

    /// The key is not a well-formed `family.group.name` identifier.
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// A raw or native value falls outside the domain of the declared type.
    #[error("Invalid value '{value}' for type {expected}")]
    ValueConversion { value: String, expected: String },

    /// A scalar was given for a repeatable tag, or a sequence for a single one.
    #[error("Tag {key} {reason}")]
    Cardinality { key: String, reason: String },

    /// The IPTC character set has no defined envelope marker.
    #[error("Unsupported IPTC charset: {0}")]
    UnsupportedCharset(String),

    /// An XMP namespace registration was rejected.
    #[error("Invalid XMP namespace: {0}")]
    InvalidNamespace(String),

    /// The backend cannot handle this kind of image.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The image container or a metadata block could not be parsed or rebuilt.
    #[error("Metadata codec error: {0}")]
    Codec(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn conversion(value: impl std::fmt::Display, expected: impl std::fmt::Display) -> Self {
        Error::ValueConversion {
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Error::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<img_parts::Error> for Error {
    fn from(err: img_parts::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<exif::Error> for Error {
    fn from(err: exif::Error) -> Self {
        Error::Codec(format!("EXIF: {err}"))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Codec(err.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, Error>;
