//! IPTC character set policy.
//!
//! IIM declares its coded character set in `Iptc.Envelope.CharacterSet` using
//! ISO 2022 escape sequences. The only one supported here is `ESC % G`,
//! meaning UTF-8. Without a marker, strings are read as UTF-8 when they
//! validate and as ISO-8859-1 otherwise.

use crate::error::{Error, Result};

pub(crate) const CHARSET_KEY: &str = "Iptc.Envelope.CharacterSet";

/// ISO 2022 escape sequence declaring UTF-8.
pub const UTF8_ESCAPE: &[u8] = b"\x1b%G";

const UTF8_ALIASES: &[&str] = &["utf-8", "utf8", "utf_8", "u8", "utf"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Charset {
    /// No declared charset.
    #[default]
    Legacy,
    Utf8,
}

impl Charset {
    /// Charset for a user-supplied name. Only UTF-8 and its aliases are known.
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.to_ascii_lowercase();
        if UTF8_ALIASES.contains(&lower.as_str()) {
            Ok(Charset::Utf8)
        } else {
            Err(Error::UnsupportedCharset(name.to_string()))
        }
    }

    /// Charset declared by an envelope marker, if recognized.
    pub fn from_marker(marker: &[u8]) -> Option<Self> {
        (marker == UTF8_ESCAPE).then_some(Charset::Utf8)
    }

    pub fn marker(&self) -> Option<&'static [u8]> {
        match self {
            Charset::Legacy => None,
            Charset::Utf8 => Some(UTF8_ESCAPE),
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        match self {
            Charset::Legacy => None,
            Charset::Utf8 => Some("utf-8"),
        }
    }

    /// Decode a stored IPTC string.
    pub fn decode_text(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|_| Error::conversion(String::from_utf8_lossy(bytes), "UTF-8 string")),
            Charset::Legacy => Ok(match std::str::from_utf8(bytes) {
                Ok(s) => s.to_string(),
                Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_aliases() {
        for name in ["utf-8", "UTF-8", "utf8", "u8", "utf", "UTF_8"] {
            assert_eq!(Charset::from_name(name).unwrap(), Charset::Utf8, "{name}");
        }
        assert!(matches!(
            Charset::from_name("latin-1"),
            Err(Error::UnsupportedCharset(name)) if name == "latin-1"
        ));
    }

    #[test]
    fn marker_round_trip() {
        assert_eq!(Charset::from_marker(b"\x1b%G"), Some(Charset::Utf8));
        assert_eq!(Charset::from_marker(b"\x1b-A"), None);
        assert_eq!(Charset::Utf8.marker(), Some(UTF8_ESCAPE));
        assert_eq!(Charset::Legacy.marker(), None);
    }

    #[test]
    fn legacy_falls_back_to_latin1() {
        assert_eq!(Charset::Legacy.decode_text("déjà".as_bytes()).unwrap(), "déjà");
        assert_eq!(Charset::Legacy.decode_text(b"d\xe9j\xe0").unwrap(), "déjà");
    }

    #[test]
    fn utf8_is_strict() {
        assert!(matches!(
            Charset::Utf8.decode_text(b"d\xe9j\xe0"),
            Err(Error::ValueConversion { .. })
        ));
    }
}
