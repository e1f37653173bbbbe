use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One of the three co-resident metadata standards.
///
/// The family of a key is its first dotted component, matched
/// case-insensitively:
///
/// ```rust
/// use imgmeta::Family;
///
/// assert_eq!(Family::from_key("Exif.Photo.FNumber").unwrap(), Family::Exif);
/// assert_eq!(Family::from_key("xmp.dc.subject").unwrap(), Family::Xmp);
/// assert!(Family::from_key("Png.Text.Author").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Exif,
    Iptc,
    Xmp,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Exif, Family::Iptc, Family::Xmp];

    /// Determine the family of a dotted `family.group.name` key.
    pub fn from_key(key: &str) -> Result<Self> {
        let prefix = key.split('.').next().unwrap_or_default();
        prefix
            .parse()
            .map_err(|_| Error::invalid_key(key, "family must be one of exif, iptc or xmp"))
    }

    /// Lowercase family name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Exif => "exif",
            Family::Iptc => "iptc",
            Family::Xmp => "xmp",
        }
    }

    /// Capitalized prefix used when building keys (`Exif`, `Iptc`, `Xmp`).
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Family::Exif => "Exif",
            Family::Iptc => "Iptc",
            Family::Xmp => "Xmp",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Family::Exif => 0,
            Family::Iptc => 1,
            Family::Xmp => 2,
        }
    }
}

impl FromStr for Family {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exif" => Ok(Family::Exif),
            "iptc" => Ok(Family::Iptc),
            "xmp" => Ok(Family::Xmp),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key split into its components. XMP names may themselves contain dots
/// only after the prefix, so everything past the group is the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyParts<'a> {
    pub family: Family,
    pub group: &'a str,
    pub name: &'a str,
}

/// Split and validate a `family.group.name` key.
pub(crate) fn split_key(key: &str) -> Result<KeyParts<'_>> {
    let family = Family::from_key(key)?;
    let mut parts = key.splitn(3, '.');
    parts.next();
    let group = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    if group.is_empty() || name.is_empty() {
        return Err(Error::invalid_key(key, "expected family.group.name"));
    }
    Ok(KeyParts { family, group, name })
}

/// Parse a `0x1234`-style hexadecimal tag name.
pub(crate) fn parse_hex_name(name: &str) -> Option<u16> {
    let digits = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X"))?;
    u16::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_is_case_insensitive() {
        assert_eq!(Family::from_key("EXIF.Image.Make").unwrap(), Family::Exif);
        assert_eq!(Family::from_key("iptc.Envelope.DateSent").unwrap(), Family::Iptc);
        assert_eq!(Family::from_key("Xmp.dc.title").unwrap(), Family::Xmp);
    }

    #[test]
    fn unknown_family_rejected() {
        assert!(matches!(
            Family::from_key("Foo.Bar.Baz"),
            Err(Error::InvalidKey { .. })
        ));
        assert!(Family::from_key("").is_err());
        assert!(Family::from_key("exiff.Image.Make").is_err());
    }

    #[test]
    fn split_key_components() {
        let parts = split_key("Exif.Photo.UserComment").unwrap();
        assert_eq!(parts.family, Family::Exif);
        assert_eq!(parts.group, "Photo");
        assert_eq!(parts.name, "UserComment");
    }

    #[test]
    fn split_key_requires_three_parts() {
        assert!(split_key("Exif.Photo").is_err());
        assert!(split_key("Exif..Make").is_err());
        assert!(split_key("Xmp.dc.").is_err());
    }

    #[test]
    fn hex_names() {
        assert_eq!(parse_hex_name("0x9c9b"), Some(0x9c9b));
        assert_eq!(parse_hex_name("0x00d6"), Some(0xd6));
        assert_eq!(parse_hex_name("Make"), None);
        assert_eq!(parse_hex_name("0xZZ"), None);
    }
}
