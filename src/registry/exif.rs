use std::collections::HashMap;
use std::sync::LazyLock;

use super::{ExifType, TagInfo, TagType};
use crate::key::{parse_hex_name, split_key};

// NB: not the full dictionary; vendor and rarely used tags resolve through
// their hexadecimal names (`Exif.Photo.0xa460`).

/// IFD a tag lives in, named after the key group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ExifGroup {
    Image,
    Photo,
    GpsInfo,
    Iop,
    Thumbnail,
}

impl ExifGroup {
    pub(crate) const ALL: [ExifGroup; 5] = [
        ExifGroup::Image,
        ExifGroup::Photo,
        ExifGroup::GpsInfo,
        ExifGroup::Iop,
        ExifGroup::Thumbnail,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            ExifGroup::Image => "Image",
            ExifGroup::Photo => "Photo",
            ExifGroup::GpsInfo => "GPSInfo",
            ExifGroup::Iop => "Iop",
            ExifGroup::Thumbnail => "Thumbnail",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.name() == name)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ExifGroup::Image => 0,
            ExifGroup::Photo => 1,
            ExifGroup::GpsInfo => 2,
            ExifGroup::Iop => 3,
            ExifGroup::Thumbnail => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ExifDef {
    pub group: ExifGroup,
    pub name: &'static str,
    pub id: u16,
    pub ty: ExifType,
    pub repeatable: bool,
}

impl ExifDef {
    pub(crate) fn info(&self) -> TagInfo {
        TagInfo::new(TagType::Exif(self.ty), self.repeatable)
    }
}

use ExifGroup::{GpsInfo, Image, Iop, Photo, Thumbnail};
use ExifType::*;

const fn def(group: ExifGroup, name: &'static str, id: u16, ty: ExifType, repeatable: bool) -> ExifDef {
    ExifDef { group, name, id, ty, repeatable }
}

static EXIF_TAGS: &[ExifDef] = &[
    // IFD0
    def(Image, "ProcessingSoftware", 0x000b, Ascii, false),
    def(Image, "NewSubfileType", 0x00fe, Long, false),
    def(Image, "ImageWidth", 0x0100, Long, false),
    def(Image, "ImageLength", 0x0101, Long, false),
    def(Image, "BitsPerSample", 0x0102, Short, true),
    def(Image, "Compression", 0x0103, Short, false),
    def(Image, "PhotometricInterpretation", 0x0106, Short, false),
    def(Image, "DocumentName", 0x010d, Ascii, false),
    def(Image, "ImageDescription", 0x010e, Ascii, false),
    def(Image, "Make", 0x010f, Ascii, false),
    def(Image, "Model", 0x0110, Ascii, false),
    def(Image, "Orientation", 0x0112, Short, false),
    def(Image, "SamplesPerPixel", 0x0115, Short, false),
    def(Image, "XResolution", 0x011a, Rational, false),
    def(Image, "YResolution", 0x011b, Rational, false),
    def(Image, "PlanarConfiguration", 0x011c, Short, false),
    def(Image, "ResolutionUnit", 0x0128, Short, false),
    def(Image, "TransferFunction", 0x012d, Short, true),
    def(Image, "Software", 0x0131, Ascii, false),
    def(Image, "DateTime", 0x0132, Ascii, false),
    def(Image, "Artist", 0x013b, Ascii, false),
    def(Image, "HostComputer", 0x013c, Ascii, false),
    def(Image, "WhitePoint", 0x013e, Rational, true),
    def(Image, "PrimaryChromaticities", 0x013f, Rational, true),
    def(Image, "YCbCrCoefficients", 0x0211, Rational, true),
    def(Image, "YCbCrSubSampling", 0x0212, Short, true),
    def(Image, "YCbCrPositioning", 0x0213, Short, false),
    def(Image, "ReferenceBlackWhite", 0x0214, Rational, true),
    def(Image, "Rating", 0x4746, Short, false),
    def(Image, "RatingPercent", 0x4749, Short, false),
    def(Image, "Copyright", 0x8298, Ascii, false),
    def(Image, "XPTitle", 0x9c9b, Byte, true),
    def(Image, "XPComment", 0x9c9c, Byte, true),
    def(Image, "XPAuthor", 0x9c9d, Byte, true),
    def(Image, "XPKeywords", 0x9c9e, Byte, true),
    def(Image, "XPSubject", 0x9c9f, Byte, true),
    // Exif IFD
    def(Photo, "ExposureTime", 0x829a, Rational, false),
    def(Photo, "FNumber", 0x829d, Rational, false),
    def(Photo, "ExposureProgram", 0x8822, Short, false),
    def(Photo, "SpectralSensitivity", 0x8824, Ascii, false),
    def(Photo, "ISOSpeedRatings", 0x8827, Short, false),
    def(Photo, "SensitivityType", 0x8830, Short, false),
    def(Photo, "ExifVersion", 0x9000, Undefined, false),
    def(Photo, "DateTimeOriginal", 0x9003, Ascii, false),
    def(Photo, "DateTimeDigitized", 0x9004, Ascii, false),
    def(Photo, "OffsetTime", 0x9010, Ascii, false),
    def(Photo, "OffsetTimeOriginal", 0x9011, Ascii, false),
    def(Photo, "OffsetTimeDigitized", 0x9012, Ascii, false),
    def(Photo, "ComponentsConfiguration", 0x9101, Undefined, false),
    def(Photo, "CompressedBitsPerPixel", 0x9102, Rational, false),
    def(Photo, "ShutterSpeedValue", 0x9201, SRational, false),
    def(Photo, "ApertureValue", 0x9202, Rational, false),
    def(Photo, "BrightnessValue", 0x9203, SRational, false),
    def(Photo, "ExposureBiasValue", 0x9204, SRational, false),
    def(Photo, "MaxApertureValue", 0x9205, Rational, false),
    def(Photo, "SubjectDistance", 0x9206, Rational, false),
    def(Photo, "MeteringMode", 0x9207, Short, false),
    def(Photo, "LightSource", 0x9208, Short, false),
    def(Photo, "Flash", 0x9209, Short, false),
    def(Photo, "FocalLength", 0x920a, Rational, false),
    def(Photo, "SubjectArea", 0x9214, Short, true),
    def(Photo, "MakerNote", 0x927c, Undefined, false),
    def(Photo, "UserComment", 0x9286, Comment, false),
    def(Photo, "SubSecTime", 0x9290, Ascii, false),
    def(Photo, "SubSecTimeOriginal", 0x9291, Ascii, false),
    def(Photo, "SubSecTimeDigitized", 0x9292, Ascii, false),
    def(Photo, "FlashpixVersion", 0xa000, Undefined, false),
    def(Photo, "ColorSpace", 0xa001, Short, false),
    def(Photo, "PixelXDimension", 0xa002, Long, false),
    def(Photo, "PixelYDimension", 0xa003, Long, false),
    def(Photo, "RelatedSoundFile", 0xa004, Ascii, false),
    def(Photo, "FocalPlaneXResolution", 0xa20e, Rational, false),
    def(Photo, "FocalPlaneYResolution", 0xa20f, Rational, false),
    def(Photo, "FocalPlaneResolutionUnit", 0xa210, Short, false),
    def(Photo, "SensingMethod", 0xa217, Short, false),
    def(Photo, "FileSource", 0xa300, Undefined, false),
    def(Photo, "SceneType", 0xa301, Undefined, false),
    def(Photo, "CustomRendered", 0xa401, Short, false),
    def(Photo, "ExposureMode", 0xa402, Short, false),
    def(Photo, "WhiteBalance", 0xa403, Short, false),
    def(Photo, "DigitalZoomRatio", 0xa404, Rational, false),
    def(Photo, "FocalLengthIn35mmFilm", 0xa405, Short, false),
    def(Photo, "SceneCaptureType", 0xa406, Short, false),
    def(Photo, "GainControl", 0xa407, Short, false),
    def(Photo, "Contrast", 0xa408, Short, false),
    def(Photo, "Saturation", 0xa409, Short, false),
    def(Photo, "Sharpness", 0xa40a, Short, false),
    def(Photo, "SubjectDistanceRange", 0xa40c, Short, false),
    def(Photo, "ImageUniqueID", 0xa420, Ascii, false),
    def(Photo, "CameraOwnerName", 0xa430, Ascii, false),
    def(Photo, "BodySerialNumber", 0xa431, Ascii, false),
    def(Photo, "LensSpecification", 0xa432, Rational, true),
    def(Photo, "LensMake", 0xa433, Ascii, false),
    def(Photo, "LensModel", 0xa434, Ascii, false),
    def(Photo, "LensSerialNumber", 0xa435, Ascii, false),
    // GPS IFD
    def(GpsInfo, "GPSVersionID", 0x0000, Byte, true),
    def(GpsInfo, "GPSLatitudeRef", 0x0001, Ascii, false),
    def(GpsInfo, "GPSLatitude", 0x0002, Rational, true),
    def(GpsInfo, "GPSLongitudeRef", 0x0003, Ascii, false),
    def(GpsInfo, "GPSLongitude", 0x0004, Rational, true),
    def(GpsInfo, "GPSAltitudeRef", 0x0005, Byte, false),
    def(GpsInfo, "GPSAltitude", 0x0006, Rational, false),
    def(GpsInfo, "GPSTimeStamp", 0x0007, Rational, true),
    def(GpsInfo, "GPSSatellites", 0x0008, Ascii, false),
    def(GpsInfo, "GPSStatus", 0x0009, Ascii, false),
    def(GpsInfo, "GPSMeasureMode", 0x000a, Ascii, false),
    def(GpsInfo, "GPSDOP", 0x000b, Rational, false),
    def(GpsInfo, "GPSSpeedRef", 0x000c, Ascii, false),
    def(GpsInfo, "GPSSpeed", 0x000d, Rational, false),
    def(GpsInfo, "GPSImgDirectionRef", 0x0010, Ascii, false),
    def(GpsInfo, "GPSImgDirection", 0x0011, Rational, false),
    def(GpsInfo, "GPSMapDatum", 0x0012, Ascii, false),
    def(GpsInfo, "GPSDateStamp", 0x001d, Ascii, false),
    // Interoperability IFD
    def(Iop, "InteroperabilityIndex", 0x0001, Ascii, false),
    def(Iop, "InteroperabilityVersion", 0x0002, Undefined, false),
    // IFD1
    def(Thumbnail, "Compression", 0x0103, Short, false),
    def(Thumbnail, "Orientation", 0x0112, Short, false),
    def(Thumbnail, "XResolution", 0x011a, Rational, false),
    def(Thumbnail, "YResolution", 0x011b, Rational, false),
    def(Thumbnail, "ResolutionUnit", 0x0128, Short, false),
];

/// Keyed by `Group.Name`, the key without its family prefix.
static BY_NAME: LazyLock<HashMap<String, &'static ExifDef>> = LazyLock::new(|| {
    EXIF_TAGS
        .iter()
        .map(|d| (format!("{}.{}", d.group.name(), d.name), d))
        .collect()
});

static BY_ID: LazyLock<HashMap<(ExifGroup, u16), &'static ExifDef>> =
    LazyLock::new(|| EXIF_TAGS.iter().map(|d| ((d.group, d.id), d)).collect());

/// Dictionary entry for a named key (hex names are not listed).
pub(crate) fn lookup(key: &str) -> Option<&'static ExifDef> {
    let (_, path) = key.split_once('.')?;
    BY_NAME.get(path).copied()
}

/// Storage location of a key: its IFD and tag id. Accepts hex names.
pub(crate) fn locate(key: &str) -> Option<(ExifGroup, u16)> {
    let parts = split_key(key).ok()?;
    let group = ExifGroup::from_name(parts.group)?;
    if let Some(def) = lookup(key) {
        return Some((group, def.id));
    }
    parse_hex_name(parts.name).map(|id| (group, id))
}

pub(crate) fn by_id(group: ExifGroup, id: u16) -> Option<&'static ExifDef> {
    BY_ID.get(&(group, id)).copied()
}

/// Key naming a stored entry; unlisted ids get a hex name.
pub(crate) fn key_for(group: ExifGroup, id: u16) -> String {
    match by_id(group, id) {
        Some(def) => format!("Exif.{}.{}", group.name(), def.name),
        None => format!("Exif.{}.{:#06x}", group.name(), id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_named_and_hex() {
        assert_eq!(locate("Exif.Photo.UserComment"), Some((ExifGroup::Photo, 0x9286)));
        assert_eq!(locate("Exif.Image.0x9999"), Some((ExifGroup::Image, 0x9999)));
        assert_eq!(locate("Exif.Nowhere.Make"), None);
        assert_eq!(locate("Exif.Image.NotATag"), None);
    }

    #[test]
    fn key_round_trip() {
        assert_eq!(key_for(ExifGroup::GpsInfo, 0x0002), "Exif.GPSInfo.GPSLatitude");
        assert_eq!(key_for(ExifGroup::Photo, 0xa460), "Exif.Photo.0xa460");
        assert_eq!(locate(&key_for(ExifGroup::Photo, 0xa460)), Some((ExifGroup::Photo, 0xa460)));
    }

    #[test]
    fn no_duplicate_ids_per_group() {
        let mut seen = std::collections::HashSet::new();
        for d in EXIF_TAGS {
            assert!(seen.insert((d.group, d.id)), "duplicate {}", d.name);
        }
    }
}
