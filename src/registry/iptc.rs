use std::collections::HashMap;
use std::sync::LazyLock;

use super::{IptcType, TagInfo, TagType};
use crate::key::{parse_hex_name, split_key};

#[derive(Debug, Clone, Copy)]
pub(crate) struct IptcDef {
    pub record: u8,
    pub dataset: u8,
    pub name: &'static str,
    pub ty: IptcType,
    pub repeatable: bool,
}

impl IptcDef {
    pub(crate) fn info(&self) -> TagInfo {
        TagInfo::new(TagType::Iptc(self.ty), self.repeatable)
    }
}

/// IIM record numbers and their key groups.
const RECORDS: &[(u8, &str)] = &[
    (1, "Envelope"),
    (2, "Application2"),
    (3, "NewsPhoto"),
    (7, "PreObjectData"),
    (8, "ObjectData"),
    (9, "PostObjectData"),
];

pub(crate) fn record_name(record: u8) -> Option<&'static str> {
    RECORDS.iter().find(|(n, _)| *n == record).map(|(_, name)| *name)
}

fn record_number(name: &str) -> Option<u8> {
    RECORDS.iter().find(|(_, n)| *n == name).map(|(num, _)| *num)
}

use IptcType::{Date, Short, String as Str, Time, Undefined};

const fn def(record: u8, dataset: u8, name: &'static str, ty: IptcType, repeatable: bool) -> IptcDef {
    IptcDef { record, dataset, name, ty, repeatable }
}

static IPTC_TAGS: &[IptcDef] = &[
    // Envelope record
    def(1, 0, "ModelVersion", Short, false),
    def(1, 5, "Destination", Str, true),
    def(1, 20, "FileFormat", Short, false),
    def(1, 22, "FileVersion", Short, false),
    def(1, 30, "ServiceId", Str, false),
    def(1, 40, "EnvelopeNumber", Str, false),
    def(1, 50, "ProductId", Str, true),
    def(1, 60, "EnvelopePriority", Str, false),
    def(1, 70, "DateSent", Date, false),
    def(1, 80, "TimeSent", Time, false),
    def(1, 90, "CharacterSet", Undefined, false),
    def(1, 100, "UNO", Str, false),
    def(1, 120, "ARMId", Short, false),
    def(1, 122, "ARMVersion", Short, false),
    // Application record
    def(2, 0, "RecordVersion", Short, false),
    def(2, 3, "ObjectType", Str, false),
    def(2, 4, "ObjectAttribute", Str, true),
    def(2, 5, "ObjectName", Str, false),
    def(2, 7, "EditStatus", Str, false),
    def(2, 8, "EditorialUpdate", Str, false),
    def(2, 10, "Urgency", Str, false),
    def(2, 12, "Subject", Str, true),
    def(2, 15, "Category", Str, false),
    def(2, 20, "SuppCategory", Str, true),
    def(2, 22, "FixtureId", Str, false),
    def(2, 25, "Keywords", Str, true),
    def(2, 26, "LocationCode", Str, true),
    def(2, 27, "LocationName", Str, true),
    def(2, 30, "ReleaseDate", Date, false),
    def(2, 35, "ReleaseTime", Time, false),
    def(2, 37, "ExpirationDate", Date, false),
    def(2, 38, "ExpirationTime", Time, false),
    def(2, 40, "SpecialInstructions", Str, false),
    def(2, 42, "ActionAdvised", Str, false),
    def(2, 45, "ReferenceService", Str, true),
    def(2, 47, "ReferenceDate", Date, true),
    def(2, 50, "ReferenceNumber", Str, true),
    def(2, 55, "DateCreated", Date, false),
    def(2, 60, "TimeCreated", Time, false),
    def(2, 62, "DigitizationDate", Date, false),
    def(2, 63, "DigitizationTime", Time, false),
    def(2, 65, "Program", Str, false),
    def(2, 70, "ProgramVersion", Str, false),
    def(2, 75, "ObjectCycle", Str, false),
    def(2, 80, "Byline", Str, true),
    def(2, 85, "BylineTitle", Str, true),
    def(2, 90, "City", Str, false),
    def(2, 92, "SubLocation", Str, false),
    def(2, 95, "ProvinceState", Str, false),
    def(2, 100, "CountryCode", Str, false),
    def(2, 101, "CountryName", Str, false),
    def(2, 103, "TransmissionReference", Str, false),
    def(2, 105, "Headline", Str, false),
    def(2, 110, "Credit", Str, false),
    def(2, 115, "Source", Str, false),
    def(2, 116, "Copyright", Str, false),
    def(2, 118, "Contact", Str, true),
    def(2, 120, "Caption", Str, false),
    def(2, 122, "Writer", Str, true),
    def(2, 125, "RasterizedCaption", Undefined, false),
    def(2, 130, "ImageType", Str, false),
    def(2, 131, "ImageOrientation", Str, false),
    def(2, 135, "Language", Str, false),
    def(2, 150, "AudioType", Str, false),
    def(2, 151, "AudioRate", Str, false),
    def(2, 152, "AudioResolution", Str, false),
    def(2, 153, "AudioDuration", Str, false),
    def(2, 154, "AudioOutcue", Str, false),
    def(2, 200, "PreviewFormat", Short, false),
    def(2, 201, "PreviewVersion", Short, false),
    def(2, 202, "Preview", Undefined, false),
];

static BY_NAME: LazyLock<HashMap<String, &'static IptcDef>> = LazyLock::new(|| {
    IPTC_TAGS
        .iter()
        .filter_map(|d| Some((format!("{}.{}", record_name(d.record)?, d.name), d)))
        .collect()
});

static BY_NUMBER: LazyLock<HashMap<(u8, u8), &'static IptcDef>> =
    LazyLock::new(|| IPTC_TAGS.iter().map(|d| ((d.record, d.dataset), d)).collect());

pub(crate) fn lookup(key: &str) -> Option<&'static IptcDef> {
    let (_, path) = key.split_once('.')?;
    BY_NAME.get(path).copied()
}

pub(crate) fn by_number(record: u8, dataset: u8) -> Option<&'static IptcDef> {
    BY_NUMBER.get(&(record, dataset)).copied()
}

/// Record and dataset numbers of a key. Accepts hex dataset names.
pub(crate) fn locate(key: &str) -> Option<(u8, u8)> {
    if let Some(def) = lookup(key) {
        return Some((def.record, def.dataset));
    }
    let parts = split_key(key).ok()?;
    let record = record_number(parts.group)?;
    let dataset = u8::try_from(parse_hex_name(parts.name)?).ok()?;
    Some((record, dataset))
}

/// Key naming a dataset; unlisted datasets get a hex name.
pub(crate) fn key_for(record: u8, dataset: u8) -> String {
    let group = match record_name(record) {
        Some(name) => name.to_string(),
        None => format!("{record:#06x}"),
    };
    match by_number(record, dataset) {
        Some(def) => format!("Iptc.{group}.{}", def.name),
        None => format!("Iptc.{group}.{dataset:#06x}"),
    }
}

/// Declared type of a stored dataset, defaulting to String.
pub(crate) fn type_of(record: u8, dataset: u8) -> IptcType {
    by_number(record, dataset).map(|d| d.ty).unwrap_or(IptcType::String)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_named_and_hex() {
        assert_eq!(locate("Iptc.Envelope.CharacterSet"), Some((1, 90)));
        assert_eq!(locate("Iptc.Application2.Keywords"), Some((2, 25)));
        assert_eq!(locate("Iptc.Application2.0x00d6"), Some((2, 0xd6)));
        assert_eq!(locate("Iptc.Application2.0x1234"), None);
        assert_eq!(locate("Iptc.Nowhere.Keywords"), None);
    }

    #[test]
    fn key_names() {
        assert_eq!(key_for(2, 120), "Iptc.Application2.Caption");
        assert_eq!(key_for(2, 0xd6), "Iptc.Application2.0x00d6");
    }

    #[test]
    fn unknown_dataset_type() {
        assert_eq!(type_of(2, 0xd6), IptcType::String);
        assert_eq!(type_of(1, 20), IptcType::Short);
    }
}
