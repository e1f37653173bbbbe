//! IPTC-IIM dataset stream, as embedded in the Photoshop IRB resource 0x0404.
//!
//! Each dataset is `0x1C record dataset length data`. Shorts are stored as
//! 2-byte big-endian binaries, dates as `CCYYMMDD` and times as
//! `HHMMSS±HHMM`; raw values use the readable `YYYY-MM-DD` and
//! `HH:MM:SS±HH:MM` forms.

use log::warn;

use super::RawTag;
use crate::error::{Error, Result};
use crate::registry::iptc as dict;
use crate::registry::{IptcType, TagInfo, TagType};
use crate::value::RawValue;

const MARKER: u8 = 0x1C;
const RECORD_VERSION: (u8, u8) = (2, 0);
/// IIM version 4.
const RECORD_VERSION_VALUE: [u8; 2] = [0x00, 0x04];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Dataset {
    record: u8,
    dataset: u8,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct IptcBlock {
    datasets: Vec<Dataset>,
}

impl IptcBlock {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut datasets = Vec::new();
        let mut pos = 0;
        while pos + 5 <= data.len() {
            if data[pos] != MARKER {
                // Trailing padding is common; anything after it is ignored.
                if data[pos..].iter().any(|&b| b != 0) {
                    warn!("Unexpected byte {:#04x} in IPTC data at offset {pos}", data[pos]);
                }
                break;
            }
            let record = data[pos + 1];
            let dataset = data[pos + 2];
            let len = u16::from_be_bytes([data[pos + 3], data[pos + 4]]);
            pos += 5;

            let len = if len & 0x8000 != 0 {
                // Extended dataset: the low bits give the size of the length field.
                let size = usize::from(len & 0x7fff);
                let field = data
                    .get(pos..pos + size)
                    .filter(|f| f.len() <= 8)
                    .ok_or_else(|| Error::Codec("truncated IPTC extended length".into()))?;
                pos += size;
                field.iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b))
            } else {
                usize::from(len)
            };

            let value = pos
                .checked_add(len)
                .and_then(|end| data.get(pos..end))
                .ok_or_else(|| Error::Codec(format!("IPTC dataset {record}:{dataset} is truncated")))?;
            datasets.push(Dataset {
                record,
                dataset,
                data: value.to_vec(),
            });
            pos += len;
        }
        Ok(Self { datasets })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// One key per distinct dataset, in order of first appearance.
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for d in &self.datasets {
            let key = dict::key_for(d.record, d.dataset);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    pub(crate) fn get(&self, key: &str) -> Option<RawTag> {
        let (record, dataset) = dict::locate(key)?;
        let ty = dict::type_of(record, dataset);
        let values: Vec<Vec<u8>> = self
            .datasets
            .iter()
            .filter(|d| d.record == record && d.dataset == dataset)
            .map(|d| storage_to_raw(ty, &d.data))
            .collect();
        if values.is_empty() {
            return None;
        }
        let hint = TagInfo::new(TagType::Iptc(ty), values.len() > 1);
        Some(RawTag {
            key: key.to_string(),
            raw: RawValue::Datasets(values),
            hint: Some(hint),
        })
    }

    /// Replace every occurrence of a dataset. New datasets go after the last
    /// dataset of the same record.
    pub(crate) fn set(&mut self, key: &str, raw: &RawValue) -> Result<()> {
        let (record, dataset) = dict::locate(key).ok_or_else(|| Error::invalid_key(key, "unknown IPTC dataset"))?;
        let RawValue::Datasets(values) = raw else {
            return Err(Error::conversion(raw, "IPTC datasets"));
        };
        let ty = dict::type_of(record, dataset);
        let new = values
            .iter()
            .map(|v| {
                Ok(Dataset {
                    record,
                    dataset,
                    data: raw_to_storage(ty, v)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let first = self
            .datasets
            .iter()
            .position(|d| d.record == record && d.dataset == dataset);
        self.datasets.retain(|d| !(d.record == record && d.dataset == dataset));
        let at = first.unwrap_or_else(|| {
            self.datasets
                .iter()
                .position(|d| (d.record, d.dataset) > (record, dataset))
                .unwrap_or(self.datasets.len())
        });
        self.datasets.splice(at..at, new);
        Ok(())
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        let Some((record, dataset)) = dict::locate(key) else {
            return false;
        };
        let before = self.datasets.len();
        self.datasets.retain(|d| !(d.record == record && d.dataset == dataset));
        self.datasets.len() != before
    }

    /// Serialize the stream. A record 2 without its `RecordVersion` dataset
    /// gets one ahead of its first dataset.
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut versioned = self
            .datasets
            .iter()
            .any(|d| (d.record, d.dataset) == RECORD_VERSION);
        for d in &self.datasets {
            if d.record == RECORD_VERSION.0 && !versioned {
                write_dataset(&mut out, RECORD_VERSION.0, RECORD_VERSION.1, &RECORD_VERSION_VALUE);
                versioned = true;
            }
            write_dataset(&mut out, d.record, d.dataset, &d.data);
        }
        out
    }
}

fn write_dataset(out: &mut Vec<u8>, record: u8, dataset: u8, data: &[u8]) {
    out.extend_from_slice(&[MARKER, record, dataset]);
    if data.len() < 0x8000 {
        out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    } else {
        out.extend_from_slice(&0x8004u16.to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    }
    out.extend_from_slice(data);
}

fn all_digits(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_digit)
}

/// Storage form to raw value. Malformed storage is passed through untouched.
fn storage_to_raw(ty: IptcType, data: &[u8]) -> Vec<u8> {
    match ty {
        IptcType::Short => match *data {
            [hi, lo] => i16::from_be_bytes([hi, lo]).to_string().into_bytes(),
            [b] => b.to_string().into_bytes(),
            _ => data.to_vec(),
        },
        IptcType::Date if data.len() == 8 && all_digits(data) => {
            let s = String::from_utf8_lossy(data);
            format!("{}-{}-{}", &s[0..4], &s[4..6], &s[6..8]).into_bytes()
        }
        IptcType::Time if data.len() == 6 && all_digits(data) => {
            let s = String::from_utf8_lossy(data);
            format!("{}:{}:{}+00:00", &s[0..2], &s[2..4], &s[4..6]).into_bytes()
        }
        IptcType::Time
            if data.len() == 11 && all_digits(&data[..6]) && matches!(data[6], b'+' | b'-') && all_digits(&data[7..]) =>
        {
            let s = String::from_utf8_lossy(data);
            format!("{}:{}:{}{}:{}", &s[0..2], &s[2..4], &s[4..6], &s[6..9], &s[9..11]).into_bytes()
        }
        _ => data.to_vec(),
    }
}

/// Raw value to storage form.
fn raw_to_storage(ty: IptcType, raw: &[u8]) -> Result<Vec<u8>> {
    match ty {
        IptcType::Short => {
            let text = std::str::from_utf8(raw).unwrap_or_default();
            let n: i64 = text
                .trim_start_matches('+')
                .parse()
                .map_err(|_| Error::conversion(String::from_utf8_lossy(raw), "Short"))?;
            let stored = i16::try_from(n).map_err(|_| Error::conversion(n, "Short"))?;
            Ok(stored.to_be_bytes().to_vec())
        }
        IptcType::Date if raw.len() == 10 && raw[4] == b'-' && raw[7] == b'-' => {
            Ok([&raw[0..4], &raw[5..7], &raw[8..10]].concat())
        }
        IptcType::Time if raw.len() == 14 && raw[2] == b':' && raw[5] == b':' && raw[11] == b':' => Ok([
            &raw[0..2],
            &raw[3..5],
            &raw[6..8],
            &raw[8..11],
            &raw[12..14],
        ]
        .concat()),
        _ => Ok(raw.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(datasets: &[(u8, u8, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (record, dataset, data) in datasets {
            write_dataset(&mut out, *record, *dataset, data);
        }
        out
    }

    // ── Parsing ──

    #[test]
    fn parse_converts_storage_forms() {
        let data = stream(&[
            (1, 20, &[0x00, 0x01]),
            (2, 55, b"19991013"),
            (2, 60, b"050354-1030"),
            (2, 25, b"sky"),
            (2, 25, b"sea"),
        ]);
        let block = IptcBlock::parse(&data).unwrap();
        assert_eq!(
            block.keys(),
            vec![
                "Iptc.Envelope.FileFormat",
                "Iptc.Application2.DateCreated",
                "Iptc.Application2.TimeCreated",
                "Iptc.Application2.Keywords",
            ]
        );
        assert_eq!(block.get("Iptc.Envelope.FileFormat").unwrap().raw, RawValue::datasets(["1"]));
        assert_eq!(block.get("Iptc.Application2.DateCreated").unwrap().raw, RawValue::datasets(["1999-10-13"]));
        assert_eq!(
            block.get("Iptc.Application2.TimeCreated").unwrap().raw,
            RawValue::datasets(["05:03:54-10:30"])
        );
        let keywords = block.get("Iptc.Application2.Keywords").unwrap();
        assert_eq!(keywords.raw, RawValue::datasets(["sky", "sea"]));
        assert_eq!(keywords.hint.map(|h| h.repeatable), Some(true));
    }

    #[test]
    fn extended_length_dataset() {
        let big = vec![b'x'; 0x9000];
        let data = stream(&[(2, 120, &big)]);
        assert_eq!(&data[3..5], &[0x80, 0x04]);
        let block = IptcBlock::parse(&data).unwrap();
        assert_eq!(block.get("Iptc.Application2.Caption").unwrap().raw, RawValue::Datasets(vec![big]));
    }

    #[test]
    fn oversized_extended_length_is_an_error() {
        let mut data = vec![MARKER, 2, 120, 0x80, 0x08];
        data.extend_from_slice(&[0xff; 8]);
        data.extend_from_slice(b"caption");
        assert!(matches!(IptcBlock::parse(&data), Err(Error::Codec(_))));
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let mut data = stream(&[(2, 120, b"caption")]);
        data.truncate(data.len() - 2);
        assert!(matches!(IptcBlock::parse(&data), Err(Error::Codec(_))));
    }

    #[test]
    fn unknown_datasets_use_hex_names() {
        let block = IptcBlock::parse(&stream(&[(2, 0xd6, b"x")])).unwrap();
        assert_eq!(block.keys(), vec!["Iptc.Application2.0x00d6"]);
    }

    // ── Writing ──

    #[test]
    fn set_keeps_position_and_adds_record_version() {
        let mut block = IptcBlock::parse(&stream(&[(2, 5, b"title"), (2, 120, b"caption")])).unwrap();
        block.set("Iptc.Application2.ObjectName", &RawValue::datasets(["new"])).unwrap();
        block
            .set("Iptc.Application2.Keywords", &RawValue::datasets(["a", "b"]))
            .unwrap();
        block.set("Iptc.Envelope.ModelVersion", &RawValue::datasets(["4"])).unwrap();
        assert_eq!(
            block.keys(),
            vec![
                "Iptc.Envelope.ModelVersion",
                "Iptc.Application2.ObjectName",
                "Iptc.Application2.Keywords",
                "Iptc.Application2.Caption",
            ]
        );

        let reparsed = IptcBlock::parse(&block.to_bytes()).unwrap();
        assert_eq!(reparsed.keys()[1], "Iptc.Application2.RecordVersion");
        assert_eq!(reparsed.get("Iptc.Application2.RecordVersion").unwrap().raw, RawValue::datasets(["4"]));
        assert_eq!(reparsed.get("Iptc.Application2.Keywords").unwrap().raw, RawValue::datasets(["a", "b"]));
    }

    #[test]
    fn date_and_time_storage_round_trip() {
        let mut block = IptcBlock::default();
        block.set("Iptc.Envelope.DateSent", &RawValue::datasets(["2009-02-04"])).unwrap();
        block.set("Iptc.Envelope.TimeSent", &RawValue::datasets(["10:52:04+05:30"])).unwrap();
        let bytes = block.to_bytes();
        assert!(bytes.windows(8).any(|w| w == b"20090204"));
        assert!(bytes.windows(11).any(|w| w == b"105204+0530"));
        let reparsed = IptcBlock::parse(&bytes).unwrap();
        assert_eq!(reparsed.get("Iptc.Envelope.TimeSent").unwrap().raw, RawValue::datasets(["10:52:04+05:30"]));
    }

    #[test]
    fn remove_all_occurrences() {
        let mut block = IptcBlock::parse(&stream(&[(2, 25, b"a"), (2, 120, b"c"), (2, 25, b"b")])).unwrap();
        assert!(block.remove("Iptc.Application2.Keywords"));
        assert_eq!(block.keys(), vec!["Iptc.Application2.Caption"]);
        assert!(!block.remove("Iptc.Application2.Keywords"));
    }

    #[test]
    fn short_out_of_range_rejected() {
        let mut block = IptcBlock::default();
        assert!(block.set("Iptc.Envelope.FileFormat", &RawValue::datasets(["70000"])).is_err());
        assert!(block.set("Iptc.Envelope.FileFormat", &RawValue::datasets(["40000"])).is_err());
        assert!(block.is_empty());
    }

    #[test]
    fn negative_short_round_trip() {
        let mut block = IptcBlock::default();
        block.set("Iptc.Envelope.FileFormat", &RawValue::datasets(["-4"])).unwrap();
        let bytes = block.to_bytes();
        assert!(bytes.windows(2).any(|w| w == [0xff, 0xfc]));
        let reparsed = IptcBlock::parse(&bytes).unwrap();
        assert_eq!(reparsed.get("Iptc.Envelope.FileFormat").unwrap().raw, RawValue::datasets(["-4"]));
    }
}
