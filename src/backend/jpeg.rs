//! JPEG container backend.
//!
//! Metadata lives in marker segments: EXIF and XMP in APP1, IPTC inside the
//! Photoshop APP13 resource block, the comment in COM. On write the old
//! segments are dropped and fresh ones are inserted after APP0, in the order
//! EXIF, XMP, APP13, COM. Every other segment is kept as is.

use std::io::Cursor;
use std::path::PathBuf;

use img_parts::Bytes;
use img_parts::jpeg::{Jpeg, JpegSegment};
use log::{debug, info, warn};

use super::iim::IptcBlock;
use super::tiff::ExifBlock;
use super::xmp::XmpPacket;
use super::{ImageBackend, RawTag};
use crate::error::{Error, Result};
use crate::key::Family;
use crate::preview::Preview;
use crate::value::RawValue;

const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
const MARKER_APP13: u8 = 0xED;
const MARKER_COM: u8 = 0xFE;

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const IPTC_HEADER: &[u8] = b"Photoshop 3.0\0";
const IPTC_8BIM: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;

/// Largest segment payload: the 16-bit length field counts itself.
const MAX_SEGMENT_CONTENTS: usize = 65533;

pub(crate) fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8, 0xFF])
}

/// An in-memory JPEG file and its parsed metadata blocks.
#[derive(Debug, Clone)]
pub struct JpegImage {
    data: Vec<u8>,
    path: Option<PathBuf>,
    loaded: bool,
    exif: ExifBlock,
    iptc: IptcBlock,
    xmp: XmpPacket,
    comment: Option<String>,
}

impl JpegImage {
    /// Wrap JPEG bytes. With a path, [`write_metadata`](ImageBackend::write_metadata)
    /// also rewrites that file.
    pub fn new(data: Vec<u8>, path: Option<PathBuf>) -> Self {
        Self {
            data,
            path,
            loaded: false,
            exif: ExifBlock::new(),
            iptc: IptcBlock::default(),
            xmp: XmpPacket::default(),
            comment: None,
        }
    }

    fn parse(&self) -> Result<Jpeg> {
        Ok(Jpeg::from_bytes(Bytes::from(self.data.clone()))?)
    }

    /// The file with the current metadata blocks in place of the stored ones.
    fn render(&self) -> Result<Vec<u8>> {
        let mut jpeg = self.parse()?;
        let segments = jpeg.segments_mut();

        let app13 = segments
            .iter()
            .position(|s| is_iptc_segment(s))
            .map(|pos| segments.remove(pos).contents().to_vec());
        segments.retain(|s| !is_exif_segment(s) && !is_xmp_segment(s) && s.marker() != MARKER_COM);

        let mut fresh = Vec::new();
        if !self.exif.is_empty() {
            let mut contents = EXIF_PREFIX.to_vec();
            contents.extend_from_slice(&self.exif.to_bytes()?);
            fresh.push(new_segment(MARKER_APP1, contents, "EXIF")?);
        }
        if !self.xmp.is_empty() {
            let mut contents = XMP_HEADER.to_vec();
            contents.extend_from_slice(self.xmp.to_xml().as_bytes());
            fresh.push(new_segment(MARKER_APP1, contents, "XMP")?);
        }
        if let Some(contents) = build_iptc_contents(app13.as_deref(), &self.iptc.to_bytes()) {
            fresh.push(new_segment(MARKER_APP13, contents, "IPTC")?);
        }
        if let Some(comment) = &self.comment {
            fresh.push(new_segment(MARKER_COM, comment.as_bytes().to_vec(), "comment")?);
        }

        let at = segments.iter().take_while(|s| s.marker() == MARKER_APP0).count();
        for (i, segment) in fresh.into_iter().enumerate() {
            segments.insert(at + i, segment);
        }
        Ok(jpeg.encoder().bytes().to_vec())
    }
}

impl ImageBackend for JpegImage {
    fn read_metadata(&mut self) -> Result<()> {
        let jpeg = self.parse()?;
        let mut exif = ExifBlock::new();
        let mut iptc = IptcBlock::default();
        let mut xmp = XmpPacket::default();
        let mut comment = None;

        for segment in jpeg.segments() {
            let contents = segment.contents();
            if is_exif_segment(segment) {
                exif = ExifBlock::parse(&contents[EXIF_PREFIX.len()..])?;
            } else if is_xmp_segment(segment) {
                xmp = XmpPacket::parse(&contents[XMP_HEADER.len()..])?;
            } else if is_iptc_segment(segment) {
                if let Some(resource) = irb_resources(contents).into_iter().find(|r| r.id == IPTC_RESOURCE_ID) {
                    iptc = IptcBlock::parse(&contents[resource.data])?;
                }
            } else if segment.marker() == MARKER_COM {
                let text = String::from_utf8_lossy(contents);
                comment = Some(text.trim_end_matches('\0').to_string());
            }
        }

        debug!(
            "Read JPEG metadata: {} EXIF, {} IPTC, {} XMP keys",
            exif.keys().len(),
            iptc.keys().len(),
            xmp.keys().len()
        );
        self.exif = exif;
        self.iptc = iptc;
        self.xmp = xmp;
        self.comment = comment;
        self.loaded = true;
        Ok(())
    }

    fn write_metadata(&mut self) -> Result<()> {
        if !self.loaded {
            return Err(Error::Unbound);
        }
        let output = self.render()?;
        if let Some(path) = &self.path {
            std::fs::write(path, &output)?;
            info!("Wrote metadata to {}", path.display());
        }
        self.data = output;
        Ok(())
    }

    fn keys(&self, family: Family) -> Vec<String> {
        match family {
            Family::Exif => self.exif.keys(),
            Family::Iptc => self.iptc.keys(),
            Family::Xmp => self.xmp.keys(),
        }
    }

    fn get_tag(&self, family: Family, key: &str) -> Result<RawTag> {
        let tag = match family {
            Family::Exif => self.exif.get(key),
            Family::Iptc => self.iptc.get(key),
            Family::Xmp => self.xmp.get(key),
        };
        tag.ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    fn set_tag(&mut self, family: Family, key: &str, raw: &RawValue) -> Result<()> {
        match family {
            Family::Exif => self.exif.set(key, raw),
            Family::Iptc => self.iptc.set(key, raw),
            Family::Xmp => self.xmp.set(key, raw),
        }
    }

    fn delete_tag(&mut self, family: Family, key: &str) -> Result<()> {
        let removed = match family {
            Family::Exif => self.exif.remove(key),
            Family::Iptc => self.iptc.remove(key),
            Family::Xmp => self.xmp.remove(key),
        };
        if !removed {
            return Err(Error::KeyNotFound(key.to_string()));
        }
        Ok(())
    }

    fn pixel_dimensions(&self) -> Result<(u32, u32)> {
        let reader = image::ImageReader::new(Cursor::new(&self.data)).with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }

    fn mime_type(&self) -> String {
        "image/jpeg".to_string()
    }

    fn comment(&self) -> Option<String> {
        self.comment.clone()
    }

    fn set_comment(&mut self, comment: &str) {
        self.comment = Some(comment.to_string());
    }

    fn clear_comment(&mut self) {
        self.comment = None;
    }

    fn data_buffer(&self) -> Result<Vec<u8>> {
        if !self.loaded {
            return Ok(self.data.clone());
        }
        self.render()
    }

    fn thumbnail(&self) -> Option<Vec<u8>> {
        self.exif.thumbnail().map(<[u8]>::to_vec)
    }

    fn set_thumbnail(&mut self, data: Option<&[u8]>) -> Result<()> {
        if data.is_some_and(|d| !d.starts_with(&[0xFF, 0xD8])) {
            return Err(Error::Codec("EXIF thumbnail must be a JPEG image".into()));
        }
        self.exif.set_thumbnail(data.map(<[u8]>::to_vec));
        Ok(())
    }

    fn previews(&self) -> Vec<Preview> {
        let Some(thumbnail) = self.exif.thumbnail() else {
            return Vec::new();
        };
        let dimensions = image::ImageReader::new(Cursor::new(thumbnail))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok())
            .unwrap_or_else(|| {
                warn!("Cannot read the dimensions of the EXIF thumbnail");
                (0, 0)
            });
        vec![Preview {
            mime_type: "image/jpeg".to_string(),
            dimensions,
            data: thumbnail.to_vec(),
        }]
    }
}

fn is_exif_segment(segment: &JpegSegment) -> bool {
    segment.marker() == MARKER_APP1 && segment.contents().starts_with(EXIF_PREFIX)
}

fn is_xmp_segment(segment: &JpegSegment) -> bool {
    segment.marker() == MARKER_APP1 && segment.contents().starts_with(XMP_HEADER)
}

fn is_iptc_segment(segment: &JpegSegment) -> bool {
    segment.marker() == MARKER_APP13 && segment.contents().starts_with(IPTC_HEADER)
}

fn new_segment(marker: u8, contents: Vec<u8>, what: &str) -> Result<JpegSegment> {
    if contents.len() > MAX_SEGMENT_CONTENTS {
        return Err(Error::Codec(format!(
            "{what} block of {} bytes does not fit in a JPEG segment",
            contents.len()
        )));
    }
    Ok(JpegSegment::new_with_contents(marker, Bytes::from(contents)))
}

/// A Photoshop image resource: `8BIM id name size data`, with the name
/// and data padded to even lengths.
struct Resource {
    id: u16,
    /// The whole resource, padding included.
    span: std::ops::Range<usize>,
    data: std::ops::Range<usize>,
}

fn irb_resources(contents: &[u8]) -> Vec<Resource> {
    let mut resources = Vec::new();
    let mut pos = IPTC_HEADER.len();
    while pos + 12 <= contents.len() {
        if &contents[pos..pos + 4] != IPTC_8BIM {
            break;
        }
        let id = u16::from_be_bytes([contents[pos + 4], contents[pos + 5]]);
        let name_len = usize::from(contents[pos + 6]);
        let name_padded = if (name_len + 1) % 2 == 0 { name_len + 1 } else { name_len + 2 };
        let size_at = pos + 6 + name_padded;
        let Some(size) = contents.get(size_at..size_at + 4) else {
            break;
        };
        let size = u32::from_be_bytes([size[0], size[1], size[2], size[3]]) as usize;
        let data_start = size_at + 4;
        let Some(data_end) = data_start.checked_add(size).filter(|&end| end <= contents.len()) else {
            warn!("Photoshop resource {id:#06x} is truncated");
            break;
        };
        let end = (data_end + size % 2).min(contents.len());
        resources.push(Resource {
            id,
            span: pos..end,
            data: data_start..data_end,
        });
        pos = end;
    }
    resources
}

/// APP13 contents with the IPTC resource replaced by `iim`. Other resources
/// are kept. `None` when nothing is left to store.
fn build_iptc_contents(existing: Option<&[u8]>, iim: &[u8]) -> Option<Vec<u8>> {
    let mut result = IPTC_HEADER.to_vec();

    if let Some(data) = existing {
        for resource in irb_resources(data) {
            if resource.id != IPTC_RESOURCE_ID {
                result.extend_from_slice(&data[resource.span]);
            }
        }
    }

    if !iim.is_empty() {
        result.extend_from_slice(IPTC_8BIM);
        result.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
        // Empty pascal name, padded to even.
        result.extend_from_slice(&[0x00, 0x00]);
        result.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        result.extend_from_slice(iim);
        if iim.len() % 2 != 0 {
            result.push(0x00);
        }
    }

    (result.len() > IPTC_HEADER.len()).then_some(result)
}
