use std::path::{Path, PathBuf};

use crate::error::Result;

/// An embedded preview image, such as the EXIF thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub mime_type: String,
    /// `(width, height)` in pixels.
    pub dimensions: (u32, u32),
    pub data: Vec<u8>,
}

impl Preview {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// File extension matching the MIME type, with its leading dot.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => ".jpg",
            "image/png" => ".png",
            "image/tiff" => ".tif",
            "image/webp" => ".webp",
            _ => ".bin",
        }
    }

    /// Write the preview next to `path`, appending the extension. Returns the
    /// path actually written.
    pub fn write_to_file(&self, path: &Path) -> Result<PathBuf> {
        let mut name = path.as_os_str().to_owned();
        name.push(self.extension());
        let target = PathBuf::from(name);
        std::fs::write(&target, &self.data)?;
        log::debug!("Wrote {} byte preview to {}", self.data.len(), target.display());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_appends_extension() {
        let dir = tempfile::tempdir().unwrap();
        let preview = Preview {
            mime_type: "image/jpeg".into(),
            dimensions: (4, 4),
            data: vec![0xff, 0xd8, 0xff, 0xd9],
        };
        let written = preview.write_to_file(&dir.path().join("thumb")).unwrap();
        assert_eq!(written, dir.path().join("thumb.jpg"));
        assert_eq!(std::fs::read(&written).unwrap(), preview.data);
    }
}
