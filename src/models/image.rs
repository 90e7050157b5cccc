use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Infers the format from the payload signature: a full 8-byte PNG magic
    /// or a leading JPEG SOI marker. Anything else is unrecognized.
    pub fn detect(data: &[u8]) -> Option<ImageFormat> {
        if data.starts_with(PNG_SIGNATURE) {
            Some(ImageFormat::Png)
        } else if data.starts_with(&[0xFF, 0xD8]) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

/// Reads image dimensions from the header alone: the PNG IHDR chunk or the
/// first JPEG SOF marker. No pixel decoding happens anywhere in this crate.
pub fn image_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    match ImageFormat::detect(data) {
        Some(ImageFormat::Png) => png_dimensions(data),
        Some(ImageFormat::Jpeg) => jpeg_dimensions(data),
        None => Err(Error::ImageProcessing(
            "unsupported or invalid image format".to_string(),
        )),
    }
}

fn png_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    // IHDR is the first chunk after the signature; width and height sit at
    // fixed offsets 16 and 20.
    if data.len() < 24 {
        return Err(Error::ImageProcessing(
            "PNG data too short for an IHDR chunk".to_string(),
        ));
    }
    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    Ok((width, height))
}

fn jpeg_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    // Walk the marker segments until a start-of-frame marker carries the
    // dimensions (0xFFC0-0xFFC3, 0xFFC5-0xFFC7, 0xFFC9-0xFFCB).
    let mut pos = 2usize;
    while pos + 4 <= data.len() {
        let marker = u16::from_be_bytes([data[pos], data[pos + 1]]);
        let size = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if matches!(marker, 0xFFC0..=0xFFC3 | 0xFFC5..=0xFFC7 | 0xFFC9..=0xFFCB) {
            let at = pos + 5;
            if at + 4 > data.len() {
                break;
            }
            let height = u16::from_be_bytes([data[at], data[at + 1]]) as u32;
            let width = u16::from_be_bytes([data[at + 2], data[at + 3]]) as u32;
            return Ok((width, height));
        }
        pos += 2 + size;
    }
    Err(Error::ImageProcessing(
        "could not extract dimensions from JPEG image".to_string(),
    ))
}

/// A produced image: raw encoded bytes plus an advisory filename derived from
/// the response timestamp and the image's position in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub filename: String,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Image {
            filename: filename.into(),
            data,
        }
    }

    /// Writes the image under `dir` using its advisory filename, creating the
    /// directory if needed. Returns the full path written.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.write_to(dir.as_ref().join(&self.filename))
    }

    /// Writes the image under `dir` with an explicit filename.
    pub fn save_as(&self, dir: impl AsRef<Path>, filename: &str) -> Result<PathBuf> {
        self.write_to(dir.as_ref().join(filename))
    }

    fn write_to(&self, path: PathBuf) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&path, &self.data)?;
        log::debug!("saved image to {}", path.display());
        Ok(path)
    }
}

/// One decoded frame from the generation event stream.
///
/// Intermediate frames carry the denoising progress (step index and noise
/// level) for one sample; final frames carry the finished image.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Intermediate {
        samp_ix: u32,
        step_ix: u32,
        gen_id: String,
        sigma: f64,
        image: Image,
    },
    Final {
        samp_ix: u32,
        gen_id: String,
        image: Image,
    },
}

impl StreamEvent {
    pub fn samp_ix(&self) -> u32 {
        match self {
            StreamEvent::Intermediate { samp_ix, .. } => *samp_ix,
            StreamEvent::Final { samp_ix, .. } => *samp_ix,
        }
    }

    pub fn gen_id(&self) -> &str {
        match self {
            StreamEvent::Intermediate { gen_id, .. } => gen_id,
            StreamEvent::Final { gen_id, .. } => gen_id,
        }
    }

    pub fn image(&self) -> &Image {
        match self {
            StreamEvent::Intermediate { image, .. } => image,
            StreamEvent::Final { image, .. } => image,
        }
    }

    pub fn into_image(self) -> Image {
        match self {
            StreamEvent::Intermediate { image, .. } => image,
            StreamEvent::Final { image, .. } => image,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, StreamEvent::Final { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data
    }

    fn jpeg_header(width: u16, height: u16) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        // APP0 segment before the SOF, as real encoders emit.
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46]);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&[0x03, 0x01, 0x22, 0x00]);
        data
    }

    #[test]
    fn detects_png_and_jpeg_signatures() {
        assert_eq!(ImageFormat::detect(&png_header(1, 1)), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::detect(b"GIF89a"), None);
        assert_eq!(ImageFormat::detect(&[]), None);
    }

    #[test]
    fn png_dimensions_from_ihdr() {
        let data = png_header(832, 1216);
        assert_eq!(image_dimensions(&data).unwrap(), (832, 1216));
    }

    #[test]
    fn jpeg_dimensions_from_sof() {
        let data = jpeg_header(1024, 768);
        assert_eq!(image_dimensions(&data).unwrap(), (1024, 768));
    }

    #[test]
    fn truncated_jpeg_is_an_error() {
        assert!(image_dimensions(&[0xFF, 0xD8, 0xFF, 0xE0]).is_err());
    }

    #[test]
    fn save_writes_under_directory() {
        let dir = std::env::temp_dir().join(format!("naigen-test-{}", std::process::id()));
        let image = Image::new("sample.png", png_header(64, 64));
        let path = image.save(&dir).unwrap();
        assert_eq!(fs::read(&path).unwrap(), image.data);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn event_accessors() {
        let event = StreamEvent::Final {
            samp_ix: 1,
            gen_id: "42".to_string(),
            image: Image::new("a.png", vec![1, 2, 3]),
        };
        assert!(event.is_final());
        assert_eq!(event.samp_ix(), 1);
        assert_eq!(event.gen_id(), "42");
        assert_eq!(event.into_image().data, vec![1, 2, 3]);
    }
}
