use std::io::{Cursor, Read};

use chrono::Local;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::models::image::Image;

/// Unpacks a legacy ZIP response into images, one per archive entry, in the
/// archive's listing order. Filenames carry the response timestamp and the
/// entry's position.
pub fn extract_images(zip_data: &[u8]) -> Result<Vec<Image>> {
    let mut archive = open(zip_data)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut images = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::Decode(format!("corrupt archive entry {}: {}", i, e)))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        images.push(Image::new(format!("{}_p{}.png", timestamp, i), data));
    }
    Ok(images)
}

/// Unwraps a single-image archive, as returned by the director endpoint.
pub fn extract_first(zip_data: &[u8]) -> Result<Vec<u8>> {
    let mut archive = open(zip_data)?;
    let mut entry = archive
        .by_index(0)
        .map_err(|e| Error::Decode(format!("corrupt archive entry 0: {}", e)))?;
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data)?;
    Ok(data)
}

fn open(zip_data: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    let archive = ZipArchive::new(Cursor::new(zip_data))
        .map_err(|e| Error::Decode(format!("invalid zip response: {}", e)))?;
    if archive.is_empty() {
        return Err(Error::Decode("empty zip response".to_string()));
    }
    Ok(archive)
}
