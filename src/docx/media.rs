//! Image format detection for embedding.

use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
        }
    }
}

/// Format and pixel size read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_be_bytes([b[0], b[1]])))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_le_bytes([b[0], b[1]])))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Identify PNG, JPEG or GIF data and read its dimensions.
pub fn sniff(bytes: &[u8]) -> Option<ImageInfo> {
    let info = if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        ImageInfo {
            format: ImageFormat::Png,
            width: be_u32(bytes, 16)?,
            height: be_u32(bytes, 20)?,
        }
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        ImageInfo {
            format: ImageFormat::Gif,
            width: le_u16(bytes, 6)?,
            height: le_u16(bytes, 8)?,
        }
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        let (width, height) = jpeg_size(bytes)?;
        ImageInfo {
            format: ImageFormat::Jpeg,
            width,
            height,
        }
    } else {
        return None;
    };

    if info.width == 0 || info.height == 0 {
        return None;
    }
    Some(info)
}

/// Walk JPEG segments up to the first start-of-frame marker.
fn jpeg_size(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    loop {
        if *bytes.get(i)? != 0xFF {
            return None;
        }
        let mut marker = *bytes.get(i + 1)?;
        while marker == 0xFF {
            i += 1;
            marker = *bytes.get(i + 1)?;
        }
        match marker {
            0xD0..=0xD9 | 0x01 => i += 2,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = be_u16(bytes, i + 5)?;
                let width = be_u16(bytes, i + 7)?;
                return Some((width, height));
            }
            _ => i += 2 + be_u16(bytes, i + 2)? as usize,
        }
    }
}

/// Read an image file, `None` if it is missing or not a supported format.
pub fn load(path: &Path) -> Option<(ImageInfo, Vec<u8>)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("Image {} not readable: {}", path.display(), e);
            return None;
        }
    };
    match sniff(&bytes) {
        Some(info) => Some((info, bytes)),
        None => {
            log::debug!("Image {} is not PNG, JPEG or GIF", path.display());
            None
        }
    }
}
