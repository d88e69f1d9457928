//! Pixel density detection from image container metadata
//!
//! The `image` crate decodes pixels but does not expose declared density.
//! Sources, in order:
//! - PNG `pHYs` chunk (pixels per metre)
//! - JPEG JFIF `APP0` segment (dots per inch or per centimetre)
//! - EXIF `XResolution`/`YResolution` with `ResolutionUnit`: TIFF, JPEG
//!   `APP1`, PNG `eXIf`
//! - BMP `BITMAPINFOHEADER` pixels per metre
//!
//! Containers without a usable declaration fall back to [`DEFAULT_DPI`].
//! Densities are whole dots per inch, truncated, so a page declaring
//! 289.6 DPI stays below a 290 DPI minimum.

use exif::{In, Tag, Value};
use serde::Serialize;
use std::io::Cursor;

/// Density assumed when an image declares none
pub const DEFAULT_DPI: u32 = 72;

const METRES_PER_INCH: f64 = 0.0254;
const CM_PER_INCH: f64 = 2.54;

/// EXIF `ResolutionUnit` values
const EXIF_UNIT_INCH: u32 = 2;
const EXIF_UNIT_CENTIMETRE: u32 = 3;

/// Horizontal and vertical density in dots per inch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dpi {
    pub horizontal: u32,
    pub vertical: u32,
}

impl Dpi {
    pub const DEFAULT: Dpi = Dpi {
        horizontal: DEFAULT_DPI,
        vertical: DEFAULT_DPI,
    };

    pub fn new(horizontal: u32, vertical: u32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// Larger of the two axes
    pub fn max(&self) -> u32 {
        self.horizontal.max(self.vertical)
    }

    /// Smaller of the two axes
    pub fn min(&self) -> u32 {
        self.horizontal.min(self.vertical)
    }

    fn from_per_metre(x: f64, y: f64) -> Option<Self> {
        Self::from_per_inch(x * METRES_PER_INCH, y * METRES_PER_INCH)
    }

    fn from_per_cm(x: f64, y: f64) -> Option<Self> {
        Self::from_per_inch(x * CM_PER_INCH, y * CM_PER_INCH)
    }

    fn from_per_inch(x: f64, y: f64) -> Option<Self> {
        if !(x > 0.0 && y > 0.0 && x.is_finite() && y.is_finite()) {
            return None;
        }
        Some(Self::new(whole_dpi(x), whole_dpi(y)))
    }
}

/// Truncate to whole dots per inch
///
/// Unit conversions are first rounded to hundredths so that 11811 px/m
/// (299.9994) counts as 300.
fn whole_dpi(value: f64) -> u32 {
    ((value * 100.0).round() / 100.0).floor() as u32
}

/// Declared density, when the container carries one
pub fn read_dpi(bytes: &[u8]) -> Option<Dpi> {
    let header = if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        png_dpi(bytes)
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        jfif_dpi(bytes)
    } else if bytes.starts_with(b"BM") {
        return bmp_dpi(bytes);
    } else {
        None
    };

    header.or_else(|| exif_dpi(bytes))
}

/// Declared density or the 72x72 default
pub fn detect_dpi(bytes: &[u8]) -> Dpi {
    read_dpi(bytes).unwrap_or(Dpi::DEFAULT)
}

fn png_dpi(bytes: &[u8]) -> Option<Dpi> {
    let mut offset = 8;
    while offset + 8 <= bytes.len() {
        let length = be_u32(bytes, offset)? as usize;
        let kind = bytes.get(offset + 4..offset + 8)?;
        let data = bytes.get(offset + 8..offset + 8 + length)?;

        match kind {
            b"pHYs" if length >= 9 => {
                // unit 1 = metre; 0 = aspect ratio only
                if data[8] != 1 {
                    return None;
                }
                return Dpi::from_per_metre(be_u32(data, 0)? as f64, be_u32(data, 4)? as f64);
            }
            // pHYs must precede image data
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }

        // length + type + data + crc
        offset += 12 + length;
    }
    None
}

/// JFIF `APP0` density; `None` when absent or aspect-ratio only
fn jfif_dpi(bytes: &[u8]) -> Option<Dpi> {
    let mut offset = 2;
    loop {
        // Skip fill bytes
        while bytes.get(offset) == Some(&0xFF) && bytes.get(offset + 1) == Some(&0xFF) {
            offset += 1;
        }
        if *bytes.get(offset)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(offset + 1)?;
        match marker {
            // Start of scan / end of image: no more headers
            0xDA | 0xD9 => return None,
            // Standalone markers
            0x01 | 0xD0..=0xD7 => {
                offset += 2;
                continue;
            }
            _ => {}
        }

        let length = be_u16(bytes, offset + 2)? as usize;
        if length < 2 {
            return None;
        }
        let segment = bytes.get(offset + 4..offset + 2 + length)?;

        if marker == 0xE0 && segment.len() >= 12 && segment.starts_with(b"JFIF\0") {
            let units = segment[7];
            let x = be_u16(segment, 8)? as f64;
            let y = be_u16(segment, 10)? as f64;
            return match units {
                1 => Dpi::from_per_inch(x, y),
                2 => Dpi::from_per_cm(x, y),
                _ => None,
            };
        }

        offset += 2 + length;
    }
}

/// EXIF resolution tags of the primary image
fn exif_dpi(bytes: &[u8]) -> Option<Dpi> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;

    let resolution = |tag: Tag| -> Option<f64> {
        match &exif.get_field(tag, In::PRIMARY)?.value {
            Value::Rational(values) => values
                .first()
                .filter(|r| r.denom != 0)
                .map(|r| r.to_f64()),
            _ => None,
        }
    };
    let x = resolution(Tag::XResolution)?;
    let y = resolution(Tag::YResolution)?;

    // Inch when the tag is absent
    let unit = exif
        .get_field(Tag::ResolutionUnit, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(EXIF_UNIT_INCH);

    match unit {
        EXIF_UNIT_INCH => Dpi::from_per_inch(x, y),
        EXIF_UNIT_CENTIMETRE => Dpi::from_per_cm(x, y),
        _ => None,
    }
}

fn bmp_dpi(bytes: &[u8]) -> Option<Dpi> {
    // BITMAPINFOHEADER and later carry density; BITMAPCOREHEADER (12) does not
    let header_size = le_u32(bytes, 14)?;
    if header_size < 40 {
        return None;
    }
    let x = le_u32(bytes, 38)? as i32;
    let y = le_u32(bytes, 42)? as i32;
    Dpi::from_per_metre(x as f64, y as f64)
}

fn be_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(offset..offset + 2)?.try_into().ok()?;
    Some(u16::from_be_bytes(raw))
}

fn be_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

fn le_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}
