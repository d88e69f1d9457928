//! Page image fixtures
//!
//! Small grayscale JPEGs whose JFIF header declares the requested density.

use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::ExtendedColorType;
use scorewave_sr::models::PageImage;

/// 32x32 grayscale JPEG declaring `dpi` on both axes
pub fn jpeg_page(dpi: u16) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new(&mut bytes);
    encoder.set_pixel_density(PixelDensity::dpi(dpi));
    encoder
        .encode(&[255u8; 32 * 32], 32, 32, ExtendedColorType::L8)
        .expect("encode fixture page");
    bytes
}

pub fn page(index: usize, dpi: u16) -> PageImage {
    PageImage::new(index, format!("page{}.jpg", index + 1), jpeg_page(dpi))
}

/// One page per density, indexed in order
pub fn pages(dpis: &[u16]) -> Vec<PageImage> {
    dpis.iter().enumerate().map(|(i, dpi)| page(i, *dpi)).collect()
}

/// Bytes no image decoder accepts
pub fn undecodable_page(index: usize) -> PageImage {
    PageImage::new(index, format!("page{}.png", index + 1), b"not an image".to_vec())
}
