//! Page image validation
//!
//! A page is accepted when it decodes as a supported raster image and its
//! declared density meets the minimum on both axes. Pages without a density
//! declaration are treated as 72x72 DPI.

use super::density::{detect_dpi, Dpi};
use super::error::ImageRejection;
use crate::models::PageImage;
use std::path::Path;
use tracing::{debug, warn};

/// Minimum accepted density on either axis
pub const MIN_DPI: u32 = 290;

/// Decode and resolution checks
#[derive(Debug, Clone, Copy)]
pub struct ImageValidator {
    min_dpi: u32,
}

impl Default for ImageValidator {
    fn default() -> Self {
        Self::new(MIN_DPI)
    }
}

impl ImageValidator {
    pub fn new(min_dpi: u32) -> Self {
        Self { min_dpi }
    }

    pub fn min_dpi(&self) -> u32 {
        self.min_dpi
    }

    /// Validate one page, returning its detected density
    pub fn validate(&self, page: &PageImage) -> Result<Dpi, ImageRejection> {
        let invalid = |reason: String| ImageRejection::InvalidImage {
            page: page.page_number(),
            filename: page.filename.clone(),
            reason,
        };

        if Path::new(&page.filename).file_name().is_none() {
            return Err(invalid("missing file name".to_string()));
        }
        if page.bytes.is_empty() {
            return Err(invalid("file is empty".to_string()));
        }

        let decoded = image::load_from_memory(&page.bytes).map_err(|e| invalid(e.to_string()))?;

        let dpi = detect_dpi(&page.bytes);
        debug!(
            page = page.page_number(),
            filename = %page.filename,
            width = decoded.width(),
            height = decoded.height(),
            horizontal_dpi = dpi.horizontal,
            vertical_dpi = dpi.vertical,
            "Page decoded"
        );

        if dpi.min() < self.min_dpi {
            return Err(ImageRejection::ResolutionTooLow {
                page: page.page_number(),
                filename: page.filename.clone(),
                dpi: dpi.max(),
                horizontal: dpi.horizontal,
                vertical: dpi.vertical,
                minimum: self.min_dpi,
            });
        }

        Ok(dpi)
    }

    /// Validate every page, collecting all rejections
    pub fn validate_batch(&self, pages: &[PageImage]) -> Result<Vec<Dpi>, Vec<ImageRejection>> {
        let mut accepted = Vec::with_capacity(pages.len());
        let mut rejections = Vec::new();

        for page in pages {
            match self.validate(page) {
                Ok(dpi) => accepted.push(dpi),
                Err(rejection) => {
                    warn!(page = page.page_number(), "{}", rejection);
                    rejections.push(rejection);
                }
            }
        }

        if rejections.is_empty() {
            Ok(accepted)
        } else {
            Err(rejections)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::density::tests::exif_only_jpeg;
    use image::codecs::jpeg::{JpegEncoder, PixelDensity, PixelDensityUnit};
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    fn jpeg(dpi: u16) -> Vec<u8> {
        jpeg_with_density(PixelDensity::dpi(dpi))
    }

    fn jpeg_with_density(density: PixelDensity) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new(&mut bytes);
        encoder.set_pixel_density(density);
        encoder
            .encode(&[200u8; 32 * 32], 32, 32, ExtendedColorType::L8)
            .unwrap();
        bytes
    }

    fn png_without_density() -> Vec<u8> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(&[0u8; 8 * 8], 8, 8, ExtendedColorType::L8)
            .unwrap();
        bytes
    }

    #[test]
    fn test_accepts_high_resolution_page() {
        let page = PageImage::new(0, "page1.jpg", jpeg(300));
        assert_eq!(ImageValidator::default().validate(&page), Ok(Dpi::new(300, 300)));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let page = PageImage::new(0, "page1.jpg", jpeg(290));
        assert!(ImageValidator::default().validate(&page).is_ok());
    }

    #[test]
    fn test_low_resolution_reports_detected_dpi() {
        let page = PageImage::new(1, "page2.jpg", jpeg(150));
        match ImageValidator::default().validate(&page) {
            Err(ImageRejection::ResolutionTooLow { page, dpi, minimum, .. }) => {
                assert_eq!(page, 2);
                assert_eq!(dpi, 150);
                assert_eq!(minimum, MIN_DPI);
            }
            other => panic!("Expected ResolutionTooLow, got {:?}", other),
        }
    }

    #[test]
    fn test_accepts_exif_only_scan() {
        let page = PageImage::new(0, "scan.jpg", exif_only_jpeg((300, 1), (300, 1), 2));
        assert_eq!(ImageValidator::default().validate(&page), Ok(Dpi::new(300, 300)));
    }

    #[test]
    fn test_fractional_density_below_minimum() {
        // 114 dots/cm is 289.56 DPI
        let page = PageImage::new(
            0,
            "page1.jpg",
            jpeg_with_density(PixelDensity {
                density: (114, 114),
                unit: PixelDensityUnit::Centimeters,
            }),
        );
        assert!(matches!(
            ImageValidator::default().validate(&page),
            Err(ImageRejection::ResolutionTooLow { dpi: 289, .. })
        ));
    }

    #[test]
    fn test_missing_density_defaults_to_72() {
        let page = PageImage::new(0, "scan.png", png_without_density());
        assert!(matches!(
            ImageValidator::default().validate(&page),
            Err(ImageRejection::ResolutionTooLow { dpi: 72, .. })
        ));
    }

    #[test]
    fn test_undecodable_bytes() {
        let page = PageImage::new(0, "notes.txt", b"not an image".to_vec());
        match ImageValidator::default().validate(&page) {
            Err(ImageRejection::InvalidImage { filename, .. }) => assert_eq!(filename, "notes.txt"),
            other => panic!("Expected InvalidImage, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_bytes_and_missing_name() {
        let validator = ImageValidator::default();
        assert!(matches!(
            validator.validate(&PageImage::new(0, "empty.png", Vec::new())),
            Err(ImageRejection::InvalidImage { .. })
        ));
        assert!(matches!(
            validator.validate(&PageImage::new(0, "", jpeg(300))),
            Err(ImageRejection::InvalidImage { .. })
        ));
    }

    #[test]
    fn test_batch_collects_every_rejection() {
        let pages = vec![
            PageImage::new(0, "a.jpg", jpeg(300)),
            PageImage::new(1, "b.jpg", jpeg(100)),
            PageImage::new(2, "c.bin", vec![1, 2, 3]),
        ];
        let rejections = ImageValidator::default().validate_batch(&pages).unwrap_err();
        assert_eq!(rejections.len(), 2);
        assert_eq!(rejections[0].filename(), "b.jpg");
        assert_eq!(rejections[1].filename(), "c.bin");
    }
}
