use cardscan_core::PageSegMode;
use image::{DynamicImage, GrayImage, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::ops::{BilateralParams, ImageOps, ImageprocOps, StructuringElement};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// 17×17 rectangle anchored at its top-left pixel.
pub const GLYPH_ELEMENT: StructuringElement = StructuringElement::rect(2 * 8 + 1, 2 * 8 + 1, (0, 0));

pub const GLYPH_BILATERAL: BilateralParams =
    BilateralParams { diameter: 5, sigma_color: 30.0, sigma_space: 20.0 };

/// Decode an image file into a 4-channel bitmap.
pub fn load_bitmap(path: &Path) -> Result<RgbaImage, PreprocessError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| PreprocessError::Decode { path: path.to_path_buf(), source })
}

/// PNG-encode a bitmap for engines that take encoded image bytes.
pub fn encode_png(bitmap: &RgbaImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(bitmap.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Turns a camera bitmap into a binarized, glyph-emphasized bitmap.
#[derive(Clone)]
pub struct Preprocessor {
    ops: Arc<dyn ImageOps>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(ImageprocOps)
    }
}

impl Preprocessor {
    pub fn new(ops: impl ImageOps + 'static) -> Self {
        Self { ops: Arc::new(ops) }
    }

    /// gray → black-hat → bilateral → inverted Otsu → (single line: crop) → RGBA.
    pub fn preprocess(&self, bitmap: &RgbaImage, page_seg_mode: PageSegMode) -> RgbaImage {
        let gray = self.ops.to_gray(bitmap);
        let morph = self.ops.black_hat(&gray, &GLYPH_ELEMENT);
        drop(gray);
        let filtered = self.ops.bilateral_filter(&morph, GLYPH_BILATERAL);
        drop(morph);
        let mut binary = self.ops.threshold_otsu_inverted(&filtered);
        drop(filtered);

        if page_seg_mode.is_single_line() {
            binary = crop_to_foreground(&binary);
        }
        tracing::debug!(
            "Preprocessed {}x{} bitmap to {}x{} (psm {page_seg_mode})",
            bitmap.width(),
            bitmap.height(),
            binary.width(),
            binary.height()
        );

        DynamicImage::ImageLuma8(binary).to_rgba8()
    }
}

/// Value of glyph pixels after thresholding. Black-hat turns dark glyphs
/// bright, and the inverted threshold then maps them to 0.
pub const INK: u8 = 0;

/// Tight bounding box of the ink pixels; the input unchanged if none.
pub fn crop_to_foreground(image: &GrayImage) -> GrayImage {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in image.enumerate_pixels() {
        if p[0] != INK {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
        });
    }

    match bounds {
        Some((min_x, min_y, max_x, max_y)) => image::imageops::crop_imm(
            image,
            min_x,
            min_y,
            max_x - min_x + 1,
            max_y - min_y + 1,
        )
        .to_image(),
        None => image.clone(),
    }
}
