//! Computer-vision primitives used by the preprocessor.
//!
//! The preprocessor only talks to [`ImageOps`]; tests substitute their own.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::contrast::otsu_level;
use imageproc::morphology::{grayscale_close, Mask};

/// A filled rectangular structuring element with an explicit anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    pub width: u8,
    pub height: u8,
    /// Position of the reference pixel inside the element, `(x, y)`.
    pub anchor: (u8, u8),
}

impl StructuringElement {
    pub const fn rect(width: u8, height: u8, anchor: (u8, u8)) -> Self {
        Self { width, height, anchor }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilateralParams {
    /// Neighbourhood diameter in pixels.
    pub diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
}

pub trait ImageOps: Send + Sync {
    /// BT.601 luma of a 4-channel bitmap; alpha is ignored.
    fn to_gray(&self, bitmap: &RgbaImage) -> GrayImage;

    /// `closing(image) - image`, saturating at zero.
    fn black_hat(&self, image: &GrayImage, element: &StructuringElement) -> GrayImage;

    fn bilateral_filter(&self, image: &GrayImage, params: BilateralParams) -> GrayImage;

    /// Otsu threshold with inverted output: 255 where a pixel is at or below
    /// the computed level, 0 above it. A flat image has no split and maps to
    /// all zeros.
    fn threshold_otsu_inverted(&self, image: &GrayImage) -> GrayImage;
}

/// [`ImageOps`] backed by the `image` and `imageproc` crates.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageprocOps;

impl ImageOps for ImageprocOps {
    fn to_gray(&self, bitmap: &RgbaImage) -> GrayImage {
        GrayImage::from_fn(bitmap.width(), bitmap.height(), |x, y| {
            let [r, g, b, _] = bitmap.get_pixel(x, y).0;
            Luma([bt601_luma(r, g, b)])
        })
    }

    fn black_hat(&self, image: &GrayImage, element: &StructuringElement) -> GrayImage {
        let footprint = GrayImage::from_pixel(
            u32::from(element.width),
            u32::from(element.height),
            Luma([255u8]),
        );
        let mask = Mask::from_image(&footprint, element.anchor.0, element.anchor.1);
        let mut closed = grayscale_close(image, &mask);
        for (c, p) in closed.pixels_mut().zip(image.pixels()) {
            c[0] = c[0].saturating_sub(p[0]);
        }
        closed
    }

    fn bilateral_filter(&self, image: &GrayImage, params: BilateralParams) -> GrayImage {
        bilateral(image, params)
    }

    fn threshold_otsu_inverted(&self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        if is_flat(image) {
            return GrayImage::new(width, height);
        }
        let level = otsu_level(image);
        let mut out = image.clone();
        for p in out.pixels_mut() {
            p[0] = if p[0] > level { 0 } else { 255 };
        }
        out
    }
}

/// `0.299 R + 0.587 G + 0.114 B`, rounded, in 16-bit fixed point.
fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let sum = 19_595 * u32::from(r) + 38_470 * u32::from(g) + 7_471 * u32::from(b);
    ((sum + (1 << 15)) >> 16) as u8
}

fn is_flat(image: &GrayImage) -> bool {
    let mut pixels = image.pixels();
    match pixels.next() {
        Some(first) => pixels.all(|p| p[0] == first[0]),
        None => true,
    }
}

/// Edge-preserving smoothing over a circular neighbourhood, replicating edge
/// pixels past the border.
fn bilateral(image: &GrayImage, params: BilateralParams) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let radius = (params.diameter / 2).max(1) as i64;
    let color_coeff = -0.5 / (params.sigma_color * params.sigma_color);
    let space_coeff = -0.5 / (params.sigma_space * params.sigma_space);

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let dist2 = (dx * dx + dy * dy) as f32;
            if dist2.sqrt() <= radius as f32 {
                offsets.push((dx, dy, (dist2 * space_coeff).exp()));
            }
        }
    }
    let color_weight: Vec<f32> = (0..256)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let max_x = i64::from(width) - 1;
    let max_y = i64::from(height) - 1;
    GrayImage::from_fn(width, height, |x, y| {
        let center = image.get_pixel(x, y)[0];
        let mut sum = 0.0f32;
        let mut norm = 0.0f32;
        for &(dx, dy, space_w) in &offsets {
            let nx = (i64::from(x) + dx).clamp(0, max_x) as u32;
            let ny = (i64::from(y) + dy).clamp(0, max_y) as u32;
            let v = image.get_pixel(nx, ny)[0];
            let w = space_w * color_weight[usize::from(v.abs_diff(center))];
            sum += w * f32::from(v);
            norm += w;
        }
        Luma([(sum / norm).round().clamp(0.0, 255.0) as u8])
    })
}
