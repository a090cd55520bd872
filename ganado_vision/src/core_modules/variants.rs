// THEORY:
// The `variants` module builds the deterministic family of perturbed copies the
// ensemble re-scores. Every variant is a new image; the source is never touched.
//
// The family, in order:
// 1.  three crops at 92% of each side, centered vertically and shifted
//     horizontally by −4%, 0 and +4% of the width (clamped inside the frame);
// 2.  a brightness jitter (every channel ×1.05);
// 3.  a contrast jitter (channels pulled 5% toward the mean luminance);
// 4.  a mild Gaussian blur (σ = 0.5).
//
// The untouched original is always ensemble member 0 and is not produced here.
// Members alternate between the primary and alternate target dimensions by
// index, so scale sensitivity shows up as dispersion.

use crate::config::EnsembleConfig;
use crate::core_modules::luma::LumaPlane;
use image::{Rgb, RgbImage, imageops};

const CROP_FRACTIONS: [f64; 2] = [0.92, 0.88];
const CROP_SHIFT: f64 = 0.04;
const MAX_CROPS: usize = 3;
const BRIGHTNESS_FACTOR: f32 = 1.05;
const CONTRAST_FACTOR: f32 = 0.95;
const BLUR_SIGMA: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariantKind {
    Crop { fraction: f64, shift: i64 },
    Brightness,
    Contrast,
    Blur,
}

#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub kind: VariantKind,
    pub image: RgbImage,
}

/// Target max dimension for ensemble member `index` (the original is 0).
pub fn target_dimension(index: usize, config: &EnsembleConfig) -> u32 {
    if index % 2 == 0 {
        config.primary_max_dimension
    } else {
        config.alternate_max_dimension
    }
}

/// Builds every variant of `image`. An empty image has no variants.
pub fn generate(image: &RgbImage) -> Vec<ImageVariant> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let mut variants = crops(image);
    variants.push(ImageVariant {
        kind: VariantKind::Brightness,
        image: brighten(image, BRIGHTNESS_FACTOR),
    });
    variants.push(ImageVariant {
        kind: VariantKind::Contrast,
        image: soften_contrast(image, CONTRAST_FACTOR),
    });
    variants.push(ImageVariant {
        kind: VariantKind::Blur,
        image: imageops::blur(image, BLUR_SIGMA),
    });
    variants
}

fn crops(image: &RgbImage) -> Vec<ImageVariant> {
    let (w, h) = image.dimensions();
    let step = (w as f64 * CROP_SHIFT) as i64;
    CROP_FRACTIONS
        .iter()
        .flat_map(|fraction| [-step, 0, step].map(|shift| (*fraction, shift)))
        .take(MAX_CROPS)
        .map(|(fraction, shift)| {
            let cw = ((w as f64 * fraction) as u32).max(1);
            let ch = ((h as f64 * fraction) as u32).max(1);
            let max_x0 = (w - cw) as i64;
            let x0 = (max_x0 / 2 + shift).clamp(0, max_x0) as u32;
            let y0 = (h - ch) / 2;
            ImageVariant {
                kind: VariantKind::Crop { fraction, shift },
                image: imageops::crop_imm(image, x0, y0, cw, ch).to_image(),
            }
        })
        .collect()
}

/// Scales every channel by `factor`, saturating at 255.
pub fn brighten(image: &RgbImage, factor: f32) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0 = pixel.0.map(|c| scale_channel(c as f32 * factor));
    }
    out
}

/// Blends every channel toward the image's mean luminance: `m + factor·(c − m)`.
pub fn soften_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let mean = (LumaPlane::from_rgb(image).mean() * 255.0) as f32;
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let Rgb(channels) = *pixel;
        *pixel = Rgb(channels.map(|c| scale_channel(mean + factor * (c as f32 - mean))));
    }
    out
}

fn scale_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
