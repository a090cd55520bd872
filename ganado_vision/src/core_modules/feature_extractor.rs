// THEORY:
// The `FeatureExtractor` turns one photograph into a `FeatureVector`: a small,
// immutable record of numeric signals and the coarse levels derived from them.
// It is the only stage that looks at luminance gradients for the rubric; every
// later stage works from the `FeatureVector` alone.
//
// Algorithm steps:
// 1.  **Downscale**: the longer side is shrunk to at most `target_max_dimension`
//     (never enlarged), so thresholds mean the same thing across photo sizes.
// 2.  **Global statistics**: brightness (mean luminance), contrast (standard
//     deviation), edge energy (mean gradient magnitude), whiteness (fraction of
//     very bright pixels) and the anomalous-red ratio.
// 3.  **Regional statistics**: three fixed ROIs on a side-on photo.
//     - center band (mid-height strip): mean |gx| decides whether ribs show;
//       the threshold drops on flat, low-contrast photos.
//     - back band (upper strip): for each column the row of strongest |gy| is
//       the topline; the variance of those rows maps to a straightness score.
//     - posterior zone (lower right): mean gradient magnitude maps to a
//       hindquarter muscling score.
// 4.  **Levels**: thorax depth, abdomen fullness, backline quality, posterior
//     muscling and a body-condition estimate, each from fixed step tables.

use crate::core_modules::luma::{Gradients, LumaPlane};
use crate::core_modules::pixel::pixel::Pixel;
use crate::core_modules::roi::Roi;
use image::RgbImage;
use image::imageops::{self, FilterType};
use log::debug;
use serde::{Deserialize, Serialize};

const CENTER_BAND: Roi = Roi::new(0.35, 0.65, 0.15, 0.85);
const BACK_BAND: Roi = Roi::new(0.18, 0.32, 0.10, 0.90);
const POSTERIOR_ZONE: Roi = Roi::new(0.45, 0.95, 0.65, 0.98);

const WHITENESS_THRESHOLD: f32 = 0.75;
const RIBS_THRESHOLD: f64 = 0.08;
const RIBS_THRESHOLD_FLAT: f64 = 0.06;
const FLAT_CONTRAST: f64 = 0.18;

/// Confidence attached to the body-condition estimate.
pub const BODY_CONDITION_CONFIDENCE: f64 = 0.70;
/// Confidence attached to the capacity (thorax/abdomen/backline) levels.
pub const CAPACITY_CONFIDENCE: f64 = 0.65;
/// Confidence attached to the posterior muscling level.
pub const POSTERIOR_CONFIDENCE: f64 = 0.65;

/// A three-step qualitative level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Med,
    High,
}

/// Topline quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backline {
    Poor,
    Ok,
    Good,
}

/// Everything the rubric needs to know about one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Mean luminance, 0..1.
    pub brightness: f64,
    /// Standard deviation of luminance.
    pub contrast: f64,
    /// Mean gradient magnitude over the whole image.
    pub edge_energy: f64,
    /// Variance of the topline row positions in the back band.
    pub backline_variance: f64,
    /// Fraction of pixels brighter than the whiteness threshold.
    pub whiteness: f64,
    /// Fraction of anomalous-red pixels.
    pub red_ratio: f64,
    pub ribs_visible: bool,
    pub backline_score: f64,
    pub posterior_score: f64,
    pub thorax: Level,
    pub abdomen: Level,
    pub backline: Backline,
    pub posterior: Level,
    /// Body condition score estimate, 1..5 scale.
    pub body_condition: f64,
    pub body_condition_confidence: f64,
    pub capacity_confidence: f64,
    pub posterior_confidence: f64,
}

/// Produces a `FeatureVector` from an RGB image.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn extract(&self, image: &RgbImage, target_max_dimension: u32) -> FeatureVector {
        let scaled = downscale(image, target_max_dimension);
        let luma = LumaPlane::from_rgb(&scaled);
        let grad = luma.gradients();

        let brightness = luma.mean();
        let contrast = luma.std_dev();
        let whiteness = luma.fraction_above(WHITENESS_THRESHOLD);
        let red_ratio = red_ratio(&scaled);

        let ribs_threshold = if contrast > FLAT_CONTRAST {
            RIBS_THRESHOLD
        } else {
            RIBS_THRESHOLD_FLAT
        };
        let center = grad.gx.crop(&CENTER_BAND.resolve(luma.width, luma.height));
        let ribs_visible = mean_abs(&center) > ribs_threshold;

        let backline_variance = topline_variance(&grad, &luma);
        let backline_score = straightness_score(backline_variance);

        let posterior_zone = grad.mag.crop(&POSTERIOR_ZONE.resolve(luma.width, luma.height));
        let posterior_score = posterior_score(posterior_zone.mean());

        let features = FeatureVector {
            brightness,
            contrast,
            edge_energy: grad.mag.mean(),
            backline_variance,
            whiteness,
            red_ratio,
            ribs_visible,
            backline_score,
            posterior_score,
            thorax: thorax_level(brightness),
            abdomen: abdomen_level(brightness, contrast),
            backline: backline_level(backline_score),
            posterior: posterior_level(posterior_score),
            body_condition: body_condition(ribs_visible, brightness, contrast),
            body_condition_confidence: BODY_CONDITION_CONFIDENCE,
            capacity_confidence: CAPACITY_CONFIDENCE,
            posterior_confidence: POSTERIOR_CONFIDENCE,
        };
        debug!(
            "features: {}x{} brightness={:.3} contrast={:.3} white={:.3} ribs={} backline={:?} posterior={:?} bcs={:.1}",
            luma.width,
            luma.height,
            features.brightness,
            features.contrast,
            features.whiteness,
            features.ribs_visible,
            features.backline,
            features.posterior,
            features.body_condition
        );
        features
    }
}

/// Shrinks `image` so its longer side is at most `target_max_dimension`.
pub fn downscale(image: &RgbImage, target_max_dimension: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest == 0 || longest <= target_max_dimension {
        return image.clone();
    }
    let scale = target_max_dimension.max(1) as f64 / longest as f64;
    let nw = ((w as f64 * scale) as u32).max(1);
    let nh = ((h as f64 * scale) as u32).max(1);
    imageops::resize(image, nw, nh, FilterType::Triangle)
}

fn red_ratio(image: &RgbImage) -> f64 {
    let total = image.width() as usize * image.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let red = image
        .pixels()
        .filter(|rgb| Pixel::from(*rgb).is_anomalous_red())
        .count();
    red as f64 / total as f64
}

fn mean_abs(plane: &LumaPlane) -> f64 {
    crate::core_modules::luma::mean(plane.data.iter().map(|v| v.abs()))
}

/// Variance of the per-column row index of the strongest vertical edge inside
/// the back band. NaN when the band is narrower than two columns.
fn topline_variance(grad: &Gradients, luma: &LumaPlane) -> f64 {
    let rect = BACK_BAND.resolve(luma.width, luma.height);
    let band = grad.gy.crop(&rect);
    if band.width < 2 {
        return f64::NAN;
    }
    let rows: Vec<f32> = (0..band.width)
        .map(|col| {
            let mut best_row = 0usize;
            let mut best = f32::MIN;
            for row in 0..band.height {
                let value = band.get(row, col).abs();
                if value > best {
                    best = value;
                    best_row = row;
                }
            }
            best_row as f32
        })
        .collect();
    crate::core_modules::luma::variance(rows.iter().copied())
}

pub fn straightness_score(variance: f64) -> f64 {
    if variance.is_nan() {
        3.0
    } else if variance < 2.0 {
        4.2
    } else if variance < 5.0 {
        3.6
    } else if variance < 9.0 {
        3.2
    } else {
        2.8
    }
}

pub fn posterior_score(edge: f64) -> f64 {
    if edge < 0.03 {
        4.0
    } else if edge < 0.06 {
        3.6
    } else if edge < 0.09 {
        3.3
    } else {
        3.0
    }
}

fn thorax_level(brightness: f64) -> Level {
    if brightness > 0.58 {
        Level::High
    } else if brightness > 0.45 {
        Level::Med
    } else {
        Level::Low
    }
}

fn abdomen_level(brightness: f64, contrast: f64) -> Level {
    if brightness > 0.55 && contrast < 0.20 {
        Level::High
    } else if brightness > 0.42 {
        Level::Med
    } else {
        Level::Low
    }
}

fn backline_level(score: f64) -> Backline {
    if score >= 4.0 {
        Backline::Good
    } else if score >= 3.4 {
        Backline::Ok
    } else {
        Backline::Poor
    }
}

fn posterior_level(score: f64) -> Level {
    if score >= 3.8 {
        Level::High
    } else if score >= 3.3 {
        Level::Med
    } else {
        Level::Low
    }
}

fn body_condition(ribs_visible: bool, brightness: f64, contrast: f64) -> f64 {
    match (ribs_visible, contrast > 0.20) {
        (true, true) => 2.5,
        (true, false) => 2.8,
        (false, _) if brightness > 0.5 => 3.2,
        (false, _) => 3.0,
    }
}
