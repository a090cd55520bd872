// THEORY:
// The `zebu` module is a local, deterministic detector for the three visible
// traits of zebu (Bos indicus) influence on a side-on photo: long drooping ears,
// a pronounced dewlap and a hump over the withers. It is the breed fallback used
// when no external classifier is available, and it is reported next to the
// whiteness breed signal. It never feeds the weighted total.
//
// Each trait is scored 0..1 from a fixed ROI of the channel-mean gray image:
// - ears (head ROI): edge energy plus the share of dark pixels.
// - dewlap (neck ROI): edge energy plus the variance of the row means (skin
//   folds make rows differ).
// - hump (withers ROI): how much brighter or darker the outer thirds of the ROI
//   are than the middle third, plus edge energy.
// The weighted sum is banded by two thresholds into ENRAZADO ("Brahman/Mix"),
// ENRAZADO ("Criollo/Mix") or CRIOLLO ("Criollo/Mix").

use crate::config::ZebuConfig;
use crate::core_modules::aggregator::round2;
use crate::core_modules::luma::{self, LumaPlane};
use crate::core_modules::roi::Roi;
use crate::core_modules::rubric_scorer::{BreedClass, BreedSignal};
use image::RgbImage;
use serde::Serialize;

const HEAD: Roi = Roi::new(0.10, 0.50, 0.00, 0.45);
const NECK: Roi = Roi::new(0.35, 0.75, 0.15, 0.55);
const WITHERS: Roi = Roi::new(0.10, 0.35, 0.30, 0.65);

/// Edge energy (on the 0..1 scale) that saturates a trait's edge term.
const EDGE_SCALE: f64 = 0.02;
/// Gray level (0..255) below which a pixel counts as dark.
const DARK_LEVEL: f32 = 120.0;
const ROW_VARIANCE_SCALE: f64 = 400.0;
const PROMINENCE_SCALE: f64 = 80.0;
const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZebuTraits {
    pub ears: f64,
    pub dewlap: f64,
    pub hump: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZebuSignal {
    pub breed: BreedSignal,
    /// Weighted trait score, rounded to 2 decimals.
    pub score: f64,
    pub traits: ZebuTraits,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ZebuDetector {
    config: ZebuConfig,
}

impl ZebuDetector {
    pub fn new(config: &ZebuConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn detect(&self, image: &RgbImage) -> ZebuSignal {
        let gray = LumaPlane::channel_mean_from_rgb(image);
        let region = |roi: Roi| gray.crop(&roi.resolve(gray.width, gray.height));

        let traits = ZebuTraits {
            ears: ears_score(&region(HEAD)),
            dewlap: dewlap_score(&region(NECK)),
            hump: hump_score(&region(WITHERS)),
        };
        let w = &self.config.weights;
        let score = w.ears * traits.ears + w.dewlap * traits.dewlap + w.hump * traits.hump;
        let (hi, lo) = (self.config.zebu_hi, self.config.zebu_lo);

        let breed = if score >= hi {
            BreedSignal {
                class: BreedClass::Enrazado,
                label: "Brahman/Mix",
                confidence: (0.65 + 0.35 * (score - hi) / (1.0 - hi + EPSILON)).min(1.0),
            }
        } else if score >= lo {
            BreedSignal {
                class: BreedClass::Enrazado,
                label: "Criollo/Mix",
                confidence: 0.55 + 0.30 * (score - lo) / (hi - lo + EPSILON),
            }
        } else {
            BreedSignal {
                class: BreedClass::Criollo,
                label: "Criollo/Mix",
                confidence: 0.60 - 0.40 * (score / (lo + EPSILON)),
            }
        };

        let verdict = if breed.class == BreedClass::Enrazado {
            "Señales claras de cebú."
        } else {
            "Sin señales fuertes de cebú."
        };
        let reason = format!(
            "zebu_score={:.2} (ears={:.2}, dewlap={:.2}, hump={:.2}). {}",
            score, traits.ears, traits.dewlap, traits.hump, verdict
        );

        ZebuSignal {
            breed: BreedSignal {
                confidence: round2(breed.confidence),
                ..breed
            },
            score: round2(score),
            traits: ZebuTraits {
                ears: round2(traits.ears),
                dewlap: round2(traits.dewlap),
                hump: round2(traits.hump),
            },
            reason,
        }
    }
}

/// Edge energy of a 0..255 gray plane, measured on the 0..1 scale.
fn edge_energy(gray: &LumaPlane) -> f64 {
    let unit = LumaPlane {
        width: gray.width,
        height: gray.height,
        data: gray.data.iter().map(|v| v / 255.0).collect(),
    };
    unit.gradients().edge_energy()
}

fn ears_score(head: &LumaPlane) -> f64 {
    let dark_ratio = head.fraction_below(DARK_LEVEL);
    (0.6 * edge_energy(head) / EDGE_SCALE + 0.4 * dark_ratio).min(1.0)
}

fn dewlap_score(neck: &LumaPlane) -> f64 {
    let row_means: Vec<f32> = neck.row_means().into_iter().map(|m| m as f32).collect();
    let row_variance = luma::variance(row_means.iter().copied());
    (0.7 * edge_energy(neck) / EDGE_SCALE + 0.3 * (row_variance / ROW_VARIANCE_SCALE).min(1.0)).min(1.0)
}

fn hump_score(withers: &LumaPlane) -> f64 {
    let h = withers.height;
    if h < 3 {
        return 0.0;
    }
    let rows = withers.row_means();
    let (third, two_thirds) = (h / 3, 2 * h / 3);
    let center = mean(&rows[third..two_thirds]);
    let outer: Vec<f64> = rows[..third].iter().chain(&rows[two_thirds..]).copied().collect();
    let prominence = (mean(&outer) - center).max(0.0) / PROMINENCE_SCALE;
    (0.6 * prominence + 0.4 * edge_energy(withers) / EDGE_SCALE).min(1.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
