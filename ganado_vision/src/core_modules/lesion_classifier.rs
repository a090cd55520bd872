// THEORY:
// The `LesionClassifier` is the verdict layer of lesion screening. For each
// anatomical zone it confines the `RegionSegmenter` to that zone's ROI, reads the
// anomalous-red ratio and the nominated component, and turns them into a
// confidence and a three-tier severity.
//
// Key architectural principles:
// 1.  **Independent Zones**: every zone is evaluated from scratch. No state is
//     shared between zones or between calls.
// 2.  **Shape Gates Confirmation**: raw color evidence alone can reach `Alerta`
//     at most. `Confirmada` additionally needs a component that passes the
//     ovality test (and, for the eye, a plausible size), so a red blanket or
//     ear tag is never reported as a confirmed lesion.
// 3.  **Image Quality Penalties**: blurry photos and poorly visible animals
//     lower every confidence before severity is assigned.
// 4.  **Lameness Is Different**: the lameness zone has no color evidence. It
//     uses an edge-energy proxy over the legs and can never exceed `Alerta`.
//
// Zone profiles are typed data (`ZoneRule`), not branches, so adding a zone means
// adding a profile. Their confidence tables live in `PathologyConfig::zones`.

use crate::config::{PathologyConfig, RedZoneConfig, ShapeConfig, ZoneThresholds};
use crate::core_modules::luma::LumaPlane;
use crate::core_modules::region_segmenter::{RegionAnalysis, region_segmenter};
use crate::core_modules::roi::Roi;
use image::RgbImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Sharpness (gradient variance) below which the photo counts as blurry.
pub const BLUR_FLOOR: f64 = 0.0008;
/// Visibility ratio below which the animal counts as poorly visible.
pub const VISIBILITY_FLOOR: f64 = 0.55;
/// Confidence granted when the nominated component passes the shape test.
pub const SHAPE_CONFIDENCE_FLOOR: f64 = 0.90;

const BLUR_PENALTY: f64 = 0.08;
const VISIBILITY_PENALTY: f64 = 0.05;
const LAMENESS_BLUR_PENALTY: f64 = 0.05;

/// Anatomical zones screened for lesions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LesionZone {
    #[serde(rename = "lesion_cutanea")]
    Skin,
    #[serde(rename = "ojo_infectado")]
    Eye,
    #[serde(rename = "prolapso")]
    Prolapse,
    #[serde(rename = "cojera")]
    Lameness,
}

impl LesionZone {
    pub const ALL: [LesionZone; 4] = [
        LesionZone::Skin,
        LesionZone::Eye,
        LesionZone::Prolapse,
        LesionZone::Lameness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LesionZone::Skin => "lesion_cutanea",
            LesionZone::Eye => "ojo_infectado",
            LesionZone::Prolapse => "prolapso",
            LesionZone::Lameness => "cojera",
        }
    }

    /// The screening rule for this zone. ROIs and structure are fixed;
    /// the numeric tables come from `zones`.
    pub fn rule<'a>(&self, zones: &'a ZoneThresholds) -> ZoneRule<'a> {
        match self {
            LesionZone::Skin => ZoneRule::Shape(ShapeProfile::new(Roi::FULL, &zones.lesion_cutanea, false, true)),
            LesionZone::Eye => ZoneRule::Shape(ShapeProfile::new(
                Roi::new(0.0, 0.35, 0.0, 0.35),
                &zones.ojo_infectado,
                true,
                false,
            )),
            LesionZone::Prolapse => ZoneRule::Shape(ShapeProfile::new(
                Roi::new(0.55, 1.0, 0.55, 1.0),
                &zones.prolapso,
                true,
                false,
            )),
            LesionZone::Lameness => ZoneRule::EdgeEnergy(EdgeProfile {
                roi: Roi::new(0.55, 1.0, 0.45, 1.0),
                bands: &zones.cojera.bands,
                fallback: zones.cojera.fallback,
                cap: zones.cojera.cap,
            }),
        }
    }
}

/// How a zone turns pixels into a confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneRule<'a> {
    Shape(ShapeProfile<'a>),
    EdgeEnergy(EdgeProfile<'a>),
}

/// Color-and-shape screening over a ROI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeProfile<'a> {
    pub roi: Roi,
    /// `(ratio, confidence)` pairs checked in order; the first ratio exceeded
    /// sets the base confidence.
    pub red_bands: &'a [(f64, f64)],
    /// Color evidence only counts when a component was nominated.
    pub needs_component: bool,
    /// Area window for `shape_ok`, as fractions of the whole image area.
    pub area_window: Option<(f64, f64)>,
    pub cap: f64,
    /// Whether the notes report the red ratio.
    pub report_red: bool,
}

impl<'a> ShapeProfile<'a> {
    fn new(roi: Roi, table: &'a RedZoneConfig, needs_component: bool, report_red: bool) -> Self {
        Self {
            roi,
            red_bands: &table.red_bands,
            needs_component,
            area_window: table.area_window,
            cap: table.cap,
            report_red,
        }
    }
}

/// Edge-energy screening over a ROI: low energy reads as an abnormal stance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeProfile<'a> {
    pub roi: Roi,
    /// `(energy_below, confidence)` pairs checked in order.
    pub bands: &'a [(f64, f64)],
    pub fallback: f64,
    pub cap: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Descartado,
    Alerta,
    Confirmada,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Descartado => "descartado",
            Severity::Alerta => "alerta",
            Severity::Confirmada => "confirmada",
        }
    }
}

/// The verdict for one zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LesionFinding {
    pub zone: LesionZone,
    /// `severity != Descartado`.
    pub present: bool,
    /// Rounded to 2 decimals.
    pub confidence: f64,
    pub severity: Severity,
    pub shape_ok: bool,
    pub notes: String,
}

/// All findings for one image plus the sharpness they were penalized with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LesionReport {
    pub findings: Vec<LesionFinding>,
    pub blur_score: f64,
}

/// Sharpness proxy of the whole image: `var(gx) + var(gy)` of its luminance.
pub fn blur_score(image: &RgbImage) -> f64 {
    LumaPlane::from_rgb(image).gradients().sharpness()
}

#[derive(Debug, Clone)]
pub struct LesionClassifier {
    alert_threshold: f64,
    confirm_threshold: f64,
    shape: ShapeConfig,
    zones: ZoneThresholds,
}

impl LesionClassifier {
    pub fn new(config: &PathologyConfig) -> Self {
        Self {
            alert_threshold: config.alert_threshold,
            confirm_threshold: config.confirm_threshold,
            shape: config.shape.clone(),
            zones: config.zones.clone(),
        }
    }

    /// Screens every zone in `zones`, in order, computing the blur score once.
    pub fn screen(&self, image: &RgbImage, zones: &[LesionZone], vis_ratio: f64) -> LesionReport {
        let blur = blur_score(image);
        let findings = zones
            .iter()
            .map(|zone| self.classify(image, *zone, vis_ratio, blur))
            .collect();
        LesionReport {
            findings,
            blur_score: blur,
        }
    }

    pub fn classify(
        &self,
        image: &RgbImage,
        zone: LesionZone,
        vis_ratio: f64,
        blur_score: f64,
    ) -> LesionFinding {
        let finding = match zone.rule(&self.zones) {
            ZoneRule::Shape(profile) => self.classify_shape(image, zone, &profile, vis_ratio, blur_score),
            ZoneRule::EdgeEnergy(profile) => self.classify_edges(image, zone, &profile, blur_score),
        };
        debug!(
            "lesion {}: conf={:.2} severity={} shape_ok={}",
            zone.as_str(),
            finding.confidence,
            finding.severity.as_str(),
            finding.shape_ok
        );
        finding
    }

    fn classify_shape(
        &self,
        image: &RgbImage,
        zone: LesionZone,
        profile: &ShapeProfile,
        vis_ratio: f64,
        blur_score: f64,
    ) -> LesionFinding {
        let (w, h) = image.dimensions();
        let rect = profile.roi.resolve(w as usize, h as usize);
        let analysis = region_segmenter::segment_rect(image, &rect, &self.shape);

        let red = analysis.red_ratio();
        let has_component = analysis.best_area() > 0;
        let mut confidence = if profile.needs_component && !has_component {
            0.0
        } else {
            profile
                .red_bands
                .iter()
                .find(|(ratio, _)| red > *ratio)
                .map_or(0.0, |(_, conf)| *conf)
        };

        let shape_ok = shape_ok(&analysis, profile, w as f64 * h as f64);
        if shape_ok {
            confidence = confidence.max(SHAPE_CONFIDENCE_FLOOR);
        }
        if blur_score < BLUR_FLOOR {
            confidence -= BLUR_PENALTY;
        }
        if vis_ratio < VISIBILITY_FLOOR {
            confidence -= VISIBILITY_PENALTY;
        }
        let confidence = confidence.clamp(0.0, profile.cap);

        let severity = if confidence >= self.confirm_threshold && shape_ok {
            Severity::Confirmada
        } else if confidence >= self.alert_threshold {
            Severity::Alerta
        } else {
            Severity::Descartado
        };

        let shape = analysis.best_shape();
        let notes = if profile.report_red {
            format!(
                "rojo≈{:.1}%, oval={}, extent≈{:.2}",
                red * 100.0,
                u8::from(shape.oval),
                shape.extent
            )
        } else {
            format!("oval={}, extent≈{:.2}", u8::from(shape.oval), shape.extent)
        };

        finding(zone, confidence, severity, shape_ok, notes)
    }

    fn classify_edges(
        &self,
        image: &RgbImage,
        zone: LesionZone,
        profile: &EdgeProfile,
        blur_score: f64,
    ) -> LesionFinding {
        let luma = LumaPlane::from_rgb(image);
        let legs = luma.crop(&profile.roi.resolve(luma.width, luma.height));
        let energy = legs.gradients().edge_energy();

        let mut confidence = profile
            .bands
            .iter()
            .find(|(below, _)| energy < *below)
            .map_or(profile.fallback, |(_, conf)| *conf);
        if blur_score < BLUR_FLOOR {
            confidence -= LAMENESS_BLUR_PENALTY;
        }
        let confidence = confidence.clamp(0.0, profile.cap);

        // No shape evidence exists for this proxy, so it stops at Alerta.
        let severity = if confidence >= self.alert_threshold {
            Severity::Alerta
        } else {
            Severity::Descartado
        };
        finding(zone, confidence, severity, false, String::new())
    }
}

fn shape_ok(analysis: &RegionAnalysis, profile: &ShapeProfile, image_area: f64) -> bool {
    let area = analysis.best_area();
    if area == 0 || !analysis.best_shape().oval {
        return false;
    }
    match profile.area_window {
        Some((lo, hi)) => (lo * image_area..=hi * image_area).contains(&(area as f64)),
        None => true,
    }
}

fn finding(
    zone: LesionZone,
    confidence: f64,
    severity: Severity,
    shape_ok: bool,
    notes: String,
) -> LesionFinding {
    LesionFinding {
        zone,
        present: severity != Severity::Descartado,
        confidence: (confidence * 100.0).round() / 100.0,
        severity,
        shape_ok,
        notes,
    }
}
