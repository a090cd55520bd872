// THEORY:
// The `config` module holds every numeric knob the evaluation engine reads:
// rubric weight maps per operating mode, decision cut-points, visibility caps,
// lesion thresholds, the zebu heuristic weights and the ensemble trigger limits.
//
// Key architectural principles:
// 1.  **Explicit Construction**: An `EvaluatorConfig` is built once (from JSON or
//     `Default`) and handed to `Evaluator::new`. Nothing in the engine reads a
//     process-wide configuration.
// 2.  **Defaults Everywhere**: Every section carries `#[serde(default)]`, so an
//     empty `{}` document, a partial document, or no document at all produce a
//     working configuration. Per-zone lesion tables are the exception inside a
//     section: a zone that is present must be complete.
// 3.  **Sanitize After Load**: Values coming from disk are clamped and reordered
//     by `sanitize` so the downstream invariants (monotonic bands, totals in
//     [1, 5]) hold for any input.

use crate::core_modules::lesion_classifier::LesionZone;
use crate::core_modules::rubric_scorer::RubricKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A map from rubric key (e.g. `"bcs"`) to its weight in the weighted total.
pub type WeightMap = BTreeMap<String, f64>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The operating profile a buyer evaluates an animal under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Young stock bought to grow out.
    #[default]
    Levante,
    /// Animals bought for finishing.
    Engorde,
    /// Thin cull cows bought for recovery.
    VacaFlaca,
}

impl Mode {
    /// Parses a mode identifier. Unknown identifiers fall back to `Levante`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "engorde" => Mode::Engorde,
            "vaca_flaca" => Mode::VacaFlaca,
            _ => Mode::Levante,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Levante => "levante",
            Mode::Engorde => "engorde",
            Mode::VacaFlaca => "vaca_flaca",
        }
    }
}

/// Complete configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub weights_by_mode: WeightsByMode,
    pub decision_sublevels: DecisionCutPoints,
    pub visibility_caps: VisibilityCaps,
    pub pathology: PathologyConfig,
    pub breed: ZebuConfig,
    pub ensemble: EnsembleConfig,
}

impl EvaluatorConfig {
    /// Parses a JSON document and sanitizes the result.
    pub fn from_json_str(data: &str) -> Result<Self, serde_json::Error> {
        let config: EvaluatorConfig = serde_json::from_str(data)?;
        Ok(config.sanitize())
    }

    /// Clamps and reorders values so the engine's invariants hold for any input.
    pub fn sanitize(mut self) -> Self {
        self.weights_by_mode.sanitize();
        self.decision_sublevels.sanitize();
        self.visibility_caps.sanitize();
        self.pathology.sanitize();
        self.breed.sanitize();
        self.ensemble.sanitize();
        self
    }
}

/// Loads a JSON configuration file from disk.
pub fn load_config(path: &Path) -> Result<EvaluatorConfig, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    EvaluatorConfig::from_json_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn weights(pairs: &[(RubricKey, f64)]) -> WeightMap {
    pairs
        .iter()
        .map(|(key, weight)| (key.as_str().to_string(), *weight))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsByMode {
    pub levante: WeightMap,
    pub engorde: WeightMap,
    pub vaca_flaca: WeightMap,
}

impl Default for WeightsByMode {
    fn default() -> Self {
        use RubricKey::*;
        Self {
            levante: weights(&[
                (Bcs, 0.30),
                (GrupoPosterior, 0.10),
                (Aplomos, 0.05),
                (LineaDorsal, 0.12),
                (ProfToracica, 0.12),
                (Costillar, 0.07),
                (CabezaCuello, 0.04),
                (ColaGrupa, 0.04),
                (PielPelo, 0.06),
            ]),
            engorde: weights(&[
                (Bcs, 0.30),
                (GrupoPosterior, 0.30),
                (Aplomos, 0.05),
                (LineaDorsal, 0.08),
                (ProfToracica, 0.08),
                (Costillar, 0.04),
                (ColaGrupa, 0.05),
                (PielPelo, 0.10),
                (CabezaCuello, 0.00),
            ]),
            vaca_flaca: weights(&[
                (Bcs, 0.40),
                (Aplomos, 0.25),
                (LineaDorsal, 0.08),
                (ProfToracica, 0.08),
                (Costillar, 0.04),
                (PielPelo, 0.10),
                (CabezaCuello, 0.04),
                (ColaGrupa, 0.01),
                (GrupoPosterior, 0.00),
            ]),
        }
    }
}

impl WeightsByMode {
    pub fn for_mode(&self, mode: Mode) -> &WeightMap {
        match mode {
            Mode::Levante => &self.levante,
            Mode::Engorde => &self.engorde,
            Mode::VacaFlaca => &self.vaca_flaca,
        }
    }

    fn sanitize(&mut self) {
        for map in [&mut self.levante, &mut self.engorde, &mut self.vaca_flaca] {
            for weight in map.values_mut() {
                if !weight.is_finite() || *weight < 0.0 {
                    *weight = 0.0;
                }
            }
        }
    }
}

/// The three cut-points separating the four decision bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionCutPoints {
    pub no_comprar_max: f64,
    pub considerar_bajo_max: f64,
    pub considerar_alto_max: f64,
}

impl Default for DecisionCutPoints {
    fn default() -> Self {
        Self {
            no_comprar_max: 2.9,
            considerar_bajo_max: 3.2,
            considerar_alto_max: 3.7,
        }
    }
}

impl DecisionCutPoints {
    pub fn as_array(&self) -> [f64; 3] {
        [
            self.no_comprar_max,
            self.considerar_bajo_max,
            self.considerar_alto_max,
        ]
    }

    fn sanitize(&mut self) {
        let defaults = Self::default().as_array();
        let mut cuts = self.as_array();
        for (cut, fallback) in cuts.iter_mut().zip(defaults) {
            *cut = if cut.is_finite() { cut.clamp(1.0, 5.0) } else { fallback };
        }
        cuts.sort_by(f64::total_cmp);
        [
            self.no_comprar_max,
            self.considerar_bajo_max,
            self.considerar_alto_max,
        ] = cuts;
    }
}

/// Ceilings applied to the total when little of the animal is visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityCaps {
    pub lt_0_35: f64,
    pub lt_0_55: f64,
}

impl Default for VisibilityCaps {
    fn default() -> Self {
        Self {
            lt_0_35: 3.5,
            lt_0_55: 3.9,
        }
    }
}

impl VisibilityCaps {
    fn sanitize(&mut self) {
        let defaults = Self::default();
        self.lt_0_35 = sanitize_unit(self.lt_0_35, defaults.lt_0_35, 1.0, 5.0);
        self.lt_0_55 = sanitize_unit(self.lt_0_55, defaults.lt_0_55, 1.0, 5.0);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathologyConfig {
    pub alert_threshold: f64,
    pub confirm_threshold: f64,
    pub shape: ShapeConfig,
    pub checklist: ChecklistByMode,
    pub zones: ZoneThresholds,
}

impl Default for PathologyConfig {
    fn default() -> Self {
        Self {
            alert_threshold: 0.80,
            confirm_threshold: 0.90,
            shape: ShapeConfig::default(),
            checklist: ChecklistByMode::default(),
            zones: ZoneThresholds::default(),
        }
    }
}

impl PathologyConfig {
    fn sanitize(&mut self) {
        let defaults = Self::default();
        self.alert_threshold =
            sanitize_unit(self.alert_threshold, defaults.alert_threshold, 0.0, 1.0);
        self.confirm_threshold =
            sanitize_unit(self.confirm_threshold, defaults.confirm_threshold, 0.0, 1.0);
        self.shape.sanitize();
        self.zones.sanitize();
    }
}

/// Confidence tables per screened zone, keyed by the zone's wire name. A zone
/// given in the document must be complete; omitted zones keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneThresholds {
    pub lesion_cutanea: RedZoneConfig,
    pub ojo_infectado: RedZoneConfig,
    pub prolapso: RedZoneConfig,
    pub cojera: EdgeZoneConfig,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            lesion_cutanea: RedZoneConfig {
                red_bands: vec![(0.035, 0.86), (0.015, 0.78)],
                area_window: None,
                cap: 0.99,
            },
            ojo_infectado: RedZoneConfig {
                red_bands: vec![(0.02, 0.82)],
                area_window: Some((0.0002, 0.005)),
                cap: 0.97,
            },
            prolapso: RedZoneConfig {
                red_bands: vec![(0.02, 0.84)],
                area_window: None,
                cap: 0.99,
            },
            cojera: EdgeZoneConfig {
                bands: vec![(0.004, 0.55), (0.006, 0.65)],
                fallback: 0.40,
                cap: 0.85,
            },
        }
    }
}

impl ZoneThresholds {
    fn sanitize(&mut self) {
        let defaults = Self::default();
        self.lesion_cutanea.sanitize(&defaults.lesion_cutanea);
        self.ojo_infectado.sanitize(&defaults.ojo_infectado);
        self.prolapso.sanitize(&defaults.prolapso);
        self.cojera.sanitize(&defaults.cojera);
    }
}

/// Color evidence table for a zone screened by anomalous-red pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedZoneConfig {
    /// `[ratio, confidence]` pairs checked in order; the first ratio exceeded
    /// sets the base confidence.
    pub red_bands: Vec<(f64, f64)>,
    /// Component area window for the shape test, as fractions of the whole
    /// image area. `None` accepts any nominated component.
    #[serde(default)]
    pub area_window: Option<(f64, f64)>,
    pub cap: f64,
}

impl RedZoneConfig {
    fn sanitize(&mut self, defaults: &Self) {
        self.red_bands = sanitize_bands(&self.red_bands);
        self.cap = sanitize_unit(self.cap, defaults.cap, 0.0, 1.0);
        self.area_window = self.area_window.and_then(|(lo, hi)| {
            let (lo, hi) = (lo.clamp(0.0, 1.0), hi.clamp(0.0, 1.0));
            (lo.is_finite() && hi.is_finite()).then(|| (lo.min(hi), lo.max(hi)))
        });
    }
}

/// Edge-energy table for the lameness proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeZoneConfig {
    /// `[energy_below, confidence]` pairs checked in order.
    pub bands: Vec<(f64, f64)>,
    /// Confidence when no band matches.
    pub fallback: f64,
    pub cap: f64,
}

impl EdgeZoneConfig {
    fn sanitize(&mut self, defaults: &Self) {
        self.bands = sanitize_bands(&self.bands);
        self.fallback = sanitize_unit(self.fallback, defaults.fallback, 0.0, 1.0);
        self.cap = sanitize_unit(self.cap, defaults.cap, 0.0, 1.0);
    }
}

/// Drops non-finite pairs and clamps confidences to [0, 1]. Order is kept.
fn sanitize_bands(bands: &[(f64, f64)]) -> Vec<(f64, f64)> {
    bands
        .iter()
        .filter(|(threshold, confidence)| threshold.is_finite() && confidence.is_finite())
        .map(|(threshold, confidence)| (threshold.max(0.0), confidence.clamp(0.0, 1.0)))
        .collect()
}

/// Shape test parameters for the ovality check and component area window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    pub extent_min: f64,
    pub oval_aspect_lo: f64,
    pub oval_aspect_hi: f64,
    /// Smallest component kept, as a fraction of the analysed region's area.
    pub min_area_ratio: f64,
    /// Largest component kept, as a fraction of the analysed region's area.
    pub max_area_ratio: f64,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            extent_min: 0.45,
            oval_aspect_lo: 0.6,
            oval_aspect_hi: 1.8,
            min_area_ratio: 0.0008,
            max_area_ratio: 0.08,
        }
    }
}

impl ShapeConfig {
    fn sanitize(&mut self) {
        let defaults = Self::default();
        self.extent_min = sanitize_unit(self.extent_min, defaults.extent_min, 0.0, 1.0);
        self.min_area_ratio = sanitize_unit(self.min_area_ratio, defaults.min_area_ratio, 0.0, 1.0);
        self.max_area_ratio = sanitize_unit(self.max_area_ratio, defaults.max_area_ratio, 0.0, 1.0);
        if self.min_area_ratio > self.max_area_ratio {
            std::mem::swap(&mut self.min_area_ratio, &mut self.max_area_ratio);
        }
        self.oval_aspect_lo = sanitize_unit(self.oval_aspect_lo, defaults.oval_aspect_lo, 0.0, f64::MAX);
        self.oval_aspect_hi = sanitize_unit(self.oval_aspect_hi, defaults.oval_aspect_hi, 0.0, f64::MAX);
        if self.oval_aspect_lo > self.oval_aspect_hi {
            std::mem::swap(&mut self.oval_aspect_lo, &mut self.oval_aspect_hi);
        }
    }
}

/// Which anatomical zones are screened under each mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistByMode {
    pub levante: Vec<LesionZone>,
    pub engorde: Vec<LesionZone>,
    pub vaca_flaca: Vec<LesionZone>,
}

impl Default for ChecklistByMode {
    fn default() -> Self {
        Self {
            levante: LesionZone::ALL.to_vec(),
            engorde: LesionZone::ALL.to_vec(),
            vaca_flaca: LesionZone::ALL.to_vec(),
        }
    }
}

impl ChecklistByMode {
    pub fn for_mode(&self, mode: Mode) -> &[LesionZone] {
        match mode {
            Mode::Levante => &self.levante,
            Mode::Engorde => &self.engorde,
            Mode::VacaFlaca => &self.vaca_flaca,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZebuWeights {
    pub ears: f64,
    pub dewlap: f64,
    pub hump: f64,
}

impl Default for ZebuWeights {
    fn default() -> Self {
        Self {
            ears: 0.35,
            dewlap: 0.40,
            hump: 0.25,
        }
    }
}

/// Weights and thresholds for the local zebu-trait heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZebuConfig {
    pub weights: ZebuWeights,
    pub zebu_hi: f64,
    pub zebu_lo: f64,
}

impl Default for ZebuConfig {
    fn default() -> Self {
        Self {
            weights: ZebuWeights::default(),
            zebu_hi: 0.55,
            zebu_lo: 0.40,
        }
    }
}

impl ZebuConfig {
    fn sanitize(&mut self) {
        let defaults = Self::default();
        self.zebu_hi = sanitize_unit(self.zebu_hi, defaults.zebu_hi, 0.0, 1.0);
        self.zebu_lo = sanitize_unit(self.zebu_lo, defaults.zebu_lo, 0.0, 1.0);
        if self.zebu_lo > self.zebu_hi {
            std::mem::swap(&mut self.zebu_lo, &mut self.zebu_hi);
        }
        let fallback = ZebuWeights::default();
        self.weights.ears = sanitize_unit(self.weights.ears, fallback.ears, 0.0, f64::MAX);
        self.weights.dewlap = sanitize_unit(self.weights.dewlap, fallback.dewlap, 0.0, f64::MAX);
        self.weights.hump = sanitize_unit(self.weights.hump, fallback.hump, 0.0, f64::MAX);
    }
}

/// Limits for the second-pass trigger and the variant scale alternation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Target max dimension for even-indexed variants (including the original).
    pub primary_max_dimension: u32,
    /// Target max dimension for odd-indexed variants.
    pub alternate_max_dimension: u32,
    /// Half-width of the "borderline" band around each decision cut-point.
    pub borderline_margin: f64,
    /// Evidence scores below this trigger the second pass.
    pub evidence_floor: f64,
    /// Rubric standard deviations above this trigger the second pass.
    pub sigma_ceiling: f64,
    /// Sub-component confidences below this count as low.
    pub low_confidence: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            primary_max_dimension: 512,
            alternate_max_dimension: 384,
            borderline_margin: 0.10,
            evidence_floor: 3.5,
            sigma_ceiling: 0.6,
            low_confidence: 0.6,
        }
    }
}

impl EnsembleConfig {
    fn sanitize(&mut self) {
        let defaults = Self::default();
        self.primary_max_dimension = self.primary_max_dimension.max(1);
        self.alternate_max_dimension = self.alternate_max_dimension.max(1);
        self.borderline_margin =
            sanitize_unit(self.borderline_margin, defaults.borderline_margin, 0.0, 4.0);
        self.evidence_floor = sanitize_unit(self.evidence_floor, defaults.evidence_floor, 0.0, 5.0);
        self.sigma_ceiling = sanitize_unit(self.sigma_ceiling, defaults.sigma_ceiling, 0.0, 4.0);
        self.low_confidence = sanitize_unit(self.low_confidence, defaults.low_confidence, 0.0, 1.0);
    }
}

fn sanitize_unit(value: f64, fallback: f64, lo: f64, hi: f64) -> f64 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EvaluatorConfig::from_json_str("{}").expect("empty config parses");
        assert_eq!(config.decision_sublevels.as_array(), [2.9, 3.2, 3.7]);
        assert_eq!(config.visibility_caps.lt_0_35, 3.5);
        assert_eq!(config.pathology.confirm_threshold, 0.90);
        assert_eq!(config.weights_by_mode.levante.len(), 9);
        assert_eq!(config.pathology.checklist.engorde.len(), 4);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = EvaluatorConfig::from_json_str(
            r#"{"visibility_caps": {"lt_0_35": 3.0}, "pathology": {"shape": {"extent_min": 0.5}}}"#,
        )
        .expect("partial config parses");
        assert_eq!(config.visibility_caps.lt_0_35, 3.0);
        assert_eq!(config.visibility_caps.lt_0_55, 3.9);
        assert_eq!(config.pathology.shape.extent_min, 0.5);
        assert_eq!(config.pathology.shape.oval_aspect_hi, 1.8);
        assert_eq!(config.pathology.alert_threshold, 0.80);
    }

    #[test]
    fn unsorted_cut_points_are_reordered() {
        let config = EvaluatorConfig::from_json_str(
            r#"{"decision_sublevels": {"no_comprar_max": 3.8, "considerar_bajo_max": 3.0, "considerar_alto_max": 9.0}}"#,
        )
        .expect("config parses");
        assert_eq!(config.decision_sublevels.as_array(), [3.0, 3.8, 5.0]);
    }

    #[test]
    fn negative_weights_are_zeroed() {
        let config = EvaluatorConfig::from_json_str(
            r#"{"weights_by_mode": {"engorde": {"bcs": -1.0, "aplomos": 0.5}}}"#,
        )
        .expect("config parses");
        let engorde = config.weights_by_mode.for_mode(Mode::Engorde);
        assert_eq!(engorde.get("bcs"), Some(&0.0));
        assert_eq!(engorde.get("aplomos"), Some(&0.5));
        assert_eq!(engorde.len(), 2);
    }

    #[test]
    fn zone_tables_default_and_override_per_zone() {
        let config = EvaluatorConfig::from_json_str(
            r#"{"pathology": {"zones": {"ojo_infectado": {"red_bands": [[0.03, 0.9], [0.01, 2.0]], "area_window": [0.01, 0.001], "cap": 0.95}}}}"#,
        )
        .expect("zone override parses");
        let zones = &config.pathology.zones;
        assert_eq!(zones.ojo_infectado.red_bands, vec![(0.03, 0.9), (0.01, 1.0)]);
        assert_eq!(zones.ojo_infectado.area_window, Some((0.001, 0.01)));
        assert_eq!(zones.ojo_infectado.cap, 0.95);
        assert_eq!(zones.lesion_cutanea, ZoneThresholds::default().lesion_cutanea);
        assert_eq!(zones.cojera.cap, 0.85);
        assert_eq!(zones.prolapso.area_window, None);
    }

    #[test]
    fn incomplete_zone_table_is_a_parse_error() {
        assert!(EvaluatorConfig::from_json_str(r#"{"pathology": {"zones": {"cojera": {"cap": 0.7}}}}"#).is_err());
    }

    #[test]
    fn unknown_mode_falls_back_to_levante() {
        assert_eq!(Mode::from_name("engorde"), Mode::Engorde);
        assert_eq!(Mode::from_name(" VACA_FLACA "), Mode::VacaFlaca);
        assert_eq!(Mode::from_name("subasta"), Mode::Levante);
        assert_eq!(Mode::from_name(""), Mode::Levante);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_config(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
