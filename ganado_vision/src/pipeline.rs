// THEORY:
// The `pipeline` module is the top-level API of the evaluation engine. One call,
// `Evaluator::evaluate`, takes a decoded photo and a request (mode, visibility,
// optional risk) and returns a fully assembled `Evaluation`.
//
// Key architectural principles:
// 1.  **Conditional Ensemble**: the first pass is cheap. The variant ensemble
//     only runs when the first pass looks unreliable (weak evidence, poor
//     visibility, a total sitting on a cut-point, a scattered rubric,
//     contradictory signals or several low confidences).
// 2.  **Pure Stages**: every stage returns a new value. The ensemble folds
//     variant scorecards; nothing is mutated in place.
// 3.  **Always Answers**: no stage fails. Degenerate photos come back as
//     low-confidence, low-band evaluations.
// 4.  **Reusable Building Blocks**: the stages are public so the async driver in
//     `parallel_pipeline` can spread the variant work over worker threads and
//     still assemble exactly the same result.

use crate::config::{DecisionCutPoints, EnsembleConfig, EvaluatorConfig, Mode, WeightMap};
use crate::core_modules::aggregator::{Aggregate, Aggregator, DecisionBand, round2};
use crate::core_modules::ensemble::{self, EnsembleOutcome, StabilityReport, StabilityTier};
use crate::core_modules::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::core_modules::lesion_classifier::{LesionClassifier, LesionFinding, LesionReport};
use crate::core_modules::rubric_scorer::{BreedSignal, RubricItem, RubricScorer, ScoreCard};
use crate::core_modules::variants::{self, ImageVariant};
use crate::core_modules::zebu::{ZebuDetector, ZebuSignal};
use image::RgbImage;
use log::{debug, info};
use serde::Serialize;

/// Visibility ratio below which the ensemble always runs.
pub const LOW_VISIBILITY: f64 = 0.55;

const CONTRAST_FLOOR: f64 = 0.05;
const CONTRAST_CEILING: f64 = 0.35;

/// What the caller asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationRequest {
    pub mode: Mode,
    /// 0..1 share of the animal visible in the photo, estimated by the caller.
    pub visibility_ratio: f64,
    /// Optional caller-supplied health/transport risk, 0..1.
    pub risk: Option<f64>,
}

impl EvaluationRequest {
    pub fn new(mode: Mode, visibility_ratio: f64) -> Self {
        Self {
            mode,
            visibility_ratio: if visibility_ratio.is_finite() {
                visibility_ratio.clamp(0.0, 1.0)
            } else {
                0.0
            },
            risk: None,
        }
    }

    pub fn with_risk(mut self, risk: f64) -> Self {
        self.risk = risk.is_finite().then_some(risk);
        self
    }
}

/// Uncertainty signals of a first pass and whether they call for the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerReport {
    /// 1..5 blend of visibility and normalized contrast, rounded to 2 decimals.
    pub evidence: f64,
    /// Population standard deviation of the rubric scores.
    pub sigma_rubric: f64,
    pub borderline: bool,
    /// Ribs visibly showing while the body condition reads high.
    pub conflict_ribs_bcs: bool,
    pub low_confidence_count: usize,
    pub low_visibility: bool,
    pub fired: bool,
}

impl TriggerReport {
    pub fn assess(
        features: &FeatureVector,
        card: &ScoreCard,
        total: f64,
        visibility_ratio: f64,
        cuts: &DecisionCutPoints,
        limits: &EnsembleConfig,
    ) -> Self {
        let evidence = evidence_score(visibility_ratio, features.contrast);
        let sigma_rubric = population_std(&card.scores().collect::<Vec<_>>());
        let borderline = cuts
            .as_array()
            .iter()
            .any(|cut| (total - cut).abs() <= limits.borderline_margin + 1e-9);
        let conflict_ribs_bcs = features.ribs_visible && features.body_condition >= 3.5;
        let low_confidence_count = [
            features.body_condition_confidence,
            features.capacity_confidence,
            features.posterior_confidence,
        ]
        .iter()
        .filter(|conf| **conf < limits.low_confidence)
        .count();
        let low_visibility = visibility_ratio < LOW_VISIBILITY;

        let fired = evidence < limits.evidence_floor
            || low_visibility
            || borderline
            || sigma_rubric > limits.sigma_ceiling
            || conflict_ribs_bcs
            || low_confidence_count >= 2;

        Self {
            evidence,
            sigma_rubric,
            borderline,
            conflict_ribs_bcs,
            low_confidence_count,
            low_visibility,
            fired,
        }
    }
}

/// `5 · (0.4·visibility + 0.6·clamp(contrast, 0.05, 0.35)/0.35)`, rounded.
pub fn evidence_score(visibility_ratio: f64, contrast: f64) -> f64 {
    let contrast_term = contrast.clamp(CONTRAST_FLOOR, CONTRAST_CEILING) / CONTRAST_CEILING;
    round2(5.0 * (0.4 * visibility_ratio + 0.6 * contrast_term))
}

fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Output of the single-pass stage.
#[derive(Debug, Clone)]
pub struct FirstPass {
    pub features: FeatureVector,
    pub card: ScoreCard,
    pub aggregate: Aggregate,
    pub trigger: TriggerReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    #[serde(flatten)]
    pub trigger: TriggerReport,
    pub second_pass_used: bool,
    pub stability: Option<StabilityReport>,
}

/// The complete answer for one photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub mode: Mode,
    pub rubric: Vec<RubricItem>,
    /// Whiteness-based breed signal used by the aggregator.
    pub breed: BreedSignal,
    /// Zebu-trait breed signal, reported only.
    pub zebu: ZebuSignal,
    /// First-pass features of the untouched photo.
    pub features: FeatureVector,
    pub total: f64,
    pub decision: DecisionBand,
    pub decision_label: &'static str,
    pub decision_hint: &'static str,
    pub lesions: Vec<LesionFinding>,
    pub blur_score: f64,
    pub global_confidence: f64,
    pub weights_used: WeightMap,
    pub reasons: Vec<String>,
    pub diagnostics: Diagnostics,
    pub stability_tier: Option<StabilityTier>,
}

/// The evaluation engine. Immutable after construction; safe to share.
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvaluatorConfig,
    extractor: FeatureExtractor,
    scorer: RubricScorer,
    aggregator: Aggregator,
    lesions: LesionClassifier,
    zebu: ZebuDetector,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EvaluatorConfig::default())
    }
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            extractor: FeatureExtractor,
            scorer: RubricScorer,
            aggregator: Aggregator::new(&config),
            lesions: LesionClassifier::new(&config.pathology),
            zebu: ZebuDetector::new(&config.breed),
            config,
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn evaluate(&self, image: &RgbImage, request: &EvaluationRequest) -> Evaluation {
        // Stage 1: single pass over the untouched photo
        let first = self.first_pass(image, request);

        // Stage 2: lesion screening and the zebu heuristic
        let lesions = self.screen_lesions(image, request);
        let zebu = self.detect_breed(image);

        // Stage 3: confidence-gated ensemble
        let ensemble = first.trigger.fired.then(|| {
            let cards: Vec<ScoreCard> = self
                .variants(image)
                .iter()
                .enumerate()
                .map(|(i, variant)| self.score_variant(&variant.image, i + 1))
                .collect();
            ensemble::aggregate(&first.card, &cards)
        });

        // Stage 4: final aggregation and assembly
        self.finish(request, first, ensemble, lesions, zebu)
    }

    pub fn first_pass(&self, image: &RgbImage, request: &EvaluationRequest) -> FirstPass {
        let features = self.extractor.extract(image, self.config.ensemble.primary_max_dimension);
        let card = self.scorer.score(&features);
        let aggregate = self
            .aggregator
            .aggregate(&card.items, &card.breed, request.visibility_ratio, request.mode);
        let trigger = TriggerReport::assess(
            &features,
            &card,
            aggregate.total,
            request.visibility_ratio,
            self.aggregator.cut_points(),
            &self.config.ensemble,
        );
        debug!(
            "first pass: total={:.2} band={:?} evidence={:.2} sigma={:.3} borderline={} conflict={} low_conf={} -> ensemble={}",
            aggregate.total,
            aggregate.band,
            trigger.evidence,
            trigger.sigma_rubric,
            trigger.borderline,
            trigger.conflict_ribs_bcs,
            trigger.low_confidence_count,
            trigger.fired
        );
        FirstPass {
            features,
            card,
            aggregate,
            trigger,
        }
    }

    pub fn screen_lesions(&self, image: &RgbImage, request: &EvaluationRequest) -> LesionReport {
        let zones = self.config.pathology.checklist.for_mode(request.mode);
        self.lesions.screen(image, zones, request.visibility_ratio)
    }

    pub fn detect_breed(&self, image: &RgbImage) -> ZebuSignal {
        self.zebu.detect(image)
    }

    /// The perturbed copies re-scored by the ensemble, excluding the original.
    pub fn variants(&self, image: &RgbImage) -> Vec<ImageVariant> {
        variants::generate(image)
    }

    /// Scores ensemble member `index` (the original is member 0).
    pub fn score_variant(&self, image: &RgbImage, index: usize) -> ScoreCard {
        let target = variants::target_dimension(index, &self.config.ensemble);
        self.scorer.score(&self.extractor.extract(image, target))
    }

    pub fn finish(
        &self,
        request: &EvaluationRequest,
        first: FirstPass,
        ensemble: Option<EnsembleOutcome>,
        lesions: LesionReport,
        zebu: ZebuSignal,
    ) -> Evaluation {
        let (card, aggregate, stability) = match ensemble {
            Some(outcome) => {
                let aggregate = self.aggregator.aggregate(
                    &outcome.card.items,
                    &outcome.card.breed,
                    request.visibility_ratio,
                    request.mode,
                );
                debug!(
                    "ensemble: n={} si={:.2} tier={:?} total {:.2} -> {:.2}",
                    outcome.report.ensemble_size,
                    outcome.report.global,
                    outcome.report.tier,
                    first.aggregate.total,
                    aggregate.total
                );
                (outcome.card, aggregate, Some(outcome.report))
            }
            None => (first.card, first.aggregate, None),
        };

        let mut decision = aggregate.band;
        let mut reasons = Vec::new();
        if !aggregate.hint.is_empty() {
            reasons.push(aggregate.hint.to_string());
        }
        reasons.push(format!("Pesos por modo: {}.", request.mode.as_str()));
        if let Some(report) = &stability {
            reasons.push(format!("2ª pasada de confirmación ejecutada; SI={}.", report.global));
        }
        if let Some(risk) = request.risk {
            let downgraded = decision.downgrade_for_risk(risk);
            if downgraded != decision {
                reasons.push(format!(
                    "Riesgo {:.2}: decisión ajustada a {}.",
                    risk,
                    downgraded.label()
                ));
                decision = downgraded;
            }
        }

        info!(
            "evaluation: mode={} total={:.2} decision={} second_pass={} lesions_present={}",
            request.mode.as_str(),
            aggregate.total,
            decision.label(),
            stability.is_some(),
            lesions.findings.iter().filter(|f| f.present).count()
        );

        Evaluation {
            mode: request.mode,
            rubric: card.items,
            breed: card.breed,
            zebu,
            global_confidence: first.features.body_condition_confidence,
            features: first.features,
            total: aggregate.total,
            decision,
            decision_label: decision.label(),
            decision_hint: decision.hint(),
            lesions: lesions.findings,
            blur_score: lesions.blur_score,
            weights_used: aggregate.weights_used,
            reasons,
            stability_tier: stability.as_ref().map(|report| report.tier),
            diagnostics: Diagnostics {
                trigger: first.trigger,
                second_pass_used: stability.is_some(),
                stability,
            },
        }
    }
}
