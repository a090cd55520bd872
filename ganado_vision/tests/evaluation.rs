mod common;

use common::init_logging;
use common::synthetic_image::{horizontal_ramp, noise, red_patch, uniform, vertical_stripes};
use ganado_vision::config::EvaluatorConfig;
use ganado_vision::core_modules::aggregator::Aggregator;
use ganado_vision::core_modules::feature_extractor::{Backline, FeatureVector, Level};
use ganado_vision::core_modules::region_segmenter::region_segmenter;
use ganado_vision::core_modules::rubric_scorer::RubricScorer;
use ganado_vision::pipeline::TriggerReport;
use ganado_vision::{
    DecisionBand, EvaluationRequest, Evaluator, LesionZone, Mode, RubricKey, Severity,
};

fn side_on_features(ribs_visible: bool, body_condition: f64) -> FeatureVector {
    FeatureVector {
        brightness: 0.6,
        contrast: 0.25,
        edge_energy: 0.05,
        backline_variance: 1.0,
        whiteness: 0.10,
        red_ratio: 0.0,
        ribs_visible,
        backline_score: 4.2,
        posterior_score: 4.0,
        thorax: Level::High,
        abdomen: Level::Med,
        backline: Backline::Good,
        posterior: Level::High,
        body_condition,
        body_condition_confidence: 0.70,
        capacity_confidence: 0.65,
        posterior_confidence: 0.65,
    }
}

fn first_pass(features: &FeatureVector, visibility: f64) -> (f64, DecisionBand, TriggerReport) {
    let config = EvaluatorConfig::default();
    let card = RubricScorer.score(features);
    let aggregate = Aggregator::new(&config).aggregate(&card.items, &card.breed, visibility, Mode::Levante);
    let trigger = TriggerReport::assess(
        features,
        &card,
        aggregate.total,
        visibility,
        &config.decision_sublevels,
        &config.ensemble,
    );
    (aggregate.total, aggregate.band, trigger)
}

#[test]
fn well_finished_animal_lands_in_upper_bands_without_ensemble() {
    let (total, band, trigger) = first_pass(&side_on_features(false, 3.2), 0.9);
    assert!(band >= DecisionBand::ConsiderarAlto, "band {band:?} total {total}");
    assert!(!trigger.fired, "unexpected ensemble trigger: {trigger:?}");
}

#[test]
fn low_visibility_caps_total() {
    let (total, _, trigger) = first_pass(&side_on_features(false, 3.2), 0.30);
    assert!(total <= 3.5, "total {total} above the lt_0_35 cap");
    assert!(trigger.low_visibility);
    assert!(trigger.fired);

    init_logging();
    let evaluation = Evaluator::default().evaluate(
        &noise(160, 120, 7),
        &EvaluationRequest::new(Mode::Levante, 0.30),
    );
    assert!(evaluation.total <= 3.5, "total {}", evaluation.total);
}

#[test]
fn visible_ribs_on_a_fat_score_force_the_ensemble() {
    let (_, _, trigger) = first_pass(&side_on_features(true, 3.6), 0.9);
    assert!(trigger.conflict_ribs_bcs);
    assert!(trigger.fired);
}

#[test]
fn red_oval_patch_is_a_confirmed_skin_lesion() {
    init_logging();
    let image = red_patch(100, 100, 40, 40, 20);
    let evaluation = Evaluator::default().evaluate(&image, &EvaluationRequest::new(Mode::Levante, 0.9));

    let skin = evaluation
        .lesions
        .iter()
        .find(|finding| finding.zone == LesionZone::Skin)
        .expect("skin is on the default checklist");
    assert_eq!(skin.severity, Severity::Confirmada);
    assert!(skin.present);
    assert!(skin.shape_ok);
    assert_eq!(skin.notes, "rojo≈4.0%, oval=1, extent≈1.00");
}

#[test]
fn rubric_always_has_nine_bounded_items_in_order() {
    init_logging();
    let evaluator = Evaluator::default();
    let images = [
        uniform(64, 48, 128),
        horizontal_ramp(120, 80),
        vertical_stripes(120, 80, 3, 30, 220),
        noise(90, 70, 42),
    ];
    for image in &images {
        let evaluation = evaluator.evaluate(image, &EvaluationRequest::new(Mode::Engorde, 0.8));
        let keys: Vec<RubricKey> = evaluation.rubric.iter().map(|item| item.key).collect();
        assert_eq!(keys, RubricKey::ALL.to_vec());
        for item in &evaluation.rubric {
            assert!((1.0..=5.0).contains(&item.score), "{:?} = {}", item.key, item.score);
        }
        assert!((1.0..=5.0).contains(&evaluation.total));
    }
}

#[test]
fn decision_follows_the_total_without_risk() {
    let evaluator = Evaluator::default();
    let cuts = &evaluator.config().decision_sublevels;
    for seed in 1..6 {
        let evaluation = evaluator.evaluate(&noise(80, 60, seed), &EvaluationRequest::new(Mode::Levante, 0.7));
        assert_eq!(evaluation.decision, DecisionBand::from_total(evaluation.total, cuts));
        assert_eq!(evaluation.decision_label, evaluation.decision.label());
    }
}

#[test]
fn bands_are_monotonic_in_the_total() {
    let cuts = EvaluatorConfig::default().decision_sublevels;
    let mut previous = DecisionBand::NoComprar;
    for step in 100..=500 {
        let band = DecisionBand::from_total(step as f64 / 100.0, &cuts);
        assert!(band >= previous, "band dropped at {step}");
        previous = band;
    }
    assert_eq!(previous, DecisionBand::Comprar);
}

#[test]
fn high_risk_rejects_and_explains() {
    let evaluator = Evaluator::default();
    let image = horizontal_ramp(120, 80);
    let request = EvaluationRequest::new(Mode::VacaFlaca, 0.9).with_risk(0.9);
    let evaluation = evaluator.evaluate(&image, &request);
    assert_eq!(evaluation.decision, DecisionBand::NoComprar);

    // Risk only moves the band, never the total. The reason appears exactly when the band moved.
    let unrisked = evaluator.evaluate(&image, &EvaluationRequest::new(Mode::VacaFlaca, 0.9));
    assert_eq!(evaluation.total, unrisked.total);
    let explained = evaluation
        .reasons
        .iter()
        .any(|reason| reason == "Riesgo 0.90: decisión ajustada a NO COMPRAR.");
    assert_eq!(explained, unrisked.decision != DecisionBand::NoComprar, "{:?}", evaluation.reasons);
}

#[test]
fn evaluation_is_deterministic() {
    let evaluator = Evaluator::default();
    let image = noise(100, 80, 11);
    let request = EvaluationRequest::new(Mode::Levante, 0.4);
    assert_eq!(evaluator.evaluate(&image, &request), evaluator.evaluate(&image, &request));
}

#[test]
fn ensemble_reports_every_item_over_seven_members() {
    let evaluation = Evaluator::default().evaluate(&noise(120, 90, 3), &EvaluationRequest::new(Mode::Levante, 0.2));
    assert!(evaluation.diagnostics.second_pass_used);
    let stability = evaluation
        .diagnostics
        .stability
        .as_ref()
        .expect("low visibility always runs the ensemble");
    assert_eq!(stability.ensemble_size, 7);
    assert_eq!(stability.items.len(), 9);
    assert!((0.0..=1.0).contains(&stability.global));
    assert_eq!(evaluation.stability_tier, Some(stability.tier));
    assert!(evaluation.reasons.iter().any(|reason| reason.starts_with("2ª pasada")));
    for (item, report) in evaluation.rubric.iter().zip(&stability.items) {
        assert_eq!(item.key, report.key);
        assert!((0.0..=1.0).contains(&report.stability));
    }
}

#[test]
fn uniform_image_has_no_anomalous_regions() {
    let image = uniform(64, 64, 200);
    let analysis = region_segmenter::segment(&image, &EvaluatorConfig::default().pathology.shape);
    assert!(analysis.components.is_empty());
    assert!(analysis.best.is_none());

    let evaluation = Evaluator::default().evaluate(&image, &EvaluationRequest::new(Mode::Levante, 0.9));
    for finding in evaluation.lesions.iter().filter(|f| f.zone != LesionZone::Lameness) {
        assert_eq!(finding.severity, Severity::Descartado, "{:?}", finding.zone);
    }
}

#[test]
fn degenerate_images_still_get_an_answer() {
    let evaluator = Evaluator::default();
    for (w, h) in [(0, 0), (1, 1), (1, 40), (40, 1)] {
        let image = uniform(w, h, 90);
        let evaluation = evaluator.evaluate(&image, &EvaluationRequest::new(Mode::Levante, f64::NAN));
        assert_eq!(evaluation.rubric.len(), 9);
        assert!((1.0..=5.0).contains(&evaluation.total));
        assert!(evaluation.diagnostics.second_pass_used, "{w}x{h} at zero visibility");
    }
}

#[test]
fn evaluation_serializes_with_wire_names() {
    let evaluation = Evaluator::default().evaluate(&red_patch(100, 100, 40, 40, 20), &EvaluationRequest::new(Mode::Levante, 0.9));
    let json = serde_json::to_value(&evaluation).expect("evaluation serializes");
    assert_eq!(json["mode"], "levante");
    assert_eq!(json["rubric"].as_array().map(Vec::len), Some(9));
    assert_eq!(json["lesions"][0]["zone"], "lesion_cutanea");
    assert!(json["diagnostics"]["second_pass_used"].is_boolean());
    assert!(json["diagnostics"]["evidence"].is_number());
}
