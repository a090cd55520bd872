mod common;

use common::init_logging;
use common::synthetic_image::{horizontal_ramp, noise, red_patch};
use ganado_vision::{EvaluationRequest, Evaluator, Mode, ParallelEvaluator};
use std::sync::Arc;

#[tokio::test]
async fn parallel_matches_sequential_with_and_without_ensemble() {
    init_logging();
    let parallel = ParallelEvaluator::with_workers(Evaluator::default(), 3);
    let cases = [
        (noise(120, 90, 5), EvaluationRequest::new(Mode::Levante, 0.25)),
        (horizontal_ramp(140, 100), EvaluationRequest::new(Mode::Engorde, 0.95)),
        (red_patch(100, 100, 40, 40, 20), EvaluationRequest::new(Mode::VacaFlaca, 0.9).with_risk(0.45)),
    ];

    let mut saw_ensemble = false;
    for (image, request) in cases {
        let expected = parallel.evaluator().evaluate(&image, &request);
        let actual = parallel
            .evaluate(Arc::new(image), request)
            .await
            .expect("workers finish");
        saw_ensemble |= actual.diagnostics.second_pass_used;
        assert_eq!(actual, expected);
    }
    assert!(saw_ensemble, "low visibility case must run the ensemble");
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let parallel = ParallelEvaluator::new(Evaluator::default());
    let jobs: Vec<_> = (1..5)
        .map(|seed| {
            let visibility = 0.2 * seed as f64;
            (
                Arc::new(noise(64, 48, seed)),
                EvaluationRequest::new(Mode::Levante, visibility),
            )
        })
        .collect();
    let expected: Vec<_> = jobs
        .iter()
        .map(|(image, request)| parallel.evaluator().evaluate(image, request))
        .collect();

    let results = parallel.evaluate_batch(jobs).await;
    assert_eq!(results.len(), expected.len());
    for (result, expected) in results.into_iter().zip(expected) {
        assert_eq!(result.expect("workers finish"), expected);
    }
}

#[tokio::test]
async fn single_worker_pool_still_completes_the_ensemble() {
    let parallel = ParallelEvaluator::with_workers(Evaluator::default(), 0);
    let evaluation = parallel
        .evaluate(Arc::new(noise(80, 60, 9)), EvaluationRequest::new(Mode::Levante, 0.1))
        .await
        .expect("workers finish");
    assert_eq!(
        evaluation.diagnostics.stability.map(|report| report.ensemble_size),
        Some(7)
    );
}
