// THEORY:
// The `ParallelEvaluator` is the async front of the engine for services that
// evaluate many photos at once. It produces exactly the same `Evaluation` as
// `Evaluator::evaluate`; only the scheduling differs.
//
// Key architectural principles:
// 1.  **Blocking Work Off The Runtime**: every pixel-crunching stage runs on a
//     `spawn_blocking` worker so async request handling is never stalled.
// 2.  **Bounded Fan-Out**: when the ensemble fires, each variant is scored on
//     its own worker. A semaphore sized to the CPU count bounds how many variant
//     tasks run at once across all concurrent evaluations.
// 3.  **Ordered Join**: `join_all` returns results in submission order, so the
//     ensemble folds the variants in the same order as the sequential path.

use crate::core_modules::ensemble;
use crate::core_modules::rubric_scorer::ScoreCard;
use crate::pipeline::{EvaluationRequest, Evaluation, Evaluator};
use futures::future::join_all;
use image::RgbImage;
use log::debug;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::{self, JoinError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("evaluation worker failed: {0}")]
    Worker(#[from] JoinError),
    #[error("worker pool closed: {0}")]
    PoolClosed(#[from] AcquireError),
}

#[derive(Debug, Clone)]
pub struct ParallelEvaluator {
    evaluator: Arc<Evaluator>,
    permits: Arc<Semaphore>,
}

impl ParallelEvaluator {
    /// Bounds variant work to one task per CPU.
    pub fn new(evaluator: Evaluator) -> Self {
        Self::with_workers(evaluator, num_cpus::get())
    }

    pub fn with_workers(evaluator: Evaluator, workers: usize) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub async fn evaluate(
        &self,
        image: Arc<RgbImage>,
        request: EvaluationRequest,
    ) -> Result<Evaluation, PipelineError> {
        // Stage 1 and 2: first pass, lesions, zebu and variant generation
        let evaluator = Arc::clone(&self.evaluator);
        let source = Arc::clone(&image);
        let (first, lesions, zebu, variants) = task::spawn_blocking(move || {
            let first = evaluator.first_pass(&source, &request);
            let lesions = evaluator.screen_lesions(&source, &request);
            let zebu = evaluator.detect_breed(&source);
            let variants = if first.trigger.fired {
                evaluator.variants(&source)
            } else {
                Vec::new()
            };
            (first, lesions, zebu, variants)
        })
        .await?;

        // Stage 3: one blocking task per variant
        let ensemble = if first.trigger.fired {
            debug!("scoring {} variants in parallel", variants.len());
            let tasks = variants.into_iter().enumerate().map(|(i, variant)| {
                let evaluator = Arc::clone(&self.evaluator);
                let permits = Arc::clone(&self.permits);
                async move {
                    let _permit = permits.acquire_owned().await?;
                    let card = task::spawn_blocking(move || evaluator.score_variant(&variant.image, i + 1)).await?;
                    Ok::<ScoreCard, PipelineError>(card)
                }
            });
            let cards = join_all(tasks).await.into_iter().collect::<Result<Vec<_>, _>>()?;
            Some(ensemble::aggregate(&first.card, &cards))
        } else {
            None
        };

        // Stage 4: assembly
        Ok(self.evaluator.finish(&request, first, ensemble, lesions, zebu))
    }

    /// Evaluates several photos concurrently, preserving input order.
    pub async fn evaluate_batch(
        &self,
        jobs: Vec<(Arc<RgbImage>, EvaluationRequest)>,
    ) -> Vec<Result<Evaluation, PipelineError>> {
        join_all(jobs.into_iter().map(|(image, request)| self.evaluate(image, request))).await
    }
}
