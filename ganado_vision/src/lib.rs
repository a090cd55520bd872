// THEORY:
// This file is the main entry point for the `ganado_vision` library crate.
// It defines the public API exposed to collaborators (the tester binary, an HTTP
// service, a batch job).
//
// The primary goal is to export the `Evaluator` and its request/result records
// (`EvaluationRequest`, `Evaluation`) together with the configuration layer, as
// the clean, high-level interface for the whole evaluation engine. The
// `core_modules` stay public for callers that want one stage on its own (lesion
// screening only, say), but most users never touch them.

pub mod config;
pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::{ConfigError, EvaluatorConfig, Mode, load_config};
pub use core_modules::aggregator::DecisionBand;
pub use core_modules::ensemble::{StabilityReport, StabilityTier};
pub use core_modules::lesion_classifier::{LesionFinding, LesionZone, Severity};
pub use core_modules::rubric_scorer::{BreedClass, BreedSignal, RubricItem, RubricKey};
pub use parallel_pipeline::{ParallelEvaluator, PipelineError};
pub use pipeline::{Evaluation, EvaluationRequest, Evaluator};
