// THEORY:
// The `Aggregator` folds a rubric into one number and one purchase decision.
//
// Algorithm steps:
// 1.  **Weighted Mean**: the mode selects a weight map keyed by rubric key. The
//     total is Σ(score·w)/Σ(w) over the items present in the map; items absent
//     from the map weigh 0. A zero weight sum falls back to a divisor of 1.
// 2.  **Breed Adjustment**: +0.10 for a confident ENRAZADO signal, −0.10 for
//     CRIOLLO, then the total is clamped to [1, 5].
// 3.  **Visibility Caps**: a poorly visible animal cannot score high, whatever
//     its measured quality.
// 4.  **Banding**: the total is rounded to 2 decimals and compared against three
//     ascending cut-points. The band is therefore a function of the reported
//     total alone and is monotonic in it.

use crate::config::{DecisionCutPoints, EvaluatorConfig, Mode, VisibilityCaps, WeightMap, WeightsByMode};
use crate::core_modules::rubric_scorer::{BreedClass, BreedSignal, RubricItem};
use serde::{Deserialize, Serialize};

/// Breed confidence required before an ENRAZADO signal raises the total.
pub const ENRAZADO_MIN_CONFIDENCE: f64 = 0.75;
pub const BREED_ADJUSTMENT: f64 = 0.10;

/// Risk above which the decision collapses to `NoComprar`.
pub const RISK_REJECT: f64 = 0.55;
/// Risk above which the decision drops one band.
pub const RISK_DOWNGRADE: f64 = 0.40;

/// The four purchase recommendations, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionBand {
    NoComprar,
    ConsiderarBajo,
    ConsiderarAlto,
    Comprar,
}

impl DecisionBand {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionBand::NoComprar => "NO COMPRAR",
            DecisionBand::ConsiderarBajo => "CONSIDERAR (bajo)",
            DecisionBand::ConsiderarAlto => "CONSIDERAR (alto)",
            DecisionBand::Comprar => "COMPRAR",
        }
    }

    /// Advice attached to the two CONSIDERAR bands; empty otherwise.
    pub fn hint(&self) -> &'static str {
        match self {
            DecisionBand::ConsiderarBajo => "Solo si precio bajo.",
            DecisionBand::ConsiderarAlto => "Vale si condiciones son buenas.",
            DecisionBand::NoComprar | DecisionBand::Comprar => "",
        }
    }

    /// Bands `total` against ascending cut-points.
    pub fn from_total(total: f64, cuts: &DecisionCutPoints) -> Self {
        if total < cuts.no_comprar_max {
            DecisionBand::NoComprar
        } else if total <= cuts.considerar_bajo_max {
            DecisionBand::ConsiderarBajo
        } else if total <= cuts.considerar_alto_max {
            DecisionBand::ConsiderarAlto
        } else {
            DecisionBand::Comprar
        }
    }

    /// One band lower, saturating at `NoComprar`.
    pub fn lower(&self) -> Self {
        match self {
            DecisionBand::NoComprar | DecisionBand::ConsiderarBajo => DecisionBand::NoComprar,
            DecisionBand::ConsiderarAlto => DecisionBand::ConsiderarBajo,
            DecisionBand::Comprar => DecisionBand::ConsiderarAlto,
        }
    }

    pub fn downgrade_for_risk(&self, risk: f64) -> Self {
        if risk > RISK_REJECT {
            DecisionBand::NoComprar
        } else if risk > RISK_DOWNGRADE {
            self.lower()
        } else {
            *self
        }
    }
}

/// The aggregator's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    /// 1.0..=5.0, rounded to 2 decimals.
    pub total: f64,
    pub band: DecisionBand,
    pub label: &'static str,
    pub hint: &'static str,
    pub breed_adjustment: f64,
    pub weights_used: WeightMap,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    weights: WeightsByMode,
    cuts: DecisionCutPoints,
    caps: VisibilityCaps,
}

impl Aggregator {
    pub fn new(config: &EvaluatorConfig) -> Self {
        Self {
            weights: config.weights_by_mode.clone(),
            cuts: config.decision_sublevels.clone(),
            caps: config.visibility_caps.clone(),
        }
    }

    pub fn cut_points(&self) -> &DecisionCutPoints {
        &self.cuts
    }

    pub fn aggregate(
        &self,
        items: &[RubricItem],
        breed: &BreedSignal,
        visibility_ratio: f64,
        mode: Mode,
    ) -> Aggregate {
        let weights = self.weights.for_mode(mode);
        let weight_of = |item: &RubricItem| weights.get(item.key.as_str()).copied().unwrap_or(0.0);

        let mut weight_sum: f64 = items.iter().map(weight_of).sum();
        if weight_sum <= 0.0 {
            weight_sum = 1.0;
        }
        let weighted: f64 = items.iter().map(|item| item.score * weight_of(item)).sum::<f64>() / weight_sum;

        let breed_adjustment = breed_adjustment(breed);
        let mut total = (weighted + breed_adjustment).clamp(1.0, 5.0);
        if let Some(cap) = self.visibility_cap(visibility_ratio) {
            total = total.min(cap);
        }
        let total = round2(total);
        let band = DecisionBand::from_total(total, &self.cuts);

        Aggregate {
            total,
            band,
            label: band.label(),
            hint: band.hint(),
            breed_adjustment,
            weights_used: weights.clone(),
        }
    }

    fn visibility_cap(&self, visibility_ratio: f64) -> Option<f64> {
        if visibility_ratio < 0.35 {
            Some(self.caps.lt_0_35)
        } else if visibility_ratio < 0.55 {
            Some(self.caps.lt_0_55)
        } else {
            None
        }
    }
}

pub fn breed_adjustment(breed: &BreedSignal) -> f64 {
    match breed.class {
        BreedClass::Enrazado if breed.confidence >= ENRAZADO_MIN_CONFIDENCE => BREED_ADJUSTMENT,
        BreedClass::Criollo => -BREED_ADJUSTMENT,
        _ => 0.0,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
