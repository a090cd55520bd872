// THEORY:
// The `ensemble` module turns several scorecards of the same animal (one per
// image variant) into one consensus scorecard and a measure of how much the
// variants agreed.
//
// Algorithm steps:
// 1.  **Collect**: scores are folded into one list per rubric key, in variant
//     order.
// 2.  **Consensus**: each key's consensus score is the median of its list (even
//     counts average the two middle values). Names and observations come from
//     the first variant, which is always the untouched original.
// 3.  **Dispersion**: MAD (median absolute deviation from the median) per key,
//     mapped to a stability index `1 − min(1, MAD/1.5)`.
// 4.  **Global Stability**: mean stability over the very important items, keyed
//     by `RubricKey`.
// 5.  **Breed Vote**: majority class across variants; ties go to the class
//     holding the single most confident variant. The winning class reports the
//     breed signal of its most confident variant.

use crate::core_modules::aggregator::round2;
use crate::core_modules::rubric_scorer::{BreedClass, BreedSignal, RubricItem, RubricKey, ScoreCard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// MAD at which an item's stability reaches 0.
pub const MAD_SCALE: f64 = 1.5;
/// Global stability reported when no very important item is present.
pub const DEFAULT_GLOBAL_STABILITY: f64 = 0.7;

/// Stability bucket shown to the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityTier {
    Estable,
    Moderado,
    Inestable,
}

impl StabilityTier {
    pub fn from_index(index: f64) -> Self {
        if index >= 0.75 {
            StabilityTier::Estable
        } else if index >= 0.55 {
            StabilityTier::Moderado
        } else {
            StabilityTier::Inestable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStability {
    pub key: RubricKey,
    pub median: f64,
    pub mad: f64,
    /// 0..1, rounded to 2 decimals.
    pub stability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityReport {
    pub items: Vec<ItemStability>,
    pub global: f64,
    pub tier: StabilityTier,
    pub ensemble_size: usize,
}

/// Consensus scorecard plus the agreement it was reached with.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOutcome {
    pub card: ScoreCard,
    pub report: StabilityReport,
}

/// Median of `values`; 0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation from the median.
pub fn mad(values: &[f64]) -> f64 {
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

pub fn stability_index(mad: f64) -> f64 {
    round2(1.0 - (mad / MAD_SCALE).min(1.0))
}

/// Folds the original's scorecard and its variants' into a consensus.
pub fn aggregate(original: &ScoreCard, variants: &[ScoreCard]) -> EnsembleOutcome {
    let cards: Vec<&ScoreCard> = std::iter::once(original).chain(variants).collect();

    let scores_by_key = cards.iter().flat_map(|card| &card.items).fold(
        BTreeMap::<RubricKey, Vec<f64>>::new(),
        |mut acc, item| {
            acc.entry(item.key).or_default().push(item.score);
            acc
        },
    );

    let (items, stability): (Vec<RubricItem>, Vec<ItemStability>) = original
        .items
        .iter()
        .map(|first| {
            let scores = scores_by_key.get(&first.key).map_or(&[][..], Vec::as_slice);
            let center = median(scores);
            let spread = mad(scores);
            (
                RubricItem {
                    score: round2(center),
                    ..first.clone()
                },
                ItemStability {
                    key: first.key,
                    median: center,
                    mad: spread,
                    stability: stability_index(spread),
                },
            )
        })
        .unzip();

    let important: Vec<f64> = stability
        .iter()
        .filter(|item| item.key.is_very_important())
        .map(|item| item.stability)
        .collect();
    let global = if important.is_empty() {
        DEFAULT_GLOBAL_STABILITY
    } else {
        round2(important.iter().sum::<f64>() / important.len() as f64)
    };

    EnsembleOutcome {
        card: ScoreCard {
            items,
            breed: vote_breed(&cards),
        },
        report: StabilityReport {
            items: stability,
            global,
            tier: StabilityTier::from_index(global),
            ensemble_size: cards.len(),
        },
    }
}

struct Tally<'a> {
    class: BreedClass,
    votes: usize,
    best: &'a BreedSignal,
}

fn vote_breed(cards: &[&ScoreCard]) -> BreedSignal {
    let mut tallies: Vec<Tally> = Vec::new();
    for card in cards {
        let signal = &card.breed;
        match tallies.iter_mut().find(|t| t.class == signal.class) {
            Some(tally) => {
                tally.votes += 1;
                if signal.confidence > tally.best.confidence {
                    tally.best = signal;
                }
            }
            None => tallies.push(Tally {
                class: signal.class,
                votes: 1,
                best: signal,
            }),
        }
    }

    let mut winner: Option<&Tally> = None;
    for tally in &tallies {
        let better = winner.is_none_or(|w| {
            tally.votes > w.votes || (tally.votes == w.votes && tally.best.confidence > w.best.confidence)
        });
        if better {
            winner = Some(tally);
        }
    }
    winner.map_or_else(|| BreedSignal::from_whiteness(0.3), |w| w.best.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(scores: [f64; 9], whiteness: f64) -> ScoreCard {
        ScoreCard {
            items: RubricKey::ALL
                .iter()
                .zip(scores)
                .map(|(key, score)| RubricItem {
                    key: *key,
                    name: key.display_name(),
                    score,
                    observation: "obs",
                })
                .collect(),
            breed: BreedSignal::from_whiteness(whiteness),
        }
    }

    #[test]
    fn median_handles_odd_and_even_counts() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn median_stays_within_range() {
        let sets: [&[f64]; 4] = [&[2.8, 4.2], &[3.0, 3.0, 3.6], &[1.0, 5.0, 4.9, 1.1], &[3.3, 2.8, 4.2, 3.3, 2.8]];
        for set in sets {
            let m = median(set);
            let lo = set.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = set.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(lo <= m && m <= hi);
            assert!(mad(set) >= 0.0);
        }
    }

    #[test]
    fn stability_falls_as_dispersion_grows() {
        let tight = mad(&[3.5, 3.5, 3.6, 3.5, 3.4]);
        let loose = mad(&[2.8, 3.5, 4.2, 2.5, 4.5]);
        assert!(tight < loose);
        assert!(stability_index(tight) > stability_index(loose));
        assert_eq!(stability_index(0.0), 1.0);
        assert_eq!(stability_index(3.0), 0.0);
        let mut previous = 1.0;
        for step in 0..=20 {
            let si = stability_index(step as f64 * 0.1);
            assert!(si <= previous);
            previous = si;
        }
    }

    #[test]
    fn identical_variants_are_fully_stable() {
        let original = card([3.2, 4.2, 4.2, 3.6, 4.2, 3.6, 3.1, 3.8, 3.2], 0.5);
        let outcome = aggregate(&original, &[original.clone(), original.clone()]);
        assert_eq!(outcome.card.items, original.items);
        assert_eq!(outcome.report.global, 1.0);
        assert_eq!(outcome.report.tier, StabilityTier::Estable);
        assert_eq!(outcome.report.ensemble_size, 3);
    }

    #[test]
    fn consensus_uses_median_per_key() {
        let original = card([3.2, 4.2, 4.2, 3.6, 4.2, 3.6, 3.1, 3.8, 3.2], 0.5);
        let a = card([3.2, 2.8, 4.2, 3.0, 2.8, 3.6, 3.1, 3.8, 2.5], 0.5);
        let b = card([3.2, 3.5, 3.4, 3.0, 3.3, 3.6, 3.1, 3.8, 2.8], 0.5);
        let outcome = aggregate(&original, &[a, b]);
        let scores: Vec<f64> = outcome.card.scores().collect();
        assert_eq!(scores, vec![3.2, 3.5, 4.2, 3.0, 3.3, 3.6, 3.1, 3.8, 2.8]);
        assert!(outcome.report.global < 1.0);
        assert_eq!(outcome.card.items[1].observation, "obs");
    }

    #[test]
    fn breed_vote_takes_majority() {
        let scores = [3.0; 9];
        let original = card(scores, 0.5); // ENRAZADO 0.80
        let outcome = aggregate(&original, &[card(scores, 0.1), card(scores, 0.1)]);
        assert_eq!(outcome.card.breed.class, BreedClass::Criollo);
    }

    #[test]
    fn breed_tie_goes_to_most_confident_variant() {
        let scores = [3.0; 9];
        let original = card(scores, 0.3); // MIXTO 0.65
        let outcome = aggregate(&original, &[card(scores, 0.9)]); // ENRAZADO 0.80
        assert_eq!(outcome.card.breed.class, BreedClass::Enrazado);
        assert_eq!(outcome.card.breed.confidence, 0.80);
    }

    #[test]
    fn tiers_follow_thresholds() {
        assert_eq!(StabilityTier::from_index(0.75), StabilityTier::Estable);
        assert_eq!(StabilityTier::from_index(0.74), StabilityTier::Moderado);
        assert_eq!(StabilityTier::from_index(0.55), StabilityTier::Moderado);
        assert_eq!(StabilityTier::from_index(0.2), StabilityTier::Inestable);
    }
}
