// THEORY:
// The `RubricScorer` translates a `FeatureVector` into the fixed, ordered list of
// nine morphological sub-scores buyers read, plus a coarse breed signal.
//
// Key architectural principles:
// 1.  **Closed Key Set**: `RubricKey` is an enum. The nine keys and their order
//     never change at runtime; every consumer (weights, ensemble, output) keys
//     on `RubricKey`, never on the localized display name.
// 2.  **Table Lookups Only**: each item is a fixed lookup on a level, boolean or
//     bucket of the feature vector. No arithmetic beyond rounding the BCS.
// 3.  **Fixed Priors**: `aplomos` and `cola_grupa` have no image-derived score.
//     They carry a constant prior; the tail item's observation text still follows
//     the backline. This is a known limitation of the signal source.
// 4.  **Breed Signal From Whiteness**: light coats read as zebu-influenced. The
//     signal only adjusts the aggregate total; it is not the reported breed.

use crate::core_modules::feature_extractor::{Backline, FeatureVector, Level};
use serde::{Deserialize, Serialize};

/// Whiteness above this reads as a light (zebu-type) coat.
pub const LIGHT_COAT: f64 = 0.40;
/// Whiteness below this reads as a dark coat.
pub const DARK_COAT: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricKey {
    CabezaCuello,
    LineaDorsal,
    ProfToracica,
    Costillar,
    GrupoPosterior,
    Aplomos,
    ColaGrupa,
    PielPelo,
    Bcs,
}

impl RubricKey {
    /// Rubric order as presented to buyers.
    pub const ALL: [RubricKey; 9] = [
        RubricKey::CabezaCuello,
        RubricKey::LineaDorsal,
        RubricKey::ProfToracica,
        RubricKey::Costillar,
        RubricKey::GrupoPosterior,
        RubricKey::Aplomos,
        RubricKey::ColaGrupa,
        RubricKey::PielPelo,
        RubricKey::Bcs,
    ];

    /// Items whose stability drives the global stability index.
    pub const VERY_IMPORTANT: [RubricKey; 4] = [
        RubricKey::GrupoPosterior,
        RubricKey::LineaDorsal,
        RubricKey::ProfToracica,
        RubricKey::Bcs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RubricKey::CabezaCuello => "cabeza_cuello",
            RubricKey::LineaDorsal => "linea_dorsal",
            RubricKey::ProfToracica => "prof_toracica",
            RubricKey::Costillar => "costillar",
            RubricKey::GrupoPosterior => "grupo_posterior",
            RubricKey::Aplomos => "aplomos",
            RubricKey::ColaGrupa => "cola_grupa",
            RubricKey::PielPelo => "piel_pelo",
            RubricKey::Bcs => "bcs",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RubricKey::CabezaCuello => "Cabeza y cuello",
            RubricKey::LineaDorsal => "Línea dorsal (lomo)",
            RubricKey::ProfToracica => "Profundidad torácica",
            RubricKey::Costillar => "Costillar",
            RubricKey::GrupoPosterior => "Grupo posterior (anca, muslos, nalgas)",
            RubricKey::Aplomos => "Aplomos (miembros)",
            RubricKey::ColaGrupa => "Inserción de cola y grupa",
            RubricKey::PielPelo => "Piel y pelo",
            RubricKey::Bcs => "Condición corporal (BCS)",
        }
    }

    pub fn is_very_important(&self) -> bool {
        Self::VERY_IMPORTANT.contains(self)
    }
}

/// One scored line of the rubric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RubricItem {
    pub key: RubricKey,
    pub name: &'static str,
    /// 1.0..=5.0
    pub score: f64,
    pub observation: &'static str,
}

impl RubricItem {
    fn new(key: RubricKey, score: f64, observation: &'static str) -> Self {
        Self {
            key,
            name: key.display_name(),
            score,
            observation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreedClass {
    Enrazado,
    Criollo,
    Mixto,
}

impl BreedClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreedClass::Enrazado => "ENRAZADO",
            BreedClass::Criollo => "CRIOLLO",
            BreedClass::Mixto => "MIXTO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreedSignal {
    pub class: BreedClass,
    pub label: &'static str,
    pub confidence: f64,
}

impl BreedSignal {
    pub fn from_whiteness(whiteness: f64) -> Self {
        if whiteness > LIGHT_COAT {
            Self {
                class: BreedClass::Enrazado,
                label: "Brahman/Mix",
                confidence: 0.80,
            }
        } else if whiteness < DARK_COAT {
            Self {
                class: BreedClass::Criollo,
                label: "Criollo/Mix",
                confidence: 0.60,
            }
        } else {
            Self {
                class: BreedClass::Mixto,
                label: "Mixto",
                confidence: 0.65,
            }
        }
    }
}

/// The scorer's output for one image: nine items in `RubricKey::ALL` order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub items: Vec<RubricItem>,
    pub breed: BreedSignal,
}

impl ScoreCard {
    pub fn score_of(&self, key: RubricKey) -> Option<f64> {
        self.items.iter().find(|item| item.key == key).map(|item| item.score)
    }

    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.items.iter().map(|item| item.score)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RubricScorer;

impl RubricScorer {
    pub fn score(&self, features: &FeatureVector) -> ScoreCard {
        let breed = BreedSignal::from_whiteness(features.whiteness);
        let bcs = round1(features.body_condition);

        let items = RubricKey::ALL
            .iter()
            .map(|key| match key {
                RubricKey::CabezaCuello => {
                    RubricItem::new(*key, 3.2, head_observation(breed.class, bcs))
                }
                RubricKey::LineaDorsal => {
                    let (score, obs) = match features.backline {
                        Backline::Poor => (2.8, "Línea dorsal algo caída"),
                        Backline::Ok => (3.5, "Línea dorsal aceptable"),
                        Backline::Good => (4.2, "Línea dorsal recta/buena"),
                    };
                    RubricItem::new(*key, score, obs)
                }
                RubricKey::ProfToracica => {
                    let (score, obs) = match features.thorax {
                        Level::Low => (2.5, "Pecho escaso"),
                        Level::Med => (3.4, "Pecho aceptable"),
                        Level::High => (4.2, "Pecho profundo"),
                    };
                    RubricItem::new(*key, score, obs)
                }
                RubricKey::Costillar => {
                    if features.ribs_visible {
                        RubricItem::new(*key, 3.0, "Costillas marcadas")
                    } else {
                        RubricItem::new(*key, 3.6, "Costillas poco visibles")
                    }
                }
                RubricKey::GrupoPosterior => {
                    let (score, obs) = match features.posterior {
                        Level::Low => (2.8, "Muslo escaso"),
                        Level::Med => (3.3, "Muslo medio"),
                        Level::High => (4.2, "Muslo lleno"),
                    };
                    RubricItem::new(*key, score, obs)
                }
                RubricKey::Aplomos => {
                    RubricItem::new(*key, 3.6, "Aplomos rectos (sin evidencia de cojera)")
                }
                RubricKey::ColaGrupa => {
                    let obs = match features.backline {
                        Backline::Good => "Grupa correcta",
                        Backline::Ok | Backline::Poor => "Grupa algo caída",
                    };
                    RubricItem::new(*key, 3.1, obs)
                }
                RubricKey::PielPelo => {
                    let obs = if features.whiteness > LIGHT_COAT {
                        "Pelo claro/liso"
                    } else if features.whiteness < DARK_COAT {
                        "Pelo oscuro o mixto"
                    } else {
                        "Pelo mixto; limpio"
                    };
                    RubricItem::new(*key, 3.8, obs)
                }
                RubricKey::Bcs => RubricItem::new(*key, bcs.clamp(1.0, 5.0), "Escala 1–5 (estimado)"),
            })
            .collect();

        ScoreCard { items, breed }
    }
}

fn head_observation(class: BreedClass, bcs: f64) -> &'static str {
    match class {
        BreedClass::Enrazado if bcs <= 3.0 => "Cabeza cebuina; cuello fino",
        BreedClass::Enrazado => "Cabeza cebuina; cuello proporcionado",
        BreedClass::Criollo => "Cabeza criolla; proporciones moderadas",
        BreedClass::Mixto => "Cabeza proporcionada; cuello medio",
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
