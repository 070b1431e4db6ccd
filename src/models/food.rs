//! Qualitative tests for nutrients in a food extract.
//!
//! # State Variables
//! - Preparation: Algebraic, 0 to 1 while the sample is crushed and filtered
//! - Reaction: Algebraic, 0 to 1 color development after the reagent is added
//!
//! Iodine turns blue-black with starch, biuret turns violet with protein and
//! fat leaves a translucent spot on paper. A reagent that finds nothing
//! leaves the pale extract as it was.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{require_positive, AnalyticModel, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 2] =
    [Variable::algebraic("preparation"), Variable::algebraic("reaction")];

const PREPARATION: usize = 0;
const REACTION: usize = 1;

/// Organic substance a reagent looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    Starch,
    Protein,
    Fat,
    Glucose,
}

impl Nutrient {
    pub fn id(&self) -> &'static str {
        match self {
            Nutrient::Starch => "starch",
            Nutrient::Protein => "protein",
            Nutrient::Fat => "fat",
            Nutrient::Glucose => "glucose",
        }
    }
}

/// Sample under study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Food {
    #[default]
    Chips,
    EggWhite,
    Apple,
}

impl Food {
    pub fn contains(&self) -> &'static [Nutrient] {
        match self {
            Food::Chips => &[Nutrient::Starch, Nutrient::Fat],
            Food::EggWhite => &[Nutrient::Protein],
            Food::Apple => &[Nutrient::Glucose],
        }
    }
}

/// Test reagent dropped into the extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reagent {
    #[default]
    Iodine,
    Biuret,
    /// Paper blot
    Paper,
}

impl Reagent {
    pub fn detects(&self) -> Nutrient {
        match self {
            Reagent::Iodine => Nutrient::Starch,
            Reagent::Biuret => Nutrient::Protein,
            Reagent::Paper => Nutrient::Fat,
        }
    }
}

/// Sample, reagent and bench timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodAnalysis {
    pub food: Food,
    pub reagent: Reagent,
    /// Crushing and filtering (s)
    pub preparation_time: f64,
    /// Color development once the reagent is in (s)
    pub reaction_time: f64,
}

impl FoodAnalysis {
    pub fn new(food: Food, reagent: Reagent) -> Self {
        FoodAnalysis { food, reagent, ..FoodAnalysis::default() }
    }

    pub fn validate(&self) -> ModelResult<()> {
        require_positive("preparation_time", self.preparation_time)?;
        require_positive("reaction_time", self.reaction_time)
    }

    /// Whether the reagent finds its nutrient in the food.
    pub fn is_positive(&self) -> bool {
        self.food.contains().contains(&self.reagent.detects())
    }

    /// Nutrient shown by the test, if any.
    pub fn finding(&self) -> Option<Nutrient> {
        self.is_positive().then(|| self.reagent.detects())
    }
}

impl Default for FoodAnalysis {
    fn default() -> Self {
        FoodAnalysis {
            food: Food::Chips,
            reagent: Reagent::Iodine,
            preparation_time: 4.0,
            reaction_time: 2.0,
        }
    }
}

impl StateSchema for FoodAnalysis {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }

    fn is_finished(&self, values: &DVector<f64>) -> bool {
        values[PREPARATION] >= 1.0 && (values[REACTION] >= 1.0 || !self.is_positive())
    }
}

impl AnalyticModel for FoodAnalysis {
    fn at(&self, t: f64) -> Vec<f64> {
        let preparation = (t / self.preparation_time).clamp(0.0, 1.0);
        let reaction = if self.is_positive() {
            ((t - self.preparation_time) / self.reaction_time).clamp(0.0, 1.0)
        } else {
            0.0
        };
        vec![preparation, reaction]
    }
}
