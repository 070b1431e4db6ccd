//! Testing everyday objects for hardness, solubility and elasticity.
//!
//! # State Variables
//! - Test progress: Algebraic, 0 to 1 over the test duration
//! - Deformation: Algebraic, permanent change of shape left by the test
//! - Dissolved share: Algebraic, how much of the object went into solution
//!
//! Each object answers each tool in exactly one way, see [`Response`].

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{require_positive, AnalyticModel, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 3] = [
    Variable::algebraic("progress"),
    Variable::algebraic("deformation"),
    Variable::algebraic("dissolved"),
];

const PROGRESS: usize = 0;

/// Object on the bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    #[default]
    IronNail,
    RubberBall,
    SugarCube,
    WoodBlock,
}

/// What the object is tested with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Hardness
    #[default]
    Hammer,
    /// Solubility
    Water,
    /// Elasticity
    Stretch,
}

/// Observed outcome of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Very hard, keeps its shape
    Unchanged,
    /// Brittle, breaks into pieces
    Shattered,
    /// Hard but marked by the blow
    Dented,
    /// Deforms and springs back
    Rebounded,
    Dissolved,
    Insoluble,
    /// Stretches and contracts again
    Elastic,
    Inelastic,
}

impl Response {
    pub fn id(&self) -> &'static str {
        match self {
            Response::Unchanged => "unchanged",
            Response::Shattered => "shattered",
            Response::Dented => "dented",
            Response::Rebounded => "rebounded",
            Response::Dissolved => "dissolved",
            Response::Insoluble => "insoluble",
            Response::Elastic => "elastic",
            Response::Inelastic => "inelastic",
        }
    }

    /// Permanent change of shape, 0 to 1.
    fn deformation(&self) -> f64 {
        match self {
            Response::Shattered => 1.0,
            Response::Dented => 0.2,
            _ => 0.0,
        }
    }
}

/// One object under one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstanceTest {
    pub item: Item,
    pub tool: Tool,
    /// Time the test takes (s)
    pub duration: f64,
}

impl SubstanceTest {
    pub fn new(item: Item, tool: Tool) -> Self {
        SubstanceTest { item, tool, ..SubstanceTest::default() }
    }

    pub fn validate(&self) -> ModelResult<()> {
        require_positive("duration", self.duration)
    }

    pub fn response(&self) -> Response {
        match (self.tool, self.item) {
            (Tool::Hammer, Item::IronNail) => Response::Unchanged,
            (Tool::Hammer, Item::SugarCube) => Response::Shattered,
            (Tool::Hammer, Item::WoodBlock) => Response::Dented,
            (Tool::Hammer, Item::RubberBall) => Response::Rebounded,
            (Tool::Water, Item::SugarCube) => Response::Dissolved,
            (Tool::Water, _) => Response::Insoluble,
            (Tool::Stretch, Item::RubberBall) => Response::Elastic,
            (Tool::Stretch, _) => Response::Inelastic,
        }
    }
}

impl Default for SubstanceTest {
    fn default() -> Self {
        SubstanceTest { item: Item::IronNail, tool: Tool::Hammer, duration: 1.0 }
    }
}

impl StateSchema for SubstanceTest {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }

    fn is_finished(&self, values: &DVector<f64>) -> bool {
        values[PROGRESS] >= 1.0
    }
}

impl AnalyticModel for SubstanceTest {
    fn at(&self, t: f64) -> Vec<f64> {
        let progress = (t / self.duration).clamp(0.0, 1.0);
        let response = self.response();
        let dissolved = if response == Response::Dissolved { progress } else { 0.0 };
        vec![progress, progress * response.deformation(), dissolved]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(item: Item, tool: Tool) -> Response {
        SubstanceTest::new(item, tool).response()
    }

    #[test]
    fn test_hammer_responses() {
        assert_eq!(response(Item::IronNail, Tool::Hammer), Response::Unchanged);
        assert_eq!(response(Item::SugarCube, Tool::Hammer), Response::Shattered);
        assert_eq!(response(Item::WoodBlock, Tool::Hammer), Response::Dented);
        assert_eq!(response(Item::RubberBall, Tool::Hammer), Response::Rebounded);
    }

    #[test]
    fn test_only_sugar_dissolves() {
        for item in [Item::IronNail, Item::RubberBall, Item::WoodBlock] {
            assert_eq!(response(item, Tool::Water), Response::Insoluble);
        }
        let sugar = SubstanceTest::new(Item::SugarCube, Tool::Water);
        assert_eq!(sugar.response(), Response::Dissolved);
        assert_eq!(sugar.at(0.5)[2], 0.5);
        assert!(sugar.is_finished(&DVector::from_vec(sugar.at(1.0))));
    }

    #[test]
    fn test_only_rubber_is_elastic() {
        assert_eq!(response(Item::RubberBall, Tool::Stretch), Response::Elastic);
        assert_eq!(response(Item::WoodBlock, Tool::Stretch), Response::Inelastic);
    }

    #[test]
    fn test_shattered_sugar_is_deformed() {
        let sugar = SubstanceTest::new(Item::SugarCube, Tool::Hammer);
        assert_eq!(sugar.at(2.0), vec![1.0, 1.0, 0.0]);
        let rubber = SubstanceTest::new(Item::RubberBall, Tool::Hammer);
        assert_eq!(rubber.at(2.0)[1], 0.0);
    }
}
