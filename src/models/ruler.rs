//! Object of fixed length read off a ruler.

use serde::{Deserialize, Serialize};

use super::{require_positive, AnalyticModel, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 1] = [Variable::algebraic("length")];

/// Object under the ruler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruler {
    /// True length (cm)
    pub length: f64,
}

impl Ruler {
    pub fn validate(&self) -> ModelResult<()> {
        require_positive("length", self.length)
    }
}

impl Default for Ruler {
    fn default() -> Self {
        Ruler { length: 12.5 }
    }
}

impl StateSchema for Ruler {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        vec![self.length]
    }
}

impl AnalyticModel for Ruler {
    fn at(&self, _t: f64) -> Vec<f64> {
        vec![self.length]
    }
}
