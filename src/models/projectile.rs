//! Horizontal launch from a height.
//!
//! Closed form: x = v0*t, y = h - g*t^2/2, flight time sqrt(2h/g), so the
//! landing distance is v0*sqrt(2h/g) regardless of how the host slices time.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{require_non_negative, require_positive, AnalyticModel, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 4] = [
    Variable::algebraic("x"),
    Variable::algebraic("y"),
    Variable::algebraic("vx"),
    Variable::algebraic("vy"),
];

const Y: usize = 1;

/// Gravity used by the projectile screen (m/s^2).
pub const PROJECTILE_GRAVITY: f64 = 9.8;

fn projectile_gravity() -> f64 {
    PROJECTILE_GRAVITY
}

/// Launch configuration and target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Launch height (m)
    pub height: f64,
    /// Horizontal launch speed (m/s)
    pub launch_speed: f64,
    /// Distance of the target from the launch point (m)
    pub target_distance: f64,
    /// Landing within this distance of the target counts as a hit (m)
    pub hit_tolerance: f64,
    #[serde(default = "projectile_gravity")]
    pub gravity: f64,
}

impl Projectile {
    /// Creates a launch aimed at the default 40 m target.
    pub fn new(height: f64, launch_speed: f64) -> ModelResult<Self> {
        let model = Projectile { height, launch_speed, ..Projectile::default() };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> ModelResult<()> {
        require_positive("height", self.height)?;
        require_non_negative("launch_speed", self.launch_speed)?;
        require_non_negative("target_distance", self.target_distance)?;
        require_positive("hit_tolerance", self.hit_tolerance)?;
        require_positive("gravity", self.gravity)
    }

    /// Time until the projectile reaches the ground (s).
    pub fn flight_time(&self) -> f64 {
        (2.0 * self.height / self.gravity).sqrt()
    }

    /// Horizontal landing distance (m).
    pub fn range(&self) -> f64 {
        self.launch_speed * self.flight_time()
    }

    /// Whether the landing point is within tolerance of the target.
    pub fn is_hit(&self) -> bool {
        (self.range() - self.target_distance).abs() < self.hit_tolerance
    }
}

impl Default for Projectile {
    fn default() -> Self {
        Projectile {
            height: 20.0,
            launch_speed: 10.0,
            target_distance: 40.0,
            hit_tolerance: 3.0,
            gravity: PROJECTILE_GRAVITY,
        }
    }
}

impl StateSchema for Projectile {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }

    fn is_finished(&self, values: &DVector<f64>) -> bool {
        values[Y] <= 0.0
    }
}

impl AnalyticModel for Projectile {
    fn at(&self, t: f64) -> Vec<f64> {
        let flight_time = self.flight_time();
        if t >= flight_time {
            // At rest on the ground
            return vec![self.range(), 0.0, 0.0, 0.0];
        }
        let y = self.height - 0.5 * self.gravity * t * t;
        vec![self.launch_speed * t, y.max(0.0), self.launch_speed, -self.gravity * t]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_formula() {
        let p = Projectile::new(40.0, 15.0).unwrap();
        let expected = 15.0 * (2.0 * 40.0 / 9.8_f64).sqrt();
        assert!((p.range() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_default_launch_misses_target() {
        // 10 m/s from 20 m lands at ~20.2 m, far from the 40 m target
        let p = Projectile::default();
        assert!((p.range() - 20.203).abs() < 1e-3);
        assert!(!p.is_hit());
    }

    #[test]
    fn test_hit_inside_tolerance() {
        // From 40 m it takes ~2.857 s, so 14 m/s lands at ~40 m
        let p = Projectile::new(40.0, 14.0).unwrap();
        assert!(p.is_hit());
    }

    #[test]
    fn test_at_is_deterministic() {
        let p = Projectile::new(40.0, 15.0).unwrap();
        for t in [0.0, 0.3, 1.7, 2.5, 10.0] {
            assert_eq!(p.at(t), p.at(t));
        }
    }

    #[test]
    fn test_lands_and_stays() {
        let p = Projectile::new(40.0, 15.0).unwrap();
        let landed = p.at(p.flight_time() + 1.0);
        assert_eq!(landed, vec![p.range(), 0.0, 0.0, 0.0]);
        assert!(p.is_finished(&DVector::from_vec(landed)));
        assert!(!p.is_finished(&DVector::from_vec(p.at(1.0))));
    }

    #[test]
    fn test_rejects_zero_height() {
        assert!(Projectile::new(0.0, 10.0).is_err());
        assert!(Projectile::new(10.0, -1.0).is_err());
    }
}
