//! Sphere falling through a viscous fluid (Stokes' law).
//!
//! # State Variables
//! - Velocity (m/s): Differential
//! - Depth below the surface (m): Differential
//!
//! # Balance Equation
//! - m*dv/dt = (rho_ball - rho_fluid)*V*g - 6*pi*eta*r*v
//!
//! The drag depends on the velocity itself, so there is no closed form for the
//! transient the learner watches; it is integrated. The asymptote is known:
//! v_t = 2*r^2*(rho_ball - rho_fluid)*g / (9*eta).
//!
//! # Example
//!
//! ```
//! use labsim::models::ViscousFall;
//!
//! // Steel ball, radius 2 mm, in glycerin
//! let fall = ViscousFall::new(0.002, 7800.0, 1260.0, 1.41, 0.5)?;
//! assert!((fall.terminal_velocity() - 0.0404).abs() < 1e-3);
//! # Ok::<(), labsim::ModelError>(())
//! ```

use std::f64::consts::PI;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{
    require_positive, DerivativeModel, ModelError, ModelResult, StateSchema, STANDARD_GRAVITY,
};
use crate::Variable;

static VARIABLES: [Variable; 2] =
    [Variable::differential("velocity"), Variable::differential("depth")];

const VELOCITY: usize = 0;
const DEPTH: usize = 1;

fn standard_gravity() -> f64 {
    STANDARD_GRAVITY
}

/// Constants of the falling-ball viscometer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViscousFall {
    /// Ball radius (m)
    pub ball_radius: f64,
    /// Ball density (kg/m^3)
    pub ball_density: f64,
    /// Fluid density (kg/m^3)
    pub fluid_density: f64,
    /// Dynamic viscosity (Pa*s)
    pub fluid_viscosity: f64,
    /// Height of the fluid column (m)
    pub cylinder_height: f64,
    /// Gravitational acceleration (m/s^2)
    #[serde(default = "standard_gravity")]
    pub gravity: f64,
}

impl ViscousFall {
    /// Creates a validated model under standard gravity.
    pub fn new(
        ball_radius: f64,
        ball_density: f64,
        fluid_density: f64,
        fluid_viscosity: f64,
        cylinder_height: f64,
    ) -> ModelResult<Self> {
        let model = ViscousFall {
            ball_radius,
            ball_density,
            fluid_density,
            fluid_viscosity,
            cylinder_height,
            gravity: STANDARD_GRAVITY,
        };
        model.validate()?;
        Ok(model)
    }

    /// Checks constants. A ball no denser than the fluid would never sink.
    pub fn validate(&self) -> ModelResult<()> {
        require_positive("ball_radius", self.ball_radius)?;
        require_positive("ball_density", self.ball_density)?;
        require_positive("fluid_density", self.fluid_density)?;
        require_positive("fluid_viscosity", self.fluid_viscosity)?;
        require_positive("cylinder_height", self.cylinder_height)?;
        require_positive("gravity", self.gravity)?;
        if self.ball_density <= self.fluid_density {
            return Err(ModelError::InvalidModelParameter {
                name: "ball_density",
                value: self.ball_density,
                reason: "ball must be denser than the fluid",
            });
        }
        Ok(())
    }

    /// Ball volume (m^3).
    pub fn volume(&self) -> f64 {
        4.0 / 3.0 * PI * self.ball_radius.powi(3)
    }

    /// Ball mass (kg).
    pub fn mass(&self) -> f64 {
        self.ball_density * self.volume()
    }

    /// Linear drag coefficient 6*pi*eta*r (kg/s).
    pub fn drag_coefficient(&self) -> f64 {
        6.0 * PI * self.fluid_viscosity * self.ball_radius
    }

    /// Time constant of the velocity approach, m / (6*pi*eta*r).
    pub fn relaxation_time(&self) -> f64 {
        self.mass() / self.drag_coefficient()
    }

    /// Closed-form terminal velocity (m/s).
    pub fn terminal_velocity(&self) -> f64 {
        2.0 * self.ball_radius.powi(2) * (self.ball_density - self.fluid_density) * self.gravity
            / (9.0 * self.fluid_viscosity)
    }

    /// Acceleration at a given velocity (m/s^2).
    pub fn acceleration(&self, velocity: f64) -> f64 {
        let driving = (self.ball_density - self.fluid_density) * self.volume() * self.gravity;
        (driving - self.drag_coefficient() * velocity) / self.mass()
    }
}

impl Default for ViscousFall {
    /// Steel ball in water.
    fn default() -> Self {
        ViscousFall {
            ball_radius: 0.002,
            ball_density: 7800.0,
            fluid_density: 1000.0,
            fluid_viscosity: 0.001,
            cylinder_height: 0.5,
            gravity: STANDARD_GRAVITY,
        }
    }
}

impl StateSchema for ViscousFall {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        vec![0.0, 0.0]
    }

    fn is_finished(&self, values: &DVector<f64>) -> bool {
        values[DEPTH] >= self.cylinder_height
    }
}

impl DerivativeModel for ViscousFall {
    fn derivative(&self, values: &DVector<f64>) -> DVector<f64> {
        let velocity = values[VELOCITY];
        DVector::from_vec(vec![self.acceleration(velocity), velocity])
    }

    /// The ball comes to rest on the bottom of the cylinder.
    fn post_step(&self, values: &mut DVector<f64>) {
        if values[DEPTH] >= self.cylinder_height {
            values[DEPTH] = self.cylinder_height;
            values[VELOCITY] = 0.0;
        }
    }

    fn tracked(&self) -> usize {
        VELOCITY
    }

    fn max_stable_step(&self) -> Option<f64> {
        Some(self.relaxation_time() / 4.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glycerin() -> ViscousFall {
        ViscousFall::new(0.002, 7800.0, 1260.0, 1.41, 0.5).unwrap()
    }

    #[test]
    fn test_terminal_velocity_formula() {
        let fall = glycerin();
        // 2 * 4e-6 * 6540 * 9.81 / (9 * 1.41)
        let expected = 2.0 * 4e-6 * 6540.0 * 9.81 / 12.69;
        assert!((fall.terminal_velocity() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_acceleration_vanishes_at_terminal_velocity() {
        let fall = glycerin();
        assert!(fall.acceleration(fall.terminal_velocity()).abs() < 1e-9);
        assert!(fall.acceleration(0.0) > 0.0);
    }

    #[test]
    fn test_derivative_is_pure() {
        let fall = glycerin();
        let y = DVector::from_vec(vec![0.01, 0.1]);
        assert_eq!(fall.derivative(&y), fall.derivative(&y));
        assert_eq!(fall.derivative(&y)[1], 0.01);
    }

    #[test]
    fn test_rests_on_bottom() {
        let fall = glycerin();
        let mut y = DVector::from_vec(vec![0.04, 0.6]);
        fall.post_step(&mut y);
        assert_eq!(y[DEPTH], 0.5);
        assert_eq!(y[VELOCITY], 0.0);
        assert!(fall.is_finished(&y));
    }

    #[test]
    fn test_rejects_non_physical_constants() {
        assert!(ViscousFall::new(0.0, 7800.0, 1260.0, 1.41, 0.5).is_err());
        assert!(ViscousFall::new(0.002, 7800.0, 1260.0, 0.0, 0.5).is_err());
        assert!(ViscousFall::new(0.002, 7800.0, 1260.0, -1.0, 0.5).is_err());
        assert!(ViscousFall::new(0.002, 1000.0, 1260.0, 1.41, 0.5).is_err());
    }

    #[test]
    fn test_stable_step_shrinks_with_viscosity() {
        let water = ViscousFall::default();
        let glycerin = glycerin();
        assert!(glycerin.max_stable_step().unwrap() < water.max_stable_step().unwrap());
    }
}
