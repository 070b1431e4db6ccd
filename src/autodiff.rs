//! Measurement uncertainty propagation using `num-dual`.
//!
//! Quantities the learner derives from several readings (density from mass
//! and displaced volume) inherit the uncertainty of each reading. To first
//! order,
//!
//! ```text
//! df = sqrt( sum_i (df/dx_i * dx_i)^2 )
//! ```
//!
//! The partial derivatives are computed with forward-mode dual numbers, one
//! pass per reading.
//!
//! # Example
//!
//! ```
//! use labsim::autodiff::propagate_uncertainty;
//!
//! // Density of 89 g displacing 10 mL, balance +-0.1 g, cylinder +-0.5 mL
//! let (density, spread) =
//!     propagate_uncertainty(|x| x[0] / x[1], &[89.0, 10.0], &[0.1, 0.5]);
//! assert!((density - 8.9).abs() < 1e-12);
//! assert!(spread > 0.44 && spread < 0.45);
//! ```

use num_dual::*;

/// Value and gradient of a scalar function at `x`.
pub fn gradient<F>(f: F, x: &[f64]) -> (f64, Vec<f64>)
where
    F: Fn(&[Dual64]) -> Dual64,
{
    let mut value = f64::NAN;
    let mut partials = Vec::with_capacity(x.len());

    for j in 0..x.len() {
        let mut x_dual: Vec<Dual64> = x.iter().map(|&v| Dual64::from(v)).collect();
        x_dual[j] = Dual64::from(x[j]).derivative();

        let result = f(&x_dual);
        value = result.re;
        partials.push(result.eps);
    }

    if x.is_empty() {
        value = f(&[]).re;
    }
    (value, partials)
}

/// Value of `f` at `x` and its first-order uncertainty given the
/// uncertainty of each input.
///
/// `sigma` must have the same length as `x`.
pub fn propagate_uncertainty<F>(f: F, x: &[f64], sigma: &[f64]) -> (f64, f64)
where
    F: Fn(&[Dual64]) -> Dual64,
{
    debug_assert_eq!(x.len(), sigma.len());
    let (value, partials) = gradient(f, x);
    let variance: f64 = partials.iter().zip(sigma).map(|(d, s)| (d * s).powi(2)).sum();
    (value, variance.sqrt())
}

/// Uncertainty of a density computed as mass / volume.
pub fn density_uncertainty(mass: f64, volume: f64, mass_sigma: f64, volume_sigma: f64) -> f64 {
    propagate_uncertainty(|x| x[0] / x[1], &[mass, volume], &[mass_sigma, volume_sigma]).1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_of_product() {
        let (value, grad) = gradient(|x| x[0] * x[1], &[2.0, 3.0]);
        assert_eq!(value, 6.0);
        assert_eq!(grad, vec![3.0, 2.0]);
    }

    #[test]
    fn test_density_uncertainty_matches_formula() {
        // d(m/V) = sqrt((dm/V)^2 + (m*dV/V^2)^2)
        let expected = ((0.1_f64 / 10.0).powi(2) + (89.0 * 0.5 / 100.0_f64).powi(2)).sqrt();
        assert!((density_uncertainty(89.0, 10.0, 0.1, 0.5) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_exact_readings_have_no_spread() {
        let (_, spread) = propagate_uncertainty(|x| x[0] / x[1], &[193.0, 10.0], &[0.0, 0.0]);
        assert_eq!(spread, 0.0);
    }
}
