//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! The step solves the damped Gauss-Newton system
//!
//! ```text
//! (JᵀJ + λ·diag(1 + |JᵀJ|ᵢᵢ)) δ = -Jᵀr
//! ```
//!
//! Scaling the damping by the diagonal keeps the step sensible when the
//! columns of J differ by orders of magnitude; the `1 +` keeps it alive for
//! columns that are (numerically) zero.

use crate::error::{FitError, Result};
use crate::parameters::{FreeParameter, ParameterSet, ScalePolicy};
use crate::utils::linear_solve::solve_symmetric;
use ndarray::{Array1, Array2};

/// Gauss-Newton normal equations `H = JᵀJ`, `g = Jᵀr`.
#[derive(Debug, Clone)]
pub struct NormalEquations {
    pub hessian: Array2<f64>,
    pub gradient: Array1<f64>,
}

impl NormalEquations {
    pub fn from_jacobian(jacobian: &Array2<f64>, residuals: &Array1<f64>) -> Result<Self> {
        let (m, n) = jacobian.dim();
        if residuals.len() != m {
            return Err(FitError::DimensionMismatch(format!(
                "jacobian has {} rows but there are {} residuals",
                m,
                residuals.len()
            )));
        }

        let mut hessian = Array2::zeros((n, n));
        for i in 0..n {
            let ci = jacobian.column(i);
            for j in 0..=i {
                hessian[[i, j]] = ci.dot(&jacobian.column(j));
            }
        }
        for i in 0..n {
            for j in i + 1..n {
                hessian[[i, j]] = hessian[[j, i]];
            }
        }

        let gradient = jacobian.t().dot(residuals);
        Ok(Self { hessian, gradient })
    }

    pub fn dim(&self) -> usize {
        self.gradient.len()
    }

    /// `H` with `λ(1 + |H_ii|)` added to the diagonal.
    pub fn damped(&self, lambda: f64) -> Array2<f64> {
        let mut damped = self.hessian.clone();
        for i in 0..self.dim() {
            damped[[i, i]] += lambda * (1.0 + self.hessian[[i, i]].abs());
        }
        damped
    }

    /// Solve the damped system for the step `δ`.
    pub fn solve(&self, lambda: f64) -> Result<Array1<f64>> {
        solve_symmetric(&self.damped(lambda), &-&self.gradient)
    }
}

/// Move each free parameter by its component of `delta`, in its own scale,
/// and clamp to its bounds.
///
/// Parameters missing from `params` are skipped.
pub fn apply_step(
    params: &ParameterSet,
    free: &[FreeParameter],
    delta: &Array1<f64>,
    scales: &ScalePolicy,
) -> ParameterSet {
    let mut trial = params.clone();
    for (param, &d) in free.iter().zip(delta.iter()) {
        if let Some(old) = params.get(&param.name) {
            let new = scales.scale_of(&param.name, old).apply(old, d);
            trial.set(&param.name, param.bounds.clamp(new));
        }
    }
    trial
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Bounds;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_normal_equations_symmetric() {
        let j = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let r = array![1.0, -1.0, 0.5];
        let ne = NormalEquations::from_jacobian(&j, &r).unwrap();
        assert_eq!(ne.hessian, j.t().dot(&j));
        assert_eq!(ne.gradient, array![1.0 - 3.0 + 2.5, 2.0 - 4.0 + 3.0]);

        assert!(NormalEquations::from_jacobian(&j, &array![1.0]).is_err());
    }

    #[test]
    fn test_damping_scales_with_diagonal() {
        let j = array![[2.0, 0.0], [0.0, 0.0]];
        let r = array![1.0, 1.0];
        let ne = NormalEquations::from_jacobian(&j, &r).unwrap();
        let damped = ne.damped(0.5);
        assert_relative_eq!(damped[[0, 0]], 4.0 + 0.5 * 5.0);
        assert_relative_eq!(damped[[1, 1]], 0.5);
        assert_relative_eq!(damped[[0, 1]], 0.0);
    }

    #[test]
    fn test_small_lambda_gives_gauss_newton_step() {
        // r = x - 3 at x = 1: J = [1], r = [-2] → δ ≈ 2
        let ne = NormalEquations::from_jacobian(&array![[1.0]], &array![-2.0]).unwrap();
        let delta = ne.solve(1e-12).unwrap();
        assert_relative_eq!(delta[0], 2.0, epsilon = 1e-9);
        // heavier damping shortens the step
        assert!(ne.solve(1.0).unwrap()[0] < 1.5);
    }

    #[test]
    fn test_apply_step_respects_scale_and_bounds() {
        let params: ParameterSet = [("k", 10.0), ("S", 1.0)].into_iter().collect();
        let free = vec![
            FreeParameter {
                name: "k".to_string(),
                bounds: Bounds::new(1.0, 50.0).unwrap(),
            },
            FreeParameter {
                name: "S".to_string(),
                bounds: Bounds::new(-5.0, 5.0).unwrap(),
            },
        ];
        let scales = ScalePolicy::default();

        let trial = apply_step(&params, &free, &array![1.0, -0.5], &scales);
        // 10^(1 + 1) = 100 clamped to 50
        assert_relative_eq!(trial.get("k").unwrap(), 50.0);
        assert_relative_eq!(trial.get("S").unwrap(), 0.5);

        let trial = apply_step(&params, &free, &array![-0.5, -10.0], &scales);
        assert_relative_eq!(trial.get("k").unwrap(), 10f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(trial.get("S").unwrap(), -5.0);
        // source set untouched
        assert_eq!(params.get("k"), Some(10.0));
    }
}
