//! Problem definition trait and the curve-matching residual evaluator.
//!
//! This module defines the `Problem` trait, which represents a nonlinear
//! least squares problem over named parameters, and [`CurveFitProblem`], the
//! problem of matching a forward model to an observed pressure/derivative
//! series in log space.

use crate::data::ObservedSeries;
use crate::error::Result;
use crate::model::ForwardModel;
use crate::parameters::ParameterSet;
use ndarray::Array1;

/// Values at or below this are excluded from the log-space residuals.
pub const DEFAULT_RESIDUAL_FLOOR: f64 = 1e-10;

/// A nonlinear least squares problem over named parameters.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of residuals, or an error if the evaluation fails
    fn eval(&self, params: &ParameterSet) -> Result<Array1<f64>>;

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &ParameterSet) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(sum_squared_error(&residuals))
    }
}

/// Sum of squared residuals.
pub fn sum_squared_error(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

/// Log-space misfit between a forward model and an observed series.
///
/// The residual vector holds the weighted pressure residuals followed by the
/// weighted derivative residuals:
///
/// ```text
/// r_p[i] = (ln obsP[i] - ln modP[i]) * w
/// r_d[i] = (ln obsD[i] - ln modD[i]) * (1 - w)
/// ```
///
/// A pair where either side is at or below the floor contributes 0 instead,
/// so a zero or negative value never turns into an infinite residual.
pub struct CurveFitProblem<'a, M: ForwardModel + ?Sized> {
    model: &'a M,
    observed: &'a ObservedSeries,
    weight: f64,
    floor: f64,
}

impl<'a, M: ForwardModel + ?Sized> CurveFitProblem<'a, M> {
    /// `weight` is the pressure share in `[0, 1]`; values outside are clamped.
    pub fn new(model: &'a M, observed: &'a ObservedSeries, weight: f64) -> Self {
        let weight = if weight.is_nan() { 0.5 } else { weight.clamp(0.0, 1.0) };
        Self {
            model,
            observed,
            weight,
            floor: DEFAULT_RESIDUAL_FLOOR,
        }
    }

    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn observed(&self) -> &ObservedSeries {
        self.observed
    }

    pub fn model(&self) -> &M {
        self.model
    }

    fn log_residual(&self, observed: f64, modeled: f64, weight: f64) -> f64 {
        if observed > self.floor && modeled > self.floor {
            (observed.ln() - modeled.ln()) * weight
        } else {
            0.0
        }
    }
}

impl<M: ForwardModel + ?Sized> Problem for CurveFitProblem<'_, M> {
    fn eval(&self, params: &ParameterSet) -> Result<Array1<f64>> {
        if self.observed.is_empty() {
            return Ok(Array1::zeros(0));
        }

        let curve = self.model.evaluate(params, Some(self.observed.time()))?;
        let obs_p = self.observed.pressure();
        let obs_d = self.observed.derivative();

        let n_p = obs_p.len().min(curve.pressure.len());
        let n_d = obs_d.len().min(curve.derivative.len()).min(n_p);

        let w_p = self.weight;
        let w_d = 1.0 - self.weight;

        let mut residuals = Vec::with_capacity(n_p + n_d);
        residuals.extend((0..n_p).map(|i| self.log_residual(obs_p[i], curve.pressure[i], w_p)));
        residuals.extend((0..n_d).map(|i| self.log_residual(obs_d[i], curve.derivative[i], w_d)));

        Ok(Array1::from(residuals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelCurve;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Returns `scale` times the observed curve, truncated to `keep` points.
    struct Scaled {
        observed: ObservedSeries,
        scale: f64,
        keep: usize,
        high: AtomicBool,
    }

    impl ForwardModel for Scaled {
        fn name(&self) -> &str {
            "scaled"
        }

        fn evaluate(&self, _params: &ParameterSet, _times: Option<&[f64]>) -> Result<ModelCurve> {
            let n = self.keep.min(self.observed.len());
            let time = self.observed.time()[..n].to_vec();
            let p = self.observed.pressure()[..n].iter().map(|v| v * self.scale).collect();
            let d = self.observed.derivative()[..n].iter().map(|v| v * self.scale).collect();
            ModelCurve::new(time, p, d)
        }

        fn set_high_precision(&self, enabled: bool) {
            self.high.store(enabled, Ordering::Relaxed);
        }

        fn is_high_precision(&self) -> bool {
            self.high.load(Ordering::Relaxed)
        }
    }

    fn series() -> ObservedSeries {
        ObservedSeries::new(
            vec![0.1, 1.0, 10.0, 100.0],
            vec![1.0, 2.0, 0.0, 4.0],
            vec![0.5, 0.5, 0.5, -1.0],
        )
        .unwrap()
    }

    fn model(scale: f64, keep: usize) -> Scaled {
        Scaled {
            observed: series(),
            scale,
            keep,
            high: AtomicBool::new(true),
        }
    }

    #[test]
    fn test_identical_curves_give_zero_residuals() {
        let obs = series();
        let m = model(1.0, usize::MAX);
        let problem = CurveFitProblem::new(&m, &obs, 0.5);
        let r = problem.eval(&ParameterSet::new()).unwrap();
        assert_eq!(r.len(), 8);
        assert!(r.iter().all(|&v| v == 0.0));
        assert_eq!(problem.eval_cost(&ParameterSet::new()).unwrap(), 0.0);
    }

    #[test]
    fn test_weighted_log_residuals() {
        let obs = series();
        let m = model(2.0, usize::MAX);
        let problem = CurveFitProblem::new(&m, &obs, 0.75);
        let r = problem.eval(&ParameterSet::new()).unwrap();

        let ln2 = 2f64.ln();
        assert_relative_eq!(r[0], -ln2 * 0.75, epsilon = 1e-14);
        assert_relative_eq!(r[1], -ln2 * 0.75, epsilon = 1e-14);
        // zero observed pressure is skipped
        assert_eq!(r[2], 0.0);
        assert_relative_eq!(r[4], -ln2 * 0.25, epsilon = 1e-14);
        // negative derivative is skipped
        assert_eq!(r[7], 0.0);
    }

    #[test]
    fn test_short_model_curve_limits_residual_count() {
        let obs = series();
        let m = model(1.0, 3);
        let problem = CurveFitProblem::new(&m, &obs, 0.5);
        assert_eq!(problem.eval(&ParameterSet::new()).unwrap().len(), 6);
    }

    #[test]
    fn test_empty_series_gives_empty_residuals() {
        let obs = ObservedSeries::default();
        let m = model(1.0, usize::MAX);
        let problem = CurveFitProblem::new(&m, &obs, 0.5);
        assert!(problem.eval(&ParameterSet::new()).unwrap().is_empty());
    }

    #[test]
    fn test_weight_is_clamped() {
        let obs = series();
        let m = model(1.0, usize::MAX);
        assert_eq!(CurveFitProblem::new(&m, &obs, 1.7).weight(), 1.0);
        assert_eq!(CurveFitProblem::new(&m, &obs, -0.2).weight(), 0.0);
    }
}
