//! Infinite-acting line-source model with skin.
//!
//! The classic radial-flow solution for a well producing at constant rate
//! from an infinite homogeneous reservoir, in consistent units:
//!
//! Δp(t) = (½·E1(1 / 4ηt) + S) / k
//!
//! t·dΔp/dt = ½·exp(−1 / 4ηt) / k
//!
//! Where:
//! - k: mobility / permeability-thickness factor (log scale)
//! - S: skin factor (linear scale, may be negative)
//! - eta: hydraulic diffusivity

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{FitError, Result};
use crate::model::{log_time_steps, ForwardModel, ModelCurve};
use crate::parameters::{FitParameter, FitParameters, ParameterError, ParameterSet};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

const E1_MAX_TERMS: usize = 500;

/// Exponential integral E1(x) for x > 0.
///
/// Power series up to x = 1, continued fraction (modified Lentz) above.
/// `tol` is the relative tolerance at which either expansion stops. Returns
/// infinity at 0 and NaN for negative or NaN input.
pub fn exp_integral_e1(x: f64, tol: f64) -> f64 {
    if x.is_nan() || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::INFINITY;
    }

    if x <= 1.0 {
        let mut sum = 0.0;
        let mut term = 1.0;
        for n in 1..=E1_MAX_TERMS {
            let n = n as f64;
            term *= -x / n;
            let contribution = term / n;
            sum += contribution;
            if contribution.abs() < tol * sum.abs() {
                break;
            }
        }
        return -EULER_GAMMA - x.ln() - sum;
    }

    let tiny = f64::MIN_POSITIVE / f64::EPSILON;
    let mut b = x + 1.0;
    let mut c = 1.0 / tiny;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=E1_MAX_TERMS {
        let a = -((i * i) as f64);
        b += 2.0;
        d = 1.0 / (a * d + b);
        c = b + a / c;
        let delta = c * d;
        h *= delta;
        if (delta - 1.0).abs() < tol {
            break;
        }
    }
    h * (-x).exp()
}

/// Line-source reservoir response.
///
/// The precision switch controls the density of the display grid (300 vs 60
/// points over 1e-4..1e4) and the E1 tolerance.
#[derive(Debug)]
pub struct LineSourceModel {
    high_precision: AtomicBool,
}

impl Default for LineSourceModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSourceModel {
    pub const NAME: &'static str = "line-source";

    pub fn new() -> Self {
        Self {
            high_precision: AtomicBool::new(true),
        }
    }

    fn tolerance(&self) -> f64 {
        if self.is_high_precision() {
            1e-15
        } else {
            1e-8
        }
    }

    fn grid(&self) -> Vec<f64> {
        let count = if self.is_high_precision() { 300 } else { 60 };
        log_time_steps(count, -4.0, 4.0)
    }

    fn positive(params: &ParameterSet, name: &str) -> Result<f64> {
        let value = params.value(name)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(FitError::ModelEvaluation(format!(
                "{} must be positive, got {}",
                name, value
            )))
        }
    }
}

impl ForwardModel for LineSourceModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&self, params: &ParameterSet, times: Option<&[f64]>) -> Result<ModelCurve> {
        let k = Self::positive(params, "k")?;
        let eta = Self::positive(params, "eta")?;
        let skin = params.value("S")?;
        let tol = self.tolerance();

        let time = match times {
            Some(t) => t.to_vec(),
            None => self.grid(),
        };

        let mut pressure = Vec::with_capacity(time.len());
        let mut derivative = Vec::with_capacity(time.len());
        for &t in &time {
            if t > 0.0 {
                let u = 1.0 / (4.0 * eta * t);
                pressure.push((0.5 * exp_integral_e1(u, tol) + skin) / k);
                derivative.push(0.5 * (-u).exp() / k);
            } else {
                pressure.push(0.0);
                derivative.push(0.0);
            }
        }

        ModelCurve::new(time, pressure, derivative)
    }

    fn set_high_precision(&self, enabled: bool) {
        self.high_precision.store(enabled, Ordering::SeqCst);
    }

    fn is_high_precision(&self) -> bool {
        self.high_precision.load(Ordering::SeqCst)
    }

    fn required_parameters(&self) -> Vec<String> {
        vec!["k".to_string(), "S".to_string(), "eta".to_string()]
    }

    fn default_parameters(&self) -> FitParameters {
        default_rows().unwrap_or_default()
    }
}

fn default_rows() -> std::result::Result<FitParameters, ParameterError> {
    let mut params = FitParameters::new();
    params.add(
        FitParameter::with_bounds("k", 10.0, 1e-3, 1e4)?
            .fitted()?
            .with_step(1.0)
            .with_display_name("Permeability"),
    );
    params.add(
        FitParameter::with_bounds("S", 0.0, -5.0, 50.0)?
            .fitted()?
            .with_step(0.5)
            .with_display_name("Skin"),
    );
    params.add(
        FitParameter::with_bounds("eta", 1.0, 1e-4, 1e4)?
            .with_step(0.1)
            .with_display_name("Diffusivity"),
    );
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exp_integral_reference_values() {
        assert_relative_eq!(exp_integral_e1(0.1, 1e-15), 1.822_923_958_419_390_7, max_relative = 1e-13);
        assert_relative_eq!(exp_integral_e1(1.0, 1e-15), 0.219_383_934_395_520_3, max_relative = 1e-13);
        assert_relative_eq!(exp_integral_e1(2.0, 1e-15), 0.048_900_510_708_061_12, max_relative = 1e-12);
        assert_relative_eq!(exp_integral_e1(5.0, 1e-15), 0.001_148_295_591_275_326, max_relative = 1e-12);
        assert_eq!(exp_integral_e1(0.0, 1e-15), f64::INFINITY);
        assert!(exp_integral_e1(-1.0, 1e-15).is_nan());
    }

    #[test]
    fn test_fast_mode_is_close() {
        for x in [0.01, 0.5, 1.0, 1.5, 10.0] {
            assert_relative_eq!(
                exp_integral_e1(x, 1e-8),
                exp_integral_e1(x, 1e-15),
                max_relative = 1e-6
            );
        }
    }

    fn params(k: f64, s: f64, eta: f64) -> ParameterSet {
        [("k", k), ("S", s), ("eta", eta)].into_iter().collect()
    }

    #[test]
    fn test_derivative_matches_pressure_slope() {
        let model = LineSourceModel::new();
        let p = params(2.0, 1.5, 0.8);
        let t = 3.0;
        let eps = 1e-4;
        let curve = model
            .evaluate(&p, Some(&[t * (1.0 - eps), t, t * (1.0 + eps)]))
            .unwrap();
        // t dΔp/dt = dΔp/d ln t
        let slope = (curve.pressure[2] - curve.pressure[0]) / ((1.0 + eps) / (1.0 - eps)).ln();
        assert_relative_eq!(curve.derivative[1], slope, max_relative = 1e-6);
    }

    #[test]
    fn test_late_time_semilog_straight_line() {
        let model = LineSourceModel::new();
        let curve = model.evaluate(&params(4.0, 0.0, 1.0), Some(&[1e4])).unwrap();
        assert_relative_eq!(curve.derivative[0], 0.125, max_relative = 1e-4);
    }

    #[test]
    fn test_precision_controls_grid() {
        let model = LineSourceModel::new();
        let p = params(1.0, 0.0, 1.0);
        assert_eq!(model.evaluate(&p, None).unwrap().len(), 300);
        model.set_high_precision(false);
        assert_eq!(model.evaluate(&p, None).unwrap().len(), 60);
    }

    #[test]
    fn test_invalid_parameters() {
        let model = LineSourceModel::new();
        assert!(model.evaluate(&params(0.0, 0.0, 1.0), Some(&[1.0])).is_err());
        let mut p = params(1.0, 0.0, 1.0);
        p.remove("S");
        assert!(matches!(
            model.evaluate(&p, Some(&[1.0])),
            Err(FitError::ParameterNotFound(_))
        ));
    }

    #[test]
    fn test_default_parameters() {
        let rows = default_rows().unwrap();
        assert_eq!(rows.get("S").unwrap().min(), -5.0);
        assert_eq!(rows.get("eta").unwrap().display_name, "Diffusivity");

        let model = LineSourceModel::new();
        assert_eq!(model.default_parameters(), rows);
        let defaults = model.default_parameters();
        assert_eq!(defaults.len(), 3);
        assert!(defaults.get("k").unwrap().is_fit());
        assert!(!defaults.get("eta").unwrap().is_fit());
        assert!(defaults.to_set().require(model.required_parameters().as_slice()).is_ok());
    }
}
