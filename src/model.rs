//! Forward model contract.
//!
//! The reservoir response itself (analytic or semi-analytic solutions,
//! Laplace inversion and so on) lives outside this crate. The optimizer only
//! needs something that maps a [`ParameterSet`] and a set of times to a
//! pressure curve and its derivative, plus a switch between a fast and an
//! accurate evaluation mode.

use crate::error::{FitError, Result};
use crate::parameters::{FitParameters, ParameterSet};
use serde::{Deserialize, Serialize};

/// Computed pressure response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCurve {
    pub time: Vec<f64>,
    pub pressure: Vec<f64>,
    pub derivative: Vec<f64>,
}

impl ModelCurve {
    pub fn new(time: Vec<f64>, pressure: Vec<f64>, derivative: Vec<f64>) -> Result<Self> {
        if time.len() != pressure.len() || time.len() != derivative.len() {
            return Err(FitError::DimensionMismatch(format!(
                "curve lengths differ: time {}, pressure {}, derivative {}",
                time.len(),
                pressure.len(),
                derivative.len()
            )));
        }
        Ok(Self {
            time,
            pressure,
            derivative,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// A reservoir response model.
///
/// Implementations are shared between the consumer and the fit worker, so
/// the precision switch takes `&self`; an atomic flag is the usual backing.
pub trait ForwardModel: Send + Sync {
    /// Short identifier persisted with sessions.
    fn name(&self) -> &str;

    /// Evaluate the model.
    ///
    /// With `times == None` the model picks its own display grid. Optional
    /// derived keys may be missing from `params`.
    fn evaluate(&self, params: &ParameterSet, times: Option<&[f64]>) -> Result<ModelCurve>;

    /// Switch between the accurate (`true`) and the fast evaluation mode.
    fn set_high_precision(&self, enabled: bool);

    fn is_high_precision(&self) -> bool;

    /// Parameters that must be present for [`evaluate`](Self::evaluate).
    fn required_parameters(&self) -> Vec<String> {
        Vec::new()
    }

    /// The model's parameter table with default values and bounds.
    fn default_parameters(&self) -> FitParameters {
        FitParameters::new()
    }
}

impl<M: ForwardModel + ?Sized> ForwardModel for std::sync::Arc<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(&self, params: &ParameterSet, times: Option<&[f64]>) -> Result<ModelCurve> {
        (**self).evaluate(params, times)
    }

    fn set_high_precision(&self, enabled: bool) {
        (**self).set_high_precision(enabled)
    }

    fn is_high_precision(&self) -> bool {
        (**self).is_high_precision()
    }

    fn required_parameters(&self) -> Vec<String> {
        (**self).required_parameters()
    }

    fn default_parameters(&self) -> FitParameters {
        (**self).default_parameters()
    }
}

/// Holds a model in fast mode and restores its previous mode when released
/// or dropped.
pub struct PrecisionGuard<'a, M: ForwardModel + ?Sized> {
    model: &'a M,
    previous: bool,
    released: bool,
}

impl<'a, M: ForwardModel + ?Sized> PrecisionGuard<'a, M> {
    /// Put `model` into fast mode.
    pub fn fast(model: &'a M) -> Self {
        let previous = model.is_high_precision();
        model.set_high_precision(false);
        Self {
            model,
            previous,
            released: false,
        }
    }

    /// Restore the previous mode now.
    pub fn release(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if !self.released {
            self.model.set_high_precision(self.previous);
            self.released = true;
        }
    }
}

impl<M: ForwardModel + ?Sized> Drop for PrecisionGuard<'_, M> {
    fn drop(&mut self) {
        self.restore();
    }
}

/// `count` times spaced uniformly in log10 between `10^log_min` and `10^log_max`.
pub fn log_time_steps(count: usize, log_min: f64, log_max: f64) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![10f64.powf(log_min)],
        _ => {
            let step = (log_max - log_min) / (count - 1) as f64;
            (0..count)
                .map(|i| 10f64.powf(log_min + i as f64 * step))
                .collect()
        }
    }
}

/// Points in a display curve when the observed series is dense.
const DISPLAY_POINTS: usize = 300;

/// Tenth-decade points from 1e-4 up to, not including, 1e4.
const EMPTY_GRID_POINTS: usize = 80;

/// Time grid for plotting a model curve against `observed_time`.
///
/// Dense observations get a 300-point log grid over their range, sparse ones
/// are used directly, and with no observations the grid runs from 1e-4 to
/// 10^3.9 in tenth-decade steps.
pub fn display_times(observed_time: &[f64]) -> Vec<f64> {
    match (observed_time.first(), observed_time.last()) {
        (Some(&first), Some(&last)) if observed_time.len() > DISPLAY_POINTS => {
            let t_min = if first > 1e-5 { first } else { 1e-5 };
            log_time_steps(DISPLAY_POINTS, t_min.log10(), last.log10())
        }
        (Some(_), Some(_)) => observed_time.to_vec(),
        _ => (0..EMPTY_GRID_POINTS)
            .map(|i| 10f64.powf(-4.0 + i as f64 * 0.1))
            .collect(),
    }
}
