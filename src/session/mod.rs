//! # Fitting session
//!
//! A [`FittingSession`] is what an interactive front end holds on to: the
//! forward model, the editable parameter table, the observed series, the
//! sampling choice and the pressure/derivative weight. It starts background
//! fits, refreshes the model curve after manual edits, runs sensitivity
//! sweeps and saves/restores everything as JSON.
//!
//! The running fit never touches the session. It reports through a
//! [`FitHandle`]; accepted states are folded back in with
//! [`FittingSession::apply_snapshot`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pta_fit::models::LineSourceModel;
//! use pta_fit::session::{FitEvent, FittingSession};
//! use pta_fit::data::ObservedSeries;
//!
//! let observed = ObservedSeries::new(
//!     vec![0.1, 1.0, 10.0],
//!     vec![0.5, 0.8, 1.1],
//!     vec![0.1, 0.12, 0.12],
//! ).unwrap();
//!
//! let mut session = FittingSession::with_model(Arc::new(LineSourceModel::new()));
//! session.set_observed(observed);
//!
//! let handle = session.start_fit().unwrap();
//! while let Some(event) = handle.recv() {
//!     match event {
//!         FitEvent::Iteration(snapshot) => session.apply_snapshot(&snapshot),
//!         FitEvent::Finished(result) => {
//!             println!("{}", result.unwrap());
//!             break;
//!         }
//!         FitEvent::Progress(_) => {}
//!     }
//! }
//! ```

mod state;
mod worker;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::data::{ObservedSeries, SamplingConfig};
use crate::error::{FitError, Result};
use crate::lm::{IterationSnapshot, LevenbergMarquardt};
use crate::model::{display_times, ForwardModel, ModelCurve};
use crate::parameters::{FitParameters, ParameterSet};
use crate::problem::{sum_squared_error, CurveFitProblem, Problem};
use crate::sampling::sample_with_count;

pub use state::{ObservedData, SessionState};
pub use worker::{FitEvent, FitHandle};

use worker::{FitJob, RunningGuard};

/// A refreshed model curve and how well it matches the data.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveEvaluation {
    /// Parameter map the curve was computed from, after repair.
    pub params: ParameterSet,

    /// Curve on the display grid.
    pub curve: ModelCurve,

    /// Mean squared log residual on the sampled subset, `None` without data.
    pub mse: Option<f64>,

    /// The sampled subset, only when custom sampling is enabled.
    pub sampled: Option<ObservedSeries>,
}

/// One curve of a sensitivity sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityCurve {
    pub value: f64,
    pub curve: ModelCurve,
}

/// Parse a sensitivity value list such as `"1, 5, 10"`.
///
/// Both the ASCII comma and the full-width comma separate values. Blank and
/// unparsable entries are skipped.
pub fn parse_sensitivity_values(text: &str) -> Vec<f64> {
    text.replace('\u{FF0C}', ",")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f64>().ok())
        .collect()
}

/// Consumer-side state of a fitting workflow.
pub struct FittingSession<M: ForwardModel + ?Sized = dyn ForwardModel> {
    model: Option<Arc<M>>,
    parameters: FitParameters,
    observed: ObservedSeries,
    sampling: SamplingConfig,
    weight_percent: u8,
    fitter: LevenbergMarquardt,
    running: Arc<AtomicBool>,
}

impl<M: ForwardModel + ?Sized> Default for FittingSession<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ForwardModel + ?Sized> FittingSession<M> {
    /// A session without a model. The weight starts at 50 %.
    pub fn new() -> Self {
        Self {
            model: None,
            parameters: FitParameters::new(),
            observed: ObservedSeries::default(),
            sampling: SamplingConfig::default(),
            weight_percent: 50,
            fitter: LevenbergMarquardt::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A session using `model` and its default parameter table.
    pub fn with_model(model: Arc<M>) -> Self {
        let mut session = Self::new();
        session.set_model(model);
        session
    }

    /// Replace the model and reset the parameter table to its defaults.
    pub fn set_model(&mut self, model: Arc<M>) {
        self.parameters = model.default_parameters();
        self.model = Some(model);
    }

    pub fn model(&self) -> Option<&Arc<M>> {
        self.model.as_ref()
    }

    pub fn parameters(&self) -> &FitParameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut FitParameters {
        &mut self.parameters
    }

    pub fn set_parameters(&mut self, parameters: FitParameters) {
        self.parameters = parameters;
    }

    pub fn observed(&self) -> &ObservedSeries {
        &self.observed
    }

    pub fn set_observed(&mut self, observed: ObservedSeries) {
        self.observed = observed;
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    pub fn set_sampling(&mut self, sampling: SamplingConfig) {
        self.sampling = sampling;
    }

    pub fn weight_percent(&self) -> u8 {
        self.weight_percent
    }

    /// Pressure share of the misfit in percent; values above 100 are clamped.
    pub fn set_weight_percent(&mut self, percent: u8) {
        self.weight_percent = percent.min(100);
    }

    /// Pressure share of the misfit in `[0, 1]`.
    pub fn weight(&self) -> f64 {
        f64::from(self.weight_percent) / 100.0
    }

    pub fn fitter(&self) -> &LevenbergMarquardt {
        &self.fitter
    }

    pub fn set_fitter(&mut self, fitter: LevenbergMarquardt) {
        self.fitter = fitter;
    }

    /// Whether a background fit started from this session is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark exactly `names` as fit-eligible. Derived parameters never are.
    pub fn select_fit_parameters<S: AsRef<str>>(&mut self, names: &[S]) {
        self.parameters.select_for_fit(names);
    }

    /// Copy the values of an accepted state into the parameter table.
    pub fn apply_snapshot(&mut self, snapshot: &IterationSnapshot) {
        self.parameters.apply_values(&snapshot.params);
    }

    fn require_model(&self) -> Result<&Arc<M>> {
        self.model.as_ref().ok_or(FitError::ModelUnavailable)
    }
}

impl<M: ForwardModel + ?Sized + 'static> FittingSession<M> {
    /// Start a background fit on a snapshot of the current session.
    ///
    /// Fails with [`FitError::AlreadyRunning`] while a previous fit from this
    /// session is still active, and with [`FitError::ModelUnavailable`] or
    /// [`FitError::NoObservedData`] when there is nothing to fit.
    pub fn start_fit(&self) -> Result<FitHandle> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FitError::AlreadyRunning);
        }
        let guard = RunningGuard(Arc::clone(&self.running));

        if self.observed.is_empty() {
            return Err(FitError::NoObservedData);
        }
        let model = Arc::clone(self.require_model()?);

        log::info!(
            "starting fit of '{}' on {} observed points",
            model.name(),
            self.observed.len()
        );
        let job = FitJob {
            model,
            parameters: self.parameters.clone(),
            observed: self.observed.clone(),
            sampling: self.sampling.clone(),
            weight: self.weight(),
            fitter: self.fitter.clone(),
        };
        worker::spawn(job, guard)
    }
}

impl<M: ForwardModel + ?Sized> FittingSession<M> {
    /// Recompute the model curve on the display grid.
    ///
    /// `explicit` overrides the table values, otherwise the table is used.
    /// When observed data is loaded the MSE is computed on the same sampled
    /// subset and with the same weight a fit would use.
    pub fn evaluate_curve(&self, explicit: Option<&ParameterSet>) -> Result<CurveEvaluation> {
        let model = self.require_model()?;

        let mut params = match explicit {
            Some(values) => values.clone(),
            None => self.parameters.to_set(),
        };
        self.fitter.repairer().repair_for_display(&mut params);

        let grid = display_times(self.observed.time());
        let curve = model.evaluate(&params, Some(&grid))?;

        let (mse, sampled) = if self.observed.is_empty() {
            (None, None)
        } else {
            let fit_data =
                sample_with_count(&self.observed, &self.sampling, self.fitter.config().sample_count);
            let problem = CurveFitProblem::new(&**model, &fit_data, self.weight())
                .with_floor(self.fitter.config().residual_floor);
            let residuals = problem.eval(&params)?;
            let mse = if residuals.is_empty() {
                None
            } else {
                Some(sum_squared_error(&residuals) / residuals.len() as f64)
            };
            let sampled = if self.sampling.enabled {
                Some(fit_data)
            } else {
                None
            };
            (mse, sampled)
        };

        Ok(CurveEvaluation {
            params,
            curve,
            mse,
            sampled,
        })
    }

    /// One display curve per value of `key`, all other parameters fixed.
    pub fn sensitivity_curves(&self, key: &str, values: &[f64]) -> Result<Vec<SensitivityCurve>> {
        let model = self.require_model()?;
        if !self.parameters.contains(key) {
            return Err(FitError::ParameterNotFound(key.to_string()));
        }

        let grid = display_times(self.observed.time());
        let base = self.parameters.to_set();
        values
            .iter()
            .map(|&value| {
                let mut params = base.clone();
                params.set(key, value);
                self.fitter.repairer().repair_for_display(&mut params);
                let curve = model.evaluate(&params, Some(&grid))?;
                Ok(SensitivityCurve { value, curve })
            })
            .collect()
    }

    /// Snapshot of everything worth persisting.
    pub fn to_state(&self) -> SessionState {
        SessionState {
            model_name: self
                .model
                .as_ref()
                .map(|m| m.name().to_string())
                .unwrap_or_default(),
            fit_weight_val: self.weight_percent,
            parameters: self.parameters.clone(),
            observed_data: ObservedData::from(&self.observed),
            use_custom_sampling: self.sampling.enabled,
            custom_intervals: self.sampling.intervals.clone(),
        }
    }

    /// Restore a persisted state and recompute the curve from it.
    ///
    /// Persisted rows are merged by name into the model's default table, so
    /// parameters the model no longer knows are dropped and new ones keep
    /// their defaults.
    pub fn restore(&mut self, state: SessionState) -> Result<CurveEvaluation> {
        let model = Arc::clone(self.require_model()?);
        if !state.model_name.is_empty() && state.model_name != model.name() {
            log::warn!(
                "session was saved for model '{}', restoring into '{}'",
                state.model_name,
                model.name()
            );
        }

        let observed = state.observed()?;
        let mut parameters = model.default_parameters();
        for mut saved in state.parameters.iter().cloned() {
            let Some(default) = parameters.get(saved.name()) else {
                log::debug!("ignoring unknown parameter '{}'", saved.name());
                continue;
            };
            if saved.display_name == saved.name() {
                saved.display_name = default.display_name.clone();
            }
            parameters.add(saved);
        }

        self.parameters = parameters;
        self.weight_percent = state.fit_weight_val.min(100);
        self.observed = observed;
        self.sampling = state.sampling();

        let values = self.parameters.to_set();
        self.evaluate_curve(Some(&values))
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_state().save(path)
    }

    pub fn load_json<P: AsRef<Path>>(&mut self, path: P) -> Result<CurveEvaluation> {
        let state = SessionState::load(path)?;
        self.restore(state)
    }
}
