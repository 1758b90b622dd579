//! Levenberg-Marquardt fit controller.
//!
//! Drives the evaluate / accept / reject loop over a sampled subset of the
//! observed series, adapting the damping factor and reporting accepted steps
//! to a [`FitObserver`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::data::{ObservedSeries, SamplingConfig};
use crate::error::{FitError, Result};
use crate::model::{ForwardModel, ModelCurve, PrecisionGuard};
use crate::parameters::{ConstraintRepairer, FitParameters, ParameterSet};
use crate::problem::{sum_squared_error, CurveFitProblem, Problem};
use crate::sampling::sample_with_count;
use crate::utils::finite_difference::{self, JacobianContext};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::config::FitConfig;
use super::convergence::TerminationReason;
use super::step::{apply_step, NormalEquations};

/// State reported after the initial evaluation, after every accepted step
/// and once at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSnapshot {
    /// SSE divided by the residual count.
    pub mse: f64,

    /// Full parameter map, derived values included.
    pub params: ParameterSet,

    /// Model curve on the model's own display grid.
    pub curve: ModelCurve,
}

/// Receives progress from a running fit.
///
/// All methods are called on the thread running the fit, in order.
/// [`on_finished`](Self::on_finished) is called exactly once per run,
/// whatever the outcome.
pub trait FitObserver {
    /// Coarse progress in percent, once per outer iteration.
    fn on_progress(&mut self, _percent: u32) {}

    fn on_iteration(&mut self, _snapshot: &IterationSnapshot) {}

    fn on_finished(&mut self) {}
}

/// Observer that ignores everything.
impl FitObserver for () {}

/// Result of a fit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Final parameter map.
    pub params: ParameterSet,

    /// Sum of squared residuals on the fitted subset. NaN if nothing was evaluated.
    pub sse: f64,

    /// `sse / residual_count`. NaN if nothing was evaluated.
    pub mse: f64,

    pub residual_count: usize,

    /// Outer iterations that built a Jacobian.
    pub iterations: usize,

    /// Residual evaluations (each one a forward-model call).
    pub evaluations: usize,

    pub termination: TerminationReason,

    /// Damping factor when the run stopped.
    pub lambda: f64,

    /// SSE after the initial evaluation and after every accepted step.
    pub accepted_sse: Vec<f64>,
}

impl FitReport {
    pub fn is_converged(&self) -> bool {
        self.termination.is_converged()
    }
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Termination: {}", self.termination)?;
        writeln!(f, "  SSE: {:.6e}", self.sse)?;
        writeln!(f, "  MSE: {:.6e}", self.mse)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Model evaluations: {}", self.evaluations)?;
        writeln!(f, "  Final λ: {:.3e}", self.lambda)?;
        for (name, value) in self.params.iter() {
            writeln!(f, "  {} = {:.6e}", name, value)?;
        }
        Ok(())
    }
}

/// Levenberg-Marquardt fitter for forward models.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: FitConfig,
    repairer: ConstraintRepairer,
}

impl LevenbergMarquardt {
    /// Create a fitter with the default configuration and constraint rules.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FitConfig) -> Self {
        Self {
            config,
            repairer: ConstraintRepairer::default(),
        }
    }

    pub fn with_repairer(mut self, repairer: ConstraintRepairer) -> Self {
        self.repairer = repairer;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    pub fn with_lambda_up_factor(mut self, factor: f64) -> Self {
        self.config.lambda_up_factor = factor;
        self
    }

    pub fn with_lambda_down_factor(mut self, factor: f64) -> Self {
        self.config.lambda_down_factor = factor;
        self
    }

    pub fn with_convergence_mse(mut self, mse: f64) -> Self {
        self.config.convergence_mse = mse;
        self
    }

    pub fn with_sample_count(mut self, count: usize) -> Self {
        self.config.sample_count = count;
        self
    }

    pub fn with_parallel_jacobian(mut self, parallel: bool) -> Self {
        self.config.parallel_jacobian = parallel;
        self
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn repairer(&self) -> &ConstraintRepairer {
        &self.repairer
    }

    /// Fit `model` to `observed`.
    ///
    /// The series is reduced with `sampling` first; `weight` is the pressure
    /// share of the residuals in `[0, 1]`. The run stops early once `cancel`
    /// is set, keeping the last accepted parameters. The model is kept in
    /// fast mode while iterating and its previous precision mode is restored
    /// before the final snapshot.
    ///
    /// `observer.on_finished()` is called exactly once, also when an error is
    /// returned.
    #[allow(clippy::too_many_arguments)]
    pub fn fit<M, O>(
        &self,
        model: &M,
        parameters: &FitParameters,
        observed: &ObservedSeries,
        sampling: &SamplingConfig,
        weight: f64,
        cancel: &AtomicBool,
        observer: &mut O,
    ) -> Result<FitReport>
    where
        M: ForwardModel + ?Sized,
        O: FitObserver + ?Sized,
    {
        let result = self.run(model, parameters, observed, sampling, weight, cancel, observer);
        if let Err(e) = &result {
            log::warn!("fit of '{}' failed: {}", model.name(), e);
        }
        observer.on_finished();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run<M, O>(
        &self,
        model: &M,
        parameters: &FitParameters,
        observed: &ObservedSeries,
        sampling: &SamplingConfig,
        weight: f64,
        cancel: &AtomicBool,
        observer: &mut O,
    ) -> Result<FitReport>
    where
        M: ForwardModel + ?Sized,
        O: FitObserver + ?Sized,
    {
        let config = &self.config;
        let free = parameters.free_parameters();

        let mut current = parameters.to_set();
        if free.is_empty() {
            log::info!("fit of '{}': no parameters selected, nothing to do", model.name());
            self.repairer.repair(&mut current);
            return Ok(FitReport {
                params: current,
                sse: f64::NAN,
                mse: f64::NAN,
                residual_count: 0,
                iterations: 0,
                evaluations: 0,
                termination: TerminationReason::NoFreeParameters,
                lambda: config.initial_lambda,
                accepted_sse: Vec::new(),
            });
        }

        let required = model.required_parameters();
        current.require(required.as_slice())?;

        let fit_data = sample_with_count(observed, sampling, config.sample_count);
        if fit_data.is_empty() {
            return Err(FitError::InvalidInput(
                "sampling left no observed points to fit".to_string(),
            ));
        }

        log::info!(
            "fit of '{}': {} free parameters, {} of {} points",
            model.name(),
            free.len(),
            fit_data.len(),
            observed.len()
        );

        let precision = PrecisionGuard::fast(model);
        let problem = CurveFitProblem::new(model, &fit_data, weight).with_floor(config.residual_floor);

        self.repairer.repair(&mut current);
        let mut residuals = problem.eval(&current)?;
        let mut evaluations = 1;
        let n_res = residuals.len();
        if n_res == 0 {
            return Err(FitError::ModelEvaluation(
                "forward model returned an empty curve".to_string(),
            ));
        }
        let mut sse = sum_squared_error(&residuals);
        let mut accepted_sse = vec![sse];

        observer.on_iteration(&IterationSnapshot {
            mse: sse / n_res as f64,
            params: current.clone(),
            curve: model.evaluate(&current, None)?,
        });

        let ctx = JacobianContext {
            free: &free,
            scales: &config.scales,
            steps: config.difference_steps(),
            repairer: &self.repairer,
        };

        let mut lambda = config.initial_lambda;
        let mut iterations = 0;
        let mut termination = TerminationReason::MaxIterationsReached;

        for iter in 0..config.max_iterations {
            if cancel.load(Ordering::SeqCst) {
                termination = TerminationReason::StoppedByUser;
                break;
            }
            let mse = sse / residuals.len() as f64;
            if mse < config.convergence_mse {
                termination = TerminationReason::Converged;
                break;
            }

            observer.on_progress((iter * 100 / config.max_iterations) as u32);
            iterations += 1;

            let jac = self.jacobian(&problem, &current, residuals.len(), &ctx);
            evaluations += 2 * free.len();
            let normal = NormalEquations::from_jacobian(&jac, &residuals)?;

            let mut accepted = false;
            for attempt in 0..config.max_damping_attempts {
                let delta = match normal.solve(lambda) {
                    Ok(delta) => delta,
                    Err(e) => {
                        log::warn!("iteration {}: trial {} solve failed: {}", iter, attempt, e);
                        lambda *= config.lambda_up_factor;
                        continue;
                    }
                };
                let mut trial = apply_step(&current, &free, &delta, &config.scales);
                self.repairer.repair(&mut trial);

                evaluations += 1;
                let trial_residuals = match problem.eval(&trial) {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("iteration {}: trial {} evaluation failed: {}", iter, attempt, e);
                        lambda *= config.lambda_up_factor;
                        continue;
                    }
                };
                let trial_sse = sum_squared_error(&trial_residuals);

                if trial_sse < sse {
                    log::debug!(
                        "iteration {}: accepted trial {} (λ = {:.3e}, SSE {:.6e} → {:.6e})",
                        iter,
                        attempt,
                        lambda,
                        sse,
                        trial_sse
                    );
                    sse = trial_sse;
                    current = trial;
                    residuals = trial_residuals;
                    lambda *= config.lambda_down_factor;
                    accepted = true;
                    accepted_sse.push(sse);

                    observer.on_iteration(&IterationSnapshot {
                        mse: sse / n_res as f64,
                        params: current.clone(),
                        curve: model.evaluate(&current, None)?,
                    });
                    break;
                }

                log::debug!(
                    "iteration {}: rejected trial {} (λ = {:.3e}, SSE {:.6e} ≥ {:.6e})",
                    iter,
                    attempt,
                    lambda,
                    trial_sse,
                    sse
                );
                lambda *= config.lambda_up_factor;
            }

            if !accepted && lambda > config.stall_lambda {
                termination = TerminationReason::Stalled;
                break;
            }
        }

        let residual_count = residuals.len();
        let mse = sse / residual_count as f64;
        if termination == TerminationReason::MaxIterationsReached && mse < config.convergence_mse {
            termination = TerminationReason::Converged;
        }

        precision.release();
        self.repairer.repair(&mut current);
        observer.on_iteration(&IterationSnapshot {
            mse,
            params: current.clone(),
            curve: model.evaluate(&current, None)?,
        });

        log::info!(
            "fit of '{}' finished after {} iterations: {} (MSE {:.6e})",
            model.name(),
            iterations,
            termination,
            mse
        );

        Ok(FitReport {
            params: current,
            sse,
            mse,
            residual_count,
            iterations,
            evaluations,
            termination,
            lambda,
            accepted_sse,
        })
    }

    fn jacobian<P: Problem + Sync + ?Sized>(
        &self,
        problem: &P,
        params: &ParameterSet,
        n_residuals: usize,
        ctx: &JacobianContext<'_>,
    ) -> Array2<f64> {
        #[cfg(feature = "parallel")]
        if self.config.parallel_jacobian {
            return finite_difference::jacobian_parallel(problem, params, n_residuals, ctx);
        }
        finite_difference::jacobian(problem, params, n_residuals, ctx)
    }
}
