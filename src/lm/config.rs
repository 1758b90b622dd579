//! Configuration options for the Levenberg-Marquardt fit.
//!
//! Every tunable constant of the solver lives here. The defaults reproduce
//! the behaviour well-test analysts are used to; none of them is a hard
//! requirement.

use crate::parameters::ScalePolicy;
use crate::problem::DEFAULT_RESIDUAL_FLOOR;
use crate::sampling::DEFAULT_SAMPLE_COUNT;
use crate::utils::finite_difference::DifferenceSteps;
use serde::{Deserialize, Serialize};

/// Configuration options for the Levenberg-Marquardt fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Maximum number of outer iterations. Default: 50
    pub max_iterations: usize,

    /// Initial value for the damping parameter. Default: 0.01
    pub initial_lambda: f64,

    /// Factor applied to lambda after a rejected trial. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor applied to lambda after an accepted trial. Default: 0.1
    pub lambda_down_factor: f64,

    /// Trial steps per outer iteration. Default: 5
    pub max_damping_attempts: usize,

    /// An iteration with no accepted trial ends the fit once lambda exceeds
    /// this. Default: 1e10
    pub stall_lambda: f64,

    /// The fit is converged once SSE / residual count drops below this. Default: 3e-3
    pub convergence_mse: f64,

    /// Central difference step in log10 space. Default: 0.01
    pub log_step: f64,

    /// Central difference step for linear-scale parameters. Default: 1e-4
    pub linear_step: f64,

    /// Which parameters are optimized in log10 space.
    pub scales: ScalePolicy,

    /// Values at or below this are left out of the log residuals. Default: 1e-10
    pub residual_floor: f64,

    /// Points kept by uniform sampling. Default: 200
    pub sample_count: usize,

    /// Evaluate Jacobian columns on the rayon pool. Default: false
    ///
    /// Only takes effect with the `parallel` feature, and only makes sense
    /// for models that are safe to evaluate concurrently.
    pub parallel_jacobian: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        let steps = DifferenceSteps::default();
        Self {
            max_iterations: 50,
            initial_lambda: 0.01,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            max_damping_attempts: 5,
            stall_lambda: 1e10,
            convergence_mse: 3e-3,
            log_step: steps.log10,
            linear_step: steps.linear,
            scales: ScalePolicy::default(),
            residual_floor: DEFAULT_RESIDUAL_FLOOR,
            sample_count: DEFAULT_SAMPLE_COUNT,
            parallel_jacobian: false,
        }
    }
}

impl FitConfig {
    pub fn difference_steps(&self) -> DifferenceSteps {
        DifferenceSteps {
            log10: self.log_step,
            linear: self.linear_step,
        }
    }
}
