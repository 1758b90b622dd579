//! Levenberg-Marquardt fitting of forward models.
//!
//! [`LevenbergMarquardt::fit`] minimizes the log-space misfit between a
//! [`ForwardModel`](crate::model::ForwardModel) and an observed series over
//! the parameters marked for fitting. Each outer iteration builds a
//! central-difference Jacobian on the sampled subset, forms the Gauss-Newton
//! normal equations and tries up to a handful of damped steps, growing the
//! damping factor after every rejection.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod step;

// Re-export key types
pub use algorithm::{FitObserver, FitReport, IterationSnapshot, LevenbergMarquardt};
pub use config::FitConfig;
pub use convergence::TerminationReason;
pub use step::{apply_step, NormalEquations};
