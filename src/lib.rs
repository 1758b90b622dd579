//! # pta-fit
//!
//! `pta-fit` fits reservoir response models to pressure-transient test data
//! with a Levenberg-Marquardt optimizer.
//!
//! The library provides:
//! - Log-spaced and interval-based reduction of long observed series
//! - A weighted log-space misfit over pressure and Bourdet derivative
//! - A damped Gauss-Newton loop with central-difference Jacobians in log or
//!   linear parameter scale
//! - Physical constraint repair (`kf > km`, `omega1 > omega2`, `LfD = Lf / L`)
//! - A background fitting session with progress events, cancellation,
//!   sensitivity sweeps and JSON persistence
//!
//! The forward model is supplied by the caller through the
//! [`ForwardModel`] trait; [`models::LineSourceModel`] is a ready-made
//! homogeneous reference.
//!
//! ## Basic Usage
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//! use pta_fit::data::{ObservedSeries, SamplingConfig};
//! use pta_fit::models::LineSourceModel;
//! use pta_fit::{ForwardModel, LevenbergMarquardt};
//!
//! let model = LineSourceModel::new();
//! let mut truth = model.default_parameters().to_set();
//! truth.set("k", 25.0);
//! truth.set("S", 2.0);
//!
//! let times: Vec<f64> = (0..60).map(|i| 10f64.powf(-2.0 + 0.1 * i as f64)).collect();
//! let curve = model.evaluate(&truth, Some(&times)).unwrap();
//! let observed = ObservedSeries::new(curve.time, curve.pressure, curve.derivative).unwrap();
//!
//! let report = LevenbergMarquardt::new()
//!     .fit(
//!         &model,
//!         &model.default_parameters(),
//!         &observed,
//!         &SamplingConfig::uniform(),
//!         0.5,
//!         &AtomicBool::new(false),
//!         &mut (),
//!     )
//!     .unwrap();
//! assert!(report.is_converged());
//! ```

pub mod error;

// Parameter system
pub mod parameters;

pub mod data;
pub mod sampling;

pub mod model;
pub mod models;

pub mod problem;
pub mod utils;

pub mod lm;
pub mod session;

// Re-exports for convenience
pub use error::{FitError, Result};
pub use lm::{FitConfig, FitObserver, FitReport, IterationSnapshot, LevenbergMarquardt, TerminationReason};
pub use model::{ForwardModel, ModelCurve};
pub use problem::Problem;
pub use session::{FitEvent, FitHandle, FittingSession};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
