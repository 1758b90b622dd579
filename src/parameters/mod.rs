//! # Parameter System
//!
//! Named reservoir parameters, their bounds and the physical rules tying
//! them together.
//!
//! ## Core Components
//!
//! - [`FitParameter`]: one row of the parameter table (value, fit flag, bounds, step)
//! - [`FitParameters`]: the ordered table, source of the initial [`ParameterSet`]
//! - [`ParameterSet`]: name → value map exchanged with the forward model
//! - [`Bounds`]: closed intervals the optimizer clamps trial values into
//! - [`ConstraintRepairer`]: ordering repair and derived-parameter updates
//!
//! ## Example Usage
//!
//! ```rust
//! use pta_fit::parameters::{ConstraintRepairer, FitParameter, FitParameters};
//!
//! let mut params = FitParameters::new();
//! params.add(FitParameter::with_bounds("kf", 5.0, 1e-3, 1e4).unwrap());
//! params.add(FitParameter::with_bounds("km", 8.0, 1e-3, 1e4).unwrap());
//! params.select_for_fit(&["kf"]);
//!
//! let mut set = params.to_set();
//! ConstraintRepairer::default().repair(&mut set);
//! assert!(set.get("kf").unwrap() > set.get("km").unwrap());
//! ```

pub mod bounds;
pub mod constraints;
pub mod parameter;
pub mod parameters;

// Re-export key types
pub use bounds::{Bounds, BoundsError};
pub use constraints::{ConstraintRepairer, DerivedMode, OrderingRule, RatioRule};
pub use parameter::{FitParameter, ParameterError, ParameterScale, ScalePolicy, DERIVED_LENGTH_RATIO};
pub use parameters::{FitParameters, FreeParameter, ParameterSet};
