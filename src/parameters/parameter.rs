//! Fit parameter definition
//!
//! A [`FitParameter`] is one row of the parameter table: a named value with
//! an inclusion flag, bounds, an edit step and display metadata. The
//! optimizer only ever reads these; the values it moves live in a
//! [`ParameterSet`](crate::parameters::ParameterSet).

use crate::parameters::bounds::{Bounds, BoundsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the derived fracture-length ratio. It is recomputed from `Lf / L`
/// and can never be fitted on its own.
pub const DERIVED_LENGTH_RATIO: &str = "LfD";

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{name}' is derived and cannot be fitted independently")]
    DerivedNotFittable { name: String },

    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Parameter '{name}' has non-finite value {value}")]
    NonFinite { name: String, value: f64 },
}

/// How a parameter is perturbed and updated by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterScale {
    /// Steps are taken in log10 space: `10^(log10(v) + delta)`.
    Log,

    /// Steps are added to the raw value.
    Linear,
}

impl ParameterScale {
    /// Apply an optimizer step of size `delta` to `value`.
    pub fn apply(&self, value: f64, delta: f64) -> f64 {
        match self {
            ParameterScale::Log => 10f64.powf(value.log10() + delta),
            ParameterScale::Linear => value + delta,
        }
    }
}

/// Decides which scale a parameter is optimized on.
///
/// Positive quantities spanning decades (permeabilities, storativities,
/// lengths) are handled in log10 space. Skin and the fracture-network
/// exponent can be zero or negative, so they stay linear, as does any value
/// at or below `log_floor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalePolicy {
    /// Parameters that are always perturbed on a linear scale.
    pub linear_names: Vec<String>,

    /// Values at or below this are treated linearly regardless of name.
    pub log_floor: f64,
}

impl Default for ScalePolicy {
    fn default() -> Self {
        Self {
            linear_names: vec!["S".to_string(), "nf".to_string()],
            log_floor: 1e-12,
        }
    }
}

impl ScalePolicy {
    /// Scale to use for `name` at its current `value`.
    pub fn scale_of(&self, name: &str, value: f64) -> ParameterScale {
        if value > self.log_floor && !self.linear_names.iter().any(|n| n == name) {
            ParameterScale::Log
        } else {
            ParameterScale::Linear
        }
    }
}

/// A tunable quantity of the reservoir model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FitParameterRecord", into = "FitParameterRecord")]
pub struct FitParameter {
    name: String,
    value: f64,
    fit: bool,
    bounds: Bounds,

    /// Increment used by interactive editors.
    pub step: f64,

    /// Human-readable label.
    pub display_name: String,

    /// Whether the parameter is shown in parameter tables.
    pub visible: bool,
}

impl FitParameter {
    /// Create a new parameter with no bounds that does not take part in the fit.
    ///
    /// # Examples
    ///
    /// ```
    /// use pta_fit::parameters::FitParameter;
    ///
    /// let param = FitParameter::new("kf", 10.0);
    /// assert_eq!(param.name(), "kf");
    /// assert_eq!(param.value(), 10.0);
    /// assert!(!param.is_fit());
    /// ```
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            fit: false,
            bounds: Bounds::default(),
            step: 0.0,
            display_name: name.to_string(),
            visible: true,
        }
    }

    /// Create a parameter with bounds. The value is clamped into them.
    ///
    /// # Examples
    ///
    /// ```
    /// use pta_fit::parameters::FitParameter;
    ///
    /// let param = FitParameter::with_bounds("km", 50.0, 1e-3, 10.0).unwrap();
    /// assert_eq!(param.value(), 10.0);
    /// assert_eq!(param.min(), 1e-3);
    /// ```
    pub fn with_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        let bounds = Bounds::new(min, max)?;
        let mut param = Self::new(name, bounds.clamp(value));
        param.bounds = bounds;
        Ok(param)
    }

    /// Builder-style: mark the parameter as fit-eligible.
    pub fn fitted(mut self) -> Result<Self, ParameterError> {
        self.set_fit(true)?;
        Ok(self)
    }

    /// Builder-style: set the edit step.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Builder-style: set the display label.
    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = display_name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value of the parameter, rejecting values outside the bounds.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::NonFinite {
                name: self.name.clone(),
                value,
            });
        }
        if !self.bounds.is_within_bounds(value) {
            return Err(ParameterError::BoundsError(BoundsError::ValueOutsideBounds {
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            }));
        }

        self.value = value;
        Ok(())
    }

    /// Set the value without checking the bounds.
    ///
    /// Used when applying optimizer snapshots and restored state, whose values
    /// are authoritative even if the bounds were edited in the meantime.
    pub fn set_value_unchecked(&mut self, value: f64) {
        self.value = value;
    }

    /// Whether the parameter takes part in the optimization.
    pub fn is_fit(&self) -> bool {
        self.fit
    }

    /// Include or exclude the parameter from the optimization.
    ///
    /// Derived parameters can only be excluded.
    pub fn set_fit(&mut self, fit: bool) -> Result<(), ParameterError> {
        if fit && self.is_derived() {
            return Err(ParameterError::DerivedNotFittable {
                name: self.name.clone(),
            });
        }
        self.fit = fit;
        Ok(())
    }

    /// Whether the parameter is computed from others rather than tuned.
    pub fn is_derived(&self) -> bool {
        self.name == DERIVED_LENGTH_RATIO
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    /// Replace the bounds, clamping the current value into them.
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        self.bounds = Bounds::new(min, max)?;
        self.value = self.bounds.clamp(self.value);
        Ok(())
    }
}

/// Persisted shape of a parameter row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitParameterRecord {
    name: String,
    value: f64,
    #[serde(default)]
    is_fit: bool,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default = "default_visible")]
    is_visible: bool,
    #[serde(default)]
    step: f64,
    #[serde(default)]
    display_name: Option<String>,
}

fn default_visible() -> bool {
    true
}

impl From<FitParameterRecord> for FitParameter {
    fn from(record: FitParameterRecord) -> Self {
        let mut bounds = Bounds::from_options(record.min, record.max);
        if bounds.min > bounds.max {
            bounds = Bounds::default();
        }
        let fit = record.is_fit && record.name != DERIVED_LENGTH_RATIO;
        FitParameter {
            display_name: record.display_name.unwrap_or_else(|| record.name.clone()),
            name: record.name,
            value: record.value,
            fit,
            bounds,
            step: record.step,
            visible: record.is_visible,
        }
    }
}

impl From<FitParameter> for FitParameterRecord {
    fn from(param: FitParameter) -> Self {
        FitParameterRecord {
            min: param.bounds.lower(),
            max: param.bounds.upper(),
            name: param.name,
            value: param.value,
            is_fit: param.fit,
            is_visible: param.visible,
            step: param.step,
            display_name: Some(param.display_name),
        }
    }
}
