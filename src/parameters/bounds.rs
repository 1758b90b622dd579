//! Parameter bounds implementation
//!
//! Fit parameters carry a closed `[min, max]` interval. The optimizer never
//! transforms parameters into an unbounded space; instead every trial value is
//! clamped back into its interval after the update is applied.

use serde::{Deserialize, Serialize};
use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must be less than max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Parameter value {value} is outside bounds: [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },
}

/// Represents the bounds constraints on a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Bounds", 2)?;
        state.serialize_field("min", &self.lower())?;
        state.serialize_field("max", &self.upper())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,

            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;
        Ok(Bounds::from_options(helper.min, helper.max))
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create a new bounds constraint with min and max values
    ///
    /// # Examples
    ///
    /// ```
    /// use pta_fit::parameters::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert_eq!(bounds.max, 10.0);
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Build bounds from optional limits, where `None` means unbounded on that side.
    ///
    /// This is the persisted representation: JSON has no infinity, so open
    /// sides are stored as `null`.
    pub fn from_options(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min: min.unwrap_or(NEG_INFINITY),
            max: max.unwrap_or(INFINITY),
        }
    }

    /// Lower limit, or `None` when unbounded below.
    pub fn lower(&self) -> Option<f64> {
        self.min.is_finite().then_some(self.min)
    }

    /// Upper limit, or `None` when unbounded above.
    pub fn upper(&self) -> Option<f64> {
        self.max.is_finite().then_some(self.max)
    }

    /// Check if a value is within the bounds
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        // f64::clamp panics on min > max, which hand-built bounds can still hold.
        if self.min > self.max {
            return value;
        }
        value.clamp(self.min, self.max)
    }
}
