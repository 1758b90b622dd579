//! Persisted session state.
//!
//! The JSON layout matches the project files written by the interactive
//! application, so sessions can move between the two.

use std::fs;
use std::path::Path;

use crate::data::{ObservedSeries, SamplingConfig, SamplingInterval};
use crate::error::Result;
use crate::parameters::FitParameters;
use serde::{Deserialize, Serialize};

/// Observed series as stored on disk.
///
/// Unlike [`ObservedSeries`] it is not validated; [`SessionState::observed`]
/// does that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservedData {
    pub time: Vec<f64>,
    pub pressure: Vec<f64>,
    pub derivative: Vec<f64>,
}

impl From<&ObservedSeries> for ObservedData {
    fn from(series: &ObservedSeries) -> Self {
        Self {
            time: series.time().to_vec(),
            pressure: series.pressure().to_vec(),
            derivative: series.derivative().to_vec(),
        }
    }
}

/// Everything needed to reproduce a fitting session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub model_name: String,

    /// Pressure weight in percent (0..=100).
    pub fit_weight_val: u8,

    pub parameters: FitParameters,

    pub observed_data: ObservedData,

    pub use_custom_sampling: bool,

    pub custom_intervals: Vec<SamplingInterval>,
}

impl SessionState {
    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            enabled: self.use_custom_sampling,
            intervals: self.custom_intervals.clone(),
        }
    }

    /// Validated observed series.
    pub fn observed(&self) -> Result<ObservedSeries> {
        let data = self.observed_data.clone();
        ObservedSeries::new(data.time, data.pressure, data.derivative)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut state: SessionState = serde_json::from_str(json)?;
        state.fit_weight_val = state.fit_weight_val.min(100);
        Ok(state)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
