//! Observed pressure-transient data and sampling configuration.

use crate::error::{FitError, Result};
use serde::{Deserialize, Serialize};

/// Points with time or pressure difference at or below this are not plotted.
const PLOT_FLOOR: f64 = 1e-8;

/// Stand-in derivative for plotted points whose derivative is unusable.
const PLOT_DERIVATIVE_FILL: f64 = 1e-10;

/// Measured pressure difference and its Bourdet derivative over time.
///
/// The three sequences always have the same length and time is strictly
/// increasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedSeries {
    time: Vec<f64>,
    pressure: Vec<f64>,
    derivative: Vec<f64>,
}

impl ObservedSeries {
    /// Build a series, checking lengths and time ordering.
    pub fn new(time: Vec<f64>, pressure: Vec<f64>, derivative: Vec<f64>) -> Result<Self> {
        if time.len() != pressure.len() || time.len() != derivative.len() {
            return Err(FitError::DimensionMismatch(format!(
                "time ({}), pressure ({}) and derivative ({}) must have equal lengths",
                time.len(),
                pressure.len(),
                derivative.len()
            )));
        }
        if let Some(i) = time.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(FitError::InvalidInput(format!(
                "time must be strictly increasing (index {}: {} then {})",
                i + 1,
                time[i],
                time[i + 1]
            )));
        }
        Ok(Self {
            time,
            pressure,
            derivative,
        })
    }

    /// Build from `(t, Δp, Δp')` triples already known to be ordered.
    pub(crate) fn from_points(points: Vec<(f64, f64, f64)>) -> Self {
        let mut series = Self {
            time: Vec::with_capacity(points.len()),
            pressure: Vec::with_capacity(points.len()),
            derivative: Vec::with_capacity(points.len()),
        };
        for (t, p, d) in points {
            series.time.push(t);
            series.pressure.push(p);
            series.derivative.push(d);
        }
        series
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn pressure(&self) -> &[f64] {
        &self.pressure
    }

    pub fn derivative(&self) -> &[f64] {
        &self.derivative
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// `(t, Δp, Δp')` at index `i`.
    pub fn point(&self, i: usize) -> (f64, f64, f64) {
        (self.time[i], self.pressure[i], self.derivative[i])
    }

    /// First and last observed time.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((*self.time.first()?, *self.time.last()?))
    }

    /// Points suitable for a log-log plot.
    ///
    /// Points with non-positive time or pressure difference are dropped;
    /// unusable derivatives are replaced by a tiny positive value so the
    /// pressure point is still shown.
    pub fn valid_points(&self) -> ObservedSeries {
        let points = (0..self.len())
            .filter(|&i| self.time[i] > PLOT_FLOOR && self.pressure[i] > PLOT_FLOOR)
            .map(|i| {
                let d = self.derivative[i];
                let d = if d > PLOT_FLOOR { d } else { PLOT_DERIVATIVE_FILL };
                (self.time[i], self.pressure[i], d)
            })
            .collect();
        ObservedSeries::from_points(points)
    }
}

/// A time window from which `count` log-spaced points are picked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingInterval {
    pub start: f64,
    pub end: f64,
    pub count: i32,
}

impl SamplingInterval {
    pub fn new(start: f64, end: f64, count: i32) -> Self {
        Self { start, end, count }
    }
}

/// How the observed series is reduced before fitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Use `intervals` instead of the uniform log-spaced default.
    pub enabled: bool,
    pub intervals: Vec<SamplingInterval>,
}

impl SamplingConfig {
    /// Uniform log-spaced sampling.
    pub fn uniform() -> Self {
        Self::default()
    }

    /// Custom interval sampling.
    pub fn custom(intervals: Vec<SamplingInterval>) -> Self {
        Self {
            enabled: true,
            intervals,
        }
    }
}

/// One interval per power-of-ten decade between `t_min` and `t_max`, 10 points each.
///
/// The first interval starts at `t_min` (raised to 1e-6 if smaller) and the
/// last one is clipped at `t_max`.
pub fn default_intervals(t_min: f64, t_max: f64) -> Vec<SamplingInterval> {
    let mut intervals = Vec::new();
    let mut current = t_min.max(1e-6);
    if !(t_max > current) {
        return intervals;
    }

    let mut next_power = 10f64.powf(current.log10().floor() + 1.0);
    while current < t_max {
        let end = next_power.min(t_max);
        if end > current * 1.000001 {
            intervals.push(SamplingInterval::new(current, end, 10));
        }
        current = end;
        next_power *= 10.0;
        if (current - t_max).abs() < 1e-9 {
            break;
        }
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_validates_shape() {
        assert!(ObservedSeries::new(vec![1.0, 2.0], vec![1.0], vec![1.0, 1.0]).is_err());
        assert!(matches!(
            ObservedSeries::new(vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]),
            Err(FitError::InvalidInput(_))
        ));
        let series = ObservedSeries::new(vec![1.0, 2.0], vec![3.0, 4.0], vec![0.5, 0.6]).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.point(1), (2.0, 4.0, 0.6));
        assert_eq!(series.time_range(), Some((1.0, 2.0)));
    }

    #[test]
    fn test_valid_points_filters_non_positive() {
        let series = ObservedSeries::new(
            vec![0.0, 0.1, 1.0, 10.0],
            vec![1.0, 0.0, 2.0, 3.0],
            vec![1.0, 1.0, -0.5, 0.7],
        )
        .unwrap();
        let valid = series.valid_points();
        assert_eq!(valid.time(), &[1.0, 10.0]);
        assert_eq!(valid.pressure(), &[2.0, 3.0]);
        assert_eq!(valid.derivative(), &[1e-10, 0.7]);
    }

    #[test]
    fn test_default_intervals_follow_decades() {
        let intervals = default_intervals(0.5, 500.0);
        assert_eq!(intervals.len(), 4);
        assert_relative_eq!(intervals[0].start, 0.5);
        assert_relative_eq!(intervals[0].end, 1.0, epsilon = 1e-12);
        assert_relative_eq!(intervals[1].end, 10.0, epsilon = 1e-9);
        assert_relative_eq!(intervals[2].end, 100.0, epsilon = 1e-9);
        assert_relative_eq!(intervals[3].end, 500.0);
        assert!(intervals.iter().all(|i| i.count == 10));
    }

    #[test]
    fn test_default_intervals_degenerate_range() {
        assert!(default_intervals(10.0, 10.0).is_empty());
        assert!(default_intervals(10.0, 1.0).is_empty());
        // non-positive start is raised to 1e-6
        let intervals = default_intervals(0.0, 1e-5);
        assert_eq!(intervals.len(), 1);
        assert_relative_eq!(intervals[0].start, 1e-6);
    }
}
