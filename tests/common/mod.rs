//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pta_fit::data::ObservedSeries;
use pta_fit::model::{log_time_steps, ForwardModel, ModelCurve};
use pta_fit::parameters::{FitParameter, FitParameters, ParameterSet};
use pta_fit::{FitObserver, IterationSnapshot, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Power-law response: `p = C·t^nf`, `p' = nf·C·t^nf`.
///
/// `C` is fitted in log space and `nf` linearly. Records every call and
/// every precision switch.
#[derive(Debug, Default)]
pub struct PowerLawModel {
    high_precision: AtomicBool,
    pub calls: AtomicUsize,
    pub precision_history: Mutex<Vec<bool>>,
}

impl PowerLawModel {
    pub fn new() -> Self {
        Self {
            high_precision: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn parameters(c: f64, nf: f64) -> FitParameters {
        let mut params = FitParameters::new();
        params.add(FitParameter::with_bounds("C", c, 1e-3, 1e3).unwrap().fitted().unwrap());
        params.add(FitParameter::with_bounds("nf", nf, 0.05, 1.0).unwrap().fitted().unwrap());
        params
    }
}

impl ForwardModel for PowerLawModel {
    fn name(&self) -> &str {
        "power-law"
    }

    fn evaluate(&self, params: &ParameterSet, times: Option<&[f64]>) -> Result<ModelCurve> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let c = params.value("C")?;
        let nf = params.value("nf")?;
        let time = match times {
            Some(t) => t.to_vec(),
            None => log_time_steps(50, -3.0, 4.0),
        };
        let pressure: Vec<f64> = time.iter().map(|t| c * t.powf(nf)).collect();
        let derivative = pressure.iter().map(|p| nf * p).collect();
        ModelCurve::new(time, pressure, derivative)
    }

    fn set_high_precision(&self, enabled: bool) {
        self.high_precision.store(enabled, Ordering::SeqCst);
        self.precision_history.lock().unwrap().push(enabled);
    }

    fn is_high_precision(&self) -> bool {
        self.high_precision.load(Ordering::SeqCst)
    }

    fn required_parameters(&self) -> Vec<String> {
        vec!["C".to_string(), "nf".to_string()]
    }

    fn default_parameters(&self) -> FitParameters {
        Self::parameters(1.0, 0.5)
    }
}

/// Returns the observed values at the requested times, whatever the parameters.
#[derive(Debug)]
pub struct EchoModel {
    pub series: ObservedSeries,
}

impl ForwardModel for EchoModel {
    fn name(&self) -> &str {
        "echo"
    }

    fn evaluate(&self, _params: &ParameterSet, times: Option<&[f64]>) -> Result<ModelCurve> {
        let time = times.map(<[f64]>::to_vec).unwrap_or_else(|| self.series.time().to_vec());
        let mut pressure = Vec::with_capacity(time.len());
        let mut derivative = Vec::with_capacity(time.len());
        for &t in &time {
            match self.series.time().iter().position(|&x| (x - t).abs() <= 1e-12 * t.abs()) {
                Some(i) => {
                    pressure.push(self.series.pressure()[i]);
                    derivative.push(self.series.derivative()[i]);
                }
                None => {
                    pressure.push(0.0);
                    derivative.push(0.0);
                }
            }
        }
        ModelCurve::new(time, pressure, derivative)
    }

    fn set_high_precision(&self, _enabled: bool) {}

    fn is_high_precision(&self) -> bool {
        true
    }
}

/// Collects every callback; optionally cancels on the first progress event.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub progress: Vec<u32>,
    pub snapshots: Vec<IterationSnapshot>,
    pub finished: usize,
    pub cancel_on_progress: Option<Arc<AtomicBool>>,
}

impl FitObserver for RecordingObserver {
    fn on_progress(&mut self, percent: u32) {
        self.progress.push(percent);
        if let Some(cancel) = &self.cancel_on_progress {
            cancel.store(true, Ordering::SeqCst);
        }
    }

    fn on_iteration(&mut self, snapshot: &IterationSnapshot) {
        self.snapshots.push(snapshot.clone());
    }

    fn on_finished(&mut self) {
        self.finished += 1;
    }
}

/// `count` log-spaced times between `10^log_min` and `10^log_max`.
pub fn log_times(count: usize, log_min: f64, log_max: f64) -> Vec<f64> {
    log_time_steps(count, log_min, log_max)
}

/// Exact power-law observations.
pub fn power_law_series(c: f64, nf: f64, times: &[f64]) -> ObservedSeries {
    let pressure: Vec<f64> = times.iter().map(|t| c * t.powf(nf)).collect();
    let derivative = pressure.iter().map(|p| nf * p).collect();
    ObservedSeries::new(times.to_vec(), pressure, derivative).unwrap()
}

/// Power-law observations with multiplicative noise, reproducible from `seed`.
pub fn noisy_power_law_series(c: f64, nf: f64, times: &[f64], sigma: f64, seed: u64) -> ObservedSeries {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = Normal::new(0.0, sigma).unwrap();
    let exact = power_law_series(c, nf, times);
    let pressure = exact
        .pressure()
        .iter()
        .map(|p| p * (1.0 + noise.sample(&mut rng)))
        .collect();
    let derivative = exact
        .derivative()
        .iter()
        .map(|d| d * (1.0 + noise.sample(&mut rng)))
        .collect();
    ObservedSeries::new(times.to_vec(), pressure, derivative).unwrap()
}
