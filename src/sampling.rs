//! Log-spaced reduction of observed series.
//!
//! Field gauges record tens of thousands of points while the solver needs two
//! forward-model evaluations per free parameter per iteration over every point
//! it fits. The sampler picks a bounded, log-uniform subset so the cost per
//! iteration stays flat regardless of gauge resolution.
//!
//! Both modes place target times uniformly in `log10(t)` and then walk a
//! cursor forward through the (sorted) observations, stopping at the first
//! point that is farther from the target than its predecessor. Since the
//! distance to a target is unimodal over sorted times this finds the nearest
//! point, and because targets are increasing the cursor never moves back, so
//! a whole pass is linear in the series length.

use crate::data::{ObservedSeries, SamplingConfig, SamplingInterval};

/// Points kept by the uniform log-spaced mode.
pub const DEFAULT_SAMPLE_COUNT: usize = 200;

/// Picks closer together than this in time are considered duplicates.
const DUPLICATE_TOLERANCE: f64 = 1e-9;

/// Replacement for a non-positive lower time when taking logarithms.
const LOG_TIME_FALLBACK: f64 = 1e-4;

/// Reduce `series` according to `config` using [`DEFAULT_SAMPLE_COUNT`] targets.
pub fn sample(series: &ObservedSeries, config: &SamplingConfig) -> ObservedSeries {
    sample_with_count(series, config, DEFAULT_SAMPLE_COUNT)
}

/// Reduce `series` according to `config`.
///
/// In uniform mode series of at most `target_count` points are returned as
/// is. In custom mode each interval contributes up to `count` points; an
/// empty interval list returns the series unchanged.
pub fn sample_with_count(
    series: &ObservedSeries,
    config: &SamplingConfig,
    target_count: usize,
) -> ObservedSeries {
    if series.is_empty() {
        return ObservedSeries::default();
    }

    let times = series.time();
    let mut picks: Vec<usize> = Vec::new();

    if !config.enabled {
        if series.len() <= target_count {
            return series.clone();
        }
        pick_log_spaced(times, 0, times.len(), target_count, &mut picks);
    } else {
        if config.intervals.is_empty() {
            return series.clone();
        }
        for interval in &config.intervals {
            pick_interval(times, interval, &mut picks);
        }
    }

    let mut points: Vec<(f64, f64, f64)> = picks.into_iter().map(|i| series.point(i)).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points.dedup_by(|later, kept| (later.0 - kept.0).abs() < DUPLICATE_TOLERANCE);

    ObservedSeries::from_points(points)
}

fn pick_interval(times: &[f64], interval: &SamplingInterval, picks: &mut Vec<usize>) {
    if interval.count <= 0 {
        return;
    }
    let start = times.partition_point(|&t| t < interval.start);
    let end = times.partition_point(|&t| t <= interval.end);
    if start >= times.len() || start >= end {
        return;
    }
    pick_log_spaced(times, start, end, interval.count as usize, picks);
}

/// Push the indices in `start..end` nearest to `count` log-spaced targets
/// spanning `times[start]..=times[end - 1]`.
fn pick_log_spaced(times: &[f64], start: usize, end: usize, count: usize, picks: &mut Vec<usize>) {
    let mut t_min = times[start];
    if t_min <= 1e-10 {
        t_min = LOG_TIME_FALLBACK;
    }
    let t_max = times[end - 1];

    let log_min = t_min.log10();
    let log_max = t_max.log10();
    let step = if count > 1 {
        (log_max - log_min) / (count - 1) as f64
    } else {
        0.0
    };

    let mut cursor = start;
    for i in 0..count {
        let target = if count == 1 {
            t_min
        } else {
            10f64.powf(log_min + i as f64 * step)
        };

        let mut best = cursor;
        let mut best_diff = f64::INFINITY;
        while cursor < end {
            let diff = (times[cursor] - target).abs();
            if diff < best_diff {
                best_diff = diff;
                best = cursor;
                cursor += 1;
            } else {
                break;
            }
        }
        cursor = best;
        picks.push(best);
    }
}
