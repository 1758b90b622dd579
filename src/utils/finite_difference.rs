//! Finite difference methods for numerical differentiation.
//!
//! This module computes the Jacobian of a [`Problem`] with respect to its
//! free parameters using central differences. Each parameter is perturbed on
//! its own scale (see [`ScalePolicy`]): log-scale parameters are moved by
//! `±h` in log10 space, so the resulting column is `∂r/∂log10(p)`, which is
//! exactly the coordinate the optimizer steps in.

use crate::parameters::{ConstraintRepairer, FreeParameter, ParameterScale, ParameterSet, ScalePolicy};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Step sizes for the central differences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferenceSteps {
    /// Step in log10 space for log-scale parameters. Default: 0.01
    pub log10: f64,

    /// Step in raw units for linear-scale parameters. Default: 1e-4
    pub linear: f64,
}

impl Default for DifferenceSteps {
    fn default() -> Self {
        Self {
            log10: 0.01,
            linear: 1e-4,
        }
    }
}

impl DifferenceSteps {
    fn for_scale(&self, scale: ParameterScale) -> f64 {
        match scale {
            ParameterScale::Log => self.log10,
            ParameterScale::Linear => self.linear,
        }
    }
}

/// Everything that shapes a Jacobian column apart from the problem itself.
#[derive(Debug, Clone, Copy)]
pub struct JacobianContext<'a> {
    pub free: &'a [FreeParameter],
    pub scales: &'a ScalePolicy,
    pub steps: DifferenceSteps,
    pub repairer: &'a ConstraintRepairer,
}

/// Compute the Jacobian matrix using central finite differences.
///
/// The result has one row per entry of the base residual vector (of length
/// `n_residuals`) and one column per free parameter:
/// `J[i,j] = (r⁺[i] - r⁻[i]) / 2h`.
///
/// After a parameter is perturbed, derived parameters depending on it are
/// recomputed in both trial sets. A column whose perturbed evaluations fail
/// or return a residual vector of the wrong length is left at zero.
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `n_residuals` - Length of the residual vector at `params`
/// * `ctx` - Free parameters, scales, steps and derived-parameter rules
pub fn jacobian<P: Problem + ?Sized>(
    problem: &P,
    params: &ParameterSet,
    n_residuals: usize,
    ctx: &JacobianContext<'_>,
) -> Array2<f64> {
    let mut jac = Array2::zeros((n_residuals, ctx.free.len()));
    for (j, free) in ctx.free.iter().enumerate() {
        if let Some(column) = column(problem, params, n_residuals, free, ctx) {
            jac.column_mut(j).assign(&column);
        }
    }
    jac
}

/// Compute the Jacobian matrix using central finite differences in parallel.
///
/// Same result as [`jacobian`], with the columns evaluated on the rayon
/// thread pool. The problem (and so the forward model) must tolerate
/// concurrent evaluation.
#[cfg(feature = "parallel")]
pub fn jacobian_parallel<P: Problem + Sync + ?Sized>(
    problem: &P,
    params: &ParameterSet,
    n_residuals: usize,
    ctx: &JacobianContext<'_>,
) -> Array2<f64> {
    use rayon::prelude::*;

    let columns: Vec<Option<Array1<f64>>> = ctx
        .free
        .par_iter()
        .map(|free| column(problem, params, n_residuals, free, ctx))
        .collect();

    let mut jac = Array2::zeros((n_residuals, ctx.free.len()));
    for (j, column) in columns.into_iter().enumerate() {
        if let Some(column) = column {
            jac.column_mut(j).assign(&column);
        }
    }
    jac
}

fn column<P: Problem + ?Sized>(
    problem: &P,
    params: &ParameterSet,
    n_residuals: usize,
    free: &FreeParameter,
    ctx: &JacobianContext<'_>,
) -> Option<Array1<f64>> {
    let name = free.name.as_str();
    let value = match params.get(name) {
        Some(v) => v,
        None => {
            log::debug!("jacobian: '{}' missing from parameter map, column left at zero", name);
            return None;
        }
    };

    let scale = ctx.scales.scale_of(name, value);
    let h = ctx.steps.for_scale(scale);

    let mut plus = params.clone();
    let mut minus = params.clone();
    plus.set(name, scale.apply(value, h));
    minus.set(name, scale.apply(value, -h));
    ctx.repairer.update_derived_for(name, &mut plus);
    ctx.repairer.update_derived_for(name, &mut minus);

    let (r_plus, r_minus) = match (problem.eval(&plus), problem.eval(&minus)) {
        (Ok(p), Ok(m)) => (p, m),
        (Err(e), _) | (_, Err(e)) => {
            log::debug!("jacobian: evaluation for '{}' failed ({}), column left at zero", name, e);
            return None;
        }
    };

    if r_plus.len() != n_residuals || r_minus.len() != n_residuals {
        log::debug!(
            "jacobian: residual length mismatch for '{}' ({} / {} vs {}), column left at zero",
            name,
            r_plus.len(),
            r_minus.len(),
            n_residuals
        );
        return None;
    }

    Some((r_plus - r_minus) / (2.0 * h))
}
