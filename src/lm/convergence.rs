//! Termination states of a fit run.

use serde::{Deserialize, Serialize};

/// Why a fit run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Nothing was selected for fitting; the run ended before iterating.
    NoFreeParameters,

    /// The mean squared residual dropped below the convergence threshold.
    Converged,

    /// The cancellation flag was observed.
    StoppedByUser,

    /// The iteration budget ran out.
    MaxIterationsReached,

    /// No trial step was accepted and the damping factor saturated.
    Stalled,
}

impl TerminationReason {
    /// Returns true if the run counts as converged.
    ///
    /// An empty fit is trivially converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            TerminationReason::Converged | TerminationReason::NoFreeParameters
        )
    }

    /// Returns a description of the termination reason.
    pub fn description(&self) -> &'static str {
        match self {
            TerminationReason::NoFreeParameters => "No parameters selected for fitting",
            TerminationReason::Converged => "Converged: mean squared residual below threshold",
            TerminationReason::StoppedByUser => "Stopped by user",
            TerminationReason::MaxIterationsReached => "Maximum number of iterations reached",
            TerminationReason::Stalled => "Stalled: damping saturated without an accepted step",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}
