//! Numerical core: profile initialization, counter-current sweeps and the
//! stage-count search.
//!
//! # Structure
//!
//! - [`profile`]: the [`StageProfile`] state and its closed-form initial guess
//! - [`stages`]: the inner fixed-point loop for a fixed stage count
//! - [`search`]: integer bisection over the stage count
//!
//! # Configuration
//!
//! All solver knobs live in [`SolverParams`], built the usual way:
//!
//! ```
//! use degasser::solvers::{SolverParams, TopBoundary};
//!
//! let params = SolverParams::new()
//!     .with_tolerance(1e-3)
//!     .with_max_iterations(5000)
//!     .with_murphree_efficiency(0.75)
//!     .with_top_boundary(TopBoundary::HeldAtSeed);
//! assert!(params.validate().is_ok());
//! assert_eq!(params.damping_for(80), 0.3);
//! ```
//!
//! Parameters can also be read from JSON; omitted fields take their defaults.

pub mod profile;
pub mod search;
pub mod stages;

pub use profile::StageProfile;
pub use search::{find_stages, SearchOutcome};
pub use stages::{murphree_stage_update, solve, ConvergenceResult, IterationInfo, StageTransfer};

use crate::design::{require_positive, DesignError};
use crate::equilibrium::EngineError;
use serde::{Deserialize, Serialize};

/// Result type for simulation operations.
pub type SimulationResult<T> = Result<T, SimulationError>;

/// Errors that abort a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(
        "Counter-current solve with {n_stages} stages did not converge after {iterations} \
         iterations (max relative change: {max_change:.3e})"
    )]
    ConvergenceFailure { n_stages: usize, iterations: usize, max_change: f64 },

    #[error(
        "Target outlet {target_outlet:.4e} mg/L is not reachable with {n_max} stages \
         (achievable: {achievable_outlet:.4e} mg/L)"
    )]
    InsufficientStages { n_max: usize, achievable_outlet: f64, target_outlet: f64 },

    #[error("Invalid stage bracket [{n_min}, {n_max}]: need 1 <= n_min < n_max")]
    InvalidStageBracket { n_min: usize, n_max: usize },

    #[error(transparent)]
    Design(#[from] DesignError),

    #[error("Equilibrium engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Treatment of the liquid exit point at the top of the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopBoundary {
    /// Liquid and pH at the exit are those leaving the topmost stage.
    ///
    /// Default. Holding the seed would pin the outlet at the target and leave
    /// the stage search nothing to measure.
    Carried,
    /// Liquid and pH at the exit stay at their seed values.
    HeldAtSeed,
}

/// Parameters of the inner fixed-point loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Maximum relative profile change accepted as converged
    pub tolerance: f64,
    /// Maximum sweeps before the solve is declared failed
    pub max_iterations: usize,
    /// Fraction of full equilibrium reached per stage, in (0, 1]
    pub murphree_efficiency: f64,
    /// Fixed damping factor; chosen from the stage count when `None`
    pub damping: Option<f64>,
    pub top_boundary: TopBoundary,
    /// Relative error accepted by the mass-balance check
    pub mass_balance_tolerance: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            tolerance: 0.01,
            max_iterations: 2000,
            murphree_efficiency: 0.85,
            damping: None,
            top_boundary: TopBoundary::Carried,
            mass_balance_tolerance: crate::mass_balance::DEFAULT_MASS_BALANCE_TOLERANCE,
        }
    }
}

impl SolverParams {
    /// Creates parameters with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the maximum number of sweeps.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the Murphree stage efficiency.
    pub fn with_murphree_efficiency(mut self, efficiency: f64) -> Self {
        self.murphree_efficiency = efficiency;
        self
    }

    /// Fixes the damping factor instead of choosing it from the stage count.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = Some(damping);
        self
    }

    pub fn with_top_boundary(mut self, boundary: TopBoundary) -> Self {
        self.top_boundary = boundary;
        self
    }

    pub fn with_mass_balance_tolerance(mut self, tolerance: f64) -> Self {
        self.mass_balance_tolerance = tolerance;
        self
    }

    /// Damping factor for a column of `n_stages`.
    ///
    /// Tall columns oscillate more easily, so they get a smaller step.
    pub fn damping_for(&self, n_stages: usize) -> f64 {
        self.damping.unwrap_or(if n_stages > 50 { 0.3 } else { 0.5 })
    }

    pub fn validate(&self) -> Result<(), DesignError> {
        require_positive("tolerance", self.tolerance)?;
        require_positive("mass_balance_tolerance", self.mass_balance_tolerance)?;
        if self.max_iterations == 0 {
            return Err(DesignError::invalid("max_iterations", "must be at least 1"));
        }
        let efficiency = self.murphree_efficiency;
        if !(efficiency > 0.0 && efficiency <= 1.0) {
            return Err(DesignError::invalid(
                "murphree_efficiency",
                format!("{efficiency} is outside (0, 1]"),
            ));
        }
        if let Some(damping) = self.damping {
            if !(damping > 0.0 && damping <= 1.0) {
                return Err(DesignError::invalid("damping", format!("{damping} is outside (0, 1]")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = SolverParams::default();
        assert_eq!(params.tolerance, 0.01);
        assert_eq!(params.murphree_efficiency, 0.85);
        assert_eq!(params.top_boundary, TopBoundary::Carried);
        assert_eq!(params.damping_for(50), 0.5);
        assert_eq!(params.damping_for(51), 0.3);
        assert_eq!(params.with_damping(0.7).damping_for(100), 0.7);
    }

    #[test]
    fn test_invalid_params() {
        assert!(SolverParams::new().with_murphree_efficiency(0.0).validate().is_err());
        assert!(SolverParams::new().with_murphree_efficiency(1.2).validate().is_err());
        assert!(SolverParams::new().with_murphree_efficiency(1.0).validate().is_ok());
        assert!(SolverParams::new().with_damping(0.0).validate().is_err());
        assert!(SolverParams::new().with_tolerance(-1.0).validate().is_err());
        assert!(SolverParams::new().with_max_iterations(0).validate().is_err());
    }

    #[test]
    fn test_params_from_json() {
        let params: SolverParams =
            serde_json::from_str(r#"{"tolerance": 0.001, "top_boundary": "HeldAtSeed"}"#).unwrap();
        assert_eq!(params.tolerance, 0.001);
        assert_eq!(params.top_boundary, TopBoundary::HeldAtSeed);
        assert_eq!(params.max_iterations, 2000);
    }

    #[test]
    fn test_error_display() {
        let err = SimulationError::InvalidStageBracket { n_min: 10, n_max: 5 };
        assert_eq!(err.to_string(), "Invalid stage bracket [10, 5]: need 1 <= n_min < n_max");

        let err =
            SimulationError::ConvergenceFailure { n_stages: 12, iterations: 50, max_change: 0.5 };
        assert!(err.to_string().contains("did not converge after 50 iterations"));
    }
}
