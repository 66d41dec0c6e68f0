//! # Degasser: Staged Simulation of Packed-Tower Strippers
//!
//! Converts a target contaminant removal into a theoretical stage count and a
//! packed height for a counter-current air stripper, with the liquid pH
//! coupled to the stripping at every stage.
//!
//! The crate picks up where a heuristic sizing tier stops: it takes the
//! [`Tier1Outcome`] (duty, chemistry constants, rough tower dimensions) and
//! runs a staged equilibrium model on it.
//!
//! ## Structure
//!
//! - [`design`]: immutable inputs ([`DesignRequest`], [`ChemistrySpec`], Tier 1 estimate)
//! - [`water`]: background ion composition and its templates
//! - [`thermodynamics`]: constants, speciation and Henry's law corrections
//! - [`equilibrium`]: the equilibrium engine contract, its session and the
//!   per-stage adapter, plus a reference [`IdealSolutionEngine`]
//! - [`solvers`]: profile initialization, the counter-current sweep and the
//!   stage-count bisection
//! - [`mass_balance`]: global conservation check of a converged column
//! - [`height`]: stages to packed height
//! - [`simulation`]: the orchestrator producing a [`SimulationReport`]
//!
//! ## Example
//!
//! ```
//! use degasser::{
//!     staged_column_simulation, Application, ChemistrySpec, DesignRequest, EngineSession,
//!     PackingKind, SimulationOptions, Tier1Estimate, Tier1Outcome,
//! };
//!
//! // TCE at 10 mg/L down to 1 mg/L with an air/water ratio of 30
//! let request = DesignRequest::new(Application::VOC, 100.0, 10.0, 1.0, 30.0).with_ph(7.0);
//! let tier1 = Tier1Outcome::new(
//!     request,
//!     ChemistrySpec::for_application(Application::VOC),
//!     Tier1Estimate::new(4.0, 1.5, PackingKind::Structured).with_htu(0.45),
//! );
//!
//! // The engine is built on first use and reused across every stage call
//! let mut session = EngineSession::ideal();
//! let options = SimulationOptions::new().with_stage_search(1, 20);
//! let report = staged_column_simulation(&mut session, &tier1, &options).unwrap();
//!
//! assert!(report.meets_target());
//! assert!(report.profiles.liquid_mg_l[0] > report.outlet_concentration_mg_l);
//! ```
//!
//! ## Logging
//!
//! Progress goes through the [`log`] facade: `info` for each solve and search
//! result, `debug` for every sweep and bisection step, `warn` for fallbacks
//! and failed mass balances. Install any logger to see it.

pub mod autodiff;
pub mod design;
pub mod equilibrium;
pub mod height;
pub mod mass_balance;
pub mod simulation;
pub mod solvers;
pub mod thermodynamics;
pub mod water;

pub use design::{
    Application, ChemistrySpec, DesignError, DesignRequest, PackingKind, Tier1Estimate,
    Tier1Outcome,
};
pub use equilibrium::{
    equilibrate, EngineError, EngineSession, EquilibriumEngine, IdealSolutionEngine,
    PhaseDatabase,
};
pub use height::{to_height, HeightEstimate};
pub use mass_balance::MassBalanceReport;
pub use simulation::{
    staged_column_simulation, ConfidenceLevel, DesignWarning, SimulationOptions,
    SimulationReport, StageMode,
};
pub use solvers::{
    find_stages, solve, ConvergenceResult, SimulationError, SimulationResult, SolverParams,
    StageProfile,
};
pub use water::BackgroundWater;
