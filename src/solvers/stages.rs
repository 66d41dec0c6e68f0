//! Counter-current stage solver for a fixed number of stages.
//!
//! Liquid flows up from point 0, gas flows down from point `N`. One sweep
//! visits stages `0..N` from the bottom; each stage is equilibrated with the
//! equilibrium engine and then pulled back to partial equilibrium with the
//! Murphree efficiency. Sweeps repeat, damped, until the liquid and gas
//! profiles stop changing.
//!
//! # Sweep details
//!
//! - Liquid entering stage `i` is the liquid leaving stage `i - 1` in the same
//!   sweep; stage 0 always receives the feed.
//! - Gas entering stage `i` is the previous sweep's gas at point `i + 1`; the
//!   top stage receives clean air.
//! - The equilibrium solve is seeded with the pH of the entering liquid.
//! - The top point holds the treated water, handled per [`TopBoundary`].
//!
//! # Mass-consistent Murphree update
//!
//! Applying the efficiency separately to the liquid and the gas breaks the
//! stage mass balance. [`murphree_stage_update`] applies it to the gas only
//! and derives the liquid from what the gas actually picked up.

use super::{SimulationError, SimulationResult, SolverParams, StageProfile, TopBoundary};
use crate::design::{ChemistrySpec, DesignRequest};
use crate::equilibrium::{
    equilibrate, EngineSession, EquilibriumEngine, StageEquilibrium, StageInputs,
};
use crate::mass_balance::{self, MassBalanceReport};
use crate::thermodynamics::molar_gas_to_liquid;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Relative scale of the convergence denominators.
const RELATIVE_EPS: f64 = 1e-6;

/// Outlet state of one stage after partial equilibrium.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTransfer {
    pub liquid_out: f64,
    pub gas_out: f64,
    pub ph_out: f64,
}

/// Applies the Murphree efficiency to a full-equilibrium stage result.
///
/// The gas approaches equilibrium by `efficiency`:
/// `y_out = y_in + E·(y_eq - y_in)`. The liquid then loses exactly what the
/// gas gained, `C_out = C_in - (y_out - y_in)·G/L·MW·1000`, where `G/L` is
/// the molar gas flow per liter of liquid. The pH moves from `ph_in` toward
/// the equilibrium pH by the same fraction. Outlets are clamped at zero.
pub fn murphree_stage_update(
    liquid_in: f64,
    gas_in: f64,
    ph_in: f64,
    equilibrium: &StageEquilibrium,
    efficiency: f64,
    gas_to_liquid: f64,
    molecular_weight: f64,
) -> StageTransfer {
    let gas_out = (gas_in + efficiency * (equilibrium.gas_fraction - gas_in)).max(0.0);
    let transferred = (gas_out - gas_in) * gas_to_liquid * molecular_weight * 1000.0;
    let liquid_out = (liquid_in - transferred).max(0.0);
    let ph_out = ph_in + efficiency * (equilibrium.ph - ph_in);
    StageTransfer { liquid_out, gas_out, ph_out }
}

/// Record of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationInfo {
    pub iteration: usize,
    /// Largest relative change of the liquid profile
    pub liquid_change: f64,
    /// Largest relative change of the gas profile
    pub gas_change: f64,
}

impl IterationInfo {
    pub fn max_change(&self) -> f64 {
        self.liquid_change.max(self.gas_change)
    }
}

/// Converged profiles of one inner solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceResult {
    pub profile: StageProfile,
    pub iterations: usize,
    pub converged: bool,
    pub final_change: f64,
    pub iteration_history: Vec<IterationInfo>,
    pub mass_balance: Option<MassBalanceReport>,
}

impl ConvergenceResult {
    pub fn n_stages(&self) -> usize {
        self.profile.n_stages()
    }

    pub fn outlet_concentration(&self) -> f64 {
        self.profile.outlet_concentration()
    }

    /// Attaches a mass-balance check of the converged profiles.
    pub fn with_mass_balance(
        mut self,
        request: &DesignRequest,
        chemistry: &ChemistrySpec,
        tolerance: f64,
    ) -> Self {
        self.mass_balance = Some(mass_balance::validate_with_tolerance(
            request,
            chemistry,
            &self.profile.liquid,
            &self.profile.gas,
            tolerance,
        ));
        self
    }
}

/// Largest relative change between two profiles.
fn max_relative_change(new: &DVector<f64>, old: &DVector<f64>, eps: f64) -> f64 {
    new.zip_map(old, |n, o| (n - o).abs() / (o.abs() + eps)).max()
}

/// Solves the counter-current profiles of a column with `n_stages`.
///
/// Fails with [`SimulationError::ConvergenceFailure`] when `max_iterations`
/// sweeps do not bring the largest relative change below `tolerance`.
pub fn solve<E: EquilibriumEngine>(
    session: &mut EngineSession<E>,
    request: &DesignRequest,
    chemistry: &ChemistrySpec,
    n_stages: usize,
    params: &SolverParams,
) -> SimulationResult<ConvergenceResult> {
    request.validate()?;
    chemistry.validate()?;
    params.validate()?;
    let mut profile = StageProfile::initialize(request, chemistry, n_stages)?;

    let background = request.background();
    let engine = session.engine()?;
    let n = n_stages;
    let inlet = request.inlet_concentration_mg_l;
    let feed_ph = request.feed_ph();
    let efficiency = params.murphree_efficiency;
    let damping = params.damping_for(n);
    let gas_to_liquid = molar_gas_to_liquid(request.air_water_ratio, request.temperature_k());
    let liquid_eps = (RELATIVE_EPS * inlet).max(f64::MIN_POSITIVE);

    log::info!(
        "Solving {} stages: A/W ratio {:.1}, efficiency {:.2}, damping {:.2}",
        n,
        request.air_water_ratio,
        efficiency,
        damping
    );

    let mut history = Vec::new();
    for iteration in 1..=params.max_iterations {
        let old = profile.clone();
        let mut liquid = old.liquid.clone();
        let mut gas = old.gas.clone();
        let mut ph = old.ph.clone();

        for i in 0..n {
            let (liquid_in, ph_in) =
                if i == 0 { (inlet, feed_ph) } else { (liquid[i - 1], ph[i - 1]) };
            let gas_in = if i + 1 == n { 0.0 } else { old.gas[i + 1] };

            let inputs = StageInputs {
                liquid_conc_mg_l: liquid_in,
                gas_fraction: gas_in,
                ph_guess: ph_in,
                temperature_c: request.temperature_c,
                air_water_ratio: request.air_water_ratio,
            };
            let equilibrium = equilibrate(&mut *engine, &inputs, chemistry, &background)?;
            let transfer = murphree_stage_update(
                liquid_in,
                gas_in,
                ph_in,
                &equilibrium,
                efficiency,
                gas_to_liquid,
                chemistry.molecular_weight,
            );

            liquid[i] = transfer.liquid_out;
            gas[i] = transfer.gas_out;
            ph[i] = transfer.ph_out;
        }

        if params.top_boundary == TopBoundary::Carried {
            liquid[n] = liquid[n - 1];
            ph[n] = ph[n - 1];
        }
        gas[n] = 0.0;

        profile.liquid = &liquid * damping + &old.liquid * (1.0 - damping);
        profile.gas = &gas * damping + &old.gas * (1.0 - damping);
        profile.ph = &ph * damping + &old.ph * (1.0 - damping);

        let gas_eps = (RELATIVE_EPS * old.gas.amax()).max(f64::MIN_POSITIVE);
        let info = IterationInfo {
            iteration,
            liquid_change: max_relative_change(&profile.liquid, &old.liquid, liquid_eps),
            gas_change: max_relative_change(&profile.gas, &old.gas, gas_eps),
        };
        history.push(info);

        log::debug!(
            "  Iteration {}: error_C={:.4e}, error_y={:.4e}",
            iteration,
            info.liquid_change,
            info.gas_change
        );

        if info.max_change() < params.tolerance {
            log::info!(
                "Converged in {} iterations (error={:.2e}), outlet {:.4e} mg/L",
                iteration,
                info.max_change(),
                profile.outlet_concentration()
            );
            return Ok(ConvergenceResult {
                profile,
                iterations: iteration,
                converged: true,
                final_change: info.max_change(),
                iteration_history: history,
                mass_balance: None,
            });
        }
    }

    let max_change = history.last().map_or(f64::INFINITY, IterationInfo::max_change);
    Err(SimulationError::ConvergenceFailure {
        n_stages: n,
        iterations: params.max_iterations,
        max_change,
    })
}
