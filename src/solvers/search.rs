//! Minimal stage count by integer bisection.
//!
//! The objective `f(N) = outlet(N) - target` is assumed non-increasing in `N`:
//! more stages never strip less. Bisection then needs at most
//! `⌈log₂(n_max - n_min)⌉` midpoint solves after the two bracket solves.

use super::{solve, ConvergenceResult, SimulationError, SimulationResult, SolverParams};
use crate::design::{ChemistrySpec, DesignError, DesignRequest};
use crate::equilibrium::{EngineSession, EquilibriumEngine};
use std::collections::BTreeMap;

/// Result of a stage-count search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Smallest stage count meeting the target
    pub optimal_stages: usize,
    /// Converged profiles at `optimal_stages`
    pub result: ConvergenceResult,
    /// Total inner solves, bracket ends included
    pub evaluations: usize,
    /// Midpoint solves performed by the bisection
    pub bisection_steps: usize,
}

/// Memoized objective over stage counts.
struct Trials<'a, E> {
    session: &'a mut EngineSession<E>,
    request: &'a DesignRequest,
    chemistry: &'a ChemistrySpec,
    params: &'a SolverParams,
    solved: BTreeMap<usize, ConvergenceResult>,
}

impl<E: EquilibriumEngine> Trials<'_, E> {
    /// Outlet concentration achieved with `n` stages.
    fn outlet(&mut self, n: usize) -> SimulationResult<f64> {
        if let Some(result) = self.solved.get(&n) {
            return Ok(result.outlet_concentration());
        }
        let result = solve(self.session, self.request, self.chemistry, n, self.params)?;
        let outlet = result.outlet_concentration();
        self.solved.insert(n, result);
        Ok(outlet)
    }

    fn take(&mut self, n: usize) -> SimulationResult<ConvergenceResult> {
        match self.solved.remove(&n) {
            Some(result) => Ok(result),
            None => solve(self.session, self.request, self.chemistry, n, self.params),
        }
    }
}

/// Finds the smallest stage count in `[n_min, n_max]` whose outlet meets
/// `target_outlet` (mg/L).
///
/// Returns `n_min` without bisecting when it already meets the target, and
/// fails with [`SimulationError::InsufficientStages`] when even `n_max`
/// does not. Any inner solve failure aborts the search.
pub fn find_stages<E: EquilibriumEngine>(
    session: &mut EngineSession<E>,
    request: &DesignRequest,
    chemistry: &ChemistrySpec,
    target_outlet: f64,
    n_min: usize,
    n_max: usize,
    params: &SolverParams,
) -> SimulationResult<SearchOutcome> {
    if n_min < 1 || n_min >= n_max {
        return Err(SimulationError::InvalidStageBracket { n_min, n_max });
    }
    if !(target_outlet.is_finite() && target_outlet >= 0.0) {
        return Err(DesignError::invalid(
            "target_outlet",
            format!("must be non-negative, got {target_outlet}"),
        )
        .into());
    }

    log::info!(
        "Searching stage count in [{}, {}] for outlet <= {:.4e} mg/L",
        n_min,
        n_max,
        target_outlet
    );

    let mut trials = Trials { session, request, chemistry, params, solved: BTreeMap::new() };

    let outlet_min = trials.outlet(n_min)?;
    if outlet_min <= target_outlet {
        log::warn!("N_min={} already meets target. Using N_min.", n_min);
        return Ok(SearchOutcome {
            optimal_stages: n_min,
            result: trials.take(n_min)?,
            evaluations: 1,
            bisection_steps: 0,
        });
    }

    let outlet_max = trials.outlet(n_max)?;
    if outlet_max > target_outlet {
        return Err(SimulationError::InsufficientStages {
            n_max,
            achievable_outlet: outlet_max,
            target_outlet,
        });
    }

    let (mut lo, mut hi) = (n_min, n_max);
    let mut bisection_steps = 0;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        let outlet = trials.outlet(mid)?;
        bisection_steps += 1;
        log::debug!(
            "  Bisection iter {}: N={}, error={:.3e} mg/L",
            bisection_steps,
            mid,
            outlet - target_outlet
        );
        if outlet <= target_outlet {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    log::info!("Optimal stages: N={} (found in {} bisection iterations)", hi, bisection_steps);

    Ok(SearchOutcome {
        optimal_stages: hi,
        result: trials.take(hi)?,
        evaluations: 2 + bisection_steps,
        bisection_steps,
    })
}
