//! Stage profiles and their initial guess.
//!
//! Points are numbered from the bottom: point 0 is where the feed water
//! enters (and the enriched gas leaves), point `N` is where the treated water
//! leaves (and clean air enters).

use super::SimulationResult;
use crate::design::{ChemistrySpec, DesignError, DesignRequest};
use crate::thermodynamics::equilibrium_gas_fraction;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Liquid, gas and pH values at the `N + 1` points of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProfile {
    /// Liquid concentration (mg/L)
    pub liquid: DVector<f64>,
    /// Contaminant mole fraction in the gas
    pub gas: DVector<f64>,
    pub ph: DVector<f64>,
}

impl StageProfile {
    /// Closed-form initial guess for a column of `n_stages`.
    ///
    /// The liquid runs linearly from inlet to target outlet; the gas is in
    /// Henry's-law equilibrium with it at the feed pH, except at the top where
    /// clean air enters; the pH is the feed pH everywhere.
    pub fn initialize(
        request: &DesignRequest,
        chemistry: &ChemistrySpec,
        n_stages: usize,
    ) -> SimulationResult<Self> {
        if n_stages < 1 {
            let reason = "a column needs at least one stage";
            return Err(DesignError::invalid("n_stages", reason).into());
        }

        let feed_ph = request.feed_ph();
        let alpha0 = chemistry.application.strippable_fraction(feed_ph);
        let henry_eff = chemistry.henry_constant * alpha0;
        let temperature_k = request.temperature_k();

        let inlet = request.inlet_concentration_mg_l;
        let outlet = request.outlet_concentration_mg_l;
        let step = (outlet - inlet) / n_stages as f64;
        let liquid = DVector::from_fn(n_stages + 1, |i, _| inlet + step * i as f64);

        let mut gas = liquid.map(|c| {
            equilibrium_gas_fraction(henry_eff, c, chemistry.molecular_weight, temperature_k)
                .max(0.0)
        });
        gas[n_stages] = 0.0;

        Ok(StageProfile { liquid, gas, ph: DVector::from_element(n_stages + 1, feed_ph) })
    }

    /// Number of theoretical stages.
    pub fn n_stages(&self) -> usize {
        self.liquid.len() - 1
    }

    /// Liquid concentration leaving the top of the column.
    pub fn outlet_concentration(&self) -> f64 {
        self.liquid[self.n_stages()]
    }

    /// Gas mole fraction leaving the bottom of the column.
    pub fn exit_gas_fraction(&self) -> f64 {
        self.gas[0]
    }

    /// True when the liquid never gains contaminant on its way up.
    pub fn is_liquid_non_increasing(&self) -> bool {
        self.liquid.as_slice().windows(2).all(|w| w[1] <= w[0])
    }

    /// True when no concentration or gas fraction is negative.
    pub fn is_non_negative(&self) -> bool {
        self.liquid.iter().chain(self.gas.iter()).all(|&v| v >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::Application;
    use crate::solvers::SimulationError;
    use approx::assert_relative_eq;

    #[test]
    fn test_initial_profile_shape() {
        let request = DesignRequest::new(Application::VOC, 100.0, 10.0, 1.0, 30.0).with_ph(7.0);
        let chemistry = ChemistrySpec::for_application(Application::VOC);

        let profile = StageProfile::initialize(&request, &chemistry, 9).unwrap();

        assert_eq!(profile.n_stages(), 9);
        assert_eq!(profile.gas.len(), 10);
        assert_relative_eq!(profile.liquid[0], 10.0);
        assert_relative_eq!(profile.liquid[5], 5.0);
        assert_relative_eq!(profile.outlet_concentration(), 1.0);
        assert_eq!(profile.gas[9], 0.0);
        assert!(profile.ph.iter().all(|&ph| ph == 7.0));
        assert!(profile.is_liquid_non_increasing());

        let expected = equilibrium_gas_fraction(8.59, 10.0, 131.388, 298.15);
        assert_relative_eq!(profile.exit_gas_fraction(), expected);
    }

    #[test]
    fn test_initial_gas_uses_strippable_fraction() {
        // At pH 8 only about 9% of sulfide is H2S
        let request = DesignRequest::new(Application::H2S, 50.0, 20.0, 0.5, 40.0).with_ph(8.0);
        let chemistry = ChemistrySpec::for_application(Application::H2S);

        let profile = StageProfile::initialize(&request, &chemistry, 20).unwrap();

        let full = equilibrium_gas_fraction(0.41, 20.0, 34.08, 298.15);
        assert_relative_eq!(profile.gas[0], full / 11.0, max_relative = 1e-9);
    }

    #[test]
    fn test_zero_stages_rejected() {
        let request = DesignRequest::new(Application::VOC, 100.0, 10.0, 1.0, 30.0);
        let chemistry = ChemistrySpec::for_application(Application::VOC);
        assert!(matches!(
            StageProfile::initialize(&request, &chemistry, 0),
            Err(SimulationError::Design(_))
        ));
    }
}
