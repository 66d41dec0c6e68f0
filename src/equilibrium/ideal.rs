//! Ideal-solution reference engine.
//!
//! A compact equilibrium engine that satisfies the [`EquilibriumEngine`]
//! contract without an external library. It treats activities as
//! concentrations and models:
//!
//! - acid-base speciation of the contaminant (neutral, monoprotic or diprotic)
//! - a background of strong ions plus carbonate alkalinity
//! - water dissociation at 25 °C
//! - partitioning of one volatile phase between one liter of solution and a
//!   gas envelope at fixed total pressure, with the gas volume floating
//!
//! # Charge conservation
//!
//! When a solution is created at a given pH, the residual charge imbalance of
//! the ideal speciation at that pH is recorded. Equilibration then solves for
//! the pH that restores exactly that imbalance, so stripping an acid gas
//! raises the pH the same way it does in a real buffered water.
//!
//! # Partitioning
//!
//! For a fixed pH the contaminant split between liquid and gas has a closed
//! form. With `n₂` moles of carrier, `T` total contaminant moles and
//! `k = H·α₀·R·T/P`, the gas-side moles `g` satisfy
//! `g = k·(n₂ + g)·(T - g)`, whose positive root is evaluated in the
//! cancellation-free form `g = 2k·n₂·T / (b + √(b² + 4k²·n₂·T))` with
//! `b = 1 + k·(n₂ - T)`.

use super::{
    EngineError, EngineResult, EquilibriumEngine, GasId, GasMoles, GasPressures, GasSpec,
    SolutionId, SolutionSpec,
};
use crate::autodiff::BracketedNewton;
use crate::thermodynamics::{
    celsius_to_kelvin, henry_at_temperature, henry_from_log_k, hydrogen_activity, AcidBase, KW,
    R_L_ATM, T_REF_K,
};
use num_dual::{Dual64, DualNum};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Component name of dissolved inorganic carbon.
pub const CARBONATE_COMPONENT: &str = "C(4)";

const CARBONATE: AcidBase = AcidBase::Diprotic { pka1: 6.35, pka2: 10.33 };

const KCAL_TO_J: f64 = 4184.0;

/// Largest gas/solution temperature difference accepted by `interact` (K).
const TEMPERATURE_MATCH_K: f64 = 1e-6;

/// A volatile contaminant known to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDefinition {
    pub gas_phase: String,
    pub aqueous_species: String,
    pub component: String,
    /// Dimensionless Henry's constant at 25 °C
    pub henry_25c: f64,
    /// Volatilization enthalpy (J/mol) for the van't Hoff correction
    pub volatilization_enthalpy: Option<f64>,
    pub molecular_weight: f64,
    pub acid_base: AcidBase,
}

impl PhaseDefinition {
    /// A non-dissociating contaminant.
    pub fn neutral(
        gas_phase: &str,
        aqueous_species: &str,
        component: &str,
        henry_25c: f64,
        molecular_weight: f64,
    ) -> Self {
        PhaseDefinition {
            gas_phase: gas_phase.to_string(),
            aqueous_species: aqueous_species.to_string(),
            component: component.to_string(),
            henry_25c,
            volatilization_enthalpy: None,
            molecular_weight,
            acid_base: AcidBase::Neutral,
        }
    }

    /// Builds a definition from a solubility constant `log_k` (mol/(L·atm)).
    ///
    /// `delta_h_kcal` is the dissolution enthalpy in kcal/mol as tabulated
    /// for `gas = aq`; its negative is the volatilization enthalpy.
    pub fn from_log_k(
        gas_phase: &str,
        aqueous_species: &str,
        component: &str,
        log_k: f64,
        delta_h_kcal: Option<f64>,
        molecular_weight: f64,
        acid_base: AcidBase,
    ) -> Self {
        PhaseDefinition {
            gas_phase: gas_phase.to_string(),
            aqueous_species: aqueous_species.to_string(),
            component: component.to_string(),
            henry_25c: henry_from_log_k(log_k, T_REF_K),
            volatilization_enthalpy: delta_h_kcal.map(|dh| -dh * KCAL_TO_J),
            molecular_weight,
            acid_base,
        }
    }

    /// Henry's constant at a temperature in K.
    pub fn henry_at(&self, temperature_k: f64) -> f64 {
        henry_at_temperature(self.henry_25c, self.volatilization_enthalpy, temperature_k)
    }
}

/// Phase definitions loaded into an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseDatabase {
    phases: Vec<PhaseDefinition>,
    inert: Vec<String>,
}

impl Default for PhaseDatabase {
    fn default() -> Self {
        PhaseDatabase {
            phases: vec![
                PhaseDefinition::from_log_k(
                    "TCE(g)",
                    "Tce",
                    "Tce",
                    -2.322559,
                    None,
                    131.388,
                    AcidBase::Neutral,
                ),
                PhaseDefinition::from_log_k(
                    "CCl4(g)",
                    "Ct",
                    "Ct",
                    -2.391164,
                    None,
                    153.823,
                    AcidBase::Neutral,
                ),
                PhaseDefinition::from_log_k(
                    "H2S(g)",
                    "H2S",
                    "S(-2)",
                    -0.997,
                    Some(-4.570),
                    34.08,
                    AcidBase::Monoprotic { pka: 7.0 },
                ),
                PhaseDefinition::from_log_k(
                    "CO2(g)",
                    "CO2",
                    CARBONATE_COMPONENT,
                    -1.468,
                    Some(-4.776),
                    44.01,
                    CARBONATE,
                ),
            ],
            inert: vec!["N2(g)".to_string(), "O2(g)".to_string()],
        }
    }
}

impl PhaseDatabase {
    /// Adds a phase, replacing any definition with the same gas phase name.
    pub fn register(&mut self, phase: PhaseDefinition) {
        match self.phases.iter_mut().find(|p| p.gas_phase == phase.gas_phase) {
            Some(existing) => *existing = phase,
            None => self.phases.push(phase),
        }
    }

    pub fn with_phase(mut self, phase: PhaseDefinition) -> Self {
        self.register(phase);
        self
    }

    pub fn phases(&self) -> &[PhaseDefinition] {
        &self.phases
    }

    fn by_species(&self, species: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.aqueous_species == species)
    }

    fn by_gas_phase(&self, gas_phase: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.gas_phase == gas_phase)
    }

    fn is_inert(&self, gas_phase: &str) -> bool {
        self.inert.iter().any(|g| g == gas_phase)
    }

    fn knows_component(&self, component: &str) -> bool {
        component == CARBONATE_COMPONENT || self.phases.iter().any(|p| p.component == component)
    }
}

#[derive(Debug, Clone, Copy)]
struct Dissolved {
    phase: usize,
    /// mol/L
    total: f64,
}

#[derive(Debug, Clone)]
struct SolutionState {
    temperature_k: f64,
    ph: f64,
    /// Net charge of non-carbonate background ions (eq/L)
    strong_charge: f64,
    /// Background inorganic carbon, held in solution (mol/L)
    carbonate: f64,
    dissolved: Dissolved,
    /// Residual of the ideal charge balance at creation
    charge_imbalance: f64,
}

#[derive(Debug, Clone)]
struct GasState {
    temperature_k: f64,
    pressure_atm: f64,
    volume_l: f64,
    moles: BTreeMap<String, f64>,
}

/// Ideal-solution equilibrium engine.
#[derive(Debug, Clone)]
pub struct IdealSolutionEngine {
    database: PhaseDatabase,
    solutions: HashMap<u64, SolutionState>,
    gases: HashMap<u64, GasState>,
    next_id: u64,
    ph_solver: BracketedNewton,
}

impl Default for IdealSolutionEngine {
    fn default() -> Self {
        Self::new(PhaseDatabase::default())
    }
}

impl IdealSolutionEngine {
    pub fn new(database: PhaseDatabase) -> Self {
        IdealSolutionEngine {
            database,
            solutions: HashMap::new(),
            gases: HashMap::new(),
            next_id: 1,
            ph_solver: BracketedNewton::new(1e-10, 100),
        }
    }

    pub fn database(&self) -> &PhaseDatabase {
        &self.database
    }

    /// Current volume of a gas phase (L).
    pub fn gas_volume(&self, gas: GasId) -> EngineResult<f64> {
        self.gases.get(&gas.0).map(|state| state.volume_l).ok_or(EngineError::UnknownGas(gas))
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Ideal charge balance of a solution at `ph` with `dissolved` mol/L of
    /// the contaminant.
    fn charge(&self, state: &SolutionState, ph: Dual64, dissolved: Dual64) -> Dual64 {
        let h = hydrogen_activity(ph);
        let (_, carbonate_charge) = CARBONATE.fractions(ph);
        let (_, contaminant_charge) =
            self.database.phases[state.dissolved.phase].acid_base.fractions(ph);
        h - h.recip() * KW + state.strong_charge
            - carbonate_charge * state.carbonate
            - contaminant_charge * dissolved
    }
}

/// Moles of contaminant in the gas after partitioning at fixed pH.
fn partitioned_moles(k: Dual64, carrier: f64, total: f64) -> Dual64 {
    if total <= 0.0 {
        return Dual64::from(0.0);
    }
    let b = k * (carrier - total) + 1.0;
    let disc = (b * b + k * k * (4.0 * carrier * total)).sqrt();
    k * (2.0 * carrier * total) / (b + disc)
}

impl EquilibriumEngine for IdealSolutionEngine {
    fn add_solution(&mut self, spec: &SolutionSpec<'_>) -> EngineResult<SolutionId> {
        if !(0.0..=14.0).contains(&spec.ph) {
            return Err(EngineError::NonPhysical(format!("solution pH {}", spec.ph)));
        }
        if !(spec.concentration_mg_l.is_finite() && spec.concentration_mg_l >= 0.0) {
            return Err(EngineError::NonPhysical(format!(
                "concentration {} mg/L",
                spec.concentration_mg_l
            )));
        }
        if !(spec.molecular_weight.is_finite() && spec.molecular_weight > 0.0) {
            return Err(EngineError::NonPhysical(format!(
                "formula weight {} g/mol",
                spec.molecular_weight
            )));
        }
        let phase = self
            .database
            .by_species(spec.species)
            .ok_or_else(|| EngineError::UnknownSpecies(spec.species.to_string()))?;
        let definition = &self.database.phases[phase];

        // Inorganic carbon from alkalinity unless the contaminant is carbon itself
        let carbonate = if definition.component == CARBONATE_COMPONENT {
            0.0
        } else {
            let h = 10f64.powf(-spec.ph);
            let per_mole = CARBONATE.charge_per_mole(spec.ph);
            let alkalinity = spec.background.carbonate_alkalinity();
            if per_mole > 0.0 {
                ((alkalinity - KW / h + h) / per_mole).max(0.0)
            } else {
                0.0
            }
        };

        let mut state = SolutionState {
            temperature_k: celsius_to_kelvin(spec.temperature_c),
            ph: spec.ph,
            strong_charge: spec.background.strong_ion_charge(),
            carbonate,
            dissolved: Dissolved {
                phase,
                total: spec.concentration_mg_l / (spec.molecular_weight * 1000.0),
            },
            charge_imbalance: 0.0,
        };
        state.charge_imbalance = self
            .charge(&state, Dual64::from(spec.ph), Dual64::from(state.dissolved.total))
            .re;

        let id = self.next_handle();
        self.solutions.insert(id, state);
        Ok(SolutionId(id))
    }

    fn add_gas(&mut self, spec: &GasSpec<'_>) -> EngineResult<GasId> {
        if !(spec.pressure_atm > 0.0 && spec.volume_l > 0.0) {
            return Err(EngineError::NonPhysical(format!(
                "gas at {} atm and {} L",
                spec.pressure_atm, spec.volume_l
            )));
        }
        let mut moles = BTreeMap::new();
        for &(name, amount) in &spec.moles {
            if !(amount.is_finite() && amount >= 0.0) {
                return Err(EngineError::NonPhysical(format!("{amount} mol of {name}")));
            }
            if !self.database.is_inert(name) && self.database.by_gas_phase(name).is_none() {
                return Err(EngineError::UnknownPhase(name.to_string()));
            }
            *moles.entry(name.to_string()).or_insert(0.0) += amount;
        }

        let state = GasState {
            temperature_k: celsius_to_kelvin(spec.temperature_c),
            pressure_atm: spec.pressure_atm,
            volume_l: spec.volume_l,
            moles,
        };
        let id = self.next_handle();
        self.gases.insert(id, state);
        Ok(GasId(id))
    }

    fn interact(&mut self, solution: SolutionId, gas: GasId) -> EngineResult<()> {
        let state =
            self.solutions.get(&solution.0).ok_or(EngineError::UnknownSolution(solution))?;
        let gas_state = self.gases.get(&gas.0).ok_or(EngineError::UnknownGas(gas))?;

        let mut carrier = 0.0;
        let mut volatile = None;
        for (name, &amount) in &gas_state.moles {
            if self.database.is_inert(name) {
                carrier += amount;
            } else if volatile.is_some() {
                return Err(EngineError::Unsupported("more than one volatile gas component"));
            } else {
                volatile = Some((name.clone(), amount));
            }
        }
        let Some((phase_name, gas_moles)) = volatile else {
            return Ok(());
        };
        let phase = self
            .database
            .by_gas_phase(&phase_name)
            .ok_or_else(|| EngineError::UnknownPhase(phase_name.clone()))?;
        if phase != state.dissolved.phase {
            return Err(EngineError::Unsupported("gas contaminant differing from the solution's"));
        }
        if carrier <= 0.0 {
            return Err(EngineError::NonPhysical("gas without carrier".to_string()));
        }
        if (gas_state.temperature_k - state.temperature_k).abs() > TEMPERATURE_MATCH_K {
            return Err(EngineError::NonPhysical(format!(
                "gas at {:.2} K against solution at {:.2} K",
                gas_state.temperature_k, state.temperature_k
            )));
        }

        let definition = &self.database.phases[phase];
        let rt = R_L_ATM * state.temperature_k;
        let henry = definition.henry_at(state.temperature_k);
        let pressure = gas_state.pressure_atm;
        let total = state.dissolved.total + gas_moles;

        let gas_side = |ph: Dual64| {
            let (alpha0, _) = definition.acid_base.fractions(ph);
            partitioned_moles(alpha0 * (henry * rt / pressure), carrier, total)
        };
        let residual = |ph: Dual64| {
            let dissolved = -gas_side(ph) + total;
            self.charge(state, ph, dissolved) - state.charge_imbalance
        };
        let root = self.ph_solver.solve(residual, 0.0, 14.0, state.ph)?;

        let stripped = gas_side(Dual64::from(root.x)).re.clamp(0.0, total);
        let dissolved = total - stripped;

        if let Some(state) = self.solutions.get_mut(&solution.0) {
            state.ph = root.x;
            state.dissolved.total = dissolved;
        }
        if let Some(gas_state) = self.gases.get_mut(&gas.0) {
            gas_state.moles.insert(phase_name, stripped);
            gas_state.volume_l = (carrier + stripped) * rt / pressure;
        }
        Ok(())
    }

    fn total(&self, solution: SolutionId, component: &str) -> EngineResult<f64> {
        let state =
            self.solutions.get(&solution.0).ok_or(EngineError::UnknownSolution(solution))?;
        if self.database.phases[state.dissolved.phase].component == component {
            Ok(state.dissolved.total)
        } else if component == CARBONATE_COMPONENT {
            Ok(state.carbonate)
        } else if self.database.knows_component(component) {
            Ok(0.0)
        } else {
            Err(EngineError::UnknownComponent(component.to_string()))
        }
    }

    fn ph(&self, solution: SolutionId) -> EngineResult<f64> {
        self.solutions
            .get(&solution.0)
            .map(|state| state.ph)
            .ok_or(EngineError::UnknownSolution(solution))
    }

    fn gas_moles(&self, gas: GasId) -> EngineResult<GasMoles> {
        let state = self.gases.get(&gas.0).ok_or(EngineError::UnknownGas(gas))?;
        Ok(GasMoles { total: state.moles.values().sum(), components: state.moles.clone() })
    }

    fn partial_pressures(&self, gas: GasId) -> EngineResult<GasPressures> {
        let state = self.gases.get(&gas.0).ok_or(EngineError::UnknownGas(gas))?;
        let total: f64 = state.moles.values().sum();
        let components = state
            .moles
            .iter()
            .map(|(name, &n)| {
                let share = if total > 0.0 { n / total } else { 0.0 };
                (name.clone(), share * state.pressure_atm)
            })
            .collect();
        Ok(GasPressures { total_atm: state.pressure_atm, components })
    }

    fn forget_solution(&mut self, solution: SolutionId) {
        self.solutions.remove(&solution.0);
    }

    fn forget_gas(&mut self, gas: GasId) {
        self.gases.remove(&gas.0);
    }

    fn live_objects(&self) -> usize {
        self.solutions.len() + self.gases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::water::BackgroundWater;
    use approx::assert_relative_eq;

    const T_C: f64 = 25.0;

    fn add_pair(
        engine: &mut IdealSolutionEngine,
        background: &BackgroundWater,
        species: &str,
        phase: &str,
        mg_l: f64,
        ph: f64,
        air_water_ratio: f64,
    ) -> (SolutionId, GasId) {
        let molecular_weight = engine
            .database()
            .phases()
            .iter()
            .find(|phase| phase.aqueous_species == species)
            .unwrap()
            .molecular_weight;
        let solution = engine
            .add_solution(&SolutionSpec {
                temperature_c: T_C,
                ph,
                background,
                species,
                concentration_mg_l: mg_l,
                molecular_weight,
            })
            .unwrap();
        let moles = air_water_ratio / (R_L_ATM * 298.15);
        let gas = engine
            .add_gas(&GasSpec {
                temperature_c: T_C,
                pressure_atm: 1.0,
                volume_l: air_water_ratio,
                moles: vec![("N2(g)", moles), (phase, 1e-12 * moles)],
            })
            .unwrap();
        (solution, gas)
    }

    #[test]
    fn test_default_database_henry_constants() {
        let db = PhaseDatabase::default();
        let tce = &db.phases()[db.by_gas_phase("TCE(g)").unwrap()];
        assert_relative_eq!(tce.henry_25c, 8.59, max_relative = 1e-3);
        let h2s = &db.phases()[db.by_gas_phase("H2S(g)").unwrap()];
        assert_relative_eq!(h2s.henry_25c, 0.41, max_relative = 0.02);
        // Volatility rises with temperature
        assert!(h2s.henry_at(308.15) > h2s.henry_25c);
    }

    #[test]
    fn test_register_replaces_phase() {
        let db = PhaseDatabase::default()
            .with_phase(PhaseDefinition::neutral("TCE(g)", "Tce", "Tce", 0.4, 131.388));
        assert_eq!(db.phases().len(), 4);
        assert_eq!(db.phases()[db.by_gas_phase("TCE(g)").unwrap()].henry_25c, 0.4);

        let db = db.with_phase(PhaseDefinition::neutral("Bnz(g)", "Bnz", "Bnz", 0.23, 78.11));
        assert_eq!(db.phases().len(), 5);
        assert!(db.knows_component("Bnz"));
    }

    #[test]
    fn test_voc_partition_obeys_henry() {
        let background = BackgroundWater::municipal();
        let mut engine = IdealSolutionEngine::default();
        let (solution, gas) =
            add_pair(&mut engine, &background, "Tce", "TCE(g)", 10.0, 7.0, 30.0);

        engine.interact(solution, gas).unwrap();

        let dissolved = engine.total(solution, "Tce").unwrap();
        let moles = engine.gas_moles(gas).unwrap();
        let y = moles.components["TCE(g)"] / moles.total;
        let henry = engine.database().phases()[0].henry_25c;
        assert_relative_eq!(y, henry * dissolved * R_L_ATM * 298.15, max_relative = 1e-9);
        assert_relative_eq!(engine.ph(solution).unwrap(), 7.0, epsilon = 1e-8);
    }

    #[test]
    fn test_interaction_conserves_contaminant() {
        let background = BackgroundWater::municipal();
        let mut engine = IdealSolutionEngine::default();
        let (solution, gas) =
            add_pair(&mut engine, &background, "H2S", "H2S(g)", 20.0, 8.0, 40.0);

        let before = engine.total(solution, "S(-2)").unwrap()
            + engine.gas_moles(gas).unwrap().components["H2S(g)"];
        engine.interact(solution, gas).unwrap();
        let after = engine.total(solution, "S(-2)").unwrap()
            + engine.gas_moles(gas).unwrap().components["H2S(g)"];

        assert_relative_eq!(before, after, max_relative = 1e-12);
    }

    #[test]
    fn test_acid_gas_stripping_raises_ph() {
        let background = BackgroundWater::municipal();
        for (species, phase, mg_l, ph) in
            [("H2S", "H2S(g)", 20.0, 7.0), ("CO2", "CO2(g)", 100.0, 6.5)]
        {
            let mut engine = IdealSolutionEngine::default();
            let (solution, gas) =
                add_pair(&mut engine, &background, species, phase, mg_l, ph, 40.0);
            engine.interact(solution, gas).unwrap();
            assert!(engine.ph(solution).unwrap() > ph + 0.05, "{} pH did not rise", species);
        }
    }

    #[test]
    fn test_carbonate_background_reported() {
        let background = BackgroundWater::municipal();
        let mut engine = IdealSolutionEngine::default();
        let (solution, _) = add_pair(&mut engine, &background, "Tce", "TCE(g)", 1.0, 8.0, 10.0);

        // Nearly all alkalinity is bicarbonate at pH 8
        let carbon = engine.total(solution, CARBONATE_COMPONENT).unwrap();
        assert_relative_eq!(carbon, background.carbonate_alkalinity(), max_relative = 0.05);
        assert_eq!(engine.total(solution, "S(-2)").unwrap(), 0.0);
        assert!(matches!(
            engine.total(solution, "Xx"),
            Err(EngineError::UnknownComponent(_))
        ));
    }

    #[test]
    fn test_partial_pressures_sum_to_total() {
        let background = BackgroundWater::municipal();
        let mut engine = IdealSolutionEngine::default();
        let (solution, gas) =
            add_pair(&mut engine, &background, "Tce", "TCE(g)", 10.0, 7.0, 30.0);
        engine.interact(solution, gas).unwrap();

        let pressures = engine.partial_pressures(gas).unwrap();
        let sum: f64 = pressures.components.values().sum();
        assert_relative_eq!(sum, pressures.total_atm, max_relative = 1e-12);

        // Volume floats with the stripped moles at fixed pressure
        let moles = engine.gas_moles(gas).unwrap();
        let volume = engine.gas_volume(gas).unwrap();
        assert_relative_eq!(volume, moles.total * R_L_ATM * 298.15, max_relative = 1e-12);
        assert!(volume > 30.0);
    }

    #[test]
    fn test_handle_bookkeeping() {
        let background = BackgroundWater::municipal();
        let mut engine = IdealSolutionEngine::default();
        let (solution, gas) =
            add_pair(&mut engine, &background, "Tce", "TCE(g)", 10.0, 7.0, 30.0);
        assert_eq!(engine.live_objects(), 2);

        engine.forget_solution(solution);
        assert!(matches!(engine.ph(solution), Err(EngineError::UnknownSolution(_))));
        assert!(matches!(engine.interact(solution, gas), Err(EngineError::UnknownSolution(_))));
        engine.forget_gas(gas);
        engine.forget_gas(gas);
        assert_eq!(engine.live_objects(), 0);
    }

    #[test]
    fn test_rejects_unknown_and_mixed_gases() {
        let background = BackgroundWater::municipal();
        let mut engine = IdealSolutionEngine::default();
        let unknown = engine.add_gas(&GasSpec {
            temperature_c: T_C,
            pressure_atm: 1.0,
            volume_l: 1.0,
            moles: vec![("Ar(g)", 0.04)],
        });
        assert!(matches!(unknown, Err(EngineError::UnknownPhase(_))));

        let (solution, _) = add_pair(&mut engine, &background, "Tce", "TCE(g)", 1.0, 7.0, 1.0);
        let mixed = engine
            .add_gas(&GasSpec {
                temperature_c: T_C,
                pressure_atm: 1.0,
                volume_l: 1.0,
                moles: vec![("N2(g)", 0.04), ("TCE(g)", 1e-9), ("CCl4(g)", 1e-9)],
            })
            .unwrap();
        assert!(matches!(engine.interact(solution, mixed), Err(EngineError::Unsupported(_))));
    }

    #[test]
    fn test_solution_uses_given_formula_weight() {
        let background = BackgroundWater::municipal();
        let mut engine = IdealSolutionEngine::default();
        let spec = SolutionSpec {
            temperature_c: T_C,
            ph: 7.0,
            background: &background,
            species: "Tce",
            concentration_mg_l: 10.0,
            molecular_weight: 60.0,
        };

        let solution = engine.add_solution(&spec).unwrap();
        assert_relative_eq!(engine.total(solution, "Tce").unwrap(), 10.0 / 60_000.0);

        let bad = engine.add_solution(&SolutionSpec { molecular_weight: 0.0, ..spec });
        assert!(matches!(bad, Err(EngineError::NonPhysical(_))));
    }

    #[test]
    fn test_gas_temperature_must_match_solution() {
        let background = BackgroundWater::municipal();
        let mut engine = IdealSolutionEngine::default();
        let (solution, _) = add_pair(&mut engine, &background, "Tce", "TCE(g)", 1.0, 7.0, 1.0);
        let warm = engine
            .add_gas(&GasSpec {
                temperature_c: T_C + 10.0,
                pressure_atm: 1.0,
                volume_l: 1.0,
                moles: vec![("N2(g)", 0.04), ("TCE(g)", 1e-12)],
            })
            .unwrap();

        assert!(matches!(engine.interact(solution, warm), Err(EngineError::NonPhysical(_))));
        assert_relative_eq!(engine.total(solution, "Tce").unwrap(), 1.0 / 131_388.0);
    }
}
