//! Equilibrium oracle: engine interface, session and per-stage adapter.
//!
//! The stage solver never talks to a chemical equilibrium engine directly. It
//! calls [`equilibrate`], which builds an aqueous solution and a gas envelope
//! inside the engine, lets them react at fixed total pressure, reads back the
//! liquid total, the gas composition and the pH, and releases both engine
//! objects before returning.
//!
//! # Engine contract
//!
//! Any engine implementing [`EquilibriumEngine`] can be plugged in. The
//! contract is handle based, like the geochemical engines it abstracts over:
//!
//! 1. [`EquilibriumEngine::add_solution`] and [`EquilibriumEngine::add_gas`]
//!    create objects and return handles
//! 2. [`EquilibriumEngine::interact`] equilibrates a solution against a gas
//! 3. queries read totals, pH and gas moles (or partial pressures)
//! 4. `forget_*` releases the objects
//!
//! The crate ships [`IdealSolutionEngine`], an ideal-solution engine with
//! exact gas-liquid partitioning and a charge-conserving pH solve.
//!
//! # Sessions
//!
//! Engine construction can be expensive (loading phase definitions), so the
//! solver receives an [`EngineSession`]: an explicitly passed context that
//! builds its engine on first use and reuses it for every later call.

pub mod ideal;

pub use ideal::{IdealSolutionEngine, PhaseDatabase, PhaseDefinition};

use crate::design::ChemistrySpec;
use crate::thermodynamics::{celsius_to_kelvin, R_L_ATM};
use crate::water::BackgroundWater;
use std::collections::BTreeMap;
use std::fmt;

/// Inert carrier gas of the stripping air.
pub const CARRIER_GAS: &str = "N2(g)";

/// Total pressure of the column (atm).
pub const COLUMN_PRESSURE_ATM: f64 = 1.0;

/// Smallest contaminant share of the gas, used instead of exactly clean air.
pub const CLEAN_AIR_FRACTION: f64 = 1e-12;

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by an equilibrium engine or the stage adapter.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Unknown solution handle {0}")]
    UnknownSolution(SolutionId),

    #[error("Unknown gas handle {0}")]
    UnknownGas(GasId),

    #[error("Unknown species '{0}'")]
    UnknownSpecies(String),

    #[error("Unknown gas phase '{0}'")]
    UnknownPhase(String),

    #[error("Unknown component '{0}'")]
    UnknownComponent(String),

    #[error("Gas component '{0}' not present after equilibration")]
    MissingGasComponent(String),

    #[error("Engine does not support {0}")]
    Unsupported(&'static str),

    #[error("Non-physical input: {0}")]
    NonPhysical(String),

    #[error("pH solve failed: {0}")]
    PhSolve(#[from] crate::autodiff::RootError),

    #[error("Engine construction failed: {0}")]
    Construction(String),
}

impl EngineError {
    /// Whether gas composition may still be read through partial pressures.
    pub fn allows_pressure_fallback(&self) -> bool {
        matches!(self, EngineError::MissingGasComponent(_) | EngineError::Unsupported(_))
    }
}

/// Handle to an aqueous solution inside an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SolutionId(pub u64);

/// Handle to a gas phase inside an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GasId(pub u64);

impl fmt::Display for SolutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "solution#{}", self.0)
    }
}

impl fmt::Display for GasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gas#{}", self.0)
    }
}

/// One liter of water: background ions plus a dissolved species.
#[derive(Debug, Clone, Copy)]
pub struct SolutionSpec<'a> {
    pub temperature_c: f64,
    pub ph: f64,
    pub background: &'a BackgroundWater,
    pub species: &'a str,
    pub concentration_mg_l: f64,
    /// Formula weight (g/mol) converting `concentration_mg_l` to moles
    pub molecular_weight: f64,
}

/// Gas envelope at fixed total pressure with floating volume.
#[derive(Debug, Clone)]
pub struct GasSpec<'a> {
    pub temperature_c: f64,
    pub pressure_atm: f64,
    pub volume_l: f64,
    pub moles: Vec<(&'a str, f64)>,
}

/// Gas phase composition in moles.
#[derive(Debug, Clone, PartialEq)]
pub struct GasMoles {
    pub total: f64,
    pub components: BTreeMap<String, f64>,
}

/// Gas phase composition in partial pressures (atm).
#[derive(Debug, Clone, PartialEq)]
pub struct GasPressures {
    pub total_atm: f64,
    pub components: BTreeMap<String, f64>,
}

/// Interface to a chemical equilibrium engine.
pub trait EquilibriumEngine {
    /// Creates a solution and returns its handle.
    fn add_solution(&mut self, spec: &SolutionSpec<'_>) -> EngineResult<SolutionId>;

    /// Creates a gas phase and returns its handle.
    fn add_gas(&mut self, spec: &GasSpec<'_>) -> EngineResult<GasId>;

    /// Equilibrates a solution against a gas phase, updating both.
    fn interact(&mut self, solution: SolutionId, gas: GasId) -> EngineResult<()>;

    /// Total dissolved amount of a component (mol/L).
    fn total(&self, solution: SolutionId, component: &str) -> EngineResult<f64>;

    /// Solution pH.
    fn ph(&self, solution: SolutionId) -> EngineResult<f64>;

    /// Gas composition in moles.
    fn gas_moles(&self, gas: GasId) -> EngineResult<GasMoles>;

    /// Gas composition in partial pressures.
    fn partial_pressures(&self, _gas: GasId) -> EngineResult<GasPressures> {
        Err(EngineError::Unsupported("partial pressure queries"))
    }

    /// Releases a solution.
    fn forget_solution(&mut self, solution: SolutionId);

    /// Releases a gas phase.
    fn forget_gas(&mut self, gas: GasId);

    /// Number of solutions and gas phases currently held.
    fn live_objects(&self) -> usize;
}

type EngineFactory<E> = Box<dyn Fn() -> EngineResult<E>>;

/// Lazily constructed, reusable engine context.
///
/// ```
/// use degasser::equilibrium::{EngineSession, EquilibriumEngine};
///
/// let mut session = EngineSession::ideal();
/// assert!(!session.is_initialized());
/// assert_eq!(session.engine().unwrap().live_objects(), 0);
/// assert_eq!(session.constructions(), 1);
/// ```
pub struct EngineSession<E> {
    factory: EngineFactory<E>,
    engine: Option<E>,
    constructions: usize,
}

impl<E: EquilibriumEngine> EngineSession<E> {
    /// Creates a session; `factory` runs on first use only.
    pub fn new(factory: impl Fn() -> EngineResult<E> + 'static) -> Self {
        EngineSession { factory: Box::new(factory), engine: None, constructions: 0 }
    }

    /// The session engine, constructing it if needed.
    pub fn engine(&mut self) -> EngineResult<&mut E> {
        if self.engine.is_none() {
            let engine = (self.factory)()?;
            self.constructions += 1;
            log::info!("Equilibrium engine session initialized");
            self.engine = Some(engine);
        }
        self.engine
            .as_mut()
            .ok_or_else(|| EngineError::Construction("engine unavailable".to_string()))
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// How many times the factory has built an engine.
    pub fn constructions(&self) -> usize {
        self.constructions
    }
}

impl EngineSession<IdealSolutionEngine> {
    /// Session over the reference engine with the default phase database.
    pub fn ideal() -> Self {
        Self::with_database(PhaseDatabase::default())
    }

    /// Session over the reference engine with a custom phase database.
    pub fn with_database(database: PhaseDatabase) -> Self {
        Self::new(move || Ok(IdealSolutionEngine::new(database.clone())))
    }
}

impl<E> fmt::Debug for EngineSession<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSession")
            .field("initialized", &self.engine.is_some())
            .field("constructions", &self.constructions)
            .finish()
    }
}

/// Conditions entering one equilibrium stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageInputs {
    /// Liquid concentration entering the stage (mg/L)
    pub liquid_conc_mg_l: f64,
    /// Gas mole fraction arriving from the stage above
    pub gas_fraction: f64,
    /// Seed pH for the equilibrium solve
    pub ph_guess: f64,
    pub temperature_c: f64,
    /// Full column air/water ratio, applied at every stage
    pub air_water_ratio: f64,
}

/// Full-equilibrium state leaving a stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageEquilibrium {
    pub liquid_conc_mg_l: f64,
    pub gas_fraction: f64,
    pub ph: f64,
}

/// Equilibrates one stage's liquid against its incoming gas.
///
/// The gas envelope holds `air_water_ratio` liters per liter of liquid at
/// 1 atm. Engine objects created here are always released, whether the call
/// succeeds or fails.
pub fn equilibrate<E>(
    engine: &mut E,
    inputs: &StageInputs,
    chemistry: &ChemistrySpec,
    background: &BackgroundWater,
) -> EngineResult<StageEquilibrium>
where
    E: EquilibriumEngine + ?Sized,
{
    if !(inputs.liquid_conc_mg_l.is_finite() && inputs.liquid_conc_mg_l >= 0.0) {
        return Err(EngineError::NonPhysical(format!(
            "liquid concentration {} mg/L",
            inputs.liquid_conc_mg_l
        )));
    }
    if !(0.0..1.0).contains(&inputs.gas_fraction) {
        return Err(EngineError::NonPhysical(format!("gas fraction {}", inputs.gas_fraction)));
    }

    let temperature_k = celsius_to_kelvin(inputs.temperature_c);
    let volume_l = inputs.air_water_ratio.max(1e-6);
    let total_moles = COLUMN_PRESSURE_ATM * volume_l / (R_L_ATM * temperature_k);
    let contaminant_moles =
        (inputs.gas_fraction * total_moles).max(CLEAN_AIR_FRACTION * total_moles);
    let carrier_moles = total_moles - contaminant_moles;

    let solution = engine.add_solution(&SolutionSpec {
        temperature_c: inputs.temperature_c,
        ph: inputs.ph_guess,
        background,
        species: &chemistry.aqueous_species,
        concentration_mg_l: inputs.liquid_conc_mg_l,
        molecular_weight: chemistry.molecular_weight,
    })?;
    let gas = match engine.add_gas(&GasSpec {
        temperature_c: inputs.temperature_c,
        pressure_atm: COLUMN_PRESSURE_ATM,
        volume_l,
        moles: vec![
            (CARRIER_GAS, carrier_moles),
            (chemistry.gas_phase.as_str(), contaminant_moles),
        ],
    }) {
        Ok(gas) => gas,
        Err(e) => {
            engine.forget_solution(solution);
            return Err(e);
        }
    };

    let outcome = react_and_read(engine, solution, gas, chemistry);
    engine.forget_solution(solution);
    engine.forget_gas(gas);
    outcome
}

fn react_and_read<E>(
    engine: &mut E,
    solution: SolutionId,
    gas: GasId,
    chemistry: &ChemistrySpec,
) -> EngineResult<StageEquilibrium>
where
    E: EquilibriumEngine + ?Sized,
{
    engine.interact(solution, gas)?;

    let total_mol_l = engine.total(solution, &chemistry.total_component)?;
    let ph = engine.ph(solution)?;
    let gas_fraction = contaminant_gas_fraction(engine, gas, &chemistry.gas_phase)?;

    Ok(StageEquilibrium {
        liquid_conc_mg_l: total_mol_l * chemistry.molecular_weight * 1000.0,
        gas_fraction,
        ph,
    })
}

/// Contaminant mole fraction of a gas, by moles or else by partial pressures.
fn contaminant_gas_fraction<E>(engine: &E, gas: GasId, phase: &str) -> EngineResult<f64>
where
    E: EquilibriumEngine + ?Sized,
{
    let by_moles = engine.gas_moles(gas).and_then(|moles| {
        let contaminant = moles
            .components
            .get(phase)
            .copied()
            .ok_or_else(|| EngineError::MissingGasComponent(phase.to_string()))?;
        Ok(ratio_or_zero(contaminant, moles.total))
    });

    match by_moles {
        Ok(fraction) => Ok(fraction),
        Err(e) if e.allows_pressure_fallback() => {
            log::warn!("Error extracting gas composition: {}; using partial pressures", e);
            let pressures = engine.partial_pressures(gas)?;
            let partial = pressures
                .components
                .get(phase)
                .copied()
                .ok_or_else(|| EngineError::MissingGasComponent(phase.to_string()))?;
            Ok(ratio_or_zero(partial, pressures.total_atm))
        }
        Err(e) => Err(e),
    }
}

fn ratio_or_zero(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total
    } else {
        0.0
    }
}
