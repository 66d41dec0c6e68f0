//! Design inputs handed over by the upstream sizing tier.
//!
//! A [`DesignRequest`] describes the duty (flow, concentrations, air/water
//! ratio, temperature, pH, background water), a [`ChemistrySpec`] fixes the
//! contaminant identity and its constants, and a [`Tier1Estimate`] carries the
//! heuristic tower dimensions. All three are immutable once validated and are
//! threaded read-only through every stage calculation.

use crate::thermodynamics::AcidBase;
use crate::water::BackgroundWater;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Errors raised while validating design inputs.
#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Unknown application '{0}' (expected CO2, H2S, VOC or general)")]
    UnknownApplication(String),

    #[error("Inconsistent chemistry: {0}")]
    InconsistentChemistry(String),
}

impl DesignError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        DesignError::Invalid { field, reason: reason.into() }
    }
}

/// Checks that a value is finite and strictly positive.
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<(), DesignError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DesignError::invalid(field, format!("must be positive, got {value}")))
    }
}

/// Stripping application. Selects default constants and speciation.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Application {
    CO2,
    H2S,
    VOC,
    General,
}

impl Application {
    /// Acid-base class of the target contaminant.
    pub fn acid_base(&self) -> AcidBase {
        match self {
            Application::H2S => AcidBase::Monoprotic { pka: 7.0 },
            Application::CO2 => AcidBase::Diprotic { pka1: 6.35, pka2: 10.33 },
            Application::VOC | Application::General => AcidBase::Neutral,
        }
    }

    /// True for contaminants whose volatility depends on pH.
    pub fn is_ph_dependent(&self) -> bool {
        self.acid_base().is_ph_dependent()
    }

    /// Strippable fraction α₀ at the given pH.
    pub fn strippable_fraction(&self, ph: f64) -> f64 {
        self.acid_base().neutral_fraction(ph)
    }

    /// Default dimensionless Henry's constant at 25 °C.
    pub fn default_henry_constant(&self) -> f64 {
        match self {
            Application::CO2 => 0.83,
            Application::H2S => 0.41,
            Application::VOC => 8.59,
            Application::General => 1.0,
        }
    }

    /// Default molecular weight in g/mol.
    pub fn default_molecular_weight(&self) -> f64 {
        match self {
            Application::CO2 => 44.01,
            Application::H2S => 34.08,
            // The generic contaminant is modelled on the TCE phase
            Application::VOC | Application::General => 131.388,
        }
    }

    /// Default gas phase name in the equilibrium database.
    pub fn default_gas_phase(&self) -> &'static str {
        match self {
            Application::CO2 => "CO2(g)",
            Application::H2S => "H2S(g)",
            Application::VOC | Application::General => "TCE(g)",
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Application::CO2 => "CO2",
            Application::H2S => "H2S",
            Application::VOC => "VOC",
            Application::General => "general",
        };
        f.write_str(name)
    }
}

impl FromStr for Application {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CO2" => Ok(Application::CO2),
            "H2S" => Ok(Application::H2S),
            "VOC" => Ok(Application::VOC),
            "GENERAL" => Ok(Application::General),
            _ => Err(DesignError::UnknownApplication(s.to_string())),
        }
    }
}

/// Maps an aqueous species to the total component reported after equilibration.
pub fn total_component(species: &str) -> Option<&'static str> {
    match species {
        "H2S" | "HS-" => Some("S(-2)"),
        "CO2" => Some("C(4)"),
        "Tce" => Some("Tce"),
        "Ct" => Some("Ct"),
        _ => None,
    }
}

/// Maps a gas phase to the aqueous species it dissolves as.
pub fn aqueous_species(gas_phase: &str) -> Option<&'static str> {
    match gas_phase {
        "TCE(g)" => Some("Tce"),
        "CCl4(g)" => Some("Ct"),
        "H2S(g)" => Some("H2S"),
        "CO2(g)" => Some("CO2"),
        _ => None,
    }
}

/// Contaminant constants and equilibrium identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemistrySpec {
    pub application: Application,
    /// Dimensionless Henry's constant (gas/liquid concentration ratio) at 25 °C.
    pub henry_constant: f64,
    /// Molecular weight in g/mol.
    pub molecular_weight: f64,
    /// Aqueous species name in the equilibrium database.
    pub aqueous_species: String,
    /// Gas phase name in the equilibrium database.
    pub gas_phase: String,
    /// Total component queried after equilibration.
    pub total_component: String,
}

impl ChemistrySpec {
    /// Default constants for an application.
    pub fn for_application(application: Application) -> Self {
        let gas_phase = application.default_gas_phase();
        let species = aqueous_species(gas_phase).unwrap_or("Tce");
        ChemistrySpec {
            application,
            henry_constant: application.default_henry_constant(),
            molecular_weight: application.default_molecular_weight(),
            aqueous_species: species.to_string(),
            gas_phase: gas_phase.to_string(),
            total_component: total_component(species).unwrap_or(species).to_string(),
        }
    }

    /// Overrides the Henry's constant.
    pub fn with_henry_constant(mut self, henry_constant: f64) -> Self {
        self.henry_constant = henry_constant;
        self
    }

    /// Overrides the molecular weight.
    pub fn with_molecular_weight(mut self, molecular_weight: f64) -> Self {
        self.molecular_weight = molecular_weight;
        self
    }

    /// Overrides the equilibrium identifiers of the contaminant.
    pub fn with_species(
        mut self,
        gas_phase: impl Into<String>,
        aqueous_species: impl Into<String>,
        total_component: impl Into<String>,
    ) -> Self {
        self.gas_phase = gas_phase.into();
        self.aqueous_species = aqueous_species.into();
        self.total_component = total_component.into();
        self
    }

    /// Checks constants and that the identifiers describe one contaminant.
    ///
    /// Names known to the built-in lookup tables must agree with them; custom
    /// names are accepted as long as they are non-empty.
    pub fn validate(&self) -> Result<(), DesignError> {
        require_positive("henry_constant", self.henry_constant)?;
        require_positive("molecular_weight", self.molecular_weight)?;

        for (field, name) in [
            ("gas_phase", &self.gas_phase),
            ("aqueous_species", &self.aqueous_species),
            ("total_component", &self.total_component),
        ] {
            if name.trim().is_empty() {
                return Err(DesignError::invalid(field, "must not be empty"));
            }
        }

        if let Some(species) = aqueous_species(&self.gas_phase) {
            if species != self.aqueous_species {
                return Err(DesignError::InconsistentChemistry(format!(
                    "gas phase {} dissolves as {}, not {}",
                    self.gas_phase, species, self.aqueous_species
                )));
            }
        }
        if let Some(component) = total_component(&self.aqueous_species) {
            if component != self.total_component {
                return Err(DesignError::InconsistentChemistry(format!(
                    "species {} is reported as {}, not {}",
                    self.aqueous_species, component, self.total_component
                )));
            }
        }
        Ok(())
    }
}

/// Immutable description of the stripping duty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRequest {
    pub application: Application,
    /// Water flow in m³/h.
    pub water_flow_m3_h: f64,
    /// Contaminant concentration entering with the water (mg/L).
    pub inlet_concentration_mg_l: f64,
    /// Target concentration leaving with the water (mg/L).
    pub outlet_concentration_mg_l: f64,
    /// Volumetric air-to-water ratio.
    pub air_water_ratio: f64,
    /// Water temperature in °C.
    pub temperature_c: f64,
    /// Feed pH; neutral water is assumed when absent.
    pub water_ph: Option<f64>,
    /// Background ion composition; the municipal template is used when absent.
    pub background_water: Option<BackgroundWater>,
}

impl DesignRequest {
    /// Creates a request at 25 °C with unspecified pH and background water.
    pub fn new(
        application: Application,
        water_flow_m3_h: f64,
        inlet_concentration_mg_l: f64,
        outlet_concentration_mg_l: f64,
        air_water_ratio: f64,
    ) -> Self {
        DesignRequest {
            application,
            water_flow_m3_h,
            inlet_concentration_mg_l,
            outlet_concentration_mg_l,
            air_water_ratio,
            temperature_c: 25.0,
            water_ph: None,
            background_water: None,
        }
    }

    pub fn with_temperature(mut self, temperature_c: f64) -> Self {
        self.temperature_c = temperature_c;
        self
    }

    pub fn with_ph(mut self, ph: f64) -> Self {
        self.water_ph = Some(ph);
        self
    }

    pub fn with_background_water(mut self, water: BackgroundWater) -> Self {
        self.background_water = Some(water);
        self
    }

    /// Feed pH used to seed the profiles.
    pub fn feed_ph(&self) -> f64 {
        self.water_ph.unwrap_or(7.0)
    }

    /// Temperature in K.
    pub fn temperature_k(&self) -> f64 {
        crate::thermodynamics::celsius_to_kelvin(self.temperature_c)
    }

    /// Background water, falling back to the municipal template.
    pub fn background(&self) -> Cow<'_, BackgroundWater> {
        match &self.background_water {
            Some(water) => Cow::Borrowed(water),
            None => Cow::Owned(BackgroundWater::municipal()),
        }
    }

    /// Rejects requests the iterative core cannot handle.
    pub fn validate(&self) -> Result<(), DesignError> {
        require_positive("water_flow_m3_h", self.water_flow_m3_h)?;
        require_positive("inlet_concentration_mg_l", self.inlet_concentration_mg_l)?;
        require_positive("air_water_ratio", self.air_water_ratio)?;

        let outlet = self.outlet_concentration_mg_l;
        if !outlet.is_finite() || outlet < 0.0 {
            return Err(DesignError::invalid(
                "outlet_concentration_mg_l",
                format!("must be non-negative, got {outlet}"),
            ));
        }
        if outlet >= self.inlet_concentration_mg_l {
            return Err(DesignError::invalid(
                "outlet_concentration_mg_l",
                format!(
                    "target {outlet} mg/L must be below inlet {} mg/L",
                    self.inlet_concentration_mg_l
                ),
            ));
        }
        if !(self.temperature_c > 0.0 && self.temperature_c < 100.0) {
            return Err(DesignError::invalid(
                "temperature_c",
                format!("{} °C is outside liquid water range", self.temperature_c),
            ));
        }
        if let Some(ph) = self.water_ph {
            if !(0.0..=14.0).contains(&ph) {
                return Err(DesignError::invalid("water_ph", format!("{ph} is outside 0-14")));
            }
        }
        Ok(())
    }
}

/// Packing archetype used when no HTU is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackingKind {
    Random,
    Structured,
}

impl PackingKind {
    /// Classifies a free-form packing description.
    pub fn from_description(description: &str) -> Self {
        if description.to_ascii_lowercase().contains("structured") {
            PackingKind::Structured
        } else {
            PackingKind::Random
        }
    }
}

/// Heuristic tower dimensions from the upstream sizing tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier1Estimate {
    pub tower_height_m: f64,
    pub tower_diameter_m: f64,
    pub htu_m: Option<f64>,
    pub packing: PackingKind,
}

impl Tier1Estimate {
    pub fn new(tower_height_m: f64, tower_diameter_m: f64, packing: PackingKind) -> Self {
        Tier1Estimate { tower_height_m, tower_diameter_m, htu_m: None, packing }
    }

    pub fn with_htu(mut self, htu_m: f64) -> Self {
        self.htu_m = Some(htu_m);
        self
    }

    pub fn validate(&self) -> Result<(), DesignError> {
        require_positive("tower_height_m", self.tower_height_m)?;
        require_positive("tower_diameter_m", self.tower_diameter_m)?;
        if let Some(htu) = self.htu_m {
            require_positive("htu_m", htu)?;
        }
        Ok(())
    }
}

/// Bundle of everything the upstream tier produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier1Outcome {
    pub request: DesignRequest,
    pub chemistry: ChemistrySpec,
    pub estimate: Tier1Estimate,
}

impl Tier1Outcome {
    pub fn new(request: DesignRequest, chemistry: ChemistrySpec, estimate: Tier1Estimate) -> Self {
        Tier1Outcome { request, chemistry, estimate }
    }

    pub fn validate(&self) -> Result<(), DesignError> {
        self.request.validate()?;
        self.chemistry.validate()?;
        self.estimate.validate()?;
        if self.request.application != self.chemistry.application {
            return Err(DesignError::InconsistentChemistry(format!(
                "request is for {} but chemistry describes {}",
                self.request.application, self.chemistry.application
            )));
        }
        Ok(())
    }
}
