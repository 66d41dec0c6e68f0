//! Physical constants, aqueous acid-base speciation and Henry's law corrections.
//!
//! Everything here is closed-form: no iteration and no engine calls. The
//! functions are shared by the profile initializer (effective Henry's constant
//! at the feed pH), the reporting layer (strippable-fraction profile) and the
//! reference equilibrium engine (charge balance during the pH solve).
//!
//! # Speciation
//!
//! pH-sensitive contaminants are described by an [`AcidBase`] class. The
//! *strippable fraction* α₀ is the share of the dissolved total present as the
//! neutral, volatile species:
//!
//! - **Neutral** (VOCs): α₀ = 1 at every pH
//! - **Monoprotic** (H₂S, pKa 7.0): α₀ = 1 / (1 + 10^(pH - pKa))
//! - **Diprotic** (CO₂, pKa₁ 6.35, pKa₂ 10.33): α₀ = h² / (h² + K₁h + K₁K₂)
//!
//! The speciation functions are written over [`Dual64`] so the equilibrium
//! engine can differentiate its charge balance with respect to pH.
//!
//! # Example
//!
//! ```
//! use degasser::thermodynamics::AcidBase;
//!
//! let h2s = AcidBase::Monoprotic { pka: 7.0 };
//! assert!((h2s.neutral_fraction(7.0) - 0.5).abs() < 1e-12);
//! ```

use num_dual::{Dual64, DualNum};
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_10;

/// Gas constant in L·atm/(mol·K).
pub const R_L_ATM: f64 = 0.08206;

/// Gas constant in m³·atm/(mol·K).
pub const R_M3_ATM: f64 = 8.2057366e-5;

/// Gas constant in J/(mol·K).
pub const R_J: f64 = 8.314;

/// Offset between Celsius and Kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Reference temperature for tabulated constants (K).
pub const T_REF_K: f64 = 298.15;

/// Ion product of water at 25 °C.
pub const KW: f64 = 1e-14;

/// Converts a temperature from °C to K.
pub fn celsius_to_kelvin(temperature_c: f64) -> f64 {
    temperature_c + KELVIN_OFFSET
}

/// Acid-base behaviour of a dissolved contaminant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AcidBase {
    /// No dissociation; the whole dissolved amount is volatile.
    Neutral,
    /// Single dissociation HA = H⁺ + A⁻.
    Monoprotic { pka: f64 },
    /// Two dissociation steps H₂A = H⁺ + HA⁻ = 2H⁺ + A²⁻.
    Diprotic { pka1: f64, pka2: f64 },
}

impl AcidBase {
    /// Neutral-species fraction α₀ and mean negative charge per mole of total.
    ///
    /// Both are returned as dual numbers so the caller can carry a derivative
    /// with respect to pH through them.
    pub fn fractions(&self, ph: Dual64) -> (Dual64, Dual64) {
        let h = hydrogen_activity(ph);
        match *self {
            AcidBase::Neutral => (Dual64::from(1.0), Dual64::from(0.0)),
            AcidBase::Monoprotic { pka } => {
                let ka = 10f64.powf(-pka);
                let denom = h + ka;
                (h / denom, denom.recip() * ka)
            }
            AcidBase::Diprotic { pka1, pka2 } => {
                let k1 = 10f64.powf(-pka1);
                let k2 = 10f64.powf(-pka2);
                let denom = h * h + h * k1 + k1 * k2;
                let alpha1 = h * k1 / denom;
                let alpha2 = denom.recip() * (k1 * k2);
                (h * h / denom, alpha1 + alpha2 * 2.0)
            }
        }
    }

    /// Strippable (neutral) fraction α₀ at the given pH.
    pub fn neutral_fraction(&self, ph: f64) -> f64 {
        self.fractions(Dual64::from(ph)).0.re
    }

    /// Mean negative charge carried per mole of dissolved total.
    pub fn charge_per_mole(&self, ph: f64) -> f64 {
        self.fractions(Dual64::from(ph)).1.re
    }

    /// Whether the neutral fraction varies with pH.
    pub fn is_ph_dependent(&self) -> bool {
        !matches!(self, AcidBase::Neutral)
    }
}

/// Hydrogen ion activity 10^(-pH).
pub fn hydrogen_activity(ph: Dual64) -> Dual64 {
    (-ph * LN_10).exp()
}

/// Temperature-corrected dimensionless Henry's constant (van't Hoff).
///
/// `H(T) = H_ref · exp(ΔH/R · (1/T_ref - 1/T))` with ΔH the volatilization
/// enthalpy in J/mol. Without an enthalpy the reference value is returned.
pub fn henry_at_temperature(
    henry_ref: f64,
    enthalpy_j_mol: Option<f64>,
    temperature_k: f64,
) -> f64 {
    match enthalpy_j_mol {
        Some(dh) => henry_ref * (dh / R_J * (1.0 / T_REF_K - 1.0 / temperature_k)).exp(),
        None => henry_ref,
    }
}

/// Dimensionless Henry's constant from a gas solubility constant.
///
/// `log_k` is log10 of K in mol/(L·atm) for `gas = aq`, the convention used by
/// geochemical phase databases.
pub fn henry_from_log_k(log_k: f64, temperature_k: f64) -> f64 {
    1.0 / (10f64.powf(log_k) * R_L_ATM * temperature_k)
}

/// Gas mole fraction in Henry's-law equilibrium with a liquid concentration.
///
/// `y = H · (C / (MW · 1000)) · R · T` with `C` in mg/L.
pub fn equilibrium_gas_fraction(
    henry: f64,
    concentration_mg_l: f64,
    molecular_weight: f64,
    temperature_k: f64,
) -> f64 {
    henry * (concentration_mg_l / (molecular_weight * 1000.0)) * R_L_ATM * temperature_k
}

/// Moles of gas per liter of liquid at 1 atm for a volumetric air/water ratio.
pub fn molar_gas_to_liquid(air_water_ratio: f64, temperature_k: f64) -> f64 {
    air_water_ratio / (R_L_ATM * temperature_k)
}
