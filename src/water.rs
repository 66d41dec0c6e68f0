//! Background water chemistry.
//!
//! The contaminant is stripped out of real water, whose major ions set the
//! buffering that drives the pH drift along the column. This module holds the
//! ion table, the standard templates and the charge-balance check; the
//! equilibrium engine reads strong-ion charge and carbonate alkalinity from a
//! [`BackgroundWater`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Charge imbalance (in percent) above which a warning is logged.
pub const CHARGE_IMBALANCE_WARNING_PERCENT: f64 = 5.0;

/// Errors raised while reading background water input.
#[derive(Debug, thiserror::Error)]
pub enum WaterChemistryError {
    #[error("Invalid JSON for water chemistry: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Water chemistry must be a JSON object of ion: concentration pairs")]
    NotAnObject,

    #[error("Concentration for {0} must be numeric")]
    NonNumeric(String),

    #[error("Concentration for {ion} cannot be negative ({value})")]
    Negative { ion: String, value: f64 },

    #[error("Water chemistry cannot be empty")]
    Empty,

    #[error("Unknown water chemistry template '{0}' (valid: municipal, brackish, seawater)")]
    UnknownTemplate(String),
}

/// Charge and molecular weight of a dissolved ion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IonProperties {
    pub charge: i32,
    pub molecular_weight: f64,
    pub name: &'static str,
}

/// Looks up an ion by its formula, accepting common alias spellings.
pub fn ion_properties(ion: &str) -> Option<IonProperties> {
    let (charge, molecular_weight, name) = match ion {
        "Na+" | "Na" => (1, 22.99, "Sodium"),
        "Ca2+" | "Ca+2" | "Ca" => (2, 40.08, "Calcium"),
        "Mg2+" | "Mg+2" | "Mg" => (2, 24.31, "Magnesium"),
        "K+" | "K" => (1, 39.10, "Potassium"),
        "Fe2+" => (2, 55.85, "Iron(II)"),
        "Fe3+" => (3, 55.85, "Iron(III)"),
        "Mn2+" => (2, 54.94, "Manganese"),
        "Ba2+" => (2, 137.33, "Barium"),
        "Sr2+" => (2, 87.62, "Strontium"),
        "NH4+" => (1, 18.04, "Ammonium"),
        "H+" => (1, 1.01, "Hydrogen"),
        "Cl-" | "Cl" => (-1, 35.45, "Chloride"),
        "SO4-2" | "SO4^2-" | "SO4" => (-2, 96.06, "Sulfate"),
        "HCO3-" | "HCO3" => (-1, 61.02, "Bicarbonate"),
        "CO3-2" | "CO3^2-" => (-2, 60.01, "Carbonate"),
        "NO3-" => (-1, 62.00, "Nitrate"),
        "F-" | "F" => (-1, 19.00, "Fluoride"),
        "PO4-3" => (-3, 94.97, "Phosphate"),
        "SiO3-2" => (-2, 76.08, "Silicate"),
        "Br-" => (-1, 79.90, "Bromide"),
        "B(OH)4-" => (-1, 78.84, "Borate"),
        "OH-" => (-1, 17.01, "Hydroxide"),
        _ => return None,
    };
    Some(IonProperties { charge, molecular_weight, name })
}

fn is_carbonate(name: &str) -> bool {
    matches!(name, "Bicarbonate" | "Carbonate")
}

fn is_water_ion(name: &str) -> bool {
    matches!(name, "Hydrogen" | "Hydroxide")
}

const MUNICIPAL: &[(&str, f64)] = &[
    ("Na+", 50.0),
    ("Ca2+", 40.0),
    ("Mg2+", 10.0),
    ("K+", 5.0),
    ("Cl-", 60.0),
    ("SO4-2", 30.0),
    ("HCO3-", 120.0),
    ("NO3-", 10.0),
];

const BRACKISH: &[(&str, f64)] = &[
    ("Na+", 1000.0),
    ("Ca2+", 100.0),
    ("Mg2+", 50.0),
    ("K+", 20.0),
    ("Cl-", 1500.0),
    ("SO4-2", 200.0),
    ("HCO3-", 200.0),
];

const SEAWATER: &[(&str, f64)] = &[
    ("Na+", 10770.0),
    ("Mg2+", 1290.0),
    ("Ca2+", 412.0),
    ("K+", 399.0),
    ("Sr2+", 7.9),
    ("Cl-", 19350.0),
    ("SO4-2", 2712.0),
    ("HCO3-", 142.0),
    ("Br-", 67.0),
    ("B(OH)4-", 4.5),
    ("F-", 1.3),
];

/// Where a background composition came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterSource {
    User,
    Template(String),
}

/// Major-ion composition of the water being treated, in mg/L.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundWater {
    ions_mg_l: BTreeMap<String, f64>,
    source: WaterSource,
}

impl BackgroundWater {
    /// Builds a composition from user-supplied ion concentrations.
    pub fn from_ions<I, S>(ions: I) -> Result<Self, WaterChemistryError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut ions_mg_l = BTreeMap::new();
        for (ion, value) in ions {
            let ion = ion.into();
            if !value.is_finite() {
                return Err(WaterChemistryError::NonNumeric(ion));
            }
            if value < 0.0 {
                return Err(WaterChemistryError::Negative { ion, value });
            }
            ions_mg_l.insert(ion, value);
        }
        if ions_mg_l.is_empty() {
            return Err(WaterChemistryError::Empty);
        }

        let water = BackgroundWater { ions_mg_l, source: WaterSource::User };
        water.check_ions();
        Ok(water)
    }

    /// Parses a JSON object of ion → mg/L pairs.
    ///
    /// ```
    /// use degasser::water::BackgroundWater;
    ///
    /// let water = BackgroundWater::from_json(r#"{"Na+": 46.0, "Cl-": 71.0}"#).unwrap();
    /// assert!(water.charge_balance_percent().abs() < 1.0);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, WaterChemistryError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or(WaterChemistryError::NotAnObject)?;

        let mut ions = Vec::with_capacity(object.len());
        for (ion, conc) in object {
            let conc = conc.as_f64().ok_or_else(|| WaterChemistryError::NonNumeric(ion.clone()))?;
            ions.push((ion.clone(), conc));
        }
        Self::from_ions(ions)
    }

    /// One of the standard compositions: `municipal`, `brackish` or `seawater`.
    pub fn template(name: &str) -> Result<Self, WaterChemistryError> {
        let ions = match name {
            "municipal" => MUNICIPAL,
            "brackish" => BRACKISH,
            "seawater" => SEAWATER,
            other => return Err(WaterChemistryError::UnknownTemplate(other.to_string())),
        };
        Ok(Self::from_template(name, ions))
    }

    /// The municipal template, used when a request carries no water analysis.
    pub fn municipal() -> Self {
        Self::from_template("municipal", MUNICIPAL)
    }

    fn from_template(name: &str, ions: &[(&str, f64)]) -> Self {
        let ions_mg_l = ions.iter().map(|&(ion, conc)| (ion.to_string(), conc)).collect();
        BackgroundWater { ions_mg_l, source: WaterSource::Template(name.to_string()) }
    }

    pub fn ions(&self) -> &BTreeMap<String, f64> {
        &self.ions_mg_l
    }

    pub fn source(&self) -> &WaterSource {
        &self.source
    }

    /// Known ions with their concentration in mol/L.
    fn known_ions(&self) -> impl Iterator<Item = (IonProperties, f64)> + '_ {
        self.ions_mg_l.iter().filter_map(|(ion, &mg_l)| {
            ion_properties(ion).map(|props| (props, mg_l / props.molecular_weight / 1000.0))
        })
    }

    /// Charge balance error in percent; positive means excess cations.
    pub fn charge_balance_percent(&self) -> f64 {
        let (cations, anions) =
            self.known_ions().fold((0.0, 0.0), |(cat, an), (props, mol_l)| {
                let meq = mol_l * 1000.0 * props.charge.abs() as f64;
                if props.charge > 0 {
                    (cat + meq, an)
                } else {
                    (cat, an + meq)
                }
            });
        let total = cations + anions;
        if total == 0.0 {
            return 0.0;
        }
        (cations - anions) / total * 100.0
    }

    /// Net charge of the non-carbonate ions in eq/L.
    pub fn strong_ion_charge(&self) -> f64 {
        self.known_ions()
            .filter(|(props, _)| !is_carbonate(props.name) && !is_water_ion(props.name))
            .map(|(props, mol_l)| props.charge as f64 * mol_l)
            .sum()
    }

    /// Carbonate alkalinity in eq/L from bicarbonate and carbonate.
    pub fn carbonate_alkalinity(&self) -> f64 {
        self.known_ions()
            .filter(|(props, _)| is_carbonate(props.name))
            .map(|(props, mol_l)| props.charge.abs() as f64 * mol_l)
            .sum()
    }

    fn check_ions(&self) {
        for ion in self.ions_mg_l.keys() {
            if ion_properties(ion).is_none() {
                log::warn!("Unknown ion '{}' ignored in background water chemistry", ion);
            }
        }
        let imbalance = self.charge_balance_percent();
        if imbalance.abs() > CHARGE_IMBALANCE_WARNING_PERCENT {
            log::warn!("Significant charge imbalance detected: {:.1}%", imbalance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_templates() {
        let municipal = BackgroundWater::template("municipal").unwrap();
        assert_eq!(municipal, BackgroundWater::municipal());
        assert_eq!(municipal.ions().len(), 8);

        let seawater = BackgroundWater::template("seawater").unwrap();
        assert_eq!(seawater.ions()["Cl-"], 19350.0);

        assert!(matches!(
            BackgroundWater::template("groundwater"),
            Err(WaterChemistryError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_charge_balance() {
        // 1 mmol/L NaCl is balanced
        let water = BackgroundWater::from_ions([("Na+", 22.99), ("Cl-", 35.45)]).unwrap();
        assert_relative_eq!(water.charge_balance_percent(), 0.0, epsilon = 1e-12);

        let cations_only = BackgroundWater::from_ions([("Ca2+", 40.08)]).unwrap();
        assert_relative_eq!(cations_only.charge_balance_percent(), 100.0);
    }

    #[test]
    fn test_municipal_charges() {
        let water = BackgroundWater::municipal();
        // 120 mg/L HCO3- is about 1.97 meq/L
        assert_relative_eq!(water.carbonate_alkalinity(), 120.0 / 61.02 / 1000.0);
        assert!(water.strong_ion_charge() > water.carbonate_alkalinity());
    }

    #[test]
    fn test_from_json() {
        let water = BackgroundWater::from_json(r#"{"Ca+2": 40.08, "SO4^2-": 96.06}"#).unwrap();
        assert_eq!(water.source(), &WaterSource::User);
        assert_relative_eq!(water.charge_balance_percent(), 0.0, epsilon = 1e-12);

        assert!(matches!(
            BackgroundWater::from_json("[1, 2]"),
            Err(WaterChemistryError::NotAnObject)
        ));
        assert!(matches!(
            BackgroundWater::from_json(r#"{"Na+": "lots"}"#),
            Err(WaterChemistryError::NonNumeric(_))
        ));
        assert!(matches!(
            BackgroundWater::from_json(r#"{"Na+": -3.0}"#),
            Err(WaterChemistryError::Negative { .. })
        ));
        assert!(matches!(BackgroundWater::from_json("{}"), Err(WaterChemistryError::Empty)));
        assert!(matches!(
            BackgroundWater::from_json("{not json"),
            Err(WaterChemistryError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_unknown_ions_ignored() {
        let water = BackgroundWater::from_ions([("Na+", 22.99), ("Unobtainium", 5.0)]).unwrap();
        assert_relative_eq!(water.strong_ion_charge(), 1e-3);
    }
}
