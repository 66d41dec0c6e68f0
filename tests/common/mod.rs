//! Shared design cases for the scenario tests

#![allow(dead_code)]

use degasser::equilibrium::PhaseDefinition;
use degasser::{Application, BackgroundWater, ChemistrySpec, DesignRequest, PhaseDatabase};

/// TCE, 100 m³/h, 10 -> 1 mg/L, air/water 30, 25 °C, pH 7.
pub fn voc_design() -> (DesignRequest, ChemistrySpec) {
    let request = DesignRequest::new(Application::VOC, 100.0, 10.0, 1.0, 30.0)
        .with_temperature(25.0)
        .with_ph(7.0);
    let chemistry = ChemistrySpec::for_application(Application::VOC).with_henry_constant(8.59);
    (request, chemistry)
}

/// Sulfide, 20 -> 0.5 mg/L, pH 8, air/water 40, municipal background.
pub fn h2s_design() -> (DesignRequest, ChemistrySpec) {
    let request = DesignRequest::new(Application::H2S, 50.0, 20.0, 0.5, 40.0)
        .with_ph(8.0)
        .with_background_water(BackgroundWater::municipal());
    (request, ChemistrySpec::for_application(Application::H2S))
}

/// Henry's constant of the poorly volatile VOC used for stage-count searches.
pub const WEAK_VOC_HENRY: f64 = 0.4;

/// Phase database where TCE(g) is replaced by a poorly volatile VOC.
pub fn weak_voc_database() -> PhaseDatabase {
    PhaseDatabase::default().with_phase(PhaseDefinition::neutral(
        "TCE(g)",
        "Tce",
        "Tce",
        WEAK_VOC_HENRY,
        131.388,
    ))
}

/// Poorly volatile VOC at air/water 10 with the given target outlet.
pub fn weak_voc_design(target_outlet: f64) -> (DesignRequest, ChemistrySpec) {
    let request =
        DesignRequest::new(Application::VOC, 100.0, 10.0, target_outlet, 10.0).with_ph(7.0);
    let chemistry =
        ChemistrySpec::for_application(Application::VOC).with_henry_constant(WEAK_VOC_HENRY);
    (request, chemistry)
}

/// Strippable fraction at every point of a pH profile.
pub fn strippable_profile(application: Application, ph: &[f64]) -> Vec<f64> {
    ph.iter().map(|&p| application.strippable_fraction(p)).collect()
}
