//! Conversion from theoretical stages to packed height.
//!
//! ```text
//! height_per_stage = HTU · safety_factor
//! packed_height    = N · height_per_stage
//! ```
//!
//! The HTU comes from the upstream sizing tier when it produced one, otherwise
//! from a fixed value for the packing archetype.

use crate::design::{DesignError, PackingKind};
use serde::{Deserialize, Serialize};

/// Margin for the reduced efficiency of low-driving-force stages.
pub const STAGE_SAFETY_FACTOR: f64 = 1.2;

/// Fallback HTU for structured packing (m).
pub const STRUCTURED_PACKING_HTU_M: f64 = 0.4;

/// Fallback HTU for random packing (m).
pub const RANDOM_PACKING_HTU_M: f64 = 0.8;

/// Where the HTU behind a height estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtuSource {
    Tier1,
    PackingDefault(PackingKind),
}

/// Physical height of a staged column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightEstimate {
    pub packed_height_m: f64,
    pub height_per_stage_m: f64,
    pub htu_m: f64,
    pub htu_source: HtuSource,
}

/// Default HTU for a packing archetype.
pub fn default_htu(packing: PackingKind) -> f64 {
    match packing {
        PackingKind::Structured => STRUCTURED_PACKING_HTU_M,
        PackingKind::Random => RANDOM_PACKING_HTU_M,
    }
}

/// Converts `n_stages` to a packed height.
///
/// Uses `htu_m` when given and falls back to [`default_htu`] for `packing`
/// otherwise.
pub fn to_height(
    n_stages: usize,
    htu_m: Option<f64>,
    packing: PackingKind,
) -> Result<HeightEstimate, DesignError> {
    if n_stages < 1 {
        return Err(DesignError::invalid("n_stages", "a column needs at least one stage"));
    }

    let (htu_m, htu_source) = match htu_m {
        Some(htu) => {
            crate::design::require_positive("htu_m", htu)?;
            (htu, HtuSource::Tier1)
        }
        None => {
            let htu = default_htu(packing);
            log::warn!("No HTU from Tier 1; using {:.2} m for {:?} packing", htu, packing);
            (htu, HtuSource::PackingDefault(packing))
        }
    };

    let height_per_stage_m = htu_m * STAGE_SAFETY_FACTOR;
    Ok(HeightEstimate {
        packed_height_m: n_stages as f64 * height_per_stage_m,
        height_per_stage_m,
        htu_m,
        htu_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_height_from_tier1_htu() {
        let height = to_height(12, Some(0.5), PackingKind::Random).unwrap();
        assert_relative_eq!(height.height_per_stage_m, 0.6);
        assert_relative_eq!(height.packed_height_m, 7.2, max_relative = 1e-12);
        assert_eq!(height.htu_source, HtuSource::Tier1);
    }

    #[test]
    fn test_height_packing_fallback() {
        let structured = to_height(10, None, PackingKind::Structured).unwrap();
        assert_relative_eq!(structured.htu_m, 0.4);
        assert_relative_eq!(structured.packed_height_m, 4.8, max_relative = 1e-12);
        assert_eq!(structured.htu_source, HtuSource::PackingDefault(PackingKind::Structured));

        let random = to_height(10, None, PackingKind::Random).unwrap();
        assert_relative_eq!(random.packed_height_m, 9.6, max_relative = 1e-12);
    }

    #[test]
    fn test_height_rejects_bad_input() {
        assert!(to_height(0, Some(0.5), PackingKind::Random).is_err());
        assert!(to_height(5, Some(-0.5), PackingKind::Random).is_err());
    }
}
