use crate::error::OptimizeError;
use serde::{Deserialize, Serialize};

/// Default saw blade width, in inches.
pub const DEFAULT_KERF: f64 = 1.0 / 8.0;

/// Section (sheet) names read from a fabrication summary workbook.
pub const DEMAND_SECTIONS: [&str; 4] = [
    "Rods_Straight_1",
    "Rods_Straight_2",
    "Rods_Straight_3",
    "Rods_Curved",
];

/// Zero-based column index of BA, where the demand block starts.
pub const DEMAND_FIRST_COLUMN: u32 = 52;

/// Number of columns in the demand block (BA:BD).
pub const DEMAND_COLUMNS: u32 = 4;

/// Most pieces a single demand row may request.
pub const MAX_QUANTITY: u32 = 10_000;

/// Canonical output file stem.
pub const OUTPUT_STEM: &str = "Cut_sheet";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_kerf")]
    pub kerf: f64,
}

fn default_kerf() -> f64 {
    DEFAULT_KERF
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { kerf: DEFAULT_KERF }
    }
}

impl OptimizerConfig {
    pub fn with_kerf(kerf: f64) -> Result<Self, OptimizeError> {
        if !(kerf.is_finite() && kerf >= 0.0) {
            return Err(OptimizeError::InvalidKerf(kerf));
        }
        Ok(Self { kerf })
    }
}
