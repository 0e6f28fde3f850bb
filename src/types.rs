use crate::config::MAX_QUANTITY;
use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Material strings that mean "no material" in shop spreadsheets.
const BLANK_MATERIALS: [&str; 4] = ["", "0", "NONE", "N/A"];

/// Normalizes a raw material cell: trimmed, uppercased, `None` when blank.
pub fn normalize_material(raw: &str) -> Option<String> {
    let s = raw.trim().to_uppercase();
    if BLANK_MATERIALS.contains(&s.as_str()) {
        return None;
    }
    Some(s)
}

/// One cut requirement: `quantity` pieces of `length` from a
/// `material`/`diameter` stick, requested on section `group_tab`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub group_tab: String,
    pub material: String,
    pub diameter: f64,
    pub length: f64,
    pub quantity: u32,
}

impl DemandRecord {
    /// Builds a validated record. Material is normalized; lengths must be
    /// finite and positive and between 1 and `MAX_QUANTITY` pieces must be
    /// requested.
    pub fn new(
        group_tab: impl Into<String>,
        material: &str,
        diameter: f64,
        length: f64,
        quantity: u32,
    ) -> Result<Self, RecordError> {
        let material = normalize_material(material)
            .ok_or_else(|| RecordError::BlankMaterial(material.to_string()))?;
        if !(diameter.is_finite() && diameter > 0.0) {
            return Err(RecordError::InvalidDiameter(diameter));
        }
        if !(length.is_finite() && length > 0.0) {
            return Err(RecordError::InvalidLength(length));
        }
        if quantity == 0 {
            return Err(RecordError::ZeroQuantity);
        }
        if quantity > MAX_QUANTITY {
            return Err(RecordError::QuantityTooLarge {
                quantity,
                max: MAX_QUANTITY,
            });
        }
        Ok(Self {
            group_tab: group_tab.into(),
            material,
            diameter,
            length,
            quantity,
        })
    }

    /// Re-checks a record that arrived without going through `new`
    /// (e.g. deserialized from a request body).
    pub fn validated(self) -> Result<Self, RecordError> {
        Self::new(
            self.group_tab,
            &self.material,
            self.diameter,
            self.length,
            self.quantity,
        )
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            group_tab: self.group_tab.clone(),
            material: self.material.clone(),
            diameter: self.diameter,
        }
    }
}

/// Partition key for optimization: demand is only ever packed together
/// when tab, material and diameter all match.
#[derive(Debug, Clone)]
pub struct GroupKey {
    pub group_tab: String,
    pub material: String,
    pub diameter: f64,
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.group_tab
            .cmp(&other.group_tab)
            .then_with(|| self.material.cmp(&other.material))
            .then_with(|| self.diameter.total_cmp(&other.diameter))
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} Ø{}", self.group_tab, self.material, self.diameter)
    }
}

/// Cuts assigned to one stock stick, in placement order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub cuts: Vec<f64>,
    pub drop: f64,
}

/// One line of the cut sheet: a single stick and what to cut from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutSheetRow {
    pub stick_id: String,
    pub material: String,
    pub diameter: f64,
    pub stock_length: f64,
    pub pattern: Vec<String>,
    /// Unrounded cut lengths behind `pattern`.
    #[serde(skip)]
    pub cuts: Vec<f64>,
    pub piece_count: usize,
    pub drop: f64,
    pub group_tab: String,
}

impl CutSheetRow {
    pub fn pattern_text(&self) -> String {
        self.pattern.join(", ")
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            group_tab: self.group_tab.clone(),
            material: self.material.clone(),
            diameter: self.diameter,
        }
    }
}

/// A group the orchestrator could not optimize, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedGroup {
    pub group_tab: String,
    pub material: String,
    pub diameter: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CutSheet {
    pub rows: Vec<CutSheetRow>,
    pub skipped: Vec<SkippedGroup>,
}

impl CutSheet {
    pub fn stick_count(&self) -> usize {
        self.rows.len()
    }

    pub fn piece_count(&self) -> usize {
        self.rows.iter().map(|r| r.piece_count).sum()
    }

    pub fn total_drop(&self) -> f64 {
        self.rows.iter().map(|r| r.drop).sum()
    }

    pub fn waste_percent(&self) -> f64 {
        let total_stock: f64 = self.rows.iter().map(|r| r.stock_length).sum();
        if total_stock == 0.0 {
            return 0.0;
        }
        self.total_drop() / total_stock * 100.0
    }
}
