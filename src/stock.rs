use crate::error::{OptimizeError, StockTableError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Length trimmed off every nominal stick before it is usable.
pub const TRIM_ALLOWANCE: f64 = 0.75;

const DIAMETERS: [f64; 6] = [0.375, 0.5, 0.75, 1.0, 1.25, 1.5];

fn usable(feet: f64) -> f64 {
    feet * 12.0 - TRIM_ALLOWANCE
}

/// Lookup key into the stock table. Diameters match by exact value.
#[derive(Debug, Clone)]
pub struct StockKey {
    pub material: String,
    pub diameter: f64,
}

impl StockKey {
    pub fn new(material: impl Into<String>, diameter: f64) -> Self {
        Self {
            material: material.into(),
            diameter,
        }
    }

    // +0.0 and -0.0 must hash alike
    fn diameter_bits(&self) -> u64 {
        (self.diameter + 0.0).to_bits()
    }
}

impl PartialEq for StockKey {
    fn eq(&self, other: &Self) -> bool {
        self.material == other.material && self.diameter_bits() == other.diameter_bits()
    }
}

impl Eq for StockKey {}

impl Hash for StockKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.material.hash(state);
        self.diameter_bits().hash(state);
    }
}

/// One catalog line as stored in a stock table JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEntry {
    pub material: String,
    pub diameter: f64,
    pub stick_length: f64,
}

/// Usable stick length per (material, diameter). Built once, never mutated.
#[derive(Debug, Clone, Default)]
pub struct StockLengthTable {
    lengths: HashMap<StockKey, f64>,
}

impl StockLengthTable {
    pub fn from_entries(
        entries: impl IntoIterator<Item = StockEntry>,
    ) -> Result<Self, OptimizeError> {
        let mut lengths = HashMap::new();
        for e in entries {
            if !(e.stick_length.is_finite() && e.stick_length > 0.0) {
                return Err(OptimizeError::InvalidStickLength(e.stick_length));
            }
            let material = e.material.trim().to_uppercase();
            lengths.insert(StockKey::new(material, e.diameter), e.stick_length);
        }
        Ok(Self { lengths })
    }

    /// Reads a JSON array of `{material, diameter, stick_length}` entries.
    /// An empty catalog is rejected since no group could ever be packed.
    pub fn from_json_file(path: &Path) -> Result<Self, StockTableError> {
        let text = std::fs::read_to_string(path)?;
        let entries: Vec<StockEntry> = serde_json::from_str(&text)?;
        let table = Self::from_entries(entries)?;
        if table.is_empty() {
            return Err(StockTableError::Empty);
        }
        Ok(table)
    }

    /// The shop's standard catalog.
    pub fn standard() -> Self {
        let mut lengths = HashMap::new();
        for &d in &DIAMETERS {
            let carbon = if d == 0.375 {
                usable(20.0)
            } else if d == 0.5 {
                usable(22.0)
            } else {
                usable(24.0)
            };
            lengths.insert(StockKey::new("C", d), carbon);
            lengths.insert(StockKey::new("304 PC", d), usable(20.0));
            lengths.insert(StockKey::new("304 OC", d), usable(20.0));
        }
        Self { lengths }
    }

    pub fn get(&self, material: &str, diameter: f64) -> Option<f64> {
        self.lengths
            .get(&StockKey::new(material, diameter))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog() {
        let table = StockLengthTable::standard();
        assert_eq!(table.len(), 18);
        assert_eq!(table.get("C", 0.375), Some(239.25));
        assert_eq!(table.get("C", 0.5), Some(263.25));
        assert_eq!(table.get("C", 1.5), Some(287.25));
        assert_eq!(table.get("304 OC", 1.0), Some(239.25));
        assert_eq!(table.get("304 PC", 0.75), Some(239.25));
    }

    #[test]
    fn test_missing_key() {
        let table = StockLengthTable::standard();
        assert_eq!(table.get("C", 0.625), None);
        assert_eq!(table.get("316", 0.5), None);
        // lookups are exact; normalization happens at load time
        assert_eq!(table.get("c", 0.5), None);
    }

    #[test]
    fn test_from_entries() {
        let table = StockLengthTable::from_entries(vec![StockEntry {
            material: " al ".to_string(),
            diameter: 0.25,
            stick_length: 143.25,
        }])
        .unwrap();
        assert_eq!(table.get("AL", 0.25), Some(143.25));

        let err = StockLengthTable::from_entries(vec![StockEntry {
            material: "AL".to_string(),
            diameter: 0.25,
            stick_length: 0.0,
        }])
        .unwrap_err();
        assert_eq!(err, OptimizeError::InvalidStickLength(0.0));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock.json");
        std::fs::write(
            &path,
            r#"[{"material": "C", "diameter": 0.5, "stick_length": 100.0}]"#,
        )
        .unwrap();
        let table = StockLengthTable::from_json_file(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("C", 0.5), Some(100.0));
    }

    #[test]
    fn test_from_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            path
        };

        let err = StockLengthTable::from_json_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StockTableError::Io(_)));

        let err = StockLengthTable::from_json_file(&write("bad.json", "{not json")).unwrap_err();
        assert!(matches!(err, StockTableError::Json(_)));

        let err = StockLengthTable::from_json_file(&write("empty.json", "[]")).unwrap_err();
        assert!(matches!(err, StockTableError::Empty));

        let err = StockLengthTable::from_json_file(&write(
            "zero.json",
            r#"[{"material": "C", "diameter": 0.5, "stick_length": -3.0}]"#,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            StockTableError::Invalid(OptimizeError::InvalidStickLength(l)) if l == -3.0
        ));
    }
}
