use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while optimizing demand.
///
/// `UnknownStockLength` and `UnpackableCut` are scoped to a single group:
/// the orchestrator records them and moves on. Only `NoGroupsOptimized`
/// fails a whole run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("no stock length defined for material '{material}', diameter {diameter}")]
    UnknownStockLength { material: String, diameter: f64 },

    #[error("cut of {length} exceeds stock stick length {stick_length}")]
    UnpackableCut { length: f64, stick_length: f64 },

    #[error("no groups optimized, check input data and stock length definitions")]
    NoGroupsOptimized,

    #[error("kerf must be a finite, non-negative width, got {0}")]
    InvalidKerf(f64),

    #[error("stick length must be a finite, positive length, got {0}")]
    InvalidStickLength(f64),
}

/// Reasons a single demand row is rejected before it reaches the optimizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("blank material '{0}'")]
    BlankMaterial(String),

    #[error("diameter must be positive, got {0}")]
    InvalidDiameter(f64),

    #[error("length must be positive, got {0}")]
    InvalidLength(f64),

    #[error("quantity must be non-zero")]
    ZeroQuantity,

    #[error("quantity {quantity} exceeds the per-row limit of {max}")]
    QuantityTooLarge { quantity: u32, max: u32 },
}

/// Failures raised while reading a stock catalog file.
#[derive(Debug, Error)]
pub enum StockTableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stock table JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stock table has no entries")]
    Empty,

    #[error(transparent)]
    Invalid(#[from] OptimizeError),
}

/// Failures raised while turning tabular input into demand records.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("unsupported file format '{0}' (expected .xlsx, .xlsm or .csv)")]
    UnsupportedFormat(String),

    #[error("workbook could not be read: {0}")]
    Workbook(String),

    #[error("section '{section}' is malformed: {message}")]
    MalformedSection { section: String, message: String },

    #[error("no sections could be read, check section names and BA:BD headers")]
    NoSectionsLoaded,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised while writing the cut sheet.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
