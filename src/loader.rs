//! Turns fabrication summary spreadsheets into validated demand records.
//!
//! Workbooks carry demand in the BA:BD block of a fixed set of sheets; CSV
//! files carry the same four columns plus an optional `tab`. Rows that are
//! blank, non-positive or unparsable are dropped here and never reach the
//! optimizer. A sheet that cannot be read at all is skipped with a warning.

use crate::config::{DEMAND_COLUMNS, DEMAND_FIRST_COLUMN, DEMAND_SECTIONS, MAX_QUANTITY};
use crate::error::LoadError;
use crate::format::parse_length;
use crate::types::DemandRecord;
use calamine::{Data, Range, Reader, Xlsx};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Diameter,
    Material,
    Qty,
    Length,
    Tab,
}

/// Maps a header cell to a known column, ignoring case, spaces and hyphens.
fn canonical_header(raw: &str) -> Option<Column> {
    let key = raw.trim().replace([' ', '-'], "_").to_uppercase();
    match key.as_str() {
        "DIAMETER_IN" | "DIAMETER" => Some(Column::Diameter),
        "MATERIAL" => Some(Column::Material),
        "QTY" | "QUANTITY" => Some(Column::Qty),
        "LENGTH" => Some(Column::Length),
        "TAB" => Some(Column::Tab),
        _ => None,
    }
}

/// Positions of the required columns within a header row.
#[derive(Debug, Clone, Copy)]
struct HeaderMap {
    diameter: usize,
    material: usize,
    qty: usize,
    length: usize,
    tab: Option<usize>,
}

impl HeaderMap {
    fn from_headers<'a>(
        section: &str,
        headers: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, LoadError> {
        let (mut diameter, mut material, mut qty, mut length, mut tab) =
            (None, None, None, None, None);
        for (idx, h) in headers.into_iter().enumerate() {
            let slot = match canonical_header(h) {
                Some(Column::Diameter) => &mut diameter,
                Some(Column::Material) => &mut material,
                Some(Column::Qty) => &mut qty,
                Some(Column::Length) => &mut length,
                Some(Column::Tab) => &mut tab,
                None => continue,
            };
            slot.get_or_insert(idx);
        }

        let missing = |name: &str| LoadError::MalformedSection {
            section: section.to_string(),
            message: format!("missing '{name}' header"),
        };
        Ok(Self {
            diameter: diameter.ok_or_else(|| missing("Diameter_in"))?,
            material: material.ok_or_else(|| missing("Material"))?,
            qty: qty.ok_or_else(|| missing("Qty"))?,
            length: length.ok_or_else(|| missing("Length"))?,
            tab,
        })
    }
}

/// Whole piece count in `1..=MAX_QUANTITY`; fractional counts are truncated.
fn parse_quantity(raw: &str) -> Option<u32> {
    let q: f64 = raw.trim().parse().ok()?;
    if !q.is_finite() || q < 1.0 || q.trunc() > MAX_QUANTITY as f64 {
        return None;
    }
    Some(q.trunc() as u32)
}

/// Builds a record from one row of cell text, or `None` if the row is unusable.
fn parse_row(
    tab: &str,
    material: &str,
    diameter: &str,
    qty: &str,
    length: &str,
) -> Option<DemandRecord> {
    let quantity = parse_quantity(qty)?;
    let length = parse_length(length)?;
    let diameter = parse_length(diameter)?;
    match DemandRecord::new(tab, material, diameter, length, quantity) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(section = tab, error = %e, "row dropped");
            None
        }
    }
}

fn cell_text(range: &Range<Data>, row: u32, col: u32) -> String {
    match range.get_value((row, col)) {
        None | Some(Data::Empty) => String::new(),
        Some(cell) => cell.to_string(),
    }
}

fn load_section<RS: Read + Seek>(
    workbook: &mut Xlsx<RS>,
    section: &str,
) -> Result<Vec<DemandRecord>, LoadError> {
    let malformed = |message: String| LoadError::MalformedSection {
        section: section.to_string(),
        message,
    };
    let range = workbook
        .worksheet_range(section)
        .map_err(|e| malformed(e.to_string()))?;
    let (last_row, _) = range
        .end()
        .ok_or_else(|| malformed("sheet is empty".to_string()))?;

    let columns: Vec<u32> = (DEMAND_FIRST_COLUMN..DEMAND_FIRST_COLUMN + DEMAND_COLUMNS).collect();
    let headers: Vec<String> = columns.iter().map(|&c| cell_text(&range, 0, c)).collect();
    let map = HeaderMap::from_headers(section, headers.iter().map(String::as_str))?;

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in 1..=last_row {
        let text = |idx: usize| cell_text(&range, row, columns[idx]);
        let cells = [text(map.diameter), text(map.material), text(map.qty), text(map.length)];
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        match parse_row(section, &cells[1], &cells[0], &cells[2], &cells[3]) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    tracing::info!(section, rows = records.len(), dropped, "section loaded");
    Ok(records)
}

/// Reads every demand section of an `.xlsx`/`.xlsm` workbook.
pub fn load_workbook<RS: Read + Seek>(reader: RS) -> Result<Vec<DemandRecord>, LoadError> {
    let mut workbook: Xlsx<RS> =
        Xlsx::new(reader).map_err(|e| LoadError::Workbook(e.to_string()))?;

    let mut records = Vec::new();
    let mut loaded = 0usize;
    for section in DEMAND_SECTIONS {
        match load_section(&mut workbook, section) {
            Ok(rows) => {
                records.extend(rows);
                loaded += 1;
            }
            Err(e) => tracing::warn!(section, error = %e, "failed to load section"),
        }
    }

    if loaded == 0 {
        return Err(LoadError::NoSectionsLoaded);
    }
    Ok(records)
}

/// Reads demand from CSV. Rows without a `tab` column use `default_tab`.
pub fn load_csv<R: Read>(reader: R, default_tab: &str) -> Result<Vec<DemandRecord>, LoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let map = HeaderMap::from_headers(default_tab, headers.iter())?;

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for result in reader.records() {
        let row = result?;
        let field = |idx: usize| row.get(idx).unwrap_or("");
        if row.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        let tab = match map.tab.map(field).map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => default_tab,
        };
        match parse_row(
            tab,
            field(map.material),
            field(map.diameter),
            field(map.qty),
            field(map.length),
        ) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    tracing::info!(section = default_tab, rows = records.len(), dropped, "csv loaded");
    Ok(records)
}

/// Loads demand from a workbook or CSV file, chosen by extension.
pub fn load_demand(path: &Path) -> Result<Vec<DemandRecord>, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "xlsx" | "xlsm" => load_workbook(BufReader::new(File::open(path)?)),
        "csv" => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("csv");
            load_csv(File::open(path)?, stem)
        }
        _ => Err(LoadError::UnsupportedFormat(ext)),
    }
}
