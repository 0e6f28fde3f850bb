use crate::config::OUTPUT_STEM;
use crate::error::WriteError;
use crate::types::CutSheetRow;
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook};
use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const SHEET_NAME: &str = "Sheet1";

pub const HEADERS: [&str; 8] = [
    "Stick_ID",
    "Material",
    "Diameter_in",
    "Stick_length_in",
    "Pattern",
    "Pieces",
    "Drop_in",
    "tab",
];

/// Serializes the cut sheet as an xlsx workbook, one row per stick.
pub fn write_cut_sheet(rows: &[CutSheetRow]) -> Result<Vec<u8>, WriteError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    for (col, name) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, row.stick_id.as_str())?;
        sheet.write_string(r, 1, row.material.as_str())?;
        sheet.write_number(r, 2, row.diameter)?;
        sheet.write_number(r, 3, row.stock_length)?;
        sheet.write_string(r, 4, row.pattern_text())?;
        sheet.write_number(r, 5, row.piece_count as f64)?;
        sheet.write_number(r, 6, row.drop)?;
        sheet.write_string(r, 7, row.group_tab.as_str())?;
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn canonical_path(dir: &Path) -> PathBuf {
    dir.join(format!("{OUTPUT_STEM}.xlsx"))
}

/// Timestamped alternate used when the canonical file is locked.
pub fn fallback_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("{OUTPUT_STEM}_{}.xlsx", now.format("%Y%m%d_%H%M%S")))
}

/// A file held open by another program. Windows reports a workbook open in
/// Excel as a sharing (32) or lock (33) violation rather than access denied.
fn is_locked(e: &io::Error) -> bool {
    e.kind() == ErrorKind::PermissionDenied
        || (cfg!(windows) && matches!(e.raw_os_error(), Some(32 | 33)))
}

/// Opens the canonical cut sheet with `create`, or the timestamped
/// alternate when the canonical file is locked.
fn open_output<W>(
    dir: &Path,
    now: DateTime<Local>,
    mut create: impl FnMut(&Path) -> io::Result<W>,
) -> Result<(W, PathBuf), WriteError> {
    let target = canonical_path(dir);
    match create(&target) {
        Ok(out) => Ok((out, target)),
        Err(e) if is_locked(&e) => {
            let fallback = fallback_path(dir, now);
            tracing::warn!(
                locked = %target.display(),
                fallback = %fallback.display(),
                error = %e,
                "cut sheet locked, writing fallback"
            );
            Ok((create(&fallback)?, fallback))
        }
        Err(e) => Err(e.into()),
    }
}

/// Writes `Cut_sheet.xlsx` into `dir`, or a timestamped copy when the
/// canonical file is locked. Returns the path written.
pub fn write_to_dir(rows: &[CutSheetRow], dir: &Path) -> Result<PathBuf, WriteError> {
    let bytes = write_cut_sheet(rows)?;
    let (mut file, path) = open_output(dir, Local::now(), |p| File::create(p))?;
    file.write_all(&bytes)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "cut sheet written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Data, Reader, Xlsx};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn sample_row() -> CutSheetRow {
        CutSheetRow {
            stick_id: "C-0.375-239.25-0001".to_string(),
            material: "C".to_string(),
            diameter: 0.375,
            stock_length: 239.25,
            pattern: vec!["71 11/16".to_string(); 3],
            cuts: vec![71.6875; 3],
            piece_count: 3,
            drop: 23.9375,
            group_tab: "Rods_Curved".to_string(),
        }
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn test_write_cut_sheet() {
        let bytes = write_cut_sheet(&[sample_row()]).unwrap();
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();

        let header: Vec<String> = (0..8)
            .map(|c| range.get_value((0, c)).unwrap().to_string())
            .collect();
        assert_eq!(header, HEADERS);

        assert_eq!(
            range.get_value((1, 0)),
            Some(&Data::String("C-0.375-239.25-0001".to_string()))
        );
        assert_eq!(range.get_value((1, 2)), Some(&Data::Float(0.375)));
        assert_eq!(range.get_value((1, 3)), Some(&Data::Float(239.25)));
        assert_eq!(
            range.get_value((1, 4)),
            Some(&Data::String("71 11/16, 71 11/16, 71 11/16".to_string()))
        );
        assert_eq!(range.get_value((1, 5)), Some(&Data::Float(3.0)));
        assert_eq!(range.get_value((1, 6)), Some(&Data::Float(23.9375)));
        assert_eq!(
            range.get_value((1, 7)),
            Some(&Data::String("Rods_Curved".to_string()))
        );
        assert_eq!(range.end(), Some((1, 7)));
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_to_dir(&[sample_row()], dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Cut_sheet.xlsx"));
        let mut workbook: Xlsx<_> = calamine::open_workbook(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.height(), 2);
    }

    #[test]
    fn test_fallback_path() {
        let path = fallback_path(Path::new("/out"), fixed_now());
        assert_eq!(path, Path::new("/out/Cut_sheet_20250304_050607.xlsx"));
    }

    #[test]
    fn test_locked_output_falls_back() {
        let dir = Path::new("/out");
        let mut tried = Vec::new();
        let (out, path) = open_output(dir, fixed_now(), |p| {
            tried.push(p.to_path_buf());
            if p == canonical_path(dir) {
                Err(io::Error::from(ErrorKind::PermissionDenied))
            } else {
                Ok(Vec::<u8>::new())
            }
        })
        .unwrap();
        assert!(out.is_empty());
        assert_eq!(path, fallback_path(dir, fixed_now()));
        assert_eq!(tried, vec![canonical_path(dir), fallback_path(dir, fixed_now())]);
    }

    #[test]
    fn test_other_open_errors_propagate() {
        let result = open_output(Path::new("/out"), fixed_now(), |_| {
            Err::<Vec<u8>, _>(io::Error::from(ErrorKind::NotFound))
        });
        assert!(matches!(result, Err(WriteError::Io(e)) if e.kind() == ErrorKind::NotFound));
    }

    #[test]
    fn test_is_locked() {
        assert!(is_locked(&io::Error::from(ErrorKind::PermissionDenied)));
        assert!(!is_locked(&io::Error::from(ErrorKind::NotFound)));
    }

    #[cfg(windows)]
    #[test]
    fn test_sharing_violation_is_locked() {
        assert!(is_locked(&io::Error::from_raw_os_error(32)));
        assert!(is_locked(&io::Error::from_raw_os_error(33)));
    }
}
