//! Reading delimited files and spreadsheets into a [`Table`].
//!
//! Only structural problems are errors here (unsupported type, unreadable
//! stream, no header). Cell-level garbage is kept as text and later read as
//! missing by the schema layer.

use crate::errors::{AppError, ResultExt};
use crate::table::{Cell, Table};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xls", "xlsx", "xlsm", "xlsb", "ods"];

/// Zip container (xlsx/xlsm/ods) or OLE compound file (xls).
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Loads a table from disk, choosing the reader by file extension.
pub fn load_path(path: &Path) -> Result<Table, AppError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let is_csv = extension == "csv";
    let is_spreadsheet = SPREADSHEET_EXTENSIONS.contains(&extension.as_str());
    if !is_csv && !is_spreadsheet {
        return Err(AppError::InputFormat(
            "Unsupported file type. Use .csv or .xlsx".to_string(),
        ));
    }

    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    tracing::debug!("Read {} bytes from {}", bytes.len(), path.display());

    if is_csv {
        read_csv(&bytes)
    } else {
        read_spreadsheet(&bytes)
    }
}

/// Reads an uploaded payload whose type is not known up front.
///
/// Spreadsheet containers are recognized by their magic bytes; anything else
/// is tried as CSV first and as a spreadsheet second.
pub fn read_upload(bytes: &[u8]) -> Result<Table, AppError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(AppError::InputFormat(
            "No columns to parse from file".to_string(),
        ));
    }

    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        return read_spreadsheet(bytes);
    }

    match read_csv(bytes) {
        Ok(table) => Ok(table),
        Err(csv_err) => {
            tracing::debug!("CSV parse failed ({}), trying spreadsheet", csv_err);
            read_spreadsheet(bytes).map_err(|_| csv_err)
        }
    }
}

/// Parses CSV bytes. The first record is the header.
pub fn read_csv(bytes: &[u8]) -> Result<Table, AppError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    let mut table = Table::new(finish_headers(headers)?);
    for result in rdr.records() {
        let record = result?;
        table.push_row(record.iter().map(Cell::from_text).collect());
    }

    tracing::debug!(
        "Parsed CSV: {} columns, {} rows",
        table.columns.len(),
        table.len()
    );
    Ok(table)
}

/// Parses the first worksheet of an xls/xlsx/xlsm/xlsb/ods workbook.
pub fn read_spreadsheet(bytes: &[u8]) -> Result<Table, AppError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::InputFormat("Workbook has no worksheets".to_string()))??;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| data_to_cell(c).to_string()).collect())
        .unwrap_or_default();

    let mut table = Table::new(finish_headers(headers)?);
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(data_to_cell).collect();
        if cells.iter().all(Cell::is_null) {
            continue;
        }
        table.push_row(cells);
    }

    tracing::debug!(
        "Parsed spreadsheet: {} columns, {} rows",
        table.columns.len(),
        table.len()
    );
    Ok(table)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        // Integers keep their exact digits
        Data::Int(i) => Cell::Text(i.to_string()),
        Data::Float(f) if f.is_finite() => Cell::Number(*f),
        Data::Float(_) => Cell::Null,
        Data::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Data::String(s) => Cell::from_text(s),
        other => Cell::Text(other.to_string()),
    }
}

/// Trims headers and names blank ones `Unnamed: {idx}`.
fn finish_headers(headers: Vec<String>) -> Result<Vec<String>, AppError> {
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(AppError::InputFormat(
            "No columns to parse from file".to_string(),
        ));
    }

    Ok(headers
        .into_iter()
        .enumerate()
        .map(|(idx, h)| {
            let h = h.trim();
            if h.is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                h.to_string()
            }
        })
        .collect())
}
