//! Reference table sources.
//!
//! CSV is read by header name so column order and extra columns don't
//! matter. JSON is an array of row objects, the shape a spreadsheet's first
//! sheet exports to.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::{TableError, TableResult};
use crate::models::DrugRecord;

pub const PRODUCT_COLUMN: &str = "商品名";
pub const GENERIC_COLUMN: &str = "一般名";
pub const PERIOD_COLUMN: &str = "休薬期間";

/// Read all rows from a `.csv` or `.json` file.
pub fn read_records(path: &Path) -> TableResult<Vec<DrugRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    match extension.as_str() {
        "csv" => read_csv(reader),
        "json" => read_json(reader),
        _ => Err(TableError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Read rows from CSV with a header row.
pub fn read_csv<R: Read>(reader: R) -> TableResult<Vec<DrugRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{FEFF}') == name)
            .ok_or(TableError::MissingColumn(name))
    };
    let product_idx = column(PRODUCT_COLUMN)?;
    let generic_idx = column(GENERIC_COLUMN)?;
    let period_idx = column(PERIOD_COLUMN)?;

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let cell = |idx: usize| row.get(idx).unwrap_or("");

        // Rows that are entirely blank are spreadsheet padding
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let period = cell(period_idx).trim();
        records.push(DrugRecord {
            product_name: cell(product_idx).to_string(),
            generic_name: cell(generic_idx).to_string(),
            withdrawal_period: (!period.is_empty()).then(|| period.to_string()),
        });
    }

    Ok(records)
}

/// Read rows from a JSON array of objects.
pub fn read_json<R: Read>(reader: R) -> TableResult<Vec<DrugRecord>> {
    Ok(serde_json::from_reader(reader)?)
}
