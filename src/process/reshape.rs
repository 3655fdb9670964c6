// src/process/reshape.rs

use anyhow::Result;
use tracing::debug;

use super::raw_table::{Cell, RawTable};
use super::tags;
use super::ProcessError;

pub const DEFAULT_VALUE_COLUMN: &str = "OBS_VALUE";
pub const DEFAULT_TIME_COLUMN: &str = "TIME_PERIOD";
pub const DEFAULT_CODE_SUFFIX: &str = " code";
pub const DEFAULT_VALUE_TAG: &str = "#indicator+value+num";
pub const TIME_TAG: &str = "#date";

#[derive(Debug, Clone)]
pub struct ReshapeOptions {
    pub value_column: String,
    pub time_column: String,
    /// Keep the code part of compound cells in a sibling column.
    pub store_code: bool,
    pub code_suffix: String,
    pub value_tag: String,
}

impl Default for ReshapeOptions {
    fn default() -> Self {
        Self {
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            store_code: false,
            code_suffix: DEFAULT_CODE_SUFFIX.to_string(),
            value_tag: DEFAULT_VALUE_TAG.to_string(),
        }
    }
}

/// Turn a downloaded table into its published shape: compound cells split,
/// rows without a value dropped, rows sorted by period and the HXL tag row
/// prepended as row 0.
pub fn reshape(table: RawTable, opts: &ReshapeOptions) -> Result<RawTable> {
    for required in [&opts.value_column, &opts.time_column] {
        if !table.has_column(required) {
            return Err(ProcessError::MissingColumn(required.clone()).into());
        }
    }

    let before = table.num_rows();
    let mut table = split_code_columns(table, opts);
    drop_rows_without_value(&mut table, &opts.value_column);
    sort_by_column(&mut table, &opts.time_column);
    debug!(before, after = table.num_rows(), "reshaped rows");

    let hxl = hxl_row(&table.headers, opts);
    table.rows.insert(0, hxl);
    Ok(table)
}

/// `"F: Female"` → `"Female"`, and `"F"` into `<column><suffix>` when
/// `store_code` is set. Cells without a colon and non-text cells are kept.
pub fn split_code_columns(mut table: RawTable, opts: &ReshapeOptions) -> RawTable {
    let mut idx = 0;
    while idx < table.headers.len() {
        if !tags::is_splittable(&table.headers[idx]) {
            idx += 1;
            continue;
        }

        let mut codes = Vec::with_capacity(table.rows.len());
        for row in &mut table.rows {
            let (label, code) = split_cell(&row[idx]);
            row[idx] = label;
            codes.push(code);
        }

        if opts.store_code {
            let name = format!("{}{}", table.headers[idx], opts.code_suffix);
            table.insert_column(idx + 1, name, codes);
            idx += 2;
        } else {
            idx += 1;
        }
    }
    table
}

/// (label, code) halves of one cell.
fn split_cell(cell: &Cell) -> (Cell, Cell) {
    match cell {
        Cell::Text(s) => match s.split_once(':') {
            Some((code, label)) => (Cell::text(label.trim()), Cell::text(code.trim())),
            None => (cell.clone(), cell.clone()),
        },
        other => (other.clone(), other.clone()),
    }
}

fn drop_rows_without_value(table: &mut RawTable, value_column: &str) {
    if let Some(idx) = table.column_index(value_column) {
        table.rows.retain(|row| !row[idx].is_blank());
    }
}

fn sort_by_column(table: &mut RawTable, column: &str) {
    if let Some(idx) = table.column_index(column) {
        // sort_by is stable
        table.rows.sort_by(|a, b| a[idx].sort_cmp(&b[idx]));
    }
}

/// One tag per column; columns without a known tag get an empty cell.
pub fn hxl_row(headers: &[String], opts: &ReshapeOptions) -> Vec<Cell> {
    headers
        .iter()
        .map(|name| {
            if *name == opts.time_column {
                return Cell::text(TIME_TAG);
            }
            if *name == opts.value_column {
                return Cell::text(opts.value_tag.as_str());
            }
            if let Some(tag) = tags::tag_for(name) {
                return Cell::text(tag);
            }
            name.strip_suffix(opts.code_suffix.as_str())
                .and_then(tags::tag_for)
                .map(|tag| Cell::text(format!("{}+code", tag)))
                .unwrap_or(Cell::Missing)
        })
        .collect()
}
