// src/process/split.rs

use anyhow::Result;
use std::collections::{btree_map, BTreeMap, HashSet};
use tracing::{debug, trace};

use super::raw_table::{Cell, RawTable};
use super::tags;
use super::ProcessError;

pub const COUNTRY_ISO3_COLUMN: &str = "country-iso3";
pub const COUNTRY_ISO3_TAG: &str = "#country+iso3";
pub const INDICATOR_NAME_COLUMN: &str = "Indicator name";
pub const INDICATOR_NAME_TAG: &str = "#indicator+name";

/// Partition a reshaped table (row 0 = HXL row) by the distinct values of
/// `column`. Every part keeps the HXL row and loses the split column. Parts
/// come out in ascending order of their value; missing values group under `""`.
/// With no column the table is yielded once, untouched, with key `None`.
pub fn split_by(table: RawTable, column: Option<&str>) -> Result<SplitParts> {
    let Some(column) = column else {
        return Ok(SplitParts::Whole(Some(table)));
    };
    let idx = table
        .column_index(column)
        .ok_or_else(|| ProcessError::UnknownSplitColumn(column.to_string()))?;

    let RawTable { mut headers, rows } = table;
    headers.remove(idx);

    let mut rows = rows.into_iter();
    let mut header_row = rows.next().unwrap_or_default();
    if !header_row.is_empty() {
        header_row.remove(idx);
    }

    let mut groups: BTreeMap<String, Vec<Vec<Cell>>> = BTreeMap::new();
    for mut row in rows {
        let key = row.remove(idx).to_string();
        groups.entry(key).or_default().push(row);
    }
    debug!(column, parts = groups.len(), "split table");

    Ok(SplitParts::Grouped {
        headers,
        header_row,
        groups: groups.into_iter(),
    })
}

/// Lazy sequence of `(value, part)` produced by [`split_by`].
pub enum SplitParts {
    Whole(Option<RawTable>),
    Grouped {
        headers: Vec<String>,
        header_row: Vec<Cell>,
        groups: btree_map::IntoIter<String, Vec<Vec<Cell>>>,
    },
}

impl Iterator for SplitParts {
    type Item = (Option<String>, RawTable);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SplitParts::Whole(table) => table.take().map(|t| (None, t)),
            SplitParts::Grouped {
                headers,
                header_row,
                groups,
            } => {
                let (key, data) = groups.next()?;
                let mut rows = Vec::with_capacity(data.len() + 1);
                rows.push(header_row.clone());
                rows.extend(data);
                Some((
                    Some(key),
                    RawTable {
                        headers: headers.clone(),
                        rows,
                    },
                ))
            }
        }
    }
}

/// Drop every column whose data rows all hold the same boilerplate text
/// ("Total", "Not applicable", "All ages", ...). Row 0 is the HXL row.
pub fn prune_boilerplate_columns(table: &mut RawTable) {
    let useless: Vec<usize> = (0..table.headers.len())
        .filter(|&idx| {
            let distinct: HashSet<String> = table
                .rows
                .iter()
                .skip(1)
                .map(|r| match &r[idx] {
                    Cell::Text(s) => format!("t:{}", s),
                    other => format!("o:{}", other),
                })
                .collect();
            distinct.len() == 1
                && table.rows[1][idx]
                    .as_text()
                    .map(tags::is_boilerplate)
                    .unwrap_or(false)
        })
        .collect();

    for idx in useless.into_iter().rev() {
        let name = table.remove_column(idx);
        trace!(column = %name, "dropped boilerplate column");
    }
}

/// Rename short-code columns (`SEX`, `SEX code`) to their labels (`Sex`,
/// `Sex code`) unless that label is already taken.
pub fn relabel_columns(table: &mut RawTable, code_suffix: &str) {
    for idx in 0..table.headers.len() {
        let name = &table.headers[idx];
        let relabelled = match tags::label_for_code(name) {
            Some(label) => label.to_string(),
            None => match name
                .strip_suffix(code_suffix)
                .and_then(tags::label_for_code)
            {
                Some(label) => format!("{}{}", label, code_suffix),
                None => continue,
            },
        };
        if !table.has_column(&relabelled) {
            table.headers[idx] = relabelled;
        }
    }
}

/// Append the constant `country-iso3` and `Indicator name` columns.
pub fn stamp_columns(table: &mut RawTable, iso3: &str, indicator_name: Option<&str>) {
    table.push_column(
        COUNTRY_ISO3_COLUMN,
        Cell::text(COUNTRY_ISO3_TAG),
        Cell::text(iso3),
    );
    table.push_column(
        INDICATOR_NAME_COLUMN,
        Cell::text(INDICATOR_NAME_TAG),
        indicator_name.map(Cell::text).unwrap_or(Cell::Missing),
    );
}
