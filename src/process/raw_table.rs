// src/process/raw_table.rs

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// A single CSV cell after type sniffing.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Blank fields are missing, finite numbers are numbers, the rest is text.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Cell::Missing;
        }
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Missing, or text that is empty once trimmed.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numbers first (numerically), then text (lexically), missing last.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Number(_), _) => Ordering::Less,
            (_, Cell::Number(_)) => Ordering::Greater,
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Text(_), Cell::Missing) => Ordering::Less,
            (Cell::Missing, Cell::Text(_)) => Ordering::Greater,
            (Cell::Missing, Cell::Missing) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Text(s) => f.write_str(s),
            // f64's Display already drops the ".0" of integral values
            Cell::Number(n) => write!(f, "{}", n),
        }
    }
}

/// An in-memory CSV table with ordered, named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    /// One `Vec<Cell>` per row, always `headers.len()` long.
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Parse CSV bytes encoded as ISO-8859-1. Short records are padded with
    /// missing cells, long ones truncated to the header width.
    pub fn from_latin1_csv(bytes: &[u8]) -> Result<Self> {
        let text = encoding_rs::mem::decode_latin1(bytes);
        Self::from_csv_str(&text)
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .context("reading CSV header")?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let width = headers.len();

        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
            let mut row: Vec<Cell> = record.iter().take(width).map(Cell::parse).collect();
            row.resize(width, Cell::Missing);
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |r| &r[idx])
    }

    /// Insert a column at `idx`; `cells` must be one per row.
    pub fn insert_column(&mut self, idx: usize, name: String, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.rows.len());
        self.headers.insert(idx, name);
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.insert(idx, cell);
        }
    }

    /// Append a column filled with `first` in row 0 and `rest` everywhere else.
    pub fn push_column(&mut self, name: &str, first: Cell, rest: Cell) {
        self.headers.push(name.to_string());
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.push(if i == 0 { first.clone() } else { rest.clone() });
        }
    }

    pub fn remove_column(&mut self, idx: usize) -> String {
        for row in &mut self.rows {
            row.remove(idx);
        }
        self.headers.remove(idx)
    }

    /// Append the rows of `other`, aligning columns by name. Columns only
    /// present in `other` are added at the end and back-filled as missing.
    pub fn append(&mut self, other: RawTable) {
        if self.headers.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }

        for name in &other.headers {
            if !self.has_column(name) {
                self.headers.push(name.clone());
                for row in &mut self.rows {
                    row.push(Cell::Missing);
                }
            }
        }

        let positions: HashMap<&str, usize> = other
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();
        let mapping: Vec<Option<usize>> = self
            .headers
            .iter()
            .map(|h| positions.get(h.as_str()).copied())
            .collect();

        for mut src in other.rows {
            let row = mapping
                .iter()
                .map(|m| match m {
                    Some(i) => std::mem::replace(&mut src[*i], Cell::Missing),
                    None => Cell::Missing,
                })
                .collect();
            self.rows.push(row);
        }
    }

    /// Write headers and all rows as UTF-8 CSV, truncating any existing file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        self.write_to(BufWriter::new(file))
            .with_context(|| format!("writing {}", path.display()))
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}
