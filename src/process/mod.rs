// src/process/mod.rs
pub mod chunk;
pub mod raw_table;
pub mod reshape;
pub mod split;
pub mod tags;

pub use chunk::{chunk_years, TimePeriodMap, YearChunks, YearRange};
pub use raw_table::{Cell, RawTable};
pub use reshape::{reshape, ReshapeOptions};
pub use split::{prune_boilerplate_columns, relabel_columns, split_by, stamp_columns};

/// Failures in table processing that callers may want to tell apart.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("column `{0}` not found in table")]
    MissingColumn(String),
    #[error("cannot split by unknown column `{0}`")]
    UnknownSplitColumn(String),
    #[error("invalid year range {start}-{end}")]
    InvalidRange { start: i32, end: i32 },
}
