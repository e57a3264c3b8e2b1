use neuroseries_utils::time::TimeUnitError;

use crate::persist::ClassTag;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    InvalidUnit(#[from] TimeUnitError),

    #[error("unrecognized realign method: {0:?}")]
    InvalidAlignMode(String),

    #[error("unrecognized gap method: {0:?}")]
    InvalidGapMethod(String),

    #[error("no active range, `r` is only available inside a Range scope")]
    NoActiveRange,

    #[error("shape mismatch: {timestamps} timestamps but {values} values")]
    ShapeMismatch { timestamps: usize, values: usize },

    #[error("frame has {names} column names but {columns} columns")]
    ColumnCount { names: usize, columns: usize },

    #[error("frame column {column:?} has {found} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("event windows overlap, {events} events merged into {intervals} intervals")]
    OverlappingWindows { events: usize, intervals: usize },

    #[error("empty event window [{start}, {end}]")]
    EmptyWindow { start: i64, end: i64 },

    #[error("payload class mismatch: expected {expected}, found {found}")]
    ClassMismatch { expected: ClassTag, found: ClassTag },

    #[error("payload has no column {0:?}")]
    MissingColumn(String),

    #[error("payload column {0:?} has the wrong element type")]
    ColumnType(String),

    #[error("payload shape {shape:?} does not hold {len} values")]
    BadShape { shape: Vec<usize>, len: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
