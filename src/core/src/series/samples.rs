use std::fmt::Debug;

use crate::error::{Error, Result};

/// Samples is the payload of a time series, one row per timestamp.
pub trait Samples: Clone + Debug + PartialEq + 'static {
    /// len returns the number of rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// take gathers the given rows in order. `None` rows are filled with NaN.
    fn take(&self, rows: &[Option<usize>]) -> Self;

    /// column_names returns the display names of the payload columns.
    fn column_names(&self) -> Vec<String>;

    /// row returns the values of row `i` across columns.
    fn row(&self, i: usize) -> Vec<f64>;
}

/// NoData is the empty payload of a timestamp-only series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoData {
    len: usize,
}

impl NoData {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Samples for NoData {
    fn len(&self) -> usize {
        self.len
    }

    fn take(&self, rows: &[Option<usize>]) -> Self {
        Self { len: rows.len() }
    }

    fn column_names(&self) -> Vec<String> {
        vec![]
    }

    fn row(&self, _i: usize) -> Vec<f64> {
        vec![]
    }
}

fn gather(values: &[f64], rows: &[Option<usize>]) -> Vec<f64> {
    rows.iter()
        .map(|r| r.map_or(f64::NAN, |i| values[i]))
        .collect()
}

impl Samples for Vec<f64> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn take(&self, rows: &[Option<usize>]) -> Self {
        gather(self, rows)
    }

    fn column_names(&self) -> Vec<String> {
        vec![DEFAULT_COLUMN.to_string()]
    }

    fn row(&self, i: usize) -> Vec<f64> {
        vec![self[i]]
    }
}

pub const DEFAULT_COLUMN: &str = "value";

/// Frame is a set of named, equally long f64 columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
    height: usize,
}

impl Frame {
    /// new builds a frame from column names and column values. Every column
    /// must have the same length and every name a column.
    pub fn new(columns: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(Error::ColumnCount {
                names: columns.len(),
                columns: values.len(),
            });
        }

        let height = values.first().map_or(0, |c| c.len());
        if let Some((name, c)) = columns.iter().zip(&values).find(|(_, c)| c.len() != height) {
            return Err(Error::ColumnLength {
                column: name.clone(),
                expected: height,
                found: c.len(),
            });
        }

        Ok(Self {
            columns,
            values,
            height,
        })
    }

    /// from_column wraps a single column.
    pub fn from_column(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            columns: vec![name.into()],
            height: values.len(),
            values: vec![values],
        }
    }

    /// from_rows builds a frame from row-major values.
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let mut values = vec![Vec::with_capacity(rows.len()); columns.len()];
        for row in rows {
            if row.len() != columns.len() {
                return Err(Error::ColumnCount {
                    names: columns.len(),
                    columns: row.len(),
                });
            }
            for (c, v) in values.iter_mut().zip(row) {
                c.push(*v);
            }
        }
        Self::new(columns, values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        let i = self.columns.iter().position(|c| c == name)?;
        Some(&self.values[i])
    }

    pub fn column_at(&self, i: usize) -> &[f64] {
        &self.values[i]
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

impl Samples for Frame {
    fn len(&self) -> usize {
        self.height
    }

    fn take(&self, rows: &[Option<usize>]) -> Self {
        Self {
            columns: self.columns.clone(),
            values: self.values.iter().map(|c| gather(c, rows)).collect(),
            height: rows.len(),
        }
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn row(&self, i: usize) -> Vec<f64> {
        self.values.iter().map(|c| c[i]).collect()
    }
}
