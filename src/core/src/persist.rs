//! Columnar payloads for saving and restoring intervals and series.
//!
//! A [`Payload`] names the class it was produced from, carries its data as
//! named columns and, for arrays, the shape. Timestamps and interval bounds
//! are stored as integer microseconds, values as floats that restore
//! bit-identical, non-finite values included.

use std::fmt;
use std::io;

use neuroseries_utils::time::TimeUnit;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::interval::IntervalSet;
use crate::series::{Frame, Ts, Tsd, TsdFrame};

pub const START: &str = "start";
pub const END: &str = "end";
pub const TIMESTAMP: &str = "timestamp";
pub const VALUE: &str = "value";
pub const DATA: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassTag {
    IntervalSet,
    Ts,
    Tsd,
    TsdFrame,
    NdArray,
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Float cells are written as JSON numbers when finite. The canonical `NaN`
/// is `null`, infinities are the strings `"inf"` and `"-inf"`, and any other
/// `NaN` is `"nan:0x"` followed by its 16 hex digit bit pattern, so a restored
/// column is bit-identical to the written one.
mod float_cells {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const INF: &str = "inf";
    const NEG_INF: &str = "-inf";
    const NAN_PREFIX: &str = "nan:0x";

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Number(f64),
        Token(String),
    }

    fn encode(v: f64) -> Option<Cell> {
        if v.is_finite() {
            Some(Cell::Number(v))
        } else if v.is_nan() {
            (v.to_bits() != f64::NAN.to_bits())
                .then(|| Cell::Token(format!("{}{:016x}", NAN_PREFIX, v.to_bits())))
        } else if v > 0.0 {
            Some(Cell::Token(INF.to_string()))
        } else {
            Some(Cell::Token(NEG_INF.to_string()))
        }
    }

    fn decode(token: &str) -> Option<f64> {
        match token {
            INF => Some(f64::INFINITY),
            NEG_INF => Some(f64::NEG_INFINITY),
            _ => {
                let bits = u64::from_str_radix(token.strip_prefix(NAN_PREFIX)?, 16).ok()?;
                Some(f64::from_bits(bits))
            }
        }
    }

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(values.iter().map(|&v| encode(v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let raw: Vec<Option<Cell>> = Vec::deserialize(d)?;
        raw.into_iter()
            .map(|cell| match cell {
                None => Ok(f64::NAN),
                Some(Cell::Number(v)) => Ok(v),
                Some(Cell::Token(t)) => {
                    decode(&t).ok_or_else(|| D::Error::custom(format!("invalid float cell {:?}", t)))
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnValues {
    Int(Vec<i64>),
    Float(#[serde(with = "float_cells")] Vec<f64>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub class: ClassTag,
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
}

impl Payload {
    pub fn new(class: ClassTag) -> Self {
        Self {
            class,
            columns: vec![],
            shape: None,
        }
    }

    pub fn with_int(mut self, name: &str, values: Vec<i64>) -> Self {
        self.columns.push(Column {
            name: name.to_string(),
            values: ColumnValues::Int(values),
        });
        self
    }

    pub fn with_float(mut self, name: &str, values: Vec<f64>) -> Self {
        self.columns.push(Column {
            name: name.to_string(),
            values: ColumnValues::Float(values),
        });
        self
    }

    /// expect_class fails unless the payload was produced from `class`.
    pub fn expect_class(&self, class: ClassTag) -> Result<()> {
        if self.class != class {
            return Err(Error::ClassMismatch {
                expected: class,
                found: self.class,
            });
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Result<&ColumnValues> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.values)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    pub fn int_column(&self, name: &str) -> Result<&[i64]> {
        match self.column(name)? {
            ColumnValues::Int(v) => Ok(v),
            ColumnValues::Float(_) => Err(Error::ColumnType(name.to_string())),
        }
    }

    pub fn float_column(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            ColumnValues::Float(v) => Ok(v),
            ColumnValues::Int(_) => Err(Error::ColumnType(name.to_string())),
        }
    }

    pub fn to_writer<W: io::Write>(&self, w: W) -> Result<()> {
        serde_json::to_writer(w, self)?;
        Ok(())
    }

    pub fn from_reader<R: io::Read>(r: R) -> Result<Self> {
        Ok(serde_json::from_reader(r)?)
    }
}

/// Persist converts a value to and from its columnar payload.
pub trait Persist: Sized {
    const CLASS: ClassTag;

    fn persist(&self) -> Payload;

    fn restore(payload: &Payload) -> Result<Self>;
}

impl Persist for IntervalSet {
    const CLASS: ClassTag = ClassTag::IntervalSet;

    fn persist(&self) -> Payload {
        Payload::new(Self::CLASS)
            .with_int(START, self.start().to_vec())
            .with_int(END, self.end().to_vec())
    }

    fn restore(payload: &Payload) -> Result<Self> {
        payload.expect_class(Self::CLASS)?;
        let start = payload.int_column(START)?;
        let end = payload.int_column(END)?;
        Ok(IntervalSet::from_micros(start.to_vec(), end.to_vec()))
    }
}

impl Persist for Ts {
    const CLASS: ClassTag = ClassTag::Ts;

    fn persist(&self) -> Payload {
        Payload::new(Self::CLASS).with_int(TIMESTAMP, self.timestamps().to_vec())
    }

    fn restore(payload: &Payload) -> Result<Self> {
        payload.expect_class(Self::CLASS)?;
        let timestamps = payload.int_column(TIMESTAMP)?;
        Ok(Ts::new(timestamps, TimeUnit::Us))
    }
}

impl Persist for Tsd {
    const CLASS: ClassTag = ClassTag::Tsd;

    fn persist(&self) -> Payload {
        Payload::new(Self::CLASS)
            .with_int(TIMESTAMP, self.timestamps().to_vec())
            .with_float(VALUE, self.data().to_vec())
    }

    fn restore(payload: &Payload) -> Result<Self> {
        payload.expect_class(Self::CLASS)?;
        let timestamps = payload.int_column(TIMESTAMP)?;
        let values = payload.float_column(VALUE)?;
        Tsd::new(timestamps, values.to_vec(), TimeUnit::Us)
    }
}

impl Persist for TsdFrame {
    const CLASS: ClassTag = ClassTag::TsdFrame;

    fn persist(&self) -> Payload {
        let frame = self.samples();
        frame.columns().iter().enumerate().fold(
            Payload::new(Self::CLASS).with_int(TIMESTAMP, self.timestamps().to_vec()),
            |p, (i, name)| p.with_float(name, frame.column_at(i).to_vec()),
        )
    }

    /// The index is always the first column, so a value column may share its
    /// name.
    fn restore(payload: &Payload) -> Result<Self> {
        payload.expect_class(Self::CLASS)?;
        let (index, columns) = match payload.columns.split_first() {
            Some((index, columns)) if index.name == TIMESTAMP => (index, columns),
            _ => return Err(Error::MissingColumn(TIMESTAMP.to_string())),
        };
        let timestamps = match &index.values {
            ColumnValues::Int(v) => v,
            ColumnValues::Float(_) => return Err(Error::ColumnType(TIMESTAMP.to_string())),
        };

        let mut names = vec![];
        let mut values = vec![];
        for column in columns {
            match &column.values {
                ColumnValues::Float(v) => {
                    names.push(column.name.clone());
                    values.push(v.clone());
                }
                ColumnValues::Int(_) => return Err(Error::ColumnType(column.name.clone())),
            }
        }

        let frame = Frame::new(names, values)?;
        TsdFrame::new(timestamps, frame, TimeUnit::Us)
    }
}

/// NdArray is a flat f64 buffer with a row-major shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NdArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        if shape.iter().product::<usize>() != data.len() {
            return Err(Error::BadShape {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

impl Persist for NdArray {
    const CLASS: ClassTag = ClassTag::NdArray;

    fn persist(&self) -> Payload {
        let mut p = Payload::new(Self::CLASS).with_float(DATA, self.data.clone());
        p.shape = Some(self.shape.clone());
        p
    }

    fn restore(payload: &Payload) -> Result<Self> {
        payload.expect_class(Self::CLASS)?;
        let data = payload.float_column(DATA)?.to_vec();
        // a missing shape reads as a flat array
        let shape = payload.shape.clone().unwrap_or_else(|| vec![data.len()]);
        NdArray::new(shape, data)
    }
}
