use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const US_PER_MS: i64 = 1_000;
pub const US_PER_S: i64 = 1_000_000;

/// TimeUnit is the unit a raw timestamp is expressed in. Timestamps are stored
/// as i64 microseconds everywhere, units only matter at the boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeUnit {
    #[default]
    #[serde(rename = "us")]
    Us,
    #[serde(rename = "ms")]
    Ms,
    #[serde(rename = "s")]
    S,
}

/// TimeUnitError is returned when a unit token is none of `us`, `ms`, `s`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized time units: {0:?}")]
pub struct TimeUnitError(pub String);

impl TimeUnit {
    /// factor returns the number of microseconds in one tick of the unit.
    pub fn factor(&self) -> i64 {
        match self {
            TimeUnit::Us => 1,
            TimeUnit::Ms => US_PER_MS,
            TimeUnit::S => US_PER_S,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
            TimeUnit::S => "s",
        }
    }

    /// to_unit converts canonical microseconds into this unit.
    pub fn to_unit(&self, us: i64) -> f64 {
        us as f64 / self.factor() as f64
    }

    /// from_unit converts a value in this unit into microseconds, rounding to
    /// the nearest tick.
    pub fn from_unit(&self, value: f64) -> i64 {
        value.to_micros(*self)
    }

    /// current returns the unit set by the innermost `units::scoped` guard on
    /// this thread, `Us` when there is none.
    pub fn current() -> TimeUnit {
        crate::units::current()
    }
}

impl FromStr for TimeUnit {
    type Err = TimeUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "us" | "usec" => Ok(TimeUnit::Us),
            "ms" => Ok(TimeUnit::Ms),
            "s" => Ok(TimeUnit::S),
            _ => Err(TimeUnitError(s.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RawTimestamp is a numeric value that can be scaled into canonical
/// microseconds.
pub trait RawTimestamp: Copy {
    fn to_micros(self, unit: TimeUnit) -> i64;
}

macro_rules! impl_raw_int {
    ($($t:ty),*) => {
        $(
            impl RawTimestamp for $t {
                #[inline]
                fn to_micros(self, unit: TimeUnit) -> i64 {
                    (self as i64).saturating_mul(unit.factor())
                }
            }
        )*
    };
}

macro_rules! impl_raw_float {
    ($($t:ty),*) => {
        $(
            impl RawTimestamp for $t {
                #[inline]
                fn to_micros(self, unit: TimeUnit) -> i64 {
                    // `as` saturates out of range values and maps NaN to 0
                    (self as f64 * unit.factor() as f64).round() as i64
                }
            }
        )*
    };
}

impl_raw_int!(i64, i32, i16, u32, u16);
impl_raw_float!(f64, f32);

/// format_timestamps converts raw timestamps in `unit` into sorted i64
/// microseconds. Unsorted input is sorted, with a warning unless the caller
/// says it expects the fix.
pub fn format_timestamps<T: RawTimestamp>(raw: &[T], unit: TimeUnit, warn_on_fix: bool) -> Vec<i64> {
    let mut ts: Vec<i64> = raw.iter().map(|v| v.to_micros(unit)).collect();

    if !is_sorted(&ts) {
        if warn_on_fix {
            tracing::warn!(len = ts.len(), unit = %unit, "timestamps are not sorted");
        }
        ts.sort_unstable();
    }

    ts
}

/// is_sorted returns true if ts is non-decreasing.
pub fn is_sorted(ts: &[i64]) -> bool {
    ts.windows(2).all(|w| w[0] <= w[1])
}

/// is_strictly_increasing returns true if ts has no ties and no inversions.
pub fn is_strictly_increasing(ts: &[i64]) -> bool {
    ts.windows(2).all(|w| w[0] < w[1])
}
