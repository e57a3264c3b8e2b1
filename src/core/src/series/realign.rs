use std::fmt;
use std::str::FromStr;

use neuroseries_utils::time::{format_timestamps, RawTimestamp, TimeUnit};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::series::samples::Samples;
use crate::series::time_series::TimeSeries;

/// Align selects which sample a target timestamp takes during realignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    /// nearest sample, the later one at equal distance
    #[default]
    Closest,
    /// first sample at or after the target
    Next,
    /// last sample at or before the target
    Prev,
}

impl Align {
    /// select returns the row of `timestamps` that `target` takes, if any.
    /// `timestamps` must be sorted.
    pub fn select(&self, timestamps: &[i64], target: i64) -> Option<usize> {
        let next = timestamps.partition_point(|&t| t < target);
        let after = (next < timestamps.len()).then_some(next);

        match self {
            Align::Next => after,
            Align::Prev => timestamps.partition_point(|&t| t <= target).checked_sub(1),
            Align::Closest => match (next.checked_sub(1), after) {
                (Some(p), Some(n)) => {
                    if target.abs_diff(timestamps[p]) < timestamps[n].abs_diff(target) {
                        Some(p)
                    } else {
                        Some(n)
                    }
                }
                (p, n) => n.or(p),
            },
        }
    }
}

impl FromStr for Align {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closest" | "nearest" => Ok(Align::Closest),
            "next" | "bfill" | "backfill" => Ok(Align::Next),
            "prev" | "ffill" | "pad" => Ok(Align::Prev),
            _ => Err(Error::InvalidAlignMode(s.to_string())),
        }
    }
}

impl fmt::Display for Align {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Align::Closest => "closest",
            Align::Next => "next",
            Align::Prev => "prev",
        })
    }
}

impl<D: Samples> TimeSeries<D> {
    /// realign returns one row per distinct target timestamp, taking the
    /// sample chosen by `align`. Targets without a candidate get a NaN row.
    pub fn realign<T: RawTimestamp>(&self, target: &[T], unit: TimeUnit, align: Align) -> Self {
        let mut target = format_timestamps(target, unit, true);
        target.dedup();
        self.realign_micros(target, align)
    }

    /// realign_to realigns onto the timestamps of `other`.
    pub fn realign_to<E: Samples>(&self, other: &TimeSeries<E>, align: Align) -> Self {
        self.realign_micros(other.timestamps().to_vec(), align)
    }

    fn realign_micros(&self, target: Vec<i64>, align: Align) -> Self {
        let rows: Vec<Option<usize>> = target
            .iter()
            .map(|&t| align.select(self.timestamps(), t))
            .collect();

        let missing = rows.iter().filter(|r| r.is_none()).count();
        if missing > 0 {
            tracing::debug!(missing, targets = target.len(), %align, "realign left rows without a sample");
        }

        let data = self.samples().take(&rows);
        Self::from_sorted(target, data, None)
    }
}
