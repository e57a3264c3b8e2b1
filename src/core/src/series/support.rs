use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::interval::IntervalSet;
use crate::series::samples::Samples;
use crate::series::time_series::TimeSeries;

/// GapMethod decides how `min_gap` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapMethod {
    /// `min_gap` is a duration in microseconds
    #[default]
    Absolute,
    /// `min_gap` multiplies the median sampling interval
    Median,
}

impl FromStr for GapMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absolute" => Ok(GapMethod::Absolute),
            "median" => Ok(GapMethod::Median),
            _ => Err(Error::InvalidGapMethod(s.to_string())),
        }
    }
}

impl fmt::Display for GapMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GapMethod::Absolute => "absolute",
            GapMethod::Median => "median",
        })
    }
}

fn median(values: &[i64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2] as f64,
        _ => (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0,
    }
}

/// gaps returns the spans between consecutive samples that are longer than
/// the threshold. The samples themselves are excluded: a gap between `a` and
/// `b` is `[a + 1, b - 1]`.
pub fn gaps<D: Samples>(series: &TimeSeries<D>, min_gap: f64, method: GapMethod) -> IntervalSet {
    let t = series.timestamps();
    if t.len() < 2 {
        return IntervalSet::empty();
    }

    // saturates for samples further apart than i64 can span, which is a gap
    // under any threshold
    let diffs: Vec<i64> = t.windows(2).map(|w| w[1].saturating_sub(w[0])).collect();
    let threshold = match method {
        GapMethod::Absolute => min_gap,
        GapMethod::Median => min_gap * median(&diffs),
    };

    // a difference of two or less leaves no time between the samples
    let (start, end) = t
        .windows(2)
        .zip(&diffs)
        .filter(|&(_, &d)| d as f64 > threshold && d > 2)
        .map(|(w, _)| (w[0] + 1, w[1] - 1))
        .unzip();

    let gaps = IntervalSet::from_parts(start, end);
    tracing::debug!(gaps = gaps.len(), threshold, %method, "computed gaps");
    gaps
}

/// support returns the span of the series, one microsecond wider on each
/// side, with the gaps taken out.
pub fn support<D: Samples>(series: &TimeSeries<D>, min_gap: f64, method: GapMethod) -> IntervalSet {
    let t = series.timestamps();
    match (t.first(), t.last()) {
        (Some(&first), Some(&last)) => {
            let span = IntervalSet::from_parts(vec![first.saturating_sub(1)], vec![last.saturating_add(1)]);
            span.set_diff(&gaps(series, min_gap, method))
        }
        _ => IntervalSet::empty(),
    }
}

impl<D: Samples> TimeSeries<D> {
    pub fn gaps(&self, min_gap: f64, method: GapMethod) -> IntervalSet {
        gaps(self, min_gap, method)
    }

    pub fn support(&self, min_gap: f64, method: GapMethod) -> IntervalSet {
        support(self, min_gap, method)
    }
}
