pub mod error;
pub mod interval;
pub mod persist;
pub mod range;
pub mod series;

#[cfg(test)]
mod test_util;

pub use error::{Error, Result};
pub use interval::{IntervalSet, MalformedInterval};
pub use neuroseries_utils::time::TimeUnit;
pub use persist::{ClassTag, NdArray, Payload, Persist};
pub use range::{with_range, Range};
pub use series::{Align, Data, Frame, GapMethod, NoData, Samples, TimeSeries, Ts, Tsd, TsdFrame, UnitSeries};
