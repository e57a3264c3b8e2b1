pub mod realign;
pub mod samples;
pub mod support;
pub mod time_series;
pub mod trial;

pub use realign::Align;
pub use samples::{Frame, NoData, Samples};
pub use support::GapMethod;
pub use time_series::{Data, TimeSeries, Ts, Tsd, TsdFrame, UnitSeries};
pub use trial::{peri_event, PeriEvent};
