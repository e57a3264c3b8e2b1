pub mod interval_set;
mod sweep;

pub use interval_set::{IntervalSet, MalformedInterval};
