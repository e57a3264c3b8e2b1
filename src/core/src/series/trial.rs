use neuroseries_utils::time::TimeUnit;

use crate::error::{Error, Result};
use crate::interval::IntervalSet;
use crate::series::samples::Samples;
use crate::series::time_series::TimeSeries;

/// PeriEvent holds the samples found around a list of events.
///
/// Row `i` of `series` falls in the window of event `event_time[i]`, and
/// `latency[i]` is its offset from that event.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriEvent<D: Samples> {
    pub series: TimeSeries<D>,
    pub event_time: Vec<i64>,
    pub latency: Vec<i64>,
}

/// peri_event slices `data` into the windows `[e + window.0, e + window.1]`
/// around every event `e`. Windows must not overlap.
pub fn peri_event<D: Samples>(data: &TimeSeries<D>, events: &[i64], window: (i64, i64)) -> Result<PeriEvent<D>> {
    let (before, after) = window;
    if before >= after {
        return Err(Error::EmptyWindow { start: before, end: after });
    }

    let mut events = events.to_vec();
    events.sort_unstable();

    let start: Vec<i64> = events.iter().map(|e| e.saturating_add(before)).collect();
    let end: Vec<i64> = events.iter().map(|e| e.saturating_add(after)).collect();
    let windows = IntervalSet::new(&start, &end, TimeUnit::Us, true);
    if windows.len() != events.len() {
        return Err(Error::OverlappingWindows {
            events: events.len(),
            intervals: windows.len(),
        });
    }

    let series = data.restrict(&windows, true);
    let event_time: Vec<i64> = series
        .labels()
        .unwrap_or_default()
        .iter()
        .map(|&k| events[k])
        .collect();
    let latency = series
        .timestamps()
        .iter()
        .zip(&event_time)
        .map(|(t, e)| t.saturating_sub(*e))
        .collect();

    Ok(PeriEvent {
        series,
        event_time,
        latency,
    })
}
