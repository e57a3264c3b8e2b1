use std::fmt;
use std::rc::Rc;

use neuroseries_utils::time::{is_sorted, is_strictly_increasing, RawTimestamp, TimeUnit};

use crate::error::{Error, Result};
use crate::interval::IntervalSet;
use crate::range::RangeSlot;
use crate::series::samples::{Frame, NoData, Samples};

/// TimeSeries is a sequence of samples indexed by strictly increasing
/// microsecond timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<D: Samples> {
    timestamps: Vec<i64>,
    data: D,

    // index of the containing interval, set by `restrict(.., true)`
    labels: Option<Vec<usize>>,

    r_cache: RangeSlot<TimeSeries<D>>,
}

/// Ts is a series of bare timestamps.
pub type Ts = TimeSeries<NoData>;
/// Tsd is a series with one value per timestamp.
pub type Tsd = TimeSeries<Vec<f64>>;
/// TsdFrame is a series with named value columns.
pub type TsdFrame = TimeSeries<Frame>;

impl<D: Samples> TimeSeries<D> {
    /// from_raw builds a series from raw timestamps in `unit` and their
    /// samples.
    pub fn from_raw<T: RawTimestamp>(timestamps: &[T], data: D, unit: TimeUnit) -> Result<Self> {
        if timestamps.len() != data.len() {
            return Err(Error::ShapeMismatch {
                timestamps: timestamps.len(),
                values: data.len(),
            });
        }

        let timestamps = timestamps.iter().map(|t| t.to_micros(unit)).collect();
        Ok(Self::normalized(timestamps, data))
    }

    /// normalized sorts rows by timestamp and collapses duplicate timestamps,
    /// keeping the last sample of each. `data` must have one row per
    /// timestamp.
    fn normalized(timestamps: Vec<i64>, data: D) -> Self {
        if is_strictly_increasing(&timestamps) {
            return Self::from_sorted(timestamps, data, None);
        }

        let sorted = is_sorted(&timestamps);

        // stable, so duplicates stay in input order
        let mut order: Vec<usize> = (0..timestamps.len()).collect();
        order.sort_by_key(|&i| timestamps[i]);

        let mut rows: Vec<Option<usize>> = Vec::with_capacity(order.len());
        let mut kept: Vec<i64> = Vec::with_capacity(order.len());
        for (k, &i) in order.iter().enumerate() {
            if let Some(&next) = order.get(k + 1) {
                if timestamps[next] == timestamps[i] {
                    continue;
                }
            }
            rows.push(Some(i));
            kept.push(timestamps[i]);
        }

        tracing::warn!(
            len = timestamps.len(),
            unsorted = !sorted,
            duplicates = timestamps.len() - kept.len(),
            "timestamps are not strictly increasing, reordering samples"
        );

        let data = data.take(&rows);
        Self::from_sorted(kept, data, None)
    }

    pub(crate) fn from_sorted(timestamps: Vec<i64>, data: D, labels: Option<Vec<usize>>) -> Self {
        debug_assert!(is_strictly_increasing(&timestamps));
        debug_assert_eq!(timestamps.len(), data.len());
        Self {
            timestamps,
            data,
            labels,
            r_cache: RangeSlot::default(),
        }
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn samples(&self) -> &D {
        &self.data
    }

    /// labels returns the containing-interval index of every row, if the
    /// series came out of a labelled restriction.
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// times returns the timestamps expressed in `unit`.
    pub fn times(&self, unit: TimeUnit) -> Vec<f64> {
        self.timestamps.iter().map(|&t| unit.to_unit(t)).collect()
    }

    /// times_default returns the timestamps in the unit of the innermost
    /// `units::scoped` guard.
    pub fn times_default(&self) -> Vec<f64> {
        self.times(TimeUnit::current())
    }

    /// as_units returns a copy of the series indexed in `unit`, for display.
    pub fn as_units(&self, unit: TimeUnit) -> UnitSeries<D> {
        UnitSeries {
            unit,
            times: self.times(unit),
            data: self.data.clone(),
        }
    }

    pub fn index_label(&self) -> String {
        index_label(TimeUnit::current())
    }

    /// restrict keeps the rows whose timestamp falls in one of the intervals
    /// of `ep`. With `keep_labels` each kept row records the index of its
    /// interval.
    pub fn restrict(&self, ep: &IntervalSet, keep_labels: bool) -> Self {
        let (rows, labels): (Vec<Option<usize>>, Vec<usize>) = ep
            .in_interval(&self.timestamps)
            .into_iter()
            .enumerate()
            .filter_map(|(i, bin)| bin.map(|k| (Some(i), k)))
            .unzip();

        let timestamps = rows.iter().flatten().map(|&i| self.timestamps[i]).collect();
        let data = self.data.take(&rows);

        Self::from_sorted(timestamps, data, keep_labels.then_some(labels))
    }

    /// r returns the restriction to the active range, memoized until the
    /// range scope exits.
    pub fn r(&self) -> Result<Rc<Self>> {
        self.r_cache.get_or_restrict(|active| self.restrict(active, false))
    }

    pub fn is_cached(&self) -> bool {
        self.r_cache.is_cached()
    }
}

impl Ts {
    pub fn new<T: RawTimestamp>(timestamps: &[T], unit: TimeUnit) -> Self {
        let timestamps: Vec<i64> = timestamps.iter().map(|t| t.to_micros(unit)).collect();
        let data = NoData::new(timestamps.len());
        Self::normalized(timestamps, data)
    }
}

impl Tsd {
    pub fn new<T: RawTimestamp>(timestamps: &[T], values: Vec<f64>, unit: TimeUnit) -> Result<Self> {
        Self::from_raw(timestamps, values, unit)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

/// Data is a borrowed view of frame values: a bare column when the frame has
/// a single one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Data<'a> {
    Column(&'a [f64]),
    Table(&'a Frame),
}

impl TsdFrame {
    pub fn new<T: RawTimestamp>(timestamps: &[T], frame: Frame, unit: TimeUnit) -> Result<Self> {
        Self::from_raw(timestamps, frame, unit)
    }

    pub fn data(&self) -> Data<'_> {
        if self.data.width() == 1 {
            Data::Column(self.data.column_at(0))
        } else {
            Data::Table(&self.data)
        }
    }

    pub fn columns(&self) -> &[String] {
        self.data.columns()
    }
}

fn index_label(unit: TimeUnit) -> String {
    format!("Time ({})", unit)
}

/// UnitSeries is a series copy indexed by float times in a display unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSeries<D: Samples> {
    unit: TimeUnit,
    times: Vec<f64>,
    data: D,
}

impl<D: Samples> UnitSeries<D> {
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn samples(&self) -> &D {
        &self.data
    }

    pub fn index_label(&self) -> String {
        index_label(self.unit)
    }
}

const DISPLAY_HEAD: usize = 5;

impl<D: Samples> fmt::Display for UnitSeries<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>16}", self.index_label())?;
        for name in self.data.column_names() {
            write!(f, " {:>12}", name)?;
        }
        writeln!(f)?;

        let n = self.times.len();
        let rows: Vec<usize> = if n > 2 * DISPLAY_HEAD {
            (0..DISPLAY_HEAD).chain(n - DISPLAY_HEAD..n).collect()
        } else {
            (0..n).collect()
        };

        for (k, &i) in rows.iter().enumerate() {
            if k == DISPLAY_HEAD && n > 2 * DISPLAY_HEAD {
                writeln!(f, "{:>16}", "...")?;
            }
            write!(f, "{:>16}", self.times[i])?;
            for v in self.data.row(i) {
                write!(f, " {:>12}", v)?;
            }
            writeln!(f)?;
        }

        write!(f, "[{} rows]", n)
    }
}

impl<D: Samples> fmt::Display for TimeSeries<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_units(TimeUnit::current()), f)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use neuroseries_utils::time::TimeUnit;
    use neuroseries_utils::units;
    use quickcheck::quickcheck;
    use rand::Rng;

    use crate::error::Error;
    use crate::interval::IntervalSet;
    use crate::series::samples::Frame;
    use crate::series::time_series::{Data, Ts, Tsd, TsdFrame};
    use crate::test_util::capture_warnings;

    #[test]
    fn test_create_scales_units() {
        let tsd = Tsd::new(&[1.0, 2.5], vec![10.0, 20.0], TimeUnit::S).unwrap();
        assert_eq!(tsd.timestamps(), &[1_000_000, 2_500_000]);
        assert_eq!(tsd.times(TimeUnit::Ms), vec![1000.0, 2500.0]);
        assert_eq!(tsd.data(), &[10.0, 20.0]);
    }

    #[test]
    fn test_create_shape_mismatch() {
        let r = Tsd::new(&[1, 2, 3], vec![1.0], TimeUnit::Us);
        assert_matches!(r, Err(Error::ShapeMismatch { timestamps: 3, values: 1 }));
    }

    #[test]
    fn test_create_sorts_with_samples() {
        let tsd = Tsd::new(&[30, 10, 20], vec![3.0, 1.0, 2.0], TimeUnit::Us).unwrap();
        assert_eq!(tsd.timestamps(), &[10, 20, 30]);
        assert_eq!(tsd.data(), &[1.0, 2.0, 3.0]);

        // the last sample of a duplicated timestamp wins
        let tsd = Tsd::new(&[10, 20, 10], vec![1.0, 2.0, 5.0], TimeUnit::Us).unwrap();
        assert_eq!(tsd.timestamps(), &[10, 20]);
        assert_eq!(tsd.data(), &[5.0, 2.0]);

        let ts = Ts::new(&[3, 1, 1], TimeUnit::Ms);
        assert_eq!(ts.timestamps(), &[1000, 3000]);
        assert_eq!(ts.len(), 2);
    }

    #[test]
    fn test_create_warns_on_reorder() {
        let (_, logs) = capture_warnings(|| Tsd::new(&[30, 10, 20], vec![3.0, 1.0, 2.0], TimeUnit::Us));
        assert!(logs.contains("not strictly increasing"), "got {}", logs);
        assert!(logs.contains("unsorted=true"), "got {}", logs);

        let (_, logs) = capture_warnings(|| Ts::new(&[10, 20, 20], TimeUnit::Us));
        assert!(logs.contains("unsorted=false"), "got {}", logs);
        assert!(logs.contains("duplicates=1"), "got {}", logs);

        let (_, logs) = capture_warnings(|| Ts::new(&[10, 20, 30], TimeUnit::Us));
        assert!(logs.is_empty(), "got {}", logs);
    }

    #[test]
    fn test_frame_data_view() {
        let frame = Frame::from_column("x", vec![1.0, 2.0]);
        let tsdf = TsdFrame::new(&[1, 2], frame, TimeUnit::S).unwrap();
        assert_matches!(tsdf.data(), Data::Column(c) if c == [1.0, 2.0]);

        let frame = Frame::new(
            vec!["x".to_string(), "y".to_string()],
            vec![vec![2.0, 1.0], vec![20.0, 10.0]],
        )
        .unwrap();
        let tsdf = TsdFrame::new(&[2, 1], frame, TimeUnit::S).unwrap();
        match tsdf.data() {
            Data::Table(t) => assert_eq!(t.column("y"), Some([10.0, 20.0].as_slice())),
            other => panic!("unexpected data view: {:?}", other),
        }
    }

    #[test]
    fn test_restrict() {
        let tsd = Tsd::new(&[5, 10, 15, 20, 25, 30], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], TimeUnit::Us)
            .unwrap();
        let ep = IntervalSet::from_pairs(&[(5, 15), (20, 30)]);

        let got = tsd.restrict(&ep, false);
        assert_eq!(got.timestamps(), &[10, 15, 25, 30]);
        assert_eq!(got.data(), &[1.0, 2.0, 4.0, 5.0]);
        assert_eq!(got.labels(), None);

        let got = tsd.restrict(&ep, true);
        assert_eq!(got.labels(), Some([0, 0, 1, 1].as_slice()));

        // the receiver is untouched
        assert_eq!(tsd.len(), 6);
        assert!(tsd.restrict(&IntervalSet::empty(), false).is_empty());
    }

    #[test]
    fn test_units_and_display() {
        let tsd = Tsd::new(&[1500, 2500], vec![1.0, 2.0], TimeUnit::Us).unwrap();
        assert_eq!(tsd.index_label(), "Time (us)");

        let view = tsd.as_units(TimeUnit::Ms);
        assert_eq!(view.times(), &[1.5, 2.5]);
        assert_eq!(view.index_label(), "Time (ms)");

        {
            let _units = units::scoped(TimeUnit::S);
            assert_eq!(tsd.times_default(), vec![0.0015, 0.0025]);
            assert_eq!(tsd.index_label(), "Time (s)");
        }

        let out = tsd.to_string();
        assert!(out.starts_with(&format!("{:>16}", "Time (us)")), "got {}", out);
        assert!(out.ends_with("[2 rows]"), "got {}", out);

        let long = Tsd::new(&(0..20).collect::<Vec<i64>>(), vec![0.0; 20], TimeUnit::Us).unwrap();
        let out = long.to_string();
        assert_eq!(out.lines().count(), 1 + 5 + 1 + 5 + 1, "got {}", out);
    }

    #[test]
    fn test_restrict_random_fixture() {
        let mut rng = rand::thread_rng();
        let raw: Vec<i64> = (0..500).map(|_| rng.gen_range(0..10_000)).collect();
        let ts = Ts::new(&raw, TimeUnit::Us);
        let ep = IntervalSet::from_pairs(&[(1000, 2000), (5000, 9000)]);

        let got = ts.restrict(&ep, true);
        let labels = got.labels().unwrap();
        for (t, &k) in got.timestamps().iter().zip(labels) {
            let (s, e) = ep.get(k).unwrap();
            assert!(s < *t && *t <= e, "{} not in [{}, {}]", t, s, e);
        }
        let outside = ts.timestamps().iter().filter(|&&t| ep.containing(t).is_none()).count();
        assert_eq!(got.len() + outside, ts.len());
    }

    quickcheck! {
        fn prop_restrict_idempotent(raw: Vec<i32>, bounds: Vec<i32>) -> bool {
            let values = vec![1.0; raw.len()];
            let tsd = Tsd::new(&raw, values, TimeUnit::Us).unwrap();
            let mut bounds = bounds;
            bounds.sort_unstable();
            let (start, end): (Vec<i32>, Vec<i32>) = bounds.chunks_exact(2).map(|p| (p[0], p[1])).unzip();
            let ep = IntervalSet::new(&start, &end, TimeUnit::Us, true);

            let once = tsd.restrict(&ep, false);
            once.restrict(&ep, false) == once
        }
    }
}
