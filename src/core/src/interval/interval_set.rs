use std::fmt;
use std::rc::Rc;

use neuroseries_utils::time::{format_timestamps, is_strictly_increasing, RawTimestamp, TimeUnit};

use crate::error::Result;
use crate::interval::sweep::{self, Boundary};
use crate::range::RangeSlot;

/// MalformedInterval names the first invariant a pair of boundary lists
/// violates. It is never returned as a failure: construction logs it and
/// repairs the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedInterval {
    #[error("start and end not of the same length")]
    LengthMismatch,
    #[error("start is not sorted")]
    StartNotSorted,
    #[error("end is not sorted")]
    EndNotSorted,
    #[error("some ends do not follow their start")]
    EndBeforeStart,
    #[error("some starts precede the previous end")]
    Overlap,
}

/// IntervalSet is an ordered collection of disjoint time intervals in
/// microseconds.
///
/// # Invariants
/// - `start.len() == end.len()`
/// - `start[i] < end[i]`
/// - `start` and `end` are strictly increasing
/// - `end[i] <= start[i + 1]`
#[derive(Default)]
pub struct IntervalSet {
    start: Vec<i64>,
    end: Vec<i64>,

    // memoized intersection with the active range
    r_cache: RangeSlot<IntervalSet>,
}

impl IntervalSet {
    /// new builds an interval set from raw boundaries in `unit`. Malformed
    /// input is repaired, with a warning unless `expect_fix` is set.
    pub fn new<T: RawTimestamp>(start: &[T], end: &[T], unit: TimeUnit, expect_fix: bool) -> Self {
        let start = format_timestamps(start, unit, !expect_fix);
        let end = format_timestamps(end, unit, !expect_fix);
        Self::checked(start, end, expect_fix)
    }

    /// from_micros builds an interval set from boundaries already in
    /// microseconds.
    pub fn from_micros(start: Vec<i64>, end: Vec<i64>) -> Self {
        Self::checked(start, end, false)
    }

    /// single returns the set holding the one interval `[start, end]`.
    pub fn single<T: RawTimestamp>(start: T, end: T, unit: TimeUnit) -> Self {
        Self::new(&[start], &[end], unit, false)
    }

    pub fn from_pairs(pairs: &[(i64, i64)]) -> Self {
        let (start, end) = pairs.iter().copied().unzip();
        Self::from_micros(start, end)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn checked(start: Vec<i64>, end: Vec<i64>, expect_fix: bool) -> Self {
        match Self::validate(&start, &end) {
            Ok(()) => Self::from_parts(start, end),
            Err(reason) => {
                if !expect_fix {
                    tracing::warn!(%reason, intervals = start.len(), "malformed interval set, repairing");
                }
                let (start, end) = sweep::repair(&start, &end);
                Self::from_parts(start, end)
            }
        }
    }

    /// from_parts wraps boundaries that are known to be valid.
    pub(crate) fn from_parts(start: Vec<i64>, end: Vec<i64>) -> Self {
        debug_assert_eq!(Self::validate(&start, &end), Ok(()));
        Self {
            start,
            end,
            r_cache: RangeSlot::default(),
        }
    }

    /// validate reports the first invariant `start`/`end` violate.
    pub fn validate(start: &[i64], end: &[i64]) -> std::result::Result<(), MalformedInterval> {
        if start.len() != end.len() {
            return Err(MalformedInterval::LengthMismatch);
        }
        if !is_strictly_increasing(start) {
            return Err(MalformedInterval::StartNotSorted);
        }
        if !is_strictly_increasing(end) {
            return Err(MalformedInterval::EndNotSorted);
        }
        if start.iter().zip(end).any(|(s, e)| s >= e) {
            return Err(MalformedInterval::EndBeforeStart);
        }
        if end.iter().zip(start.iter().skip(1)).any(|(e, s)| e > s) {
            return Err(MalformedInterval::Overlap);
        }
        Ok(())
    }

    pub fn start(&self) -> &[i64] {
        &self.start
    }

    pub fn end(&self) -> &[i64] {
        &self.end
    }

    pub fn len(&self) -> usize {
        self.start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<(i64, i64)> {
        Some((*self.start.get(i)?, self.end[i]))
    }

    /// iter yields the `(start, end)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.start.iter().copied().zip(self.end.iter().copied())
    }

    /// time_span returns a set with the single interval covering the whole set.
    pub fn time_span(&self) -> IntervalSet {
        match (self.start.first(), self.end.last()) {
            (Some(&s), Some(&e)) => Self::from_parts(vec![s], vec![e]),
            _ => Self::empty(),
        }
    }

    /// tot_length returns the total covered time in `unit`.
    pub fn tot_length(&self, unit: TimeUnit) -> f64 {
        let total: i128 = self.iter().map(|(s, e)| i128::from(e) - i128::from(s)).sum();
        total as f64 / unit.factor() as f64
    }

    /// intersect returns the time covered by `self` and every set in `others`.
    pub fn intersect(&self, others: &[&IntervalSet]) -> IntervalSet {
        let n = others.len() as i32 + 1;
        let events: Vec<Boundary> = std::iter::once(self)
            .chain(others.iter().copied())
            .flat_map(|set| sweep::boundaries(set, 1))
            .collect();

        let (start, end) = sweep::sweep(events, |sum| sum == n);
        Self::from_parts(start, end)
    }

    /// union returns the time covered by `self` or any set in `others`.
    pub fn union(&self, others: &[&IntervalSet]) -> IntervalSet {
        let events: Vec<Boundary> = std::iter::once(self)
            .chain(others.iter().copied())
            .flat_map(|set| sweep::boundaries(set, 1))
            .collect();

        let (start, end) = sweep::sweep(events, |sum| sum > 0);
        Self::from_parts(start, end)
    }

    /// set_diff returns the time covered by `self` but not by `other`.
    pub fn set_diff(&self, other: &IntervalSet) -> IntervalSet {
        let events: Vec<Boundary> = sweep::boundaries(self, 1)
            .chain(sweep::boundaries(other, -1))
            .collect();

        let (start, end) = sweep::sweep(events, |sum| sum == 1);
        Self::from_parts(start, end)
    }

    /// drop_short_intervals removes intervals shorter than `threshold`
    /// microseconds. Neighbours are never merged.
    pub fn drop_short_intervals(&self, threshold: i64) -> IntervalSet {
        let (start, end) = self.iter().filter(|(s, e)| e.saturating_sub(*s) >= threshold).unzip();
        Self::from_parts(start, end)
    }

    /// merge_close_intervals joins consecutive intervals separated by less
    /// than `threshold` microseconds.
    pub fn merge_close_intervals(&self, threshold: i64) -> IntervalSet {
        let mut start: Vec<i64> = Vec::with_capacity(self.len());
        let mut end: Vec<i64> = Vec::with_capacity(self.len());

        for (s, e) in self.iter() {
            match end.last_mut() {
                Some(last) if s.saturating_sub(*last) < threshold => *last = e,
                _ => {
                    start.push(s);
                    end.push(e);
                }
            }
        }

        Self::from_parts(start, end)
    }

    /// containing returns the index of the interval holding `t`.
    ///
    /// Bins are closed on the right: `t` belongs to interval `k` when
    /// `start[k] < t <= end[k]`.
    pub fn containing(&self, t: i64) -> Option<usize> {
        let k = self.start.partition_point(|&s| s < t).checked_sub(1)?;
        (t <= self.end[k]).then_some(k)
    }

    /// in_interval classifies every timestamp into the index of its interval,
    /// `None` for timestamps falling in a gap.
    pub fn in_interval(&self, timestamps: &[i64]) -> Vec<Option<usize>> {
        timestamps.iter().map(|&t| self.containing(t)).collect()
    }

    /// r returns the intersection with the active range, memoized until the
    /// range scope exits.
    pub fn r(&self) -> Result<Rc<IntervalSet>> {
        self.r_cache.get_or_restrict(|active| self.intersect(&[active]))
    }

    pub fn is_cached(&self) -> bool {
        self.r_cache.is_cached()
    }
}

impl Clone for IntervalSet {
    fn clone(&self) -> Self {
        Self::from_parts(self.start.clone(), self.end.clone())
    }
}

impl PartialEq for IntervalSet {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.end == other.end
    }
}

impl Eq for IntervalSet {}

impl fmt::Debug for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalSet")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>16} {:>16}", "start", "end")?;
        for (s, e) in self.iter() {
            writeln!(f, "{:>16} {:>16}", s, e)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use neuroseries_utils::time::TimeUnit;
    use quickcheck::quickcheck;

    use crate::interval::{IntervalSet, MalformedInterval};
    use crate::test_util::capture_warnings;

    /// arbitrary builds a valid set from arbitrary points: sorted, distinct
    /// points taken pairwise.
    fn arbitrary(points: Vec<i16>) -> IntervalSet {
        let mut points: Vec<i64> = points.into_iter().map(i64::from).collect();
        points.sort_unstable();
        points.dedup();
        let (start, end) = points
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .unzip();
        IntervalSet::from_micros(start, end)
    }

    #[test]
    fn test_create_from_scalars() {
        let i = IntervalSet::single(100, 2100, TimeUnit::Us);
        assert_eq!(i.start(), &[100]);
        assert_eq!(i.end(), &[2100]);

        let i = IntervalSet::single(1.5, 2.0, TimeUnit::S);
        assert_eq!(i.start(), &[1_500_000]);
        assert_eq!(i.end(), &[2_000_000]);
    }

    #[test]
    fn test_validate() {
        assert_eq!(IntervalSet::validate(&[1, 10], &[5, 20]), Ok(()));
        assert_eq!(IntervalSet::validate(&[1, 5], &[5, 20]), Ok(()));
        assert_eq!(
            IntervalSet::validate(&[1], &[5, 20]),
            Err(MalformedInterval::LengthMismatch)
        );
        assert_eq!(
            IntervalSet::validate(&[1, 1], &[5, 20]),
            Err(MalformedInterval::StartNotSorted)
        );
        assert_eq!(
            IntervalSet::validate(&[1, 10], &[20, 20]),
            Err(MalformedInterval::EndNotSorted)
        );
        assert_eq!(
            IntervalSet::validate(&[1, 10], &[1, 20]),
            Err(MalformedInterval::EndBeforeStart)
        );
        assert_eq!(
            IntervalSet::validate(&[1, 10], &[15, 20]),
            Err(MalformedInterval::Overlap)
        );
    }

    #[test]
    fn test_create_repairs_malformed() {
        let i = IntervalSet::new(&[1, 3, 10], &[5, 8, 20], TimeUnit::Us, true);
        assert_eq!(i.start(), &[1, 10], "got {:?}", i);
        assert_eq!(i.end(), &[8, 20], "got {:?}", i);

        // unsorted boundaries are sorted before the repair
        let i = IntervalSet::new(&[10, 1], &[20, 5], TimeUnit::Us, true);
        assert_eq!(i, IntervalSet::from_pairs(&[(1, 5), (10, 20)]));

        // more ends than starts
        let i = IntervalSet::new(&[10], &[5, 20], TimeUnit::Us, true);
        assert_eq!(i, IntervalSet::from_pairs(&[(10, 20)]));
    }

    #[test]
    fn test_repair_warns_with_reason() {
        let cases: [(Vec<i64>, Vec<i64>, MalformedInterval); 5] = [
            (vec![1, 10], vec![5], MalformedInterval::LengthMismatch),
            (vec![1, 1], vec![5, 6], MalformedInterval::StartNotSorted),
            (vec![1, 10], vec![20, 20], MalformedInterval::EndNotSorted),
            (vec![1, 10], vec![1, 20], MalformedInterval::EndBeforeStart),
            (vec![1, 10], vec![15, 20], MalformedInterval::Overlap),
        ];
        for (start, end, reason) in cases {
            let (i, logs) = capture_warnings(|| IntervalSet::from_micros(start.clone(), end.clone()));
            assert!(IntervalSet::validate(i.start(), i.end()).is_ok());
            assert!(logs.contains("WARN"), "no warning for {:?}: {}", reason, logs);
            assert!(logs.contains("malformed interval set"), "got {}", logs);
            assert!(
                logs.contains(&reason.to_string()),
                "warning does not name {:?}: {}",
                reason,
                logs
            );
        }
    }

    #[test]
    fn test_expected_fix_is_silent() {
        let (i, logs) = capture_warnings(|| IntervalSet::new(&[10, 1], &[20, 15], TimeUnit::Us, true));
        assert_eq!(i, IntervalSet::from_pairs(&[(1, 20)]));
        assert!(logs.is_empty(), "got {}", logs);

        let (i, logs) = capture_warnings(|| IntervalSet::new(&[1, 10], &[15, 20], TimeUnit::Us, false));
        assert_eq!(i, IntervalSet::from_pairs(&[(1, 20)]));
        assert!(logs.contains(&MalformedInterval::Overlap.to_string()), "got {}", logs);

        // sorting alone is reported, the sorted bounds are valid
        let (i, logs) = capture_warnings(|| IntervalSet::new(&[10, 1], &[20, 5], TimeUnit::Us, false));
        assert_eq!(i, IntervalSet::from_pairs(&[(1, 5), (10, 20)]));
        assert_eq!(logs.matches("timestamps are not sorted").count(), 2, "got {}", logs);
        assert!(!logs.contains("malformed"), "got {}", logs);

        let (_, logs) = capture_warnings(|| IntervalSet::new(&[1, 10], &[5, 20], TimeUnit::Us, false));
        assert!(logs.is_empty(), "got {}", logs);
    }

    #[test]
    fn test_time_span_tot_length() {
        let i = IntervalSet::from_pairs(&[(1000, 3000), (5000, 6000)]);
        assert_eq!(i.time_span(), IntervalSet::from_pairs(&[(1000, 6000)]));
        assert_eq!(i.tot_length(TimeUnit::Us), 3000.0);
        assert_eq!(i.tot_length(TimeUnit::Ms), 3.0);
        assert_eq!(i.tot_length(TimeUnit::S), 0.003);

        assert!(IntervalSet::empty().time_span().is_empty());
    }

    #[test]
    fn test_intersect() {
        let a = IntervalSet::from_pairs(&[(1, 5), (10, 20)]);
        let b = IntervalSet::from_pairs(&[(3, 8)]);

        let exp = IntervalSet::from_pairs(&[(3, 5)]);
        let got = a.intersect(&[&b]);
        assert_eq!(got, exp, "got {:?}, exp {:?}", got, exp);
        assert_eq!(b.intersect(&[&a]), exp);

        // all three must overlap
        let c = IntervalSet::from_pairs(&[(4, 15)]);
        assert_eq!(a.intersect(&[&b, &c]), IntervalSet::from_pairs(&[(4, 5)]));

        // touching intervals share no time
        let d = IntervalSet::from_pairs(&[(5, 10)]);
        assert!(a.intersect(&[&d]).is_empty());

        assert!(a.intersect(&[&IntervalSet::empty()]).is_empty());
    }

    #[test]
    fn test_union() {
        let a = IntervalSet::from_pairs(&[(1, 5), (10, 20)]);
        let b = IntervalSet::from_pairs(&[(3, 8), (20, 25), (30, 40)]);

        let exp = IntervalSet::from_pairs(&[(1, 8), (10, 25), (30, 40)]);
        assert_eq!(a.union(&[&b]), exp);
        assert_eq!(b.union(&[&a]), exp);
        assert_eq!(a.union(&[]), a);
    }

    #[test]
    fn test_set_diff() {
        let a = IntervalSet::from_pairs(&[(0, 10), (20, 30)]);
        let b = IntervalSet::from_pairs(&[(2, 4), (25, 40)]);

        assert_eq!(
            a.set_diff(&b),
            IntervalSet::from_pairs(&[(0, 2), (4, 10), (20, 25)])
        );
        assert_eq!(b.set_diff(&a), IntervalSet::from_pairs(&[(30, 40)]));
        assert!(a.set_diff(&a).is_empty());
        assert_eq!(a.set_diff(&IntervalSet::empty()), a);
    }

    #[test]
    fn test_drop_short() {
        let a = IntervalSet::from_pairs(&[(0, 1000), (2000, 5000), (6000, 7500)]);
        let got = a.drop_short_intervals(1500);
        assert_eq!(got, IntervalSet::from_pairs(&[(2000, 5000), (6000, 7500)]));
    }

    #[test]
    fn test_merge_close() {
        let a = IntervalSet::from_pairs(&[(0, 1000), (2000, 5000), (9000, 9500), (9600, 9700)]);
        let got = a.merge_close_intervals(3000);
        assert_eq!(got, IntervalSet::from_pairs(&[(0, 5000), (9000, 9700)]));

        let got = a.merge_close_intervals(0);
        assert_eq!(got, a);
    }

    #[test]
    fn test_extreme_bounds() {
        let a = IntervalSet::from_pairs(&[(i64::MIN, -1), (i64::MAX - 1, i64::MAX)]);
        assert_eq!(a.merge_close_intervals(1_000), a);
        assert_eq!(a.drop_short_intervals(2), IntervalSet::from_pairs(&[(i64::MIN, -1)]));

        let wide = IntervalSet::from_pairs(&[(i64::MIN, i64::MAX)]);
        assert_eq!(wide.drop_short_intervals(i64::MAX), wide);
        assert_eq!(wide.tot_length(TimeUnit::Us), u64::MAX as f64);
    }

    #[test]
    fn test_in_interval() {
        let a = IntervalSet::from_pairs(&[(10, 20), (30, 40)]);
        let got = a.in_interval(&[5, 10, 11, 20, 25, 30, 35, 40, 41]);
        let exp = vec![None, None, Some(0), Some(0), None, None, Some(1), Some(1), None];
        assert_eq!(got, exp, "got {:?}, exp {:?}", got, exp);

        // shared boundary belongs to the left interval
        let b = IntervalSet::from_pairs(&[(10, 20), (20, 30)]);
        assert_eq!(b.in_interval(&[20, 21]), vec![Some(0), Some(1)]);
    }

    quickcheck! {
        fn prop_construction_upholds_invariants(start: Vec<i32>, end: Vec<i32>) -> bool {
            let i = IntervalSet::new(&start, &end, TimeUnit::Us, true);
            IntervalSet::validate(i.start(), i.end()).is_ok()
        }

        fn prop_intersect_commutes(a: Vec<i16>, b: Vec<i16>) -> bool {
            let (a, b) = (arbitrary(a), arbitrary(b));
            a.intersect(&[&b]) == b.intersect(&[&a])
        }

        fn prop_union_commutes(a: Vec<i16>, b: Vec<i16>) -> bool {
            let (a, b) = (arbitrary(a), arbitrary(b));
            a.union(&[&b]) == b.union(&[&a])
        }

        fn prop_diff_and_intersection_rebuild(a: Vec<i16>, b: Vec<i16>) -> bool {
            let (a, b) = (arbitrary(a), arbitrary(b));
            let diff = a.set_diff(&b);
            let common = a.intersect(&[&b]);
            diff.intersect(&[&b]).is_empty() && diff.union(&[&common]) == a
        }
    }
}
