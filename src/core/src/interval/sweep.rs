//! Sweep-line primitives shared by the interval set algebra.
//!
//! Every operation flattens its operands into one stream of weighted boundary
//! events, sorts it by time and walks it once keeping a running sum.

use crate::interval::IntervalSet;

/// Boundary is one start or end point of an operand interval. Starts carry the
/// operand weight, ends carry its negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Boundary {
    pub time: i64,
    pub weight: i32,
}

/// boundaries yields the start and end events of `set` with `weight` on the
/// starts and `-weight` on the ends.
pub(crate) fn boundaries(set: &IntervalSet, weight: i32) -> impl Iterator<Item = Boundary> + '_ {
    let starts = set.start().iter().map(move |&time| Boundary { time, weight });
    let ends = set.end().iter().map(move |&time| Boundary {
        time,
        weight: -weight,
    });
    starts.chain(ends)
}

/// sweep returns the maximal runs over which the running sum satisfies `keep`.
///
/// Events sharing a timestamp are summed before `keep` is tested, so a close
/// and an open at the same instant never produce an empty run. A run opens at
/// the first event group that satisfies `keep` and closes at the first one
/// that does not.
pub(crate) fn sweep<F>(mut events: Vec<Boundary>, keep: F) -> (Vec<i64>, Vec<i64>)
where
    F: Fn(i32) -> bool,
{
    events.sort_unstable_by_key(|e| e.time);

    let mut start = Vec::new();
    let mut end = Vec::new();

    let mut sum = 0;
    let mut open: Option<i64> = None;
    let mut i = 0;
    while i < events.len() {
        let time = events[i].time;
        while i < events.len() && events[i].time == time {
            sum += events[i].weight;
            i += 1;
        }

        match (open, keep(sum)) {
            (None, true) => open = Some(time),
            (Some(s), false) => {
                start.push(s);
                end.push(time);
                open = None;
            }
            _ => {}
        }
    }

    // balanced operands always bring the sum back to zero
    debug_assert!(open.is_none(), "unterminated run in sweep");

    (start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Edge {
    Open,
    Close,
}

/// repair rebuilds a valid start/end pair from arbitrary boundary lists.
///
/// All points are merged into one stream tagged open/close and sorted by time,
/// opens first on ties. Walking the stream with an open/close balance, every
/// 0→1 transition starts an interval and every 1→0 transition ends it. A close
/// seen at balance 0 has nothing to close and is dropped, as are zero-length
/// results.
pub(crate) fn repair(start: &[i64], end: &[i64]) -> (Vec<i64>, Vec<i64>) {
    let mut events: Vec<(i64, Edge)> = start
        .iter()
        .map(|&t| (t, Edge::Open))
        .chain(end.iter().map(|&t| (t, Edge::Close)))
        .collect();
    events.sort_unstable();

    let mut out_start = Vec::new();
    let mut out_end = Vec::new();

    let mut balance = 0_usize;
    let mut opened = 0_i64;
    for (time, edge) in events {
        match edge {
            Edge::Open => {
                if balance == 0 {
                    opened = time;
                }
                balance += 1;
            }
            Edge::Close => {
                if balance == 0 {
                    continue;
                }
                balance -= 1;
                if balance == 0 && opened < time {
                    out_start.push(opened);
                    out_end.push(time);
                }
            }
        }
    }

    (out_start, out_end)
}

#[cfg(test)]
mod tests {
    use crate::interval::sweep::{repair, sweep, Boundary};

    fn events(points: &[(i64, i32)]) -> Vec<Boundary> {
        points
            .iter()
            .map(|&(time, weight)| Boundary { time, weight })
            .collect()
    }

    #[test]
    fn test_sweep_groups_ties() {
        // [0, 5) and [5, 10): the close and open at 5 cancel out
        let ev = events(&[(0, 1), (5, -1), (5, 1), (10, -1)]);
        let (start, end) = sweep(ev.clone(), |s| s > 0);
        assert_eq!((start, end), (vec![0], vec![10]));

        let (start, end) = sweep(ev, |s| s == 2);
        assert!(start.is_empty() && end.is_empty());
    }

    #[test]
    fn test_repair_nested_and_stray() {
        // nested starts collapse into the outer cover
        let (start, end) = repair(&[1, 2], &[5, 6]);
        assert_eq!((start, end), (vec![1], vec![6]));

        // the leading end has nothing to close
        let (start, end) = repair(&[10, 30], &[5, 20, 40]);
        assert_eq!((start, end), (vec![10, 30], vec![20, 40]));

        // touching pieces merge, zero-length pieces vanish
        let (start, end) = repair(&[0, 5, 50], &[5, 8, 50]);
        assert_eq!((start, end), (vec![0], vec![8]));
    }
}
