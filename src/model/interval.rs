use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Closed interval on an axis. Ends may be infinite and may be given in
/// either order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    fn ordered(&self) -> (f64, f64) {
        if self.start <= self.end {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let (lo, hi) = self.ordered();
        value >= lo && value <= hi
    }

    /// Index range of `axis` covered by the interval.
    ///
    /// Finite ends snap to the nearest axis sample; both snapped samples are
    /// included. An infinite lower end starts at 0 and an infinite upper end
    /// runs to the last sample.
    pub fn index_range(&self, axis: &[f64]) -> Range<usize> {
        if axis.is_empty() {
            return 0..0;
        }
        let (lo, hi) = self.ordered();
        let nearest = |value: f64| {
            axis.iter()
                .enumerate()
                .fold((0, f64::INFINITY), |best, (i, &x)| {
                    let distance = (x - value).abs();
                    if distance < best.1 {
                        (i, distance)
                    } else {
                        best
                    }
                })
                .0
        };
        let first = if lo.is_infinite() { 0 } else { nearest(lo) };
        let last = if hi.is_infinite() {
            axis.len() - 1
        } else {
            nearest(hi)
        };
        first..(last + 1).max(first)
    }
}

/// `true` if `value` lies in any of the intervals, or if there are none.
pub fn applies(intervals: &[Interval], value: f64) -> bool {
    intervals.is_empty() || intervals.iter().any(|interval| interval.contains(value))
}
