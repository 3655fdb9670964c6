// src/process/chunk.rs

use std::collections::BTreeMap;
use std::fmt;

/// Year → number of observations the API reports for it.
pub type TimePeriodMap = BTreeMap<i32, u64>;

/// Inclusive range of years requested in one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Groups years, newest first, into ranges whose summed observation count
/// stays within `max_observations`. A year whose count alone exceeds the cap
/// still gets a range of its own.
pub fn chunk_years(time_periods: &TimePeriodMap, max_observations: u64) -> YearChunks {
    YearChunks {
        remaining: time_periods.iter().rev().map(|(y, n)| (*y, *n)).collect(),
        pos: 0,
        max_observations,
    }
}

/// Lazy sequence of [`YearRange`]s in strictly decreasing order of `end`.
#[derive(Debug)]
pub struct YearChunks {
    /// (year, observations) sorted by year descending.
    remaining: Vec<(i32, u64)>,
    pos: usize,
    max_observations: u64,
}

impl Iterator for YearChunks {
    type Item = YearRange;

    fn next(&mut self) -> Option<YearRange> {
        let rest = &self.remaining[self.pos..];
        let (end, first) = *rest.first()?;

        let mut total = first;
        let mut taken = 1;
        for &(_, n) in &rest[1..] {
            match total.checked_add(n) {
                Some(t) if t <= self.max_observations => {
                    total = t;
                    taken += 1;
                }
                _ => break,
            }
        }

        let start = rest[taken - 1].0;
        self.pos += taken;
        Some(YearRange::new(start, end))
    }
}
