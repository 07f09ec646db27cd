//! Calendar-month bucketing shared by the forecast generators.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Months per comparison window.
pub const WINDOW_MONTHS: i32 = 3;

/// Default significance threshold for count/rate changes, in percent.
pub const SIGNIFICANT_CHANGE_PCT: f64 = 30.0;

/// A calendar month. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    fn index(&self) -> i32 {
        self.year * 12 + self.month as i32 - 1
    }

    fn from_index(index: i32) -> Self {
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// The month `n` months before this one.
    pub fn minus(&self, n: i32) -> Self {
        Self::from_index(self.index() - n)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Groups dated entries by calendar month.
pub fn bucket_by_month<T>(entries: impl IntoIterator<Item = (NaiveDate, T)>) -> BTreeMap<MonthKey, Vec<T>> {
    let mut buckets: BTreeMap<MonthKey, Vec<T>> = BTreeMap::new();
    for (date, entry) in entries {
        buckets.entry(MonthKey::of(date)).or_default().push(entry);
    }
    buckets
}

/// Month ranges of the recent window (ending with the `as_of` month,
/// inclusive) and the prior window immediately before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    pub recent: (MonthKey, MonthKey),
    pub prior: (MonthKey, MonthKey),
}

impl Windows {
    pub fn ending(as_of: NaiveDate) -> Self {
        let current = MonthKey::of(as_of);
        Self {
            recent: (current.minus(WINDOW_MONTHS - 1), current),
            prior: (
                current.minus(2 * WINDOW_MONTHS - 1),
                current.minus(WINDOW_MONTHS),
            ),
        }
    }

    fn select<'a, T>(
        buckets: &'a BTreeMap<MonthKey, Vec<T>>,
        range: (MonthKey, MonthKey),
    ) -> impl Iterator<Item = &'a T> {
        buckets.range(range.0..=range.1).flat_map(|(_, v)| v.iter())
    }

    pub fn recent_entries<'a, T>(&self, buckets: &'a BTreeMap<MonthKey, Vec<T>>) -> Vec<&'a T> {
        Self::select(buckets, self.recent).collect()
    }

    pub fn prior_entries<'a, T>(&self, buckets: &'a BTreeMap<MonthKey, Vec<T>>) -> Vec<&'a T> {
        Self::select(buckets, self.prior).collect()
    }
}

/// Direction of a change between two windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

/// Percentage change from `prior` to `recent`. Zero when `prior` is zero.
pub fn percent_change(recent: f64, prior: f64) -> f64 {
    if prior.abs() < f64::EPSILON {
        0.0
    } else {
        (recent - prior) / prior * 100.0
    }
}

/// Classifies a change as up/down/flat against a percentage threshold.
/// A rise from zero counts as up.
pub fn classify_change(recent: f64, prior: f64, threshold_pct: f64) -> Direction {
    if prior.abs() < f64::EPSILON {
        return if recent > 0.0 { Direction::Up } else { Direction::Flat };
    }
    let change = percent_change(recent, prior);
    if change > threshold_pct {
        Direction::Up
    } else if change < -threshold_pct {
        Direction::Down
    } else {
        Direction::Flat
    }
}
