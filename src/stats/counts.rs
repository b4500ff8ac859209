//! Count accumulation for reports.
//!
//! One pass over the event sequence, incrementing per event; buckets are
//! never pre-allocated, so an absent key simply counts zero.

use std::collections::HashMap;

use super::{RangeKey, Statistic};
use crate::events::Event;

/// Count events per range of `statistic`.
pub fn count_ranges(statistic: &mut dyn Statistic, events: &[Event]) -> HashMap<RangeKey, u64> {
    let mut counts = HashMap::new();
    for event in events {
        let range = statistic.get_range(event);
        *counts.entry(RangeKey(range)).or_insert(0) += 1;
    }
    counts
}

/// Count events per `(row range, column range)` pair for a two-dimensional
/// report.
pub fn count_pairs(
    rows: &mut dyn Statistic,
    columns: &mut dyn Statistic,
    events: &[Event],
) -> HashMap<(RangeKey, RangeKey), u64> {
    let mut counts = HashMap::new();
    for event in events {
        let row = rows.get_range(event);
        let column = columns.get_range(event);
        *counts.entry((RangeKey(row), RangeKey(column))).or_insert(0) += 1;
    }
    counts
}
