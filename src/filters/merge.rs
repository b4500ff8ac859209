//! Merging filter lists without redundant entries.

use std::cmp::Ordering;

use super::{CompareOp, Filter};

/// Position of the timestamp filter with operator `op`, if any.
///
/// The list invariant is at most one `>=` and one `<` timestamp filter, so
/// the first hit is the tracked bound. Scanned fresh on every lookup; the
/// invariant survives sequences of `=` merges that drop bounds mid-call.
fn tracked_bound(filters: &[Filter], op: CompareOp) -> Option<usize> {
    filters
        .iter()
        .position(|f| matches!(f, Filter::Timestamp { op: o, .. } if *o == op))
}

fn cmp_to(incoming: &Filter, filters: &[Filter], at: usize) -> Ordering {
    incoming
        .timestamp_cmp(&filters[at])
        .expect("tracked bounds are timestamp filters")
}

/// Append `additional` to `filters`, avoiding duplicate and redundant
/// entries.
///
/// Timestamp filters with `>=`, `<` and `=` get range-aware handling: an
/// incoming lower bound only replaces a less restrictive one, an incoming
/// upper bound only replaces a less restrictive one, and an equality drops
/// whichever bounds it subsumes before being appended. Everything else is
/// deduplicated by structural equality.
pub fn add_filters(filters: &mut Vec<Filter>, additional: Vec<Filter>) {
    for incoming in additional {
        if let Filter::Timestamp { op, .. } = incoming {
            match op {
                CompareOp::Ge => {
                    match tracked_bound(filters, CompareOp::Ge) {
                        Some(at) => {
                            // Keep the tighter (later) lower bound.
                            if cmp_to(&incoming, filters, at) != Ordering::Less {
                                filters.remove(at);
                                filters.push(incoming);
                            }
                        }
                        None => filters.push(incoming),
                    }
                    continue;
                }
                CompareOp::Lt => {
                    match tracked_bound(filters, CompareOp::Lt) {
                        Some(at) => {
                            // Keep the tighter (earlier) upper bound.
                            if cmp_to(&incoming, filters, at) == Ordering::Less {
                                filters.remove(at);
                                filters.push(incoming);
                            }
                        }
                        None => filters.push(incoming),
                    }
                    continue;
                }
                CompareOp::Eq => {
                    // An equality subsumes any lower bound at or below it
                    // and any upper bound above it.
                    if let Some(at) = tracked_bound(filters, CompareOp::Ge) {
                        if cmp_to(&incoming, filters, at) != Ordering::Less {
                            filters.remove(at);
                        }
                    }
                    if let Some(at) = tracked_bound(filters, CompareOp::Lt) {
                        if cmp_to(&incoming, filters, at) == Ordering::Less {
                            filters.remove(at);
                        }
                    }
                    // Falls through to the generic dedup append.
                }
                CompareOp::Ne => {}
            }
        }
        if !filters.contains(&incoming) {
            filters.push(incoming);
        }
    }
}
