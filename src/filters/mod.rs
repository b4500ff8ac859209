//! Search filters.
//!
//! A list of filters is a conjunction: an event is selected only when every
//! filter in the list matches. Filters are immutable value objects with a
//! stable serialized form keyed by a `type` tag.

pub mod dates;
pub mod merge;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ViewerError};
use crate::events::check_expression;
use crate::parse::Search;

pub use merge::add_filters;

/// Comparison operator carried by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
        }
    }

    /// Apply the operator to two already-ordered values.
    pub fn compare_ord<T: Ord>(self, left: T, right: T) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Ge => left >= right,
            CompareOp::Lt => left < right,
        }
    }

    /// Apply the operator to interpreted string values.
    pub fn compare_strings(self, left: &str, right: &str) -> bool {
        self.compare_ord(left, right)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One search predicate.
///
/// The relative-date variants resolve to an absolute timestamp comparison
/// when applied, using the reference date the caller supplies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Compare an interpreted field value.
    Field {
        field: String,
        op: CompareOp,
        value: String,
    },
    /// Compare the event timestamp against an absolute instant.
    Timestamp { op: CompareOp, sec: i64, ms: u32 },
    /// A free-form search expression.
    Expression { expression: String },
    Now { op: CompareOp },
    MinutesAgo { op: CompareOp, minutes: i64 },
    Today { op: CompareOp },
    Yesterday { op: CompareOp },
    ThisWeekStart { op: CompareOp },
    ThisMonthStart { op: CompareOp },
    ThisYearStart { op: CompareOp },
}

impl Filter {
    /// Install this predicate into `search`, resolving relative dates
    /// against `reference`.
    pub fn apply(&self, search: &mut Search, reference: DateTime<Local>) -> Result<()> {
        match self {
            Filter::Field { field, op, value } => {
                search.add_interpreted_item(field, *op, value);
                Ok(())
            }
            Filter::Timestamp { op, sec, ms } => {
                search.add_timestamp_item(*op, *sec, *ms);
                Ok(())
            }
            Filter::Expression { expression } => search.add_expression(expression),
            _ => {
                let (op, resolved) = self
                    .resolve_relative(reference)
                    .expect("non-relative variants handled above");
                let (sec, ms) = dates::timestamp_parts(resolved);
                search.add_timestamp_item(op, sec, ms);
                Ok(())
            }
        }
    }

    fn resolve_relative(
        &self,
        reference: DateTime<Local>,
    ) -> Option<(CompareOp, DateTime<Local>)> {
        match *self {
            Filter::Now { op } => Some((op, dates::now(reference))),
            Filter::MinutesAgo { op, minutes } => {
                Some((op, dates::minutes_ago(reference, minutes)))
            }
            Filter::Today { op } => Some((op, dates::today(reference))),
            Filter::Yesterday { op } => Some((op, dates::yesterday(reference))),
            Filter::ThisWeekStart { op } => {
                Some((op, dates::this_week_start(reference, dates::locale_week())))
            }
            Filter::ThisMonthStart { op } => Some((op, dates::this_month_start(reference))),
            Filter::ThisYearStart { op } => Some((op, dates::this_year_start(reference))),
            _ => None,
        }
    }

    /// User-readable description of the filter.
    pub fn ui_text(&self) -> String {
        match self {
            Filter::Field { field, op, value } => format!("{field} {op} {value}"),
            Filter::Timestamp { op, sec, ms } => {
                let local = DateTime::from_timestamp(*sec, 0)
                    .unwrap_or_default()
                    .with_timezone(&Local);
                format!("date {op} {}.{ms:03}", local.format("%Y-%m-%d %H:%M:%S"))
            }
            Filter::Expression { expression } => format!("({expression})"),
            Filter::Now { op } => format!("date {op} now"),
            Filter::MinutesAgo { op, minutes } => {
                if *minutes == 1 {
                    format!("date {op} 1 minute ago")
                } else {
                    format!("date {op} {minutes} minutes ago")
                }
            }
            Filter::Today { op } => format!("date {op} today 00:00"),
            Filter::Yesterday { op } => format!("date {op} yesterday 00:00"),
            Filter::ThisWeekStart { op } => format!("date {op} start of this week"),
            Filter::ThisMonthStart { op } => format!("date {op} start of this month"),
            Filter::ThisYearStart { op } => format!("date {op} start of this year"),
        }
    }

    /// Validate invariants that the serialized form cannot express.
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::Timestamp { ms, .. } if *ms >= 1000 => Err(ViewerError::format(format!(
                "timestamp ms value {ms} out of range"
            ))),
            Filter::Expression { expression } => {
                check_expression(expression).map_err(ViewerError::Expression)
            }
            _ => Ok(()),
        }
    }

    /// Total order over timestamp filters, `(sec, ms)` lexicographic.
    ///
    /// Returns `None` unless both sides are [`Filter::Timestamp`].
    pub fn timestamp_cmp(&self, other: &Filter) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (
                Filter::Timestamp { sec: s1, ms: m1, .. },
                Filter::Timestamp { sec: s2, ms: m2, .. },
            ) => Some((s1, m1).cmp(&(s2, m2))),
            _ => None,
        }
    }
}

/// Load a filter from its persisted form, rejecting unknown `type` tags and
/// invalid field values.
pub fn load_filter(value: &serde_json::Value) -> Result<Filter> {
    let filter: Filter =
        serde_json::from_value(value.clone()).map_err(ViewerError::format)?;
    filter.validate()?;
    Ok(filter)
}

/// Persist a filter. Inverse of [`load_filter`].
pub fn save_filter(filter: &Filter) -> serde_json::Value {
    serde_json::to_value(filter).expect("filters always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_buffer;
    use pretty_assertions::assert_eq;

    fn all_variants() -> Vec<Filter> {
        vec![
            Filter::Field {
                field: "uid".into(),
                op: CompareOp::Eq,
                value: "root".into(),
            },
            Filter::Timestamp {
                op: CompareOp::Ge,
                sec: 1285692314,
                ms: 881,
            },
            Filter::Expression {
                expression: "uid == root".into(),
            },
            Filter::Now { op: CompareOp::Lt },
            Filter::MinutesAgo {
                op: CompareOp::Ge,
                minutes: 30,
            },
            Filter::Today { op: CompareOp::Ge },
            Filter::Yesterday { op: CompareOp::Ge },
            Filter::ThisWeekStart { op: CompareOp::Ge },
            Filter::ThisMonthStart { op: CompareOp::Ge },
            Filter::ThisYearStart { op: CompareOp::Ge },
        ]
    }

    #[test]
    fn serialization_round_trips_every_variant() {
        for filter in all_variants() {
            let value = save_filter(&filter);
            assert_eq!(load_filter(&value).unwrap(), filter);
        }
    }

    #[test]
    fn serialized_tags_are_stable() {
        let tags: Vec<String> = all_variants()
            .iter()
            .map(|f| save_filter(f)["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            tags,
            vec![
                "field",
                "timestamp",
                "expression",
                "now",
                "minutes_ago",
                "today",
                "yesterday",
                "this_week_start",
                "this_month_start",
                "this_year_start",
            ]
        );
    }

    #[test]
    fn unknown_tag_is_a_format_error() {
        let value = serde_json::json!({"type": "frobnicate"});
        assert!(matches!(
            load_filter(&value),
            Err(ViewerError::Format(_))
        ));
    }

    #[test]
    fn out_of_range_ms_is_rejected() {
        let value = serde_json::json!({
            "type": "timestamp", "op": ">=", "sec": 10, "ms": 1000,
        });
        assert!(load_filter(&value).is_err());
    }

    #[test]
    fn bad_expression_is_rejected_at_load_time() {
        let value = serde_json::json!({
            "type": "expression", "expression": "uid =="
        });
        assert!(matches!(
            load_filter(&value),
            Err(ViewerError::Expression(_))
        ));
    }

    #[test]
    fn ui_text_renders_operators_and_units() {
        assert_eq!(
            Filter::Field {
                field: "uid".into(),
                op: CompareOp::Ne,
                value: "root".into()
            }
            .ui_text(),
            "uid != root"
        );
        assert_eq!(
            Filter::MinutesAgo {
                op: CompareOp::Ge,
                minutes: 1
            }
            .ui_text(),
            "date >= 1 minute ago"
        );
        assert_eq!(
            Filter::Today { op: CompareOp::Lt }.ui_text(),
            "date < today 00:00"
        );
    }

    #[test]
    fn field_filter_selects_events() {
        let log = "type=SYSCALL msg=audit(100.000:1): uid=0 comm=\"cat\"\n\
                   type=SYSCALL msg=audit(200.000:2): uid=500 comm=\"vi\"\n";
        let events = parse_buffer(log.as_bytes()).unwrap();
        let mut search = Search::new();
        Filter::Field {
            field: "uid".into(),
            op: CompareOp::Eq,
            value: "0".into(),
        }
        .apply(&mut search, Local::now())
        .unwrap();
        let selected: Vec<u64> = events
            .iter()
            .filter(|e| search.matches(e))
            .map(|e| e.serial)
            .collect();
        assert_eq!(selected, vec![1]);
    }

    #[test]
    fn relative_filters_resolve_against_the_reference_date() {
        let reference = Local::now();
        let mut search = Search::new();
        Filter::MinutesAgo {
            op: CompareOp::Ge,
            minutes: 10,
        }
        .apply(&mut search, reference)
        .unwrap();
        let cutoff = reference.timestamp() - 600;
        let log = format!(
            "type=SYSCALL msg=audit({}.000:1): uid=0\n\
             type=SYSCALL msg=audit({}.000:2): uid=0\n",
            cutoff - 5,
            cutoff + 5
        );
        let events = parse_buffer(log.as_bytes()).unwrap();
        let selected: Vec<u64> = events
            .iter()
            .filter(|e| search.matches(e))
            .map(|e| e.serial)
            .collect();
        assert_eq!(selected, vec![2]);
    }
}
