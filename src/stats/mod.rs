//! Grouping events into value ranges for reporting.
//!
//! A [`Statistic`] assigns each event a bucket, its [`ValueRange`]. Two
//! events belonging to the same bucket always get the very same
//! `Rc<ValueRange>` between two [`Statistic::clear`] calls, so bucket
//! identity doubles as grouping equality; [`RangeKey`] makes that identity
//! usable as a map key when counting.

pub mod counts;
pub mod date;
pub mod field;

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};
use crate::events::Event;
use crate::fields;
use crate::filters::{CompareOp, Filter};

pub use counts::{count_pairs, count_ranges};
pub use date::{
    DayGroupingStatistic, MonthGroupingStatistic, SimpleDateStatistic, TimeGroupingStatistic,
    WeekGroupingStatistic,
};
pub use field::FieldStatistic;

/// Time display granularity of an interval range label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Second,
    Minute,
    Hour,
}

/// One bucket of events.
#[derive(Debug)]
pub enum ValueRange {
    /// A single field value.
    OneValue { field: String, value: String },
    /// Events without a value for the statistic's field.
    NoValue,
    /// A single `(sec, ms)` timestamp.
    OneDate { sec: i64, ms: u32 },
    /// A half-open `[start, end)` interval of whole seconds.
    Interval {
        start: i64,
        end: i64,
        granularity: Granularity,
    },
    /// A half-open range of calendar days, `[start, end)` as timestamps of
    /// local midnights.
    Days { start: i64, end: i64 },
    /// One calendar month, `[start, end)` as timestamps of local midnights.
    Month { start: i64, end: i64 },
}

fn local(sec: i64) -> DateTime<Local> {
    DateTime::from_timestamp(sec, 0)
        .unwrap_or_default()
        .with_timezone(&Local)
}

impl ValueRange {
    /// UI label for this range.
    pub fn label(&self) -> String {
        match self {
            ValueRange::OneValue { value, .. } => value.clone(),
            ValueRange::NoValue => "Unspecified".to_string(),
            ValueRange::OneDate { sec, ms } => {
                format!("{}.{ms:03}", local(*sec).format("%Y-%m-%d %H:%M:%S"))
            }
            ValueRange::Interval {
                start, granularity, ..
            } => {
                let fmt = match granularity {
                    Granularity::Second => "%Y-%m-%d %H:%M:%S",
                    Granularity::Minute => "%Y-%m-%d %H:%M",
                    Granularity::Hour => "%Y-%m-%d %H",
                };
                local(*start).format(fmt).to_string()
            }
            ValueRange::Days { start, .. } => local(*start).format("%Y-%m-%d").to_string(),
            ValueRange::Month { start, .. } => local(*start).format("%b %Y").to_string(),
        }
    }

    /// A label a spreadsheet will interpret as a value of the right type.
    pub fn csv_label(&self) -> String {
        match self {
            // Millisecond precision is dropped.
            ValueRange::OneDate { sec, .. } => {
                local(*sec).format("%Y-%m-%d %H:%M:%S").to_string()
            }
            // A bare hour does not parse as a date in spreadsheets.
            ValueRange::Interval {
                start,
                granularity: Granularity::Hour,
                ..
            } => local(*start).format("%Y-%m-%d %H:%M").to_string(),
            ValueRange::Month { start, .. } => local(*start).format("%Y-%m-01").to_string(),
            _ => self.label(),
        }
    }

    /// Filters limiting a search to exactly this range.
    ///
    /// `None` means drill-down is not possible for this range; that is an
    /// expected outcome for [`ValueRange::NoValue`], not an error.
    pub fn to_filters(&self) -> Option<Vec<Filter>> {
        match self {
            ValueRange::OneValue { field, value } => Some(vec![Filter::Field {
                field: field.clone(),
                op: CompareOp::Eq,
                value: value.clone(),
            }]),
            ValueRange::NoValue => None,
            ValueRange::OneDate { sec, ms } => Some(vec![Filter::Timestamp {
                op: CompareOp::Eq,
                sec: *sec,
                ms: *ms,
            }]),
            ValueRange::Interval { start, end, .. }
            | ValueRange::Days { start, end }
            | ValueRange::Month { start, end } => Some(vec![
                Filter::Timestamp {
                    op: CompareOp::Ge,
                    sec: *start,
                    ms: 0,
                },
                Filter::Timestamp {
                    op: CompareOp::Lt,
                    sec: *end,
                    ms: 0,
                },
            ]),
        }
    }
}

/// Bucket identity as a map key.
///
/// Compares and hashes the `Rc` pointer, never the range contents; the
/// canonical-instance guarantee of [`Statistic::get_range`] makes this the
/// grouping equality.
#[derive(Debug, Clone)]
pub struct RangeKey(pub Rc<ValueRange>);

impl PartialEq for RangeKey {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for RangeKey {}

impl Hash for RangeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

/// A stateful bucket-assignment engine bound to one field or to the event
/// date.
///
/// Lifecycle: construct or load, [`Statistic::clear`], one
/// [`Statistic::get_range`] call per event, then
/// [`Statistic::ordered_ranges`]. Instances belong to one report and are
/// not reused across refreshes without a `clear`.
pub trait Statistic {
    /// User-readable name, or `None` for the default statistic of a field.
    fn display_name(&self) -> Option<String>;

    /// Drop all collected ranges and prepare for a new gathering pass.
    fn clear(&mut self);

    /// Return the bucket for `event`, creating it on first use.
    ///
    /// Events mapping onto the same bucket key always get the identical
    /// `Rc` until the next [`Statistic::clear`].
    fn get_range(&mut self, event: &Event) -> Rc<ValueRange>;

    /// All distinct ranges touched since the last clear, in presentation
    /// order.
    fn ordered_ranges(&self) -> Vec<Rc<ValueRange>>;

    /// Add the event fields this statistic needs to `wanted`.
    fn add_wanted_fields(&self, wanted: &mut HashSet<String>);

    /// The persistable form of this statistic.
    fn config(&self) -> StatisticConfig;
}

/// Persisted form of a statistic; the `type` tag strings are stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatisticConfig {
    SimpleField { field: String },
    NumericField { field: String },
    SimpleDate,
    TimeGrouping { interval: i64 },
    DayGrouping,
    WeekGrouping,
    MonthGrouping,
}

impl StatisticConfig {
    /// Build a fresh statistic from this configuration.
    pub fn build(&self) -> Box<dyn Statistic> {
        match self {
            StatisticConfig::SimpleField { field } => Box::new(FieldStatistic::simple(field)),
            StatisticConfig::NumericField { field } => Box::new(FieldStatistic::numeric(field)),
            StatisticConfig::SimpleDate => Box::new(SimpleDateStatistic::new()),
            StatisticConfig::TimeGrouping { interval } => {
                Box::new(TimeGroupingStatistic::new(*interval))
            }
            StatisticConfig::DayGrouping => Box::new(DayGroupingStatistic::new()),
            StatisticConfig::WeekGrouping => Box::new(WeekGroupingStatistic::new()),
            StatisticConfig::MonthGrouping => Box::new(MonthGroupingStatistic::new()),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            StatisticConfig::TimeGrouping { interval } if *interval < 1 => Err(
                ViewerError::format(format!("grouping interval {interval} out of range")),
            ),
            _ => Ok(()),
        }
    }
}

/// Load a statistic from its persisted form, rejecting unknown `type` tags
/// and invalid attribute values.
pub fn load_statistic(value: &serde_json::Value) -> Result<Box<dyn Statistic>> {
    let config: StatisticConfig =
        serde_json::from_value(value.clone()).map_err(ViewerError::format)?;
    config.validate()?;
    Ok(config.build())
}

/// Persist a statistic. Inverse of [`load_statistic`].
pub fn save_statistic(statistic: &dyn Statistic) -> serde_json::Value {
    serde_json::to_value(statistic.config()).expect("statistic configs always serialize")
}

/// The statistics available for a field, default first.
///
/// `"date"` groups by the event timestamp; fields known to hold integers
/// sort numerically, everything else by label.
pub fn options(field_name: &str) -> Vec<Box<dyn Statistic>> {
    if field_name == "date" {
        vec![
            Box::new(SimpleDateStatistic::new()),
            Box::new(TimeGroupingStatistic::new(60)),
            Box::new(TimeGroupingStatistic::new(3600)),
            Box::new(DayGroupingStatistic::new()),
            Box::new(WeekGroupingStatistic::new()),
            Box::new(MonthGroupingStatistic::new()),
        ]
    } else if fields::is_integer_field(field_name) {
        vec![Box::new(FieldStatistic::numeric(field_name))]
    } else {
        vec![Box::new(FieldStatistic::simple(field_name))]
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::events::{Event, EventId};

    /// An event with the given id parts and `(field, value)` pairs.
    pub fn event(serial: u64, sec: i64, milli: u32, fields: &[(&str, &str)]) -> Event {
        let mut event = Event::new(EventId { serial, sec, milli });
        for (name, value) in fields {
            event.push_field(name, value.to_string());
        }
        event
    }
}
