//! Statistics over the event date.
//!
//! All date statistics assign a derived integer key to each event and keep
//! their ranges in a map ordered by that key, so `ordered_ranges` is
//! ascending in time for free.

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use chrono::Datelike;

use super::{Granularity, Statistic, StatisticConfig, ValueRange};
use crate::events::Event;
use crate::filters::dates::{
    self, date_of_ordinal, local_date_of, midnight_timestamp, ordinal, WeekInfo,
};

/// No aggregation: every distinct `(sec, ms)` is its own range.
pub struct SimpleDateStatistic {
    ranges: BTreeMap<(i64, u32), Rc<ValueRange>>,
}

impl SimpleDateStatistic {
    pub fn new() -> Self {
        Self {
            ranges: BTreeMap::new(),
        }
    }
}

impl Default for SimpleDateStatistic {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistic for SimpleDateStatistic {
    fn display_name(&self) -> Option<String> {
        None
    }

    fn clear(&mut self) {
        self.ranges.clear();
    }

    fn get_range(&mut self, event: &Event) -> Rc<ValueRange> {
        let key = (event.id.sec, event.id.milli);
        Rc::clone(self.ranges.entry(key).or_insert_with(|| {
            Rc::new(ValueRange::OneDate {
                sec: key.0,
                ms: key.1,
            })
        }))
    }

    fn ordered_ranges(&self) -> Vec<Rc<ValueRange>> {
        self.ranges.values().map(Rc::clone).collect()
    }

    fn add_wanted_fields(&self, _wanted: &mut HashSet<String>) {}

    fn config(&self) -> StatisticConfig {
        StatisticConfig::SimpleDate
    }
}

/// Aggregates by a fixed number of seconds.
pub struct TimeGroupingStatistic {
    interval: i64,
    granularity: Granularity,
    ranges: BTreeMap<i64, Rc<ValueRange>>,
}

impl TimeGroupingStatistic {
    pub fn new(interval: i64) -> Self {
        let granularity = if interval % 3600 == 0 {
            Granularity::Hour
        } else if interval % 60 == 0 {
            Granularity::Minute
        } else {
            Granularity::Second
        };
        Self {
            interval: interval.max(1),
            granularity,
            ranges: BTreeMap::new(),
        }
    }
}

impl Statistic for TimeGroupingStatistic {
    fn display_name(&self) -> Option<String> {
        let name = match self.interval {
            3600 => "hour".to_string(),
            i if i % 3600 == 0 => format!("{} hours", i / 3600),
            60 => "minute".to_string(),
            i if i % 60 == 0 => format!("{} minutes", i / 60),
            1 => "second".to_string(),
            i => format!("{i} seconds"),
        };
        Some(name)
    }

    fn clear(&mut self) {
        self.ranges.clear();
    }

    fn get_range(&mut self, event: &Event) -> Rc<ValueRange> {
        let key = event.id.sec.div_euclid(self.interval);
        let (interval, granularity) = (self.interval, self.granularity);
        Rc::clone(self.ranges.entry(key).or_insert_with(|| {
            Rc::new(ValueRange::Interval {
                start: key * interval,
                end: (key + 1) * interval,
                granularity,
            })
        }))
    }

    fn ordered_ranges(&self) -> Vec<Rc<ValueRange>> {
        self.ranges.values().map(Rc::clone).collect()
    }

    fn add_wanted_fields(&self, _wanted: &mut HashSet<String>) {}

    fn config(&self) -> StatisticConfig {
        StatisticConfig::TimeGrouping {
            interval: self.interval,
        }
    }
}

/// Aggregates by local calendar day.
pub struct DayGroupingStatistic {
    ranges: BTreeMap<i64, Rc<ValueRange>>,
}

impl DayGroupingStatistic {
    pub fn new() -> Self {
        Self {
            ranges: BTreeMap::new(),
        }
    }
}

impl Default for DayGroupingStatistic {
    fn default() -> Self {
        Self::new()
    }
}

fn day_span_range(start_ordinal: i64, end_ordinal: i64) -> Rc<ValueRange> {
    Rc::new(ValueRange::Days {
        start: midnight_timestamp(date_of_ordinal(start_ordinal)),
        end: midnight_timestamp(date_of_ordinal(end_ordinal)),
    })
}

impl Statistic for DayGroupingStatistic {
    fn display_name(&self) -> Option<String> {
        Some("day".to_string())
    }

    fn clear(&mut self) {
        self.ranges.clear();
    }

    fn get_range(&mut self, event: &Event) -> Rc<ValueRange> {
        let key = ordinal(local_date_of(event.id.sec));
        Rc::clone(
            self.ranges
                .entry(key)
                .or_insert_with(|| day_span_range(key, key + 1)),
        )
    }

    fn ordered_ranges(&self) -> Vec<Rc<ValueRange>> {
        self.ranges.values().map(Rc::clone).collect()
    }

    fn add_wanted_fields(&self, _wanted: &mut HashSet<String>) {}

    fn config(&self) -> StatisticConfig {
        StatisticConfig::DayGrouping
    }
}

/// Aggregates by locale calendar week.
pub struct WeekGroupingStatistic {
    week: WeekInfo,
    ranges: BTreeMap<i64, Rc<ValueRange>>,
}

impl WeekGroupingStatistic {
    pub fn new() -> Self {
        Self::with_week(dates::locale_week())
    }

    /// Use a specific week convention instead of the locale's.
    pub fn with_week(week: WeekInfo) -> Self {
        Self {
            week,
            ranges: BTreeMap::new(),
        }
    }
}

impl Default for WeekGroupingStatistic {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistic for WeekGroupingStatistic {
    fn display_name(&self) -> Option<String> {
        Some("week".to_string())
    }

    fn clear(&mut self) {
        self.ranges.clear();
    }

    fn get_range(&mut self, event: &Event) -> Rc<ValueRange> {
        let date = local_date_of(event.id.sec);
        let key = ordinal(date) - self.week.week_day(date);
        let length = self.week.length;
        Rc::clone(
            self.ranges
                .entry(key)
                .or_insert_with(|| day_span_range(key, key + length)),
        )
    }

    fn ordered_ranges(&self) -> Vec<Rc<ValueRange>> {
        self.ranges.values().map(Rc::clone).collect()
    }

    fn add_wanted_fields(&self, _wanted: &mut HashSet<String>) {}

    fn config(&self) -> StatisticConfig {
        StatisticConfig::WeekGrouping
    }
}

/// Aggregates by calendar month.
pub struct MonthGroupingStatistic {
    ranges: BTreeMap<i64, Rc<ValueRange>>,
}

impl MonthGroupingStatistic {
    pub fn new() -> Self {
        Self {
            ranges: BTreeMap::new(),
        }
    }
}

impl Default for MonthGroupingStatistic {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistic for MonthGroupingStatistic {
    fn display_name(&self) -> Option<String> {
        Some("month".to_string())
    }

    fn clear(&mut self) {
        self.ranges.clear();
    }

    fn get_range(&mut self, event: &Event) -> Rc<ValueRange> {
        let first = local_date_of(event.id.sec)
            .with_day(1)
            .expect("day 1 exists in every month");
        let key = ordinal(first);
        Rc::clone(self.ranges.entry(key).or_insert_with(|| {
            let next = if first.month() == 12 {
                first.with_year(first.year() + 1).and_then(|d| d.with_month(1))
            } else {
                first.with_month(first.month() + 1)
            }
            .expect("first of a month is always valid");
            Rc::new(ValueRange::Month {
                start: midnight_timestamp(first),
                end: midnight_timestamp(next),
            })
        }))
    }

    fn ordered_ranges(&self) -> Vec<Rc<ValueRange>> {
        self.ranges.values().map(Rc::clone).collect()
    }

    fn add_wanted_fields(&self, _wanted: &mut HashSet<String>) {}

    fn config(&self) -> StatisticConfig {
        StatisticConfig::MonthGrouping
    }
}
