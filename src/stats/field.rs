//! Statistics over field values.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::{Statistic, StatisticConfig, ValueRange};
use crate::events::Event;

/// Groups events by the exact interpreted value of one field.
///
/// Events without the field share a single "Unspecified" range. A numeric
/// statistic orders integer-parseable values by their value instead of
/// their spelling.
pub struct FieldStatistic {
    field_name: String,
    numeric: bool,
    ranges: HashMap<String, Rc<ValueRange>>,
    no_value: Option<Rc<ValueRange>>,
}

impl FieldStatistic {
    /// Label-ordered statistic over `field`.
    pub fn simple(field: impl Into<String>) -> Self {
        Self {
            field_name: field.into(),
            numeric: false,
            ranges: HashMap::new(),
            no_value: None,
        }
    }

    /// Numerically ordered statistic over `field`.
    pub fn numeric(field: impl Into<String>) -> Self {
        Self {
            numeric: true,
            ..Self::simple(field)
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl Statistic for FieldStatistic {
    fn display_name(&self) -> Option<String> {
        None
    }

    fn clear(&mut self) {
        self.ranges.clear();
        self.no_value = None;
    }

    fn get_range(&mut self, event: &Event) -> Rc<ValueRange> {
        match event.first_field(&self.field_name) {
            Some(value) => Rc::clone(self.ranges.entry(value.to_string()).or_insert_with(|| {
                Rc::new(ValueRange::OneValue {
                    field: self.field_name.clone(),
                    value: value.to_string(),
                })
            })),
            None => Rc::clone(
                self.no_value
                    .get_or_insert_with(|| Rc::new(ValueRange::NoValue)),
            ),
        }
    }

    fn ordered_ranges(&self) -> Vec<Rc<ValueRange>> {
        let mut ranges: Vec<Rc<ValueRange>> = self.ranges.values().map(Rc::clone).collect();
        if self.numeric {
            // Integers by value first, everything else by label after them.
            ranges.sort_by_key(|r| {
                let label = r.label();
                match label.parse::<i64>() {
                    Ok(n) => (0, n, String::new()),
                    Err(_) => (1, 0, label),
                }
            });
        } else {
            ranges.sort_by_key(|r| r.label());
        }
        if let Some(no_value) = &self.no_value {
            ranges.push(Rc::clone(no_value));
        }
        ranges
    }

    fn add_wanted_fields(&self, wanted: &mut HashSet<String>) {
        wanted.insert(self.field_name.clone());
    }

    fn config(&self) -> StatisticConfig {
        if self.numeric {
            StatisticConfig::NumericField {
                field: self.field_name.clone(),
            }
        } else {
            StatisticConfig::SimpleField {
                field: self.field_name.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::event;
    use super::*;

    #[test]
    fn equal_values_share_one_range_instance() {
        let mut statistic = FieldStatistic::simple("uid");
        statistic.clear();
        let a = statistic.get_range(&event(1, 100, 0, &[("uid", "root")]));
        let b = statistic.get_range(&event(2, 200, 0, &[("uid", "root")]));
        assert!(Rc::ptr_eq(&a, &b));
        let c = statistic.get_range(&event(3, 300, 0, &[("uid", "jdoe")]));
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn clear_resets_canonical_instances() {
        let mut statistic = FieldStatistic::simple("uid");
        let a = statistic.get_range(&event(1, 100, 0, &[("uid", "root")]));
        statistic.clear();
        let b = statistic.get_range(&event(1, 100, 0, &[("uid", "root")]));
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(statistic.ordered_ranges().len(), 1);
    }

    #[test]
    fn missing_values_share_the_unspecified_range() {
        let mut statistic = FieldStatistic::simple("key");
        statistic.clear();
        let a = statistic.get_range(&event(1, 100, 0, &[("uid", "root")]));
        let b = statistic.get_range(&event(2, 200, 0, &[]));
        assert!(Rc::ptr_eq(&a, &b));
        assert!(a.to_filters().is_none());
    }

    #[test]
    fn simple_order_is_lexicographic_with_unspecified_last() {
        let mut statistic = FieldStatistic::simple("comm");
        statistic.clear();
        for (serial, comm) in [(1, "vi"), (2, "cat"), (3, "less")] {
            statistic.get_range(&event(serial, 100, 0, &[("comm", comm)]));
        }
        statistic.get_range(&event(4, 100, 0, &[]));
        let labels: Vec<String> = statistic.ordered_ranges().iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["cat", "less", "vi", "Unspecified"]);
    }

    #[test]
    fn numeric_order_puts_integers_first_by_value() {
        let mut statistic = FieldStatistic::numeric("pid");
        statistic.clear();
        for (serial, pid) in [(1, "3"), (2, "1"), (3, "10"), (4, "?"), (5, "2")] {
            statistic.get_range(&event(serial, 100, 0, &[("pid", pid)]));
        }
        statistic.get_range(&event(6, 100, 0, &[]));
        let labels: Vec<String> = statistic.ordered_ranges().iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["1", "2", "3", "10", "?", "Unspecified"]);
    }

    #[test]
    fn value_ranges_drill_down_to_field_filters() {
        let mut statistic = FieldStatistic::simple("uid");
        statistic.clear();
        let range = statistic.get_range(&event(1, 100, 0, &[("uid", "root")]));
        let filters = range.to_filters().unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].ui_text(), "uid = root");
    }

    #[test]
    fn wanted_fields_name_the_grouped_field() {
        let statistic = FieldStatistic::simple("uid");
        let mut wanted = HashSet::new();
        statistic.add_wanted_fields(&mut wanted);
        assert!(wanted.contains("uid"));
    }
}
