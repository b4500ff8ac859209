//! Audit events and the sources that produce them.

pub mod rotation;
pub mod sources;

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::filters::Filter;
use crate::parse;

pub use rotation::{is_rotated_file_name, sorted_log_files};
pub use sources::{
    BufferEventSource, ClientEventSource, ClientWithRotatedEventSource, EmptyEventSource,
    FileEventSource, FileWithRotatedEventSource,
};

/// Identity of an audit event: log sequence id plus wall-clock time.
///
/// Unique per event within one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId {
    pub serial: u64,
    pub sec: i64,
    pub milli: u32,
}

/// An audit record within an event.
#[derive(Debug, Clone)]
pub struct Record {
    /// Numeric record type; [`parse::type_name`] renders it.
    pub rtype: u32,
    /// The raw log line, kept only when the read requested it.
    pub raw: Option<String>,
    /// `(name, interpreted value)` pairs for fields not hoisted into
    /// [`Event::fields`], populated only when the read asked for other
    /// fields.
    pub fields: Vec<(String, String)>,
}

/// A single audit event.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub records: Vec<Record>,
    /// Interpreted values of the fields requested by the read, keyed by
    /// field name, in record encounter order.
    fields: HashMap<String, Vec<String>>,
}

impl Event {
    pub(crate) fn new(id: EventId) -> Self {
        Self {
            id,
            records: Vec::new(),
            fields: HashMap::new(),
        }
    }

    pub(crate) fn push_field(&mut self, name: &str, value: String) {
        match self.fields.get_mut(name) {
            Some(values) => values.push(value),
            None => {
                self.fields.insert(name.to_string(), vec![value]);
            }
        }
    }

    /// All values of a requested field, in record encounter order.
    pub fn field_values(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// First value of a requested field.
    pub fn first_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.first().map(String::as_str)
    }

    /// Remove and return the next value of a requested field.
    ///
    /// Destructive by contract: report code consumes values as it displays
    /// them, so that whatever remains afterwards is exactly the set of
    /// fields nothing displayed. Callers that need the values twice must
    /// use [`Event::field_values`] instead.
    pub fn pop_field_value(&mut self, name: &str) -> Option<String> {
        let values = self.fields.get_mut(name)?;
        if values.is_empty() {
            return None;
        }
        Some(values.remove(0))
    }

    /// Remove and return all values of a requested field. Destructive; see
    /// [`Event::pop_field_value`].
    pub fn take_field(&mut self, name: &str) -> Option<Vec<String>> {
        self.fields.remove(name)
    }

    /// Names of requested fields that still have values.
    pub fn remaining_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.as_str())
    }
}

/// A source of audit events.
pub trait EventSource {
    /// Read events selected by `filters`.
    ///
    /// Values of `wanted_fields` are accumulated into [`Event::fields`];
    /// when `want_other_fields` is set, every remaining field lands in its
    /// record's [`Record::fields`]; raw record text is kept only when
    /// `keep_raw_records` is set.
    ///
    /// The returned events are in arbitrary order, not necessarily the
    /// order defined in the source file.
    fn read_events(
        &self,
        filters: &[Filter],
        wanted_fields: &HashSet<String>,
        want_other_fields: bool,
        keep_raw_records: bool,
    ) -> Result<Vec<Event>>;
}

/// Check a search expression without reading any events.
///
/// Returns the validator's message for a syntactically wrong expression;
/// never fails outright for one.
pub fn check_expression(expression: &str) -> std::result::Result<(), String> {
    parse::expr::parse(expression).map(|_| ())
}
