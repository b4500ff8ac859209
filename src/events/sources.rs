//! Event source implementations.

use std::cell::RefCell;
use std::collections::HashSet;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::Local;
use tracing::debug;

use super::{Event, EventId, EventSource, Record};
use crate::error::Result;
use crate::events::rotation::{rotation_base, sorted_log_files, ROTATION_SUFFIX_RE};
use crate::filters::Filter;
use crate::parse::{self, ParsedEvent, Search};
use crate::protocol::{Client, Transport};

/// Read events out of a parsed buffer, applying filters and splitting
/// fields between the event and its records.
///
/// This is the shared read path behind every source; it is the hot loop of
/// a refresh.
fn events_from_parsed(
    parsed: Vec<ParsedEvent>,
    filters: &[Filter],
    wanted_fields: &HashSet<String>,
    want_other_fields: bool,
    keep_raw_records: bool,
) -> Result<Vec<Event>> {
    let mut search = Search::new();
    if !filters.is_empty() {
        let reference = Local::now();
        for filter in filters {
            filter.apply(&mut search, reference)?;
        }
    }

    let mut events = Vec::new();
    for parsed_event in parsed {
        if !search.is_empty() && !search.matches(&parsed_event) {
            continue;
        }
        let mut event = Event::new(EventId {
            serial: parsed_event.serial,
            sec: parsed_event.sec,
            milli: parsed_event.milli,
        });
        for parsed_record in parsed_event.records {
            let mut record = Record {
                rtype: parsed_record.rtype,
                raw: keep_raw_records.then(|| parsed_record.raw),
                fields: Vec::new(),
            };
            for (name, value) in parsed_record.fields {
                if wanted_fields.contains(&name) {
                    event.push_field(&name, value);
                } else if want_other_fields {
                    record.fields.push((name, value));
                }
            }
            event.records.push(record);
        }
        events.push(event);
    }
    Ok(events)
}

fn read_buffer_events(
    data: &[u8],
    filters: &[Filter],
    wanted_fields: &HashSet<String>,
    want_other_fields: bool,
    keep_raw_records: bool,
) -> Result<Vec<Event>> {
    let parsed = parse::parse_buffer(data)?;
    events_from_parsed(
        parsed,
        filters,
        wanted_fields,
        want_other_fields,
        keep_raw_records,
    )
}

/// A source returning no events; the safe default before any real source
/// is configured.
#[derive(Debug, Default)]
pub struct EmptyEventSource;

impl EventSource for EmptyEventSource {
    fn read_events(
        &self,
        _filters: &[Filter],
        _wanted_fields: &HashSet<String>,
        _want_other_fields: bool,
        _keep_raw_records: bool,
    ) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }
}

/// A source reading from an in-memory buffer.
#[derive(Debug)]
pub struct BufferEventSource {
    data: Vec<u8>,
}

impl BufferEventSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl EventSource for BufferEventSource {
    fn read_events(
        &self,
        filters: &[Filter],
        wanted_fields: &HashSet<String>,
        want_other_fields: bool,
        keep_raw_records: bool,
    ) -> Result<Vec<Event>> {
        read_buffer_events(
            &self.data,
            filters,
            wanted_fields,
            want_other_fields,
            keep_raw_records,
        )
    }
}

/// A source reading from one file.
#[derive(Debug)]
pub struct FileEventSource {
    path: PathBuf,
}

impl FileEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EventSource for FileEventSource {
    fn read_events(
        &self,
        filters: &[Filter],
        wanted_fields: &HashSet<String>,
        want_other_fields: bool,
        keep_raw_records: bool,
    ) -> Result<Vec<Event>> {
        let data = std::fs::read(&self.path)?;
        read_buffer_events(
            &data,
            filters,
            wanted_fields,
            want_other_fields,
            keep_raw_records,
        )
    }
}

/// A source reading a file plus its rotated siblings, oldest data last.
#[derive(Debug)]
pub struct FileWithRotatedEventSource {
    base: PathBuf,
}

impl FileWithRotatedEventSource {
    /// `path` may name the base file or any of its rotated siblings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let base = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => path.with_file_name(rotation_base(name).to_string()),
            None => path,
        };
        Self { base }
    }

    fn matching_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.base.parent().unwrap_or_else(|| Path::new("."));
        let base_name = self
            .base
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(rest) = name.strip_prefix(base_name) {
                    if ROTATION_SUFFIX_RE.is_match(rest) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        let names = sorted_log_files(names);
        debug!(base = %self.base.display(), files = names.len(), "selected log files");
        Ok(names.into_iter().map(|name| dir.join(name)).collect())
    }
}

impl EventSource for FileWithRotatedEventSource {
    fn read_events(
        &self,
        filters: &[Filter],
        wanted_fields: &HashSet<String>,
        want_other_fields: bool,
        keep_raw_records: bool,
    ) -> Result<Vec<Event>> {
        let mut data = Vec::new();
        for path in self.matching_files()? {
            data.extend_from_slice(&std::fs::read(&path)?);
        }
        read_buffer_events(
            &data,
            filters,
            wanted_fields,
            want_other_fields,
            keep_raw_records,
        )
    }
}

/// A source reading one file through the privileged server.
pub struct ClientEventSource<T: Transport = UnixStream> {
    client: Rc<RefCell<Client<T>>>,
    filename: String,
}

impl<T: Transport> ClientEventSource<T> {
    pub fn new(client: Rc<RefCell<Client<T>>>, filename: impl Into<String>) -> Self {
        Self {
            client,
            filename: filename.into(),
        }
    }
}

impl<T: Transport> EventSource for ClientEventSource<T> {
    fn read_events(
        &self,
        filters: &[Filter],
        wanted_fields: &HashSet<String>,
        want_other_fields: bool,
        keep_raw_records: bool,
    ) -> Result<Vec<Event>> {
        let data = self.client.borrow_mut().read_file(&self.filename)?;
        read_buffer_events(
            &data,
            filters,
            wanted_fields,
            want_other_fields,
            keep_raw_records,
        )
    }
}

/// A source reading a file plus rotated siblings through the privileged
/// server. Selection and ordering match [`FileWithRotatedEventSource`];
/// the downloaded buffers are concatenated before parsing.
pub struct ClientWithRotatedEventSource<T: Transport = UnixStream> {
    client: Rc<RefCell<Client<T>>>,
    base: String,
}

impl<T: Transport> ClientWithRotatedEventSource<T> {
    pub fn new(client: Rc<RefCell<Client<T>>>, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }
}

impl<T: Transport> EventSource for ClientWithRotatedEventSource<T> {
    fn read_events(
        &self,
        filters: &[Filter],
        wanted_fields: &HashSet<String>,
        want_other_fields: bool,
        keep_raw_records: bool,
    ) -> Result<Vec<Event>> {
        let mut client = self.client.borrow_mut();
        let names: Vec<String> = client
            .list_files()?
            .into_iter()
            .filter(|name| {
                name.strip_prefix(&self.base)
                    .is_some_and(|rest| ROTATION_SUFFIX_RE.is_match(rest))
            })
            .collect();
        let mut data = Vec::new();
        for name in sorted_log_files(names) {
            data.extend_from_slice(&client.read_file(&name)?);
        }
        read_buffer_events(
            &data,
            filters,
            wanted_fields,
            want_other_fields,
            keep_raw_records,
        )
    }
}
