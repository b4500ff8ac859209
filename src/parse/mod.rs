//! Audit log parsing.
//!
//! This is the capability the event sources are built on: given a byte
//! buffer of audit log text, produce events with timestamps and interpreted
//! field key/value pairs, and match them against a conjunction of search
//! predicates. The syntax handled here is the `type=... msg=audit(...)`
//! line format written by auditd.

pub mod expr;
pub mod types;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::{Result, ViewerError};
use crate::filters::CompareOp;

pub use types::{type_code, type_name};

/// One parsed audit log line.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    /// Numeric record type
    pub rtype: u32,
    /// The raw line as it appeared in the log
    pub raw: String,
    /// Interpreted `(name, value)` pairs in line order
    pub fields: Vec<(String, String)>,
}

impl ParsedRecord {
    /// First value of a named field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// All records sharing one audit event id.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub serial: u64,
    pub sec: i64,
    pub milli: u32,
    pub records: Vec<ParsedRecord>,
}

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:node=(\S+) )?type=(\S+) msg=audit\((\d+)\.(\d+):(\d+)\):\s*(.*)$")
        .expect("invalid audit line pattern")
});

/// Parse a whole buffer into events.
///
/// Records are grouped by their `(serial, sec, milli)` id as they are
/// scanned, so two runs of the same event's records separated by other
/// events still land in one event. The returned order is the order in which
/// each id was first seen, which callers must treat as arbitrary.
///
/// Lines that do not look like audit records are skipped; a buffer that is
/// not even text fails with an I/O error, mirroring how the underlying
/// parser library reports unusable input.
pub fn parse_buffer(data: &[u8]) -> Result<Vec<ParsedEvent>> {
    let text = std::str::from_utf8(data).map_err(|_| {
        ViewerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "audit log is not valid UTF-8",
        ))
    })?;
    let mut order = Vec::new();
    let mut by_id: HashMap<(u64, i64, u32), ParsedEvent> = HashMap::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let Some(caps) = LINE_RE.captures(line) else {
            continue;
        };
        let sec: i64 = caps[3].parse().unwrap_or(0);
        let milli: u32 = caps[4].parse().unwrap_or(0);
        let serial: u64 = caps[5].parse().unwrap_or(0);

        let mut fields = Vec::new();
        if let Some(node) = caps.get(1) {
            fields.push(("node".to_string(), node.as_str().to_string()));
        }
        parse_fields(&caps[6], &mut fields);
        let record = ParsedRecord {
            rtype: type_code(&caps[2]),
            raw: line.to_string(),
            fields,
        };

        let id = (serial, sec, milli);
        by_id
            .entry(id)
            .or_insert_with(|| {
                order.push(id);
                ParsedEvent {
                    serial,
                    sec,
                    milli,
                    records: Vec::new(),
                }
            })
            .records
            .push(record);
    }
    Ok(order
        .into_iter()
        .map(|id| by_id.remove(&id).expect("event recorded in scan order"))
        .collect())
}

/// Split the body of a record into interpreted `name=value` pairs.
///
/// The `msg='...'` wrapper used by user-space records is unwrapped and its
/// contents parsed as further fields of the same record.
fn parse_fields(body: &str, out: &mut Vec<(String, String)>) {
    let mut rest = body;
    while let Some((name, value, tail)) = next_pair(rest) {
        if name == "msg" {
            if let Some(inner) = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
            {
                parse_fields(inner, out);
                rest = tail;
                continue;
            }
        }
        let value = interpret_value(&name, value);
        out.push((name, value));
        rest = tail;
    }
}

/// Pull one `name=value` pair off the front of `rest`.
///
/// Values may be bare, double-quoted, or single-quoted; quoted values may
/// contain spaces.
fn next_pair(rest: &str) -> Option<(String, &str, &str)> {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    let eq = rest.find('=')?;
    let name = &rest[..eq];
    if name.is_empty() || name.contains(' ') {
        // A stray token without '=' before the next pair; skip it.
        let skip = rest.find(' ').map(|p| p + 1)?;
        return next_pair(&rest[skip..]);
    }
    let after = &rest[eq + 1..];
    let (value, tail) = match after.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &after[1..];
            match inner.find(quote) {
                Some(end) => (&after[..end + 2], &inner[end + 1..]),
                None => (after, ""),
            }
        }
        _ => match after.find(' ') {
            Some(end) => (&after[..end], &after[end + 1..]),
            None => (after, ""),
        },
    };
    Some((name.to_string(), value, tail))
}

/// Fields whose unquoted values auditd hex-encodes when they contain
/// unprintable bytes.
const HEX_ENCODED_FIELDS: &[&str] = &["proctitle", "cmd", "data", "acct", "comm", "exe"];

/// Produce the interpreted form of a raw field value.
///
/// Quoting is stripped and hex-encoded strings are decoded. Anything this
/// implementation cannot improve on is passed through raw, the same
/// fallback the event read loop applies when the parser library offers no
/// interpretation.
fn interpret_value(name: &str, raw: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    if HEX_ENCODED_FIELDS.contains(&name) {
        if let Some(decoded) = decode_hex_string(raw) {
            return decoded;
        }
    }
    raw.to_string()
}

fn decode_hex_string(raw: &str) -> Option<String> {
    if raw.len() < 2 || raw.len() % 2 != 0 {
        return None;
    }
    if !raw.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
        return None;
    }
    let mut bytes = Vec::with_capacity(raw.len() / 2);
    for i in (0..raw.len()).step_by(2) {
        bytes.push(u8::from_str_radix(&raw[i..i + 2], 16).ok()?);
    }
    // NUL separates proctitle arguments; show them space-separated.
    let text = String::from_utf8(bytes).ok()?;
    Some(text.replace('\0', " "))
}

/// A conjunction of search predicates over parsed events.
///
/// Filters install themselves here; an event is reported only when every
/// predicate holds.
#[derive(Debug, Default)]
pub struct Search {
    preds: Vec<Pred>,
}

#[derive(Debug)]
enum Pred {
    Field {
        field: String,
        op: CompareOp,
        value: String,
    },
    Timestamp {
        op: CompareOp,
        sec: i64,
        ms: u32,
    },
    Expr(expr::Expr),
}

impl Search {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no predicates have been installed.
    pub fn is_empty(&self) -> bool {
        self.preds.is_empty()
    }

    /// Require a field to compare against an interpreted value.
    pub fn add_interpreted_item(&mut self, field: &str, op: CompareOp, value: &str) {
        self.preds.push(Pred::Field {
            field: field.to_string(),
            op,
            value: value.to_string(),
        });
    }

    /// Require the event timestamp to compare against `(sec, ms)`.
    pub fn add_timestamp_item(&mut self, op: CompareOp, sec: i64, ms: u32) {
        self.preds.push(Pred::Timestamp { op, sec, ms });
    }

    /// Require a search expression to hold.
    pub fn add_expression(&mut self, expression: &str) -> Result<()> {
        let parsed = expr::parse(expression).map_err(ViewerError::expression)?;
        self.preds.push(Pred::Expr(parsed));
        Ok(())
    }

    /// Return true if `event` satisfies every installed predicate.
    pub fn matches(&self, event: &ParsedEvent) -> bool {
        self.preds.iter().all(|pred| match pred {
            Pred::Field { field, op, value } => event
                .records
                .iter()
                .flat_map(|r| r.fields.iter())
                .filter(|(name, _)| name == field)
                .any(|(_, v)| op.compare_strings(v, value)),
            Pred::Timestamp { op, sec, ms } => {
                op.compare_ord((event.sec, event.milli), (*sec, *ms))
            }
            Pred::Expr(e) => e.matches(event),
        })
    }
}
