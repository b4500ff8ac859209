//! # audit-viewer
//!
//! Query, filter and aggregate Linux audit log events. Protected log files
//! are read through a small privileged helper process speaking a framed
//! request/response protocol over a socket pair.
//!
//! ## Modules
//!
//! - `protocol` - Client/server framing protocol for privileged file access
//! - `parse` - Audit log line parsing and the search predicate set
//! - `events` - Event model and the sources that produce events
//! - `filters` - Search filter variants, persistence and merge logic
//! - `stats` - Grouping events into value ranges and counting them
//! - `fields` - Known audit field names
//! - `cli` - Command implementations behind the `audit-viewer` binary

pub mod cli;
pub mod error;
pub mod events;
pub mod fields;
pub mod filters;
pub mod parse;
pub mod protocol;
pub mod stats;

pub use error::{Result, ViewerError};
