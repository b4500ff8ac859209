//! Command implementations for the `audit-viewer` binary.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crate::error::ViewerError;
use crate::events::{
    check_expression, rotation::rotation_base, ClientEventSource, ClientWithRotatedEventSource,
    Event, EventSource, FileEventSource, FileWithRotatedEventSource,
};
use crate::filters::{add_filters, CompareOp, Filter};
use crate::protocol::Client;
use crate::stats::{self, count_pairs, count_ranges, RangeKey, Statistic};

/// View and summarize audit log events
#[derive(Parser)]
#[command(name = "audit-viewer", version)]
#[command(about = "Query, filter and aggregate audit log events", long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct SourceArgs {
    /// Audit log file to read
    #[arg(long, default_value = "/var/log/audit/audit.log")]
    pub file: PathBuf,

    /// Include rotated siblings of the log file
    #[arg(long)]
    pub rotated: bool,

    /// Read through the privileged server binary at this path
    #[arg(long)]
    pub server: Option<PathBuf>,
}

#[derive(Args)]
pub struct FilterArgs {
    /// Field filter, NAME=VALUE or NAME!=VALUE (repeatable)
    #[arg(long = "filter", value_name = "NAME(=|!=)VALUE")]
    pub filters: Vec<String>,

    /// Search expression, e.g. 'uid == 0 && comm == "cat"'
    #[arg(short, long)]
    pub expression: Option<String>,

    /// Only events from the last N minutes
    #[arg(long, value_name = "N")]
    pub since_minutes: Option<i64>,

    /// Only events from today
    #[arg(long)]
    pub today: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print matching events
    List {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        filters: FilterArgs,

        /// Event field to display (repeatable; default uid, comm, exe)
        #[arg(long = "field", value_name = "NAME")]
        fields: Vec<String>,

        /// Also display the remaining fields of every record
        #[arg(long)]
        other_fields: bool,

        /// Display raw record lines
        #[arg(long)]
        raw: bool,
    },
    /// Count events grouped by a field or by date
    Report {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        filters: FilterArgs,

        /// Field to group rows by ("date" groups by event time)
        #[arg(long)]
        row: String,

        /// Row grouping to use instead of the field's default, e.g. "hour"
        #[arg(long, value_name = "NAME")]
        row_grouping: Option<String>,

        /// Field to group columns by, for a two-dimensional report
        #[arg(long)]
        column: Option<String>,

        /// Column grouping to use instead of the default
        #[arg(long, value_name = "NAME")]
        column_grouping: Option<String>,

        /// Emit comma-separated values with spreadsheet-safe labels
        #[arg(long)]
        csv: bool,
    },
    /// Validate a search expression without reading any events
    CheckExpr {
        /// The expression to validate
        expression: String,
    },
    /// List the field names known to filtering and grouping
    Fields,
    /// List audit log files available through the privileged server
    ListFiles {
        /// Path of the privileged server binary
        #[arg(long)]
        server: PathBuf,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::List {
            source,
            filters,
            fields,
            other_fields,
            raw,
        } => run_list(&source, &filters, fields, other_fields, raw),
        Commands::Report {
            source,
            filters,
            row,
            row_grouping,
            column,
            column_grouping,
            csv,
        } => run_report(
            &source,
            &filters,
            &row,
            row_grouping.as_deref(),
            column.as_deref(),
            column_grouping.as_deref(),
            csv,
        ),
        Commands::CheckExpr { expression } => run_check_expr(&expression),
        Commands::Fields => run_fields(),
        Commands::ListFiles { server } => run_list_files(&server),
    }
}

fn file_name(path: &Path) -> anyhow::Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))
}

/// Build the event source the source arguments describe.
///
/// An unavailable privileged server is not fatal; the command falls back
/// to direct file access and may then fail with a permission error.
fn build_source(args: &SourceArgs) -> anyhow::Result<Box<dyn EventSource>> {
    if let Some(server) = &args.server {
        match Client::spawn(server) {
            Ok(client) => {
                let client = Rc::new(RefCell::new(client));
                let name = file_name(&args.file)?;
                return Ok(if args.rotated {
                    Box::new(ClientWithRotatedEventSource::new(client, rotation_base(name)))
                } else {
                    Box::new(ClientEventSource::new(client, name))
                });
            }
            Err(ViewerError::ServerUnavailable) => {
                warn!("privileged server unavailable, reading files directly");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(if args.rotated {
        Box::new(FileWithRotatedEventSource::new(&args.file))
    } else {
        Box::new(FileEventSource::new(&args.file))
    })
}

fn parse_field_filter(spec: &str) -> anyhow::Result<Filter> {
    let (field, op, value) = if let Some((field, value)) = spec.split_once("!=") {
        (field, CompareOp::Ne, value)
    } else if let Some((field, value)) = spec.split_once('=') {
        (field, CompareOp::Eq, value)
    } else {
        bail!("filter {spec:?} is not NAME=VALUE or NAME!=VALUE");
    };
    if field.is_empty() {
        bail!("filter {spec:?} has an empty field name");
    }
    Ok(Filter::Field {
        field: field.to_string(),
        op,
        value: value.to_string(),
    })
}

/// Turn the filter arguments into a merged, validated filter list.
fn build_filters(args: &FilterArgs) -> anyhow::Result<Vec<Filter>> {
    let mut additional = Vec::new();
    for spec in &args.filters {
        additional.push(parse_field_filter(spec)?);
    }
    if let Some(expression) = &args.expression {
        additional.push(Filter::Expression {
            expression: expression.clone(),
        });
    }
    if let Some(minutes) = args.since_minutes {
        additional.push(Filter::MinutesAgo {
            op: CompareOp::Ge,
            minutes,
        });
    }
    if args.today {
        additional.push(Filter::Today { op: CompareOp::Ge });
    }
    for filter in &additional {
        filter.validate()?;
    }
    let mut filters = Vec::new();
    add_filters(&mut filters, additional);
    Ok(filters)
}

fn read_sorted_events(
    source: &dyn EventSource,
    filters: &[Filter],
    wanted: &HashSet<String>,
    want_other_fields: bool,
    keep_raw_records: bool,
) -> anyhow::Result<Vec<Event>> {
    let mut events = source
        .read_events(filters, wanted, want_other_fields, keep_raw_records)
        .context("reading events failed")?;
    events.sort_by_key(|e| e.id);
    Ok(events)
}

fn run_list(
    source_args: &SourceArgs,
    filter_args: &FilterArgs,
    fields: Vec<String>,
    other_fields: bool,
    raw: bool,
) -> anyhow::Result<()> {
    let fields = if fields.is_empty() {
        vec!["uid".to_string(), "comm".to_string(), "exe".to_string()]
    } else {
        fields
    };
    let source = build_source(source_args)?;
    let filters = build_filters(filter_args)?;
    let wanted: HashSet<String> = fields.iter().cloned().collect();
    let events = read_sorted_events(source.as_ref(), &filters, &wanted, other_fields, raw)?;

    for mut event in events {
        let mut line = format!("{}.{:03}:{}", event.id.sec, event.id.milli, event.id.serial);
        for field in &fields {
            // Consuming the value here leaves only the fields nothing
            // printed; that is the contract of the accessor.
            while let Some(value) = event.pop_field_value(field) {
                line.push_str(&format!(" {field}={value}"));
            }
        }
        println!("{line}");
        if other_fields {
            for record in &event.records {
                if record.fields.is_empty() {
                    continue;
                }
                let mut detail = format!("  {}:", crate::parse::type_name(record.rtype));
                for (name, value) in &record.fields {
                    detail.push_str(&format!(" {name}={value}"));
                }
                println!("{detail}");
            }
        }
        if raw {
            for record in &event.records {
                if let Some(text) = &record.raw {
                    println!("  {text}");
                }
            }
        }
    }
    Ok(())
}

/// Pick a statistic for `field`, by grouping name or the field's default.
fn pick_statistic(field: &str, grouping: Option<&str>) -> anyhow::Result<Box<dyn Statistic>> {
    let mut options = stats::options(field);
    match grouping {
        None => Ok(options.remove(0)),
        Some(name) => options
            .into_iter()
            .find(|s| s.display_name().as_deref() == Some(name))
            .ok_or_else(|| anyhow!("no {name:?} grouping for field {field:?}")),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_report(
    source_args: &SourceArgs,
    filter_args: &FilterArgs,
    row: &str,
    row_grouping: Option<&str>,
    column: Option<&str>,
    column_grouping: Option<&str>,
    csv: bool,
) -> anyhow::Result<()> {
    let mut rows = pick_statistic(row, row_grouping)?;
    let mut columns = match column {
        Some(field) => Some(pick_statistic(field, column_grouping)?),
        None => None,
    };

    let source = build_source(source_args)?;
    let filters = build_filters(filter_args)?;
    let mut wanted = HashSet::new();
    rows.add_wanted_fields(&mut wanted);
    if let Some(columns) = &columns {
        columns.add_wanted_fields(&mut wanted);
    }
    let events = read_sorted_events(source.as_ref(), &filters, &wanted, false, false)?;

    let sep = if csv { "," } else { "\t" };
    let label = |range: &crate::stats::ValueRange| {
        if csv {
            range.csv_label()
        } else {
            range.label()
        }
    };

    rows.clear();
    match &mut columns {
        None => {
            let counts = count_ranges(rows.as_mut(), &events);
            for range in rows.ordered_ranges() {
                let count = counts
                    .get(&RangeKey(Rc::clone(&range)))
                    .copied()
                    .unwrap_or(0);
                println!("{}{sep}{count}", label(&range));
            }
        }
        Some(columns) => {
            columns.clear();
            let counts = count_pairs(rows.as_mut(), columns.as_mut(), &events);
            let column_ranges = columns.ordered_ranges();
            let header: Vec<String> = column_ranges.iter().map(|r| label(r)).collect();
            println!("{sep}{}", header.join(sep));
            for row_range in rows.ordered_ranges() {
                let mut cells = vec![label(&row_range)];
                for column_range in &column_ranges {
                    let key = (
                        RangeKey(Rc::clone(&row_range)),
                        RangeKey(Rc::clone(column_range)),
                    );
                    cells.push(counts.get(&key).copied().unwrap_or(0).to_string());
                }
                println!("{}", cells.join(sep));
            }
        }
    }
    Ok(())
}

fn run_check_expr(expression: &str) -> anyhow::Result<()> {
    match check_expression(expression) {
        Ok(()) => {
            println!("expression is valid");
            Ok(())
        }
        Err(message) => bail!("{message}"),
    }
}

fn run_fields() -> anyhow::Result<()> {
    for name in crate::fields::FIELD_NAMES {
        if crate::fields::is_integer_field(name) {
            println!("{name} (integer)");
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

fn run_list_files(server: &Path) -> anyhow::Result<()> {
    let mut client = Client::spawn(server).context("starting the privileged server failed")?;
    for name in client.list_files()? {
        println!("{name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_filter_specs_parse_both_operators() {
        assert_eq!(
            parse_field_filter("uid=0").unwrap(),
            Filter::Field {
                field: "uid".into(),
                op: CompareOp::Eq,
                value: "0".into(),
            }
        );
        assert_eq!(
            parse_field_filter("comm!=cat").unwrap(),
            Filter::Field {
                field: "comm".into(),
                op: CompareOp::Ne,
                value: "cat".into(),
            }
        );
        assert!(parse_field_filter("nonsense").is_err());
        assert!(parse_field_filter("=value").is_err());
    }

    #[test]
    fn filter_args_merge_and_validate() {
        let args = FilterArgs {
            filters: vec!["uid=0".into(), "uid=0".into()],
            expression: Some("comm == cat".into()),
            since_minutes: Some(30),
            today: false,
        };
        let filters = build_filters(&args).unwrap();
        // The duplicate field filter is merged away.
        assert_eq!(filters.len(), 3);

        let bad = FilterArgs {
            filters: Vec::new(),
            expression: Some("uid ==".into()),
            since_minutes: None,
            today: false,
        };
        assert!(build_filters(&bad).is_err());
    }

    #[test]
    fn default_grouping_is_the_first_option() {
        let statistic = pick_statistic("date", None).unwrap();
        assert_eq!(statistic.display_name(), None);
        let statistic = pick_statistic("date", Some("hour")).unwrap();
        assert_eq!(statistic.display_name().as_deref(), Some("hour"));
        assert!(pick_statistic("date", Some("fortnight")).is_err());
    }
}
