//! Reading events, filtering them and grouping them into report counts.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::rc::Rc;

use audit_viewer::events::{BufferEventSource, EventSource, FileWithRotatedEventSource};
use audit_viewer::filters::{add_filters, CompareOp, Filter};
use audit_viewer::stats::{self, count_ranges, RangeKey};

const CURRENT_LOG: &str = "\
type=USER_LOGIN msg=audit(1285700000.000:30): uid=0 acct=\"root\" res=success
type=USER_LOGIN msg=audit(1285700060.000:31): uid=500 acct=\"jdoe\" res=failed
";

const ROTATED_LOG: &str = "\
type=USER_LOGIN msg=audit(1285600000.000:10): uid=500 acct=\"jdoe\" res=success
type=USER_LOGIN msg=audit(1285600060.000:11): uid=500 acct=\"jdoe\" res=success
";

fn wanted(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn rotated_files_feed_one_report() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("audit.log"), CURRENT_LOG).unwrap();
    fs::write(dir.path().join("audit.log.1"), ROTATED_LOG).unwrap();

    let source = FileWithRotatedEventSource::new(dir.path().join("audit.log"));
    let events = source.read_events(&[], &wanted(&["acct"]), false, false).unwrap();
    assert_eq!(events.len(), 4);

    let mut statistic = stats::options("acct").remove(0);
    statistic.clear();
    let counts = count_ranges(statistic.as_mut(), &events);
    let by_label: HashMap<String, u64> = counts
        .iter()
        .map(|(key, count)| (key.0.label(), *count))
        .collect();
    assert_eq!(by_label["jdoe"], 3);
    assert_eq!(by_label["root"], 1);

    let labels: Vec<String> = statistic
        .ordered_ranges()
        .iter()
        .map(|r| r.label())
        .collect();
    assert_eq!(labels, vec!["jdoe", "root"]);
}

#[test]
fn merged_timestamp_filters_narrow_the_read() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("audit.log"), CURRENT_LOG).unwrap();
    fs::write(dir.path().join("audit.log.1"), ROTATED_LOG).unwrap();

    // The looser lower bound must lose to the tighter one during merge.
    let mut filters = vec![Filter::Timestamp {
        op: CompareOp::Ge,
        sec: 1285700000,
        ms: 0,
    }];
    add_filters(
        &mut filters,
        vec![Filter::Timestamp {
            op: CompareOp::Ge,
            sec: 1285600000,
            ms: 0,
        }],
    );
    assert_eq!(filters.len(), 1);

    let source = FileWithRotatedEventSource::new(dir.path().join("audit.log"));
    let mut events = source
        .read_events(&filters, &wanted(&["acct"]), false, false)
        .unwrap();
    events.sort_by_key(|e| e.id);
    let serials: Vec<u64> = events.iter().map(|e| e.id.serial).collect();
    assert_eq!(serials, vec![30, 31]);
}

#[test]
fn bucket_drill_down_selects_exactly_the_bucket() {
    let data = format!("{CURRENT_LOG}{ROTATED_LOG}");
    let source = BufferEventSource::new(data.clone().into_bytes());
    let events = source.read_events(&[], &wanted(&["acct"]), false, false).unwrap();

    let mut statistic = stats::options("acct").remove(0);
    statistic.clear();
    let counts = count_ranges(statistic.as_mut(), &events);
    let jdoe = statistic
        .ordered_ranges()
        .into_iter()
        .find(|r| r.label() == "jdoe")
        .unwrap();
    let bucket_count = counts[&RangeKey(Rc::clone(&jdoe))];

    // Re-reading with the bucket's reconstructed filters returns exactly
    // the events counted in the bucket.
    let filters = jdoe.to_filters().expect("value buckets drill down");
    let reread = BufferEventSource::new(data.into_bytes());
    let selected = reread
        .read_events(&filters, &wanted(&["acct"]), false, false)
        .unwrap();
    assert_eq!(selected.len() as u64, bucket_count);
    assert!(selected.iter().all(|e| e.first_field("acct") == Some("jdoe")));
}

#[test]
fn date_report_spans_bucket_boundaries() {
    let data = format!("{CURRENT_LOG}{ROTATED_LOG}");
    let source = BufferEventSource::new(data.into_bytes());
    let events = source.read_events(&[], &HashSet::new(), false, false).unwrap();

    // Minute grouping: 1285700000 and 1285700060 are different minutes.
    let mut statistic = stats::load_statistic(&serde_json::json!({
        "type": "time_grouping", "interval": 60,
    }))
    .unwrap();
    statistic.clear();
    let counts = count_ranges(statistic.as_mut(), &events);
    assert_eq!(counts.len(), 4);
    let ranges = statistic.ordered_ranges();
    assert_eq!(ranges.len(), 4);
    for range in &ranges {
        assert_eq!(counts[&RangeKey(Rc::clone(range))], 1);
    }

    // Hour grouping folds each log's two events together.
    let mut statistic = stats::load_statistic(&serde_json::json!({
        "type": "time_grouping", "interval": 3600,
    }))
    .unwrap();
    statistic.clear();
    let counts = count_ranges(statistic.as_mut(), &events);
    assert_eq!(counts.len(), 2);
    assert!(counts.values().all(|&c| c == 2));
}
