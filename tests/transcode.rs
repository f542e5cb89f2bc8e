mod common;

use std::fs;

use common::{TestWorkspace, standard_match};
use cricket_pred::{
    enrich::InningPolicy,
    frame::{ColumnType, Value},
    io_utils::{list_table_names, read_table},
    transcode::{EntryStatus, TranscodeOptions, transcode, transcode_with_options},
};
use serde_json::json;

#[test]
fn archive_without_records_creates_empty_output_dir() {
    let workspace = TestWorkspace::new();
    let archive = workspace.zip(
        "all_json.zip",
        &[
            ("README.txt", "not a record".to_string()),
            ("notes.md", "# nothing".to_string()),
        ],
    );
    let output = workspace.path().join("tables");

    let report = transcode(&archive, &output).expect("transcode");

    assert!(output.is_dir());
    assert_eq!(report.qualifying(), 0);
    assert_eq!(report.processed(), 0);
    assert!(list_table_names(&output).unwrap().is_empty());
}

#[test]
fn malformed_entries_are_skipped_and_batch_continues() {
    let workspace = TestWorkspace::new();
    let archive = workspace.zip(
        "all_json.zip",
        &[
            ("211028.json", standard_match(json!(2017))),
            ("211048.json", "{ \"info\": ".to_string()),
            ("t20s/222678.json", standard_match(json!("2019/20"))),
        ],
    );
    let output = workspace.path().join("tables");

    let report = transcode(&archive, &output).expect("transcode");

    assert_eq!(report.qualifying(), 3);
    assert_eq!(report.processed(), 2);
    let skipped = report.skipped().collect::<Vec<_>>();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].match_id, "211048");
    assert!(matches!(&skipped[0].status, EntryStatus::Skipped { reason } if reason.contains("211048")));
    assert_eq!(
        list_table_names(&output).unwrap(),
        vec!["211028.csv", "222678.csv"]
    );
}

#[test]
fn written_tables_carry_derived_columns() {
    let workspace = TestWorkspace::new();
    let archive = workspace.zip("m.zip", &[("335982.json", standard_match(json!("2019/20")))]);
    let output = workspace.path().join("tables");

    transcode(&archive, &output).expect("transcode");
    let table = read_table(&output.join("335982.csv")).expect("load");

    assert_eq!(table.row_count(), 6);
    assert_eq!(table.column_count(), 28);
    let column = |name: &str| table.column(name).expect(name);
    assert_eq!(column("season").datatype, ColumnType::String);
    assert_eq!(column("over").datatype, ColumnType::Integer);
    let inning = (0..6)
        .map(|row| column("inning").get(row).and_then(Value::as_i64))
        .collect::<Vec<_>>();
    assert_eq!(inning, [1, 1, 1, 2, 2, 2].map(Some).to_vec());
    let cumulative = (0..6)
        .map(|row| column("runs_cumulative").get(row).and_then(Value::as_i64))
        .collect::<Vec<_>>();
    assert_eq!(cumulative, [1, 5, 5, 6, 6, 8].map(Some).to_vec());
    assert_eq!(column("wicket_type").get(4), Some(&Value::String("caught".into())));
    assert_eq!(column("fielders_id").get(4), Some(&Value::String("p004".into())));
}

#[test]
fn strict_policy_skips_matches_with_three_teams() {
    let workspace = TestWorkspace::new();
    let record = common::match_record(
        json!(2020),
        &[
            ("A", vec![vec![common::ball("Opener", "Quick", 1)]]),
            ("B", vec![vec![common::ball("Opener", "Quick", 1)]]),
            ("C", vec![vec![common::ball("Opener", "Quick", 1)]]),
        ],
    );
    let archive = workspace.zip("m.zip", &[("1.json", record)]);

    let lenient = workspace.path().join("lenient");
    let report = transcode(&archive, &lenient).expect("transcode");
    assert_eq!(report.processed(), 1);

    let strict = workspace.path().join("strict");
    let options = TranscodeOptions {
        inning_policy: InningPolicy::StrictTwoTeams,
    };
    let report = transcode_with_options(&archive, &strict, options).expect("transcode");
    assert_eq!(report.processed(), 0);
    assert_eq!(report.skipped().count(), 1);
    assert!(fs::read_dir(&strict).unwrap().next().is_none());
}

#[test]
fn unreadable_archive_is_an_error() {
    let workspace = TestWorkspace::new();
    let bogus = workspace.write("bogus.zip", "this is not a zip file");
    assert!(transcode(&bogus, &workspace.path().join("out")).is_err());
}

#[test]
fn output_dir_that_cannot_be_created_is_an_error() {
    let workspace = TestWorkspace::new();
    let archive = workspace.zip("m.zip", &[("1.json", standard_match(json!(2020)))]);
    let blocker = workspace.write("occupied", "a regular file");

    let result = transcode(&archive, &blocker.join("tables"));

    assert!(result.is_err());
}

#[test]
fn failed_writes_leave_no_partial_table() {
    let workspace = TestWorkspace::new();
    let archive = workspace.zip(
        "m.zip",
        &[
            ("211028.json", standard_match(json!(2017))),
            ("222678.json", standard_match(json!(2018))),
        ],
    );
    let output = workspace.path().join("tables");
    fs::create_dir_all(output.join("211028.csv")).unwrap();

    let report = transcode(&archive, &output).expect("transcode");

    assert_eq!(report.processed(), 1);
    assert_eq!(report.skipped().next().unwrap().match_id, "211028");
    assert_eq!(list_table_names(&output).unwrap(), vec!["222678.csv"]);
    let leftovers = fs::read_dir(&output)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".partial"))
        .count();
    assert_eq!(leftovers, 0);
}
