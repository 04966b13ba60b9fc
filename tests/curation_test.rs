//! Integration tests for curation over sample files on disk.

use keystroke_sampler::core::{curate, CurationConfig, CurationError, FeatureSchema, Label};
use keystroke_sampler::dataset::{repair_header, DatasetError, LabeledRow, LabeledTable};
use std::path::Path;

/// Two well separated typing styles plus one genuine-looking row labeled as
/// an imposter.
fn corpus(schema: &FeatureSchema) -> LabeledTable {
    let n = schema.feature_count();
    let mut table = LabeledTable::new(schema);

    for i in 0..20 {
        let jitter = (i % 5) as f64 * 0.004;
        let genuine: Vec<f64> = (0..n).map(|j| 0.10 + jitter + (j % 3) as f64 * 0.01).collect();
        let imposter: Vec<f64> = (0..n).map(|j| 0.25 + jitter + (j % 4) as f64 * 0.01).collect();
        table
            .push(LabeledRow::new(&format!("g{i:02}"), genuine, Label::Genuine))
            .unwrap();
        table
            .push(LabeledRow::new(&format!("i{i:02}"), imposter, Label::Imposter))
            .unwrap();
    }

    let outlier: Vec<f64> = (0..n).map(|j| 0.108 + (j % 3) as f64 * 0.01).collect();
    table
        .push(LabeledRow::new("mislabeled", outlier, Label::Imposter))
        .unwrap();
    table
}

fn write(path: &Path, text: &str) {
    std::fs::write(path, text).unwrap();
}

#[test]
fn test_curate_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Keystrokes.csv");
    let output = dir.path().join("subset.csv");

    let schema = FeatureSchema::for_password(".tie5Roanl");
    corpus(&schema).write_csv(&input).unwrap();
    let before = std::fs::read_to_string(&input).unwrap();

    let (table, _) = LabeledTable::read_csv(&input).unwrap();
    table.check_schema(&schema).unwrap();
    let report = curate(&table, &CurationConfig::default()).unwrap();
    report.curated.write_csv(&output).unwrap();

    // Source file untouched
    assert_eq!(std::fs::read_to_string(&input).unwrap(), before);

    let (curated, _) = LabeledTable::read_csv(&output).unwrap();
    assert_eq!(curated.header(), table.header());
    assert!(curated.rows().iter().all(|r| r.user() != "mislabeled"));
    assert!(curated.len() < table.len());

    // Retained rows are unmodified input rows, still in input order
    let mut cursor = table.rows().iter();
    for row in curated.rows() {
        assert!(cursor.any(|original| original.fields() == row.fields()));
    }

    let (genuine, imposter) = curated.label_counts();
    assert!(genuine > 0 && imposter > 0);
    assert!(report.summary().contains("Original dataset size: 41 rows"));
}

#[test]
fn test_reordered_columns_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Keystrokes.csv");

    let schema = FeatureSchema::for_password(".tie5Roanl");
    corpus(&schema).write_csv(&input).unwrap();
    let text = std::fs::read_to_string(&input).unwrap();

    // Swap the first two feature columns in the header only
    let (header, body) = text.split_once('\n').unwrap();
    let mut columns: Vec<&str> = header.trim_end_matches('\r').split(',').collect();
    columns.swap(1, 2);
    write(&input, &format!("{}\n{body}", columns.join(",")));

    let (table, _) = LabeledTable::read_csv(&input).unwrap();
    match table.check_schema(&schema).unwrap_err() {
        DatasetError::ColumnOrder {
            position,
            expected,
            found,
        } => {
            assert_eq!(position, 0);
            assert_eq!(expected, "H.period");
            assert_eq!(found, "DD.period.t");
        }
        other => panic!("unexpected error: {other}"),
    }

    // A file captured for another password is missing columns outright
    assert!(matches!(
        table.check_schema(&FeatureSchema::for_password("abc")),
        Err(DatasetError::MissingColumn(ref c)) if c == "H.a"
    ));
}

#[test]
fn test_curate_skips_malformed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Keystrokes.csv");

    let mut text = String::from("User,H.a,DD.a.b,UD.a.b,H.b,target\n");
    for i in 0..10 {
        let d = i as f64 * 0.002;
        text.push_str(&format!("g{i},{},{},{},{},Genuine\n", 0.08 + d, 0.2 + d, 0.12 + d, 0.07 + d));
        text.push_str(&format!("i{i},{},{},{},{},Imposter\n", 0.2 + d, 0.4 + d, 0.25 + d, 0.18 + d));
    }
    text.push_str("broken,0.1,0.2,Genuine\n");
    write(&input, &text);

    let (table, stats) = LabeledTable::read_csv(&input).unwrap();
    assert_eq!(stats.rows_loaded, 20);
    assert_eq!(stats.rows_skipped, 1);

    let report = curate(&table, &CurationConfig::default()).unwrap();
    assert_eq!(report.original_rows, 20);
    assert_eq!(report.retained_rows(), 20);
}

#[test]
fn test_curate_input_errors() {
    let dir = tempfile::tempdir().unwrap();

    let not_a_number = dir.path().join("nan.csv");
    write(
        &not_a_number,
        "User,H.a,DD.a.b,UD.a.b,H.b,target\n\
         alice,0.1,0.2,0.1,0.1,Genuine\n\
         bob,0.1,NaN,0.1,0.1,Imposter\n\
         carol,0.3,0.4,0.2,0.2,Imposter\n\
         dave,0.11,0.21,0.1,0.1,Genuine\n",
    );
    assert!(matches!(
        LabeledTable::read_csv(&not_a_number),
        Err(DatasetError::InvalidValue { row: 2, ref value, .. }) if value == "NaN"
    ));

    let missing_label = dir.path().join("no_label.csv");
    write(&missing_label, "User,H.a,DD.a.b,UD.a.b,H.b\nalice,0.1,0.2,0.1,0.1\n");
    assert!(matches!(
        LabeledTable::read_csv(&missing_label),
        Err(DatasetError::MissingColumn(ref c)) if c == "target"
    ));

    let header_only = dir.path().join("empty.csv");
    write(&header_only, "User,H.a,DD.a.b,UD.a.b,H.b,target\n");
    assert!(matches!(
        LabeledTable::read_csv(&header_only),
        Err(DatasetError::Empty)
    ));

    let one_class = dir.path().join("one_class.csv");
    write(
        &one_class,
        "User,H.a,DD.a.b,UD.a.b,H.b,target\n\
         alice,0.1,0.2,0.1,0.1,Genuine\n\
         alice,0.11,0.21,0.1,0.1,Genuine\n",
    );
    let (table, _) = LabeledTable::read_csv(&one_class).unwrap();
    assert_eq!(
        curate(&table, &CurationConfig::default()).unwrap_err(),
        CurationError::SingleClass(Label::Genuine)
    );
}

#[test]
fn test_legacy_header_repaired_before_curation() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = dir.path().join("legacy.csv");
    let repaired = dir.path().join("repaired.csv");

    let schema = FeatureSchema::for_password(".tie5Roanl");
    let mut header = schema.header();
    header.pop();
    header.extend(
        ["DD.l.Return", "UD.l.Return", "H.Return", "target"]
            .iter()
            .map(|s| s.to_string()),
    );

    let mut text = header.join(",");
    text.push('\n');
    for (user, base, label) in [("alice", 0.1, "Genuine"), ("mallory", 0.3, "Imposter")] {
        let features: Vec<String> = (0..28).map(|j| format!("{}", base + j as f64 * 0.001)).collect();
        text.push_str(&format!("{user},{},{label}\n", features.join(",")));
    }
    write(&legacy, &text);

    // Rows are narrower than the legacy header, so nothing loads as-is
    assert!(matches!(
        LabeledTable::read_csv(&legacy),
        Err(DatasetError::Empty)
    ));

    let outcome = repair_header(&legacy, &repaired, &schema).unwrap();
    assert!(outcome.header_rewritten);
    assert_eq!(outcome.rows, 2);
    assert_eq!(outcome.rows_with_other_width, 0);

    let (table, stats) = LabeledTable::read_csv(&repaired).unwrap();
    assert_eq!(stats.rows_loaded, 2);
    assert_eq!(table.header(), schema.header().as_slice());
    assert_eq!(table.label_counts(), (1, 1));
}
