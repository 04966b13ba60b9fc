//! Labeled sample tables: loading, saving and header repair.
//!
//! A table has the layout `[User, <feature columns>, target]`. Rows keep the
//! exact text of every field so a curated table writes back byte-for-byte
//! what was read.

use crate::core::label::Label;
use crate::core::schema::{FeatureSchema, LABEL_COLUMN, USER_COLUMN};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Errors while reading or writing a labeled table.
#[derive(Debug)]
pub enum DatasetError {
    IoError(String),
    CsvError(String),
    /// Input has no header or no data rows
    Empty,
    /// A required column is missing from the header
    MissingColumn(String),
    /// A feature value is not a finite number (1-based data row)
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    /// A label is neither Genuine nor Imposter (1-based data row)
    InvalidLabel { row: usize, value: String },
    /// A row does not fit the table's header
    WidthMismatch { expected: usize, actual: usize },
    /// Feature columns are present but not in schema order (0-based feature index)
    ColumnOrder {
        position: usize,
        expected: String,
        found: String,
    },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::IoError(e) => write!(f, "IO error: {e}"),
            DatasetError::CsvError(e) => write!(f, "CSV error: {e}"),
            DatasetError::Empty => write!(f, "Table has no data rows"),
            DatasetError::MissingColumn(c) => write!(f, "Missing required column '{c}'"),
            DatasetError::InvalidValue { row, column, value } => {
                write!(f, "Row {row}: '{value}' in column '{column}' is not a finite number")
            }
            DatasetError::InvalidLabel { row, value } => {
                write!(f, "Row {row}: unknown label '{value}'")
            }
            DatasetError::WidthMismatch { expected, actual } => {
                write!(f, "Row has {actual} fields, expected {expected}")
            }
            DatasetError::ColumnOrder {
                position,
                expected,
                found,
            } => write!(
                f,
                "Feature column {position} is '{found}', expected '{expected}'"
            ),
        }
    }
}

impl std::error::Error for DatasetError {}

impl From<csv::Error> for DatasetError {
    fn from(e: csv::Error) -> Self {
        DatasetError::CsvError(e.to_string())
    }
}

impl From<std::io::Error> for DatasetError {
    fn from(e: std::io::Error) -> Self {
        DatasetError::IoError(e.to_string())
    }
}

/// One labeled sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    fields: Vec<String>,
    features: Vec<f64>,
    label: Label,
}

impl LabeledRow {
    pub fn new(user: &str, features: Vec<f64>, label: Label) -> Self {
        let fields = std::iter::once(user.to_string())
            .chain(features.iter().map(|v| v.to_string()))
            .chain(std::iter::once(label.to_string()))
            .collect();
        Self {
            fields,
            features,
            label,
        }
    }

    pub fn user(&self) -> &str {
        &self.fields[0]
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn label(&self) -> Label {
        self.label
    }

    /// The row's fields as they were read.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Counts from loading a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_loaded: usize,
    /// Rows whose field count did not match the header
    pub rows_skipped: usize,
}

/// A table of labeled samples.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTable {
    header: Vec<String>,
    rows: Vec<LabeledRow>,
}

impl LabeledTable {
    /// An empty table with the given feature columns.
    pub fn new(schema: &FeatureSchema) -> Self {
        Self {
            header: schema.header(),
            rows: Vec::new(),
        }
    }

    /// Read a table from a CSV file.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<(Self, LoadStats), DatasetError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DatasetError::IoError(format!("{}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    /// Read a table from CSV text.
    ///
    /// Rows with the wrong number of fields are skipped with a warning.
    /// Non-numeric features and unknown labels are errors.
    pub fn from_reader<R: Read>(reader: R) -> Result<(Self, LoadStats), DatasetError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let header: Vec<String> = rdr.headers()?.iter().map(|s| s.trim().to_string()).collect();
        validate_header(&header)?;

        let mut table = Self {
            header,
            rows: Vec::new(),
        };
        let mut stats = LoadStats::default();
        let width = table.header.len();

        for (idx, result) in rdr.records().enumerate() {
            let row_number = idx + 1;
            let record = result?;

            if record.len() != width {
                tracing::warn!(
                    row = row_number,
                    fields = record.len(),
                    expected = width,
                    "skipping malformed row"
                );
                stats.rows_skipped += 1;
                continue;
            }

            let fields: Vec<String> = record.iter().map(str::to_string).collect();
            let row = table.parse_row(row_number, fields)?;
            table.rows.push(row);
            stats.rows_loaded += 1;
        }

        if table.rows.is_empty() {
            return Err(DatasetError::Empty);
        }

        tracing::debug!(
            loaded = stats.rows_loaded,
            skipped = stats.rows_skipped,
            "table loaded"
        );
        Ok((table, stats))
    }

    fn parse_row(&self, row: usize, fields: Vec<String>) -> Result<LabeledRow, DatasetError> {
        let last = fields.len() - 1;

        let features = fields[1..last]
            .iter()
            .zip(&self.header[1..last])
            .map(|(value, column)| {
                value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| DatasetError::InvalidValue {
                        row,
                        column: column.clone(),
                        value: value.clone(),
                    })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let label = fields[last]
            .parse::<Label>()
            .map_err(|_| DatasetError::InvalidLabel {
                row,
                value: fields[last].clone(),
            })?;

        Ok(LabeledRow {
            fields,
            features,
            label,
        })
    }

    /// Write the table as CSV to a file, replacing it.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        self.to_writer(file)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), DatasetError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.header)?;
        for row in &self.rows {
            wtr.write_record(&row.fields)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Append a row. Its width must match the header.
    pub fn push(&mut self, row: LabeledRow) -> Result<(), DatasetError> {
        if row.fields.len() != self.header.len() {
            return Err(DatasetError::WidthMismatch {
                expected: self.header.len(),
                actual: row.fields.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// A new table holding the rows at `indices`, in the order given.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            header: self.header.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.header[1..self.header.len() - 1]
    }

    pub fn feature_count(&self) -> usize {
        self.header.len() - 2
    }

    pub fn rows(&self) -> &[LabeledRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// (Genuine, Imposter) row counts.
    pub fn label_counts(&self) -> (usize, usize) {
        let genuine = self.rows.iter().filter(|r| r.label.is_positive()).count();
        (genuine, self.rows.len() - genuine)
    }

    /// Check that the feature columns are exactly the schema's, in order.
    ///
    /// A schema column absent from the table is `MissingColumn`; a table
    /// that has every column but in another order, or extra columns, is
    /// `ColumnOrder` at the first differing position.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<(), DatasetError> {
        let found = self.feature_columns();
        let expected = schema.feature_columns();
        if found == expected {
            return Ok(());
        }

        if let Some(missing) = expected.iter().find(|c| !found.contains(c)) {
            return Err(DatasetError::MissingColumn(missing.clone()));
        }

        let position = expected
            .iter()
            .zip(found)
            .position(|(want, got)| want != got)
            .unwrap_or(expected.len());
        Err(DatasetError::ColumnOrder {
            position,
            expected: expected.get(position).cloned().unwrap_or_default(),
            found: found.get(position).cloned().unwrap_or_default(),
        })
    }
}

fn validate_header(header: &[String]) -> Result<(), DatasetError> {
    if header.is_empty() || header.iter().all(|h| h.is_empty()) {
        return Err(DatasetError::Empty);
    }
    if !header[0].eq_ignore_ascii_case(USER_COLUMN) {
        return Err(DatasetError::MissingColumn(USER_COLUMN.to_string()));
    }
    if header.len() < 2 || !header[header.len() - 1].eq_ignore_ascii_case(LABEL_COLUMN) {
        return Err(DatasetError::MissingColumn(LABEL_COLUMN.to_string()));
    }
    Ok(())
}

/// Result of a header repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairOutcome {
    pub header_rewritten: bool,
    pub rows: usize,
    /// Data rows whose width differs from the canonical header
    pub rows_with_other_width: usize,
}

/// Rewrite a sample file so its header is the canonical one for `schema`.
///
/// Older files carry extra trailing feature columns for keys that are never
/// captured (e.g. `DD.l.Return, UD.l.Return, H.Return`). When the existing
/// header starts with the schema's user and feature columns, it is replaced
/// with the canonical header. Data rows are copied unchanged.
pub fn repair_header(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    schema: &FeatureSchema,
) -> Result<RepairOutcome, DatasetError> {
    let file = File::open(input.as_ref())?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file);

    let mut records = rdr.records();
    let header: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(|s| s.trim().to_string()).collect(),
        None => return Err(DatasetError::Empty),
    };

    let canonical = schema.header();
    if header != canonical && !schema.is_prefix_of(&header) {
        return Err(DatasetError::MissingColumn(
            schema
                .feature_columns()
                .iter()
                .zip(header.iter().skip(1))
                .find(|(want, got)| want != got)
                .map(|(want, _)| want.clone())
                .unwrap_or_else(|| USER_COLUMN.to_string()),
        ));
    }
    let header_rewritten = header != canonical;

    let mut wtr = csv::Writer::from_path(output.as_ref())?;
    wtr.write_record(&canonical)?;

    let mut outcome = RepairOutcome {
        header_rewritten,
        rows: 0,
        rows_with_other_width: 0,
    };
    for record in records {
        let record = record?;
        if record.len() != canonical.len() {
            outcome.rows_with_other_width += 1;
        }
        wtr.write_record(&record)?;
        outcome.rows += 1;
    }
    wtr.flush()?;

    if header_rewritten {
        tracing::info!(
            previous_columns = header.len(),
            canonical_columns = canonical.len(),
            "header rewritten to canonical schema"
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CSV: &str = "User,H.a,DD.a.b,UD.a.b,H.b,target\n\
                       alice,0.080,0.200,0.120,0.070,Genuine\n\
                       mallory,0.1,0.3,0.2,0.09,Imposter\n";

    #[test]
    fn test_read_table() {
        let (table, stats) = LabeledTable::from_reader(Cursor::new(CSV)).unwrap();
        assert_eq!(stats.rows_loaded, 2);
        assert_eq!(stats.rows_skipped, 0);
        assert_eq!(table.feature_count(), 4);
        assert_eq!(table.feature_columns()[0], "H.a");
        assert_eq!(table.rows()[0].user(), "alice");
        assert_eq!(table.rows()[0].features(), &[0.08, 0.2, 0.12, 0.07]);
        assert_eq!(table.rows()[1].label(), Label::Imposter);
        assert_eq!(table.label_counts(), (1, 1));
    }

    #[test]
    fn test_write_preserves_field_text() {
        let (table, _) = LabeledTable::from_reader(Cursor::new(CSV)).unwrap();
        let mut out = Vec::new();
        table.to_writer(&mut out).unwrap();
        let written = String::from_utf8(out).unwrap().replace("\r\n", "\n");
        assert_eq!(written, CSV);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let csv = format!("{CSV}bob,0.1,0.2,Genuine\n");
        let (table, stats) = LabeledTable::from_reader(Cursor::new(csv)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(stats.rows_skipped, 1);
    }

    #[test]
    fn test_missing_columns() {
        let err = LabeledTable::from_reader(Cursor::new("Name,H.a,target\nx,1,Genuine\n"))
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(ref c) if c == "User"));

        let err =
            LabeledTable::from_reader(Cursor::new("User,H.a,H.b\nx,1,2\n")).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(ref c) if c == "target"));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            LabeledTable::from_reader(Cursor::new("")),
            Err(DatasetError::Empty)
        ));
        assert!(matches!(
            LabeledTable::from_reader(Cursor::new("User,H.a,target\n")),
            Err(DatasetError::Empty)
        ));
    }

    #[test]
    fn test_invalid_values() {
        let err = LabeledTable::from_reader(Cursor::new("User,H.a,target\nx,fast,Genuine\n"))
            .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { row: 1, .. }));

        let err = LabeledTable::from_reader(Cursor::new("User,H.a,target\nx,0.1,Owner\n"))
            .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidLabel { row: 1, .. }));

        let err = LabeledTable::from_reader(Cursor::new(
            "User,H.a,target\nx,0.1,Genuine\ny,0.2,genuine\n",
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            DatasetError::InvalidLabel { row: 2, ref value } if value == "genuine"
        ));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        for value in ["NaN", "nan", "inf", "-inf", "infinity"] {
            let csv = format!(
                "User,H.a,H.b,target\nx,0.1,0.2,Genuine\ny,0.3,{value},Imposter\n"
            );
            let err = LabeledTable::from_reader(Cursor::new(csv)).unwrap_err();
            assert!(
                matches!(err, DatasetError::InvalidValue { row: 2, ref column, .. } if column == "H.b"),
                "{value} was accepted"
            );
        }
    }

    #[test]
    fn test_schema_check() {
        let schema = FeatureSchema::for_password("ab");
        let (table, _) = LabeledTable::from_reader(Cursor::new(CSV)).unwrap();
        assert!(table.check_schema(&schema).is_ok());

        let reordered = "User,DD.a.b,H.a,UD.a.b,H.b,target\nalice,0.2,0.08,0.12,0.07,Genuine\n";
        let (table, _) = LabeledTable::from_reader(Cursor::new(reordered)).unwrap();
        match table.check_schema(&schema).unwrap_err() {
            DatasetError::ColumnOrder {
                position,
                expected,
                found,
            } => {
                assert_eq!(position, 0);
                assert_eq!(expected, "H.a");
                assert_eq!(found, "DD.a.b");
            }
            other => panic!("unexpected error: {other}"),
        }

        let foreign = "User,H.x,DD.x.y,UD.x.y,H.y,target\nalice,0.1,0.2,0.1,0.1,Genuine\n";
        let (table, _) = LabeledTable::from_reader(Cursor::new(foreign)).unwrap();
        assert!(matches!(
            table.check_schema(&schema),
            Err(DatasetError::MissingColumn(ref c)) if c == "H.a"
        ));

        let (table, _) = LabeledTable::from_reader(Cursor::new(CSV)).unwrap();
        assert!(matches!(
            table.check_schema(&FeatureSchema::for_password("abc")),
            Err(DatasetError::MissingColumn(ref c)) if c == "DD.b.c"
        ));
    }

    #[test]
    fn test_push_checks_width() {
        let mut table = LabeledTable::new(&FeatureSchema::for_password("ab"));
        assert!(table
            .push(LabeledRow::new("u", vec![0.1, 0.2, 0.1, 0.1], Label::Genuine))
            .is_ok());
        assert!(matches!(
            table.push(LabeledRow::new("u", vec![0.1], Label::Genuine)),
            Err(DatasetError::WidthMismatch {
                expected: 6,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_repair_legacy_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("legacy.csv");
        let output = dir.path().join("repaired.csv");
        std::fs::write(
            &input,
            "User,H.a,DD.a.b,UD.a.b,H.b,DD.b.Return,UD.b.Return,H.Return,target\n\
             alice,0.08,0.2,0.12,0.07,Genuine\n",
        )
        .unwrap();

        let schema = FeatureSchema::for_password("ab");
        let outcome = repair_header(&input, &output, &schema).unwrap();
        assert!(outcome.header_rewritten);
        assert_eq!(outcome.rows, 1);
        assert_eq!(outcome.rows_with_other_width, 0);

        let (table, _) = LabeledTable::read_csv(&output).unwrap();
        assert_eq!(table.header(), schema.header().as_slice());
        assert_eq!(table.rows()[0].user(), "alice");
    }

    #[test]
    fn test_repair_rejects_foreign_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("other.csv");
        std::fs::write(&input, "User,H.x,target\nu,0.1,Genuine\n").unwrap();

        let err = repair_header(
            &input,
            dir.path().join("out.csv"),
            &FeatureSchema::for_password("ab"),
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(_)));
    }

    #[test]
    fn test_select_keeps_given_rows() {
        let (table, _) = LabeledTable::from_reader(Cursor::new(CSV)).unwrap();
        let picked = table.select(&[1]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked.rows()[0].user(), "mallory");
        assert_eq!(picked.header(), table.header());
    }
}
