//! Append-only CSV sinks for committed samples.
//!
//! Two files are written per study: one with millisecond-derived timings in
//! seconds and one with raw nanosecond timings. Both use the same header,
//! written once when the file is created.

use crate::core::capture::Sample;
use crate::core::features::FeatureVector;
use crate::core::label::Label;
use crate::core::schema::FeatureSchema;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Errors while appending samples.
#[derive(Debug)]
pub enum ExportError {
    IoError(String),
    CsvError(String),
    /// The feature vector does not fit the schema
    LengthMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::IoError(e) => write!(f, "IO error: {e}"),
            ExportError::CsvError(e) => write!(f, "CSV error: {e}"),
            ExportError::LengthMismatch { expected, actual } => write!(
                f,
                "Sample has {actual} features but the schema has {expected} columns"
            ),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::CsvError(e.to_string())
    }
}

/// One CSV file that rows are appended to.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
    header: Vec<String>,
    feature_count: usize,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, schema: &FeatureSchema) -> Self {
        Self {
            path: path.into(),
            header: schema.header(),
            feature_count: schema.feature_count(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `[user, features..., label]`, writing the header first if the
    /// file does not exist yet.
    pub fn append<T: Display>(
        &self,
        user: &str,
        features: &FeatureVector<T>,
        label: Label,
    ) -> Result<(), ExportError> {
        if features.len() != self.feature_count {
            return Err(ExportError::LengthMismatch {
                expected: self.feature_count,
                actual: features.len(),
            });
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ExportError::IoError(e.to_string()))?;
            }
        }

        let fresh = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ExportError::IoError(format!("{}: {e}", self.path.display())))?;

        let mut wtr = csv::Writer::from_writer(file);
        if fresh {
            wtr.write_record(&self.header)?;
        }

        let row = std::iter::once(user.to_string())
            .chain(features.iter().map(|v| v.to_string()))
            .chain(std::iter::once(label.to_string()));
        wtr.write_record(row)?;
        wtr.flush()
            .map_err(|e| ExportError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// The millisecond and nanosecond sinks of one study.
#[derive(Debug, Clone)]
pub struct SampleExporter {
    ms: CsvSink,
    ns: CsvSink,
}

impl SampleExporter {
    pub fn new(
        ms_path: impl Into<PathBuf>,
        ns_path: impl Into<PathBuf>,
        schema: &FeatureSchema,
    ) -> Self {
        Self {
            ms: CsvSink::new(ms_path, schema),
            ns: CsvSink::new(ns_path, schema),
        }
    }

    /// Append a sample to both files.
    pub fn export(&self, user: &str, label: Label, sample: &Sample) -> Result<(), ExportError> {
        self.ms.append(user, &sample.ms, label)?;
        tracing::debug!(path = %self.ms.path().display(), "appended millisecond row");
        self.ns.append(user, &sample.ns, label)?;
        tracing::debug!(path = %self.ns.path().display(), "appended nanosecond row");
        Ok(())
    }

    pub fn ms_path(&self) -> &Path {
        self.ms.path()
    }

    pub fn ns_path(&self) -> &Path {
        self.ns.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{EventStore, Timestamp};
    use crate::core::features::{extract_ms, extract_ns};

    fn two_key_sample() -> Sample {
        let mut store = EventStore::new();
        for (press, release) in [(100, 150), (200, 260)] {
            let idx = store.push_press(Timestamp::from_millis(press));
            store
                .get_mut(idx)
                .unwrap()
                .set_release(Timestamp::from_millis(release));
        }
        Sample {
            ms: extract_ms(&store).unwrap(),
            ns: extract_ns(&store).unwrap(),
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let schema = FeatureSchema::for_password("ab");
        let exporter = SampleExporter::new(
            dir.path().join("ms.csv"),
            dir.path().join("ns.csv"),
            &schema,
        );

        let sample = two_key_sample();
        exporter.export("alice", Label::Genuine, &sample).unwrap();
        exporter.export("alice", Label::Imposter, &sample).unwrap();

        let ms = std::fs::read_to_string(dir.path().join("ms.csv")).unwrap();
        let lines: Vec<&str> = ms.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "User,H.a,DD.a.b,UD.a.b,H.b,target");
        assert_eq!(lines[1], "alice,0.05,0.1,0.05,0.06,Genuine");
        assert_eq!(lines[2], "alice,0.05,0.1,0.05,0.06,Imposter");

        let ns = std::fs::read_to_string(dir.path().join("ns.csv")).unwrap();
        assert_eq!(
            ns.lines().nth(1),
            Some("alice,50000000,100000000,50000000,60000000,Genuine")
        );
    }

    #[test]
    fn test_schema_length_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let schema = FeatureSchema::for_password("abc");
        let sink = CsvSink::new(dir.path().join("ms.csv"), &schema);

        let err = sink
            .append("alice", &two_key_sample().ms, Label::Genuine)
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::LengthMismatch {
                expected: 7,
                actual: 4
            }
        ));
        assert!(!sink.path().exists());
    }
}
