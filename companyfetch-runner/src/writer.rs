//! Per-symbol artifact files.
//!
//! Each artifact is rendered in memory, hashed with BLAKE3 and then written in
//! one `fs::write`. The hash ends up in the completion marker.

use companyfetch_core::data::{CalendarData, Metadata, NormalizedHistory};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const INFO_FILE: &str = "info.json";
pub const CALENDAR_FILE: &str = "calendar.json";
pub const HISTORY_FILE: &str = "history.csv";
pub const DIVIDENDS_FILE: &str = "dividends.csv";
pub const SPLITS_FILE: &str = "stock_splits.csv";

/// Every artifact a symbol directory can hold, in write order.
pub const ARTIFACT_FILES: [&str; 5] = [
    INFO_FILE,
    CALENDAR_FILE,
    HISTORY_FILE,
    DIVIDENDS_FILE,
    SPLITS_FILE,
];

/// Written to `calendar.json` when the calendar fetch fails.
pub const CALENDAR_UNAVAILABLE: &str = "No calendar data available";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode JSON for {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode CSV for {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ArtifactError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A file written into a symbol directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub file: &'static str,
    pub blake3: String,
    pub bytes: usize,
}

/// Writes artifacts into one `{output_root}/{symbol}/` directory.
#[derive(Debug)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Create (or reuse) the symbol directory.
    pub fn create(output_root: &Path, symbol: &str) -> Result<Self, ArtifactError> {
        let dir = output_root.join(symbol);
        std::fs::create_dir_all(&dir).map_err(|e| ArtifactError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_info(&self, metadata: &Metadata) -> Result<Artifact, ArtifactError> {
        self.write_json(INFO_FILE, metadata)
    }

    pub fn write_calendar(&self, calendar: CalendarData) -> Result<Artifact, ArtifactError> {
        self.write_json(CALENDAR_FILE, &calendar.into_json())
    }

    /// `{"error": "No calendar data available"}`
    pub fn write_calendar_unavailable(&self) -> Result<Artifact, ArtifactError> {
        self.write_json(
            CALENDAR_FILE,
            &serde_json::json!({ "error": CALENDAR_UNAVAILABLE }),
        )
    }

    /// Write `history.csv`, `dividends.csv` and `stock_splits.csv`.
    ///
    /// Nothing is written for an empty history; the event files are written
    /// only when they have at least one row. Stops at the first failed write.
    pub fn write_history_artifacts(
        &self,
        normalized: &NormalizedHistory,
    ) -> Result<Vec<Artifact>, ArtifactError> {
        let mut written = Vec::new();
        if normalized.is_empty() {
            return Ok(written);
        }

        written.push(self.write_csv(HISTORY_FILE, &normalized.history)?);
        if !normalized.dividends.is_empty() {
            written.push(self.write_csv(DIVIDENDS_FILE, &normalized.dividends)?);
        }
        if !normalized.splits.is_empty() {
            written.push(self.write_csv(SPLITS_FILE, &normalized.splits)?);
        }
        Ok(written)
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        file: &'static str,
        value: &T,
    ) -> Result<Artifact, ArtifactError> {
        let path = self.dir.join(file);
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Json {
            path: path.clone(),
            source,
        })?;
        write_artifact(file, &path, bytes)
    }

    fn write_csv<T: Serialize>(
        &self,
        file: &'static str,
        rows: &[T],
    ) -> Result<Artifact, ArtifactError> {
        let path = self.dir.join(file);
        let csv_err = |source| ArtifactError::Csv {
            path: path.clone(),
            source,
        };

        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in rows {
            wtr.serialize(row).map_err(csv_err)?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| ArtifactError::io(&path, e.into_error()))?;
        write_artifact(file, &path, bytes)
    }
}

fn write_artifact(
    file: &'static str,
    path: &Path,
    bytes: Vec<u8>,
) -> Result<Artifact, ArtifactError> {
    let hash = blake3::hash(&bytes);
    std::fs::write(path, &bytes).map_err(|e| ArtifactError::io(path, e))?;
    tracing::debug!(file, bytes = bytes.len(), "wrote artifact");
    Ok(Artifact {
        file,
        blake3: hash.to_hex().to_string(),
        bytes: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use companyfetch_core::data::{DividendEvent, HistoryRow, SplitEvent};
    use serde_json::{json, Value};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn history_row(d: u32, close: f64) -> HistoryRow {
        HistoryRow {
            date: day(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        }
    }

    fn read(dir: &Path, file: &str) -> String {
        std::fs::read_to_string(dir.join(file)).unwrap()
    }

    #[test]
    fn create_makes_symbol_directory() {
        let root = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::create(root.path(), "ACME").unwrap();
        assert!(writer.dir().is_dir());
        assert_eq!(writer.dir(), root.path().join("ACME"));
        // Reusing an existing directory is fine.
        ArtifactWriter::create(root.path(), "ACME").unwrap();
    }

    #[test]
    fn info_is_pretty_json() {
        let root = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::create(root.path(), "ACME").unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("sector".into(), json!("Tech"));
        let artifact = writer.write_info(&metadata).unwrap();

        let text = read(writer.dir(), INFO_FILE);
        assert_eq!(text, "{\n  \"sector\": \"Tech\"\n}");
        assert_eq!(artifact.file, INFO_FILE);
        assert_eq!(artifact.bytes, text.len());
        assert_eq!(artifact.blake3, blake3::hash(text.as_bytes()).to_hex().to_string());
    }

    #[test]
    fn calendar_error_marker() {
        let root = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::create(root.path(), "ACME").unwrap();
        writer.write_calendar_unavailable().unwrap();

        let value: Value = serde_json::from_str(&read(writer.dir(), CALENDAR_FILE)).unwrap();
        assert_eq!(value, json!({"error": "No calendar data available"}));
    }

    #[test]
    fn tabular_calendar_is_written_as_mapping() {
        let root = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::create(root.path(), "ACME").unwrap();
        let calendar = CalendarData::Tabular {
            columns: vec!["Value".into()],
            index: vec!["Earnings Date".into()],
            rows: vec![vec![json!("2024-10-31")]],
        };
        writer.write_calendar(calendar).unwrap();

        let value: Value = serde_json::from_str(&read(writer.dir(), CALENDAR_FILE)).unwrap();
        assert_eq!(value, json!({"Value": {"Earnings Date": "2024-10-31"}}));
    }

    #[test]
    fn history_artifacts_have_expected_headers() {
        let root = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::create(root.path(), "ACME").unwrap();
        let normalized = NormalizedHistory {
            history: vec![history_row(2, 10.0), history_row(3, 10.3)],
            dividends: vec![DividendEvent {
                date: day(3),
                close: 10.3,
                amount: 0.05,
            }],
            splits: vec![SplitEvent {
                date: day(3),
                close: 10.3,
                ratio: 2.0,
            }],
        };

        let written = writer.write_history_artifacts(&normalized).unwrap();
        let files: Vec<&str> = written.iter().map(|a| a.file).collect();
        assert_eq!(files, vec![HISTORY_FILE, DIVIDENDS_FILE, SPLITS_FILE]);

        assert_eq!(
            read(writer.dir(), HISTORY_FILE),
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-02,10.0,10.0,10.0,10.0,1000\n\
             2024-01-03,10.3,10.3,10.3,10.3,1000\n"
        );
        assert_eq!(
            read(writer.dir(), DIVIDENDS_FILE),
            "Date,Close,Dividends\n2024-01-03,10.3,0.05\n"
        );
        assert_eq!(
            read(writer.dir(), SPLITS_FILE),
            "Date,Close,Stock Splits\n2024-01-03,10.3,2.0\n"
        );
    }

    #[test]
    fn event_files_are_skipped_when_empty() {
        let root = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::create(root.path(), "ACME").unwrap();
        let normalized = NormalizedHistory {
            history: vec![history_row(2, 10.0)],
            ..Default::default()
        };

        let written = writer.write_history_artifacts(&normalized).unwrap();
        assert_eq!(written.len(), 1);
        assert!(!writer.dir().join(DIVIDENDS_FILE).exists());
        assert!(!writer.dir().join(SPLITS_FILE).exists());
    }

    #[test]
    fn empty_history_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::create(root.path(), "ACME").unwrap();
        let written = writer
            .write_history_artifacts(&NormalizedHistory::default())
            .unwrap();
        assert!(written.is_empty());
        assert!(!writer.dir().join(HISTORY_FILE).exists());
    }
}
