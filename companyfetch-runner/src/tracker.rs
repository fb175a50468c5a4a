//! Completion tracking across runs.
//!
//! The output root is listed once per run. Under [`CompletionPolicy::Marker`]
//! a symbol counts as done only when its directory holds `.complete.json`,
//! written after every artifact for that symbol was written. Under
//! [`CompletionPolicy::Directory`] the directory alone is enough, so a symbol
//! whose first attempt failed halfway is never retried.

use crate::writer::{Artifact, ArtifactError, ARTIFACT_FILES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const MARKER_FILE: &str = ".complete.json";

/// What makes a symbol directory count as complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionPolicy {
    /// Directory holds the completion marker.
    #[default]
    Marker,
    /// Directory exists.
    Directory,
}

impl fmt::Display for CompletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionPolicy::Marker => f.write_str("marker"),
            CompletionPolicy::Directory => f.write_str("directory"),
        }
    }
}

impl FromStr for CompletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "marker" => Ok(CompletionPolicy::Marker),
            "directory" => Ok(CompletionPolicy::Directory),
            other => Err(format!(
                "unknown completion policy '{other}'. Valid: marker, directory"
            )),
        }
    }
}

/// Contents of `.complete.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub symbol: String,
    pub completed_at: DateTime<Utc>,
    pub history_rows: usize,
    /// Artifact file name → BLAKE3 hex digest.
    pub artifacts: BTreeMap<String, String>,
}

/// Set of symbols already complete under the output root.
#[derive(Debug)]
pub struct CompletionTracker {
    root: PathBuf,
    policy: CompletionPolicy,
    complete: HashSet<String>,
}

impl CompletionTracker {
    /// List `output_root` once. A missing root scans as empty.
    pub fn scan(output_root: &Path, policy: CompletionPolicy) -> Result<Self, ArtifactError> {
        let mut complete = HashSet::new();

        let entries = match std::fs::read_dir(output_root) {
            Ok(entries) => Some(entries),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(ArtifactError::io(output_root, e)),
        };

        for entry in entries.into_iter().flatten() {
            let entry = entry.map_err(|e| ArtifactError::io(output_root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let counts = match policy {
                CompletionPolicy::Directory => true,
                CompletionPolicy::Marker => entry.path().join(MARKER_FILE).is_file(),
            };
            if counts {
                complete.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }

        tracing::debug!(
            root = %output_root.display(),
            %policy,
            complete = complete.len(),
            "scanned output root"
        );

        Ok(Self {
            root: output_root.to_path_buf(),
            policy,
            complete,
        })
    }

    pub fn is_complete(&self, symbol: &str) -> bool {
        self.complete.contains(symbol)
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of symbols complete at scan time.
    pub fn len(&self) -> usize {
        self.complete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.complete.is_empty()
    }
}

/// Write `.complete.json` into `dir`.
pub fn mark_complete(
    dir: &Path,
    symbol: &str,
    artifacts: &[Artifact],
    history_rows: usize,
) -> Result<CompletionMarker, ArtifactError> {
    let marker = CompletionMarker {
        symbol: symbol.to_string(),
        completed_at: Utc::now(),
        history_rows,
        artifacts: artifacts
            .iter()
            .map(|a| (a.file.to_string(), a.blake3.clone()))
            .collect(),
    };

    let path = dir.join(MARKER_FILE);
    let bytes = serde_json::to_vec_pretty(&marker).map_err(|source| ArtifactError::Json {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&path, bytes).map_err(|e| ArtifactError::io(&path, e))?;
    Ok(marker)
}

/// Read back a marker. `None` when absent or unreadable.
pub fn read_marker(dir: &Path) -> Option<CompletionMarker> {
    let content = std::fs::read_to_string(dir.join(MARKER_FILE)).ok()?;
    serde_json::from_str(&content).ok()
}

/// What one symbol directory currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryStatus {
    pub symbol: String,
    /// Artifact files present, in [`ARTIFACT_FILES`] order.
    pub artifacts: Vec<&'static str>,
    pub marker: Option<CompletionMarker>,
}

impl DirectoryStatus {
    pub fn is_complete(&self) -> bool {
        self.marker.is_some()
    }
}

/// Inspect every directory under `output_root`, sorted by symbol.
pub fn directory_status(output_root: &Path) -> Result<Vec<DirectoryStatus>, ArtifactError> {
    let entries = match std::fs::read_dir(output_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ArtifactError::io(output_root, e)),
    };

    let mut statuses = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ArtifactError::io(output_root, e))?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        statuses.push(DirectoryStatus {
            symbol: entry.file_name().to_string_lossy().into_owned(),
            artifacts: ARTIFACT_FILES
                .into_iter()
                .filter(|file| dir.join(file).is_file())
                .collect(),
            marker: read_marker(&dir),
        });
    }

    statuses.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{CALENDAR_FILE, INFO_FILE};

    fn make_dir(root: &Path, name: &str, with_marker: bool) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        if with_marker {
            mark_complete(&dir, name, &[], 0).unwrap();
        }
    }

    #[test]
    fn missing_root_scans_empty() {
        let root = tempfile::tempdir().unwrap();
        let tracker =
            CompletionTracker::scan(&root.path().join("nope"), CompletionPolicy::Marker).unwrap();
        assert!(tracker.is_empty());
        assert!(!tracker.is_complete("AAPL"));
    }

    #[test]
    fn directory_policy_counts_any_directory() {
        let root = tempfile::tempdir().unwrap();
        make_dir(root.path(), "AAPL", false);
        make_dir(root.path(), "MSFT", true);
        std::fs::write(root.path().join("GOOG"), b"not a dir").unwrap();

        let tracker = CompletionTracker::scan(root.path(), CompletionPolicy::Directory).unwrap();
        assert!(tracker.is_complete("AAPL"));
        assert!(tracker.is_complete("MSFT"));
        assert!(!tracker.is_complete("GOOG"));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn marker_policy_needs_marker() {
        let root = tempfile::tempdir().unwrap();
        make_dir(root.path(), "AAPL", false);
        make_dir(root.path(), "MSFT", true);

        let tracker = CompletionTracker::scan(root.path(), CompletionPolicy::Marker).unwrap();
        assert!(!tracker.is_complete("AAPL"));
        assert!(tracker.is_complete("MSFT"));
    }

    #[test]
    fn marker_records_artifact_hashes() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("ACME");
        std::fs::create_dir_all(&dir).unwrap();

        let artifacts = vec![Artifact {
            file: INFO_FILE,
            blake3: "abc123".into(),
            bytes: 3,
        }];
        let written = mark_complete(&dir, "ACME", &artifacts, 2).unwrap();

        let read = read_marker(&dir).unwrap();
        assert_eq!(read, written);
        assert_eq!(read.history_rows, 2);
        assert_eq!(read.artifacts.get(INFO_FILE).map(String::as_str), Some("abc123"));
    }

    #[test]
    fn status_lists_present_artifacts() {
        let root = tempfile::tempdir().unwrap();
        make_dir(root.path(), "MSFT", true);
        make_dir(root.path(), "AAPL", false);
        std::fs::write(root.path().join("AAPL").join(INFO_FILE), "{}").unwrap();
        std::fs::write(root.path().join("AAPL").join(CALENDAR_FILE), "{}").unwrap();

        let statuses = directory_status(root.path()).unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].symbol, "AAPL");
        assert_eq!(statuses[0].artifacts, vec![INFO_FILE, CALENDAR_FILE]);
        assert!(!statuses[0].is_complete());
        assert!(statuses[1].is_complete());
        assert!(statuses[1].artifacts.is_empty());
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Marker".parse::<CompletionPolicy>(), Ok(CompletionPolicy::Marker));
        assert_eq!(
            "directory".parse::<CompletionPolicy>(),
            Ok(CompletionPolicy::Directory)
        );
        assert!("exists".parse::<CompletionPolicy>().is_err());
        assert_eq!(CompletionPolicy::Directory.to_string(), "directory");
    }
}
