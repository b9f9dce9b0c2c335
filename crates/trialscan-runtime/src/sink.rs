//! Routing of extracted records to the valid or invalid output directory.

use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use thiserror::Error;
use trialscan_core::Verdict;

use crate::config::OutputConfig;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("source {} has no file stem", path.display())]
    NoFileStem { path: PathBuf },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writes each record as `<dir>/<pdf stem>.json`.
#[derive(Debug, Clone)]
pub struct OutputSink {
    valid_dir: PathBuf,
    invalid_dir: PathBuf,
}

impl OutputSink {
    pub fn new(valid_dir: impl Into<PathBuf>, invalid_dir: impl Into<PathBuf>) -> Self {
        Self {
            valid_dir: valid_dir.into(),
            invalid_dir: invalid_dir.into(),
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self::new(&output.valid_dir, &output.invalid_dir)
    }

    pub fn valid_dir(&self) -> &Path {
        &self.valid_dir
    }

    pub fn invalid_dir(&self) -> &Path {
        &self.invalid_dir
    }

    /// Create both directories if absent.
    pub async fn ensure_dirs(&self) -> Result<(), SinkError> {
        for dir in [&self.valid_dir, &self.invalid_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| SinkError::Io {
                    path: dir.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Destination for the record extracted from `source`.
    pub fn target_path(&self, source: &Path, verdict: &Verdict) -> Result<PathBuf, SinkError> {
        let stem = source
            .file_stem()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SinkError::NoFileStem {
                path: source.to_path_buf(),
            })?;

        let dir = if verdict.is_valid() {
            &self.valid_dir
        } else {
            &self.invalid_dir
        };

        let mut name = stem.to_os_string();
        name.push(".json");
        Ok(dir.join(name))
    }

    /// Write the record as extracted, pretty-printed, and return its path.
    ///
    /// An existing file for the same stem is overwritten.
    pub async fn persist(
        &self,
        source: &Path,
        record: &JsonValue,
        verdict: &Verdict,
    ) -> Result<PathBuf, SinkError> {
        let path = self.target_path(source, verdict)?;
        let body = serde_json::to_string_pretty(record)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SinkError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&path, body)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::from_config(&OutputConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscan_core::{validate_json, Violation};

    fn invalid() -> Verdict {
        Verdict::from_violations(vec![Violation::new("missing_field", "sample_size is missing")])
    }

    fn valid() -> Verdict {
        Verdict::from_violations(Vec::new())
    }

    #[test]
    fn test_target_path_routes_by_verdict() {
        let sink = OutputSink::new("out", "bad");
        let source = Path::new("papers/smith2021.pdf");

        assert_eq!(
            sink.target_path(source, &valid()).unwrap(),
            PathBuf::from("out/smith2021.json")
        );
        assert_eq!(
            sink.target_path(source, &invalid()).unwrap(),
            PathBuf::from("bad/smith2021.json")
        );
    }

    #[test]
    fn test_dotted_stem_keeps_all_but_extension() {
        let sink = OutputSink::new("out", "bad");
        let path = sink
            .target_path(Path::new("trial.v2.pdf"), &valid())
            .unwrap();
        assert_eq!(path, PathBuf::from("out/trial.v2.json"));

        let sibling = sink
            .target_path(Path::new("trial.v1.pdf"), &valid())
            .unwrap();
        assert_eq!(sibling, PathBuf::from("out/trial.v1.json"));
    }

    #[test]
    fn test_source_without_stem_is_error() {
        let sink = OutputSink::default();
        assert!(matches!(
            sink.target_path(Path::new("/"), &valid()),
            Err(SinkError::NoFileStem { .. })
        ));
    }

    #[tokio::test]
    async fn test_persist_writes_original_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(dir.path().join("output"), dir.path().join("invalid_output"));
        sink.ensure_dirs().await.unwrap();

        let record = serde_json::json!({
            "title": "Étude randomisée",
            "sample_size": "120",
        });
        let verdict = validate_json(&record).unwrap();
        assert!(!verdict.is_valid());

        let path = sink
            .persist(Path::new("in/etude.pdf"), &record, &verdict)
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("invalid_output/etude.json"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Étude randomisée"));
        assert!(written.contains("\n  \"sample_size\": \"120\""));
        let reread: JsonValue = serde_json::from_str(&written).unwrap();
        assert_eq!(reread, record);
    }

    #[tokio::test]
    async fn test_persist_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(dir.path().join("a/b"), dir.path().join("c"));

        let path = sink
            .persist(Path::new("x.pdf"), &serde_json::json!({}), &valid())
            .await
            .unwrap();
        assert!(path.exists());
    }
}
