//! Run-scoped artifact storage.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use pipewright_types::{PipewrightError, Result};

/// Sanitize a caller-supplied relative path.
///
/// Splits on `/` and `\`, drops empty, `.` and `..` segments, and replaces any
/// character outside `[A-Za-z0-9._-]` with `_`. Absolute paths become relative.
/// Returns `None` when nothing usable remains.
pub fn sanitize_path(rel: &str) -> Option<String> {
    let segments: Vec<String> = rel
        .split(['/', '\\'])
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .map(|seg| {
            seg.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect()
        })
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Metadata for one written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    /// Sanitized path relative to the run directory.
    #[serde(rename = "relativePath")]
    pub path: String,
    pub absolute_path: PathBuf,
    pub bytes: usize,
}

#[derive(Debug, Default)]
struct WriteLog {
    /// Distinct paths in first-write order.
    distinct: Vec<String>,
    /// Every write, repeats included.
    sequence: Vec<String>,
}

/// Writes artifacts under `<root>/<runId>/` and remembers what was written.
pub struct ArtifactStore {
    dir: PathBuf,
    writes: Mutex<WriteLog>,
}

impl ArtifactStore {
    pub fn new(artifacts_root: &Path, run_id: &str) -> Self {
        Self {
            dir: artifacts_root.join(run_id),
            writes: Mutex::new(WriteLog::default()),
        }
    }

    /// The run directory (created on first write).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write(&self, rel: &str, content: &[u8]) -> Result<ArtifactInfo> {
        let path = sanitize_path(rel)
            .ok_or_else(|| PipewrightError::Artifact(format!("invalid artifact path '{rel}'")))?;
        let absolute_path = self.dir.join(&path);
        if let Some(parent) = absolute_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&absolute_path, content).await?;
        tracing::debug!(path = %path, bytes = content.len(), "Artifact written");

        if let Ok(mut log) = self.writes.lock() {
            if !log.distinct.contains(&path) {
                log.distinct.push(path.clone());
            }
            log.sequence.push(path.clone());
        }
        Ok(ArtifactInfo {
            path,
            absolute_path,
            bytes: content.len(),
        })
    }

    /// Every path written so far, de-duplicated, in first-write order.
    pub fn written(&self) -> Vec<String> {
        self.writes.lock().map(|log| log.distinct.clone()).unwrap_or_default()
    }

    /// Number of writes so far. Use as a mark for
    /// [`written_since`](ArtifactStore::written_since).
    pub fn mark(&self) -> usize {
        self.writes.lock().map(|log| log.sequence.len()).unwrap_or(0)
    }

    /// Paths written after `mark`, de-duplicated. Includes paths that were
    /// already written before the mark and rewritten since.
    pub fn written_since(&self, mark: usize) -> Vec<String> {
        let Ok(log) = self.writes.lock() else {
            return Vec::new();
        };
        let mut paths: Vec<String> = Vec::new();
        for path in log.sequence.iter().skip(mark) {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths
    }
}
