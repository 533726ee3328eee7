//! Persists run output: the per-step result list and the HTTP request log,
//! each as a single timestamped JSON file under the configured output
//! directory.

use crate::transport::RequestLog;
use seq_core::StepOutcome;
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub fn write_results(dir: &Path, timestamp: &str, results: &[StepOutcome]) -> Result<PathBuf, SinkError> {
    let path = dir.join(format!("results_{timestamp}.json"));
    let body = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, body).map_err(|source| SinkError::Write { path: path.clone(), source })?;
    Ok(path)
}

/// A no-op when the log is empty, matching the source's "nothing collected,
/// nothing written" behavior.
pub fn write_http_log(dir: &Path, timestamp: &str, log: &RequestLog) -> Result<Option<PathBuf>, SinkError> {
    let entries = log.entries();
    if entries.is_empty() {
        return Ok(None);
    }
    let path = dir.join(format!("http_requests_{timestamp}.json"));
    let document = json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "total_requests": entries.len(),
        "logs": entries,
    });
    let body = serde_json::to_string_pretty(&document)?;
    std::fs::write(&path, body).map_err(|source| SinkError::Write { path: path.clone(), source })?;
    Ok(Some(path))
}
