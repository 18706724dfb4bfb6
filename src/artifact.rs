//! Per-request JSON artifacts in the output directory.
//!
//! Files are written atomically (temp file + rename) so a reader never sees
//! a half-written artifact.

use crate::error::AnalyzerError;
use crate::output::{AnalysisResponse, DebugRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `<output_dir>/analysis_<file_id>.json`
pub fn result_path(output_dir: &Path, file_id: &str) -> PathBuf {
    output_dir.join(format!("analysis_{file_id}.json"))
}

/// `<output_dir>/debug_<file_id>.json`
pub fn debug_path(output_dir: &Path, file_id: &str) -> PathBuf {
    output_dir.join(format!("debug_{file_id}.json"))
}

/// Serialise `value` as pretty JSON and write it to `path` atomically.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), AnalyzerError> {
    let write_err = |e: std::io::Error| AnalyzerError::ArtifactWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| AnalyzerError::Internal(format!("JSON serialisation failed: {e}")))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    debug!("Wrote {} ({} bytes)", path.display(), json.len());
    Ok(())
}

/// Write the response artifact; returns its path.
pub async fn save_result(
    output_dir: &Path,
    response: &AnalysisResponse,
) -> Result<PathBuf, AnalyzerError> {
    let path = result_path(output_dir, &response.file_id);
    write_json_atomic(&path, response).await?;
    Ok(path)
}

/// Write the debug record; returns its path.
pub async fn save_debug(output_dir: &Path, record: &DebugRecord) -> Result<PathBuf, AnalyzerError> {
    let path = debug_path(output_dir, &record.file_id);
    write_json_atomic(&path, record).await?;
    Ok(path)
}
