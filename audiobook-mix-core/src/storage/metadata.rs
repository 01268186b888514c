use std::fs;
use std::path::{Path, PathBuf};

use crate::models::episode::EpisodeMetadata;
use crate::models::error::PipelineError;

/// Sidecar path for an episode file: `episode_x.wav` → `episode_x.metadata.json`.
pub fn metadata_path(episode_path: &Path) -> PathBuf {
    episode_path.with_extension("metadata.json")
}

/// Write episode metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &EpisodeMetadata, episode_path: &Path) -> Result<PathBuf, PipelineError> {
    let path = metadata_path(episode_path);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| PipelineError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&path, json).map_err(|e| PipelineError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(path)
}

/// Read episode metadata from a JSON sidecar file.
pub fn read_metadata(episode_path: &Path) -> Result<EpisodeMetadata, PipelineError> {
    let json = fs::read_to_string(metadata_path(episode_path))
        .map_err(|e| PipelineError::StorageError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| PipelineError::StorageError(format!("failed to parse metadata: {}", e)))
}
