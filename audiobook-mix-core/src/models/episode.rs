use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::timing::TimingRecord;

/// An optional layer (background track or effect insert) that was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLayer {
    pub name: String,
    pub error: PipelineError,
}

/// Result handed to the publishing layer when an episode is built.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeAudio {
    pub file_path: PathBuf,
    /// Measured from the written file, not from the timing list.
    pub total_duration_ms: u64,
    pub timings: Vec<TimingRecord>,
    pub checksum: String,
    pub metadata: EpisodeMetadata,
    pub skipped_layers: Vec<SkippedLayer>,
}

impl EpisodeAudio {
    /// Encoded file contents, for storage backends that take bytes.
    pub fn read_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        fs::read(&self.file_path)
            .map_err(|e| PipelineError::StorageError(format!("failed to read {}: {}", self.file_path.display(), e)))
    }
}

/// Metadata stored alongside an episode file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeMetadata {
    pub id: String,
    pub duration_ms: u64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    pub page_count: usize,
    pub background_layers: Vec<String>,
    pub timings: Vec<TimingRecord>,
}

impl EpisodeMetadata {
    pub fn new(
        duration_ms: u64,
        file_path: &str,
        checksum: &str,
        background_layers: Vec<String>,
        timings: Vec<TimingRecord>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_ms,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            page_count: timings.len(),
            background_layers,
            timings,
        }
    }
}
