use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Position of one page within an assembled episode.
///
/// Serialized with the field names the playback client reads:
/// `{"pageIndex": 0, "startTime": 3000, "endTime": 5000, "text": null}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRecord {
    pub page_index: usize,
    #[serde(rename = "startTime")]
    pub start_time_ms: u64,
    #[serde(rename = "endTime")]
    pub end_time_ms: u64,
    #[serde(default)]
    pub text: Option<String>,
}

impl TimingRecord {
    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }
}

/// Compute page timings from clip durations.
///
/// The first page starts at `intro_ms`; each later page starts
/// `gap_ms` after the previous one ends. Texts are matched by position and
/// missing entries stay `None`.
pub fn layout_timings(
    durations_ms: &[u64],
    page_texts: Option<&[String]>,
    intro_ms: u64,
    gap_ms: u64,
) -> Vec<TimingRecord> {
    let mut records = Vec::with_capacity(durations_ms.len());
    let mut cursor = intro_ms;
    for (index, &duration) in durations_ms.iter().enumerate() {
        if index > 0 {
            cursor += gap_ms;
        }
        let start = cursor;
        cursor += duration;
        records.push(TimingRecord {
            page_index: index,
            start_time_ms: start,
            end_time_ms: cursor,
            text: page_texts.and_then(|texts| texts.get(index).cloned()),
        });
    }
    records
}

/// Serialize timings into the persisted JSON array format.
pub fn timings_to_json(timings: &[TimingRecord]) -> Result<String, PipelineError> {
    serde_json::to_string(timings).map_err(|e| PipelineError::StorageError(format!("failed to serialize timings: {}", e)))
}

/// Parse the persisted JSON array format.
///
/// Only structured arrays are accepted. Legacy string-encoded or
/// incomplete data goes through `storage::timing_migration` first.
pub fn timings_from_json(json: &str) -> Result<Vec<TimingRecord>, PipelineError> {
    serde_json::from_str(json).map_err(|e| PipelineError::StorageError(format!("failed to parse timings: {}", e)))
}
