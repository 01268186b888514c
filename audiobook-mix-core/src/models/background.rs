use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{DEFAULT_BACKGROUND_VOLUME_DB, DEFAULT_PAGE_RANGE_VOLUME, VOLUME_FLOOR_DB};
use super::error::PipelineError;
use super::timing::TimingRecord;

/// A music or ambience layer bound to a window of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundTrack {
    #[serde(rename = "audioPath")]
    pub source_path: PathBuf,
    #[serde(rename = "startTime")]
    pub start_time_ms: i64,
    #[serde(rename = "endTime")]
    pub end_time_ms: i64,
    #[serde(rename = "volume", default = "default_volume_db")]
    pub volume_db: f32,
    #[serde(default)]
    pub name: String,
}

fn default_volume_db() -> f32 {
    DEFAULT_BACKGROUND_VOLUME_DB
}

impl BackgroundTrack {
    pub fn new(source_path: impl Into<PathBuf>, start_time_ms: i64, end_time_ms: i64, volume_db: f32) -> Self {
        let source_path = source_path.into();
        let name = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source_path,
            start_time_ms,
            end_time_ms,
            volume_db,
            name,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Build a track covering pages `start_page..=end_page`, with volume given as a 0–1 ratio.
    ///
    /// Returns `None` when the page range resolves to an empty window.
    pub fn for_pages(
        source_path: impl Into<PathBuf>,
        timings: &[TimingRecord],
        start_page: usize,
        end_page: usize,
        volume_ratio: f32,
        total_duration_ms: u64,
    ) -> Option<Self> {
        let (start, end) = page_window(timings, start_page, end_page, total_duration_ms)?;
        Some(Self::new(source_path, start as i64, end as i64, volume_ratio_to_db(volume_ratio)))
    }

    pub fn required_duration_ms(&self) -> i64 {
        self.end_time_ms - self.start_time_ms
    }

    pub fn has_valid_window(&self) -> bool {
        self.start_time_ms >= 0 && self.required_duration_ms() > 0
    }
}

/// Convert a 0–1 volume ratio to decibels, never below `VOLUME_FLOOR_DB`.
pub fn volume_ratio_to_db(ratio: f32) -> f32 {
    if ratio.is_nan() || ratio <= 0.0 {
        return VOLUME_FLOOR_DB;
    }
    (20.0 * ratio.log10()).max(VOLUME_FLOOR_DB)
}

/// Linear amplitude factor for a gain in decibels.
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Resolve a page range to a `(start_ms, end_ms)` window.
///
/// The window opens where the page before `start_page` ends (or at 0 for
/// the first page) and closes where `end_page` ends. Out-of-range pages
/// clamp to the last page, and the end clamps to the episode length.
pub fn page_window(
    timings: &[TimingRecord],
    start_page: usize,
    end_page: usize,
    total_duration_ms: u64,
) -> Option<(u64, u64)> {
    let last = timings.len().checked_sub(1)?;
    let start = if start_page == 0 {
        0
    } else {
        timings[(start_page - 1).min(last)].end_time_ms
    };
    let mut end = timings[end_page.min(last)].end_time_ms;
    if total_duration_ms > 0 {
        end = end.min(total_duration_ms);
    }
    (start < end).then_some((start, end))
}

/// A background track bound to a page range instead of milliseconds.
///
/// Resolved against the assembled timings before mixing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRangeTrack {
    #[serde(rename = "audioPath")]
    pub source_path: PathBuf,
    #[serde(default)]
    pub start_page: usize,
    /// Last page covered; the final page when absent.
    #[serde(default)]
    pub end_page: Option<usize>,
    /// Volume as a 0–1 ratio.
    #[serde(default = "default_volume_ratio")]
    pub volume: f32,
}

fn default_volume_ratio() -> f32 {
    DEFAULT_PAGE_RANGE_VOLUME
}

impl PageRangeTrack {
    pub fn resolve(&self, timings: &[TimingRecord], total_duration_ms: u64) -> Result<BackgroundTrack, PipelineError> {
        let end_page = self.end_page.unwrap_or(usize::MAX);
        BackgroundTrack::for_pages(
            self.source_path.clone(),
            timings,
            self.start_page,
            end_page,
            self.volume,
            total_duration_ms,
        )
        .ok_or_else(|| PipelineError::InvalidPageRange {
            name: self.source_path.display().to_string(),
            first_page: self.start_page,
            last_page: end_page.min(timings.len().saturating_sub(1)),
            page_count: timings.len(),
        })
    }
}

/// A short clip spliced into the timeline just before a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectInsert {
    #[serde(rename = "audioPath")]
    pub source_path: PathBuf,
    pub page_index: usize,
    #[serde(rename = "volume", default)]
    pub volume_db: f32,
    #[serde(default)]
    pub name: String,
}

impl EffectInsert {
    pub fn new(source_path: impl Into<PathBuf>, page_index: usize, volume_db: f32) -> Self {
        let source_path = source_path.into();
        let name = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source_path,
            page_index,
            volume_db,
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn timings() -> Vec<TimingRecord> {
        crate::models::timing::layout_timings(&[2000, 1500, 3000], None, 3000, 500)
    }

    #[test]
    fn zero_ratio_clamps_to_floor() {
        assert_eq!(volume_ratio_to_db(0.0), -60.0);
        assert_eq!(volume_ratio_to_db(-0.5), -60.0);
        assert_eq!(volume_ratio_to_db(f32::NAN), -60.0);
        assert!(volume_ratio_to_db(0.0).is_finite());
    }

    #[test]
    fn tiny_ratio_clamps_to_floor() {
        assert_eq!(volume_ratio_to_db(1e-9), -60.0);
    }

    #[test]
    fn ratio_conversion() {
        assert_relative_eq!(volume_ratio_to_db(1.0), 0.0);
        assert_relative_eq!(volume_ratio_to_db(0.1), -20.0, epsilon = 1e-4);
        assert_relative_eq!(volume_ratio_to_db(0.25), -12.0412, epsilon = 1e-3);
    }

    #[test]
    fn db_to_linear_inverts_ratio() {
        assert_relative_eq!(db_to_linear(volume_ratio_to_db(0.5)), 0.5, epsilon = 1e-5);
        assert_relative_eq!(db_to_linear(0.0), 1.0);
    }

    #[test]
    fn first_page_window_starts_at_zero() {
        assert_eq!(page_window(&timings(), 0, 1, 13500), Some((0, 7000)));
    }

    #[test]
    fn later_page_window_starts_at_previous_end() {
        assert_eq!(page_window(&timings(), 1, 2, 13500), Some((5000, 10500)));
    }

    #[test]
    fn end_page_past_last_clamps() {
        assert_eq!(page_window(&timings(), 2, 99, 13500), Some((7000, 10500)));
    }

    #[test]
    fn window_clamps_to_duration() {
        assert_eq!(page_window(&timings(), 0, 2, 9000), Some((0, 9000)));
    }

    #[test]
    fn empty_timings_have_no_window() {
        assert_eq!(page_window(&[], 0, 0, 1000), None);
    }

    #[test]
    fn for_pages_converts_ratio() {
        let track = BackgroundTrack::for_pages("/music/rain.mp3", &timings(), 0, 2, 0.0, 13500).unwrap();
        assert_eq!(track.start_time_ms, 0);
        assert_eq!(track.end_time_ms, 10500);
        assert_eq!(track.volume_db, -60.0);
        assert_eq!(track.name, "rain");
    }

    #[test]
    fn window_validity() {
        assert!(BackgroundTrack::new("a.mp3", 0, 10, 0.0).has_valid_window());
        assert!(!BackgroundTrack::new("a.mp3", 10, 10, 0.0).has_valid_window());
        assert!(!BackgroundTrack::new("a.mp3", 10, 5, 0.0).has_valid_window());
        assert!(!BackgroundTrack::new("a.mp3", -5, 5, 0.0).has_valid_window());
    }

    #[test]
    fn deserializes_caller_format_with_default_volume() {
        let track: BackgroundTrack =
            serde_json::from_str(r#"{"audioPath":"/bgm/a.mp3","startTime":0,"endTime":4000}"#).unwrap();
        assert_eq!(track.volume_db, DEFAULT_BACKGROUND_VOLUME_DB);
        assert_eq!(track.required_duration_ms(), 4000);
    }

    #[test]
    fn page_range_defaults_to_last_page_and_quarter_volume() {
        let range: PageRangeTrack = serde_json::from_str(r#"{"audioPath":"/bgm/rain.mp3","startPage":1}"#).unwrap();
        let track = range.resolve(&timings(), 13500).unwrap();

        assert_eq!((track.start_time_ms, track.end_time_ms), (5000, 10500));
        assert_relative_eq!(track.volume_db, -12.0412, epsilon = 1e-3);
    }

    #[test]
    fn page_range_without_timings_is_invalid() {
        let range = PageRangeTrack {
            source_path: "/bgm/rain.mp3".into(),
            start_page: 0,
            end_page: Some(0),
            volume: 0.5,
        };
        let err = range.resolve(&[], 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPageRange { page_count: 0, .. }));
        assert_eq!(err.to_string(), "invalid page range for /bgm/rain.mp3: pages 0..=0 of 0");
    }
}
