use super::audio_models::AudioClip;
use super::timing::TimingRecord;

/// An assembled episode track and the position of each page within it.
///
/// Stages that change the audio return a new `Timeline` rather than
/// editing one in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub track: AudioClip,
    pub timings: Vec<TimingRecord>,
}

impl Timeline {
    pub fn new(track: AudioClip, timings: Vec<TimingRecord>) -> Self {
        Self { track, timings }
    }

    pub fn duration_ms(&self) -> u64 {
        self.track.duration_ms()
    }

    pub fn page_count(&self) -> usize {
        self.timings.len()
    }

    /// Whether the track holds audio that later stages can work on.
    pub fn is_valid(&self) -> bool {
        self.track.sample_rate > 0 && self.track.channels > 0 && !self.track.is_empty()
    }
}
