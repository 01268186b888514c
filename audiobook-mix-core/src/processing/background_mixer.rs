use std::path::Path;

use crate::models::audio_models::{checked_frames_for_ms, frames_for_ms, AudioClip, ClipInput};
use crate::models::background::BackgroundTrack;
use crate::models::config::MAX_FADE_MS;
use crate::models::episode::SkippedLayer;
use crate::models::error::PipelineError;
use crate::models::timeline::Timeline;
use crate::models::timing::TimingRecord;
use crate::processing::clip_loader::ClipLoader;
use crate::processing::conform::{peak_level, FormatConformer};
use crate::processing::envelope;

/// Result of laying background tracks under a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MixOutcome {
    pub timeline: Timeline,
    /// Names of the tracks that were mixed in, in order.
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedLayer>,
}

/// Overlays background tracks onto windows of an assembled timeline.
///
/// Tracks are folded in order: each one is mixed into the result of the
/// previous ones. A track that cannot be loaded, or whose window is empty,
/// is skipped and reported; the dialogue is never dropped for it.
#[derive(Debug, Clone)]
pub struct BackgroundMixer {
    loader: ClipLoader,
}

impl BackgroundMixer {
    pub fn new(loader: ClipLoader) -> Self {
        Self { loader }
    }

    pub fn mix(&self, timeline: &Timeline, tracks: &[BackgroundTrack]) -> Result<MixOutcome, PipelineError> {
        self.mix_with_progress(timeline, tracks, &mut |_, _| {})
    }

    /// Like `mix`, calling `on_track(done, total)` after each track is handled.
    pub fn mix_with_progress(
        &self,
        timeline: &Timeline,
        tracks: &[BackgroundTrack],
        on_track: &mut dyn FnMut(usize, usize),
    ) -> Result<MixOutcome, PipelineError> {
        if !timeline.is_valid() {
            return Err(PipelineError::MixFailure("main timeline has no audio".into()));
        }

        let mut track = timeline.track.clone();
        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        for (index, background) in tracks.iter().enumerate() {
            let name = layer_name(background, index);
            match self.mix_one(&mut track, background, &name) {
                Ok(()) => applied.push(name),
                Err(error) if error.is_soft() => {
                    log::warn!("Skipping background track {}: {}", name, error);
                    skipped.push(SkippedLayer { name, error });
                }
                Err(error) => return Err(error),
            }
            on_track(index + 1, tracks.len());
        }

        let peak = peak_level(&track.samples);
        if peak > 1.0 {
            log::warn!("Mixed track peaks at {:.2}; samples will clip on encode", peak);
        }
        log::info!(
            "Mixed {} background tracks ({} skipped) into {}ms",
            applied.len(),
            skipped.len(),
            track.duration_ms()
        );

        Ok(MixOutcome {
            timeline: Timeline::new(track, timeline.timings.clone()),
            applied,
            skipped,
        })
    }

    /// Remix a published episode file.
    ///
    /// The main file must exist and decode; failures there are `MixFailure`.
    pub fn mix_existing(
        &self,
        main_path: &Path,
        timings: Vec<TimingRecord>,
        tracks: &[BackgroundTrack],
    ) -> Result<MixOutcome, PipelineError> {
        let main = self
            .loader
            .load(ClipInput::path(main_path))
            .map_err(|e| PipelineError::MixFailure(format!("main track unusable: {}", e)))?;
        self.mix(&Timeline::new(main.clip, timings), tracks)
    }

    /// Gain, loop, truncate and fade a decoded background source to fill the track's window.
    ///
    /// Builds the whole window; mixing only builds the part inside the track.
    pub fn prepare_layer(&self, source: &AudioClip, background: &BackgroundTrack) -> Result<AudioClip, PipelineError> {
        layer_within(source, background, &layer_name(background, 0), usize::MAX)
    }

    fn mix_one(&self, track: &mut AudioClip, background: &BackgroundTrack, name: &str) -> Result<(), PipelineError> {
        if !background.has_valid_window() {
            return Err(invalid_window(background, name.to_string()));
        }
        let offset = checked_frames_for_ms(background.start_time_ms as u64, track.sample_rate)
            .ok_or_else(|| invalid_window(background, name.to_string()))?;

        // The loader conforms to the configured format; the timeline may differ.
        let source = self.loader.load(ClipInput::path(&background.source_path))?;
        let source = FormatConformer::new(track.sample_rate, track.channels).conform(source.clip);
        let layer = layer_within(&source, background, name, track.frames().saturating_sub(offset))?;

        let mixed = envelope::overlay(track, &layer, offset);
        log::debug!(
            "Background {}: {}ms..{}ms at {:.1}dB, {} frames inside the track",
            name,
            background.start_time_ms,
            background.end_time_ms,
            background.volume_db,
            mixed
        );
        Ok(())
    }
}

/// The first `limit_frames` frames of a background layer, faded by their
/// position in the full window.
fn layer_within(
    source: &AudioClip,
    background: &BackgroundTrack,
    name: &str,
    limit_frames: usize,
) -> Result<AudioClip, PipelineError> {
    if !background.has_valid_window() {
        return Err(invalid_window(background, name.to_string()));
    }
    if source.is_empty() {
        return Err(PipelineError::decode(name, "background source has no audio"));
    }

    let required_ms = background.required_duration_ms() as u64;
    let channels = source.channels.max(1) as usize;
    let window_frames = checked_frames_for_ms(required_ms, source.sample_rate)
        .filter(|frames| frames.checked_mul(channels).is_some())
        .ok_or_else(|| invalid_window(background, name.to_string()))?;
    let fade_frames = frames_for_ms(fade_duration_ms(required_ms), source.sample_rate);

    let mut layer = envelope::loop_to_frames(source, window_frames.min(limit_frames));
    envelope::apply_gain_db(&mut layer, background.volume_db);
    envelope::apply_window_fades(&mut layer, window_frames, fade_frames);
    Ok(layer)
}

/// Fade length at each edge of a layer: `min(500ms, window / 4)`.
pub fn fade_duration_ms(required_ms: u64) -> u64 {
    MAX_FADE_MS.min(required_ms / 4)
}

fn layer_name(background: &BackgroundTrack, index: usize) -> String {
    if background.name.is_empty() {
        format!("background_{}", index + 1)
    } else {
        background.name.clone()
    }
}

fn invalid_window(background: &BackgroundTrack, name: String) -> PipelineError {
    PipelineError::InvalidWindow {
        name,
        start_ms: background.start_time_ms,
        end_ms: background.end_time_ms,
    }
}
