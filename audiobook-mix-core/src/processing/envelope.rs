//! Gain, fades, looping and overlay on interleaved buffers.

use crate::models::audio_models::{frames_for_ms, AudioClip};
use crate::models::background::db_to_linear;

/// Scale every sample by a gain in decibels.
pub fn apply_gain_db(clip: &mut AudioClip, gain_db: f32) {
    if gain_db == 0.0 {
        return;
    }
    let factor = db_to_linear(gain_db);
    for sample in clip.samples.iter_mut() {
        *sample *= factor;
    }
}

/// Repeat the clip end to end until it covers `frames`, then cut it to exactly that length.
///
/// Returns silence of the requested length for an empty clip.
pub fn loop_to_frames(clip: &AudioClip, frames: usize) -> AudioClip {
    let channels = clip.channels.max(1) as usize;
    let target_len = frames * channels;
    if clip.samples.is_empty() {
        return AudioClip::new(vec![0.0; target_len], clip.sample_rate, clip.channels);
    }

    let mut samples = Vec::with_capacity(target_len);
    while samples.len() < target_len {
        let remaining = target_len - samples.len();
        let take = remaining.min(clip.samples.len());
        samples.extend_from_slice(&clip.samples[..take]);
    }
    AudioClip::new(samples, clip.sample_rate, clip.channels)
}

/// Linear fade-in over the first `fade_ms` and fade-out over the last `fade_ms`.
///
/// The fade length is capped at half the clip so the two ramps never overlap.
pub fn apply_edge_fades(clip: &mut AudioClip, fade_ms: u64) {
    let total_frames = clip.frames();
    let fade_frames = frames_for_ms(fade_ms, clip.sample_rate);
    apply_window_fades(clip, total_frames, fade_frames);
}

/// Edge fades for a clip holding only the first `clip.frames()` frames of a
/// `window_frames` long window.
///
/// Gains depend on the position inside the whole window, so a window cut
/// short by the end of the track keeps its fade-in and loses the part of
/// the fade-out that would fall past the cut.
pub fn apply_window_fades(clip: &mut AudioClip, window_frames: usize, fade_frames: usize) {
    let channels = clip.channels.max(1) as usize;
    let fade_frames = fade_frames.min(window_frames / 2);
    if fade_frames == 0 {
        return;
    }
    let held = clip.frames().min(window_frames);

    for frame in 0..fade_frames.min(held) {
        let gain = frame as f32 / fade_frames as f32;
        for sample in &mut clip.samples[frame * channels..(frame + 1) * channels] {
            *sample *= gain;
        }
    }
    for frame in (window_frames - fade_frames)..held {
        let gain = (window_frames - 1 - frame) as f32 / fade_frames as f32;
        for sample in &mut clip.samples[frame * channels..(frame + 1) * channels] {
            *sample *= gain;
        }
    }
}

/// Add `layer` into `base` starting at `offset_frames`.
///
/// The base length never changes: layer frames past the end are dropped.
/// Both clips must share a channel layout.
pub fn overlay(base: &mut AudioClip, layer: &AudioClip, offset_frames: usize) -> usize {
    let channels = base.channels.max(1) as usize;
    let base_frames = base.frames();
    if offset_frames >= base_frames {
        return 0;
    }
    let frames = layer.frames().min(base_frames - offset_frames);
    let start = offset_frames * channels;
    for (dst, src) in base.samples[start..start + frames * channels]
        .iter_mut()
        .zip(&layer.samples[..frames * channels])
    {
        *dst += *src;
    }
    frames
}

/// Insert `insert` into `base` at `offset_frames`, pushing later audio back.
pub fn splice(base: &AudioClip, insert: &AudioClip, offset_frames: usize) -> AudioClip {
    let channels = base.channels.max(1) as usize;
    let split = offset_frames.min(base.frames()) * channels;
    let mut samples = Vec::with_capacity(base.samples.len() + insert.samples.len());
    samples.extend_from_slice(&base.samples[..split]);
    samples.extend_from_slice(&insert.samples);
    samples.extend_from_slice(&base.samples[split..]);
    AudioClip::new(samples, base.sample_rate, base.channels)
}
