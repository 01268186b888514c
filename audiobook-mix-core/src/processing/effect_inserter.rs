use crate::models::audio_models::{frames_for_ms, AudioClip, ClipInput};
use crate::models::background::{BackgroundTrack, EffectInsert};
use crate::models::episode::SkippedLayer;
use crate::models::error::PipelineError;
use crate::models::timeline::Timeline;
use crate::models::timing::TimingRecord;
use crate::processing::clip_loader::ClipLoader;
use crate::processing::envelope;

/// One effect that made it into the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplicePoint {
    /// Position in the timeline before any effect was inserted.
    pub at_ms: u64,
    pub length_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    pub timeline: Timeline,
    pub splices: Vec<SplicePoint>,
    pub skipped: Vec<SkippedLayer>,
}

impl InsertOutcome {
    /// Where a position of the pre-insert timeline ends up after the splices.
    ///
    /// A position moves by the length of every effect inserted at or before it.
    pub fn shift_position(&self, position_ms: u64) -> u64 {
        shift_position(&self.splices, position_ms)
    }

    /// Move a background window along with the audio it was placed against.
    pub fn shift_track(&self, track: &BackgroundTrack) -> BackgroundTrack {
        let shift = |ms: i64| {
            if ms < 0 {
                ms
            } else {
                self.shift_position(ms as u64) as i64
            }
        };
        BackgroundTrack {
            start_time_ms: shift(track.start_time_ms),
            end_time_ms: shift(track.end_time_ms),
            ..track.clone()
        }
    }
}

fn shift_position(splices: &[SplicePoint], position_ms: u64) -> u64 {
    position_ms
        + splices
            .iter()
            .filter(|s| s.at_ms <= position_ms)
            .map(|s| s.length_ms)
            .sum::<u64>()
}

/// Splices sound effects into the timeline just before the page they belong to.
///
/// Every page boundary behind an effect moves back by the effect's length;
/// the page timings are rewritten to match. Effects that cannot be loaded
/// are skipped.
#[derive(Debug, Clone)]
pub struct EffectInserter {
    loader: ClipLoader,
}

impl EffectInserter {
    pub fn new(loader: ClipLoader) -> Self {
        Self { loader }
    }

    pub fn insert(&self, timeline: &Timeline, effects: &[EffectInsert]) -> Result<InsertOutcome, PipelineError> {
        let mut pending = Vec::new();
        let mut skipped = Vec::new();

        for effect in effects {
            match self.load_effect(timeline, effect) {
                Ok(entry) => pending.push(entry),
                Err(error) if error.is_soft() => {
                    log::warn!("Skipping effect {}: {}", effect.name, error);
                    skipped.push(SkippedLayer {
                        name: effect.name.clone(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }

        // Stable: effects at the same page keep their request order.
        pending.sort_by_key(|(point, _)| point.at_ms);

        let track = splice_all(&timeline.track, &pending);
        let splices: Vec<SplicePoint> = pending.iter().map(|(point, _)| *point).collect();
        let timings = timeline
            .timings
            .iter()
            .map(|t| TimingRecord {
                start_time_ms: shift_position(&splices, t.start_time_ms),
                end_time_ms: shift_position(&splices, t.end_time_ms),
                ..t.clone()
            })
            .collect();

        if !splices.is_empty() {
            log::info!(
                "Inserted {} effects, track now {}ms",
                splices.len(),
                track.duration_ms()
            );
        }

        Ok(InsertOutcome {
            timeline: Timeline::new(track, timings),
            splices,
            skipped,
        })
    }

    fn load_effect(&self, timeline: &Timeline, effect: &EffectInsert) -> Result<(SplicePoint, AudioClip), PipelineError> {
        let page = timeline.timings.get(effect.page_index).ok_or_else(|| PipelineError::InvalidPageRange {
            name: effect.name.clone(),
            first_page: effect.page_index,
            last_page: effect.page_index,
            page_count: timeline.timings.len(),
        })?;

        let loaded = self.loader.load(ClipInput::path(&effect.source_path))?;
        if loaded.duration_ms == 0 {
            return Err(PipelineError::decode(&effect.name, "effect is shorter than 1ms"));
        }

        let mut clip = loaded.clip;
        envelope::apply_gain_db(&mut clip, effect.volume_db);
        let point = SplicePoint {
            at_ms: page.start_time_ms,
            length_ms: loaded.duration_ms,
        };
        Ok((point, clip))
    }
}

/// Build the spliced track by copying each span to its shifted absolute position.
fn splice_all(base: &AudioClip, pending: &[(SplicePoint, AudioClip)]) -> AudioClip {
    if pending.is_empty() {
        return base.clone();
    }

    let rate = base.sample_rate;
    let added_ms: u64 = pending.iter().map(|(p, _)| p.length_ms).sum();
    let added_frames = frames_for_ms(added_ms, rate);
    let mut track = AudioClip::new(
        vec![0.0; (base.frames() + added_frames) * base.channels as usize],
        rate,
        base.channels,
    );

    let mut cursor_ms = 0u64;
    let mut offset_ms = 0u64;
    for (point, clip) in pending {
        copy_span(
            &mut track,
            base,
            frames_for_ms(cursor_ms, rate),
            frames_for_ms(point.at_ms, rate),
            frames_for_ms(cursor_ms + offset_ms, rate),
        );
        let insert_at = frames_for_ms(point.at_ms + offset_ms, rate);
        let insert_frames = frames_for_ms(point.length_ms, rate).min(clip.frames());
        copy_span(&mut track, clip, 0, insert_frames, insert_at);
        offset_ms += point.length_ms;
        cursor_ms = point.at_ms;
    }
    copy_span(
        &mut track,
        base,
        frames_for_ms(cursor_ms, rate),
        base.frames(),
        frames_for_ms(cursor_ms + offset_ms, rate),
    );
    track
}

fn copy_span(dst: &mut AudioClip, src: &AudioClip, src_start: usize, src_end: usize, dst_start: usize) {
    let channels = dst.channels.max(1) as usize;
    let src_end = src_end.min(src.frames());
    if src_start >= src_end || dst_start >= dst.frames() {
        return;
    }
    let frames = (src_end - src_start).min(dst.frames() - dst_start);
    dst.samples[dst_start * channels..(dst_start + frames) * channels]
        .copy_from_slice(&src.samples[src_start * channels..(src_start + frames) * channels]);
}
