use crate::models::audio_models::{frames_for_ms, AudioClip, ClipInput};
use crate::models::config::PipelineConfiguration;
use crate::models::error::PipelineError;
use crate::models::timeline::Timeline;
use crate::models::timing::layout_timings;
use crate::processing::clip_loader::{ClipLoader, LoadedClip};
use crate::processing::speed;

/// Concatenates page clips into one track and records where each page lands.
///
/// Layout:
/// ```text
/// [intro silence] [page 0] [gap] [page 1] [gap] ... [page N-1] [outro silence]
/// ```
///
/// Each page is placed at the absolute frame of its start time, so the
/// track length always matches `last end + outro` to the millisecond and
/// rounding never accumulates from page to page.
#[derive(Debug, Clone)]
pub struct TimelineAssembler {
    loader: ClipLoader,
    sample_rate: u32,
    channels: u16,
    intro_silence_ms: u64,
    inter_clip_silence_ms: u64,
    outro_silence_ms: u64,
    speed: f32,
}

impl TimelineAssembler {
    pub fn new(config: &PipelineConfiguration, loader: ClipLoader) -> Self {
        Self {
            loader,
            sample_rate: config.sample_rate,
            channels: config.channels,
            intro_silence_ms: config.intro_silence_ms,
            inter_clip_silence_ms: config.inter_clip_silence_ms,
            outro_silence_ms: config.outro_silence_ms,
            speed: 1.0,
        }
    }

    /// Playback speed applied to every page clip, clamped to 0.5–2.0.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed::clamp_speed(speed);
        self
    }

    pub fn assemble(&self, inputs: Vec<ClipInput>, page_texts: Option<&[String]>) -> Result<Timeline, PipelineError> {
        self.assemble_with_progress(inputs, page_texts, &mut |_, _| {})
    }

    /// Like `assemble`, calling `on_loaded(done, total)` after each clip is decoded.
    pub fn assemble_with_progress(
        &self,
        inputs: Vec<ClipInput>,
        page_texts: Option<&[String]>,
        on_loaded: &mut dyn FnMut(usize, usize),
    ) -> Result<Timeline, PipelineError> {
        if inputs.is_empty() {
            return Err(PipelineError::NoClips);
        }

        let total = inputs.len();
        let mut clips = Vec::with_capacity(total);
        for (index, input) in inputs.into_iter().enumerate() {
            let name = input.display_name();
            // Any failure drops the clips loaded so far.
            let loaded = self.loader.load(input).inspect_err(|e| {
                log::error!("Page {} ({}) failed to load: {}", index, name, e);
            })?;
            let loaded = self.apply_speed(loaded);
            if loaded.duration_ms == 0 {
                return Err(PipelineError::decode(name, "clip is shorter than 1ms"));
            }
            clips.push(loaded);
            on_loaded(index + 1, total);
        }

        self.place(clips, page_texts)
    }

    /// Lay out already loaded clips.
    pub fn place(&self, clips: Vec<LoadedClip>, page_texts: Option<&[String]>) -> Result<Timeline, PipelineError> {
        if clips.is_empty() {
            return Err(PipelineError::NoClips);
        }

        for (index, loaded) in clips.iter().enumerate() {
            if loaded.clip.sample_rate != self.sample_rate || loaded.clip.channels != self.channels {
                return Err(PipelineError::decode(
                    format!("page {}", index),
                    format!(
                        "clip is {}Hz/{}ch, timeline is {}Hz/{}ch",
                        loaded.clip.sample_rate, loaded.clip.channels, self.sample_rate, self.channels
                    ),
                ));
            }
        }

        let durations: Vec<u64> = clips.iter().map(|c| c.duration_ms).collect();
        let timings = layout_timings(&durations, page_texts, self.intro_silence_ms, self.inter_clip_silence_ms);
        let last_end = timings.last().map(|t| t.end_time_ms).unwrap_or(self.intro_silence_ms);
        let total_ms = last_end + self.outro_silence_ms;

        let channels = self.channels as usize;
        let mut track = AudioClip::silence(total_ms, self.sample_rate, self.channels);
        for (loaded, timing) in clips.iter().zip(&timings) {
            let start_frame = frames_for_ms(timing.start_time_ms, self.sample_rate);
            let end_frame = frames_for_ms(timing.end_time_ms, self.sample_rate);
            let frames = loaded.clip.frames().min(end_frame - start_frame);
            track.samples[start_frame * channels..(start_frame + frames) * channels]
                .copy_from_slice(&loaded.clip.samples[..frames * channels]);
        }

        log::info!(
            "Assembled {} pages into {}ms (last page ends at {}ms)",
            timings.len(),
            track.duration_ms(),
            last_end
        );
        Ok(Timeline::new(track, timings))
    }

    fn apply_speed(&self, loaded: LoadedClip) -> LoadedClip {
        if (self.speed - 1.0).abs() <= 0.01 {
            return loaded;
        }
        let clip = speed::change_speed(loaded.clip, self.speed);
        let duration_ms = clip.duration_ms();
        LoadedClip { clip, duration_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::clip_loader::tests::write_tone;
    use std::path::Path;

    fn assembler(scratch: &Path) -> TimelineAssembler {
        let config = PipelineConfiguration {
            scratch_directory: scratch.to_path_buf(),
            ..Default::default()
        };
        TimelineAssembler::new(&config, ClipLoader::new(&config))
    }

    fn silent(ms: u64) -> ClipInput {
        ClipInput::Decoded(AudioClip::silence(ms, 44100, 2))
    }

    #[test]
    fn three_clip_episode_layout() {
        let scratch = tempfile::tempdir().unwrap();
        let timeline = assembler(scratch.path())
            .assemble(vec![silent(2000), silent(1500), silent(3000)], None)
            .unwrap();

        let bounds: Vec<(usize, u64, u64)> = timeline
            .timings
            .iter()
            .map(|t| (t.page_index, t.start_time_ms, t.end_time_ms))
            .collect();
        assert_eq!(bounds, vec![(0, 3000, 5000), (1, 5500, 7000), (2, 7500, 10500)]);
        assert!(timeline.timings.iter().all(|t| t.text.is_none()));
        assert_eq!(timeline.duration_ms(), 13500);
    }

    #[test]
    fn empty_input_is_rejected() {
        let scratch = tempfile::tempdir().unwrap();
        let err = assembler(scratch.path()).assemble(Vec::new(), None).unwrap_err();
        assert_eq!(err, PipelineError::NoClips);
    }

    #[test]
    fn placing_a_clip_in_another_format_fails() {
        let scratch = tempfile::tempdir().unwrap();
        let stereo = AudioClip::silence(1000, 44100, 2);
        let mono = AudioClip::silence(1000, 44100, 1);
        let clips = vec![
            LoadedClip {
                clip: stereo,
                duration_ms: 1000,
            },
            LoadedClip {
                clip: mono,
                duration_ms: 1000,
            },
        ];

        let err = assembler(scratch.path()).place(clips, None).unwrap_err();

        assert!(matches!(err, PipelineError::Decode { ref source_name, .. } if source_name == "page 1"));
    }

    #[test]
    fn placing_a_clip_at_another_rate_fails() {
        let scratch = tempfile::tempdir().unwrap();
        let clips = vec![LoadedClip {
            clip: AudioClip::silence(1000, 22050, 2),
            duration_ms: 1000,
        }];

        let err = assembler(scratch.path()).place(clips, None).unwrap_err();

        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn missing_second_clip_aborts() {
        let fixtures = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let first = write_tone(fixtures.path(), "page_1.wav", 1000, 44100);
        let missing = fixtures.path().join("page_2.wav");

        let err = assembler(scratch.path())
            .assemble(vec![ClipInput::path(&first), ClipInput::path(&missing)], None)
            .unwrap_err();

        assert!(matches!(err, PipelineError::MissingSource(_)));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn duration_matches_formula_for_odd_lengths() {
        let scratch = tempfile::tempdir().unwrap();
        let durations = [1234u64, 77, 4001, 999, 10];
        let inputs = durations.iter().map(|&ms| silent(ms)).collect();

        let timeline = assembler(scratch.path()).assemble(inputs, None).unwrap();

        let expected = 3000 + durations.iter().sum::<u64>() + 500 * (durations.len() as u64 - 1) + 3000;
        assert_eq!(timeline.duration_ms(), expected);
        assert_eq!(timeline.timings[0].start_time_ms, 3000);
        for pair in timeline.timings.windows(2) {
            assert_eq!(pair[1].start_time_ms, pair[0].end_time_ms + 500);
        }
    }

    #[test]
    fn same_inputs_give_same_timings() {
        let fixtures = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let a = write_tone(fixtures.path(), "a.wav", 1700, 22050);
        let b = write_tone(fixtures.path(), "b.wav", 900, 48000);
        let asm = assembler(scratch.path());

        let first = asm.assemble(vec![ClipInput::path(&a), ClipInput::path(&b)], None).unwrap();
        let second = asm.assemble(vec![ClipInput::path(&a), ClipInput::path(&b)], None).unwrap();

        assert_eq!(first.timings, second.timings);
    }

    #[test]
    fn texts_attach_by_position() {
        let scratch = tempfile::tempdir().unwrap();
        let texts = vec!["첫 페이지".to_string(), "둘째".to_string()];

        let timeline = assembler(scratch.path())
            .assemble(vec![silent(500), silent(500), silent(500)], Some(&texts))
            .unwrap();

        assert_eq!(timeline.timings[0].text.as_deref(), Some("첫 페이지"));
        assert_eq!(timeline.timings[1].text.as_deref(), Some("둘째"));
        assert_eq!(timeline.timings[2].text, None);
    }

    #[test]
    fn page_audio_lands_at_its_start_time() {
        let scratch = tempfile::tempdir().unwrap();
        let page = AudioClip::new(vec![0.5; 44100 * 2], 44100, 2);

        let timeline = assembler(scratch.path())
            .assemble(vec![ClipInput::Decoded(page)], None)
            .unwrap();

        let start = frames_for_ms(3000, 44100) * 2;
        assert_eq!(timeline.track.samples[start - 1], 0.0);
        assert_eq!(timeline.track.samples[start], 0.5);
        let end = frames_for_ms(4000, 44100) * 2;
        assert_eq!(timeline.track.samples[end - 1], 0.5);
        assert_eq!(timeline.track.samples[end], 0.0);
    }

    #[test]
    fn speed_shortens_pages() {
        let scratch = tempfile::tempdir().unwrap();
        let timeline = assembler(scratch.path())
            .with_speed(2.0)
            .assemble(vec![silent(2000)], None)
            .unwrap();

        assert_eq!(timeline.timings[0].end_time_ms, 4000);
    }
}
