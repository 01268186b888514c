use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::audio_models::ClipInput;
use crate::models::background::{BackgroundTrack, EffectInsert, PageRangeTrack};
use crate::models::config::PipelineConfiguration;
use crate::models::episode::{EpisodeAudio, EpisodeMetadata, SkippedLayer};
use crate::models::error::PipelineError;
use crate::models::state::PipelineStage;
use crate::models::timeline::Timeline;
use crate::models::timing::TimingRecord;
use crate::processing::background_mixer::{BackgroundMixer, MixOutcome};
use crate::processing::clip_loader::ClipLoader;
use crate::processing::effect_inserter::EffectInserter;
use crate::processing::timeline_assembler::TimelineAssembler;
use crate::storage::{episode_writer, metadata};
use crate::traits::pipeline_delegate::PipelineDelegate;

/// Everything needed to build one episode.
#[derive(Debug)]
pub struct EpisodeRequest {
    /// One clip per page, in reading order.
    pub clips: Vec<ClipInput>,
    pub page_texts: Option<Vec<String>>,
    pub speed: f32,
    pub effects: Vec<EffectInsert>,
    /// Windows are positions on the timeline before effects are inserted.
    pub background_tracks: Vec<BackgroundTrack>,
    /// Resolved against the assembled timings, then mixed after `background_tracks`.
    pub page_range_tracks: Vec<PageRangeTrack>,
}

impl Default for EpisodeRequest {
    fn default() -> Self {
        Self {
            clips: Vec::new(),
            page_texts: None,
            speed: 1.0,
            effects: Vec::new(),
            background_tracks: Vec::new(),
            page_range_tracks: Vec::new(),
        }
    }
}

impl EpisodeRequest {
    pub fn new(clips: Vec<ClipInput>) -> Self {
        Self {
            clips,
            ..Default::default()
        }
    }

    pub fn with_page_texts(mut self, texts: Vec<String>) -> Self {
        self.page_texts = Some(texts);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_effects(mut self, effects: Vec<EffectInsert>) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_background_tracks(mut self, tracks: Vec<BackgroundTrack>) -> Self {
        self.background_tracks = tracks;
        self
    }

    pub fn with_page_range_tracks(mut self, tracks: Vec<PageRangeTrack>) -> Self {
        self.page_range_tracks = tracks;
        self
    }
}

/// Builds episodes: load → assemble → insert effects → mix → write.
///
/// Holds no per-run state, so one pipeline can serve many requests,
/// including concurrently from several threads.
#[derive(Debug, Clone)]
pub struct EpisodePipeline {
    config: PipelineConfiguration,
    loader: ClipLoader,
}

impl EpisodePipeline {
    pub fn new(config: PipelineConfiguration) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::ConfigurationFailed)?;
        let loader = ClipLoader::new(&config);
        Ok(Self { config, loader })
    }

    pub fn config(&self) -> &PipelineConfiguration {
        &self.config
    }

    /// Concatenate page clips with the standard silences. No file is written.
    pub fn assemble_timeline(
        &self,
        clips: Vec<ClipInput>,
        page_texts: Option<&[String]>,
    ) -> Result<Timeline, PipelineError> {
        TimelineAssembler::new(&self.config, self.loader.clone()).assemble(clips, page_texts)
    }

    /// Lay background tracks under a timeline. No file is written.
    pub fn mix_background(&self, timeline: &Timeline, tracks: &[BackgroundTrack]) -> Result<MixOutcome, PipelineError> {
        BackgroundMixer::new(self.loader.clone()).mix(timeline, tracks)
    }

    pub fn assemble_episode(
        &self,
        request: EpisodeRequest,
        delegate: &dyn PipelineDelegate,
    ) -> Result<EpisodeAudio, PipelineError> {
        self.run(request, delegate, &AtomicBool::new(false))
    }

    /// Remix an existing episode file under new background tracks and write it as a new episode.
    pub fn mix_existing(
        &self,
        main_path: &Path,
        timings: Vec<TimingRecord>,
        tracks: &[BackgroundTrack],
    ) -> Result<EpisodeAudio, PipelineError> {
        let outcome = BackgroundMixer::new(self.loader.clone()).mix_existing(main_path, timings, tracks)?;
        self.write(outcome.timeline, outcome.applied, outcome.skipped)
    }

    /// Full build, checking `cancelled` between stages.
    pub(crate) fn run(
        &self,
        request: EpisodeRequest,
        delegate: &dyn PipelineDelegate,
        cancelled: &AtomicBool,
    ) -> Result<EpisodeAudio, PipelineError> {
        let check = || {
            if cancelled.load(Ordering::SeqCst) {
                Err(PipelineError::Cancelled)
            } else {
                Ok(())
            }
        };

        let EpisodeRequest {
            clips,
            page_texts,
            speed,
            effects,
            background_tracks,
            page_range_tracks,
        } = request;

        log::info!(
            "Building episode: {} pages, {} effects, {} background tracks",
            clips.len(),
            effects.len(),
            background_tracks.len() + page_range_tracks.len()
        );

        delegate.on_progress(PipelineStage::Loading, 10);
        let assembler = TimelineAssembler::new(&self.config, self.loader.clone()).with_speed(speed);
        let timeline = assembler.assemble_with_progress(clips, page_texts.as_deref(), &mut |done, total| {
            delegate.on_progress(PipelineStage::Loading, scale(10, 50, done, total));
        })?;
        check()?;
        delegate.on_progress(PipelineStage::Assembling, 55);

        let mut skipped = Vec::new();
        let mut tracks = background_tracks;
        for range in &page_range_tracks {
            match range.resolve(&timeline.timings, timeline.duration_ms()) {
                Ok(track) => tracks.push(track),
                Err(error) => {
                    log::warn!("Skipping page-range track {}: {}", range.source_path.display(), error);
                    let layer = SkippedLayer {
                        name: range.source_path.display().to_string(),
                        error,
                    };
                    delegate.on_layer_skipped(&layer);
                    skipped.push(layer);
                }
            }
        }
        let timeline = if effects.is_empty() {
            timeline
        } else {
            delegate.on_progress(PipelineStage::Inserting, 58);
            let inserted = EffectInserter::new(self.loader.clone()).insert(&timeline, &effects)?;
            tracks = tracks.iter().map(|t| inserted.shift_track(t)).collect();
            report_skipped(delegate, &inserted.skipped);
            skipped.extend(inserted.skipped);
            inserted.timeline
        };
        check()?;

        delegate.on_progress(PipelineStage::Mixing, 60);
        let mixed = BackgroundMixer::new(self.loader.clone()).mix_with_progress(&timeline, &tracks, &mut |done, total| {
            delegate.on_progress(PipelineStage::Mixing, scale(60, 85, done, total));
        })?;
        report_skipped(delegate, &mixed.skipped);
        skipped.extend(mixed.skipped);
        check()?;

        delegate.on_progress(PipelineStage::Writing, 90);
        self.write(mixed.timeline, mixed.applied, skipped)
    }

    fn write(
        &self,
        timeline: Timeline,
        background_layers: Vec<String>,
        skipped_layers: Vec<SkippedLayer>,
    ) -> Result<EpisodeAudio, PipelineError> {
        let (file_path, checksum) = episode_writer::write_episode(&timeline.track, &self.config)?;

        let finish = || -> Result<EpisodeAudio, PipelineError> {
            let total_duration_ms = episode_writer::measure_duration_ms(&file_path)?;
            let metadata = EpisodeMetadata::new(
                total_duration_ms,
                &file_path.display().to_string(),
                &checksum,
                background_layers,
                timeline.timings.clone(),
            );
            if self.config.write_metadata {
                metadata::write_metadata(&metadata, &file_path)?;
            }
            Ok(EpisodeAudio {
                file_path: file_path.clone(),
                total_duration_ms,
                timings: timeline.timings.clone(),
                checksum: checksum.clone(),
                metadata,
                skipped_layers,
            })
        };

        finish().inspect_err(|e| {
            log::error!("Discarding {}: {}", file_path.display(), e);
            let _ = std::fs::remove_file(&file_path);
            let _ = std::fs::remove_file(metadata::metadata_path(&file_path));
        })
    }
}

fn report_skipped(delegate: &dyn PipelineDelegate, skipped: &[SkippedLayer]) {
    for layer in skipped {
        delegate.on_layer_skipped(layer);
    }
}

/// Map `done / total` onto the `from..=to` percent range.
fn scale(from: u8, to: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return to;
    }
    let span = (to - from) as usize;
    from + (span * done.min(total) / total) as u8
}
