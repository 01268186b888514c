use audiobook_mix_core::{EpisodeAudio, JobState, PipelineDelegate, PipelineError, PipelineStage, SkippedLayer};

/// `PipelineDelegate` that reports build events through the `log` facade.
pub struct LogDelegate;

impl PipelineDelegate for LogDelegate {
    fn on_state_changed(&self, state: &JobState) {
        log::debug!("Job state: {} ({}%)", state.name(), state.percent());
    }

    fn on_progress(&self, stage: PipelineStage, percent: u8) {
        log::info!("[{:>3}%] {}", percent, stage.as_str());
    }

    fn on_layer_skipped(&self, layer: &SkippedLayer) {
        log::warn!("Layer {} skipped: {}", layer.name, layer.error);
    }

    fn on_finished(&self, result: &Result<EpisodeAudio, PipelineError>) {
        match result {
            Ok(episode) => log::info!(
                "Episode ready: {} ({}ms, {} pages)",
                episode.file_path.display(),
                episode.total_duration_ms,
                episode.timings.len()
            ),
            Err(e) => log::error!("Episode build failed: {}", e),
        }
    }
}
