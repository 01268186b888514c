use crate::models::episode::{EpisodeAudio, SkippedLayer};
use crate::models::error::PipelineError;
use crate::models::state::{JobState, PipelineStage};

/// Event delegate for episode builds.
///
/// All methods are called from the thread running the pipeline, which for
/// an `AssemblyJob` is its worker thread.
pub trait PipelineDelegate: Send + Sync {
    /// Called when a job changes state.
    fn on_state_changed(&self, state: &JobState);

    /// Called as the build moves through its stages. `percent` never decreases.
    fn on_progress(&self, stage: PipelineStage, percent: u8);

    /// Called when a background track or effect is left out.
    fn on_layer_skipped(&self, layer: &SkippedLayer);

    /// Called once with the outcome of the build.
    fn on_finished(&self, result: &Result<EpisodeAudio, PipelineError>);
}

/// Delegate that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl PipelineDelegate for NoopDelegate {
    fn on_state_changed(&self, _state: &JobState) {}
    fn on_progress(&self, _stage: PipelineStage, _percent: u8) {}
    fn on_layer_skipped(&self, _layer: &SkippedLayer) {}
    fn on_finished(&self, _result: &Result<EpisodeAudio, PipelineError>) {}
}
