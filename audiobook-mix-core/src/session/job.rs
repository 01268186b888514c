use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::episode::{EpisodeAudio, SkippedLayer};
use crate::models::error::PipelineError;
use crate::models::state::{JobState, PipelineStage};
use crate::session::pipeline::{EpisodePipeline, EpisodeRequest};
use crate::storage::metadata;
use crate::traits::pipeline_delegate::PipelineDelegate;

/// State shared between the job handle and its worker thread.
struct Shared {
    state: Mutex<JobState>,
    changed: Condvar,
    cancelled: AtomicBool,
    delegate: Option<Arc<dyn PipelineDelegate>>,
}

impl Shared {
    /// Replace the state unless the job was already cancelled or finished.
    fn transition(&self, next: JobState) -> bool {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return false;
            }
            *state = next.clone();
        }
        self.changed.notify_all();
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&next);
        }
        true
    }
}

/// Progress reporter handed to the pipeline on the worker thread.
///
/// Keeps the polled state in step and forwards events to the caller's delegate.
struct JobReporter {
    shared: Arc<Shared>,
}

impl PipelineDelegate for JobReporter {
    fn on_state_changed(&self, state: &JobState) {
        self.shared.transition(state.clone());
    }

    fn on_progress(&self, stage: PipelineStage, percent: u8) {
        let percent = percent.max(self.shared.state.lock().percent());
        if self.shared.transition(JobState::Running { stage, percent }) {
            if let Some(ref delegate) = self.shared.delegate {
                delegate.on_progress(stage, percent);
            }
        }
    }

    fn on_layer_skipped(&self, layer: &SkippedLayer) {
        if let Some(ref delegate) = self.shared.delegate {
            delegate.on_layer_skipped(layer);
        }
    }

    fn on_finished(&self, result: &Result<EpisodeAudio, PipelineError>) {
        if let Some(ref delegate) = self.shared.delegate {
            delegate.on_finished(result);
        }
    }
}

/// An episode build running on its own worker thread.
///
/// State transitions:
/// ```text
/// queued → running(stage, %) → completed | failed
///              └─ cancel() ──→ cancelled
/// ```
///
/// `state()` can be polled from any thread. A cancelled job stops at the
/// next stage boundary and any file it produced is deleted.
pub struct AssemblyJob {
    shared: Arc<Shared>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl AssemblyJob {
    pub fn spawn(
        pipeline: EpisodePipeline,
        request: EpisodeRequest,
        delegate: Option<Arc<dyn PipelineDelegate>>,
    ) -> Result<Self, PipelineError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(JobState::Queued),
            changed: Condvar::new(),
            cancelled: AtomicBool::new(false),
            delegate,
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("episode-assembly".into())
            .spawn(move || run_job(pipeline, request, worker))
            .map_err(|e| PipelineError::ConfigurationFailed(format!("failed to spawn assembly thread: {}", e)))?;

        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn state(&self) -> JobState {
        self.shared.state.lock().clone()
    }

    /// Mark the job cancelled. Its result, if one arrives, is discarded.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        if self.shared.transition(JobState::Cancelled) {
            log::info!("Assembly job cancelled");
        }
    }

    /// Block until the job reaches a terminal state.
    pub fn wait(&self) -> Result<EpisodeAudio, PipelineError> {
        let result = {
            let mut state = self.shared.state.lock();
            while !state.is_terminal() {
                self.shared.changed.wait(&mut state);
            }
            outcome(&state)
        };
        self.join_finished();
        result
    }

    /// Like `wait`, but gives up with `Timeout` once `timeout` has passed.
    ///
    /// The job keeps running; call `cancel` to stop it.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<EpisodeAudio, PipelineError> {
        let deadline = Instant::now() + timeout;
        let result = {
            let mut state = self.shared.state.lock();
            while !state.is_terminal() {
                if self.shared.changed.wait_until(&mut state, deadline).timed_out() && !state.is_terminal() {
                    return Err(PipelineError::Timeout);
                }
            }
            outcome(&state)
        };
        self.join_finished();
        result
    }

    fn join_finished(&self) {
        if matches!(self.state(), JobState::Cancelled) {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

fn outcome(state: &JobState) -> Result<EpisodeAudio, PipelineError> {
    match state {
        JobState::Completed(episode) => Ok((**episode).clone()),
        JobState::Failed(error) => Err(error.clone()),
        _ => Err(PipelineError::Cancelled),
    }
}

fn run_job(pipeline: EpisodePipeline, request: EpisodeRequest, shared: Arc<Shared>) {
    let reporter = JobReporter {
        shared: Arc::clone(&shared),
    };
    let started = Instant::now();

    let result = pipeline.run(request, &reporter, &shared.cancelled);

    if shared.cancelled.load(Ordering::SeqCst) {
        if let Ok(ref episode) = result {
            discard(episode);
        }
        reporter.on_finished(&Err(PipelineError::Cancelled));
        return;
    }

    settle(&reporter, result, started);
}

/// Publish a finished run. A `cancel()` that lands after the flag check
/// leaves the state terminal, so the transition fails and the episode is
/// discarded instead.
fn settle(reporter: &JobReporter, result: Result<EpisodeAudio, PipelineError>, started: Instant) {
    let settled = match &result {
        Ok(episode) => JobState::Completed(Box::new(episode.clone())),
        Err(error) => JobState::Failed(error.clone()),
    };
    if !reporter.shared.transition(settled) {
        if let Ok(ref episode) = result {
            log::info!("Assembly job cancelled while finishing; discarding {}", episode.file_path.display());
            discard(episode);
        }
        reporter.on_finished(&Err(PipelineError::Cancelled));
        return;
    }

    match &result {
        Ok(episode) => log::info!(
            "Assembly job completed in {:.1}s: {} ({}ms)",
            started.elapsed().as_secs_f64(),
            episode.file_path.display(),
            episode.total_duration_ms
        ),
        Err(error) => log::error!("Assembly job failed: {}", error),
    }
    reporter.on_finished(&result);
}

fn discard(episode: &EpisodeAudio) {
    for path in [episode.file_path.clone(), metadata::metadata_path(&episode.file_path)] {
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
