use super::episode::EpisodeAudio;
use super::error::PipelineError;

/// Stage of a running pipeline, reported with coarse progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Loading,
    Assembling,
    Inserting,
    Mixing,
    Writing,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Assembling => "assembling",
            Self::Inserting => "inserting",
            Self::Mixing => "mixing",
            Self::Writing => "writing",
        }
    }
}

/// Assembly job state machine.
///
/// State transitions:
/// ```text
/// queued → running ─→ completed
///             │    └→ failed
///             └─────→ cancelled
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Queued,
    Running { stage: PipelineStage, percent: u8 },
    Completed(Box<EpisodeAudio>),
    Failed(PipelineError),
    Cancelled,
}

impl JobState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Cancelled)
    }

    /// Progress in percent, for polling clients.
    pub fn percent(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running { percent, .. } => *percent,
            Self::Completed(_) => 100,
            Self::Failed(_) | Self::Cancelled => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running { stage, .. } => stage.as_str(),
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}
