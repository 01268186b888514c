use crate::models::audio_models::ClipInput;
use crate::models::error::PipelineError;

/// Text-to-speech request for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: String,
    /// Playback speed hint for the service; the pipeline does not apply it.
    pub speed: f32,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            speed: 1.0,
        }
    }
}

/// Request for a generated sound effect or background bed.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundRequest {
    pub prompt: String,
    pub duration_ms: Option<u64>,
}

/// External speech synthesis service.
///
/// Implemented outside this crate (HTTP clients, local engines, fixtures).
/// Handles are passed in as `Arc<dyn SpeechSynthesizer>`; nothing here keeps
/// a global client.
pub trait SpeechSynthesizer: Send + Sync {
    /// Produce audio for one request. Errors should be `PipelineError::Generation`.
    fn synthesize(&self, request: &SpeechRequest) -> Result<ClipInput, PipelineError>;
}

/// External sound effect / ambience generation service.
pub trait SoundGenerator: Send + Sync {
    fn generate(&self, request: &SoundRequest) -> Result<ClipInput, PipelineError>;
}
