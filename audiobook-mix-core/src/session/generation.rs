use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::models::audio_models::ClipInput;
use crate::models::error::PipelineError;
use crate::traits::clip_generator::{SoundGenerator, SoundRequest, SpeechRequest, SpeechSynthesizer};

/// Default ceiling for a single generation call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Calls the injected speech and sound services with a bounded wait.
///
/// Each call runs on its own thread. When the timeout passes the call is
/// abandoned: its thread is left to finish and the result is dropped.
#[derive(Clone)]
pub struct GenerationService {
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    sound: Option<Arc<dyn SoundGenerator>>,
    timeout: Duration,
}

impl GenerationService {
    pub fn new() -> Self {
        Self {
            speech: None,
            sound: None,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_sound(mut self, sound: Arc<dyn SoundGenerator>) -> Self {
        self.sound = Some(sound);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn synthesize(&self, request: SpeechRequest) -> Result<ClipInput, PipelineError> {
        let speech = self
            .speech
            .clone()
            .ok_or_else(|| PipelineError::Generation("no speech synthesizer configured".into()))?;
        self.bounded(move || speech.synthesize(&request))
    }

    pub fn generate_sound(&self, request: SoundRequest) -> Result<ClipInput, PipelineError> {
        let sound = self
            .sound
            .clone()
            .ok_or_else(|| PipelineError::Generation("no sound generator configured".into()))?;
        self.bounded(move || sound.generate(&request))
    }

    /// Synthesize every page in order, stopping at the first failure.
    pub fn synthesize_pages(&self, pages: Vec<SpeechRequest>) -> Result<Vec<ClipInput>, PipelineError> {
        let total = pages.len();
        let mut clips = Vec::with_capacity(total);
        for (index, page) in pages.into_iter().enumerate() {
            let clip = self.synthesize(page).inspect_err(|e| {
                log::error!("Speech for page {} of {} failed: {}", index + 1, total, e);
            })?;
            clips.push(clip);
        }
        Ok(clips)
    }

    fn bounded<F>(&self, call: F) -> Result<ClipInput, PipelineError>
    where
        F: FnOnce() -> Result<ClipInput, PipelineError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("generation-call".into())
            .spawn(move || {
                // The receiver is gone if the caller already timed out.
                let _ = tx.send(call());
            })
            .map_err(|e| PipelineError::Generation(format!("failed to spawn generation thread: {}", e)))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result.map_err(|e| match e {
                PipelineError::Generation(_) | PipelineError::GenerationTimeout(_) => e,
                other => PipelineError::Generation(other.to_string()),
            }),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!("Generation call exceeded {}ms", self.timeout.as_millis());
                Err(PipelineError::GenerationTimeout(self.timeout.as_millis() as u64))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(PipelineError::Generation("generation thread exited without a result".into()))
            }
        }
    }
}

impl Default for GenerationService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationService")
            .field("speech", &self.speech.is_some())
            .field("sound", &self.sound.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::AudioClip;

    /// Returns one second of silence per request, after an optional delay.
    struct FakeSpeech {
        delay: Duration,
        fail_on: Option<String>,
    }

    impl SpeechSynthesizer for FakeSpeech {
        fn synthesize(&self, request: &SpeechRequest) -> Result<ClipInput, PipelineError> {
            thread::sleep(self.delay);
            if self.fail_on.as_deref() == Some(request.text.as_str()) {
                return Err(PipelineError::Generation(format!("quota exceeded for {:?}", request.text)));
            }
            Ok(ClipInput::Decoded(AudioClip::silence(1000, 44100, 1)))
        }
    }

    struct PanickySound;

    impl SoundGenerator for PanickySound {
        fn generate(&self, _request: &SoundRequest) -> Result<ClipInput, PipelineError> {
            panic!("service client crashed");
        }
    }

    fn speech(delay_ms: u64, fail_on: Option<&str>) -> Arc<dyn SpeechSynthesizer> {
        Arc::new(FakeSpeech {
            delay: Duration::from_millis(delay_ms),
            fail_on: fail_on.map(String::from),
        })
    }

    #[test]
    fn pages_come_back_in_order() {
        let service = GenerationService::new().with_speech(speech(0, None));
        let pages = vec![SpeechRequest::new("하나", "v1"), SpeechRequest::new("둘", "v1")];

        let clips = service.synthesize_pages(pages).unwrap();

        assert_eq!(clips.len(), 2);
        assert!(matches!(clips[0], ClipInput::Decoded(_)));
    }

    #[test]
    fn slow_service_times_out() {
        let service = GenerationService::new()
            .with_speech(speech(500, None))
            .with_timeout(Duration::from_millis(20));

        let err = service.synthesize(SpeechRequest::new("느림", "v1")).unwrap_err();

        assert_eq!(err, PipelineError::GenerationTimeout(20));
    }

    #[test]
    fn first_failure_stops_the_batch() {
        let service = GenerationService::new().with_speech(speech(0, Some("둘")));
        let pages = vec![
            SpeechRequest::new("하나", "v1"),
            SpeechRequest::new("둘", "v1"),
            SpeechRequest::new("셋", "v1"),
        ];

        let err = service.synthesize_pages(pages).unwrap_err();

        assert!(matches!(err, PipelineError::Generation(ref msg) if msg.contains("quota")));
    }

    #[test]
    fn crashed_call_is_a_generation_error() {
        let service = GenerationService::new().with_sound(Arc::new(PanickySound));
        let err = service
            .generate_sound(SoundRequest {
                prompt: "door creak".into(),
                duration_ms: Some(1000),
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
    }

    #[test]
    fn missing_service_is_reported() {
        let err = GenerationService::default()
            .synthesize(SpeechRequest::new("x", "v1"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
    }
}
