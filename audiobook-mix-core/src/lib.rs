//! # audiobook-mix-core
//!
//! Audio timeline assembly and mixing for narrated episodes.
//!
//! Page clips are decoded, concatenated with fixed silences into one track,
//! optionally spliced with sound effects and layered with background music,
//! then written as a PCM WAV file together with per-page timings.
//!
//! ## Architecture
//!
//! ```text
//! audiobook-mix-core (this crate)
//! ├── traits/       ← PipelineDelegate, SpeechSynthesizer, SoundGenerator
//! ├── models/       ← PipelineError, PipelineConfiguration, Timeline, TimingRecord, BackgroundTrack, etc.
//! ├── processing/   ← ClipLoader, TimelineAssembler, EffectInserter, BackgroundMixer, WAV I/O
//! ├── session/      ← EpisodePipeline, AssemblyJob, GenerationService
//! └── storage/      ← EpisodeWriter, metadata sidecars, timing migration
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioClip, ClipInput};
pub use models::background::{volume_ratio_to_db, BackgroundTrack, EffectInsert, PageRangeTrack};
pub use models::config::PipelineConfiguration;
pub use models::episode::{EpisodeAudio, EpisodeMetadata, SkippedLayer};
pub use models::error::PipelineError;
pub use models::state::{JobState, PipelineStage};
pub use models::timeline::Timeline;
pub use models::timing::TimingRecord;
pub use processing::background_mixer::{BackgroundMixer, MixOutcome};
pub use processing::clip_loader::ClipLoader;
pub use processing::effect_inserter::EffectInserter;
pub use processing::timeline_assembler::TimelineAssembler;
pub use session::generation::GenerationService;
pub use session::job::AssemblyJob;
pub use session::pipeline::{EpisodePipeline, EpisodeRequest};
pub use storage::episode_writer::EpisodeWriter;
pub use traits::clip_generator::{SoundGenerator, SoundRequest, SpeechRequest, SpeechSynthesizer};
pub use traits::pipeline_delegate::{NoopDelegate, PipelineDelegate};
