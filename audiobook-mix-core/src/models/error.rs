use thiserror::Error;

/// Errors that can occur while building episode audio.
///
/// `Decode`, `MissingSource`, `InvalidWindow` and `InvalidPageRange` are
/// fatal when they hit a dialogue clip, but only skip the affected layer
/// when they hit a background track or effect insert.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("source not found: {0}")]
    MissingSource(String),

    #[error("no clips to assemble")]
    NoClips,

    #[error("decode failed for {source_name}: {reason}")]
    Decode { source_name: String, reason: String },

    #[error("invalid window for {name}: {start_ms}ms..{end_ms}ms")]
    InvalidWindow { name: String, start_ms: i64, end_ms: i64 },

    #[error("invalid page range for {name}: pages {first_page}..={last_page} of {page_count}")]
    InvalidPageRange {
        name: String,
        first_page: usize,
        last_page: usize,
        page_count: usize,
    },

    #[error("mix failed: {0}")]
    MixFailure(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("generation timed out after {0}ms")]
    GenerationTimeout(u64),

    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("timing migration failed: {0}")]
    Migration(String),
}

impl PipelineError {
    pub(crate) fn decode(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error only skips one optional layer instead of failing the run.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::MissingSource(_)
                | Self::InvalidWindow { .. }
                | Self::InvalidPageRange { .. }
        )
    }
}
