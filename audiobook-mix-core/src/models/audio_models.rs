use std::fmt;
use std::io::Read;
use std::path::PathBuf;

/// Decoded PCM audio: interleaved `f32` samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// A silent clip covering exactly `frames_for_ms(duration_ms)` frames.
    pub fn silence(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let frames = frames_for_ms(duration_ms, sample_rate);
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Whole milliseconds covered by this clip (rounded down).
    pub fn duration_ms(&self) -> u64 {
        ms_for_frames(self.frames(), self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}

/// Frame index at which `ms` begins.
///
/// Rounds up so that `ms_for_frames(frames_for_ms(ms)) == ms` for any
/// sample rate of at least 1 kHz.
///
/// Saturates instead of overflowing; use `checked_frames_for_ms` for
/// positions that come from requests.
pub fn frames_for_ms(ms: u64, sample_rate: u32) -> usize {
    checked_frames_for_ms(ms, sample_rate).unwrap_or(usize::MAX)
}

/// Like `frames_for_ms`, but `None` when the frame index does not fit.
pub fn checked_frames_for_ms(ms: u64, sample_rate: u32) -> Option<usize> {
    let numerator = ms.checked_mul(sample_rate as u64)?;
    usize::try_from(numerator.div_ceil(1000)).ok()
}

/// Whole milliseconds covered by `frames` (rounded down).
pub fn ms_for_frames(frames: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    frames as u64 * 1000 / sample_rate as u64
}

/// One input to the clip loader.
pub enum ClipInput {
    /// An already materialized file. The caller keeps ownership; the loader never deletes it.
    Path(PathBuf),

    /// An uploaded byte stream. `name` is used for diagnostics and as a format hint.
    Stream {
        name: String,
        reader: Box<dyn Read + Send>,
    },

    /// Audio that is already decoded in memory.
    Decoded(AudioClip),
}

impl ClipInput {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn stream(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self::Stream {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    /// Human-readable name used in logs and errors.
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Stream { name, .. } => name.clone(),
            Self::Decoded(_) => "<decoded>".to_string(),
        }
    }
}

impl fmt::Debug for ClipInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Stream { name, .. } => f.debug_struct("Stream").field("name", name).finish_non_exhaustive(),
            Self::Decoded(clip) => f
                .debug_struct("Decoded")
                .field("frames", &clip.frames())
                .field("sample_rate", &clip.sample_rate)
                .field("channels", &clip.channels)
                .finish(),
        }
    }
}
