use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::models::audio_models::{AudioClip, ClipInput};
use crate::models::config::PipelineConfiguration;
use crate::models::error::PipelineError;
use crate::processing::conform::FormatConformer;
use crate::processing::decoder;

/// A decoded clip in the pipeline format, with its length in whole milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedClip {
    pub clip: AudioClip,
    pub duration_ms: u64,
}

/// Resolves clip inputs into decoded audio in the pipeline format.
///
/// Uploaded streams are staged as uniquely named scratch files and removed
/// once decoded, whether decoding succeeds or not. Caller-supplied paths
/// are only read.
#[derive(Debug, Clone)]
pub struct ClipLoader {
    scratch_directory: PathBuf,
    conformer: FormatConformer,
}

impl ClipLoader {
    pub fn new(config: &PipelineConfiguration) -> Self {
        Self {
            scratch_directory: config.scratch_directory.clone(),
            conformer: FormatConformer::new(config.sample_rate, config.channels),
        }
    }

    pub fn scratch_directory(&self) -> &Path {
        &self.scratch_directory
    }

    pub fn load(&self, input: ClipInput) -> Result<LoadedClip, PipelineError> {
        let clip = match input {
            ClipInput::Path(path) => self.load_path(&path)?,
            ClipInput::Stream { name, mut reader } => self.load_stream(&name, &mut reader)?,
            ClipInput::Decoded(clip) => clip,
        };

        let clip = self.conformer.conform(clip);
        let duration_ms = clip.duration_ms();
        Ok(LoadedClip { clip, duration_ms })
    }

    fn load_path(&self, path: &Path) -> Result<AudioClip, PipelineError> {
        if !path.is_file() {
            return Err(PipelineError::MissingSource(path.display().to_string()));
        }
        decoder::decode_file(path, &path.display().to_string())
    }

    fn load_stream(&self, name: &str, reader: &mut dyn io::Read) -> Result<AudioClip, PipelineError> {
        let suffix = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        // Deleted when `scratch` drops, on every return path below.
        let mut scratch = tempfile::Builder::new()
            .prefix("upload_")
            .suffix(&suffix)
            .tempfile_in(&self.scratch_directory)
            .map_err(|e| PipelineError::StorageError(format!("failed to create scratch file: {}", e)))?;

        io::copy(reader, scratch.as_file_mut())
            .and_then(|_| scratch.as_file_mut().flush())
            .map_err(|e| PipelineError::StorageError(format!("failed to stage upload {}: {}", name, e)))?;

        log::debug!("Staged upload {} at {}", name, scratch.path().display());
        decoder::decode_file(scratch.path(), name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::processing::wav_format;
    use std::fs;
    use std::io::Cursor;

    /// Write a mono sine WAV fixture of `duration_ms` at `rate`.
    pub(crate) fn write_tone(dir: &Path, name: &str, duration_ms: u64, rate: u32) -> PathBuf {
        let frames = crate::models::audio_models::frames_for_ms(duration_ms, rate);
        let samples: Vec<f32> = (0..frames).map(|i| ((i as f32) * 0.03).sin() * 0.4).collect();
        let path = dir.join(name);
        fs::write(&path, wav_format::encode_wav(&AudioClip::new(samples, rate, 1), 16).unwrap()).unwrap();
        path
    }

    fn scratch_entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    fn loader(scratch: &Path) -> ClipLoader {
        ClipLoader::new(&PipelineConfiguration {
            scratch_directory: scratch.to_path_buf(),
            ..Default::default()
        })
    }

    #[test]
    fn path_input_is_decoded_and_conformed() {
        let fixtures = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = write_tone(fixtures.path(), "page.wav", 2000, 22050);

        let loaded = loader(scratch.path()).load(ClipInput::path(&path)).unwrap();

        assert_eq!(loaded.duration_ms, 2000);
        assert_eq!(loaded.clip.sample_rate, 44100);
        assert_eq!(loaded.clip.channels, 2);
        assert!(path.exists(), "caller-owned path must not be deleted");
    }

    #[test]
    fn missing_path_is_reported() {
        let scratch = tempfile::tempdir().unwrap();
        let err = loader(scratch.path())
            .load(ClipInput::path("/nonexistent/page_2.mp3"))
            .unwrap_err();
        assert_eq!(err, PipelineError::MissingSource("/nonexistent/page_2.mp3".into()));
    }

    #[test]
    fn stream_scratch_file_is_removed_after_decode() {
        let fixtures = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let bytes = fs::read(write_tone(fixtures.path(), "upload.wav", 1500, 44100)).unwrap();

        let loaded = loader(scratch.path())
            .load(ClipInput::stream("upload.wav", Cursor::new(bytes)))
            .unwrap();

        assert_eq!(loaded.duration_ms, 1500);
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[test]
    fn stream_scratch_file_is_removed_after_failure() {
        let scratch = tempfile::tempdir().unwrap();

        let err = loader(scratch.path())
            .load(ClipInput::stream("voice.mp3", Cursor::new(b"garbage".to_vec())))
            .unwrap_err();

        assert!(matches!(err, PipelineError::Decode { .. }));
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[test]
    fn decoded_input_is_conformed() {
        let scratch = tempfile::tempdir().unwrap();
        let clip = AudioClip::new(vec![0.2; 48000], 48000, 1);

        let loaded = loader(scratch.path()).load(ClipInput::Decoded(clip)).unwrap();

        assert_eq!(loaded.clip.sample_rate, 44100);
        assert_eq!(loaded.clip.channels, 2);
        assert_eq!(loaded.duration_ms, 1000);
    }
}
