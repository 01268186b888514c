use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_models::AudioClip;
use crate::models::config::PipelineConfiguration;
use crate::models::error::PipelineError;
use crate::processing::wav_format;

/// Frames encoded per `write_samples` chunk when writing a whole clip.
const WRITE_CHUNK_FRAMES: usize = 64 * 1024;

/// Streaming PCM WAV writer for finished episodes.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header, sizes patched on close]
/// [little-endian PCM data...]
/// ```
///
/// Dropping an open writer, or calling `abort`, removes the partial file.
pub struct EpisodeWriter {
    file_path: PathBuf,
    file: Option<BufWriter<File>>,
    bit_depth: u16,
    total_bytes_written: u64,
}

impl EpisodeWriter {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            file: None,
            bit_depth: 16,
            total_bytes_written: 0,
        }
    }

    /// Open the file and write the initial 44-byte WAV header.
    pub fn open(&mut self, sample_rate: u32, bit_depth: u16, channels: u16) -> Result<(), PipelineError> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::StorageError(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| PipelineError::StorageError(format!("failed to create file: {}", e)))?;
        self.file = Some(BufWriter::new(file));
        self.bit_depth = bit_depth;
        self.total_bytes_written = 0;

        // Data size placeholder, patched on close.
        let header = wav_format::generate_wav_header(sample_rate, bit_depth, channels, 0);
        self.write(&header)
    }

    /// Encode interleaved float samples at the writer's bit depth and append them.
    pub fn write_samples(&mut self, samples: &[f32]) -> Result<(), PipelineError> {
        let pcm = wav_format::encode_pcm(samples, self.bit_depth)?;
        self.write(&pcm)
    }

    /// Append already encoded bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<(), PipelineError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| PipelineError::StorageError("file is not open for writing".into()))?;
        file.write_all(data)
            .map_err(|e| PipelineError::StorageError(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }

    /// Finalize the file: patch the WAV header sizes and return the SHA-256 checksum.
    pub fn close(&mut self) -> Result<String, PipelineError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| PipelineError::StorageError("file is not open".into()))?;

        let data_size = self.total_bytes_written - wav_format::WAV_HEADER_SIZE as u64;
        if data_size > u32::MAX as u64 - wav_format::WAV_HEADER_SIZE as u64 {
            self.remove_partial();
            return Err(PipelineError::EncodingFailed(format!(
                "{} bytes of audio do not fit in a WAV file",
                data_size
            )));
        }

        let patched = patch_sizes(&mut file, self.total_bytes_written as u32 - 8, data_size as u32);
        if let Err(e) = patched {
            self.remove_partial();
            return Err(PipelineError::StorageError(format!("failed to finalize {}: {}", self.file_path.display(), e)));
        }
        drop(file);

        sha256_file(&self.file_path)
    }

    /// Drop the partially written file.
    pub fn abort(&mut self) {
        self.file = None;
        self.remove_partial();
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Total bytes written so far (including WAV header).
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn remove_partial(&self) {
        if let Err(e) = fs::remove_file(&self.file_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove partial file {}: {}", self.file_path.display(), e);
            }
        }
    }
}

impl Drop for EpisodeWriter {
    fn drop(&mut self) {
        if self.file.is_some() {
            self.abort();
        }
    }
}

fn patch_sizes(file: &mut BufWriter<File>, riff_size: u32, data_size: u32) -> std::io::Result<()> {
    file.flush()?;
    let file = file.get_mut();
    // RIFF chunk size at offset 4, data chunk size at offset 40.
    file.seek(SeekFrom::Start(4))?;
    file.write_all(&riff_size.to_le_bytes())?;
    file.seek(SeekFrom::Start(40))?;
    file.write_all(&data_size.to_le_bytes())?;
    file.sync_all()
}

/// Name for a new episode file: `episode_{uuid}.wav`.
pub fn episode_file_name() -> String {
    format!("episode_{}.wav", uuid::Uuid::new_v4())
}

/// Write a whole clip to a fresh episode file in the configured output directory.
///
/// Returns the file path and its checksum. Nothing is left behind on failure.
pub fn write_episode(clip: &AudioClip, config: &PipelineConfiguration) -> Result<(PathBuf, String), PipelineError> {
    let path = config.output_directory.join(episode_file_name());
    let mut writer = EpisodeWriter::new(path.clone());
    writer.open(clip.sample_rate, config.bit_depth, clip.channels)?;

    let chunk = WRITE_CHUNK_FRAMES * clip.channels.max(1) as usize;
    for samples in clip.samples.chunks(chunk) {
        // On error the writer drops open and removes the file.
        writer.write_samples(samples)?;
    }

    let checksum = writer.close()?;
    log::info!(
        "Wrote {} ({} bytes, sha256 {})",
        path.display(),
        writer.bytes_written(),
        checksum
    );
    Ok((path, checksum))
}

/// Duration of a finished WAV file, read from its header.
pub fn measure_duration_ms(path: &Path) -> Result<u64, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::StorageError(format!("failed to open {}: {}", path.display(), e)))?;
    let mut head = Vec::with_capacity(4096);
    file.take(4096)
        .read_to_end(&mut head)
        .map_err(|e| PipelineError::StorageError(format!("failed to read {}: {}", path.display(), e)))?;
    Ok(wav_format::read_wav_info(&head)?.duration_ms())
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, PipelineError> {
    let data =
        fs::read(path).map_err(|e| PipelineError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
