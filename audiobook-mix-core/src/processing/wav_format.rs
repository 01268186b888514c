//! WAV file format utilities.
//!
//! Generates standard 44-byte RIFF WAV headers, converts float samples to
//! integer PCM, and reads the format back from a finished file so the
//! episode duration can be measured from what was actually written.

use crate::models::audio_models::{ms_for_frames, AudioClip};
use crate::models::error::PipelineError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(sample_rate: u32, bit_depth: u16, channels: u16, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * channels as u32 * bit_depth as u32 / 8;
    let block_align = channels * bit_depth / 8;
    let chunk_size = 36 + data_size;

    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Convert f32 samples `[-1.0, 1.0]` to little-endian integer PCM.
///
/// Clamps out-of-range values. Supports 16- and 24-bit output.
pub fn encode_pcm(samples: &[f32], bit_depth: u16) -> Result<Vec<u8>, PipelineError> {
    match bit_depth {
        16 => {
            let mut data = Vec::with_capacity(samples.len() * 2);
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                data.extend_from_slice(&value.to_le_bytes());
            }
            Ok(data)
        }
        24 => {
            const MAX_24: f32 = 8_388_607.0;
            let mut data = Vec::with_capacity(samples.len() * 3);
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) * MAX_24) as i32;
                data.extend_from_slice(&value.to_le_bytes()[0..3]);
            }
            Ok(data)
        }
        other => Err(PipelineError::EncodingFailed(format!("unsupported bit depth: {}", other))),
    }
}

/// Encode a whole clip as an in-memory WAV file.
pub fn encode_wav(clip: &AudioClip, bit_depth: u16) -> Result<Vec<u8>, PipelineError> {
    let pcm = encode_pcm(&clip.samples, bit_depth)?;
    let data_size = u32::try_from(pcm.len())
        .map_err(|_| PipelineError::EncodingFailed("audio too long for a WAV file".into()))?;
    let header = generate_wav_header(clip.sample_rate, bit_depth, clip.channels, data_size);
    let mut bytes = Vec::with_capacity(WAV_HEADER_SIZE + pcm.len());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&pcm);
    Ok(bytes)
}

/// Format fields read back from a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub data_size: u32,
}

impl WavInfo {
    pub fn frames(&self) -> usize {
        let block_align = self.channels as usize * self.bit_depth as usize / 8;
        if block_align == 0 {
            return 0;
        }
        self.data_size as usize / block_align
    }

    pub fn duration_ms(&self) -> u64 {
        ms_for_frames(self.frames(), self.sample_rate)
    }
}

/// Parse the `fmt ` and `data` chunks of a RIFF/WAVE file.
pub fn read_wav_info(bytes: &[u8]) -> Result<WavInfo, PipelineError> {
    let invalid = |reason: &str| PipelineError::EncodingFailed(format!("invalid WAV file: {}", reason));

    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(invalid("missing RIFF/WAVE magic"));
    }

    let mut format: Option<(u16, u32, u16)> = None;
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = u32::from_le_bytes([bytes[offset + 4], bytes[offset + 5], bytes[offset + 6], bytes[offset + 7]]);
        let body = offset + 8;

        if id == b"fmt " {
            if body + 16 > bytes.len() {
                return Err(invalid("truncated fmt chunk"));
            }
            let channels = u16::from_le_bytes([bytes[body + 2], bytes[body + 3]]);
            let sample_rate =
                u32::from_le_bytes([bytes[body + 4], bytes[body + 5], bytes[body + 6], bytes[body + 7]]);
            let bit_depth = u16::from_le_bytes([bytes[body + 14], bytes[body + 15]]);
            format = Some((channels, sample_rate, bit_depth));
        } else if id == b"data" {
            let (channels, sample_rate, bit_depth) = format.ok_or_else(|| invalid("data chunk before fmt chunk"))?;
            return Ok(WavInfo {
                sample_rate,
                channels,
                bit_depth,
                data_size: size,
            });
        }

        // Chunks are word-aligned.
        offset = body + size as usize + (size as usize & 1);
    }

    Err(invalid("missing data chunk"))
}
