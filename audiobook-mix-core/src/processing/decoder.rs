//! Audio file decoding via symphonia.
//!
//! Produces interleaved `f32` samples at the file's native rate and
//! channel count. Format conversion happens afterwards in `conform`.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::models::audio_models::AudioClip;
use crate::models::error::PipelineError;

/// Decode an entire audio file into memory.
///
/// `source_name` labels errors and logs; it is the caller-facing name of
/// the input, which may differ from `path` for staged uploads.
pub fn decode_file(path: &Path, source_name: &str) -> Result<AudioClip, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::decode(source_name, format!("failed to open: {}", e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PipelineError::decode(source_name, format!("unrecognized format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::decode(source_name, "no audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::decode(source_name, format!("unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PipelineError::decode(source_name, format!("failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt packets are skipped; the stream may still be usable.
            Err(SymphoniaError::DecodeError(reason)) => {
                skipped_packets += 1;
                log::debug!("{}: skipping undecodable packet: {}", source_name, reason);
            }
            Err(e) => return Err(PipelineError::decode(source_name, e)),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(PipelineError::decode(source_name, "unknown sample rate or channel layout"));
    }
    if samples.is_empty() {
        return Err(PipelineError::decode(source_name, "no audio frames"));
    }
    if skipped_packets > 0 {
        log::warn!("{}: skipped {} undecodable packets", source_name, skipped_packets);
    }

    let clip = AudioClip::new(samples, sample_rate, channels);
    log::debug!(
        "Decoded {}: {} frames, {} Hz, {} ch ({}ms)",
        source_name,
        clip.frames(),
        sample_rate,
        channels,
        clip.duration_ms()
    );
    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::wav_format;
    use std::fs;

    #[test]
    fn decodes_wav_written_by_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..8000).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
        let clip = AudioClip::new(samples, 8000, 1);
        fs::write(&path, wav_format::encode_wav(&clip, 16).unwrap()).unwrap();

        let decoded = decode_file(&path, "tone.wav").unwrap();

        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.frames(), 8000);
        assert_eq!(decoded.duration_ms(), 1000);
        assert!((decoded.samples[100] - clip.samples[100]).abs() < 1e-3);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        fs::write(&path, b"this is not audio at all").unwrap();

        let err = decode_file(&path, "broken.mp3").unwrap_err();
        assert!(matches!(err, PipelineError::Decode { ref source_name, .. } if source_name == "broken.mp3"));
    }
}
