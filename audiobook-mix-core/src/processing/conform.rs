use crate::models::audio_models::AudioClip;

/// Brings decoded clips to the pipeline's sample rate and channel layout.
///
/// All operations are pure math on interleaved `f32` buffers.
/// Stereo targets duplicate mono input into both channels; mono targets
/// average all channels per frame.
#[derive(Debug, Clone)]
pub struct FormatConformer {
    pub target_sample_rate: u32,
    pub target_channels: u16,
}

impl FormatConformer {
    pub fn new(target_sample_rate: u32, target_channels: u16) -> Self {
        Self {
            target_sample_rate,
            target_channels,
        }
    }

    pub fn conform(&self, clip: AudioClip) -> AudioClip {
        if clip.sample_rate == self.target_sample_rate && clip.channels == self.target_channels {
            return clip;
        }
        let remixed = self.remix_channels(&clip.samples, clip.channels as usize);
        let resampled = self.resample(&remixed, clip.sample_rate);
        AudioClip::new(resampled, self.target_sample_rate, self.target_channels)
    }

    /// Convert interleaved audio with `channels` channels to the target layout.
    pub fn remix_channels(&self, samples: &[f32], channels: usize) -> Vec<f32> {
        let target = self.target_channels as usize;
        if channels == target || channels == 0 {
            return samples.to_vec();
        }
        if target == 1 {
            return downmix_to_mono(samples, channels);
        }
        if channels == 1 {
            return interleave(samples, samples);
        }

        // More than two source channels into stereo: keep the front pair.
        let frame_count = samples.len() / channels;
        let mut stereo = Vec::with_capacity(frame_count * 2);
        for frame in samples.chunks_exact(channels) {
            stereo.push(frame[0]);
            stereo.push(frame[1]);
        }
        stereo
    }

    /// Linear interpolation resampling for interleaved audio in the target layout.
    ///
    /// Returns input unchanged if rates match.
    pub fn resample(&self, samples: &[f32], source_sample_rate: u32) -> Vec<f32> {
        if source_sample_rate == self.target_sample_rate || source_sample_rate == 0 || samples.is_empty() {
            return samples.to_vec();
        }

        let channels = self.target_channels.max(1) as usize;
        let frame_count = samples.len() / channels;
        let ratio = self.target_sample_rate as f64 / source_sample_rate as f64;
        let output_frames = (frame_count as u64 * self.target_sample_rate as u64 / source_sample_rate as u64) as usize;
        if output_frames == 0 {
            return Vec::new();
        }

        let mut output = vec![0.0f32; output_frames * channels];
        for i in 0..output_frames {
            let source_index = i as f64 / ratio;
            let index = source_index as usize;
            let fraction = (source_index - index as f64) as f32;

            for ch in 0..channels {
                if index + 1 < frame_count {
                    output[i * channels + ch] = samples[index * channels + ch] * (1.0 - fraction)
                        + samples[(index + 1) * channels + ch] * fraction;
                } else if index < frame_count {
                    output[i * channels + ch] = samples[index * channels + ch];
                }
            }
        }
        output
    }
}

/// Interleave two mono channels into stereo `[L0, R0, L1, R1, ...]`.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    let frame_count = left.len().max(right.len());
    let mut stereo = vec![0.0f32; frame_count * 2];
    for i in 0..frame_count {
        stereo[i * 2] = left.get(i).copied().unwrap_or(0.0);
        stereo[i * 2 + 1] = right.get(i).copied().unwrap_or(0.0);
    }
    stereo
}

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_basic() {
        let result = interleave(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert_eq!(result, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn interleave_unequal_lengths() {
        let result = interleave(&[1.0, 2.0], &[4.0, 5.0, 6.0]);
        assert_eq!(result.len(), 6);
        assert_eq!(result[4], 0.0);
        assert_eq!(result[5], 6.0);
    }

    #[test]
    fn downmix_stereo_to_mono() {
        let mono = downmix_to_mono(&[0.2, 0.8, 0.4, 0.6], 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-6);
        assert!((mono[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mono_into_stereo_duplicates() {
        let conformer = FormatConformer::new(44100, 2);
        let clip = conformer.conform(AudioClip::new(vec![0.1, 0.2], 44100, 1));
        assert_eq!(clip.channels, 2);
        assert_eq!(clip.samples, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn surround_into_stereo_keeps_front_pair() {
        let conformer = FormatConformer::new(44100, 2);
        let frame = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let clip = conformer.conform(AudioClip::new(frame.to_vec(), 44100, 6));
        assert_eq!(clip.samples, vec![0.1, 0.2]);
    }

    #[test]
    fn same_format_is_passthrough() {
        let conformer = FormatConformer::new(48000, 2);
        let input = AudioClip::new(vec![1.0, 2.0, 3.0, 4.0], 48000, 2);
        assert_eq!(conformer.conform(input.clone()), input);
    }

    #[test]
    fn resample_upsample_2x() {
        let conformer = FormatConformer::new(48000, 1);
        let result = conformer.resample(&[0.0, 1.0], 24000);

        assert_eq!(result.len(), 4);
        assert!((result[0] - 0.0).abs() < 0.01);
        assert!((result[1] - 0.5).abs() < 0.1);
    }

    #[test]
    fn resample_stereo_downsample_keeps_duration() {
        let conformer = FormatConformer::new(22050, 2);
        let clip = conformer.conform(AudioClip::new(vec![0.0; 44100 * 2], 44100, 2));

        assert_eq!(clip.frames(), 22050);
        assert_eq!(clip.duration_ms(), 1000);
    }

    #[test]
    fn peak_level_basic() {
        assert!((peak_level(&[0.1, -0.5, 0.3]) - 0.5).abs() < 1e-6);
    }
}
