use crate::models::audio_models::AudioClip;
use crate::processing::conform::FormatConformer;

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

/// Clamp a requested playback speed; non-finite values mean normal speed.
pub fn clamp_speed(speed: f32) -> f32 {
    if !speed.is_finite() {
        return 1.0;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

/// Change playback speed by reinterpreting the sample rate and resampling back.
///
/// Pitch follows speed. Speeds within 1% of normal return the clip unchanged.
pub fn change_speed(clip: AudioClip, speed: f32) -> AudioClip {
    let speed = clamp_speed(speed);
    if (speed - 1.0).abs() <= 0.01 || clip.is_empty() {
        return clip;
    }
    let played_rate = (clip.sample_rate as f32 * speed).round() as u32;
    let conformer = FormatConformer::new(clip.sample_rate, clip.channels);
    let samples = conformer.resample(&clip.samples, played_rate);
    AudioClip::new(samples, clip.sample_rate, clip.channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(clamp_speed(3.0), 2.0);
        assert_eq!(clamp_speed(0.1), 0.5);
        assert_eq!(clamp_speed(f32::NAN), 1.0);
        assert_eq!(clamp_speed(1.25), 1.25);
    }

    #[test]
    fn double_speed_halves_duration() {
        let clip = AudioClip::new(vec![0.0; 44100], 44100, 1);
        let faster = change_speed(clip, 2.0);
        assert_eq!(faster.sample_rate, 44100);
        assert_eq!(faster.duration_ms(), 500);
    }

    #[test]
    fn half_speed_doubles_duration() {
        let clip = AudioClip::new(vec![0.0; 2 * 22050], 22050, 2);
        let slower = change_speed(clip, 0.5);
        assert_eq!(slower.channels, 2);
        assert_eq!(slower.duration_ms(), 2000);
    }

    #[test]
    fn near_unity_is_untouched() {
        let clip = AudioClip::new(vec![0.3; 100], 8000, 1);
        assert_eq!(change_speed(clip.clone(), 1.005), clip);
    }
}
