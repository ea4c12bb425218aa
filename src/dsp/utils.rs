pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

pub fn db_to_gain(db: f32) -> f32 {
    (10.0f32).powf(db / 20.0)
}

/// Multiplies the first `frames` samples of every planar channel by `gain`.
///
/// Channels shorter than `frames` are processed up to their own length.
#[inline]
pub fn scale_planar(channels: &mut [&mut [f32]], frames: usize, gain: f32) {
    for channel in channels.iter_mut() {
        let len = frames.min(channel.len());
        for sample in &mut channel[..len] {
            *sample *= gain;
        }
    }
}

#[inline]
pub fn scale_interleaved(samples: &mut [f32], gain: f32) {
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_to_gain_reference_points() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-20.0) - 0.1).abs() < 1e-6);
        assert!((db_to_gain(-100.0) - 1e-5).abs() < 1e-9);
    }

    #[test]
    fn test_lerp_clamps_t() {
        assert_eq!(lerp(1.0, 3.0, 0.5), 2.0);
        assert_eq!(lerp(1.0, 3.0, 2.0), 3.0);
        assert_eq!(lerp(1.0, 3.0, -1.0), 1.0);
    }

    #[test]
    fn test_scale_planar_respects_frame_count() {
        let mut left = [1.0f32, 1.0, 1.0];
        let mut right = [2.0f32, 2.0];
        {
            let mut channels: [&mut [f32]; 2] = [&mut left, &mut right];
            scale_planar(&mut channels, 2, 0.5);
        }
        assert_eq!(left, [0.5, 0.5, 1.0]);
        assert_eq!(right, [1.0, 1.0]);
    }

    #[test]
    fn test_scale_interleaved() {
        let mut samples = [1.0f32, -1.0, 0.5, -0.5];
        scale_interleaved(&mut samples, 0.5);
        assert_eq!(samples, [0.5, -0.5, 0.25, -0.25]);
    }
}
