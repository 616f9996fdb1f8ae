//! Peak normalization.

/// Scale `samples` down so the absolute peak is at most `ceiling`.
///
/// Audio already under the ceiling is left untouched. Returns the applied
/// gain (1.0 when nothing changed).
pub fn normalize_peak(samples: &mut [f32], ceiling: f32) -> f32 {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= ceiling || peak == 0.0 {
        return 1.0;
    }

    let gain = ceiling / peak;
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
    gain
}

/// Linear gain in dB.
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(f32::MIN_POSITIVE).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quiet_audio_untouched() {
        let mut samples = vec![0.25, -0.5, 0.75];
        assert_eq!(normalize_peak(&mut samples, 1.0), 1.0);
        assert_eq!(samples, vec![0.25, -0.5, 0.75]);
    }

    #[test]
    fn test_hot_audio_scaled_to_ceiling() {
        let mut samples = vec![0.5, -2.0, 1.0];
        let gain = normalize_peak(&mut samples, 1.0);
        assert_relative_eq!(gain, 0.5);
        assert_relative_eq!(samples[1], -1.0);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_gain_to_db() {
        assert_relative_eq!(gain_to_db(1.0), 0.0);
        assert_relative_eq!(gain_to_db(0.5), -6.0206, epsilon = 1e-3);
    }
}
