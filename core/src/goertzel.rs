use std::f64::consts::PI;

/// Nearest DFT bin to `freq` for a transform of `n` samples.
pub fn nearest_bin(n: usize, freq: f64, sample_rate: f64) -> usize {
    (0.5 + n as f64 * freq / sample_rate) as usize
}

/// Magnitude of the DFT bin nearest to `freq`, using the Goertzel recurrence
///
/// Cheaper than a full transform when only a couple of bins are needed.
pub fn bin_magnitude(samples: &[f32], freq: f64, sample_rate: f64) -> f32 {
    let n = samples.len();
    if n == 0 {
        return 0.0;
    }

    let k = nearest_bin(n, freq, sample_rate);
    let omega = 2.0 * PI * k as f64 / n as f64;
    let coeff = 2.0 * omega.cos();

    let mut q1 = 0.0f64;
    let mut q2 = 0.0f64;

    for &sample in samples {
        let q0 = coeff * q1 - q2 + sample as f64;
        q2 = q1;
        q1 = q0;
    }

    let real = q1 - q2 * omega.cos();
    let imag = q2 * omega.sin();
    (real * real + imag * imag).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, n: usize, sample_rate: f64) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin() as f32)
            .collect()
    }

    #[test]
    fn test_nearest_bin() {
        // 44100 / 1024 = 43.07 Hz per bin
        assert_eq!(nearest_bin(1024, 1000.0, 44100.0), 23);
        assert_eq!(nearest_bin(1024, 1500.0, 44100.0), 35);
    }

    #[test]
    fn test_on_bin_tone_has_half_n_magnitude() {
        // 16 cycles in 1024 samples lands exactly on bin 16
        let sample_rate = 1024.0;
        let samples = tone(16.0, 1024, sample_rate);
        let magnitude = bin_magnitude(&samples, 16.0, sample_rate);
        assert!((magnitude - 512.0).abs() < 0.01, "magnitude {}", magnitude);
    }

    #[test]
    fn test_carrier_bins_are_separable() {
        let samples = tone(1000.0, 1024, 44100.0);
        let at_1000 = bin_magnitude(&samples, 1000.0, 44100.0);
        let at_1500 = bin_magnitude(&samples, 1500.0, 44100.0);
        assert!(at_1000 > 20.0 * at_1500, "{} vs {}", at_1000, at_1500);
    }

    #[test]
    fn test_silence_and_empty_input() {
        assert_eq!(bin_magnitude(&[], 1000.0, 44100.0), 0.0);
        assert_eq!(bin_magnitude(&[0.0; 256], 1000.0, 44100.0), 0.0);
    }
}
