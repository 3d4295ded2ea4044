//! Filter coefficient design: RBJ cookbook biquads and windowed-sinc FIR taps.
//!
//! Pure functions with no stage state; [`crate::kernels::filter`] consumes
//! their output as the fixed `b`/`a` (or `b`-only, for FIR) coefficient
//! vectors of a Direct-Form-I filter.

use std::f64::consts::PI;

/// Lowpass/highpass selector shared by both design families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Lowpass,
    Highpass,
}

/// Second-order RBJ audio-EQ-cookbook biquad: returns `(b, a)` each of length 3,
/// normalized so `a[0] == 1.0`.
pub fn biquad_coeffs(mode: FilterMode, cutoff: f64, sample_rate: f64, q: f64) -> (Vec<f32>, Vec<f32>) {
    let omega = 2.0 * PI * cutoff / sample_rate;
    let sin_omega = omega.sin();
    let cos_omega = omega.cos();
    let alpha = sin_omega / (2.0 * q);

    let (b0, b1, b2, a0, a1, a2) = match mode {
        FilterMode::Lowpass => {
            let b1 = 1.0 - cos_omega;
            let b0 = b1 / 2.0;
            let b2 = b0;
            let a0 = 1.0 + alpha;
            let a1 = -2.0 * cos_omega;
            let a2 = 1.0 - alpha;
            (b0, b1, b2, a0, a1, a2)
        }
        FilterMode::Highpass => {
            let b0 = (1.0 + cos_omega) / 2.0;
            let b1 = -(1.0 + cos_omega);
            let b2 = b0;
            let a0 = 1.0 + alpha;
            let a1 = -2.0 * cos_omega;
            let a2 = 1.0 - alpha;
            (b0, b1, b2, a0, a1, a2)
        }
    };

    let b = vec![(b0 / a0) as f32, (b1 / a0) as f32, (b2 / a0) as f32];
    let a = vec![1.0f32, (a1 / a0) as f32, (a2 / a0) as f32];
    (b, a)
}

/// Hamming-windowed-sinc FIR taps of length `order + 1`. Highpass is obtained
/// by spectral inversion of the lowpass design (negate, add 1 at the center tap).
pub fn fir_windowed_sinc(mode: FilterMode, order: usize, cutoff: f64, sample_rate: f64) -> Vec<f32> {
    let n = order + 1;
    let fc = cutoff / sample_rate;
    let m = (n - 1) as f64;
    let center = m / 2.0;

    let mut taps: Vec<f64> = (0..n)
        .map(|i| {
            let k = i as f64 - center;
            let sinc = if k.abs() < 1e-12 {
                2.0 * fc
            } else {
                (2.0 * PI * fc * k).sin() / (PI * k)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / m).cos();
            sinc * window
        })
        .collect();

    let sum: f64 = taps.iter().sum();
    if sum.abs() > 1e-12 {
        for t in taps.iter_mut() {
            *t /= sum;
        }
    }

    if mode == FilterMode::Highpass {
        for t in taps.iter_mut() {
            *t = -*t;
        }
        let center_idx = (n - 1) / 2;
        taps[center_idx] += 1.0;
    }

    taps.into_iter().map(|t| t as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biquad_lowpass_is_normalized() {
        let (b, a) = biquad_coeffs(FilterMode::Lowpass, 1000.0, 48000.0, 0.707);
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);
        assert_eq!(a[0], 1.0);
    }

    #[test]
    fn biquad_lowpass_passes_dc() {
        // At DC (z=1), H(1) = (b0+b1+b2) / (a0+a1+a2) should be ~1 for a lowpass.
        let (b, a) = biquad_coeffs(FilterMode::Lowpass, 500.0, 48000.0, 0.707);
        let num: f32 = b.iter().sum();
        let den: f32 = a.iter().sum();
        assert!((num / den - 1.0).abs() < 1e-3);
    }

    #[test]
    fn fir_lowpass_taps_sum_to_one() {
        let taps = fir_windowed_sinc(FilterMode::Lowpass, 32, 1000.0, 48000.0);
        assert_eq!(taps.len(), 33);
        let sum: f32 = taps.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn fir_highpass_blocks_dc() {
        let taps = fir_windowed_sinc(FilterMode::Highpass, 32, 1000.0, 48000.0);
        let sum: f32 = taps.iter().sum();
        assert!(sum.abs() < 1e-3);
    }
}
