//! Analytic-signal envelope via frame-wise Hilbert transform and overlap-add.
//!
//! Stateless across calls: each `process` batch is windowed and overlap-added
//! entirely within itself, so there is nothing to save or load. With
//! `hopSize <= windowSize` every output sample falls under at least one
//! frame (the first frame alone covers the whole leading window), so the
//! overlap-add weight is never zero.

use crate::errors::ParamError;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde_json::{Value, json};

fn analytic_envelope(frame: &[f32], planner: &mut FftPlanner<f32>) -> Vec<f32> {
    let n = frame.len();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut spectrum: Vec<Complex<f32>> = frame.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft.process(&mut spectrum);

    let half = n / 2;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        if k == 0 || (n % 2 == 0 && k == half) {
            // DC and (for even N) Nyquist keep unit weight.
        } else if k < half || (n % 2 != 0 && k <= half) {
            *bin *= 2.0;
        } else {
            *bin = Complex::new(0.0, 0.0);
        }
    }

    ifft.process(&mut spectrum);
    let norm = 1.0 / n as f32;
    spectrum.iter().map(|c| (c * norm).norm()).collect()
}

#[derive(Debug, Clone)]
pub struct HilbertEnvelopeStage {
    pub window_size: usize,
    pub hop_size: usize,
}

impl HilbertEnvelopeStage {
    pub const TAG: &'static str = "hilbertEnvelope";

    pub fn new(window_size: usize, hop_size: Option<usize>) -> Result<Self, ParamError> {
        if window_size == 0 {
            return Err(ParamError::WindowSizeNotPositive);
        }
        let hop_size = hop_size.unwrap_or(window_size);
        if hop_size == 0 || hop_size > window_size {
            return Err(ParamError::HopSizeOutOfRange);
        }
        Ok(Self {
            window_size,
            hop_size,
        })
    }

    pub fn params_value(&self) -> Value {
        json!({ "windowSize": self.window_size, "hopSize": self.hop_size })
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) {
        let mut planner = FftPlanner::new();

        for channel in planar.iter_mut() {
            let len = channel.len();
            if len == 0 {
                continue;
            }

            let mut out_acc = vec![0.0f32; len];
            let mut weight = vec![0.0f32; len];

            let mut start = 0usize;
            loop {
                let frame_len = self.window_size.min(len - start);
                let mut frame = vec![0.0f32; self.window_size];
                frame[..frame_len].copy_from_slice(&channel[start..start + frame_len]);

                let envelope = analytic_envelope(&frame, &mut planner);
                for i in 0..frame_len {
                    out_acc[start + i] += envelope[i];
                    weight[start + i] += 1.0;
                }

                if start + frame_len >= len {
                    break;
                }
                start += self.hop_size;
            }

            for i in 0..len {
                channel[i] = if weight[i] > 0.0 {
                    out_acc[i] / weight[i]
                } else {
                    0.0
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_window() {
        assert!(HilbertEnvelopeStage::new(0, None).is_err());
    }

    #[test]
    fn rejects_hop_out_of_range() {
        assert!(HilbertEnvelopeStage::new(16, Some(0)).is_err());
        assert!(HilbertEnvelopeStage::new(16, Some(17)).is_err());
    }

    #[test]
    fn output_length_matches_input_length() {
        let mut stage = HilbertEnvelopeStage::new(16, Some(8)).unwrap();
        let input: Vec<f32> = (0..40).map(|i| (i as f32 * 0.2).sin()).collect();
        let original_len = input.len();
        let mut planar = vec![input];
        stage.process(&mut planar);
        assert_eq!(planar[0].len(), original_len);
    }

    #[test]
    fn envelope_tracks_amplitude_modulated_carrier() {
        let mut stage = HilbertEnvelopeStage::new(32, Some(8)).unwrap();
        // A carrier at high frequency, modulated by a slow envelope ramping 0.2 -> 1.0.
        let n = 256;
        let input: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f32;
                let envelope = 0.2 + 0.8 * (t / n as f32);
                envelope * (t * 0.8).sin()
            })
            .collect();
        let mut planar = vec![input];
        stage.process(&mut planar);

        let early: f32 = planar[0][16..48].iter().sum::<f32>() / 32.0;
        let late: f32 = planar[0][200..232].iter().sum::<f32>() / 32.0;
        assert!(late > early, "expected envelope to grow: {early} vs {late}");
        assert!(planar[0].iter().all(|&x| x >= -1e-3));
    }
}
