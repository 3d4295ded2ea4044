//! IIR (biquad) and FIR filtering, Direct Form I, with per-channel delay lines.

use crate::errors::{ParamError, StateError};
use crate::kernels::design::{self, FilterMode};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Biquad,
    Fir,
}

/// Per-channel Direct-Form-I delay line: past inputs and (for IIR) past outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterChannelState {
    #[serde(rename = "xHistory")]
    pub x_history: Vec<f32>,
    #[serde(rename = "yHistory")]
    pub y_history: Vec<f32>,
}

impl FilterChannelState {
    fn new(x_len: usize, y_len: usize) -> Self {
        Self {
            x_history: vec![0.0; x_len],
            y_history: vec![0.0; y_len],
        }
    }
}

/// Fixed-coefficient filter stage. `b` drives the feedforward (input) taps,
/// `a` the feedback (output) taps (`a` is `[1.0]` for FIR, which has no
/// feedback path).
#[derive(Debug, Clone)]
pub struct FilterStage {
    pub kind: FilterKind,
    pub filter_mode: FilterMode,
    pub cutoff_frequency: f64,
    pub sample_rate: f64,
    pub order: Option<usize>,
    pub q: Option<f64>,
    b: Vec<f32>,
    a: Vec<f32>,
    channels: Option<Vec<FilterChannelState>>,
}

impl FilterStage {
    pub const TAG: &'static str = "filter";

    pub fn biquad(filter_mode: FilterMode, cutoff_frequency: f64, sample_rate: f64, q: f64) -> Result<Self, ParamError> {
        Self::validate_common(cutoff_frequency, sample_rate)?;
        let (b, a) = design::biquad_coeffs(filter_mode, cutoff_frequency, sample_rate, q);
        Ok(Self {
            kind: FilterKind::Biquad,
            filter_mode,
            cutoff_frequency,
            sample_rate,
            order: None,
            q: Some(q),
            b,
            a,
            channels: None,
        })
    }

    pub fn fir(filter_mode: FilterMode, cutoff_frequency: f64, sample_rate: f64, order: usize) -> Result<Self, ParamError> {
        Self::validate_common(cutoff_frequency, sample_rate)?;
        if order == 0 {
            return Err(ParamError::OrderInvalid);
        }
        let b = design::fir_windowed_sinc(filter_mode, order, cutoff_frequency, sample_rate);
        Ok(Self {
            kind: FilterKind::Fir,
            filter_mode,
            cutoff_frequency,
            sample_rate,
            order: Some(order),
            q: None,
            b,
            a: vec![1.0],
            channels: None,
        })
    }

    fn validate_common(cutoff_frequency: f64, sample_rate: f64) -> Result<(), ParamError> {
        if !(sample_rate > 0.0) {
            return Err(ParamError::SampleRateNotPositive);
        }
        if !(cutoff_frequency > 0.0 && cutoff_frequency < sample_rate / 2.0) {
            return Err(ParamError::CutoffOutOfRange);
        }
        Ok(())
    }

    pub fn params_value(&self) -> Value {
        match self.kind {
            FilterKind::Biquad => json!({
                "kind": "biquad",
                "mode": if self.filter_mode == FilterMode::Lowpass { "lowpass" } else { "highpass" },
                "cutoffFrequency": self.cutoff_frequency,
                "sampleRate": self.sample_rate,
                "q": self.q,
            }),
            FilterKind::Fir => json!({
                "kind": "fir",
                "mode": if self.filter_mode == FilterMode::Lowpass { "lowpass" } else { "highpass" },
                "cutoffFrequency": self.cutoff_frequency,
                "sampleRate": self.sample_rate,
                "order": self.order,
            }),
        }
    }

    pub fn reset(&mut self) {
        self.channels = None;
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) {
        let x_len = self.b.len();
        let y_len = self.a.len() - 1;
        let channels = self
            .channels
            .get_or_insert_with(|| vec![FilterChannelState::new(x_len, y_len); planar.len()]);

        for (state, samples) in channels.iter_mut().zip(planar.iter_mut()) {
            for sample in samples.iter_mut() {
                let x0 = *sample;

                let mut acc = self.b[0] as f64 * x0 as f64;
                for k in 1..self.b.len() {
                    acc += self.b[k] as f64 * state.x_history[k - 1] as f64;
                }
                for k in 1..self.a.len() {
                    acc -= self.a[k] as f64 * state.y_history[k - 1] as f64;
                }

                for k in (1..x_len).rev() {
                    state.x_history[k] = state.x_history[k - 1];
                }
                if x_len > 0 {
                    state.x_history[0] = x0;
                }

                for k in (1..y_len).rev() {
                    state.y_history[k] = state.y_history[k - 1];
                }
                if y_len > 0 {
                    state.y_history[0] = acc as f32;
                }

                *sample = acc as f32;
            }
        }
    }

    pub fn save_state(&self) -> Value {
        match &self.channels {
            Some(channels) => json!(channels),
            None => Value::Null,
        }
    }

    pub fn validate_load(&self, state: &Value) -> Result<Vec<FilterChannelState>> {
        if state.is_null() {
            return Ok(Vec::new());
        }
        let channels: Vec<FilterChannelState> = serde_json::from_value(state.clone())
            .map_err(|e| StateError::MalformedState {
                tag: Self::TAG,
                reason: e.to_string(),
            })?;

        let x_len = self.b.len();
        let y_len = self.a.len() - 1;
        for channel in &channels {
            if channel.x_history.len() != x_len || channel.y_history.len() != y_len {
                anyhow::bail!(StateError::WindowMismatch);
            }
        }

        Ok(channels)
    }

    pub fn apply_load(&mut self, channels: Vec<FilterChannelState>) {
        self.channels = if channels.is_empty() {
            None
        } else {
            Some(channels)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_cutoff_at_or_above_nyquist() {
        assert!(FilterStage::biquad(FilterMode::Lowpass, 24000.0, 48000.0, 0.707).is_err());
        assert!(FilterStage::biquad(FilterMode::Lowpass, 0.0, 48000.0, 0.707).is_err());
    }

    #[test]
    fn rejects_zero_order_fir() {
        assert!(FilterStage::fir(FilterMode::Lowpass, 1000.0, 48000.0, 0).is_err());
    }

    #[test]
    fn biquad_lowpass_attenuates_constant_free_of_dc_bias() {
        let mut stage = FilterStage::biquad(FilterMode::Lowpass, 1000.0, 48000.0, 0.707).unwrap();
        let mut planar = vec![vec![1.0; 500]];
        stage.process(&mut planar);
        // DC should pass with gain ~1 after settling.
        assert!((planar[0][499] - 1.0).abs() < 0.05);
    }

    #[test]
    fn fir_lowpass_settles_to_unity_dc_gain() {
        let mut stage = FilterStage::fir(FilterMode::Lowpass, 1000.0, 48000.0, 32).unwrap();
        let mut planar = vec![vec![1.0; 200]];
        stage.process(&mut planar);
        assert!((planar[0][199] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn splice_invariance_holds() {
        let mut whole = FilterStage::biquad(FilterMode::Lowpass, 1000.0, 48000.0, 0.707).unwrap();
        let mut one_shot = vec![vec![1.0, 0.5, -0.5, 0.25, -0.25, 0.1]];
        whole.process(&mut one_shot);

        let mut spliced = FilterStage::biquad(FilterMode::Lowpass, 1000.0, 48000.0, 0.707).unwrap();
        let mut first = vec![vec![1.0, 0.5, -0.5]];
        spliced.process(&mut first);
        let mut second = vec![vec![0.25, -0.25, 0.1]];
        spliced.process(&mut second);

        for (got, want) in first[0].iter().zip(one_shot[0][..3].iter()) {
            assert!((got - want).abs() < 1e-6);
        }
        for (got, want) in second[0].iter().zip(one_shot[0][3..].iter()) {
            assert!((got - want).abs() < 1e-6);
        }
    }
}
