//! Adaptive LMS/NLMS filter. Requires exactly two channels: channel 0 is the
//! reference input `x[n]`, channel 1 is the desired signal `d[n]`. The filter
//! predicts `d[n]` from a history of `x[n]`; the stage replaces channel 0
//! with the prediction error `e[n]` and passes channel 1 through unchanged.
//!
//! Unlike the other kernels, state here is a single filter instance shared
//! across the stage's two channels rather than one state per channel — the
//! filter taps describe the relationship between channel 0 and channel 1, not
//! a per-channel quantity.

use crate::errors::{ParamError, ProcessError, StateError};
use crate::kernels::running_value_matches;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmsState {
    pub weights: Vec<f32>,
    #[serde(rename = "refHistory")]
    pub ref_history: VecDeque<f32>,
    #[serde(rename = "runningEnergy")]
    pub running_energy: f32,
}

impl LmsState {
    fn new(num_taps: usize) -> Self {
        Self {
            weights: vec![0.0; num_taps],
            ref_history: VecDeque::from(vec![0.0f32; num_taps]),
            running_energy: 0.0,
        }
    }
}

/// `e[n] = d[n] - w · x_history`, with `w` adapted each sample by (N)LMS.
/// `lambda == 0.0` is plain LMS; `lambda > 0.0` enables a leakage term that
/// prevents weight blow-up on near-silent references.
#[derive(Debug, Clone)]
pub struct LmsFilterStage {
    pub num_taps: usize,
    pub learning_rate: f32,
    pub lambda: f32,
    pub normalized: bool,
    state: Option<LmsState>,
}

impl LmsFilterStage {
    pub const TAG: &'static str = "lmsFilter";

    pub fn new(num_taps: usize, learning_rate: f32, lambda: f32, normalized: bool) -> Result<Self, ParamError> {
        if num_taps == 0 {
            return Err(ParamError::NumTapsInvalid);
        }
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(ParamError::LearningRateOutOfRange);
        }
        if !(0.0..1.0).contains(&lambda) {
            return Err(ParamError::LambdaOutOfRange);
        }
        Ok(Self {
            num_taps,
            learning_rate,
            lambda,
            normalized,
            state: None,
        })
    }

    pub fn params_value(&self) -> Value {
        json!({
            "numTaps": self.num_taps,
            "learningRate": self.learning_rate,
            "lambda": self.lambda,
            "normalized": self.normalized,
        })
    }

    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) -> Result<()> {
        if planar.len() != 2 {
            anyhow::bail!(ProcessError::RequiresChannels(2));
        }
        let state = self.state.get_or_insert_with(|| LmsState::new(self.num_taps));

        let len = planar[0].len();
        for s in 0..len {
            let x = planar[0][s];
            let desired = planar[1][s];

            state.ref_history.push_front(x);
            state.ref_history.pop_back();

            let prediction: f32 = state
                .weights
                .iter()
                .zip(state.ref_history.iter())
                .map(|(&w, &r)| w * r)
                .sum();
            let error = desired - prediction;

            let step = if self.normalized {
                let energy: f32 = state.ref_history.iter().map(|&r| r * r).sum();
                self.learning_rate / (energy + 1e-6)
            } else {
                self.learning_rate
            };

            for (w, &r) in state.weights.iter_mut().zip(state.ref_history.iter()) {
                *w = *w * (1.0 - self.lambda) + step * error * r;
            }

            state.running_energy = state.ref_history.iter().map(|&r| r * r).sum();

            planar[0][s] = error;
        }

        Ok(())
    }

    pub fn save_state(&self) -> Value {
        match &self.state {
            Some(state) => json!(state),
            None => Value::Null,
        }
    }

    pub fn validate_load(&self, state: &Value) -> Result<Option<LmsState>> {
        if state.is_null() {
            return Ok(None);
        }
        let loaded: LmsState =
            serde_json::from_value(state.clone()).map_err(|e| StateError::MalformedState {
                tag: Self::TAG,
                reason: e.to_string(),
            })?;

        if loaded.weights.len() != self.num_taps || loaded.ref_history.len() != self.num_taps {
            anyhow::bail!(StateError::WindowMismatch);
        }
        let recomputed: f64 = loaded.ref_history.iter().map(|&r| (r as f64) * (r as f64)).sum();
        if !running_value_matches(recomputed, loaded.running_energy as f64) {
            anyhow::bail!(StateError::RunningSumInvalid);
        }

        Ok(Some(loaded))
    }

    pub fn apply_load(&mut self, state: Option<LmsState>) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_params() {
        assert!(LmsFilterStage::new(0, 0.1, 0.0, false).is_err());
        assert!(LmsFilterStage::new(4, 0.0, 0.0, false).is_err());
        assert!(LmsFilterStage::new(4, 0.1, 1.0, false).is_err());
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let mut stage = LmsFilterStage::new(4, 0.1, 0.0, true).unwrap();
        let mut planar = vec![vec![0.0; 4]];
        assert!(stage.process(&mut planar).is_err());
    }

    #[test]
    fn identifies_pure_delay_and_error_converges_toward_zero() {
        // Channel 0 is the reference x[n]; channel 1 is the desired signal
        // d[n] = x[n-1], a pure one-sample delay. An adaptive filter with
        // taps aligned on the delay should drive the prediction error toward
        // zero as weights converge.
        let mut stage = LmsFilterStage::new(4, 0.5, 0.0, true).unwrap();
        let x: Vec<f32> = (0..200).map(|i| ((i as f32) * 0.1).sin()).collect();
        let mut d = vec![0.0f32];
        d.extend_from_slice(&x[..x.len() - 1]);

        let mut planar = vec![x, d.clone()];
        stage.process(&mut planar).unwrap();

        let early_error: f32 = planar[0][5..15].iter().map(|e| e.abs()).sum();
        let late_error: f32 = planar[0][180..190].iter().map(|e| e.abs()).sum();
        assert!(late_error < early_error);

        // Channel 1 is passed through untouched.
        assert_eq!(planar[1], d);
    }

    #[test]
    fn splice_invariance_holds() {
        let x: Vec<f32> = (0..20).map(|i| (i as f32) * 0.05).collect();
        let mut d = vec![0.0f32];
        d.extend_from_slice(&x[..x.len() - 1]);

        let mut whole = LmsFilterStage::new(3, 0.3, 0.0, true).unwrap();
        let mut one_shot = vec![x.clone(), d.clone()];
        whole.process(&mut one_shot).unwrap();

        let mut spliced = LmsFilterStage::new(3, 0.3, 0.0, true).unwrap();
        let mut first = vec![x[..10].to_vec(), d[..10].to_vec()];
        spliced.process(&mut first).unwrap();
        let mut second = vec![x[10..].to_vec(), d[10..].to_vec()];
        spliced.process(&mut second).unwrap();

        for (got, want) in first[0].iter().zip(one_shot[0][..10].iter()) {
            assert!((got - want).abs() < 1e-5);
        }
        for (got, want) in second[0].iter().zip(one_shot[0][10..].iter()) {
            assert!((got - want).abs() < 1e-5);
        }
    }
}
