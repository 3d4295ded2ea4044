//! Root-mean-square level detection: batch (stateless) and moving (windowed) modes.

use crate::errors::{ParamError, StateError};
use crate::kernels::running_value_matches;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;

/// Per-channel moving-RMS state: a window of squared samples plus their running sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmsChannelState {
    #[serde(rename = "squares")]
    pub squares: VecDeque<f32>,
    #[serde(rename = "runningSumOfSquares")]
    pub running_sum_of_squares: f32,
}

impl RmsChannelState {
    fn empty() -> Self {
        Self {
            squares: VecDeque::new(),
            running_sum_of_squares: 0.0,
        }
    }

    fn push(&mut self, window: usize, x: f32) -> f32 {
        let sq = x * x;
        self.squares.push_back(sq);
        self.running_sum_of_squares += sq;
        if self.squares.len() > window {
            if let Some(evicted) = self.squares.pop_front() {
                self.running_sum_of_squares -= evicted;
            }
        }
        (self.running_sum_of_squares / self.squares.len() as f32).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RmsMode {
    Batch,
    Moving,
}

/// `y = sqrt(mean(x^2))`, either over the whole batch (`Batch`, stateless) or
/// over a trailing window of samples that persists across batches (`Moving`).
#[derive(Debug, Clone)]
pub struct RmsStage {
    pub mode: RmsMode,
    pub window_size: Option<usize>,
    channels: Option<Vec<RmsChannelState>>,
}

impl RmsStage {
    pub const TAG: &'static str = "rms";

    pub fn batch() -> Self {
        Self {
            mode: RmsMode::Batch,
            window_size: None,
            channels: None,
        }
    }

    pub fn moving(window_size: usize) -> Result<Self, ParamError> {
        if window_size == 0 {
            return Err(ParamError::WindowSizeInvalid);
        }
        Ok(Self {
            mode: RmsMode::Moving,
            window_size: Some(window_size),
            channels: None,
        })
    }

    pub fn params_value(&self) -> Value {
        match self.mode {
            RmsMode::Batch => json!({ "mode": "batch" }),
            RmsMode::Moving => json!({ "mode": "moving", "windowSize": self.window_size }),
        }
    }

    pub fn reset(&mut self) {
        self.channels = None;
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) {
        match self.mode {
            RmsMode::Batch => {
                for channel in planar.iter_mut() {
                    if channel.is_empty() {
                        continue;
                    }
                    let sum_sq: f64 = channel.iter().map(|&x| (x as f64) * (x as f64)).sum();
                    let rms = (sum_sq / channel.len() as f64).sqrt() as f32;
                    for x in channel.iter_mut() {
                        *x = rms;
                    }
                }
            }
            RmsMode::Moving => {
                let window = self.window_size.expect("moving mode always carries a window");
                let channels = self
                    .channels
                    .get_or_insert_with(|| vec![RmsChannelState::empty(); planar.len()]);

                for (state, samples) in channels.iter_mut().zip(planar.iter_mut()) {
                    for x in samples.iter_mut() {
                        *x = state.push(window, *x);
                    }
                }
            }
        }
    }

    pub fn save_state(&self) -> Value {
        match &self.channels {
            Some(channels) => json!(channels),
            None => Value::Null,
        }
    }

    pub fn validate_load(&self, state: &Value) -> Result<Vec<RmsChannelState>> {
        if state.is_null() {
            return Ok(Vec::new());
        }
        let channels: Vec<RmsChannelState> = serde_json::from_value(state.clone()).map_err(|e| {
            StateError::MalformedState {
                tag: Self::TAG,
                reason: e.to_string(),
            }
        })?;

        let window = self.window_size.unwrap_or(usize::MAX);
        for channel in &channels {
            if channel.squares.len() > window {
                anyhow::bail!(StateError::WindowMismatch);
            }
            let recomputed: f64 = channel.squares.iter().map(|&v| v as f64).sum();
            if !running_value_matches(recomputed, channel.running_sum_of_squares as f64) {
                anyhow::bail!(StateError::RunningSumInvalid);
            }
        }

        Ok(channels)
    }

    pub fn apply_load(&mut self, channels: Vec<RmsChannelState>) {
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
    fn batch_mode_replicates_rms_across_channel() {
        let mut stage = RmsStage::batch();
        let mut planar = vec![vec![3.0, 4.0]];
        stage.process(&mut planar);
        // sqrt((9 + 16) / 2) = sqrt(12.5)
        let expected = 12.5f32.sqrt();
        assert!((planar[0][0] - expected).abs() < 1e-6);
        assert!((planar[0][1] - expected).abs() < 1e-6);
    }

    #[test]
    fn rejects_zero_window() {
        assert!(RmsStage::moving(0).is_err());
    }

    #[test]
    fn moving_rms_matches_expanding_then_sliding_window() {
        let mut stage = RmsStage::moving(2).unwrap();
        let mut planar = vec![vec![3.0, 4.0, 0.0]];
        stage.process(&mut planar);
        // n=1: sqrt(9/1) = 3
        // n=2: sqrt((9+16)/2) = sqrt(12.5)
        // n=3, window drops the 3.0: sqrt((16+0)/2) = sqrt(8)
        let expected = [3.0, 12.5f32.sqrt(), 8.0f32.sqrt()];
        for (got, want) in planar[0].iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
    }

    #[test]
    fn splice_invariance_holds() {
        let mut whole = RmsStage::moving(3).unwrap();
        let mut one_shot = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]];
        whole.process(&mut one_shot);

        let mut spliced = RmsStage::moving(3).unwrap();
        let mut first = vec![vec![1.0, 2.0]];
        spliced.process(&mut first);
        let mut second = vec![vec![3.0, 4.0, 5.0]];
        spliced.process(&mut second);

        assert_eq!(first[0], one_shot[0][..2]);
        assert_eq!(second[0], one_shot[0][2..]);
    }
}
