//! Z-score normalization: batch (population stats over the whole call) and
//! moving (trailing-window population stats, persisted across calls) modes.

use crate::errors::{ParamError, StateError};
use crate::kernels::running_value_matches;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;

const EPSILON: f64 = 1e-8;

/// Per-channel moving z-score state: a ring buffer of raw samples plus the
/// two running sums needed to recompute mean and population variance in
/// `O(1)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZScoreChannelState {
    pub buffer: VecDeque<f32>,
    #[serde(rename = "runningSum")]
    pub running_sum: f64,
    #[serde(rename = "runningSumOfSquares")]
    pub running_sum_of_squares: f64,
}

impl ZScoreChannelState {
    fn empty() -> Self {
        Self {
            buffer: VecDeque::new(),
            running_sum: 0.0,
            running_sum_of_squares: 0.0,
        }
    }

    fn push(&mut self, window_size: usize, x: f32) -> f32 {
        let xd = x as f64;
        self.buffer.push_back(x);
        self.running_sum += xd;
        self.running_sum_of_squares += xd * xd;
        if self.buffer.len() > window_size {
            if let Some(evicted) = self.buffer.pop_front() {
                let ed = evicted as f64;
                self.running_sum -= ed;
                self.running_sum_of_squares -= ed * ed;
            }
        }

        let n = self.buffer.len() as f64;
        if n < 2.0 {
            return 0.0;
        }
        let mean = self.running_sum / n;
        let variance = (self.running_sum_of_squares / n) - mean * mean;
        let std_dev = variance.max(0.0).sqrt();
        ((xd - mean) / std_dev.max(EPSILON)) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZScoreMode {
    Batch,
    Moving,
}

/// `y = (x - mean) / max(stddev, epsilon)`, population statistics (`N`
/// divisor, not `N-1`).
///
/// `Moving` accepts its window either as a sample count (`windowSize`) or as
/// a duration in seconds (`windowDuration`) resolved against the stage's
/// `sampleRate` at construction time; both forms collapse to the same
/// `window_size` field once built.
#[derive(Debug, Clone)]
pub struct ZScoreStage {
    pub mode: ZScoreMode,
    pub window_size: Option<usize>,
    channels: Option<Vec<ZScoreChannelState>>,
}

impl ZScoreStage {
    pub const TAG: &'static str = "zScoreNormalize";

    pub fn batch() -> Self {
        Self {
            mode: ZScoreMode::Batch,
            window_size: None,
            channels: None,
        }
    }

    pub fn moving(window_size: usize) -> Result<Self, ParamError> {
        if window_size == 0 {
            return Err(ParamError::WindowSizeNotPositive);
        }
        Ok(Self {
            mode: ZScoreMode::Moving,
            window_size: Some(window_size),
            channels: None,
        })
    }

    /// Resolves a `windowDuration` (seconds) against a sample rate into an
    /// integer sample count, then delegates to [`Self::moving`].
    pub fn moving_from_duration(window_duration: f64, sample_rate: f64) -> Result<Self, ParamError> {
        if !(sample_rate > 0.0) {
            return Err(ParamError::SampleRateNotPositive);
        }
        if !(window_duration > 0.0) {
            return Err(ParamError::WindowSizeNotPositive);
        }
        let samples = (window_duration * sample_rate).round() as usize;
        Self::moving(samples)
    }

    pub fn params_value(&self) -> Value {
        match self.mode {
            ZScoreMode::Batch => json!({ "mode": "batch" }),
            ZScoreMode::Moving => json!({ "mode": "moving", "windowSize": self.window_size }),
        }
    }

    pub fn reset(&mut self) {
        self.channels = None;
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) {
        match self.mode {
            ZScoreMode::Batch => {
                for channel in planar.iter_mut() {
                    let n = channel.len() as f64;
                    if n == 0.0 {
                        continue;
                    }
                    let sum: f64 = channel.iter().map(|&x| x as f64).sum();
                    let mean = sum / n;
                    let variance = channel
                        .iter()
                        .map(|&x| {
                            let d = x as f64 - mean;
                            d * d
                        })
                        .sum::<f64>()
                        / n;
                    let std_dev = variance.max(0.0).sqrt();
                    if std_dev <= EPSILON {
                        for x in channel.iter_mut() {
                            *x = 0.0;
                        }
                    } else {
                        for x in channel.iter_mut() {
                            *x = (((*x as f64) - mean) / std_dev) as f32;
                        }
                    }
                }
            }
            ZScoreMode::Moving => {
                let window = self.window_size.expect("moving mode always carries a window");
                let channels = self
                    .channels
                    .get_or_insert_with(|| vec![ZScoreChannelState::empty(); planar.len()]);

                for (state, samples) in channels.iter_mut().zip(planar.iter_mut()) {
                    for x in samples.iter_mut() {
                        *x = state.push(window, *x);
                    }
                }
            }
        }
    }

    /// `{mode, windowSize, numChannels, channels: [{buffer, runningSum,
    /// runningSumOfSquares}…]}`, per spec §6.
    pub fn save_state(&self) -> Value {
        match &self.channels {
            Some(channels) => json!({
                "mode": self.params_value()["mode"],
                "windowSize": self.window_size,
                "numChannels": channels.len(),
                "channels": channels,
            }),
            None => Value::Null,
        }
    }

    pub fn validate_load(&self, state: &Value) -> Result<Vec<ZScoreChannelState>> {
        if state.is_null() {
            return Ok(Vec::new());
        }
        let channels_value = state.get("channels").cloned().ok_or_else(|| StateError::MalformedState {
            tag: Self::TAG,
            reason: "missing `channels` field".to_string(),
        })?;
        let channels: Vec<ZScoreChannelState> = serde_json::from_value(channels_value)
            .map_err(|e| StateError::MalformedState {
                tag: Self::TAG,
                reason: e.to_string(),
            })?;

        if let Some(num_channels) = state.get("numChannels").and_then(Value::as_u64) {
            if num_channels as usize != channels.len() {
                anyhow::bail!(StateError::MalformedState {
                    tag: Self::TAG,
                    reason: "numChannels does not match channels length".to_string(),
                });
            }
        }

        let window = self.window_size.unwrap_or(usize::MAX);
        for channel in &channels {
            if channel.buffer.len() > window {
                anyhow::bail!(StateError::WindowMismatch);
            }
            let recomputed_sum: f64 = channel.buffer.iter().map(|&v| v as f64).sum();
            if !running_value_matches(recomputed_sum, channel.running_sum) {
                anyhow::bail!(StateError::RunningSumInvalid);
            }
            let recomputed_sq: f64 = channel.buffer.iter().map(|&v| (v as f64) * (v as f64)).sum();
            if !running_value_matches(recomputed_sq, channel.running_sum_of_squares) {
                anyhow::bail!(StateError::RunningSumInvalid);
            }
        }

        Ok(channels)
    }

    pub fn apply_load(&mut self, channels: Vec<ZScoreChannelState>) {
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
    fn batch_mode_normalizes_population_statistics() {
        let mut stage = ZScoreStage::batch();
        let mut planar = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]];
        stage.process(&mut planar);
        // mean = 3, population variance = 2, stddev = sqrt(2)
        let std_dev = 2f64.sqrt();
        let expected: Vec<f32> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|&x: &f64| ((x - 3.0) / std_dev) as f32)
            .collect();
        for (got, want) in planar[0].iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-4, "{got} vs {want}");
        }
    }

    #[test]
    fn batch_mode_emits_zeros_for_constant_input() {
        let mut stage = ZScoreStage::batch();
        let mut planar = vec![vec![5.0, 5.0, 5.0, 5.0]];
        stage.process(&mut planar);
        assert_eq!(planar[0], vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn rejects_zero_window() {
        assert!(ZScoreStage::moving(0).is_err());
    }

    #[test]
    fn save_state_wraps_channels_in_the_documented_shape() {
        let mut stage = ZScoreStage::moving(3).unwrap();
        let mut planar = vec![vec![1.0, 2.0, 3.0]];
        stage.process(&mut planar);

        let snapshot = stage.save_state();
        assert_eq!(snapshot["mode"], json!("moving"));
        assert_eq!(snapshot["windowSize"], json!(3));
        assert_eq!(snapshot["numChannels"], json!(1));
        assert!(snapshot["channels"][0]["buffer"].is_array());
    }

    #[test]
    fn moving_mode_matches_reference_sequence() {
        let mut stage = ZScoreStage::moving(3).unwrap();
        let mut planar = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]];
        stage.process(&mut planar);
        let expected = [0.0, 1.0, 1.225, 1.225, 1.225];
        for (got, want) in planar[0].iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-2, "{got} vs {want}");
        }
    }

    #[test]
    fn window_duration_resolves_against_sample_rate() {
        let stage = ZScoreStage::moving_from_duration(0.01, 100.0).unwrap();
        assert_eq!(stage.window_size, Some(1));
    }

    #[test]
    fn splice_invariance_holds() {
        let mut whole = ZScoreStage::moving(3).unwrap();
        let mut one_shot = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]];
        whole.process(&mut one_shot);

        let mut spliced = ZScoreStage::moving(3).unwrap();
        let mut first = vec![vec![1.0, 2.0, 3.0]];
        spliced.process(&mut first);
        let mut second = vec![vec![4.0, 5.0]];
        spliced.process(&mut second);

        assert_eq!(first[0], one_shot[0][..3]);
        assert_eq!(second[0], one_shot[0][3..]);
    }
}
