//! Sliding-window arithmetic mean, `O(1)` per-sample update.

use crate::errors::{ParamError, StateError};
use crate::kernels::running_value_matches;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingAverageChannelState {
    pub buffer: VecDeque<f32>,
    #[serde(rename = "runningSum")]
    pub running_sum: f32,
}

impl MovingAverageChannelState {
    fn empty() -> Self {
        Self {
            buffer: VecDeque::new(),
            running_sum: 0.0,
        }
    }

    fn push(&mut self, window: usize, x: f32) -> f32 {
        self.buffer.push_back(x);
        self.running_sum += x;
        if self.buffer.len() > window {
            if let Some(evicted) = self.buffer.pop_front() {
                self.running_sum -= evicted;
            }
        }
        self.running_sum / self.buffer.len() as f32
    }
}

#[derive(Debug, Clone)]
pub struct MovingAverageStage {
    pub window_size: usize,
    channels: Option<Vec<MovingAverageChannelState>>,
}

impl MovingAverageStage {
    pub const TAG: &'static str = "movingAverage";

    pub fn new(window_size: usize) -> Result<Self, ParamError> {
        if window_size == 0 {
            return Err(ParamError::WindowSizeInvalid);
        }
        Ok(Self {
            window_size,
            channels: None,
        })
    }

    pub fn params_value(&self) -> Value {
        json!({ "mode": "moving", "windowSize": self.window_size })
    }

    pub fn reset(&mut self) {
        self.channels = None;
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) {
        let channels = self
            .channels
            .get_or_insert_with(|| vec![MovingAverageChannelState::empty(); planar.len()]);

        for (state, samples) in channels.iter_mut().zip(planar.iter_mut()) {
            for x in samples.iter_mut() {
                *x = state.push(self.window_size, *x);
            }
        }
    }

    pub fn save_state(&self) -> Value {
        match &self.channels {
            Some(channels) => json!(channels),
            None => Value::Null,
        }
    }

    pub fn validate_load(&self, state: &Value) -> Result<Vec<MovingAverageChannelState>> {
        if state.is_null() {
            return Ok(Vec::new());
        }
        let channels: Vec<MovingAverageChannelState> = serde_json::from_value(state.clone())
            .map_err(|e| StateError::MalformedState {
                tag: Self::TAG,
                reason: e.to_string(),
            })?;

        for channel in &channels {
            if channel.buffer.len() > self.window_size {
                anyhow::bail!(StateError::WindowMismatch);
            }
            let recomputed: f64 = channel.buffer.iter().map(|&v| v as f64).sum();
            if !running_value_matches(recomputed, channel.running_sum as f64) {
                anyhow::bail!(StateError::RunningSumInvalid);
            }
        }

        Ok(channels)
    }

    pub fn apply_load(&mut self, channels: Vec<MovingAverageChannelState>) {
        self.channels = if channels.is_empty() {
            None
        } else {
            Some(channels)
        };
    }
}
