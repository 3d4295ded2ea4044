//! Leaky integrator: `y[n] = x[n] + alpha * y[n-1]`.

use crate::errors::{ParamError, StateError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Per-channel integrator state: a single running accumulator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntegratorChannelState {
    pub y: f32,
}

#[derive(Debug, Clone)]
pub struct IntegratorStage {
    pub alpha: f32,
    channels: Option<Vec<IntegratorChannelState>>,
}

impl IntegratorStage {
    pub const TAG: &'static str = "integrator";

    pub fn new(alpha: f32) -> Result<Self, ParamError> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ParamError::AlphaOutOfRange);
        }
        Ok(Self {
            alpha,
            channels: None,
        })
    }

    pub fn params_value(&self) -> Value {
        json!({ "alpha": self.alpha })
    }

    pub fn required_channel_count(&self) -> Option<usize> {
        self.channels.as_ref().map(|c| c.len())
    }

    pub fn reset(&mut self) {
        self.channels = None;
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) {
        let channels = self
            .channels
            .get_or_insert_with(|| vec![IntegratorChannelState { y: 0.0 }; planar.len()]);

        for (state, samples) in channels.iter_mut().zip(planar.iter_mut()) {
            for x in samples.iter_mut() {
                state.y = *x + self.alpha * state.y;
                *x = state.y;
            }
        }
    }

    pub fn save_state(&self) -> Value {
        match &self.channels {
            Some(channels) => json!(channels),
            None => Value::Null,
        }
    }

    pub fn validate_load(&self, state: &Value) -> Result<Vec<IntegratorChannelState>> {
        if state.is_null() {
            return Ok(Vec::new());
        }
        let channels: Vec<IntegratorChannelState> =
            serde_json::from_value(state.clone()).map_err(|e| {
                StateError::MalformedState {
                    tag: Self::TAG,
                    reason: e.to_string(),
                }
            })?;
        Ok(channels)
    }

    pub fn apply_load(&mut self, channels: Vec<IntegratorChannelState>) {
        self.channels = if channels.is_empty() {
            None
        } else {
            Some(channels)
        };
    }
}
