//! Clip (overload) detection. Stateless.

use crate::errors::ParamError;
use serde_json::{Value, json};

/// `y = 1.0` when `|x| >= threshold`, else `0.0`.
#[derive(Debug, Clone)]
pub struct ClipDetectionStage {
    pub threshold: f32,
}

impl ClipDetectionStage {
    pub const TAG: &'static str = "clipDetection";

    pub fn new(threshold: f32) -> Result<Self, ParamError> {
        if !(threshold > 0.0) {
            return Err(ParamError::ThresholdNotPositive);
        }
        Ok(Self { threshold })
    }

    pub fn params_value(&self) -> Value {
        json!({ "threshold": self.threshold })
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) {
        for channel in planar.iter_mut() {
            for x in channel.iter_mut() {
                *x = if x.abs() >= self.threshold { 1.0 } else { 0.0 };
            }
        }
    }
}
