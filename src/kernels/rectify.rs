//! Full-wave and half-wave rectification. Stateless.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Rectification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RectifyMode {
    Full,
    Half,
}

/// `y = |x|` (full) or `y = max(x, 0)` (half). No per-channel state.
#[derive(Debug, Clone)]
pub struct RectifyStage {
    pub mode: RectifyMode,
}

impl RectifyStage {
    pub const TAG: &'static str = "rectify";

    pub fn new(mode: RectifyMode) -> Self {
        Self { mode }
    }

    pub fn params_value(&self) -> Value {
        json!({ "mode": self.mode })
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) {
        for channel in planar.iter_mut() {
            for x in channel.iter_mut() {
                *x = match self.mode {
                    RectifyMode::Full => x.abs(),
                    RectifyMode::Half => x.max(0.0),
                };
            }
        }
    }
}
