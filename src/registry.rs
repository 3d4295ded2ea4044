//! Stage registry: the sum type tying each kernel's tag, parameters, and
//! lifecycle (process / reset / save / load) together for the pipeline and
//! snapshot codec to dispatch over without knowing the individual kernel
//! types.

use crate::errors::StateError;
use crate::kernels::clip::ClipDetectionStage;
use crate::kernels::filter::{FilterChannelState, FilterStage};
use crate::kernels::hilbert::HilbertEnvelopeStage;
use crate::kernels::integrator::{IntegratorChannelState, IntegratorStage};
use crate::kernels::lms::{LmsFilterStage, LmsState};
use crate::kernels::moving_average::{MovingAverageChannelState, MovingAverageStage};
use crate::kernels::rectify::RectifyStage;
use crate::kernels::rms::{RmsChannelState, RmsStage};
use crate::kernels::wavelet::WaveletTransformStage;
use crate::kernels::zscore::{ZScoreChannelState, ZScoreStage};
use anyhow::Result;
use serde_json::Value;

pub use crate::kernels::design::FilterMode;
pub use crate::kernels::rectify::RectifyMode;
pub use crate::kernels::rms::RmsMode;
pub use crate::kernels::zscore::ZScoreMode;

/// One appended pipeline stage. Variants mirror the kernel modules one for
/// one; dispatch by tag happens once, at the builder method that constructs
/// the variant, not on every `process` call.
#[derive(Debug, Clone)]
pub enum Stage {
    Rectify(RectifyStage),
    ClipDetection(ClipDetectionStage),
    Rms(RmsStage),
    MovingAverage(MovingAverageStage),
    Integrator(IntegratorStage),
    ZScoreNormalize(ZScoreStage),
    Filter(FilterStage),
    LmsFilter(LmsFilterStage),
    WaveletTransform(WaveletTransformStage),
    HilbertEnvelope(HilbertEnvelopeStage),
}

impl Stage {
    pub fn tag(&self) -> &'static str {
        match self {
            Stage::Rectify(_) => RectifyStage::TAG,
            Stage::ClipDetection(_) => ClipDetectionStage::TAG,
            Stage::Rms(_) => RmsStage::TAG,
            Stage::MovingAverage(_) => MovingAverageStage::TAG,
            Stage::Integrator(_) => IntegratorStage::TAG,
            Stage::ZScoreNormalize(_) => ZScoreStage::TAG,
            Stage::Filter(_) => FilterStage::TAG,
            Stage::LmsFilter(_) => LmsFilterStage::TAG,
            Stage::WaveletTransform(_) => WaveletTransformStage::TAG,
            Stage::HilbertEnvelope(_) => HilbertEnvelopeStage::TAG,
        }
    }

    pub fn params_value(&self) -> Value {
        match self {
            Stage::Rectify(s) => s.params_value(),
            Stage::ClipDetection(s) => s.params_value(),
            Stage::Rms(s) => s.params_value(),
            Stage::MovingAverage(s) => s.params_value(),
            Stage::Integrator(s) => s.params_value(),
            Stage::ZScoreNormalize(s) => s.params_value(),
            Stage::Filter(s) => s.params_value(),
            Stage::LmsFilter(s) => s.params_value(),
            Stage::WaveletTransform(s) => s.params_value(),
            Stage::HilbertEnvelope(s) => s.params_value(),
        }
    }

    /// Channel count this stage mandates regardless of what the pipeline has
    /// locked elsewhere (only `LmsFilter`, which correlates exactly two
    /// channels against each other).
    pub fn required_channel_count(&self) -> Option<usize> {
        match self {
            Stage::LmsFilter(_) => Some(2),
            _ => None,
        }
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) -> Result<()> {
        match self {
            Stage::Rectify(s) => s.process(planar),
            Stage::ClipDetection(s) => s.process(planar),
            Stage::Rms(s) => s.process(planar),
            Stage::MovingAverage(s) => s.process(planar),
            Stage::Integrator(s) => s.process(planar),
            Stage::ZScoreNormalize(s) => s.process(planar),
            Stage::Filter(s) => s.process(planar),
            Stage::LmsFilter(s) => return s.process(planar),
            Stage::WaveletTransform(s) => s.process(planar),
            Stage::HilbertEnvelope(s) => s.process(planar),
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        match self {
            Stage::Rectify(_) | Stage::ClipDetection(_) | Stage::WaveletTransform(_) | Stage::HilbertEnvelope(_) => {}
            Stage::Rms(s) => s.reset(),
            Stage::MovingAverage(s) => s.reset(),
            Stage::Integrator(s) => s.reset(),
            Stage::ZScoreNormalize(s) => s.reset(),
            Stage::Filter(s) => s.reset(),
            Stage::LmsFilter(s) => s.reset(),
        }
    }

    pub fn save_state(&self) -> Value {
        match self {
            Stage::Rectify(_) | Stage::ClipDetection(_) | Stage::WaveletTransform(_) | Stage::HilbertEnvelope(_) => {
                Value::Null
            }
            Stage::Rms(s) => s.save_state(),
            Stage::MovingAverage(s) => s.save_state(),
            Stage::Integrator(s) => s.save_state(),
            Stage::ZScoreNormalize(s) => s.save_state(),
            Stage::Filter(s) => s.save_state(),
            Stage::LmsFilter(s) => s.save_state(),
        }
    }

    pub fn validate_load(&self, state: &Value) -> Result<LoadedState> {
        let loaded = match self {
            Stage::Rectify(_) | Stage::ClipDetection(_) | Stage::WaveletTransform(_) | Stage::HilbertEnvelope(_) => {
                LoadedState::Stateless
            }
            Stage::Rms(s) => LoadedState::Rms(s.validate_load(state)?),
            Stage::MovingAverage(s) => LoadedState::MovingAverage(s.validate_load(state)?),
            Stage::Integrator(s) => LoadedState::Integrator(s.validate_load(state)?),
            Stage::ZScoreNormalize(s) => LoadedState::ZScore(s.validate_load(state)?),
            Stage::Filter(s) => LoadedState::Filter(s.validate_load(state)?),
            Stage::LmsFilter(s) => LoadedState::Lms(s.validate_load(state)?),
        };
        Ok(loaded)
    }

    pub fn apply_load(&mut self, loaded: LoadedState) -> Result<()> {
        match (self, loaded) {
            (Stage::Rectify(_), LoadedState::Stateless)
            | (Stage::ClipDetection(_), LoadedState::Stateless)
            | (Stage::WaveletTransform(_), LoadedState::Stateless)
            | (Stage::HilbertEnvelope(_), LoadedState::Stateless) => {}
            (Stage::Rms(s), LoadedState::Rms(c)) => s.apply_load(c),
            (Stage::MovingAverage(s), LoadedState::MovingAverage(c)) => s.apply_load(c),
            (Stage::Integrator(s), LoadedState::Integrator(c)) => s.apply_load(c),
            (Stage::ZScoreNormalize(s), LoadedState::ZScore(c)) => s.apply_load(c),
            (Stage::Filter(s), LoadedState::Filter(c)) => s.apply_load(c),
            (Stage::LmsFilter(s), LoadedState::Lms(c)) => s.apply_load(c),
            _ => anyhow::bail!(StateError::StageParamsMismatch {
                index: 0,
                tag: "mismatched-loaded-state-kind",
            }),
        }
        Ok(())
    }
}

/// Per-stage parsed-and-validated snapshot state, produced by
/// [`Stage::validate_load`] and consumed by [`Stage::apply_load`]. Kept as an
/// intermediate so [`crate::snapshot`] can validate every stage in a
/// snapshot before committing any of them.
#[derive(Debug, Clone)]
pub enum LoadedState {
    Stateless,
    Rms(Vec<RmsChannelState>),
    MovingAverage(Vec<MovingAverageChannelState>),
    Integrator(Vec<IntegratorChannelState>),
    ZScore(Vec<ZScoreChannelState>),
    Filter(Vec<FilterChannelState>),
    Lms(Option<LmsState>),
}
