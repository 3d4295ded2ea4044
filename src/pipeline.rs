//! The pipeline engine: an ordered stage list, channel-count locking, and the
//! `process` entry point. Builder methods append a validated stage and
//! return `Self` so construction reads as a single chained expression.

use crate::errors::ProcessError;
use crate::framing::{deinterleave, interleave};
use crate::kernels::clip::ClipDetectionStage;
use crate::kernels::design::FilterMode;
use crate::kernels::filter::FilterStage;
use crate::kernels::hilbert::HilbertEnvelopeStage;
use crate::kernels::integrator::IntegratorStage;
use crate::kernels::lms::LmsFilterStage;
use crate::kernels::moving_average::MovingAverageStage;
use crate::kernels::rectify::{RectifyMode, RectifyStage};
use crate::kernels::rms::RmsStage;
use crate::kernels::wavelet::WaveletTransformStage;
use crate::kernels::zscore::ZScoreStage;
use crate::registry::Stage;
use crate::resilience::{self, LoadOutcome, ResilienceConfig};
use crate::snapshot::{self, Snapshot};
use anyhow::{Result, bail};
use log::{debug, warn};

/// Per-batch processing context: channel count and sample rate. Sample rate
/// is carried for stages (e.g. `Filter`) whose coefficients are already
/// fixed at construction time, and is otherwise informational.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    pub channels: usize,
    pub sample_rate: f64,
}

/// An ordered list of stages plus the channel-count lock `process` enforces.
///
/// Construction happens through the chained `with_*` builder methods (one
/// per stage tag); each validates its parameters synchronously and returns
/// `Err` rather than appending on bad input, so a chain short-circuits on the
/// first invalid stage.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
    locked_channels: Option<usize>,
    disposed: bool,
    resilience: ResilienceConfig,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resilience_config(resilience: ResilienceConfig) -> Self {
        Self {
            resilience,
            ..Self::default()
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn push(&mut self, stage: Stage) -> Result<&mut Self> {
        if self.disposed {
            bail!(ProcessError::Disposed);
        }
        self.stages.push(stage);
        Ok(self)
    }

    pub fn with_rectify(&mut self, mode: RectifyMode) -> Result<&mut Self> {
        self.push(Stage::Rectify(RectifyStage::new(mode)))
    }

    pub fn with_clip_detection(&mut self, threshold: f32) -> Result<&mut Self> {
        let stage = ClipDetectionStage::new(threshold).map_err(anyhow::Error::from)?;
        self.push(Stage::ClipDetection(stage))
    }

    pub fn with_rms_batch(&mut self) -> Result<&mut Self> {
        self.push(Stage::Rms(RmsStage::batch()))
    }

    pub fn with_rms_moving(&mut self, window_size: usize) -> Result<&mut Self> {
        let stage = RmsStage::moving(window_size).map_err(anyhow::Error::from)?;
        self.push(Stage::Rms(stage))
    }

    pub fn with_moving_average(&mut self, window_size: usize) -> Result<&mut Self> {
        let stage = MovingAverageStage::new(window_size).map_err(anyhow::Error::from)?;
        self.push(Stage::MovingAverage(stage))
    }

    pub fn with_integrator(&mut self, alpha: f32) -> Result<&mut Self> {
        let stage = IntegratorStage::new(alpha).map_err(anyhow::Error::from)?;
        self.push(Stage::Integrator(stage))
    }

    pub fn with_zscore_batch(&mut self) -> Result<&mut Self> {
        self.push(Stage::ZScoreNormalize(ZScoreStage::batch()))
    }

    pub fn with_zscore_moving(&mut self, window_size: usize) -> Result<&mut Self> {
        let stage = ZScoreStage::moving(window_size).map_err(anyhow::Error::from)?;
        self.push(Stage::ZScoreNormalize(stage))
    }

    pub fn with_zscore_moving_duration(&mut self, window_duration: f64, sample_rate: f64) -> Result<&mut Self> {
        let stage =
            ZScoreStage::moving_from_duration(window_duration, sample_rate).map_err(anyhow::Error::from)?;
        self.push(Stage::ZScoreNormalize(stage))
    }

    pub fn with_biquad_filter(
        &mut self,
        mode: FilterMode,
        cutoff_frequency: f64,
        sample_rate: f64,
        q: f64,
    ) -> Result<&mut Self> {
        let stage = FilterStage::biquad(mode, cutoff_frequency, sample_rate, q).map_err(anyhow::Error::from)?;
        self.push(Stage::Filter(stage))
    }

    pub fn with_fir_filter(
        &mut self,
        mode: FilterMode,
        cutoff_frequency: f64,
        sample_rate: f64,
        order: usize,
    ) -> Result<&mut Self> {
        let stage = FilterStage::fir(mode, cutoff_frequency, sample_rate, order).map_err(anyhow::Error::from)?;
        self.push(Stage::Filter(stage))
    }

    pub fn with_lms_filter(
        &mut self,
        num_taps: usize,
        learning_rate: f32,
        lambda: f32,
        normalized: bool,
    ) -> Result<&mut Self> {
        let stage =
            LmsFilterStage::new(num_taps, learning_rate, lambda, normalized).map_err(anyhow::Error::from)?;
        self.push(Stage::LmsFilter(stage))
    }

    pub fn with_wavelet_transform(&mut self, wavelet: Option<String>) -> Result<&mut Self> {
        let stage = WaveletTransformStage::new(wavelet).map_err(anyhow::Error::from)?;
        self.push(Stage::WaveletTransform(stage))
    }

    pub fn with_hilbert_envelope(&mut self, window_size: usize, hop_size: Option<usize>) -> Result<&mut Self> {
        let stage = HilbertEnvelopeStage::new(window_size, hop_size).map_err(anyhow::Error::from)?;
        self.push(Stage::HilbertEnvelope(stage))
    }

    /// Validates channel geometry, deinterleaves, runs every stage in append
    /// order, then reinterleaves back into `buffer`.
    pub fn process(&mut self, buffer: &mut Vec<f32>, ctx: ProcessContext) -> Result<()> {
        if self.disposed {
            bail!(ProcessError::Disposed);
        }
        if ctx.channels == 0 {
            bail!(ProcessError::ChannelCountZero);
        }
        if buffer.len() % ctx.channels != 0 {
            bail!(ProcessError::InvalidBufferGeometry {
                len: buffer.len(),
                channels: ctx.channels,
            });
        }

        for stage in &self.stages {
            if let Some(required) = stage.required_channel_count() {
                if required != ctx.channels {
                    bail!(ProcessError::RequiresChannels(required));
                }
            }
        }

        match self.locked_channels {
            Some(locked) if locked != ctx.channels => bail!(ProcessError::ChannelMismatch {
                locked,
                got: ctx.channels,
            }),
            None => self.locked_channels = Some(ctx.channels),
            _ => {}
        }

        let mut planar = deinterleave(buffer, ctx.channels)?;

        for stage in self.stages.iter_mut() {
            debug!("processing stage {}", stage.tag());
            stage.process(&mut planar)?;
        }

        *buffer = interleave(&planar)?;
        Ok(())
    }

    /// Collects a snapshot of every stage's state, retrying on failure per
    /// the configured resilience policy.
    pub fn save_state(&self) -> Result<Snapshot> {
        if self.disposed {
            bail!(ProcessError::Disposed);
        }
        resilience::retry(self.resilience.max_retries, || {
            Ok(snapshot::save_state_raw(&self.stages))
        })
    }

    /// Validates and applies a snapshot, retrying on failure per the
    /// configured resilience policy. If every retry still fails and
    /// `fallbackOnLoadFailure` is set, clears all state and returns a
    /// cold-start outcome instead of surfacing the error.
    pub fn load_state(&mut self, snapshot: &Snapshot) -> Result<LoadOutcome> {
        if self.disposed {
            bail!(ProcessError::Disposed);
        }
        let stages = &mut self.stages;
        let result = resilience::retry(self.resilience.max_retries, || {
            snapshot::try_load_state(stages, snapshot)
        });

        match result {
            Ok(()) => Ok(LoadOutcome { cold_start: false }),
            Err(err) if self.resilience.fallback_on_load_failure => {
                warn!("loadState failed after retries, falling back to cold start: {err}");
                self.clear_state();
                Ok(LoadOutcome { cold_start: true })
            }
            Err(err) => Err(err),
        }
    }

    /// Drops all per-stage state and releases the channel-count lock.
    pub fn clear_state(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
        self.locked_channels = None;
    }

    /// Releases all memory; any further call fails with `Disposed`.
    pub fn dispose(&mut self) {
        self.stages.clear();
        self.locked_channels = None;
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
