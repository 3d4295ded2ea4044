//! A streaming, multi-channel DSP pipeline: an ordered chain of stateful
//! numeric stages (rectification, RMS, moving average, leaky integration,
//! z-score normalization, IIR/FIR filtering, adaptive LMS filtering, wavelet
//! decomposition, Hilbert envelope extraction) over interleaved sample
//! buffers, with a versioned snapshot codec and a retry/fallback resilience
//! wrapper around save/load.
//!
//! ```
//! use dsp_pipeline::pipeline::{Pipeline, ProcessContext};
//! use dsp_pipeline::registry::RectifyMode;
//!
//! let mut pipeline = Pipeline::new();
//! pipeline.with_rectify(RectifyMode::Full).unwrap();
//!
//! let mut buffer = vec![-1.0, 0.5, -0.25];
//! pipeline
//!     .process(&mut buffer, ProcessContext { channels: 1, sample_rate: 48000.0 })
//!     .unwrap();
//! assert_eq!(buffer, vec![1.0, 0.5, 0.25]);
//! ```

pub mod errors;
pub mod framing;
pub mod kernels;
pub mod pipeline;
pub mod registry;
pub mod resilience;
pub mod snapshot;

pub use errors::{ParamError, ProcessError, StateError};
pub use pipeline::{Pipeline, ProcessContext};
pub use resilience::{LoadOutcome, ResilienceConfig};
pub use snapshot::Snapshot;
