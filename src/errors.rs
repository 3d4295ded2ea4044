//! Error taxonomy for the pipeline.
//!
//! Each component owns a `thiserror` enum for the failures it can raise; callers
//! get `anyhow::Result` back and can `downcast_ref` to the specific kind when they
//! need to branch on it (the resilience layer does exactly this for `StateError`).

/// Builder-time parameter validation failures.
///
/// Every message here is part of the public contract: callers match on the
/// exact string, so wording changes are breaking changes.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
pub enum ParamError {
    #[error("threshold must be > 0")]
    ThresholdNotPositive,

    #[error("alpha must be in range (0, 1]")]
    AlphaOutOfRange,

    #[error("learningRate must be in (0, 1]")]
    LearningRateOutOfRange,

    #[error("lambda must be in [0, 1)")]
    LambdaOutOfRange,

    #[error("numTaps must be a positive integer")]
    NumTapsInvalid,

    #[error("windowSize must be a positive integer")]
    WindowSizeInvalid,

    #[error("either windowSize or windowDuration must be specified")]
    WindowSizeOrDurationRequired,

    #[error("window size must be greater than 0")]
    WindowSizeNotPositive,

    #[error("hop size must be between 1 and window")]
    HopSizeOutOfRange,

    #[error("Unknown wavelet")]
    UnknownWavelet,

    #[error("wavelet type is required")]
    WaveletRequired,

    #[error("mode must be {0:?}")]
    InvalidMode(&'static [&'static str]),

    #[error("cutoffFrequency must be in (0, sampleRate / 2)")]
    CutoffOutOfRange,

    #[error("sampleRate must be > 0")]
    SampleRateNotPositive,

    #[error("order must be a positive integer")]
    OrderInvalid,

    #[error("unknown stage type: {0}")]
    UnknownStageType(String),
}

/// Failures raised while framing or processing a batch.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
pub enum ProcessError {
    #[error("buffer length {len} is not a multiple of channel count {channels}")]
    InvalidBufferGeometry { len: usize, channels: usize },

    #[error("channel count must be > 0")]
    ChannelCountZero,

    #[error("channel buffers have mismatched lengths")]
    MismatchedChannelLengths,

    #[error("requires exactly {0} channels")]
    RequiresChannels(usize),

    #[error("channel count changed from {locked} to {got} after the pipeline was already in use")]
    ChannelMismatch { locked: usize, got: usize },

    #[error("operation attempted on a disposed pipeline")]
    Disposed,
}

/// Failures raised while validating or applying a loaded snapshot.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
pub enum StateError {
    #[error("snapshot version {0} is not supported")]
    UnsupportedVersion(i64),

    #[error("snapshot stage count ({snapshot}) does not match pipeline stage count ({pipeline})")]
    StageCountMismatch { snapshot: usize, pipeline: usize },

    #[error("snapshot stage {index} has type \"{snapshot_type}\", pipeline expects \"{pipeline_type}\"")]
    StageTypeMismatch {
        index: usize,
        snapshot_type: String,
        pipeline_type: String,
    },

    #[error("snapshot stage {index} ({tag}) has incompatible parameters")]
    StageParamsMismatch { index: usize, tag: &'static str },

    #[error("Window size mismatch")]
    WindowMismatch,

    #[error("Running sum validation failed")]
    RunningSumInvalid,

    #[error("stage {tag} state is malformed: {reason}")]
    MalformedState { tag: &'static str, reason: String },
}
