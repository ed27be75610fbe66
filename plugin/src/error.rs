use nd_threshold_common::frame::{ColorMode, DataType};

#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    #[error("threshold value must be between 0 and 255, got {0}")]
    OutOfRange(i64),
    #[error("only monochrome 8 bit images supported, got {color_mode} {data_type}")]
    ColorFormatUnsupported {
        color_mode: ColorMode,
        data_type: DataType,
    },
    #[error("unable to allocate output frame of {bytes} bytes: {reason}")]
    AllocationFailure { bytes: usize, reason: String },
    #[error("parameter {0} is read-only")]
    ReadOnly(&'static str),
    #[error("parameter {0} is an integer parameter")]
    WrongType(&'static str),
    #[error("output buffer holds {got} bytes, frame needs {expected}")]
    OutputSize { got: usize, expected: usize },
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Failures reported by the host runtime.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("buffer limit reached: {outstanding} of {max} buffers in use")]
    BufferLimit { outstanding: usize, max: usize },
    #[error("memory limit reached: {requested} bytes requested, {outstanding} of {max} in use")]
    MemoryLimit {
        requested: usize,
        outstanding: usize,
        max: usize,
    },
    #[error("unknown parameter {0}")]
    UnknownParam(String),
}
