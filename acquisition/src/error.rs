use dsp::FilterError;

/// Fatal startup errors. Acquisition cannot proceed without a calibrated and
/// responsive converter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("ADC self-calibration did not complete")]
    CalibrationTimeout,
    #[error("ADC did not signal ready after enable")]
    AdcNotReady,
    #[error("conversion sequence is empty")]
    EmptySequence,
    #[error("conversion sequence of {0} channels exceeds the sequencer")]
    SequenceTooLong(usize),
    #[error("converter has no channel {0}")]
    InvalidChannel(u8),
    #[error("converter does not support {0} bit resolution")]
    UnsupportedResolution(u8),
    #[error("sample rate of {0} Hz cannot be generated")]
    InvalidSampleRate(u32),
    #[error("oversampling ratio {ratio} with shift {shift} is not supported")]
    InvalidOversampling { ratio: u16, shift: u8 },
    #[error("ring buffer halves must hold at least one sample set")]
    InvalidHalfDepth,
    #[error("ring of {0} samples exceeds the DMA transfer counter")]
    RingTooLong(usize),
    #[error("converter has no external trigger line {0}")]
    InvalidTriggerLine(u8),
    #[error("ring buffer holds {actual} samples, the layout needs {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("filter: {0}")]
    Filter(#[from] FilterError),
}

/// Non-fatal errors during steady state acquisition. These are counted and
/// reported, the DMA engine keeps running in circular mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("DMA transfer error #{count}")]
    TransferError { count: u32 },
    #[error("both ring halves were pending, processing fell behind")]
    LateDrain,
}
