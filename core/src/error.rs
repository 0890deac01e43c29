use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WatermarkError {
    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),

    #[error("Payload must contain at least one byte")]
    EmptyPayload,

    #[error("Payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLong { len: usize, max: usize },

    #[error("Decoded payload is not UTF-8 text: {0}")]
    NotText(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame size mismatch: expected {expected} samples, got {got}")]
    FrameSizeMismatch { expected: usize, got: usize },

    #[error("Block size mismatch: expected {expected} samples, got {got}")]
    BlockSizeMismatch { expected: usize, got: usize },

    #[error("Sample count {len} is not a multiple of {channels} channels")]
    ChannelMisaligned { len: usize, channels: usize },
}

pub type Result<T> = std::result::Result<T, WatermarkError>;
