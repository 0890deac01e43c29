//! Real-time audio watermarking for arbitrary caller frame sizes
//!
//! Frames are rebuffered into fixed blocks, a low-level carrier tone encodes
//! one payload bit per group of blocks, and a look-ahead limiter keeps the
//! output below a ceiling. The detector mirrors the buffering and scores the
//! carrier energy per block.

pub mod error;
pub mod config;
pub mod queue;
pub mod payload;
pub mod schedule;
pub mod carrier;
pub mod goertzel;
pub mod limiter;
pub mod watermarker;
pub mod detector;

pub use config::{DetectorConfig, LimiterConfig, WatermarkConfig};
pub use detector::{Detection, Detector};
pub use error::{Result, WatermarkError};
pub use limiter::LookAheadLimiter;
pub use payload::{
    decode_hex, encode_hex, hex_to_text, is_valid_hex, max_payload_bytes, text_to_hex, Payload,
};
pub use queue::SampleQueue;
pub use schedule::BitSchedule;
pub use watermarker::{FrameStatus, ProcessedFrame, Watermarker};

// Engine block configuration
pub const BLOCK_SIZE: usize = 1024; // frames per internal processing block
pub const DEFAULT_FRAMES_PER_BIT: usize = 2;
pub const MAX_PAYLOAD_BYTES: usize = 16; // 128 payload bits
pub const RECOMMENDED_FRAME_SIZE: usize = 160; // 10ms at 16kHz

// Carrier configuration
pub const DEFAULT_STRENGTH: f32 = 0.004; // about -48 dBFS
pub const CARRIER_FREQS: [f64; 2] = [1000.0, 1500.0]; // Hz, indexed by bit value

// Limiter defaults
pub const DEFAULT_CEILING: f32 = 0.95;
pub const LOOK_AHEAD_SECONDS: f64 = 0.005;
pub const RELEASE_HALF_LIFE_SECONDS: f64 = 0.05;

// Detector defaults
pub const DEFAULT_WINDOW_LEN: usize = 50; // blocks
pub const DEFAULT_MARGIN: f32 = 1.2;
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Total watermarker delay in frames for a given limiter look-ahead.
///
/// One block of input buffering plus the look-ahead, rounded up to whole
/// blocks so that detector blocks stay aligned with embedder blocks.
pub fn pipeline_latency_frames(look_ahead_frames: usize) -> usize {
    (BLOCK_SIZE + look_ahead_frames).div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}
