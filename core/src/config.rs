use crate::error::{Result, WatermarkError};
use crate::{
    pipeline_latency_frames, BLOCK_SIZE, CARRIER_FREQS, DEFAULT_CEILING, DEFAULT_FRAMES_PER_BIT,
    DEFAULT_MARGIN, DEFAULT_STRENGTH, DEFAULT_THRESHOLD, DEFAULT_WINDOW_LEN, LOOK_AHEAD_SECONDS,
    MAX_PAYLOAD_BYTES, RELEASE_HALF_LIFE_SECONDS,
};

/// Look-ahead limiter parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    /// Frames inspected ahead of the sample being finalized (also the limiter delay)
    pub look_ahead_frames: usize,
    /// Frames for the release envelope to fall halfway back to unity gain
    pub release_half_life_frames: f64,
    /// Maximum output magnitude
    pub ceiling: f32,
}

impl LimiterConfig {
    /// Defaults scaled to the sample rate: 5ms look-ahead, 50ms release half life.
    pub fn for_sample_rate(sample_rate: u32) -> Self {
        let look_ahead = (sample_rate as f64 * LOOK_AHEAD_SECONDS) as usize;
        Self {
            look_ahead_frames: look_ahead.max(1),
            release_half_life_frames: sample_rate as f64 * RELEASE_HALF_LIFE_SECONDS,
            ceiling: DEFAULT_CEILING,
        }
    }

    pub fn with_look_ahead_frames(mut self, frames: usize) -> Self {
        self.look_ahead_frames = frames;
        self
    }

    pub fn with_release_half_life_frames(mut self, frames: f64) -> Self {
        self.release_half_life_frames = frames;
        self
    }

    pub fn with_ceiling(mut self, ceiling: f32) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Per-frame multiplier applied to the running gain divisor during release
    pub fn decay_coeff(&self) -> f64 {
        (0.5f64.ln() / self.release_half_life_frames).exp()
    }

    pub fn validate(&self) -> Result<()> {
        if self.look_ahead_frames == 0 {
            return Err(WatermarkError::InvalidConfig(
                "look-ahead must be at least one frame".into(),
            ));
        }
        if !(self.release_half_life_frames > 0.0 && self.release_half_life_frames.is_finite()) {
            return Err(WatermarkError::InvalidConfig(format!(
                "release half life must be positive, got {}",
                self.release_half_life_frames
            )));
        }
        if !(self.ceiling > 0.0 && self.ceiling <= 1.0) {
            return Err(WatermarkError::InvalidConfig(format!(
                "ceiling must be in (0, 1], got {}",
                self.ceiling
            )));
        }
        Ok(())
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self::for_sample_rate(44100)
    }
}

/// Configuration for the streaming watermarker
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkConfig {
    /// Sample rate in Hz (e.g. 44100, 48000)
    pub sample_rate: u32,
    /// Interleaved channel count (1 = mono, 2 = stereo)
    pub channels: usize,
    /// Carrier amplitude added to every channel
    pub strength: f32,
    /// Number of blocks spanned by one payload bit
    pub frames_per_bit: usize,
    pub limiter: LimiterConfig,
}

impl WatermarkConfig {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
            strength: DEFAULT_STRENGTH,
            frames_per_bit: DEFAULT_FRAMES_PER_BIT,
            limiter: LimiterConfig::for_sample_rate(sample_rate),
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_frames_per_bit(mut self, frames_per_bit: usize) -> Self {
        self.frames_per_bit = frames_per_bit;
        self
    }

    pub fn with_limiter(mut self, limiter: LimiterConfig) -> Self {
        self.limiter = limiter;
        self
    }

    /// Watermarker delay in frames between an input frame and its output
    pub fn latency_frames(&self) -> usize {
        pipeline_latency_frames(self.limiter.look_ahead_frames)
    }

    pub fn validate(&self) -> Result<()> {
        validate_stream(self.sample_rate, self.channels)?;
        if !(self.strength >= 0.0 && self.strength.is_finite()) {
            return Err(WatermarkError::InvalidConfig(format!(
                "strength must be a non-negative number, got {}",
                self.strength
            )));
        }
        if self.frames_per_bit == 0 {
            return Err(WatermarkError::InvalidConfig(
                "frames_per_bit must be at least 1".into(),
            ));
        }
        self.limiter.validate()
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self::new(44100, 1)
    }
}

/// Configuration for the streaming detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub sample_rate: u32,
    pub channels: usize,
    /// Number of blocks kept in the score window
    pub window_len: usize,
    /// Required magnitude ratio between carriers before a block counts
    pub margin: f32,
    /// Confidence above which the watermark is reported as detected
    pub threshold: f64,
    /// Must match the embedding side
    pub frames_per_bit: usize,
    /// Expected payload length; enables payload reconstruction
    pub payload_bytes: Option<usize>,
    /// Blocks seen before the first embedded block (watermarker priming)
    pub block_offset: u64,
}

impl DetectorConfig {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        let look_ahead = LimiterConfig::for_sample_rate(sample_rate).look_ahead_frames;
        Self {
            sample_rate,
            channels,
            window_len: DEFAULT_WINDOW_LEN,
            margin: DEFAULT_MARGIN,
            threshold: DEFAULT_THRESHOLD,
            frames_per_bit: DEFAULT_FRAMES_PER_BIT,
            payload_bytes: None,
            block_offset: (pipeline_latency_frames(look_ahead) / BLOCK_SIZE) as u64,
        }
    }

    /// Detector matched to a watermarker configuration.
    ///
    /// Takes the stream layout and bit grouping from `watermark`, and skips
    /// the priming blocks its limiter look-ahead produces.
    pub fn for_watermark(watermark: &WatermarkConfig) -> Self {
        Self::new(watermark.sample_rate, watermark.channels)
            .with_frames_per_bit(watermark.frames_per_bit)
            .with_look_ahead_frames(watermark.limiter.look_ahead_frames)
    }

    /// Set the block offset from the embedding side's limiter look-ahead.
    pub fn with_look_ahead_frames(self, look_ahead_frames: usize) -> Self {
        let offset = pipeline_latency_frames(look_ahead_frames) / BLOCK_SIZE;
        self.with_block_offset(offset as u64)
    }

    pub fn with_window_len(mut self, window_len: usize) -> Self {
        self.window_len = window_len;
        self
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_frames_per_bit(mut self, frames_per_bit: usize) -> Self {
        self.frames_per_bit = frames_per_bit;
        self
    }

    pub fn with_payload_bytes(mut self, payload_bytes: usize) -> Self {
        self.payload_bytes = Some(payload_bytes);
        self
    }

    pub fn with_block_offset(mut self, block_offset: u64) -> Self {
        self.block_offset = block_offset;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_stream(self.sample_rate, self.channels)?;
        if self.window_len == 0 {
            return Err(WatermarkError::InvalidConfig(
                "score window must hold at least one block".into(),
            ));
        }
        if !(self.margin >= 1.0 && self.margin.is_finite()) {
            return Err(WatermarkError::InvalidConfig(format!(
                "margin must be at least 1.0, got {}",
                self.margin
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(WatermarkError::InvalidConfig(format!(
                "threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        if self.frames_per_bit == 0 {
            return Err(WatermarkError::InvalidConfig(
                "frames_per_bit must be at least 1".into(),
            ));
        }
        match self.payload_bytes {
            Some(0) => return Err(WatermarkError::EmptyPayload),
            Some(len) if len > MAX_PAYLOAD_BYTES => {
                return Err(WatermarkError::PayloadTooLong {
                    len,
                    max: MAX_PAYLOAD_BYTES,
                })
            }
            _ => {}
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new(44100, 1)
    }
}

fn validate_stream(sample_rate: u32, channels: usize) -> Result<()> {
    if channels == 0 {
        return Err(WatermarkError::InvalidConfig(
            "channel count must be at least 1".into(),
        ));
    }
    let nyquist = sample_rate as f64 / 2.0;
    if let Some(&freq) = CARRIER_FREQS.iter().find(|&&f| f >= nyquist) {
        return Err(WatermarkError::InvalidConfig(format!(
            "carrier {freq} Hz is not below Nyquist for {sample_rate} Hz"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_defaults_scale_with_rate() {
        let config = LimiterConfig::for_sample_rate(44100);
        assert_eq!(config.look_ahead_frames, 220);
        assert!((config.release_half_life_frames - 2205.0).abs() < 1e-9);
        assert!((config.ceiling - 0.95).abs() < f32::EPSILON);

        // Tiny rates still get a usable look-ahead
        assert_eq!(LimiterConfig::for_sample_rate(100).look_ahead_frames, 1);
    }

    #[test]
    fn test_decay_coeff_halves_after_half_life() {
        let config = LimiterConfig::for_sample_rate(1000);
        let halved = config.decay_coeff().powf(config.release_half_life_frames);
        assert!((halved - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_look_ahead_rejected() {
        let config = LimiterConfig::default().with_look_ahead_frames(0);
        assert!(matches!(config.validate(), Err(WatermarkError::InvalidConfig(_))));
    }

    #[test]
    fn test_ceiling_range() {
        assert!(LimiterConfig::default().with_ceiling(0.0).validate().is_err());
        assert!(LimiterConfig::default().with_ceiling(1.5).validate().is_err());
        assert!(LimiterConfig::default().with_ceiling(1.0).validate().is_ok());
    }

    #[test]
    fn test_zero_channels_rejected() {
        assert!(WatermarkConfig::new(44100, 0).validate().is_err());
        assert!(DetectorConfig::new(44100, 0).validate().is_err());
    }

    #[test]
    fn test_carrier_above_nyquist_rejected() {
        // 1500 Hz carrier needs more than 3kHz sample rate
        assert!(WatermarkConfig::new(3000, 1).validate().is_err());
        assert!(WatermarkConfig::new(8000, 1).validate().is_ok());
        assert!(WatermarkConfig::new(0, 1).validate().is_err());
    }

    #[test]
    fn test_latency_rounds_to_blocks() {
        let config = WatermarkConfig::new(44100, 2);
        assert_eq!(config.latency_frames(), 2 * BLOCK_SIZE);

        let config = config.with_limiter(LimiterConfig::default().with_look_ahead_frames(BLOCK_SIZE + 1));
        assert_eq!(config.latency_frames(), 3 * BLOCK_SIZE);
    }

    #[test]
    fn test_detector_offset_matches_watermarker_latency() {
        for rate in [16000, 44100, 48000, 96000] {
            let detector = DetectorConfig::new(rate, 1);
            let watermark = WatermarkConfig::new(rate, 1);
            assert_eq!(
                detector.block_offset as usize * BLOCK_SIZE,
                watermark.latency_frames()
            );
        }
    }

    #[test]
    fn test_detector_for_watermark_follows_custom_look_ahead() {
        let watermark = WatermarkConfig::new(48000, 2)
            .with_frames_per_bit(3)
            .with_limiter(LimiterConfig::for_sample_rate(48000).with_look_ahead_frames(1100));
        let detector = DetectorConfig::for_watermark(&watermark);

        assert_eq!(detector.block_offset, 3);
        assert_eq!(detector.block_offset as usize * BLOCK_SIZE, watermark.latency_frames());
        assert_eq!(detector.frames_per_bit, 3);
        assert_eq!(detector.channels, 2);
        assert_eq!(detector.sample_rate, 48000);
    }

    #[test]
    fn test_detector_config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());
        assert!(DetectorConfig::default().with_window_len(0).validate().is_err());
        assert!(DetectorConfig::default().with_margin(0.5).validate().is_err());
        assert!(DetectorConfig::default().with_threshold(1.5).validate().is_err());
        assert_eq!(
            DetectorConfig::default().with_payload_bytes(0).validate(),
            Err(WatermarkError::EmptyPayload)
        );
        assert!(matches!(
            DetectorConfig::default().with_payload_bytes(17).validate(),
            Err(WatermarkError::PayloadTooLong { len: 17, max: 16 })
        ));
    }
}
