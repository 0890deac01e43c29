use crate::carrier::CarrierEmbedder;
use crate::config::WatermarkConfig;
use crate::error::{Result, WatermarkError};
use crate::limiter::LookAheadLimiter;
use crate::payload::Payload;
use crate::queue::SampleQueue;
use crate::schedule::BitSchedule;
use crate::{BLOCK_SIZE, RECOMMENDED_FRAME_SIZE};

/// What a returned frame contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Frame holds (at least partly) zero fill emitted while the pipeline
    /// latency elapses. Not silence from the source.
    Priming,
    /// Frame is fully watermarked, limited audio
    Watermarked,
    /// Output ran short and the frame was zero-filled
    Underrun,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    pub samples: Vec<f32>,
    pub status: FrameStatus,
}

/// Real-time watermarker accepting any caller frame size
///
/// Input frames are queued until a full block is available. Each block gets
/// the carrier for its payload bit and passes through the look-ahead limiter
/// before landing in the output queue. Callers always receive exactly as many
/// samples as they submit.
///
/// The output queue starts with [`latency_frames`](Self::latency_frames) zero
/// frames, so the delay between an input frame and its watermarked copy is
/// constant and independent of how the caller slices the stream.
#[derive(Debug, Clone)]
pub struct Watermarker {
    config: WatermarkConfig,
    payload: Payload,
    input: SampleQueue,
    output: SampleQueue,
    embedder: CarrierEmbedder,
    limiter: LookAheadLimiter,
    block: Vec<f32>,
    limited: Vec<f32>,
    latency: usize,
    priming_remaining: usize,
}

impl Watermarker {
    /// Create a watermarker embedding `payload_hex` (even-length hex, at least one byte).
    pub fn new(config: WatermarkConfig, payload_hex: &str) -> Result<Self> {
        config.validate()?;
        let payload = Payload::from_hex(payload_hex)?;
        let schedule = BitSchedule::new(&payload, config.frames_per_bit)?;
        let embedder =
            CarrierEmbedder::new(schedule, config.sample_rate, config.channels, config.strength);
        let limiter = LookAheadLimiter::new(&config.limiter, config.channels)?;
        let latency = config.latency_frames();

        log::debug!(
            "watermarker: {} Hz, {} ch, strength {}, {} payload bits repeating every {} blocks, ceiling {}, latency {} frames",
            config.sample_rate,
            config.channels,
            config.strength,
            payload.len_bits(),
            embedder.schedule().cycle_blocks(),
            limiter.ceiling(),
            latency
        );

        let channels = config.channels;
        let mut watermarker = Self {
            input: SampleQueue::with_capacity(channels, BLOCK_SIZE * 2),
            output: SampleQueue::with_capacity(channels, latency + BLOCK_SIZE),
            block: vec![0.0; BLOCK_SIZE * channels],
            limited: Vec::with_capacity(BLOCK_SIZE * channels),
            config,
            payload,
            embedder,
            limiter,
            latency,
            priming_remaining: 0,
        };
        watermarker.prime();
        Ok(watermarker)
    }

    /// Watermark one frame of `frame_size` interleaved frames.
    ///
    /// `input.len()` must equal `frame_size * channels`; otherwise nothing is
    /// consumed and an error is returned.
    pub fn process_frame(&mut self, input: &[f32], frame_size: usize) -> Result<ProcessedFrame> {
        self.check_frame(input.len(), frame_size)?;
        self.ingest(input)?;

        let mut samples = vec![0.0f32; input.len()];
        let status = self.drain_into(&mut samples);
        Ok(ProcessedFrame { samples, status })
    }

    /// In-place variant of [`process_frame`](Self::process_frame).
    pub fn process_frame_in_place(
        &mut self,
        samples: &mut [f32],
        frame_size: usize,
    ) -> Result<FrameStatus> {
        self.check_frame(samples.len(), frame_size)?;
        self.ingest(samples)?;
        Ok(self.drain_into(samples))
    }

    fn check_frame(&self, len: usize, frame_size: usize) -> Result<()> {
        match frame_size.checked_mul(self.config.channels) {
            Some(expected) if expected == len => Ok(()),
            expected => {
                let expected = expected.unwrap_or(usize::MAX);
                log::warn!("input size mismatch: expected {} samples, got {}", expected, len);
                Err(WatermarkError::FrameSizeMismatch { expected, got: len })
            }
        }
    }

    fn ingest(&mut self, input: &[f32]) -> Result<()> {
        self.input.push(input)?;

        while self.input.pop_into(&mut self.block) {
            self.embedder.embed_block(&mut self.block)?;
            self.limited.clear();
            self.limiter.process_into(&self.block, &mut self.limited)?;
            self.output.push(&self.limited)?;
        }
        Ok(())
    }

    fn drain_into(&mut self, out: &mut [f32]) -> FrameStatus {
        if !self.output.pop_into(out) {
            log::warn!(
                "output underrun: wanted {} samples, {} buffered",
                out.len(),
                self.output.len()
            );
            out.fill(0.0);
            return FrameStatus::Underrun;
        }

        let frames = out.len() / self.config.channels;
        if self.priming_remaining > 0 {
            self.priming_remaining = self.priming_remaining.saturating_sub(frames);
            FrameStatus::Priming
        } else {
            FrameStatus::Watermarked
        }
    }

    fn prime(&mut self) {
        self.output.push_silence(self.latency);
        self.priming_remaining = self.latency;
    }

    /// Discard all buffered audio and restart the payload from its first bit.
    pub fn reset(&mut self) {
        self.input.clear();
        self.output.clear();
        self.embedder.reset();
        self.limiter.reset();
        self.prime();
        log::debug!("watermarker reset");
    }

    /// Advisory frame size for callers without their own constraints
    pub fn recommended_frame_size(&self) -> usize {
        RECOMMENDED_FRAME_SIZE
    }

    /// Frames per internal processing block
    pub fn internal_buffer_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// Constant delay, in frames, between input and watermarked output
    pub fn latency_frames(&self) -> usize {
        self.latency
    }

    pub fn blocks_processed(&self) -> u64 {
        self.embedder.block_counter()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    pub fn channels(&self) -> usize {
        self.config.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}
