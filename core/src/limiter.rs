use crate::config::LimiterConfig;
use crate::error::{Result, WatermarkError};
use std::collections::VecDeque;

/// Causal peak limiter with a fixed look-ahead delay
///
/// Every frame is held back for `look_ahead_frames` frames. When a frame would
/// exceed the ceiling, the required gain reduction is ramped in linearly over
/// the look-ahead window preceding it, so attenuation is already in place when
/// the peak leaves the limiter. Attack is instantaneous; release follows an
/// exponential decay back towards unity gain.
///
/// Channels are linked: one gain divisor is computed per frame from the
/// loudest channel and applied to all of them.
#[derive(Debug, Clone)]
pub struct LookAheadLimiter {
    channels: usize,
    look_ahead: usize,
    decay: f64,
    ceiling: f32,
    /// Interleaved frames not yet emitted
    backlog: VecDeque<f32>,
    /// Minimum gain divisor per backlog frame
    envelope: VecDeque<f32>,
    /// Smoothed divisor of the last emitted frame, never below 1
    running: f64,
}

impl LookAheadLimiter {
    pub fn new(config: &LimiterConfig, channels: usize) -> Result<Self> {
        config.validate()?;
        if channels == 0 {
            return Err(WatermarkError::InvalidConfig(
                "channel count must be at least 1".into(),
            ));
        }

        log::debug!(
            "limiter: look-ahead {} frames, decay {:.6}, ceiling {}",
            config.look_ahead_frames,
            config.decay_coeff(),
            config.ceiling
        );

        Ok(Self {
            channels,
            look_ahead: config.look_ahead_frames,
            decay: config.decay_coeff(),
            ceiling: config.ceiling,
            backlog: VecDeque::with_capacity((config.look_ahead_frames + 1) * channels),
            envelope: VecDeque::with_capacity(config.look_ahead_frames + 1),
            running: 1.0,
        })
    }

    /// Feed interleaved samples and return every frame that is now final.
    ///
    /// The returned length may be zero or shorter than the input; overall the
    /// output trails the input by exactly `look_ahead_frames` frames.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let mut output = Vec::with_capacity(input.len());
        self.process_into(input, &mut output)?;
        Ok(output)
    }

    /// Same as [`process`](Self::process) but appends to `output`.
    pub fn process_into(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        if input.len() % self.channels != 0 {
            return Err(WatermarkError::ChannelMisaligned {
                len: input.len(),
                channels: self.channels,
            });
        }

        let first_new = self.envelope.len();
        for frame in input.chunks_exact(self.channels) {
            // Non-finite input would poison the envelope
            self.backlog
                .extend(frame.iter().map(|&s| if s.is_finite() { s } else { 0.0 }));
            self.envelope.push_back(1.0);
        }

        // Frames already in the backlog were propagated when they arrived
        for i in first_new..self.envelope.len() {
            let peak = self.frame_peak(i) / self.ceiling;
            if peak > 1.0 {
                self.ramp_envelope(i, peak);
            }
        }

        let frames = self.envelope.len();
        if frames <= self.look_ahead {
            return Ok(());
        }

        let todo = frames - self.look_ahead;
        output.reserve(todo * self.channels);
        let mut running = self.running;
        for frame in 0..todo {
            let required = self.envelope[frame] as f64;
            running = running * self.decay + required * (1.0 - self.decay);
            if running < required {
                running = required;
            }
            let divisor = running.max(1.0);
            let start = frame * self.channels;
            output.extend(
                self.backlog
                    .range(start..start + self.channels)
                    .map(|&s| (s as f64 / divisor) as f32),
            );
        }
        self.running = running;

        self.backlog.drain(..todo * self.channels);
        self.envelope.drain(..todo);
        Ok(())
    }

    fn frame_peak(&self, frame: usize) -> f32 {
        let start = frame * self.channels;
        self.backlog
            .range(start..start + self.channels)
            .fold(0.0f32, |peak, &s| peak.max(s.abs()))
    }

    /// Raise the divisors leading up to frame `i` so that reduction ramps from
    /// none at the start of the window to `peak` at the frame itself.
    fn ramp_envelope(&mut self, i: usize, peak: f32) {
        let window = self.look_ahead as f32;
        for j in 0..self.look_ahead.min(i + 1) {
            let alpha = j as f32 / window;
            let required = peak * (1.0 - alpha) + alpha;
            let slot = &mut self.envelope[i - j];
            if required > *slot {
                *slot = required;
            }
        }
    }

    /// Frames of delay between input and output
    pub fn latency_frames(&self) -> usize {
        self.look_ahead
    }

    /// Frames buffered and not yet emitted
    pub fn pending_frames(&self) -> usize {
        self.envelope.len()
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Drop buffered audio and return to unity gain.
    pub fn reset(&mut self) {
        self.backlog.clear();
        self.envelope.clear();
        self.running = 1.0;
    }
}
