use crate::error::{Result, WatermarkError};
use std::collections::VecDeque;

/// FIFO of interleaved samples that is only ever drained in whole frames
///
/// The length is always a multiple of the channel count.
#[derive(Debug, Clone)]
pub struct SampleQueue {
    samples: VecDeque<f32>,
    channels: usize,
}

impl SampleQueue {
    pub fn new(channels: usize) -> Self {
        Self::with_capacity(channels, 0)
    }

    /// Queue pre-sized for `frames` frames; grows if a caller pushes more.
    pub fn with_capacity(channels: usize, frames: usize) -> Self {
        let channels = channels.max(1);
        Self {
            samples: VecDeque::with_capacity(frames * channels),
            channels,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Append interleaved samples in order.
    pub fn push(&mut self, samples: &[f32]) -> Result<()> {
        if samples.len() % self.channels != 0 {
            return Err(WatermarkError::ChannelMisaligned {
                len: samples.len(),
                channels: self.channels,
            });
        }
        self.samples.extend(samples.iter().copied());
        Ok(())
    }

    /// Append `frames` frames of zeros.
    pub fn push_silence(&mut self, frames: usize) {
        let len = self.samples.len() + frames * self.channels;
        self.samples.resize(len, 0.0);
    }

    /// Remove exactly `frames` frames, or nothing at all if fewer are buffered.
    pub fn pop(&mut self, frames: usize) -> Option<Vec<f32>> {
        match frames.checked_mul(self.channels) {
            Some(needed) if needed <= self.samples.len() => {
                Some(self.samples.drain(..needed).collect())
            }
            _ => None,
        }
    }

    /// Like [`pop`](Self::pop) but writes into `out`, whose length selects the frame count.
    pub fn pop_into(&mut self, out: &mut [f32]) -> bool {
        if out.len() % self.channels != 0 || self.samples.len() < out.len() {
            return false;
        }
        let n = out.len();
        for (dst, src) in out.iter_mut().zip(self.samples.drain(..n)) {
            *dst = src;
        }
        true
    }

    pub fn available_frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
