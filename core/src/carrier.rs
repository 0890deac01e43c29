use crate::error::{Result, WatermarkError};
use crate::schedule::BitSchedule;
use crate::{BLOCK_SIZE, CARRIER_FREQS};
use std::f64::consts::PI;

/// Carrier frequency in Hz used for a payload bit
pub fn carrier_frequency(bit: bool) -> f64 {
    CARRIER_FREQS[bit as usize]
}

/// Adds a phase-continuous carrier tone to fixed-size blocks
///
/// The tone frequency is selected by the active payload bit. Phase is derived
/// from the absolute frame index so consecutive blocks join without a
/// discontinuity, whatever bit each block carries.
#[derive(Debug, Clone)]
pub struct CarrierEmbedder {
    schedule: BitSchedule,
    sample_rate: f64,
    channels: usize,
    strength: f32,
    block_counter: u64,
}

impl CarrierEmbedder {
    pub fn new(schedule: BitSchedule, sample_rate: u32, channels: usize, strength: f32) -> Self {
        Self {
            schedule,
            sample_rate: sample_rate as f64,
            channels: channels.max(1),
            strength,
            block_counter: 0,
        }
    }

    /// Embed the active bit into one interleaved block and advance the counter.
    pub fn embed_block(&mut self, block: &mut [f32]) -> Result<()> {
        let expected = BLOCK_SIZE * self.channels;
        if block.len() != expected {
            return Err(WatermarkError::BlockSizeMismatch {
                expected,
                got: block.len(),
            });
        }

        let bit = self.schedule.active_bit(self.block_counter);
        let freq = carrier_frequency(bit);
        let first_frame = self.block_counter * BLOCK_SIZE as u64;

        for (offset, frame) in block.chunks_exact_mut(self.channels).enumerate() {
            let n = (first_frame + offset as u64) as f64;
            // Keep only the fractional cycle so large indices stay precise
            let cycles = (n * freq / self.sample_rate).fract();
            let carrier = self.strength * (2.0 * PI * cycles).sin() as f32;
            for sample in frame.iter_mut() {
                *sample += carrier;
            }
        }

        log::trace!("embedded bit {} in block {}", bit as u8, self.block_counter);
        self.block_counter += 1;
        Ok(())
    }

    pub fn block_counter(&self) -> u64 {
        self.block_counter
    }

    pub fn schedule(&self) -> &BitSchedule {
        &self.schedule
    }

    pub fn reset(&mut self) {
        self.block_counter = 0;
    }
}
