use crate::error::{Result, WatermarkError};
use crate::payload::Payload;

/// Maps the block counter onto the payload bit currently being embedded
///
/// Each bit is held for `frames_per_bit` consecutive blocks and the payload
/// repeats forever.
#[derive(Debug, Clone)]
pub struct BitSchedule {
    bits: Vec<bool>,
    frames_per_bit: usize,
}

impl BitSchedule {
    pub fn new(payload: &Payload, frames_per_bit: usize) -> Result<Self> {
        Self::from_bits(payload.bits().to_vec(), frames_per_bit)
    }

    pub fn from_bits(bits: Vec<bool>, frames_per_bit: usize) -> Result<Self> {
        if bits.is_empty() {
            return Err(WatermarkError::EmptyPayload);
        }
        if frames_per_bit == 0 {
            return Err(WatermarkError::InvalidConfig(
                "frames_per_bit must be at least 1".into(),
            ));
        }
        Ok(Self {
            bits,
            frames_per_bit,
        })
    }

    /// Index into the payload of the bit active at `block_counter`.
    pub fn slot(&self, block_counter: u64) -> usize {
        ((block_counter / self.frames_per_bit as u64) % self.bits.len() as u64) as usize
    }

    pub fn active_bit(&self, block_counter: u64) -> bool {
        self.bits[self.slot(block_counter)]
    }

    pub fn frames_per_bit(&self) -> usize {
        self.frames_per_bit
    }

    pub fn payload_len(&self) -> usize {
        self.bits.len()
    }

    /// Blocks needed to embed the whole payload once
    pub fn cycle_blocks(&self) -> usize {
        self.bits.len() * self.frames_per_bit
    }
}
