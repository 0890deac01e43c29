use crate::config::DetectorConfig;
use crate::error::{Result, WatermarkError};
use crate::goertzel::bin_magnitude;
use crate::payload::Payload;
use crate::queue::SampleQueue;
use crate::{BLOCK_SIZE, CARRIER_FREQS};

/// Loser magnitudes below this are treated as this value when forming ratios
const MIN_MAGNITUDE: f32 = 1e-9;

/// Upper bound for a single block score
const MAX_SCORE: f32 = 1e6;

/// Outcome of [`Detector::result`]
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Too few blocks analyzed to decide
    Undecided,
    NotDetected {
        confidence: f64,
    },
    Detected {
        /// Reconstructed payload as lowercase hex, once every bit has been observed
        payload_hex: Option<String>,
        confidence: f64,
    },
}

impl Detection {
    pub fn confidence(&self) -> f64 {
        match self {
            Detection::Undecided => 0.0,
            Detection::NotDetected { confidence } | Detection::Detected { confidence, .. } => {
                *confidence
            }
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, Detection::Detected { .. })
    }

    pub fn payload_hex(&self) -> Option<&str> {
        match self {
            Detection::Detected { payload_hex, .. } => payload_hex.as_deref(),
            _ => None,
        }
    }
}

/// Confidence-weighted votes for each payload bit
#[derive(Debug, Clone)]
struct BitVotes {
    frames_per_bit: u64,
    votes: Vec<f64>,
}

impl BitVotes {
    fn new(payload_bytes: usize, frames_per_bit: usize) -> Self {
        Self {
            frames_per_bit: frames_per_bit as u64,
            votes: vec![0.0; payload_bytes * 8],
        }
    }

    fn add(&mut self, embedded_block: u64, bit: bool, weight: f64) {
        let slot = ((embedded_block / self.frames_per_bit) % self.votes.len() as u64) as usize;
        self.votes[slot] += if bit { weight } else { -weight };
    }

    fn payload(&self) -> Option<Payload> {
        if self.votes.iter().any(|&v| v == 0.0) {
            return None;
        }
        let bits: Vec<bool> = self.votes.iter().map(|&v| v > 0.0).collect();
        Payload::from_bits(&bits).ok()
    }

    fn clear(&mut self) {
        self.votes.fill(0.0);
    }
}

/// Streaming detector for the carrier watermark
///
/// Buffers caller frames into blocks like the watermarker, measures the
/// energy at both carrier frequencies per block and keeps a circular window of
/// per-block scores. A block only scores when one carrier dominates the other
/// by the configured margin.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectorConfig,
    input: SampleQueue,
    block: Vec<f32>,
    mono: Vec<f32>,
    /// Score window per carrier, indexed by bit value
    scores: [Vec<f32>; 2],
    votes: Option<BitVotes>,
    block_counter: u64,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        log::debug!(
            "detector: {} Hz, {} ch, window {} blocks, margin {}, threshold {}",
            config.sample_rate,
            config.channels,
            config.window_len,
            config.margin,
            config.threshold
        );

        let votes = config
            .payload_bytes
            .map(|bytes| BitVotes::new(bytes, config.frames_per_bit));

        Ok(Self {
            input: SampleQueue::with_capacity(config.channels, BLOCK_SIZE * 2),
            block: vec![0.0; BLOCK_SIZE * config.channels],
            mono: vec![0.0; BLOCK_SIZE],
            scores: [vec![0.0; config.window_len], vec![0.0; config.window_len]],
            votes,
            block_counter: 0,
            config,
        })
    }

    /// Analyze one frame of `frame_size` interleaved frames.
    pub fn process_frame(&mut self, input: &[f32], frame_size: usize) -> Result<()> {
        let expected = frame_size.checked_mul(self.config.channels);
        if expected != Some(input.len()) {
            let expected = expected.unwrap_or(usize::MAX);
            log::warn!("input size mismatch: expected {} samples, got {}", expected, input.len());
            return Err(WatermarkError::FrameSizeMismatch {
                expected,
                got: input.len(),
            });
        }

        self.input.push(input)?;
        while self.input.pop_into(&mut self.block) {
            self.analyze_block();
        }
        Ok(())
    }

    fn analyze_block(&mut self) {
        let channels = self.config.channels;
        for (mono, frame) in self.mono.iter_mut().zip(self.block.chunks_exact(channels)) {
            *mono = frame.iter().sum::<f32>() / channels as f32;
        }

        let sample_rate = self.config.sample_rate as f64;
        let zero = bin_magnitude(&self.mono, CARRIER_FREQS[0], sample_rate);
        let one = bin_magnitude(&self.mono, CARRIER_FREQS[1], sample_rate);

        let margin = self.config.margin;
        let decision = if one > zero * margin {
            Some((true, score(one, zero)))
        } else if zero > one * margin {
            Some((false, score(zero, one)))
        } else {
            None
        };

        let slot = (self.block_counter % self.config.window_len as u64) as usize;
        self.scores[0][slot] = 0.0;
        self.scores[1][slot] = 0.0;

        if let Some((bit, block_score)) = decision {
            self.scores[bit as usize][slot] = block_score;
            log::trace!(
                "block {}: bit {} score {:.2}",
                self.block_counter,
                bit as u8,
                block_score
            );

            if let (Some(votes), Some(embedded)) = (
                self.votes.as_mut(),
                self.block_counter.checked_sub(self.config.block_offset),
            ) {
                votes.add(embedded, bit, block_confidence(block_score));
            }
        }

        self.block_counter += 1;
    }

    /// Current decision over the score window.
    pub fn result(&self) -> Detection {
        let window = self.config.window_len;
        if self.block_counter < (window / 2) as u64 {
            return Detection::Undecided;
        }

        let total: f64 = self
            .scores
            .iter()
            .flat_map(|scores| scores.iter())
            .map(|&s| block_confidence(s))
            .sum();
        let confidence = (total / window as f64).clamp(0.0, 1.0);

        if confidence > self.config.threshold {
            Detection::Detected {
                payload_hex: self.reconstructed_payload().map(|p| p.to_hex()),
                confidence,
            }
        } else {
            Detection::NotDetected { confidence }
        }
    }

    /// Payload rebuilt from the bit votes so far, if every bit has been seen.
    pub fn reconstructed_payload(&self) -> Option<Payload> {
        self.votes.as_ref().and_then(BitVotes::payload)
    }

    /// Mean score per carrier over the window, indexed by bit value
    pub fn carrier_averages(&self) -> [f64; 2] {
        let window = self.config.window_len as f64;
        let average = |scores: &Vec<f32>| scores.iter().map(|&s| s as f64).sum::<f64>() / window;
        [average(&self.scores[0]), average(&self.scores[1])]
    }

    pub fn blocks_processed(&self) -> u64 {
        self.block_counter
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.input.clear();
        for scores in self.scores.iter_mut() {
            scores.fill(0.0);
        }
        if let Some(votes) = self.votes.as_mut() {
            votes.clear();
        }
        self.block_counter = 0;
        log::debug!("detector reset");
    }
}

fn score(winner: f32, loser: f32) -> f32 {
    (winner / loser.max(MIN_MAGNITUDE)).min(MAX_SCORE)
}

/// Maps a winner/loser ratio to [0, 1); zero for blocks without a decision.
fn block_confidence(score: f32) -> f64 {
    if score > 1.0 {
        1.0 - 1.0 / score as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn carrier_block(freq: f64, amplitude: f32, channels: usize) -> Vec<f32> {
        (0..BLOCK_SIZE)
            .flat_map(|i| {
                let s = amplitude * (2.0 * PI * freq * i as f64 / 44100.0).sin() as f32;
                std::iter::repeat(s).take(channels)
            })
            .collect()
    }

    #[test]
    fn test_undecided_before_half_window() {
        let mut detector = Detector::new(DetectorConfig::default()).unwrap();
        let block = carrier_block(1500.0, 0.5, 1);
        for _ in 0..24 {
            detector.process_frame(&block, BLOCK_SIZE).unwrap();
            let result = detector.result();
            assert_eq!(result, Detection::Undecided);
            assert_eq!(result.confidence(), 0.0);
            assert!(!result.is_detected());
        }
    }

    #[test]
    fn test_strong_carrier_detected() {
        let mut detector = Detector::new(DetectorConfig::default()).unwrap();
        let block = carrier_block(1000.0, 0.01, 1);
        for _ in 0..60 {
            detector.process_frame(&block, BLOCK_SIZE).unwrap();
        }

        let result = detector.result();
        assert!(result.is_detected(), "{:?}", result);
        assert!(result.confidence() > 0.9);
        // No payload length configured, nothing to reconstruct
        assert_eq!(result.payload_hex(), None);

        let [zero, one] = detector.carrier_averages();
        assert!(zero > 1.2 && one == 0.0);
    }

    #[test]
    fn test_silence_not_detected() {
        let mut detector = Detector::new(DetectorConfig::default()).unwrap();
        detector.process_frame(&vec![0.0; BLOCK_SIZE * 60], BLOCK_SIZE * 60).unwrap();
        assert_eq!(detector.result(), Detection::NotDetected { confidence: 0.0 });
    }

    #[test]
    fn test_equal_carriers_within_margin_score_zero() {
        let mut detector = Detector::new(DetectorConfig::default()).unwrap();
        let a = carrier_block(1000.0, 0.2, 1);
        let b = carrier_block(1500.0, 0.2, 1);
        let mixed: Vec<f32> = a.iter().zip(b.iter()).map(|(x, y)| x + y).collect();
        for _ in 0..50 {
            detector.process_frame(&mixed, BLOCK_SIZE).unwrap();
        }
        assert_eq!(detector.carrier_averages(), [0.0, 0.0]);
        assert!(!detector.result().is_detected());
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let config = DetectorConfig::new(44100, 2);
        let mut detector = Detector::new(config).unwrap();
        let block = carrier_block(1500.0, 0.01, 2);
        for _ in 0..50 {
            detector.process_frame(&block, BLOCK_SIZE).unwrap();
        }
        assert!(detector.result().is_detected());
        assert!(detector.carrier_averages()[1] > 0.0);
    }

    #[test]
    fn test_frame_size_mismatch_rejected() {
        let mut detector = Detector::new(DetectorConfig::new(44100, 2)).unwrap();
        let err = detector.process_frame(&[0.0; 3], 2).unwrap_err();
        assert_eq!(err, WatermarkError::FrameSizeMismatch { expected: 4, got: 3 });
        assert_eq!(detector.blocks_processed(), 0);
    }

    #[test]
    fn test_overflowing_frame_size_rejected() {
        let mut detector = Detector::new(DetectorConfig::new(44100, 2)).unwrap();
        let err = detector.process_frame(&[0.0; 4], usize::MAX / 2 + 3).unwrap_err();
        assert_eq!(err, WatermarkError::FrameSizeMismatch { expected: usize::MAX, got: 4 });
        assert_eq!(detector.blocks_processed(), 0);
    }

    #[test]
    fn test_reconstructs_bits_from_votes() {
        // One byte 0b1010_0000, one block per bit, no offset
        let config = DetectorConfig::default()
            .with_payload_bytes(1)
            .with_frames_per_bit(1)
            .with_block_offset(0)
            .with_window_len(8);
        let mut detector = Detector::new(config).unwrap();

        let one = carrier_block(1500.0, 0.01, 1);
        let zero = carrier_block(1000.0, 0.01, 1);
        for bit in [true, false, true, false, false, false, false, false] {
            let block = if bit { &one } else { &zero };
            detector.process_frame(block, BLOCK_SIZE).unwrap();
        }

        let result = detector.result();
        assert_eq!(result.payload_hex(), Some("a0"));
    }

    #[test]
    fn test_incomplete_votes_give_no_payload() {
        let config = DetectorConfig::default()
            .with_payload_bytes(2)
            .with_block_offset(0)
            .with_window_len(4);
        let mut detector = Detector::new(config).unwrap();
        let block = carrier_block(1000.0, 0.01, 1);
        for _ in 0..8 {
            detector.process_frame(&block, BLOCK_SIZE).unwrap();
        }
        assert!(detector.result().is_detected());
        assert_eq!(detector.reconstructed_payload(), None);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut detector = Detector::new(DetectorConfig::default()).unwrap();
        let block = carrier_block(1500.0, 0.01, 1);
        for _ in 0..50 {
            detector.process_frame(&block, BLOCK_SIZE).unwrap();
        }
        assert!(detector.result().is_detected());

        detector.reset();
        assert_eq!(detector.blocks_processed(), 0);
        assert_eq!(detector.result(), Detection::Undecided);
        assert_eq!(detector.carrier_averages(), [0.0, 0.0]);
    }

    #[test]
    fn test_block_confidence_bounds() {
        assert_eq!(block_confidence(0.0), 0.0);
        assert!((block_confidence(2.0) - 0.5).abs() < 1e-12);
        assert!(block_confidence(MAX_SCORE) < 1.0);
        assert_eq!(score(1.0, 0.0), MAX_SCORE);
    }
}
