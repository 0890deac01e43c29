use crate::error::{Result, WatermarkError};
use crate::MAX_PAYLOAD_BYTES;

/// Payload bits derived from a hex message, most significant bit first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8>,
    bits: Vec<bool>,
}

impl Payload {
    pub fn from_hex(hex: &str) -> Result<Self> {
        Self::from_bytes(decode_hex(hex)?)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(WatermarkError::EmptyPayload);
        }
        if bytes.len() > MAX_PAYLOAD_BYTES {
            return Err(WatermarkError::PayloadTooLong {
                len: bytes.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for &byte in &bytes {
            for i in (0..8).rev() {
                bits.push((byte >> i) & 1 == 1);
            }
        }
        Ok(Self { bytes, bits })
    }

    /// Rebuild a payload from whole bytes worth of bits.
    pub fn from_bits(bits: &[bool]) -> Result<Self> {
        if bits.is_empty() {
            return Err(WatermarkError::EmptyPayload);
        }
        if bits.len() % 8 != 0 {
            return Err(WatermarkError::InvalidConfig(format!(
                "{} bits do not form whole bytes",
                bits.len()
            )));
        }
        let bytes = bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (i, &bit)| if bit { byte | 1 << (7 - i) } else { byte })
            })
            .collect();
        Ok(Self {
            bytes,
            bits: bits.to_vec(),
        })
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        encode_hex(&self.bytes)
    }

    pub fn len_bits(&self) -> usize {
        self.bits.len()
    }
}

/// Lowercase hex, two digits per byte.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>> {
    hex::decode(hex_str).map_err(|e| WatermarkError::InvalidHex(e.to_string()))
}

pub fn text_to_hex(text: &str) -> String {
    encode_hex(text.as_bytes())
}

/// Inverse of [`text_to_hex`].
///
/// Only payloads that decode to UTF-8 text can be returned as a string;
/// other byte sequences give [`WatermarkError::NotText`] and remain available
/// through [`decode_hex`].
pub fn hex_to_text(hex_str: &str) -> Result<String> {
    let bytes = decode_hex(hex_str)?;
    String::from_utf8(bytes).map_err(|e| WatermarkError::NotText(e.to_string()))
}

/// Longest payload a watermarker accepts, in bytes.
pub fn max_payload_bytes() -> usize {
    MAX_PAYLOAD_BYTES
}

/// Whether `hex_str` can be used as a watermark payload.
pub fn is_valid_hex(hex_str: &str) -> bool {
    !hex_str.is_empty()
        && hex_str.len() % 2 == 0
        && hex_str.bytes().all(|c| c.is_ascii_hexdigit())
}
