use wasm_bindgen::prelude::*;
use wmstream_core::{
    hex_to_text, is_valid_hex, max_payload_bytes, text_to_hex, Detector, DetectorConfig,
    FrameStatus, WatermarkConfig, Watermarker,
};

fn to_js(e: wmstream_core::WatermarkError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct WasmWatermarker {
    inner: Watermarker,
    last_status: FrameStatus,
}

#[wasm_bindgen]
impl WasmWatermarker {
    #[wasm_bindgen(constructor)]
    pub fn new(
        sample_rate: u32,
        channels: usize,
        strength: f32,
        message_hex: &str,
    ) -> Result<WasmWatermarker, JsValue> {
        let config = WatermarkConfig::new(sample_rate, channels).with_strength(strength);
        Watermarker::new(config, message_hex)
            .map(|inner| WasmWatermarker {
                inner,
                last_status: FrameStatus::Priming,
            })
            .map_err(to_js)
    }

    /// Watermark one interleaved frame
    /// Takes a Float32Array of frame_size * channels samples and returns one of the same length
    pub fn process(&mut self, samples: &[f32], frame_size: usize) -> Result<Vec<f32>, JsValue> {
        let frame = self.inner.process_frame(samples, frame_size).map_err(to_js)?;
        self.last_status = frame.status;
        Ok(frame.samples)
    }

    /// Whether the last processed frame contained startup latency fill
    #[wasm_bindgen(getter, js_name = isPriming)]
    pub fn is_priming(&self) -> bool {
        self.last_status == FrameStatus::Priming
    }

    pub fn reset(&mut self) {
        self.inner.reset();
        self.last_status = FrameStatus::Priming;
    }

    /// Embedded payload as lowercase hex
    #[wasm_bindgen(getter)]
    pub fn message(&self) -> String {
        self.inner.payload().to_hex()
    }

    #[wasm_bindgen(getter, js_name = recommendedFrameSize)]
    pub fn recommended_frame_size(&self) -> usize {
        self.inner.recommended_frame_size()
    }

    #[wasm_bindgen(getter, js_name = internalBufferSize)]
    pub fn internal_buffer_size(&self) -> usize {
        self.inner.internal_buffer_size()
    }

    #[wasm_bindgen(getter, js_name = latencyFrames)]
    pub fn latency_frames(&self) -> usize {
        self.inner.latency_frames()
    }
}

#[wasm_bindgen]
pub struct WasmDetector {
    inner: Detector,
}

#[wasm_bindgen]
impl WasmDetector {
    #[wasm_bindgen(constructor)]
    pub fn new(
        sample_rate: u32,
        channels: usize,
        payload_bytes: Option<u32>,
    ) -> Result<WasmDetector, JsValue> {
        let mut config = DetectorConfig::new(sample_rate, channels);
        if let Some(bytes) = payload_bytes {
            config = config.with_payload_bytes(bytes as usize);
        }
        Detector::new(config)
            .map(|inner| WasmDetector { inner })
            .map_err(to_js)
    }

    pub fn process(&mut self, samples: &[f32], frame_size: usize) -> Result<(), JsValue> {
        self.inner.process_frame(samples, frame_size).map_err(to_js)
    }

    #[wasm_bindgen(getter)]
    pub fn detected(&self) -> bool {
        self.inner.result().is_detected()
    }

    #[wasm_bindgen(getter)]
    pub fn confidence(&self) -> f64 {
        self.inner.result().confidence()
    }

    /// Reconstructed payload hex, undefined until detected and complete
    #[wasm_bindgen(getter)]
    pub fn message(&self) -> Option<String> {
        self.inner.result().payload_hex().map(str::to_owned)
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

#[wasm_bindgen(js_name = textToHex)]
pub fn text_to_hex_js(text: &str) -> String {
    text_to_hex(text)
}

/// Throws on invalid hex or bytes that are not UTF-8 text
#[wasm_bindgen(js_name = hexToText)]
pub fn hex_to_text_js(hex: &str) -> Result<String, JsValue> {
    hex_to_text(hex).map_err(to_js)
}

#[wasm_bindgen(js_name = isValidHex)]
pub fn is_valid_hex_js(hex: &str) -> bool {
    is_valid_hex(hex)
}

#[wasm_bindgen(js_name = maxPayloadBytes)]
pub fn max_payload_bytes_js() -> usize {
    max_payload_bytes()
}
