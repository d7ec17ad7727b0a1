//! Audio capture, enhancement, and voice activity detection.
//!
//! Microphone frames arrive via CPAL, get downmixed to mono and resampled to
//! the target rate, then split two ways: the raw signal feeds the endpointing
//! detector, the compressor/gain-processed signal feeds the recorded artifact.

mod capture;
mod dispatch;
mod graph;
mod recorder;
mod resample;
#[cfg(test)]
mod tests;
mod vad;
mod wav;

pub use capture::ArtifactBuffer;
pub use graph::EnhancementGraph;
pub use recorder::{CaptureHints, LiveCapture, Recorder};
pub use vad::{AdaptiveRmsVad, VadVerdict};
pub use wav::encode_wav;

use crate::config::SessionConfig;

/// Convert one device-rate frame to the session's target rate and frame
/// length.
pub fn frame_to_target(frame: Vec<f32>, device_rate: u32, cfg: &SessionConfig) -> Vec<f32> {
    let target_len =
        ((u64::from(cfg.sample_rate) * cfg.frame_ms.clamp(5, 120)) / 1000).max(1) as usize;
    resample::convert_frame_to_target(frame, device_rate, cfg.sample_rate, target_len)
}
