//! Voice activity detection for speech/silence endpointing.
//!
//! Classifies each raw audio frame against an adaptive noise floor and
//! decides when the speaker has finished. The detector must see the raw
//! capture signal, not the compressed/gained one, or the floor estimate
//! drifts upward and biases the threshold.

/// Smallest threshold we ever allow, so a near-silent room cannot collapse
/// the dynamic threshold to zero.
const THRESHOLD_FLOOR: f32 = 0.012;

/// Multiplier applied to the noise floor to form the speech threshold.
const THRESHOLD_RATIO: f32 = 3.5;

/// Noise floor starting point for every new session. Never persisted.
const INITIAL_NOISE_FLOOR: f32 = 0.01;

/// Floor smoothing once speech has been heard: adapt slowly so the
/// speaker's own voice is not tracked as "floor".
const ALPHA_AFTER_SPEECH: f32 = 0.99;

/// Floor smoothing before any speech: adapt faster to settle on the
/// ambient level of the room.
const ALPHA_BEFORE_SPEECH: f32 = 0.95;

/// Outcome of analysing one frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VadVerdict {
    /// Frame energy crossed the threshold.
    Speech,
    /// Below threshold, but the silence window has not elapsed (or no
    /// speech has been heard yet).
    Silence,
    /// Speech was heard earlier and silence has now lasted the full window.
    EndOfSpeech,
}

/// Frame-level endpointing detector with an exponentially smoothed noise
/// floor.
///
/// Driven by a cooperative polling loop: the caller feeds one frame per tick
/// together with a millisecond clock, which keeps the detector fully
/// deterministic under test.
#[derive(Debug, Clone)]
pub struct AdaptiveRmsVad {
    noise_floor: f32,
    had_speech: bool,
    silence_since_ms: Option<u64>,
    silence_window_ms: u64,
}

impl AdaptiveRmsVad {
    pub fn new(silence_window_ms: u64) -> Self {
        Self {
            noise_floor: INITIAL_NOISE_FLOOR,
            had_speech: false,
            silence_since_ms: None,
            silence_window_ms,
        }
    }

    /// True once any frame in this session crossed the speech threshold.
    pub fn had_speech(&self) -> bool {
        self.had_speech
    }

    /// Current adaptive threshold, exposed for diagnostics.
    pub fn threshold(&self) -> f32 {
        (self.noise_floor * THRESHOLD_RATIO).max(THRESHOLD_FLOOR)
    }

    /// Analyse one raw frame at time `now_ms`.
    ///
    /// Never yields `EndOfSpeech` before speech has been observed, so an
    /// initially quiet room cannot end the take on its own.
    pub fn observe(&mut self, frame: &[f32], now_ms: u64) -> VadVerdict {
        let rms = rms_amplitude(frame);

        let alpha = if self.had_speech {
            ALPHA_AFTER_SPEECH
        } else {
            ALPHA_BEFORE_SPEECH
        };
        self.noise_floor = alpha * self.noise_floor + (1.0 - alpha) * rms;

        if rms > self.threshold() {
            self.had_speech = true;
            self.silence_since_ms = None;
            return VadVerdict::Speech;
        }

        if self.had_speech {
            let since = *self.silence_since_ms.get_or_insert(now_ms);
            if now_ms.saturating_sub(since) > self.silence_window_ms {
                return VadVerdict::EndOfSpeech;
            }
        }
        VadVerdict::Silence
    }
}

/// RMS amplitude of a frame of samples normalized to [-1, 1].
pub(crate) fn rms_amplitude(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let energy: f32 = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
    energy.sqrt()
}
