//! Optional enhancement graph applied to the recorded stream.
//!
//! Mirrors a compressor-then-gain chain: a soft-knee dynamics compressor
//! followed by a fixed gain stage. The processed samples feed the recorded
//! artifact only; the endpointing detector always taps the signal ahead of
//! this graph.

/// Compressor threshold (dBFS).
const COMP_THRESHOLD_DB: f32 = -45.0;
/// Soft knee width (dB).
const COMP_KNEE_DB: f32 = 30.0;
/// Compression ratio above the knee.
const COMP_RATIO: f32 = 12.0;
/// Envelope attack time (seconds).
const COMP_ATTACK_S: f32 = 0.003;
/// Envelope release time (seconds).
const COMP_RELEASE_S: f32 = 0.25;
/// Fixed make-up gain stage after the compressor.
const POST_GAIN: f32 = 1.18;

const SILENCE_DB: f32 = -100.0;

/// Serial compressor + gain chain operating on mono f32 frames.
pub struct EnhancementGraph {
    attack_coeff: f32,
    release_coeff: f32,
    envelope_db: f32,
}

impl EnhancementGraph {
    pub fn new(sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as f32;
        Self {
            attack_coeff: (-1.0 / (rate * COMP_ATTACK_S)).exp(),
            release_coeff: (-1.0 / (rate * COMP_RELEASE_S)).exp(),
            envelope_db: SILENCE_DB,
        }
    }

    /// Run one frame through the chain, returning the processed copy.
    pub fn process(&mut self, frame: &[f32]) -> Vec<f32> {
        frame
            .iter()
            .map(|&sample| {
                let level_db = amplitude_db(sample.abs());
                // One-pole envelope follower in the log domain.
                let coeff = if level_db > self.envelope_db {
                    self.attack_coeff
                } else {
                    self.release_coeff
                };
                self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * level_db;

                let reduction_db = compressor_curve(self.envelope_db) - self.envelope_db;
                let gain = db_to_amplitude(reduction_db) * POST_GAIN;
                (sample * gain).clamp(-1.0, 1.0)
            })
            .collect()
    }
}

/// Static soft-knee transfer curve: input level in dB to output level in dB.
fn compressor_curve(level_db: f32) -> f32 {
    let overshoot = level_db - COMP_THRESHOLD_DB;
    if 2.0 * overshoot < -COMP_KNEE_DB {
        level_db
    } else if 2.0 * overshoot.abs() <= COMP_KNEE_DB {
        let knee_edge = overshoot + COMP_KNEE_DB / 2.0;
        level_db + (1.0 / COMP_RATIO - 1.0) * knee_edge * knee_edge / (2.0 * COMP_KNEE_DB)
    } else {
        COMP_THRESHOLD_DB + overshoot / COMP_RATIO
    }
}

fn amplitude_db(amplitude: f32) -> f32 {
    if amplitude <= 1e-5 {
        SILENCE_DB
    } else {
        20.0 * amplitude.log10()
    }
}

fn db_to_amplitude(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
