//! Spoken replies through a host speech synthesizer.
//!
//! The synthesizer is a host capability like the listener: hosts without one
//! get a null implementation and replies stay text-only.

use crate::log_debug;

/// Delivery rate for spoken replies.
pub const REPLY_RATE: f32 = 1.0;
/// Pitch for spoken replies, slightly below neutral.
pub const REPLY_PITCH: f32 = 0.9;

/// Name fragments that steer selection toward a masculine-sounding voice.
const MASCULINE_NAME_HINTS: &[&str] = &[
    "male",
    "david",
    "mark",
    "alex",
    "daniel",
    "george",
    "fred",
    "roger",
    "thomas",
    "john",
    "microsoft david",
    "google uk english male",
    "google us english",
];

/// One installed synthesizer voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Host-assigned identifier, stable within one run.
    pub id: String,
    /// Human-readable voice name.
    pub name: String,
    /// BCP 47 language tag, e.g. `en-US`.
    pub lang: String,
}

/// A reply queued for speech.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice_id: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

/// Host speech synthesis capability.
pub trait SpeechSynthesizer {
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Drop anything queued or currently being spoken.
    fn cancel(&mut self);

    fn speak(&mut self, utterance: Utterance);
}

/// Pick the reply voice from the installed set.
///
/// English-tagged voices form the pool (all voices when none are English);
/// within the pool, the first voice whose name or id contains a masculine
/// hint wins, otherwise the pool's first voice.
pub fn pick_voice(voices: &[VoiceInfo]) -> Option<&VoiceInfo> {
    let english: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|v| v.lang.len() >= 2 && v.lang[..2].eq_ignore_ascii_case("en"))
        .collect();
    let pool: Vec<&VoiceInfo> = if english.is_empty() {
        voices.iter().collect()
    } else {
        english
    };

    pool.iter()
        .find(|v| {
            let name = v.name.to_lowercase();
            let id = v.id.to_lowercase();
            MASCULINE_NAME_HINTS
                .iter()
                .any(|hint| name.contains(hint) || id.contains(hint))
        })
        .or_else(|| pool.first())
        .copied()
}

/// Speak one reply, cancelling whatever was still playing first so replies
/// never overlap.
pub fn speak_reply(synth: &mut dyn SpeechSynthesizer, text: &str) {
    synth.cancel();
    let voice_id = pick_voice(&synth.voices()).map(|v| v.id.clone());
    synth.speak(Utterance {
        text: text.to_string(),
        voice_id,
        rate: REPLY_RATE,
        pitch: REPLY_PITCH,
    });
}

/// Synthesizer for hosts without speech output. Logs instead of speaking.
pub struct NullSynthesizer;

impl SpeechSynthesizer for NullSynthesizer {
    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }

    fn cancel(&mut self) {}

    fn speak(&mut self, utterance: Utterance) {
        log_debug(&format!(
            "speech synthesis unavailable; reply not spoken ({} chars)",
            utterance.text.len()
        ));
    }
}
