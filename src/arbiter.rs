//! Dual-source transcript arbitration.
//!
//! A closed take carries up to two transcript sources: the on-device
//! listener (final and interim text) and the server-side transcription of
//! the uploaded audio. Exactly one user-visible text wins, in a fixed
//! preference order, and the loser is discarded rather than merged.

use crate::session::TranscriptBuffer;

/// Shown when every transcript source came back empty.
pub const UNCLEAR_AUDIO_PLACEHOLDER: &str = "(Audio unclear)";

/// Which source produced the winning text.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TranscriptOrigin {
    ListenerFinal,
    ListenerInterim,
    ServerTranscription,
    Placeholder,
}

/// The arbitration result handed to the chat pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTranscript {
    pub text: String,
    pub origin: TranscriptOrigin,
}

/// Pick the user-visible transcript for one take.
///
/// Preference order: listener final text, then listener interim text, then
/// the server transcription produced by `transcribe`, then the placeholder.
/// `transcribe` is only invoked when both listener sources are empty, so a
/// take the listener already understood costs no upload.
pub fn resolve_transcript<F>(buffer: &TranscriptBuffer, transcribe: F) -> ResolvedTranscript
where
    F: FnOnce() -> Option<String>,
{
    let final_text = buffer.final_text().trim();
    if !final_text.is_empty() {
        return ResolvedTranscript {
            text: final_text.to_string(),
            origin: TranscriptOrigin::ListenerFinal,
        };
    }

    let interim = buffer.interim_text().trim();
    if !interim.is_empty() {
        return ResolvedTranscript {
            text: interim.to_string(),
            origin: TranscriptOrigin::ListenerInterim,
        };
    }

    if let Some(text) = transcribe() {
        let text = text.trim();
        if !text.is_empty() {
            return ResolvedTranscript {
                text: text.to_string(),
                origin: TranscriptOrigin::ServerTranscription,
            };
        }
    }

    ResolvedTranscript {
        text: UNCLEAR_AUDIO_PLACEHOLDER.to_string(),
        origin: TranscriptOrigin::Placeholder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn buffer(final_text: &str, interim: &str) -> TranscriptBuffer {
        let mut buffer = TranscriptBuffer::default();
        buffer.append_final(final_text);
        buffer.set_interim(interim);
        buffer
    }

    #[test]
    fn final_text_beats_everything() {
        let resolved = resolve_transcript(&buffer("turn on the lights", "turn"), || {
            panic!("transcription must not run when the listener has text")
        });
        assert_eq!(resolved.text, "turn on the lights");
        assert_eq!(resolved.origin, TranscriptOrigin::ListenerFinal);
    }

    #[test]
    fn interim_text_beats_the_upload() {
        let resolved = resolve_transcript(&buffer("", "turn on the"), || {
            panic!("transcription must not run when the listener has text")
        });
        assert_eq!(resolved.text, "turn on the");
        assert_eq!(resolved.origin, TranscriptOrigin::ListenerInterim);
    }

    #[test]
    fn empty_listener_falls_back_to_the_server() {
        let called = Cell::new(false);
        let resolved = resolve_transcript(&buffer("", ""), || {
            called.set(true);
            Some("hello from the server".to_string())
        });
        assert!(called.get());
        assert_eq!(resolved.text, "hello from the server");
        assert_eq!(resolved.origin, TranscriptOrigin::ServerTranscription);
    }

    #[test]
    fn whitespace_only_sources_do_not_win() {
        let resolved = resolve_transcript(&buffer("", "   "), || Some("  ".to_string()));
        assert_eq!(resolved.text, UNCLEAR_AUDIO_PLACEHOLDER);
        assert_eq!(resolved.origin, TranscriptOrigin::Placeholder);
    }

    #[test]
    fn everything_empty_yields_the_placeholder() {
        let resolved = resolve_transcript(&TranscriptBuffer::default(), || None);
        assert_eq!(resolved.text, UNCLEAR_AUDIO_PLACEHOLDER);
        assert_eq!(resolved.origin, TranscriptOrigin::Placeholder);
    }
}
