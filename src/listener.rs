//! Optional on-device transcription listener.
//!
//! Some hosts expose a live recognizer that can produce a transcript while
//! the microphone is open and signal natural pauses in speech. The capability
//! is polymorphic over presence: when the host has none, the session simply
//! carries no listener and downstream logic sees empty transcripts.

use crate::log_debug;
use crate::session::{SessionEvent, TranscriptBuffer};

/// One batch of recognizer output, drained by the session loop each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// A result batch: zero or more newly finalized segments plus the latest
    /// non-final segment.
    Results { finals: Vec<String>, interim: String },
    /// The host heard a natural pause in speech.
    Pause,
    /// Recognition failed. Non-fatal: the audio-upload path still works.
    Error(String),
}

/// Host recognizer capability. Production code substitutes a real binding;
/// tests substitute scripted events.
pub trait SpeechListener: Send {
    /// Drain whatever the recognizer produced since the last poll. Must not
    /// block; the session loop calls this once per tick.
    fn poll_events(&mut self) -> Vec<ListenerEvent>;

    /// Stop recognition and release the recognizer. Safe to call repeatedly.
    fn stop(&mut self);

    fn name(&self) -> &'static str {
        "speech_listener"
    }
}

/// Fold one listener event into the session's transcript buffer, returning
/// the session event it implies, if any.
///
/// A pause only requests a stop once some non-empty text has been captured:
/// an empty pause before any speech must not end the take.
pub fn apply_event(buffer: &mut TranscriptBuffer, event: ListenerEvent) -> Option<SessionEvent> {
    match event {
        ListenerEvent::Results { finals, interim } => {
            for segment in finals {
                buffer.append_final(&segment);
            }
            buffer.set_interim(&interim);
            None
        }
        ListenerEvent::Pause => {
            if buffer.has_text() {
                Some(SessionEvent::ListenerPause)
            } else {
                None
            }
        }
        ListenerEvent::Error(message) => {
            log_debug(&format!("speech recognition error (non-fatal): {message}"));
            None
        }
    }
}

/// Deterministic listener fed from a script, one event batch per poll.
#[cfg(test)]
pub(crate) struct ScriptedListener {
    batches: std::collections::VecDeque<Vec<ListenerEvent>>,
    pub(crate) stop_calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl ScriptedListener {
    pub(crate) fn new(batches: Vec<Vec<ListenerEvent>>) -> Self {
        Self {
            batches: batches.into(),
            stop_calls: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }
}

#[cfg(test)]
impl SpeechListener for ScriptedListener {
    fn poll_events(&mut self) -> Vec<ListenerEvent> {
        self.batches.pop_front().unwrap_or_default()
    }

    fn stop(&mut self) {
        self.stop_calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn name(&self) -> &'static str {
        "scripted_listener"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_rebuild_final_and_interim_text() {
        let mut buffer = TranscriptBuffer::default();
        apply_event(
            &mut buffer,
            ListenerEvent::Results {
                finals: vec!["hello".to_string()],
                interim: "there".to_string(),
            },
        );
        assert_eq!(buffer.final_text(), "hello");
        assert_eq!(buffer.interim_text(), "there");

        apply_event(
            &mut buffer,
            ListenerEvent::Results {
                finals: vec!["there".to_string()],
                interim: String::new(),
            },
        );
        assert_eq!(buffer.final_text(), "hello there");
        assert_eq!(buffer.interim_text(), "");
    }

    #[test]
    fn pause_without_text_is_ignored() {
        let mut buffer = TranscriptBuffer::default();
        assert_eq!(apply_event(&mut buffer, ListenerEvent::Pause), None);
    }

    #[test]
    fn pause_with_interim_text_requests_stop() {
        let mut buffer = TranscriptBuffer::default();
        buffer.set_interim("um hello");
        assert_eq!(
            apply_event(&mut buffer, ListenerEvent::Pause),
            Some(SessionEvent::ListenerPause)
        );
    }

    #[test]
    fn errors_are_swallowed() {
        let mut buffer = TranscriptBuffer::default();
        assert_eq!(
            apply_event(&mut buffer, ListenerEvent::Error("boom".to_string())),
            None
        );
        assert!(!buffer.has_text());
    }
}
