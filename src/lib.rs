//! Voice conversation console: microphone turn capture with adaptive
//! endpointing, dual-source transcription, and a chat backend exchange.
//!
//! The core loop records one "take" at a time: an adaptive RMS detector
//! endpoints the speech, an optional on-device listener transcribes it live,
//! and the recorded audio is uploaded for server transcription only when the
//! listener produced nothing. The winning transcript becomes one user turn
//! in a single-flight chat conversation.

pub mod arbiter;
pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod listener;
mod logging;
pub mod session;
pub mod speak;
pub mod telemetry;
pub mod transcribe;

pub use logging::{init_logging, log_debug, log_debug_content, log_file_path, log_panic};
