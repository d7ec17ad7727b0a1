//! Error taxonomy for the capture and exchange pipelines.
//!
//! Nothing in here is fatal to the process: capture errors abort the start
//! gesture before a session exists, and network errors narrow to a single
//! failed turn with the conversation log left intact.

use thiserror::Error;

/// Reasons the microphone session could not be opened.
///
/// Surfaced by aborting the start gesture; no recording session is created
/// and no hardware handle is left open.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Failures from the remote chat or transcription services.
///
/// Recovered locally by appending a fixed apology message; the caller never
/// retries automatically.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response; the body is treated as opaque error text.
    #[error("server error ({status}): {body}")]
    Api { status: u16, body: String },
}
