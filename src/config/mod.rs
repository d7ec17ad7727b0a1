//! Command-line parsing and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::Parser;

pub use defaults::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_FRAME_MS, DEFAULT_HARD_CAP_MS, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_LISTENER_LANG, DEFAULT_SAMPLE_RATE, DEFAULT_SERVER_URL, DEFAULT_SILENCE_WINDOW_MS,
    MAX_HARD_CAP_MS, MIN_SILENCE_WINDOW_MS,
};

/// CLI options for the voice chat console. Validated values keep the capture
/// loop and the HTTP clients inside safe bounds.
#[derive(Debug, Parser, Clone)]
#[command(about = "Voice conversation console", author, version)]
pub struct AppConfig {
    /// Base URL of the chat/transcription backend
    #[arg(long = "server-url", env = "VOICECHAT_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server_url: String,

    /// Response mode override (defaults to the persisted choice)
    #[arg(long = "mode", value_enum)]
    pub mode: Option<crate::chat::AppMode>,

    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Trailing silence required before a take auto-stops (milliseconds)
    #[arg(long = "silence-window-ms", default_value_t = DEFAULT_SILENCE_WINDOW_MS)]
    pub silence_window_ms: u64,

    /// Hard stop for a recording attempt no matter what (milliseconds)
    #[arg(long = "hard-cap-ms", default_value_t = DEFAULT_HARD_CAP_MS)]
    pub hard_cap_ms: u64,

    /// Analysis frame size (milliseconds)
    #[arg(long = "frame-ms", default_value_t = DEFAULT_FRAME_MS)]
    pub frame_ms: u64,

    /// Target sample rate for analysis and upload (Hz)
    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Frame channel capacity between the capture callback and the session loop
    #[arg(long = "channel-capacity", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Skip the compressor/gain enhancement graph and record the raw stream
    #[arg(long = "no-enhancement", default_value_t = false)]
    pub no_enhancement: bool,

    /// Language requested from the on-device listener when one is present
    #[arg(long = "listener-lang", default_value = DEFAULT_LISTENER_LANG)]
    pub listener_lang: String,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "VOICECHAT_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "VOICECHAT_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging transcript/content snippets (debug log only)
    #[arg(
        long = "log-content",
        env = "VOICECHAT_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,

    /// HTTP timeout for chat and transcription calls (seconds)
    #[arg(long = "http-timeout-secs", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,
}

/// Tunable parameters handed to one recording attempt.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sample_rate: u32,
    pub frame_ms: u64,
    pub silence_window_ms: u64,
    pub hard_cap_ms: u64,
    pub channel_capacity: usize,
    pub enhancement: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_ms: DEFAULT_FRAME_MS,
            silence_window_ms: DEFAULT_SILENCE_WINDOW_MS,
            hard_cap_ms: DEFAULT_HARD_CAP_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            enhancement: true,
        }
    }
}

impl AppConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sample_rate: self.sample_rate,
            frame_ms: self.frame_ms,
            silence_window_ms: self.silence_window_ms,
            hard_cap_ms: self.hard_cap_ms,
            channel_capacity: self.channel_capacity,
            enhancement: !self.no_enhancement,
        }
    }
}
