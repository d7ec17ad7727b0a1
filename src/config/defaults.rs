//! Named defaults shared by CLI flags and validation bounds.

/// Target sample rate for the analysis/upload pipeline (Hz).
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Continuous sub-threshold time that ends a take once speech was heard (ms).
pub const DEFAULT_SILENCE_WINDOW_MS: u64 = 900;

/// Hard cap on a single recording attempt, regardless of VAD state (ms).
pub const DEFAULT_HARD_CAP_MS: u64 = 18_000;

/// Analysis frame size (ms).
pub const DEFAULT_FRAME_MS: u64 = 20;

/// Capacity of the capture-callback -> session-loop frame channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Recognition language handed to the on-device listener when one exists.
pub const DEFAULT_LISTENER_LANG: &str = "en-IN";

/// Chat/transcription backend base URL.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Upper bound accepted for `--hard-cap-ms`.
pub const MAX_HARD_CAP_MS: u64 = 120_000;

/// Lower bound accepted for `--silence-window-ms`.
pub const MIN_SILENCE_WINDOW_MS: u64 = 200;

/// HTTP timeout for chat and transcription requests (seconds).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
