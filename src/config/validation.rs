use super::defaults::{MAX_HARD_CAP_MS, MIN_SILENCE_WINDOW_MS};
use super::AppConfig;
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the server URL.
    pub fn validate(&mut self) -> Result<()> {
        let trimmed = self.server_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("--server-url must not be empty");
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            bail!("--server-url must start with http:// or https://, got '{trimmed}'");
        }
        self.server_url = trimmed.to_string();

        if !(8_000..=96_000).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between 8000 and 96000 Hz, got {}",
                self.sample_rate
            );
        }
        if self.hard_cap_ms == 0 || self.hard_cap_ms > MAX_HARD_CAP_MS {
            bail!(
                "--hard-cap-ms must be between 1 and {MAX_HARD_CAP_MS} ms, got {}",
                self.hard_cap_ms
            );
        }
        if self.silence_window_ms < MIN_SILENCE_WINDOW_MS
            || self.silence_window_ms > self.hard_cap_ms
        {
            bail!(
                "--silence-window-ms must be >={MIN_SILENCE_WINDOW_MS} and <= --hard-cap-ms ({})",
                self.hard_cap_ms
            );
        }
        if !(5..=120).contains(&self.frame_ms) {
            bail!("--frame-ms must be between 5 and 120, got {}", self.frame_ms);
        }
        if !(8..=1024).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between 8 and 1024, got {}",
                self.channel_capacity
            );
        }
        if self.listener_lang.trim().is_empty() {
            bail!("--listener-lang must not be empty");
        }
        if self.http_timeout_secs == 0 || self.http_timeout_secs > 600 {
            bail!(
                "--http-timeout-secs must be between 1 and 600, got {}",
                self.http_timeout_secs
            );
        }
        Ok(())
    }
}
