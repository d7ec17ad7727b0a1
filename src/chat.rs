//! Conversation state and the chat exchange pipeline.
//!
//! One `Conversation` holds the message history and a single-flight busy
//! guard: only one exchange (text or voice) may be in flight at a time, and
//! a second attempt is rejected rather than queued. Failed exchanges append
//! a fixed apology message and never retry on their own.

use crate::arbiter::{resolve_transcript, ResolvedTranscript};
use crate::audio::encode_wav;
use crate::error::ExchangeError;
use crate::log_debug;
use crate::session::{ClosedTake, TranscriptBuffer};
use crate::transcribe::TranscribeClient;
use anyhow::{Context, Result};
use chrono::Local;
use clap::ValueEnum;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Appended when the chat request fails, whatever the reason.
pub const APOLOGY_CHAT: &str = "I hit a temporary limit. Try again in a moment.";
/// Appended when the audio upload or transcription fails.
pub const APOLOGY_TRANSCRIBE: &str = "Audio upload/transcribe failed — try again.";

const GREETING: &str =
    "Hey — I\u{2019}m Ansuk. Ask me anything interview-style: projects, RL, strengths, growth areas, whatever.";
const RESET_GREETING: &str = "Fresh slate. Hit me with your best interview question.";

/// Server-side model routing mode, persisted across runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum AppMode {
    QuotaSaver,
    Quality,
}

impl AppMode {
    pub fn label(self) -> &'static str {
        match self {
            AppMode::QuotaSaver => "Quota saver",
            AppMode::Quality => "Quality",
        }
    }

    pub fn subtitle(self) -> &'static str {
        match self {
            AppMode::QuotaSaver => "Fast + cheap models first",
            AppMode::Quality => "Best models first",
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            AppMode::QuotaSaver => "quota_saver",
            AppMode::Quality => "quality",
        }
    }

    fn from_saved(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "quota_saver" => Some(AppMode::QuotaSaver),
            "quality" => Some(AppMode::Quality),
            _ => None,
        }
    }
}

impl Default for AppMode {
    /// `VOICECHAT_APP_MODE=quality` opts into quality; anything else,
    /// including junk, lands on the saver mode.
    fn default() -> Self {
        std::env::var("VOICECHAT_APP_MODE")
            .ok()
            .and_then(|value| AppMode::from_saved(&value))
            .unwrap_or(AppMode::QuotaSaver)
    }
}

fn mode_file() -> PathBuf {
    std::env::var("VOICECHAT_MODE_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("voicechat_mode"))
}

/// Load the persisted mode, falling back to the default when the file is
/// missing or holds an unknown value.
pub fn load_mode() -> AppMode {
    std::fs::read_to_string(mode_file())
        .ok()
        .and_then(|saved| AppMode::from_saved(&saved))
        .unwrap_or_default()
}

/// Persist the mode selection. Failure is non-fatal and only logged.
pub fn store_mode(mode: AppMode) {
    if let Err(err) = std::fs::write(mode_file(), mode.wire_name()) {
        log_debug(&format!("failed to persist app mode: {err}"));
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat message as the server sees it. `ts` is a wall-clock HH:MM label,
/// not a sortable timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub ts: String,
}

fn hhmm_now() -> String {
    Local::now().format("%H:%M").to_string()
}

/// Response from `/api/chat`. Everything beyond `reply` is routing
/// diagnostics surfaced in the debug view.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurnResult {
    pub reply: String,
    pub used_model: Option<String>,
    pub last_tried_model: Option<String>,
    #[serde(default)]
    pub model_errors: Vec<String>,
    pub hops_used: Option<u32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
    app_mode: &'a str,
}

/// Client for the `/api/chat` endpoint.
pub struct ChatClient {
    http: Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(server_url: &str, timeout_secs: u64) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{server_url}/api/chat"),
        })
    }

    /// Send the full history and receive the assistant's next turn.
    pub fn send(&self, messages: &[Message], mode: AppMode) -> Result<ChatTurnResult, ExchangeError> {
        let request = ChatRequest {
            messages,
            app_mode: mode.wire_name(),
        };
        let response = self.http.post(&self.endpoint).json(&request).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExchangeError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json()?)
    }
}

/// Exchange backend as the conversation sees it. Production code wraps
/// `ChatClient`; tests substitute canned outcomes.
pub trait ChatExchange {
    fn exchange(&self, messages: &[Message], mode: AppMode) -> Result<ChatTurnResult, ExchangeError>;
}

impl ChatExchange for ChatClient {
    fn exchange(&self, messages: &[Message], mode: AppMode) -> Result<ChatTurnResult, ExchangeError> {
        self.send(messages, mode)
    }
}

/// Outcome of one completed exchange.
pub enum TurnOutcome {
    /// The server replied; the reply text should be spoken aloud.
    Reply(ChatTurnResult),
    /// The exchange failed; an apology was appended instead.
    Apologized,
    /// Another exchange is already in flight; nothing changed.
    Busy,
    /// Empty input; nothing changed.
    Ignored,
}

/// Message history plus the single-flight exchange guard.
pub struct Conversation {
    messages: Vec<Message>,
    mode: AppMode,
    busy: bool,
    last_turn: Option<ChatTurnResult>,
}

impl Conversation {
    pub fn new(mode: AppMode) -> Self {
        Self {
            messages: vec![Message {
                role: Role::Assistant,
                content: GREETING.to_string(),
                ts: hhmm_now(),
            }],
            mode,
            busy: false,
            last_turn: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AppMode) {
        self.mode = mode;
        store_mode(mode);
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Routing diagnostics from the most recent successful exchange.
    pub fn last_turn(&self) -> Option<&ChatTurnResult> {
        self.last_turn.as_ref()
    }

    /// Drop the history and start over with the reset greeting.
    pub fn reset(&mut self) {
        self.messages = vec![Message {
            role: Role::Assistant,
            content: RESET_GREETING.to_string(),
            ts: hhmm_now(),
        }];
        self.last_turn = None;
    }

    /// Serialize the full history for export.
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.messages).context("failed to serialize chat history")
    }

    /// Replace the history with a previously exported one.
    pub fn import_json(&mut self, json: &str) -> Result<()> {
        let messages: Vec<Message> =
            serde_json::from_str(json).context("failed to parse chat history")?;
        self.messages = messages;
        self.last_turn = None;
        Ok(())
    }

    /// Run one text exchange: append the user message, call the server,
    /// append the reply or the apology. Rejected with `Busy` while another
    /// exchange is in flight; empty input is ignored.
    pub fn run_text_turn(&mut self, exchange: &dyn ChatExchange, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Ignored;
        }
        if !self.try_begin() {
            return TurnOutcome::Busy;
        }
        self.push_user(text);
        let outcome = self.complete_exchange(exchange);
        self.finish();
        outcome
    }

    /// Run one voice exchange from a closed take: arbitrate the transcript
    /// (uploading the audio only when the listener produced nothing), then
    /// run the chat exchange on the winner.
    ///
    /// A failed upload appends its own apology and skips the chat call; the
    /// arbiter's placeholder text still goes through as a normal user turn.
    pub fn run_voice_turn(
        &mut self,
        exchange: &dyn ChatExchange,
        transcriber: &TranscribeClient,
        take: ClosedTake,
    ) -> TurnOutcome {
        if !self.try_begin() {
            return TurnOutcome::Busy;
        }

        let mut upload_failed = false;
        let resolved = resolve_upload(&take.transcript, &take.audio, take.sample_rate, transcriber, &mut upload_failed);
        if upload_failed {
            self.push_assistant(APOLOGY_TRANSCRIBE);
            self.finish();
            return TurnOutcome::Apologized;
        }

        log_debug(&format!("transcript source: {:?}", resolved.origin));
        crate::log_debug_content(&format!("transcript: {}", resolved.text));
        self.push_user(&resolved.text);
        let outcome = self.complete_exchange(exchange);
        self.finish();
        outcome
    }

    fn complete_exchange(&mut self, exchange: &dyn ChatExchange) -> TurnOutcome {
        match exchange.exchange(&self.messages, self.mode) {
            Ok(turn) => {
                self.push_assistant(&turn.reply);
                self.last_turn = Some(turn.clone());
                TurnOutcome::Reply(turn)
            }
            Err(err) => {
                log_debug(&format!("chat exchange failed: {err}"));
                self.push_assistant(APOLOGY_CHAT);
                TurnOutcome::Apologized
            }
        }
    }

    fn try_begin(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    fn finish(&mut self) {
        self.busy = false;
    }

    fn push_user(&mut self, content: &str) {
        self.messages.push(Message {
            role: Role::User,
            content: content.to_string(),
            ts: hhmm_now(),
        });
    }

    fn push_assistant(&mut self, content: &str) {
        self.messages.push(Message {
            role: Role::Assistant,
            content: content.to_string(),
            ts: hhmm_now(),
        });
    }
}

/// Arbitrate the transcript, encoding and uploading the take's audio only
/// when the listener sources are empty. Sets `upload_failed` when the
/// fallback upload was attempted and failed.
fn resolve_upload(
    transcript: &TranscriptBuffer,
    audio: &[f32],
    sample_rate: u32,
    transcriber: &TranscribeClient,
    upload_failed: &mut bool,
) -> ResolvedTranscript {
    resolve_transcript(transcript, || {
        let wav = match encode_wav(audio, sample_rate) {
            Ok(bytes) => bytes,
            Err(err) => {
                log_debug(&format!("WAV encoding failed: {err}"));
                *upload_failed = true;
                return None;
            }
        };
        match transcriber.transcribe(wav) {
            Ok(text) => Some(text),
            Err(err) => {
                log_debug(&format!("transcription failed: {err}"));
                *upload_failed = true;
                None
            }
        }
    })
}
