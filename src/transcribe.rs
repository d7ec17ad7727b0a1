//! Server-side transcription of the recorded artifact.

use crate::error::ExchangeError;
use crate::log_debug;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// Client for the `/api/transcribe` endpoint.
pub struct TranscribeClient {
    http: Client,
    endpoint: String,
}

impl TranscribeClient {
    pub fn new(server_url: &str, timeout_secs: u64) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{server_url}/api/transcribe"),
        })
    }

    /// Upload WAV bytes and return the transcribed text.
    ///
    /// The multipart field name and filename are part of the server contract.
    pub fn transcribe(&self, wav_bytes: Vec<u8>) -> Result<String, ExchangeError> {
        let byte_count = wav_bytes.len();
        let part = Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = Form::new().part("file", part);

        log_debug(&format!("uploading {byte_count} bytes for transcription"));
        let response = self.http.post(&self.endpoint).multipart(form).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExchangeError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: TranscribeResponse = response.json()?;
        Ok(parsed.text)
    }
}
