//! Audio transcription behind a trait so interview handlers stay testable
//! without network access.

use anyhow::anyhow;
use async_trait::async_trait;

use crate::errors::AppError;

const WHISPER_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const WHISPER_MODEL: &str = "whisper-1";

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes recorded audio to plain text.
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, AppError>;
}

/// OpenAI Whisper-backed transcriber.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
}

impl WhisperTranscriber {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, AppError> {
        if self.api_key.is_empty() {
            return Err(AppError::Llm(
                "transcription is not configured (OPENAI_API_KEY unset)".to_string(),
            ));
        }

        let file_part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str("audio/webm")
            .map_err(|e| AppError::Internal(anyhow!("could not build audio part: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", WHISPER_MODEL)
            .text("response_format", "text");

        let response = self
            .client
            .post(WHISPER_API_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("transcription request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AppError::Llm(format!(
                "transcription failed (status {status}): {body}"
            )));
        }

        Ok(body.trim().to_string())
    }
}
