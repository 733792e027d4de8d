use crate::error::{ExtractorError, Result};
use crate::recognize::{
    is_transient_error, is_transient_status, read_body, Observation, Recognizer,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// OpenAI Whisper API endpoint.
const WHISPER_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Maximum file size for Whisper API (25 MB).
const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Transcription model used for every window.
const WHISPER_MODEL: &str = "whisper-1";

/// OpenAI Whisper API client.
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    language: Option<String>,
}

impl WhisperClient {
    /// Create a new Whisper client; every request is bounded by `timeout`.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: WHISPER_API_URL.to_string(),
            language: None,
        })
    }

    /// Set the spoken language (ISO 639-1 code).
    pub fn with_language(mut self, language: String) -> Self {
        self.language = Some(language);
        self
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn build_form(&self, clip: &Path) -> Result<Form> {
        let file_bytes = fs::read(clip).await?;
        let file_name = clip
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("segment.wav")
            .to_string();

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", WHISPER_MODEL)
            .text("response_format", "json");

        if let Some(ref lang) = self.language {
            form = form.text("language", lang.clone());
        }

        Ok(form)
    }

    async fn call_api(&self, form: Form) -> Result<Observation> {
        let response = match self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_transient_error(&e) => {
                warn!("Whisper API unreachable: {}", e);
                return Ok(Observation::Unresolvable);
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        debug!("Whisper API response status: {}", status);

        if status.is_success() {
            let Some(body) = read_body(response, "Whisper").await? else {
                return Ok(Observation::Unresolvable);
            };
            let parsed: WhisperResponse = serde_json::from_str(&body)?;
            return Ok(Observation::from_transcript(&parsed.text));
        }

        let error_body = response.text().await.unwrap_or_default();

        if is_transient_status(status) {
            warn!("Whisper API temporarily unavailable ({}): {}", status, error_body);
            return Ok(Observation::Unresolvable);
        }

        if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
            return Err(ExtractorError::Api(format!(
                "Whisper API error: {} ({})",
                api_error.error.message, api_error.error.r#type
            )));
        }

        Err(ExtractorError::Api(format!(
            "Whisper API error ({}): {}",
            status, error_body
        )))
    }
}

#[async_trait]
impl Recognizer for WhisperClient {
    async fn recognize(&self, clip: &Path) -> Result<Observation> {
        let metadata = fs::metadata(clip).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExtractorError::FileNotFound(clip.display().to_string()),
            _ => e.into(),
        })?;

        if metadata.len() > MAX_FILE_SIZE {
            return Err(ExtractorError::Recognition(format!(
                "Clip too large for Whisper API: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_FILE_SIZE
            )));
        }

        let form = self.build_form(clip).await?;
        self.call_api(form).await
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    r#type: String,
}
