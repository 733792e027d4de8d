pub mod gated;
pub mod gemini;
pub mod whisper;

pub use gated::VadGatedRecognizer;
pub use gemini::GeminiClient;
pub use whisper::WhisperClient;

use crate::audio::EnergyVad;
use crate::config::{Backend, Config};
use crate::error::{ExtractorError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Outcome of listening to one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Speech was recognized; the text is never empty.
    Speech(String),
    /// No speech detected.
    Silence,
    /// The recognizer could not give an answer right now (outage, rate
    /// limit, timeout). Must never be read as silence.
    Unresolvable,
}

impl Observation {
    /// Build an observation from raw recognizer text: blank text is silence,
    /// anything else becomes a single-line transcript.
    pub fn from_transcript(text: &str) -> Self {
        let normalized = normalize_transcript(text);
        if normalized.is_empty() {
            Observation::Silence
        } else {
            Observation::Speech(normalized)
        }
    }
}

/// Collapse all whitespace (including newlines) into single spaces.
pub fn normalize_transcript(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Does this HTTP status mean "try again later" rather than "you did it wrong"?
pub(crate) fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Does this transport error mean the service was unreachable or too slow?
pub(crate) fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Read a success body. A transfer that stalls or breaks off half way is
/// reported as `None`, the same as a request that never got through.
pub(crate) async fn read_body(
    response: reqwest::Response,
    service: &str,
) -> Result<Option<String>> {
    match response.text().await {
        Ok(body) => Ok(Some(body)),
        Err(e) if is_transient_error(&e) || e.is_body() => {
            warn!("{} API reply cut short: {}", service, e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Decide whether `clip` contains speech.
    ///
    /// Service hiccups come back as [`Observation::Unresolvable`]; `Err` is
    /// reserved for failures a retry cannot fix (bad key, missing clip).
    async fn recognize(&self, clip: &Path) -> Result<Observation>;

    fn name(&self) -> &'static str;
}

#[async_trait]
impl<R: Recognizer + ?Sized> Recognizer for Box<R> {
    async fn recognize(&self, clip: &Path) -> Result<Observation> {
        (**self).recognize(clip).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Build the recognizer selected in `config`.
pub fn create_recognizer(config: &Config) -> Result<Box<dyn Recognizer>> {
    let timeout = Duration::from_secs(config.request_timeout_secs.max(1));

    let backend: Box<dyn Recognizer> = match config.backend {
        Backend::Whisper => {
            let api_key = config.openai_api_key.as_ref().ok_or_else(|| {
                ExtractorError::Config(
                    "OpenAI API key not set. Set OPENAI_API_KEY environment variable.".to_string(),
                )
            })?;
            Box::new(
                WhisperClient::new(api_key.clone(), timeout)?
                    .with_language(config.language.clone()),
            )
        }
        Backend::Gemini => {
            let api_key = config.gemini_api_key.as_ref().ok_or_else(|| {
                ExtractorError::Config(
                    "Gemini API key not set. Set GEMINI_API_KEY environment variable.".to_string(),
                )
            })?;
            Box::new(
                GeminiClient::new(api_key.clone(), timeout)?
                    .with_language(config.language.clone()),
            )
        }
    };

    if config.vad_gate {
        Ok(Box::new(VadGatedRecognizer::new(backend, EnergyVad::default())))
    } else {
        Ok(backend)
    }
}
