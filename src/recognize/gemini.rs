use crate::error::{ExtractorError, Result};
use crate::recognize::{
    is_transient_error, is_transient_status, read_body, Observation, Recognizer,
};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// Gemini API endpoint for content generation.
const GENERATE_CONTENT_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Inline audio limit of the generateContent endpoint (20 MB).
const INLINE_SIZE_LIMIT: u64 = 20 * 1024 * 1024;

/// Reply the model is told to give when it hears no speech.
const NO_SPEECH_MARKER: &str = "NO_SPEECH";

/// Google Gemini client used as a speech/no-speech recognizer.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    language: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: GENERATE_CONTENT_URL.to_string(),
            language: None,
        })
    }

    /// Set the spoken language of the recording.
    pub fn with_language(mut self, language: String) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_prompt(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("Transcribe any spoken words in this audio clip verbatim.\n");
        prompt.push_str("Ignore singing, instrumental music and background noise.\n");
        if let Some(ref lang) = self.language {
            prompt.push_str(&format!("The speech is in {} language.\n", lang));
        }
        prompt.push_str(&format!(
            "If nobody speaks, reply with exactly {} and nothing else.\n",
            NO_SPEECH_MARKER
        ));
        prompt.push_str("Reply with the transcript only, on a single line.");

        prompt
    }

    /// Extract the first text part and map it onto an observation.
    ///
    /// A reply without any text (blocked prompt, candidate stopped for
    /// safety) is no answer at all, so it must not be mistaken for silence.
    fn parse_response(response: GenerateContentResponse) -> Observation {
        let text = response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.first())
            .map(|p| match p {
                ResponsePart::Text { text } => text.as_str(),
            });

        let Some(text) = text else {
            let reason = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
                .or_else(|| {
                    response
                        .candidates
                        .first()
                        .and_then(|c| c.finish_reason.as_deref())
                })
                .unwrap_or("empty reply");
            warn!("Gemini returned no transcript ({})", reason);
            return Observation::Unresolvable;
        };

        debug!("Gemini raw response text: {}", text);

        if text.trim().eq_ignore_ascii_case(NO_SPEECH_MARKER) {
            Observation::Silence
        } else {
            Observation::from_transcript(text)
        }
    }

    async fn call_generate_content(&self, request: GenerateContentRequest) -> Result<Observation> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);

        let response = match self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_transient_error(&e) => {
                warn!("Gemini API unreachable: {}", e);
                return Ok(Observation::Unresolvable);
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        debug!("Gemini API response status: {}", status);

        if status.is_success() {
            let Some(body) = read_body(response, "Gemini").await? else {
                return Ok(Observation::Unresolvable);
            };
            let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
            return Ok(Self::parse_response(parsed));
        }

        let error_body = response.text().await.unwrap_or_default();

        if is_transient_status(status) {
            warn!("Gemini API temporarily unavailable ({}): {}", status, error_body);
            return Ok(Observation::Unresolvable);
        }

        Err(ExtractorError::Api(format!(
            "Gemini API error ({}): {}",
            status, error_body
        )))
    }
}

#[async_trait]
impl Recognizer for GeminiClient {
    async fn recognize(&self, clip: &Path) -> Result<Observation> {
        let audio_bytes = fs::read(clip).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExtractorError::FileNotFound(clip.display().to_string()),
            _ => e.into(),
        })?;

        if audio_bytes.len() as u64 > INLINE_SIZE_LIMIT {
            return Err(ExtractorError::Recognition(format!(
                "Clip too large for inline Gemini request: {} bytes",
                audio_bytes.len()
            )));
        }

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: self.build_prompt(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "audio/wav".to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(&audio_bytes),
                        },
                    },
                ],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.0),
                max_output_tokens: Some(1024),
            }),
        };

        self.call_generate_content(request).await
    }

    fn name(&self) -> &'static str {
        "Google Gemini"
    }
}

// Request/Response types

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResponsePart {
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key".to_string(), Duration::from_secs(5))
            .unwrap()
            .with_endpoint(format!("{}/generate", server.uri()))
    }

    #[test]
    fn test_build_prompt_mentions_language_and_marker() {
        let client = GeminiClient::new("k".to_string(), Duration::from_secs(1))
            .unwrap()
            .with_language("de".to_string());
        let prompt = client.build_prompt();
        assert!(prompt.contains("de language"));
        assert!(prompt.contains(NO_SPEECH_MARKER));
    }

    #[test]
    fn test_parse_no_speech_marker() {
        let parsed: GenerateContentResponse =
            serde_json::from_value(reply("no_speech\n")).unwrap();
        assert_eq!(GeminiClient::parse_response(parsed), Observation::Silence);
    }

    #[test]
    fn test_parse_empty_text_part_is_silence() {
        let parsed: GenerateContentResponse = serde_json::from_value(reply("  ")).unwrap();
        assert_eq!(GeminiClient::parse_response(parsed), Observation::Silence);
    }

    #[test]
    fn test_parse_missing_candidates_is_unresolvable() {
        let parsed: GenerateContentResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(GeminiClient::parse_response(parsed), Observation::Unresolvable);
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_unresolvable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": { "blockReason": "OTHER" }
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("segment.wav");
        std::fs::write(&clip, b"RIFF").unwrap();

        let observation = client_for(&server).recognize(&clip).await.unwrap();
        assert_eq!(observation, Observation::Unresolvable);
    }

    #[tokio::test]
    async fn test_candidate_stopped_for_safety_is_unresolvable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("segment.wav");
        std::fs::write(&clip, b"RIFF").unwrap();

        let observation = client_for(&server).recognize(&clip).await.unwrap();
        assert_eq!(observation, Observation::Unresolvable);
    }

    #[tokio::test]
    async fn test_speech_is_recognized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Nachrichten um fünf")))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("segment.wav");
        std::fs::write(&clip, b"RIFF").unwrap();

        let observation = client_for(&server).recognize(&clip).await.unwrap();
        assert_eq!(observation, Observation::Speech("Nachrichten um fünf".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_is_unresolvable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("segment.wav");
        std::fs::write(&clip, b"RIFF").unwrap();

        let observation = client_for(&server).recognize(&clip).await.unwrap();
        assert_eq!(observation, Observation::Unresolvable);
    }

    #[tokio::test]
    async fn test_bad_request_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("segment.wav");
        std::fs::write(&clip, b"RIFF").unwrap();

        assert!(matches!(
            client_for(&server).recognize(&clip).await,
            Err(ExtractorError::Api(_))
        ));
    }
}
