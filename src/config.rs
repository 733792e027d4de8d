use crate::error::{ExtractorError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Default window length for speech sampling, in seconds.
pub const DEFAULT_SEGMENT_LENGTH: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Whisper,
    Gemini,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Whisper => write!(f, "whisper"),
            Backend::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whisper" => Ok(Backend::Whisper),
            "gemini" => Ok(Backend::Gemini),
            _ => Err(format!("Unknown backend: {}. Use 'whisper' or 'gemini'", s)),
        }
    }
}

/// Settings for cutting speech remnants off exported clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimSettings {
    /// How many seconds of head and tail are inspected for speech.
    pub inspection_window: f64,
    /// Extra seconds skipped after the last speech in the head.
    pub head_margin: f64,
    /// Extra seconds dropped before the first speech in the tail.
    pub tail_margin: f64,
    /// Keep the untrimmed clip as `<stem>_with_speech.<ext>`.
    pub keep_backup: bool,
}

impl Default for TrimSettings {
    fn default() -> Self {
        Self {
            inspection_window: 25.0,
            head_margin: 0.2,
            tail_margin: 0.2,
            keep_backup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub backend: Backend,
    pub language: String,
    pub segment_length: u32,
    /// Skip the recognizer call for windows where the energy VAD hears nothing.
    pub vad_gate: bool,
    pub request_timeout_secs: u64,
    pub trim: TrimSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            gemini_api_key: None,
            backend: Backend::default(),
            language: "de".to_string(),
            segment_length: DEFAULT_SEGMENT_LENGTH,
            vad_gate: false,
            request_timeout_secs: 60,
            trim: TrimSettings::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                match toml::from_str::<Config>(&contents) {
                    Ok(file_config) => config = file_config,
                    Err(e) => warn!(
                        "Ignoring unreadable config file {}: {}",
                        config_path.display(),
                        e
                    ),
                }
            }
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.openai_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.gemini_api_key = Some(key);
        }
        if let Ok(backend) = std::env::var("MUSIC_EXTRACTOR_BACKEND") {
            if let Ok(b) = backend.parse() {
                config.backend = b;
            }
        }
        if let Ok(language) = std::env::var("MUSIC_EXTRACTOR_LANGUAGE") {
            config.language = language;
        }
        if let Ok(length) = std::env::var("MUSIC_EXTRACTOR_SEGMENT_LENGTH") {
            if let Ok(l) = length.parse() {
                config.segment_length = l;
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.backend {
            Backend::Whisper => {
                if self.openai_api_key.is_none() {
                    return Err(ExtractorError::Config(
                        "OPENAI_API_KEY not set. Export it with: export OPENAI_API_KEY=sk-..."
                            .to_string(),
                    ));
                }
            }
            Backend::Gemini => {
                if self.gemini_api_key.is_none() {
                    return Err(ExtractorError::Config(
                        "GEMINI_API_KEY not set. Get one at https://aistudio.google.com/apikey"
                            .to_string(),
                    ));
                }
            }
        }

        if self.segment_length == 0 {
            return Err(ExtractorError::Config(
                "Segment length must be greater than 0".to_string(),
            ));
        }

        if self.trim.inspection_window <= 0.0 {
            return Err(ExtractorError::Config(
                "Trim inspection window must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("music-extractor").join("config.toml"))
    }
}
