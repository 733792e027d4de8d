use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Audio tooling failed: {0}")]
    AudioExtraction(String),

    #[error("Failed to cut {} at {start:.3}s (+{duration:.3}s): {reason}", .path.display())]
    SegmentCut {
        path: PathBuf,
        start: f64,
        duration: f64,
        reason: String,
    },

    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Cannot rename {}: {reason}", .path.display())]
    Rename { path: PathBuf, reason: String },

    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::ledger::MalformedLedger),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid segment selection: {0}")]
    Selection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExtractorError>;
