//! Test doubles for the media tool, recognizer and voice detector.

#![allow(dead_code)]

use async_trait::async_trait;
use music_extractor::analysis::CancelToken;
use music_extractor::audio::{MediaTool, SpeechRegion, VoiceActivity};
use music_extractor::error::{ExtractorError, Result};
use music_extractor::recognize::{Observation, Recognizer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct Cut {
    pub source: PathBuf,
    pub start: f64,
    pub duration: f64,
    pub dest: PathBuf,
}

/// Media tool that never runs ffmpeg: every cut writes its start second into
/// the destination file so the recognizer can tell windows apart.
pub struct FakeMedia {
    pub total: f64,
    pub fail_at: Option<u64>,
    pub prepared: Mutex<usize>,
    pub cuts: Mutex<Vec<Cut>>,
}

impl FakeMedia {
    pub fn new(total: f64) -> Self {
        Self {
            total,
            fail_at: None,
            prepared: Mutex::new(0),
            cuts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, start: u64) -> Self {
        self.fail_at = Some(start);
        self
    }

    pub fn cuts(&self) -> Vec<Cut> {
        self.cuts.lock().unwrap().clone()
    }

    pub fn prepared(&self) -> usize {
        *self.prepared.lock().unwrap()
    }
}

impl MediaTool for FakeMedia {
    fn probe_duration(&self, _source: &Path) -> Result<f64> {
        Ok(self.total)
    }

    fn prepare_for_analysis(&self, _source: &Path, dest: &Path) -> Result<()> {
        *self.prepared.lock().unwrap() += 1;
        std::fs::write(dest, b"RIFF")?;
        Ok(())
    }

    fn cut(&self, source: &Path, start: f64, duration: f64, dest: &Path) -> Result<()> {
        if self.fail_at == Some(start as u64) {
            return Err(ExtractorError::SegmentCut {
                path: source.to_path_buf(),
                start,
                duration,
                reason: "FFmpeg exited with exit status: 1".to_string(),
            });
        }
        self.cuts.lock().unwrap().push(Cut {
            source: source.to_path_buf(),
            start,
            duration,
            dest: dest.to_path_buf(),
        });
        std::fs::write(dest, format!("{}", start as u64))?;
        Ok(())
    }
}

/// Recognizer answering from a script keyed by window start; unscripted
/// windows are silent.
#[derive(Default)]
pub struct ScriptedRecognizer {
    script: HashMap<u64, Observation>,
    cancel_at: Option<(u64, CancelToken)>,
    pub heard: Mutex<Vec<u64>>,
    pub clips: Mutex<Vec<PathBuf>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speech `"at <start>"` in each of the given windows.
    pub fn speaking_at(starts: &[u64]) -> Self {
        let mut recognizer = Self::new();
        for &start in starts {
            recognizer = recognizer.with(start, Observation::Speech(format!("at {start}")));
        }
        recognizer
    }

    pub fn with(mut self, start: u64, observation: Observation) -> Self {
        self.script.insert(start, observation);
        self
    }

    /// Trip `token` while the window at `start` is being recognized.
    pub fn cancelling_at(mut self, start: u64, token: CancelToken) -> Self {
        self.cancel_at = Some((start, token));
        self
    }

    pub fn heard(&self) -> Vec<u64> {
        self.heard.lock().unwrap().clone()
    }

    pub fn clips(&self) -> Vec<PathBuf> {
        self.clips.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, clip: &Path) -> Result<Observation> {
        let start: u64 = std::fs::read_to_string(clip)?
            .trim()
            .parse()
            .map_err(|_| ExtractorError::Recognition("unreadable test clip".to_string()))?;

        self.heard.lock().unwrap().push(start);
        self.clips.lock().unwrap().push(clip.to_path_buf());

        if let Some((at, token)) = &self.cancel_at {
            if *at == start {
                token.cancel();
            }
        }

        Ok(self
            .script
            .get(&start)
            .cloned()
            .unwrap_or(Observation::Silence))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Voice detector returning the same spans for every clip.
#[derive(Default)]
pub struct FixedVad(pub Vec<SpeechRegion>);

impl VoiceActivity for FixedVad {
    fn speech_spans(&self, _clip: &Path) -> Result<Vec<SpeechRegion>> {
        Ok(self.0.clone())
    }
}
