//! Persisted record of a speech scan.
//!
//! One record per line:
//!
//! ```text
//! 20                  <- window length in seconds, written once
//! 0 guten Abend       <- "<window start> <speech>" for every window with speech
//! 60 das war Bach
//! end                 <- scan complete; a bare number instead means "resume here"
//! ```
//!
//! Silent windows are never written; they are implied by gaps between starts.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::error::Result;
use crate::recognize::normalize_transcript;

/// Last line of a fully analysed recording.
pub const COMPLETE_MARKER: &str = "end";

/// File extension of the ledger written next to the audio file.
pub const LEDGER_EXTENSION: &str = "speech";

/// Ledger path for an audio file: same directory and stem, `.speech` extension.
pub fn ledger_path_for(audio: &Path) -> PathBuf {
    audio.with_extension(LEDGER_EXTENSION)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed ledger: {0}")]
pub struct MalformedLedger(pub String);

/// A window in which speech was recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRecord {
    pub start: u64,
    pub text: String,
}

/// What follows the speech records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerTail {
    /// No marker; the writer stopped without closing the ledger.
    Open,
    /// Analysis stopped early and continues at this window start.
    ResumeAt(u64),
    /// The whole recording was analysed.
    Complete,
}

/// What a ledger on disk means for the next scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerStatus {
    NotExisting,
    Empty,
    Malformed(String),
    Resumable { at: u64 },
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    segment_length: u32,
    records: Vec<SpeechRecord>,
    tail: LedgerTail,
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl Ledger {
    pub fn new(segment_length: u32) -> Self {
        Self {
            segment_length,
            records: Vec::new(),
            tail: LedgerTail::Open,
        }
    }

    /// Parse ledger text. Blank lines are ignored, every line is trimmed.
    pub fn parse(content: &str) -> std::result::Result<Self, MalformedLedger> {
        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        Self::from_lines(&lines)
    }

    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> std::result::Result<Self, MalformedLedger> {
        let (first, rest) = lines
            .split_first()
            .ok_or_else(|| MalformedLedger("no segment length line".to_string()))?;

        let first = first.as_ref().trim();
        if !is_number(first) {
            return Err(MalformedLedger(format!(
                "first line '{first}' is not a segment length"
            )));
        }
        let segment_length: u32 = first
            .parse()
            .map_err(|_| MalformedLedger(format!("segment length '{first}' out of range")))?;
        if segment_length == 0 {
            return Err(MalformedLedger("segment length is zero".to_string()));
        }

        let mut ledger = Ledger::new(segment_length);
        let length = u64::from(segment_length);

        for (i, raw) in rest.iter().enumerate() {
            let line = raw.as_ref().trim();
            let is_last = i + 1 == rest.len();
            let previous = ledger.records.last().map(|r| r.start);

            if is_last && line == COMPLETE_MARKER {
                ledger.tail = LedgerTail::Complete;
                break;
            }

            if is_last && is_number(line) {
                let at: u64 = line
                    .parse()
                    .map_err(|_| MalformedLedger(format!("resume point '{line}' out of range")))?;
                if at % length != 0 || previous.is_some_and(|p| at <= p) {
                    return Err(MalformedLedger(format!(
                        "resume point {at} does not follow the recorded windows"
                    )));
                }
                ledger.tail = LedgerTail::ResumeAt(at);
                break;
            }

            let (start, text) = line
                .split_once(' ')
                .filter(|(start, text)| is_number(start) && !text.trim().is_empty())
                .ok_or_else(|| {
                    MalformedLedger(format!("line {} '{line}' is not a speech record", i + 2))
                })?;

            let start: u64 = start
                .parse()
                .map_err(|_| MalformedLedger(format!("window start '{start}' out of range")))?;
            if start % length != 0 {
                return Err(MalformedLedger(format!(
                    "window start {start} is not a multiple of {segment_length}"
                )));
            }
            if previous.is_some_and(|p| start <= p) {
                return Err(MalformedLedger(format!(
                    "window start {start} is not after the previous record"
                )));
            }

            ledger.records.push(SpeechRecord {
                start,
                text: text.to_string(),
            });
        }

        Ok(ledger)
    }

    /// Read and parse the ledger at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content)?)
    }

    pub fn segment_length(&self) -> u32 {
        self.segment_length
    }

    pub fn records(&self) -> &[SpeechRecord] {
        &self.records
    }

    pub fn tail(&self) -> LedgerTail {
        self.tail
    }

    pub fn push_speech(&mut self, start: u64, text: impl Into<String>) {
        self.records.push(SpeechRecord {
            start,
            text: text.into(),
        });
    }

    pub fn set_tail(&mut self, tail: LedgerTail) {
        self.tail = tail;
    }

    /// Where the next scan has to start, or `None` when nothing is left.
    ///
    /// A ledger with speech records but no closing marker was cut off mid-scan
    /// and resumes after its last record. A ledger holding only the length line
    /// counts as complete.
    pub fn resume_point(&self) -> Option<u64> {
        match self.tail {
            LedgerTail::Complete => None,
            LedgerTail::ResumeAt(at) => Some(at),
            LedgerTail::Open => self
                .records
                .last()
                .map(|r| r.start + u64::from(self.segment_length)),
        }
    }

    pub fn status(&self) -> LedgerStatus {
        match self.resume_point() {
            Some(at) => LedgerStatus::Resumable { at },
            None => LedgerStatus::Complete,
        }
    }

    /// Render the ledger back into its line format.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.records.len() + 2);
        lines.push(self.segment_length.to_string());
        lines.extend(self.records.iter().map(|r| format!("{} {}", r.start, r.text)));
        match self.tail {
            LedgerTail::Open => {}
            LedgerTail::ResumeAt(at) => lines.push(at.to_string()),
            LedgerTail::Complete => lines.push(COMPLETE_MARKER.to_string()),
        }
        lines
    }
}

/// Classify the ledger at `path`.
pub fn inspect(path: &Path) -> Result<LedgerStatus> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LedgerStatus::NotExisting),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            return Ok(LedgerStatus::Malformed("not valid UTF-8".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(LedgerStatus::Empty);
    }

    Ok(match Ledger::parse(&content) {
        Ok(ledger) => ledger.status(),
        Err(MalformedLedger(reason)) => LedgerStatus::Malformed(reason),
    })
}

/// Write-through appender. Every record is flushed to disk before the call
/// returns, so a crash loses at most the window in flight.
#[derive(Debug)]
pub struct LedgerWriter {
    path: PathBuf,
    file: File,
}

impl LedgerWriter {
    /// Start a new ledger, replacing whatever was at `path`.
    pub fn create(path: &Path, segment_length: u32) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = Self {
            path: path.to_path_buf(),
            file,
        };
        writer.write_line(&segment_length.to_string())?;
        debug!("Started ledger {}", path.display());
        Ok(writer)
    }

    /// Reopen an interrupted ledger for appending.
    ///
    /// The length line and speech records are rewritten verbatim without the
    /// old resume marker. The rewrite goes through a temp file in the same
    /// directory so the previous ledger stays intact until the swap.
    pub fn resume(path: &Path, ledger: &Ledger) -> Result<Self> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir)?;
        writeln!(tmp, "{}", ledger.segment_length)?;
        for record in &ledger.records {
            writeln!(tmp, "{} {}", record.start, record.text)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        let file = OpenOptions::new().append(true).open(path)?;
        debug!(
            "Reopened ledger {} with {} speech records",
            path.display(),
            ledger.records.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn append_speech(&mut self, start: u64, text: &str) -> Result<()> {
        let text = normalize_transcript(text);
        self.write_line(&format!("{start} {text}"))
    }

    /// Close the ledger with a resume point.
    pub fn mark_resume(mut self, at: u64) -> Result<()> {
        self.write_line(&at.to_string())?;
        debug!("Ledger {} paused at {}s", self.path.display(), at);
        Ok(())
    }

    /// Close the ledger as fully analysed.
    pub fn mark_complete(mut self) -> Result<()> {
        self.write_line(COMPLETE_MARKER)?;
        debug!("Ledger {} complete", self.path.display());
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}
