pub mod finder;
pub mod merge;
pub mod select;

pub use finder::reconstruct;
pub use merge::merge_music_speech;
pub use select::{apply_selection, parse_selection};

use std::fmt;

/// Placeholder text for a segment edge that touches the recording boundary
/// instead of a spoken announcement.
pub const UNKNOWN_SPEECH: &str = "...";

/// Tolerance for comparing segment ends, in seconds.
const END_TOLERANCE: f64 = 0.01;

/// A stretch of the recording believed to contain music, bounded by the
/// speech heard right before and right after it.
#[derive(Debug, Clone)]
pub struct MusicSegment {
    /// Start in whole seconds (always a window start).
    pub begin: u64,
    pub speech_before: String,
    /// End in seconds; the recording end is fractional.
    pub end: f64,
    pub speech_after: String,
}

impl MusicSegment {
    pub fn new(
        begin: u64,
        speech_before: impl Into<String>,
        end: f64,
        speech_after: impl Into<String>,
    ) -> Self {
        Self {
            begin,
            speech_before: speech_before.into(),
            end,
            speech_after: speech_after.into(),
        }
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.begin as f64
    }
}

impl PartialEq for MusicSegment {
    fn eq(&self, other: &Self) -> bool {
        self.begin == other.begin
            && self.speech_before == other.speech_before
            && (self.end - other.end).abs() <= END_TOLERANCE
            && self.speech_after == other.speech_after
    }
}

impl fmt::Display for MusicSegment {
    /// Three lines: begin with the speech before, end with the speech after,
    /// then the duration.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", format_seconds(self.begin as f64), self.speech_before)?;
        writeln!(f, "{} {}", format_seconds(self.end), self.speech_after)?;
        write!(f, "{}", format_seconds(self.duration()))
    }
}

/// Format seconds as `m:ss`, or `m:ss.mmm` when there is a fractional part.
pub fn format_seconds(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let mut whole = seconds.trunc() as u64;
    let mut millis = ((seconds - seconds.trunc()) * 1000.0).round() as u64;
    if millis == 1000 {
        whole += 1;
        millis = 0;
    }

    let minutes = whole / 60;
    let rest = whole % 60;
    if millis > 0 {
        format!("{}:{:02}.{:03}", minutes, rest, millis)
    } else {
        format!("{}:{:02}", minutes, rest)
    }
}
