pub mod clip;
pub mod extract;
pub mod vad;

pub use clip::TransientClip;
pub use extract::{
    check_ffmpeg, check_ffprobe, convert_for_analysis, cut_segment, get_audio_duration,
    FfmpegTool,
};
pub use vad::{detect_speech_regions, EnergyVad, VadConfig, VoiceActivity};

use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// A region of speech detected in audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRegion {
    pub start: Duration,
    pub end: Duration,
}

impl SpeechRegion {
    pub fn from_secs(start: f64, end: f64) -> Self {
        Self {
            start: Duration::from_secs_f64(start),
            end: Duration::from_secs_f64(end),
        }
    }

    /// Get the duration of this speech region.
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Media operations delegated to an external transcoder.
///
/// Every operation must fail loudly: a non-zero exit of the underlying tool is
/// an error, never an empty result.
pub trait MediaTool: Send + Sync {
    /// Total duration of `source` in seconds.
    fn probe_duration(&self, source: &Path) -> Result<f64>;

    /// Convert `source` into mono 16 kHz PCM WAV at `dest`.
    fn prepare_for_analysis(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Cut `[start, start + duration)` of `source` into `dest`.
    fn cut(&self, source: &Path, start: f64, duration: f64, dest: &Path) -> Result<()>;
}
