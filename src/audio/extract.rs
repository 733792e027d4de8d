use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{ExtractorError, Result};

use super::MediaTool;

/// Containers that are re-encoded when cut; everything else is stream-copied.
const LOSSLESS_EXTENSIONS: &[&str] = &["wav", "flac"];

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| {
            ExtractorError::AudioExtraction(format!(
                "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(ExtractorError::AudioExtraction(
            "FFmpeg check failed".to_string(),
        ));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    let output = Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|e| {
            ExtractorError::AudioExtraction(format!(
                "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(ExtractorError::AudioExtraction(
            "FFprobe check failed".to_string(),
        ));
    }

    debug!("FFprobe is available");
    Ok(())
}

/// Get audio duration in seconds using FFprobe.
pub fn get_audio_duration(input: &Path) -> Result<f64> {
    if !input.exists() {
        return Err(ExtractorError::FileNotFound(input.display().to_string()));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|e| ExtractorError::AudioExtraction(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractorError::AudioExtraction(format!(
            "FFprobe failed for {}: {}",
            input.display(),
            stderr.trim()
        )));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout)).map_err(|reason| {
        ExtractorError::AudioExtraction(format!("{} ({})", reason, input.display()))
    })
}

fn parse_duration(raw: &str) -> std::result::Result<f64, String> {
    let trimmed = raw.trim();
    let secs: f64 = trimmed
        .parse()
        .map_err(|e| format!("Failed to parse duration '{trimmed}': {e}"))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("Invalid duration '{trimmed}'"));
    }
    Ok(secs)
}

/// Convert an audio file into mono 16-bit PCM at 16kHz for speech analysis.
pub fn convert_for_analysis(input: &Path, output: &Path) -> Result<()> {
    if !input.exists() {
        return Err(ExtractorError::FileNotFound(input.display().to_string()));
    }

    info!("Converting {} for analysis", input.display());

    let status = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
        .arg(output)
        .status()
        .map_err(|e| ExtractorError::AudioExtraction(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() {
        return Err(ExtractorError::AudioExtraction(format!(
            "FFmpeg conversion of {} failed",
            input.display()
        )));
    }

    if !output.exists() {
        return Err(ExtractorError::AudioExtraction(format!(
            "Converted file {} was not created",
            output.display()
        )));
    }

    debug!("Converted audio written to {}", output.display());
    Ok(())
}

fn is_lossless(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| LOSSLESS_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build the FFmpeg argument list for cutting `[start, start + duration)`.
///
/// Lossless targets are decoded and seeked accurately after the input;
/// lossy targets seek on the input and copy the stream untouched.
fn cut_args(input: &Path, output: &Path, start: f64, duration: f64) -> Vec<String> {
    let start = format!("{start:.3}");
    let duration = format!("{duration:.3}");
    let input = input.to_string_lossy().into_owned();
    let output_str = output.to_string_lossy().into_owned();

    let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
    if is_lossless(output) {
        args.extend(["-i".into(), input, "-ss".into(), start, "-t".into(), duration]);
    } else {
        args.extend([
            "-ss".into(),
            start,
            "-i".into(),
            input,
            "-t".into(),
            duration,
            "-c".into(),
            "copy".into(),
        ]);
    }
    args.push(output_str);
    args
}

/// Cut a segment out of `input` into `output`.
pub fn cut_segment(input: &Path, output: &Path, start: f64, duration: f64) -> Result<()> {
    let cut_error = |reason: String| ExtractorError::SegmentCut {
        path: input.to_path_buf(),
        start,
        duration,
        reason,
    };

    if !input.exists() {
        return Err(ExtractorError::FileNotFound(input.display().to_string()));
    }

    if duration <= 0.0 {
        return Err(cut_error("segment duration is zero".to_string()));
    }

    debug!(
        "Cutting {}: start={:.3}, duration={:.3} -> {}",
        input.display(),
        start,
        duration,
        output.display()
    );

    let output_status = Command::new("ffmpeg")
        .args(cut_args(input, output, start, duration))
        .output()
        .map_err(|e| cut_error(format!("failed to run FFmpeg: {e}")))?;

    if !output_status.status.success() {
        let stderr = String::from_utf8_lossy(&output_status.stderr);
        return Err(cut_error(format!(
            "FFmpeg exited with {}: {}",
            output_status.status,
            stderr.trim()
        )));
    }

    if !output.exists() {
        return Err(cut_error(format!("{} was not created", output.display())));
    }

    Ok(())
}

/// [`MediaTool`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegTool;

impl FfmpegTool {
    /// Create the tool after making sure both binaries are on the PATH.
    pub fn new() -> Result<Self> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(Self)
    }
}

impl MediaTool for FfmpegTool {
    fn probe_duration(&self, source: &Path) -> Result<f64> {
        get_audio_duration(source)
    }

    fn prepare_for_analysis(&self, source: &Path, dest: &Path) -> Result<()> {
        convert_for_analysis(source, dest)
    }

    fn cut(&self, source: &Path, start: f64, duration: f64, dest: &Path) -> Result<()> {
        cut_segment(source, dest, start, duration)
    }
}
