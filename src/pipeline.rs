use crate::analysis::{AnalysisOutcome, AnalysisReport, CancelToken, SegmentAnalysisDriver};
use crate::audio::{EnergyVad, FfmpegTool, MediaTool, VoiceActivity};
use crate::config::{Config, TrimSettings, DEFAULT_SEGMENT_LENGTH};
use crate::error::{ExtractorError, Result};
use crate::recognize::{create_recognizer, Recognizer};
use crate::segments::{
    apply_selection, format_seconds, merge_music_speech, reconstruct, MusicSegment,
};
use crate::trim::{BoundaryTrimmer, SkipReason, TrimOutcome};
use console::style;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::info;

/// External collaborators of an extraction run.
#[derive(Clone)]
pub struct Toolset {
    pub media: Arc<dyn MediaTool>,
    pub recognizer: Arc<dyn Recognizer>,
    pub vad: Arc<dyn VoiceActivity>,
}

impl Toolset {
    /// ffmpeg, the configured recognizer and the energy VAD.
    pub fn from_config(config: &Config) -> Result<Self> {
        let media = FfmpegTool::new().map_err(|_| {
            ExtractorError::AudioExtraction(
                "FFmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)".to_string(),
            )
        })?;
        Ok(Self {
            media: Arc::new(media),
            recognizer: Arc::from(create_recognizer(config)?),
            vad: Arc::new(EnergyVad::default()),
        })
    }
}

/// What to do with a recording.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Window length for a fresh scan, in seconds.
    pub segment_length: u32,
    /// Stretch each segment across the following speech island.
    pub merge: bool,
    /// Selection such as `1,2-3,6`; `None` keeps every segment.
    pub selection: Option<String>,
    /// Base name of the exported files; defaults to the input's stem.
    pub name: Option<String>,
    /// Stop after listing the segments.
    pub analyse_only: bool,
    /// Trim exported clips; `None` exports them untouched.
    pub trim: Option<TrimSettings>,
    /// Show a progress bar while scanning.
    pub show_progress: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            segment_length: DEFAULT_SEGMENT_LENGTH,
            merge: false,
            selection: None,
            name: None,
            analyse_only: false,
            trim: Some(TrimSettings::default()),
            show_progress: true,
        }
    }
}

/// One music segment written next to the input.
#[derive(Debug, Clone)]
pub struct ExportedSegment {
    pub number: usize,
    pub path: PathBuf,
    pub segment: MusicSegment,
    pub trim: Option<TrimOutcome>,
}

#[derive(Debug)]
pub struct ExtractionResult {
    pub analysis: AnalysisReport,
    /// Segments after merging and selection; empty while the scan is unfinished.
    pub segments: Vec<MusicSegment>,
    pub exports: Vec<ExportedSegment>,
    pub total_time: Duration,
}

impl ExtractionResult {
    pub fn outcome(&self) -> AnalysisOutcome {
        self.analysis.outcome
    }
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_filename(name: &str) -> String {
    static FORBIDDEN: OnceLock<Regex> = OnceLock::new();
    let re = FORBIDDEN.get_or_init(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("Invalid regex"));
    re.replace_all(name.trim(), "_").into_owned()
}

/// `NN_<name><ext>` next to `input`.
pub fn export_path(input: &Path, number: usize, name: &str) -> PathBuf {
    let ext = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    input.with_file_name(format!("{:02}_{}{}", number, sanitize_filename(name), ext))
}

/// Find the music in `input` and, unless only analysing, export it.
///
/// This is the main entry point. It:
/// 1. Scans the recording for speech (or picks up an earlier scan)
/// 2. Reconstructs music segments from the speech ledger, merging if asked
/// 3. Applies the segment selection
/// 4. Cuts each segment out of the input
/// 5. Trims speech remnants off each exported clip
///
/// Nothing is exported while the scan is unfinished.
pub async fn extract_music(
    input: &Path,
    tools: &Toolset,
    options: &ExtractOptions,
    cancel: CancelToken,
) -> Result<ExtractionResult> {
    let start_time = Instant::now();

    if !input.exists() {
        return Err(ExtractorError::FileNotFound(input.display().to_string()));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 1: Speech scan
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 1/3: Scanning {:?} for speech", input);
    let driver = SegmentAnalysisDriver::new(input, tools.media.clone(), tools.recognizer.clone())
        .with_segment_length(options.segment_length)
        .with_cancel_token(cancel)
        .with_progress(options.show_progress);
    let analysis = driver.run().await?;

    if !analysis.outcome.is_complete() {
        return Ok(ExtractionResult {
            analysis,
            segments: Vec::new(),
            exports: Vec::new(),
            total_time: start_time.elapsed(),
        });
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 2: Music segments
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 2/3: Reconstructing music segments");
    let found = if options.merge {
        merge_music_speech(&analysis.ledger, analysis.total_duration)
    } else {
        reconstruct(&analysis.ledger, analysis.total_duration)
    };
    let segments = apply_selection(&found, options.selection.as_deref().unwrap_or(""))?;
    info!("{} music segments, {} selected", found.len(), segments.len());

    if options.analyse_only || segments.is_empty() {
        return Ok(ExtractionResult {
            analysis,
            segments,
            exports: Vec::new(),
            total_time: start_time.elapsed(),
        });
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 3: Export
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 3/3: Exporting {} segments", segments.len());
    let name = match options.name {
        Some(ref name) => name.clone(),
        None => input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "music".to_string()),
    };
    let trimmer = options
        .trim
        .clone()
        .map(|settings| BoundaryTrimmer::new(tools.media.clone(), tools.vad.clone(), settings));

    let exports = export_segments(
        input,
        &name,
        &segments,
        tools.media.as_ref(),
        trimmer.as_ref(),
    )?;

    Ok(ExtractionResult {
        analysis,
        segments,
        exports,
        total_time: start_time.elapsed(),
    })
}

/// Cut every segment out of `input` and trim the result when a trimmer is given.
pub fn export_segments(
    input: &Path,
    name: &str,
    segments: &[MusicSegment],
    media: &dyn MediaTool,
    trimmer: Option<&BoundaryTrimmer>,
) -> Result<Vec<ExportedSegment>> {
    let mut exports = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let number = i + 1;
        let path = export_path(input, number, name);

        media.cut(input, segment.begin as f64, segment.duration(), &path)?;
        info!(
            "Exported segment {} from {} to {} to {}",
            number,
            format_seconds(segment.begin as f64),
            format_seconds(segment.end),
            path.display()
        );

        let trim = match trimmer {
            Some(trimmer) => Some(trimmer.trim(&path)?),
            None => None,
        };

        exports.push(ExportedSegment {
            number,
            path,
            segment: segment.clone(),
            trim,
        });
    }

    Ok(exports)
}

/// Print the numbered segment list.
pub fn print_segments(segments: &[MusicSegment]) {
    println!();
    println!("{}", style("Music segments:").bold());
    if segments.is_empty() {
        println!("  (none)");
    }
    for (no, segment) in segments.iter().enumerate() {
        println!(
            "{}) {} to {} -> {}",
            style(no + 1).cyan(),
            format_seconds(segment.begin as f64),
            format_seconds(segment.end),
            style(format_seconds(segment.duration())).green()
        );
        println!("   before: {}", segment.speech_before);
        println!("   after:  {}", segment.speech_after);
    }
    println!();
}

/// Print a summary of the extraction.
pub fn print_summary(result: &ExtractionResult) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      Music Extraction Summary                  ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Recording:  {}", format_seconds(result.analysis.total_duration));
    println!(
        "  Speech:     {} windows of {}s",
        result.analysis.ledger.records().len(),
        result.analysis.ledger.segment_length()
    );
    println!("  Segments:   {}", result.segments.len());
    for export in &result.exports {
        let note = match export.trim {
            Some(TrimOutcome::Trimmed { begin, end, .. }) => {
                format!("trimmed to {}", format_seconds(end - begin))
            }
            Some(TrimOutcome::Skipped(SkipReason::TooShort { .. })) => {
                "too short to trim".to_string()
            }
            Some(TrimOutcome::Skipped(SkipReason::NothingLeft)) => "not trimmed".to_string(),
            None => "untrimmed".to_string(),
        };
        println!(
            "    {} {}",
            style(export.path.display()).cyan(),
            style(format!("({note})")).dim()
        );
    }
    println!();
    println!("  Total:      {:.2}s", result.total_time.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
