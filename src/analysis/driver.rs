use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisOutcome, AnalysisReport, CancelToken, SegmentSampler, Window};
use crate::audio::MediaTool;
use crate::config::DEFAULT_SEGMENT_LENGTH;
use crate::error::Result;
use crate::ledger::{self, ledger_path_for, Ledger, LedgerStatus, LedgerTail, LedgerWriter};
use crate::recognize::{normalize_transcript, Observation, Recognizer};
use crate::segments::format_seconds;

/// Scans a recording window by window and records where speech was heard.
///
/// The ledger next to the input decides where a run starts:
/// - missing, empty or unreadable: fresh scan from 0
/// - ends in a resume point: continue there, keeping earlier records
/// - complete: nothing to do
///
/// Every speech record is on disk before the next window is cut, so a killed
/// process loses at most the window in flight.
pub struct SegmentAnalysisDriver {
    input: PathBuf,
    ledger_path: PathBuf,
    media: Arc<dyn MediaTool>,
    recognizer: Arc<dyn Recognizer>,
    segment_length: u32,
    cancel: CancelToken,
    show_progress: bool,
}

impl SegmentAnalysisDriver {
    pub fn new(
        input: impl Into<PathBuf>,
        media: Arc<dyn MediaTool>,
        recognizer: Arc<dyn Recognizer>,
    ) -> Self {
        let input = input.into();
        Self {
            ledger_path: ledger_path_for(&input),
            input,
            media,
            recognizer,
            segment_length: DEFAULT_SEGMENT_LENGTH,
            cancel: CancelToken::default(),
            show_progress: false,
        }
    }

    /// Window length for fresh scans. A resumed scan keeps the length stored
    /// in its ledger.
    pub fn with_segment_length(mut self, seconds: u32) -> Self {
        self.segment_length = seconds;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn run(&self) -> Result<AnalysisReport> {
        let total = self.media.probe_duration(&self.input)?;
        let status = ledger::inspect(&self.ledger_path)?;
        debug!("Ledger {}: {:?}", self.ledger_path.display(), status);

        let resume = match status {
            LedgerStatus::Complete => {
                info!(
                    "{} is already fully analysed, skipping scan",
                    self.input.display()
                );
                return Ok(AnalysisReport {
                    outcome: AnalysisOutcome::AlreadyComplete,
                    total_duration: total,
                    ledger: Ledger::read(&self.ledger_path)?,
                });
            }
            LedgerStatus::Resumable { at } => Some((Ledger::read(&self.ledger_path)?, at)),
            LedgerStatus::Malformed(reason) => {
                warn!(
                    "Discarding malformed ledger {}: {}",
                    self.ledger_path.display(),
                    reason
                );
                None
            }
            LedgerStatus::NotExisting | LedgerStatus::Empty => None,
        };

        let work_dir = TempDir::new()?;
        debug!("Using temp directory: {:?}", work_dir.path());
        let analysable = work_dir.path().join("analysis.wav");
        self.media.prepare_for_analysis(&self.input, &analysable)?;

        let (mut writer, mut ledger, first_window) = match resume {
            Some((mut ledger, at)) => {
                if ledger.segment_length() != self.segment_length {
                    warn!(
                        "Ledger uses {}s windows, continuing with those instead of {}s",
                        ledger.segment_length(),
                        self.segment_length
                    );
                }
                let writer = LedgerWriter::resume(&self.ledger_path, &ledger)?;
                ledger.set_tail(LedgerTail::Open);
                info!(
                    "Resuming analysis at {} (of {})",
                    format_seconds(at as f64),
                    format_seconds(total)
                );
                (writer, ledger, at)
            }
            None => {
                let writer = LedgerWriter::create(&self.ledger_path, self.segment_length)?;
                info!(
                    "Analysing {} ({}) in {}s windows",
                    self.input.display(),
                    format_seconds(total),
                    self.segment_length
                );
                (writer, Ledger::new(self.segment_length), 0)
            }
        };

        let length = ledger.segment_length();
        let step = u64::from(length);
        let sampler = SegmentSampler::new(
            self.media.as_ref(),
            self.recognizer.as_ref(),
            &analysable,
            work_dir.path(),
        );
        let progress = self.progress_bar(total, first_window);

        info!("Listening for speech with {}", self.recognizer.name());

        let mut start = first_window;
        while (start as f64) < total {
            let window = Window::new(start, length, total);
            if start % 60 < step {
                info!(
                    "Timestamp {} (of {})...",
                    format_seconds(start as f64),
                    format_seconds(total)
                );
            }

            let observation = match sampler.sample(&window).await {
                Ok(observation) => observation,
                Err(e) => {
                    warn!(
                        "Sampling window at {} failed, ledger resumes there",
                        format_seconds(start as f64)
                    );
                    if let Err(write_err) = writer.mark_resume(start) {
                        warn!("Could not record resume point: {}", write_err);
                    }
                    abandon(progress);
                    return Err(e);
                }
            };

            match observation {
                Observation::Speech(text) => {
                    let text = normalize_transcript(&text);
                    if text.is_empty() {
                        debug!("Empty transcript at {}, treating as silence", start);
                    } else {
                        writer.append_speech(start, &text)?;
                        info!(
                            "-> Speech at {}: \"{}\"",
                            format_seconds(start as f64),
                            text
                        );
                        ledger.push_speech(start, text);
                    }
                }
                Observation::Silence => {}
                Observation::Unresolvable => {
                    warn!(
                        "{} gave no answer for the window at {}; run again to continue",
                        self.recognizer.name(),
                        format_seconds(start as f64)
                    );
                    writer.mark_resume(start)?;
                    ledger.set_tail(LedgerTail::ResumeAt(start));
                    abandon(progress);
                    return Ok(AnalysisReport {
                        outcome: AnalysisOutcome::Incomplete { resume_at: start },
                        total_duration: total,
                        ledger,
                    });
                }
            }

            if let Some(ref pb) = progress {
                pb.set_position(window.end as u64);
            }

            if self.cancel.is_cancelled() && window.end < total {
                let resume_at = start + step;
                info!(
                    "Analysis interrupted, next run continues at {}",
                    format_seconds(resume_at as f64)
                );
                writer.mark_resume(resume_at)?;
                ledger.set_tail(LedgerTail::ResumeAt(resume_at));
                abandon(progress);
                return Ok(AnalysisReport {
                    outcome: AnalysisOutcome::Interrupted { resume_at },
                    total_duration: total,
                    ledger,
                });
            }

            start += step;
        }

        writer.mark_complete()?;
        ledger.set_tail(LedgerTail::Complete);

        if let Some(pb) = progress {
            pb.finish_with_message("Analysis complete");
        }
        info!(
            "Analysis complete: {} windows with speech",
            ledger.records().len()
        );

        Ok(AnalysisReport {
            outcome: AnalysisOutcome::Completed,
            total_duration: total,
            ledger,
        })
    }

    fn progress_bar(&self, total: f64, position: u64) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(total.ceil() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}s ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_position(position);
        Some(pb)
    }
}

fn abandon(progress: Option<ProgressBar>) {
    if let Some(pb) = progress {
        pb.abandon();
    }
}
