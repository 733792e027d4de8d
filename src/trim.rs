use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::audio::{MediaTool, SpeechRegion, TransientClip, VoiceActivity};
use crate::config::TrimSettings;
use crate::error::{ExtractorError, Result};
use crate::segments::format_seconds;

/// Why a clip was left untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Shorter than the inspection window.
    TooShort { duration: f64 },
    /// Speech at head and tail overlaps; trimming would remove everything.
    NothingLeft,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrimOutcome {
    Trimmed {
        begin: f64,
        end: f64,
        /// Untrimmed original, when kept.
        backup: Option<PathBuf>,
    },
    Skipped(SkipReason),
}

/// Where the trimmed clip should start and end, given the speech found in its
/// first and last `inspection_window` seconds.
///
/// The head keeps everything after its last speech span (plus margin); the
/// tail keeps everything before its first speech span (minus margin). Tail
/// span times are relative to the start of the tail window.
pub fn trim_bounds(
    total: f64,
    settings: &TrimSettings,
    head: &[SpeechRegion],
    tail: &[SpeechRegion],
) -> (f64, f64) {
    let window = settings.inspection_window;

    let begin = head
        .last()
        .map(|span| (span.end.as_secs_f64() + settings.head_margin).min(window))
        .unwrap_or(0.0);

    let end = tail
        .first()
        .map(|span| {
            (total - (window - span.start.as_secs_f64()) - settings.tail_margin).min(total)
        })
        .unwrap_or(total);

    (begin, end)
}

/// `<stem>_with_speech.<ext>` next to `clip`.
pub fn backup_path_for(clip: &Path) -> PathBuf {
    let stem = clip.file_stem().unwrap_or_default().to_string_lossy();
    let name = match clip.extension() {
        Some(ext) => format!("{}_with_speech.{}", stem, ext.to_string_lossy()),
        None => format!("{}_with_speech", stem),
    };
    clip.with_file_name(name)
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to).map_err(|e| ExtractorError::Rename {
        path: from.to_path_buf(),
        reason: match e.kind() {
            ErrorKind::NotFound => "not found".to_string(),
            ErrorKind::PermissionDenied => "permission denied".to_string(),
            _ => e.to_string(),
        },
    })
}

/// Cuts speech remnants (announcements, jingles) off the head and tail of an
/// exported music clip.
pub struct BoundaryTrimmer {
    media: Arc<dyn MediaTool>,
    vad: Arc<dyn VoiceActivity>,
    settings: TrimSettings,
}

impl BoundaryTrimmer {
    pub fn new(
        media: Arc<dyn MediaTool>,
        vad: Arc<dyn VoiceActivity>,
        settings: TrimSettings,
    ) -> Self {
        Self {
            media,
            vad,
            settings,
        }
    }

    /// Trim `clip` in place.
    ///
    /// The untrimmed file is renamed to its backup name first and the trimmed
    /// part is cut from there back to the original name.
    pub fn trim(&self, clip: &Path) -> Result<TrimOutcome> {
        if !clip.exists() {
            return Err(ExtractorError::FileNotFound(clip.display().to_string()));
        }

        let work_dir = TempDir::new()?;
        let wav = work_dir.path().join("trim.wav");
        self.media.prepare_for_analysis(clip, &wav)?;
        let total = self.media.probe_duration(&wav)?;

        let window = self.settings.inspection_window;
        if total < window {
            info!(
                "{} is shorter than {}s, not trimming",
                clip.display(),
                window
            );
            return Ok(TrimOutcome::Skipped(SkipReason::TooShort { duration: total }));
        }

        let head = self.speech_in(&wav, 0.0, &work_dir.path().join("head.wav"))?;
        let tail = self.speech_in(&wav, total - window, &work_dir.path().join("tail.wav"))?;
        let (begin, end) = trim_bounds(total, &self.settings, &head, &tail);
        debug!(
            "Trim bounds for {}: {:.3}..{:.3} of {:.3}",
            clip.display(),
            begin,
            end,
            total
        );

        if end <= begin {
            warn!(
                "{} has speech all over its edges, not trimming",
                clip.display()
            );
            return Ok(TrimOutcome::Skipped(SkipReason::NothingLeft));
        }

        let backup = backup_path_for(clip);
        rename(clip, &backup)?;

        if let Err(e) = self.media.cut(&backup, begin, end - begin, clip) {
            if let Err(restore_err) = rename(&backup, clip) {
                warn!("Could not restore {}: {}", clip.display(), restore_err);
            }
            return Err(e);
        }

        info!(
            "Trimmed {}: {} to {} ({})",
            clip.display(),
            format_seconds(begin),
            format_seconds(end),
            format_seconds(end - begin)
        );

        let backup = if self.settings.keep_backup {
            Some(backup)
        } else {
            std::fs::remove_file(&backup)?;
            None
        };

        Ok(TrimOutcome::Trimmed { begin, end, backup })
    }

    fn speech_in(&self, wav: &Path, start: f64, dest: &Path) -> Result<Vec<SpeechRegion>> {
        let part = TransientClip::new(dest);
        self.media
            .cut(wav, start, self.settings.inspection_window, part.path())?;
        self.vad.speech_spans(part.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const CLIP_LENGTH: f64 = 300.0;

    /// Pretends every clip is `CLIP_LENGTH` long and records cuts.
    #[derive(Default)]
    struct FakeMedia {
        duration: Option<f64>,
        cuts: Mutex<Vec<(PathBuf, f64, f64, PathBuf)>>,
    }

    impl MediaTool for FakeMedia {
        fn probe_duration(&self, _source: &Path) -> Result<f64> {
            Ok(self.duration.unwrap_or(CLIP_LENGTH))
        }

        fn prepare_for_analysis(&self, _source: &Path, dest: &Path) -> Result<()> {
            std::fs::write(dest, b"RIFF")?;
            Ok(())
        }

        fn cut(&self, source: &Path, start: f64, duration: f64, dest: &Path) -> Result<()> {
            self.cuts.lock().unwrap().push((
                source.to_path_buf(),
                start,
                duration,
                dest.to_path_buf(),
            ));
            std::fs::write(dest, b"trimmed")?;
            Ok(())
        }
    }

    /// Speech spans keyed by the inspected part's file name.
    #[derive(Default)]
    struct FakeVad {
        spans: HashMap<&'static str, Vec<SpeechRegion>>,
        seen: Mutex<Vec<PathBuf>>,
    }

    impl VoiceActivity for FakeVad {
        fn speech_spans(&self, clip: &Path) -> Result<Vec<SpeechRegion>> {
            self.seen.lock().unwrap().push(clip.to_path_buf());
            let name = clip.file_name().unwrap().to_str().unwrap();
            Ok(self.spans.get(name).cloned().unwrap_or_default())
        }
    }

    fn settings(keep_backup: bool) -> TrimSettings {
        TrimSettings {
            keep_backup,
            ..TrimSettings::default()
        }
    }

    fn clip_in(dir: &TempDir) -> PathBuf {
        let clip = dir.path().join("03_Bach.mp3");
        std::fs::write(&clip, b"original").unwrap();
        clip
    }

    #[test]
    fn test_trim_bounds_without_speech() {
        let (begin, end) = trim_bounds(300.0, &TrimSettings::default(), &[], &[]);
        assert_eq!(begin, 0.0);
        assert_eq!(end, 300.0);
    }

    #[test]
    fn test_trim_bounds_with_speech() {
        let head = [
            SpeechRegion::from_secs(0.5, 2.0),
            SpeechRegion::from_secs(4.0, 7.5),
        ];
        let tail = [
            SpeechRegion::from_secs(20.0, 23.0),
            SpeechRegion::from_secs(24.0, 25.0),
        ];
        let (begin, end) = trim_bounds(300.0, &TrimSettings::default(), &head, &tail);
        assert!((begin - 7.7).abs() < 1e-9);
        assert!((end - 294.8).abs() < 1e-9);
    }

    #[test]
    fn test_trim_bounds_head_clamped_to_window() {
        let head = [SpeechRegion::from_secs(10.0, 24.9)];
        let tail = [SpeechRegion::from_secs(25.0, 25.0)];
        let (begin, end) = trim_bounds(300.0, &TrimSettings::default(), &head, &tail);
        assert_eq!(begin, 25.0);
        assert!((end - 299.8).abs() < 1e-9);
    }

    #[test]
    fn test_backup_path_for() {
        assert_eq!(
            backup_path_for(Path::new("/music/01_Bach.mp3")),
            PathBuf::from("/music/01_Bach_with_speech.mp3")
        );
        assert_eq!(
            backup_path_for(Path::new("clip")),
            PathBuf::from("clip_with_speech")
        );
    }

    #[test]
    fn test_trim_cuts_from_backup() {
        let dir = TempDir::new().unwrap();
        let clip = clip_in(&dir);
        let media = Arc::new(FakeMedia::default());
        let vad = Arc::new(FakeVad {
            spans: HashMap::from([
                ("head.wav", vec![SpeechRegion::from_secs(1.0, 9.8)]),
                ("tail.wav", vec![SpeechRegion::from_secs(15.0, 25.0)]),
            ]),
            ..Default::default()
        });
        let trimmer = BoundaryTrimmer::new(media.clone(), vad.clone(), settings(true));

        let outcome = trimmer.trim(&clip).unwrap();

        let backup = dir.path().join("03_Bach_with_speech.mp3");
        match outcome {
            TrimOutcome::Trimmed { begin, end, backup: kept } => {
                assert!((begin - 10.0).abs() < 1e-9);
                assert!((end - 289.8).abs() < 1e-9);
                assert_eq!(kept, Some(backup.clone()));
            }
            other => panic!("Expected Trimmed, got: {other:?}"),
        }

        assert_eq!(std::fs::read(&backup).unwrap(), b"original");
        assert_eq!(std::fs::read(&clip).unwrap(), b"trimmed");

        let cuts = media.cuts.lock().unwrap();
        assert_eq!(cuts.len(), 3);
        assert_eq!(cuts[0].1, 0.0);
        assert_eq!(cuts[1].1, 275.0);
        let (source, start, duration, dest) = &cuts[2];
        assert_eq!(source, &backup);
        assert!((start - 10.0).abs() < 1e-9);
        assert!((duration - 279.8).abs() < 1e-9);
        assert_eq!(dest, &clip);

        for part in vad.seen.lock().unwrap().iter() {
            assert!(!part.exists());
        }
    }

    #[test]
    fn test_trim_drops_backup_when_asked() {
        let dir = TempDir::new().unwrap();
        let clip = clip_in(&dir);
        let trimmer = BoundaryTrimmer::new(
            Arc::new(FakeMedia::default()),
            Arc::new(FakeVad::default()),
            settings(false),
        );

        let outcome = trimmer.trim(&clip).unwrap();

        assert_eq!(
            outcome,
            TrimOutcome::Trimmed {
                begin: 0.0,
                end: CLIP_LENGTH,
                backup: None
            }
        );
        assert!(clip.exists());
        assert!(!dir.path().join("03_Bach_with_speech.mp3").exists());
    }

    #[test]
    fn test_short_clip_is_skipped() {
        let dir = TempDir::new().unwrap();
        let clip = clip_in(&dir);
        let media = Arc::new(FakeMedia {
            duration: Some(12.0),
            ..Default::default()
        });
        let trimmer = BoundaryTrimmer::new(media.clone(), Arc::new(FakeVad::default()), settings(true));

        let outcome = trimmer.trim(&clip).unwrap();

        assert_eq!(
            outcome,
            TrimOutcome::Skipped(SkipReason::TooShort { duration: 12.0 })
        );
        assert!(media.cuts.lock().unwrap().is_empty());
        assert_eq!(std::fs::read(&clip).unwrap(), b"original");
    }

    #[test]
    fn test_speech_everywhere_is_skipped() {
        let dir = TempDir::new().unwrap();
        let clip = clip_in(&dir);
        let media = Arc::new(FakeMedia {
            duration: Some(30.0),
            ..Default::default()
        });
        let vad = Arc::new(FakeVad {
            spans: HashMap::from([
                ("head.wav", vec![SpeechRegion::from_secs(0.0, 24.0)]),
                ("tail.wav", vec![SpeechRegion::from_secs(1.0, 25.0)]),
            ]),
            ..Default::default()
        });
        let trimmer = BoundaryTrimmer::new(media, vad, settings(true));

        assert_eq!(
            trimmer.trim(&clip).unwrap(),
            TrimOutcome::Skipped(SkipReason::NothingLeft)
        );
        assert!(!dir.path().join("03_Bach_with_speech.mp3").exists());
    }

    #[test]
    fn test_missing_clip_is_error() {
        let trimmer = BoundaryTrimmer::new(
            Arc::new(FakeMedia::default()),
            Arc::new(FakeVad::default()),
            settings(true),
        );
        assert!(matches!(
            trimmer.trim(Path::new("/tmp/does_not_exist_01.mp3")),
            Err(ExtractorError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_rename_error_names_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.mp3");
        match rename(&missing, &dir.path().join("gone_with_speech.mp3")) {
            Err(ExtractorError::Rename { path, reason }) => {
                assert_eq!(path, missing);
                assert_eq!(reason, "not found");
            }
            other => panic!("Expected Rename error, got: {other:?}"),
        }
    }
}
