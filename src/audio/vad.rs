use std::path::Path;
use std::time::Duration;

use hound::WavReader;
use tracing::debug;

use crate::error::{ExtractorError, Result};

use super::SpeechRegion;

/// Voice-activity detection over a clip on disk.
pub trait VoiceActivity: Send + Sync {
    /// Ordered speech spans inside `clip`, relative to its start. May be empty.
    fn speech_spans(&self, clip: &Path) -> Result<Vec<SpeechRegion>>;
}

/// Configuration for the energy-based detector.
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// RMS energy threshold for speech detection (0.0 to 1.0).
    /// Lower values are more sensitive to quiet speech.
    pub energy_threshold: f32,

    /// Minimum duration of speech to be considered a valid region.
    pub min_speech_duration: Duration,

    /// Gaps shorter than this are bridged into one region.
    pub min_silence_duration: Duration,

    /// Size of analysis frame in samples.
    pub frame_size: usize,

    /// Hop size between frames in samples.
    pub hop_size: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.01,
            min_speech_duration: Duration::from_millis(250),
            min_silence_duration: Duration::from_millis(500),
            frame_size: 1600,
            hop_size: 800,
        }
    }
}

fn frame_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

fn read_mono_samples(audio_path: &Path) -> Result<(Vec<i16>, u32)> {
    let reader = WavReader::open(audio_path).map_err(|e| {
        ExtractorError::AudioExtraction(format!(
            "Failed to open WAV file {}: {e}",
            audio_path.display()
        ))
    })?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .into_samples::<i16>()
            .map(|s| s.unwrap_or(0))
            .collect(),
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| (s.unwrap_or(0.0) * i16::MAX as f32) as i16)
            .collect(),
    };

    // Downmix by averaging channels so multi-channel clips still work.
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / frame.len() as i32) as i16)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Detect speech regions in a WAV audio file.
pub fn detect_speech_regions(audio_path: &Path, config: &VadConfig) -> Result<Vec<SpeechRegion>> {
    let (samples, sample_rate) = read_mono_samples(audio_path)?;

    if samples.is_empty() || sample_rate == 0 {
        return Ok(vec![]);
    }

    let energies = energy_profile(&samples, config.frame_size, config.hop_size);
    let voiced: Vec<bool> = energies
        .iter()
        .map(|&e| e >= config.energy_threshold)
        .collect();

    let regions = voiced_frames_to_regions(
        &voiced,
        sample_rate,
        config.hop_size,
        config.min_speech_duration,
        config.min_silence_duration,
    );

    debug!(
        "VAD found {} speech regions in {} ({:.2}s)",
        regions.len(),
        audio_path.display(),
        samples.len() as f64 / sample_rate as f64
    );

    Ok(regions)
}

fn energy_profile(samples: &[i16], frame_size: usize, hop_size: usize) -> Vec<f32> {
    if frame_size == 0 || hop_size == 0 {
        return Vec::new();
    }

    let mut energies = Vec::new();
    let mut pos = 0;
    while pos + frame_size <= samples.len() {
        energies.push(frame_rms(&samples[pos..pos + frame_size]));
        pos += hop_size;
    }
    energies
}

/// Turn per-frame voiced flags into time regions, bridging short gaps and
/// dropping regions that are too short.
fn voiced_frames_to_regions(
    voiced: &[bool],
    sample_rate: u32,
    hop_size: usize,
    min_speech_duration: Duration,
    min_silence_duration: Duration,
) -> Vec<SpeechRegion> {
    if voiced.is_empty() {
        return vec![];
    }

    let frame_secs = hop_size as f64 / sample_rate as f64;
    let min_speech_frames = (min_speech_duration.as_secs_f64() / frame_secs).ceil() as usize;
    let min_gap_frames = (min_silence_duration.as_secs_f64() / frame_secs).ceil() as usize;

    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, &is_voiced) in voiced.iter().enumerate() {
        match (is_voiced, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                runs.push((start, i));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        runs.push((start, voiced.len()));
    }

    let mut bridged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in runs {
        if let Some((_, last_end)) = bridged.last_mut() {
            if start.saturating_sub(*last_end) < min_gap_frames {
                *last_end = end;
                continue;
            }
        }
        bridged.push((start, end));
    }

    bridged
        .into_iter()
        .filter(|(start, end)| end - start >= min_speech_frames)
        .map(|(start, end)| {
            SpeechRegion::from_secs(start as f64 * frame_secs, end as f64 * frame_secs)
        })
        .collect()
}

/// RMS energy detector reading PCM WAV clips with `hound`.
#[derive(Debug, Clone, Default)]
pub struct EnergyVad {
    config: VadConfig,
}

impl EnergyVad {
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }
}

impl VoiceActivity for EnergyVad {
    fn speech_spans(&self, clip: &Path) -> Result<Vec<SpeechRegion>> {
        detect_speech_regions(clip, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_wav(path: &Path, segments: &[(f64, i16)]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &(secs, amplitude) in segments {
            let count = (secs * 16000.0) as usize;
            for i in 0..count {
                let sample = if i % 2 == 0 { amplitude } else { -amplitude };
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_frame_rms_silence() {
        assert_eq!(frame_rms(&[0i16; 100]), 0.0);
    }

    #[test]
    fn test_frame_rms_full_scale() {
        let rms = frame_rms(&[i16::MAX; 100]);
        assert!((rms - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_regions_bridge_short_gaps() {
        let voiced = vec![true, true, false, true, true];
        let regions = voiced_frames_to_regions(
            &voiced,
            16000,
            800,
            Duration::from_millis(50),
            Duration::from_millis(500),
        );
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start, Duration::ZERO);
        assert!((regions[0].end.as_secs_f64() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_regions_drop_short_bursts() {
        let voiced = vec![false, true, false, false, false, false, false, false, false, false];
        let regions = voiced_frames_to_regions(
            &voiced,
            16000,
            800,
            Duration::from_millis(250),
            Duration::from_millis(100),
        );
        assert!(regions.is_empty());
    }

    #[test]
    fn test_detects_loud_middle_of_clip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&path, &[(1.0, 0), (2.0, 8000), (1.0, 0)]);

        let spans = EnergyVad::default().speech_spans(&path).unwrap();
        assert_eq!(spans.len(), 1);
        assert!((spans[0].start.as_secs_f64() - 1.0).abs() < 0.1);
        assert!((spans[0].end.as_secs_f64() - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_silent_clip_has_no_spans() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quiet.wav");
        write_wav(&path, &[(2.0, 0)]);

        assert!(EnergyVad::default().speech_spans(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_wav_is_error() {
        let result = EnergyVad::default().speech_spans(Path::new("/nonexistent/clip.wav"));
        assert!(result.is_err());
    }
}
