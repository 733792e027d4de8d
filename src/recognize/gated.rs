use crate::audio::VoiceActivity;
use crate::error::Result;
use crate::recognize::{Observation, Recognizer};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Runs local voice-activity detection first and only asks the wrapped
/// recognizer when there is something that sounds like speech.
pub struct VadGatedRecognizer<R, V> {
    inner: R,
    vad: V,
}

impl<R, V> VadGatedRecognizer<R, V>
where
    R: Recognizer,
    V: VoiceActivity,
{
    pub fn new(inner: R, vad: V) -> Self {
        Self { inner, vad }
    }
}

#[async_trait]
impl<R, V> Recognizer for VadGatedRecognizer<R, V>
where
    R: Recognizer,
    V: VoiceActivity,
{
    async fn recognize(&self, clip: &Path) -> Result<Observation> {
        let spans = self.vad.speech_spans(clip)?;
        if spans.is_empty() {
            debug!("No voice activity in {}, skipping {}", clip.display(), self.inner.name());
            return Ok(Observation::Silence);
        }
        self.inner.recognize(clip).await
    }

    fn name(&self) -> &'static str {
        "VAD-gated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SpeechRegion;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedVad(Vec<SpeechRegion>);

    impl VoiceActivity for FixedVad {
        fn speech_spans(&self, _clip: &Path) -> Result<Vec<SpeechRegion>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingRecognizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Recognizer for CountingRecognizer {
        async fn recognize(&self, _clip: &Path) -> Result<Observation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Observation::Speech("hallo".to_string()))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_quiet_clip_skips_inner() {
        let gated = VadGatedRecognizer::new(CountingRecognizer::default(), FixedVad(vec![]));
        let observation = tokio_test::block_on(gated.recognize(Path::new("clip.wav"))).unwrap();

        assert_eq!(observation, Observation::Silence);
        assert_eq!(gated.inner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_voiced_clip_delegates() {
        let gated = VadGatedRecognizer::new(
            CountingRecognizer::default(),
            FixedVad(vec![SpeechRegion::from_secs(2.0, 4.5)]),
        );
        let observation = tokio_test::block_on(gated.recognize(Path::new("clip.wav"))).unwrap();

        assert_eq!(observation, Observation::Speech("hallo".to_string()));
        assert_eq!(gated.inner.calls.load(Ordering::SeqCst), 1);
    }
}
