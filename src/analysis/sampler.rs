use std::path::Path;

use tracing::debug;

use crate::analysis::Window;
use crate::audio::{MediaTool, TransientClip};
use crate::error::Result;
use crate::recognize::{Observation, Recognizer};

/// Cuts single windows out of the analysable audio and asks the recognizer
/// whether anyone is speaking in them.
pub struct SegmentSampler<'a> {
    media: &'a dyn MediaTool,
    recognizer: &'a dyn Recognizer,
    source: &'a Path,
    clip_dir: &'a Path,
}

impl<'a> SegmentSampler<'a> {
    /// `clip_dir` receives one short-lived clip per window and should be
    /// private to the current run.
    pub fn new(
        media: &'a dyn MediaTool,
        recognizer: &'a dyn Recognizer,
        source: &'a Path,
        clip_dir: &'a Path,
    ) -> Self {
        Self {
            media,
            recognizer,
            source,
            clip_dir,
        }
    }

    /// Listen to `window`. The window clip is removed before this returns,
    /// whatever the result.
    pub async fn sample(&self, window: &Window) -> Result<Observation> {
        let clip = TransientClip::new(
            self.clip_dir
                .join(format!("segment_{:06}.wav", window.start)),
        );
        self.media.cut(
            self.source,
            window.start as f64,
            window.duration(),
            clip.path(),
        )?;

        let observation = self.recognizer.recognize(clip.path()).await?;
        debug!("Window {}..{:.3}: {:?}", window.start, window.end, observation);
        Ok(observation)
    }
}
