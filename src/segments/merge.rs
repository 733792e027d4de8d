use crate::ledger::Ledger;
use crate::segments::{reconstruct, MusicSegment, UNKNOWN_SPEECH};

/// Reconstruct music segments and stretch each one across the speech island
/// that follows it, up to the end of the next segment's opening window.
///
/// Useful when an announcement sits between two pieces that belong together:
/// every segment then overlaps the next by one window. The last segment
/// always runs to `total_duration`.
pub fn merge_music_speech(ledger: &Ledger, total_duration: f64) -> Vec<MusicSegment> {
    let length = u64::from(ledger.segment_length());
    let found = reconstruct(ledger, total_duration);

    let mut merged: Vec<MusicSegment> = found
        .windows(2)
        .map(|pair| {
            let (current, next) = (&pair[0], &pair[1]);
            MusicSegment::new(
                current.begin,
                current.speech_before.as_str(),
                ((next.begin + length) as f64).min(total_duration),
                next.speech_before.as_str(),
            )
        })
        .collect();

    if let Some(last) = found.last() {
        if last.end < total_duration {
            merged.push(MusicSegment::new(
                last.begin,
                last.speech_before.as_str(),
                total_duration,
                UNKNOWN_SPEECH,
            ));
        } else {
            merged.push(last.clone());
        }
    }

    merged
}
