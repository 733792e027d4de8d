use crate::ledger::Ledger;
use crate::segments::{MusicSegment, UNKNOWN_SPEECH};

/// Derive music segments from the speech recorded in `ledger`.
///
/// Music is assumed wherever at least one window passed without speech.
/// A segment starts at the last window that had speech before the gap (so the
/// announcement is included) and ends with the window that broke the gap.
/// The stretch after the last speech runs to `total_duration`.
///
/// Segment ends never exceed `total_duration`: a gap closed by speech in a
/// short final window ends at the recording's end, not at `start + L`.
pub fn reconstruct(ledger: &Ledger, total_duration: f64) -> Vec<MusicSegment> {
    let length = u64::from(ledger.segment_length());

    let mut last_begin: u64 = 0;
    let mut last_end: u64 = 0;
    let mut last_text = UNKNOWN_SPEECH;

    let mut segments = Vec::new();
    for record in ledger.records() {
        if record.start > last_end {
            let end = ((record.start + length) as f64).min(total_duration);
            segments.push(MusicSegment::new(last_begin, last_text, end, &*record.text));
        }
        last_begin = record.start;
        last_end = record.start + length;
        last_text = record.text.as_str();
    }

    if total_duration > last_end as f64 {
        segments.push(MusicSegment::new(
            last_begin,
            last_text,
            total_duration,
            UNKNOWN_SPEECH,
        ));
    }

    segments
}
