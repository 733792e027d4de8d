use std::ops::RangeInclusive;

use crate::error::{ExtractorError, Result};
use crate::segments::MusicSegment;

/// Parse a selection such as `1,2-3,6` into zero-based inclusive ranges.
///
/// Numbers are 1-based and refer to a list of `count` segments. Whitespace is
/// ignored anywhere in the expression. An empty expression selects nothing;
/// see [`apply_selection`] for the "keep everything" behaviour.
pub fn parse_selection(expr: &str, count: usize) -> Result<Vec<RangeInclusive<usize>>> {
    let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Ok(Vec::new());
    }

    compact
        .split(',')
        .map(|item| {
            let (from, to) = match item.split_once('-') {
                Some((from, to)) => (parse_number(from, item)?, parse_number(to, item)?),
                None => {
                    let n = parse_number(item, item)?;
                    (n, n)
                }
            };

            if from == 0 || to == 0 {
                return Err(ExtractorError::Selection(format!(
                    "'{item}': segments are numbered from 1"
                )));
            }
            if from > to {
                return Err(ExtractorError::Selection(format!(
                    "'{item}': range runs backwards"
                )));
            }
            if to > count {
                return Err(ExtractorError::Selection(format!(
                    "'{item}': only {count} segments found"
                )));
            }

            Ok(from - 1..=to - 1)
        })
        .collect()
}

fn parse_number(s: &str, item: &str) -> Result<usize> {
    s.parse()
        .map_err(|_| ExtractorError::Selection(format!("'{item}' is not a number or range")))
}

/// Keep the segments chosen by `expr`, joining each range into one segment
/// that starts with its first member and ends with its last.
pub fn apply_selection(segments: &[MusicSegment], expr: &str) -> Result<Vec<MusicSegment>> {
    let ranges = parse_selection(expr, segments.len())?;
    if ranges.is_empty() {
        return Ok(segments.to_vec());
    }

    Ok(ranges
        .into_iter()
        .map(|range| {
            let first = &segments[*range.start()];
            let last = &segments[*range.end()];
            MusicSegment::new(
                first.begin,
                first.speech_before.as_str(),
                last.end,
                last.speech_after.as_str(),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::UNKNOWN_SPEECH;

    fn segments() -> Vec<MusicSegment> {
        vec![
            MusicSegment::new(0, UNKNOWN_SPEECH, 40.0, "a"),
            MusicSegment::new(20, "a", 100.0, "b"),
            MusicSegment::new(80, "b", 200.0, "c"),
            MusicSegment::new(180, "c", 260.5, UNKNOWN_SPEECH),
        ]
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("1,2-3,4", 4).unwrap(), vec![0..=0, 1..=2, 3..=3]);
        assert_eq!(parse_selection(" 1 , 3 - 4 ", 4).unwrap(), vec![0..=0, 2..=3]);
        assert!(parse_selection("", 4).unwrap().is_empty());
        assert!(parse_selection("   ", 4).unwrap().is_empty());
    }

    #[test]
    fn test_parse_selection_errors() {
        for expr in ["0", "5", "3-2", "x", "1,,2", "1-", "-2", "1-2-3", "2-9"] {
            assert!(
                matches!(parse_selection(expr, 4), Err(ExtractorError::Selection(_))),
                "{expr} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_selection_keeps_all() {
        assert_eq!(apply_selection(&segments(), "").unwrap(), segments());
    }

    #[test]
    fn test_selection_combines_ranges() {
        let kept = apply_selection(&segments(), "1,2-3").unwrap();
        assert_eq!(
            kept,
            vec![
                MusicSegment::new(0, UNKNOWN_SPEECH, 40.0, "a"),
                MusicSegment::new(20, "a", 200.0, "c"),
            ]
        );
    }

    #[test]
    fn test_selection_keeps_order_given() {
        let kept = apply_selection(&segments(), "4,1").unwrap();
        assert_eq!(kept[0].begin, 180);
        assert_eq!(kept[1].begin, 0);
    }
}
