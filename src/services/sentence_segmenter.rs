// Sentence Segmenter
// Splits analyzed text into sentence units with stable byte offsets into the
// original string.

use crate::models::AnalysisUnit;

/// Minimum unit length (chars) for broad segmentation.
pub const SEGMENT_MIN_CHARS: usize = 10;
/// Minimum unit length (chars) for units sent individually to a paid remote
/// call; longer so fragments never waste a call.
pub const REMOTE_SEGMENT_MIN_CHARS: usize = 15;

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

/// Split `text` into sentence units. Candidates are delimited by runs of
/// sentence terminators, trimmed, and discarded unless strictly longer than
/// `min_chars` characters.
///
/// Offsets are recovered by searching the original text starting at the end
/// offset of the previously kept unit, so repeated identical sentences land
/// on their own occurrence instead of the first one.
pub fn segment(text: &str, min_chars: usize) -> Vec<AnalysisUnit> {
    let mut candidates: Vec<&str> = Vec::new();
    let mut cand_start = 0usize;
    let mut iter = text.char_indices().peekable();

    while let Some((i, ch)) = iter.next() {
        if !is_terminator(ch) {
            continue;
        }
        candidates.push(&text[cand_start..i]);
        // Consume the rest of the terminator run
        while let Some(&(_, next_ch)) = iter.peek() {
            if is_terminator(next_ch) {
                iter.next();
            } else {
                break;
            }
        }
        cand_start = iter.peek().map(|&(j, _)| j).unwrap_or(text.len());
    }
    if cand_start < text.len() {
        candidates.push(&text[cand_start..]);
    }

    let mut units = Vec::new();
    let mut cursor = 0usize;
    for candidate in candidates {
        let trimmed = candidate.trim();
        if trimmed.chars().count() <= min_chars {
            continue;
        }
        if let Some(pos) = text[cursor..].find(trimmed) {
            let start_offset = cursor + pos;
            let end_offset = start_offset + trimmed.len();
            units.push(AnalysisUnit {
                text: trimmed.to_string(),
                start_offset,
                end_offset,
            });
            cursor = end_offset;
        }
    }

    units
}

/// Sentence count used to seed the initial remaining-time estimate.
pub fn sentence_count(text: &str) -> usize {
    segment(text, SEGMENT_MIN_CHARS).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_empty_input() {
        assert!(segment("", SEGMENT_MIN_CHARS).is_empty());
        assert!(segment("Short.", SEGMENT_MIN_CHARS).is_empty());
    }

    #[test]
    fn test_segment_discards_short_candidates() {
        let text = "Tiny. This sentence is long enough to keep. No.";
        let units = segment(text, SEGMENT_MIN_CHARS);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "This sentence is long enough to keep");
    }

    #[test]
    fn test_segment_duplicate_sentences_get_distinct_offsets() {
        let text = "Hello world. Hello world. Short.";
        let units = segment(text, 10);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "Hello world");
        assert_eq!(units[1].text, "Hello world");
        assert!(units[1].start_offset > units[0].end_offset);
    }

    #[test]
    fn test_segment_offsets_slice_back_to_original() {
        let text = "What is happening here?! I truly cannot believe any of it... The end result was fine though.";
        let units = segment(text, SEGMENT_MIN_CHARS);
        assert_eq!(units.len(), 3);
        for unit in &units {
            assert_eq!(&text[unit.start_offset..unit.end_offset], unit.text);
        }
    }

    #[test]
    fn test_segment_keeps_trailing_candidate_without_terminator() {
        let text = "An unterminated closing thought that still counts";
        let units = segment(text, SEGMENT_MIN_CHARS);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].start_offset, 0);
        assert_eq!(units[0].end_offset, text.len());
    }

    #[test]
    fn test_segment_remote_minimum_filters_more() {
        let text = "Just over ten. This one clears the remote minimum easily.";
        let broad = segment(text, SEGMENT_MIN_CHARS);
        let remote = segment(text, REMOTE_SEGMENT_MIN_CHARS);
        assert_eq!(broad.len(), 2);
        assert_eq!(remote.len(), 1);
    }

    #[test]
    fn test_sentence_count() {
        assert_eq!(sentence_count("Hello world over there. Hello world again now."), 2);
        assert_eq!(sentence_count(""), 0);
    }
}
