// Text Processing Service
// Normalization applied once before segmentation; the normalized text becomes
// the canonical string all unit offsets refer to.

use regex::Regex;

/// Normalize punctuation and whitespace in text.
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = text.to_string();

    // Replace smart quotes
    s = s.replace('\u{201c}', "\"")  // "
         .replace('\u{201d}', "\"")  // "
         .replace('\u{2018}', "'")   // '
         .replace('\u{2019}', "'");  // '

    // Replace non-breaking and ideographic spaces
    let space_re = Regex::new(r"[\u{3000}\u{00A0}]").unwrap();
    s = space_re.replace_all(&s, " ").to_string();

    // Normalize line endings
    s = s.replace("\r\n", "\n").replace('\r', "\n");

    // Collapse horizontal whitespace
    let ws_re = Regex::new(r"[ \t\x0C\x0B]+").unwrap();
    s = ws_re.replace_all(&s, " ").to_string();

    s.trim().to_string()
}

/// Whitespace-token word count. SummaryStatistics partitions this total into
/// positive and negative words, so every consumer must count the same way.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        let input = "Hello\u{201c}World\u{201d}";
        let output = normalize_punctuation(input);
        assert_eq!(output, "Hello\"World\"");
    }

    #[test]
    fn test_normalize_line_endings() {
        let output = normalize_punctuation("one\r\ntwo\rthree");
        assert_eq!(output, "one\ntwo\nthree");
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("Hello brave new world"), 4);
        assert_eq!(count_words("  spaced   out  "), 2);
        assert_eq!(count_words(""), 0);
    }
}
