// Summary Statistics
// Aggregates per-unit verdicts into the run-level word-count summary.

use crate::models::{AnalysisVerdict, SummaryStatistics};
use crate::services::text_processor::count_words;

/// Aggregate verdicts into summary statistics for the whole analyzed text.
///
/// The total is the whitespace-token count of the full text; words in positive
/// units count as positive and everything else (including fragments the
/// segmenter discarded) counts as negative, so the partition invariant
/// `positive + negative == total` always holds.
pub fn summarize(text: &str, verdicts: &[AnalysisVerdict]) -> SummaryStatistics {
    let total_word_count = count_words(text);
    let positive_raw: usize = verdicts
        .iter()
        .filter(|v| v.is_positive)
        .map(|v| count_words(&v.unit.text))
        .sum();
    let positive_word_count = positive_raw.min(total_word_count);

    let positive_percentage = if total_word_count == 0 {
        0.0
    } else {
        100.0 * positive_word_count as f64 / total_word_count as f64
    };

    SummaryStatistics {
        total_word_count,
        positive_word_count,
        negative_word_count: total_word_count - positive_word_count,
        positive_percentage,
    }
}
