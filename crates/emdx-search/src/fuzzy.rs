//! Fuzzy scoring for near-miss queries.
//!
//! Salvages queries the FTS index rejects outright: typos, partial words,
//! close-but-wrong titles. Scores combine whole-title similarity with the
//! best per-word match over the title and a content prefix.

use strsim::{jaro_winkler, normalized_levenshtein};

/// Minimum score for a candidate to count as a fuzzy hit.
pub const FUZZY_THRESHOLD: f64 = 0.55;

/// Content words beyond the title are discounted by this factor.
const CONTENT_WEIGHT: f64 = 0.85;

/// Scores a document against a query, in [0, 1].
pub fn fuzzy_score(query: &str, title: &str, content_prefix: &str) -> f64 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0.0;
    }
    let title_lower = title.to_lowercase();

    let whole_title = normalized_levenshtein(&query, &title_lower)
        .max(jaro_winkler(&query, &title_lower));

    let best_title_word = title_lower
        .split_whitespace()
        .map(|w| jaro_winkler(&query, w))
        .fold(0.0f64, f64::max);

    let best_content_word = content_prefix
        .to_lowercase()
        .split_whitespace()
        .map(|w| jaro_winkler(&query, w))
        .fold(0.0f64, f64::max)
        * CONTENT_WEIGHT;

    whole_title.max(best_title_word).max(best_content_word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typo_in_title_scores_high() {
        let score = fuzzy_score("asynch", "Async Patterns", "");
        assert!(score > FUZZY_THRESHOLD, "got {score}");
    }

    #[test]
    fn exact_title_scores_near_one() {
        let score = fuzzy_score("async patterns", "Async Patterns", "");
        assert!(score > 0.99, "got {score}");
    }

    #[test]
    fn unrelated_text_scores_low() {
        let score = fuzzy_score("kubernetes", "Grocery List", "milk eggs bread");
        assert!(score < FUZZY_THRESHOLD, "got {score}");
    }

    #[test]
    fn content_match_is_discounted_but_counts() {
        let in_title = fuzzy_score("migration", "Migration Plan", "");
        let in_content = fuzzy_score("migration", "Q3 Plan", "database migration steps");
        assert!(in_content > FUZZY_THRESHOLD);
        assert!(in_title > in_content);
    }

    #[test]
    fn empty_query_scores_zero() {
        assert_eq!(fuzzy_score("  ", "Title", "content"), 0.0);
    }
}
