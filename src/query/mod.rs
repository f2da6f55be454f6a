//! Search query construction
//!
//! The first attempt of every session uses [`build_search_query`], a
//! deterministic heuristic with no external call. Later attempts go through
//! a [`QueryOptimizer`] that folds in scorer feedback.

use crate::models::CriteriaSummary;
use async_trait::async_trait;
use std::collections::HashSet;

pub mod refiner;
pub use refiner::QueryRefiner;

/// Trait for feedback-driven query improvement (LLM controlled)
#[async_trait]
pub trait QueryOptimizer: Send + Sync {
    /// Never fails: implementations return a usable query even when every
    /// provider is down.
    async fn refine(&self, product_type: &str, criteria: &CriteriaSummary, feedback: &str) -> String;
}

/// Derive a search string from the bullet lines of the criteria.
///
/// Each bullet contributes the first two words of its value (the text after
/// `:`), or of the whole bullet when it has no label. Commas and semicolons
/// around a word are dropped before counting, so `Weber, Char-Broil` gives
/// `Weber Char-Broil`. Phrases are deduplicated case-insensitively in
/// first-seen order, after the product type.
pub fn build_search_query(product_type: &str, criteria: &CriteriaSummary) -> String {
    let product_type = product_type.trim();
    let mut seen: HashSet<String> = HashSet::new();
    let mut tokens: Vec<String> = Vec::new();

    if !product_type.is_empty() {
        seen.insert(product_type.to_lowercase());
        tokens.push(product_type.to_string());
    }

    for item in criteria.bullet_items() {
        let source = match item.split_once(':') {
            Some((_, value)) => value,
            None => item,
        };

        let phrase = source
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| c == ',' || c == ';'))
            .filter(|w| !w.is_empty())
            .take(2)
            .collect::<Vec<_>>()
            .join(" ");

        if phrase.is_empty() {
            continue;
        }

        if seen.insert(phrase.to_lowercase()) {
            tokens.push(phrase);
        }
    }

    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_budget_bullet() {
        let criteria = CriteriaSummary::new(["- Budget: around 400"]);
        assert_eq!(build_search_query("laptop", &criteria), "laptop around 400");
    }

    #[test]
    fn test_only_bullets_contribute() {
        let criteria = CriteriaSummary::from_text(
            "Here is a summary of your needs:\n\
             - Type: gas grill with side burner\n\
             - Built-in thermometer\n\
             * Brand: Weber, Char-Broil\n\
             READY FOR SEARCH",
        );

        assert_eq!(
            build_search_query("grill", &criteria),
            "grill gas grill Built-in thermometer Weber Char-Broil"
        );
    }

    #[test]
    fn test_duplicates_dropped_case_insensitively() {
        let criteria = CriteriaSummary::new([
            "- Type: Gaming laptop",
            "- Use: gaming LAPTOP",
            "- Subtype: laptop",
            "- Size: 15 inch",
        ]);

        assert_eq!(
            build_search_query("laptop", &criteria),
            "laptop Gaming laptop 15 inch"
        );
    }

    #[test]
    fn test_feedback_notes_do_not_change_query() {
        let mut criteria = CriteriaSummary::new(["- Color: matte black"]);
        let before = build_search_query("kettle", &criteria);

        criteria.push_feedback("- Needs: more options");
        assert_eq!(build_search_query("kettle", &criteria), before);
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let criteria = CriteriaSummary::new(["- Brand:", "-", "- Budget: 300"]);
        assert_eq!(build_search_query("tv", &criteria), "tv 300");
    }
}
