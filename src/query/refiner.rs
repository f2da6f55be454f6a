//! LLM-backed query refinement
//!
//! Turns scorer feedback into an improved search string while keeping the
//! user's original criteria in the prompt.

use crate::error::RefinementError;
use crate::llm::FallbackChain;
use crate::models::CriteriaSummary;
use crate::query::QueryOptimizer;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct QueryRefiner {
    chain: Arc<FallbackChain>,
}

impl QueryRefiner {
    pub fn new(chain: Arc<FallbackChain>) -> Self {
        Self { chain }
    }

    fn build_prompt(product_type: &str, criteria: &CriteriaSummary, feedback: &str) -> String {
        format!(
            r#"You write search strings for a Google Shopping product search.

PRODUCT TYPE:
{}

USER CRITERIA:
{}

LATEST EVALUATOR FEEDBACK:
{}

Write ONE improved search string that keeps the user's criteria and addresses the feedback.

Rules:
- Start with the product type
- Keep it short (under 12 words)
- Do not include prices or currency symbols
- Return ONLY the search string on a single line
- No explanation text, no quotes
"#,
            product_type,
            criteria.render(),
            feedback.trim()
        )
    }

    /// The fallback query used when every provider fails.
    pub fn neutral_query(product_type: &str) -> String {
        let product_type = product_type.trim();
        if product_type.is_empty() {
            "products".to_string()
        } else {
            product_type.to_string()
        }
    }
}

/// First non-empty line of a reply, with wrapping quotes and backticks removed.
pub fn first_query_line(reply: &str) -> Result<String> {
    let line = reply
        .lines()
        .map(|l| l.trim().trim_matches(|c: char| c == '"' || c == '`' || c == '\'').trim())
        .find(|l| !l.is_empty())
        .ok_or_else(|| RefinementError::MalformedResponse("Empty query reply".to_string()))?;

    Ok(line.to_string())
}

#[async_trait]
impl QueryOptimizer for QueryRefiner {
    async fn refine(&self, product_type: &str, criteria: &CriteriaSummary, feedback: &str) -> String {
        let prompt = Self::build_prompt(product_type, criteria, feedback);

        match self.chain.call_with_fallback(&prompt, first_query_line).await {
            Ok(answered) => {
                info!(provider = %answered.provider, query = %answered.value, "Refined search query");
                answered.value
            }
            Err(e) => {
                let fallback = Self::neutral_query(product_type);
                warn!(error = %e, query = %fallback, "Query refinement failed, using neutral query");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{chain, ScriptedGenerator};

    #[test]
    fn test_first_line_only() {
        let reply = "\n  \"budget gaming laptop RTX 4060\"  \nThis query targets cheaper GPUs.";
        assert_eq!(first_query_line(reply).unwrap(), "budget gaming laptop RTX 4060");
    }

    #[test]
    fn test_long_first_line_is_kept() {
        let line = "gas grill ".repeat(40);
        let reply = format!("{}\nsecond line", line);
        assert_eq!(first_query_line(&reply).unwrap(), line.trim());
    }

    #[test]
    fn test_blank_reply_is_malformed() {
        assert!(first_query_line("  \n\n ``` \n").is_err());
    }

    #[test]
    fn test_prompt_keeps_original_criteria() {
        let mut criteria = CriteriaSummary::new(["- Brand: Lenovo", "- RAM: 16GB"]);
        criteria.push_feedback("Results lacked diversity");

        let prompt = QueryRefiner::build_prompt("laptop", &criteria, "Show more brands");

        assert!(prompt.contains("- Brand: Lenovo\n- RAM: 16GB"));
        assert!(prompt.contains("Previous feedback: Results lacked diversity"));
        assert!(prompt.contains("Show more brands"));
    }

    #[tokio::test]
    async fn test_secondary_used_when_primary_fails() {
        let primary = ScriptedGenerator::new("mistral", vec![Err("503")]);
        let secondary = ScriptedGenerator::new("openai", vec![Ok("laptop lenovo 16GB ram\nbecause...")]);
        let refiner = QueryRefiner::new(Arc::new(chain(primary, secondary)));

        let query = refiner
            .refine("laptop", &CriteriaSummary::new(["- Brand: Lenovo"]), "too few")
            .await;

        assert_eq!(query, "laptop lenovo 16GB ram");
    }

    #[tokio::test]
    async fn test_neutral_query_when_all_fail() {
        let primary = ScriptedGenerator::new("mistral", vec![Err("timeout")]);
        let secondary = ScriptedGenerator::new("openai", vec![Ok("")]);
        let refiner = QueryRefiner::new(Arc::new(chain(primary, secondary)));

        let query = refiner
            .refine(" day cream ", &CriteriaSummary::default(), "irrelevant")
            .await;

        assert_eq!(query, "day cream");
    }
}
