//! Final recommendation
//!
//! Once a session has its candidate set, one more generation call compares
//! the candidates against the criteria and names a single pick. The call
//! goes through the same fallback chain and limiters as refinement and
//! scoring. When both providers fail the session carries no recommendation.

use crate::error::RefinementError;
use crate::llm::FallbackChain;
use crate::models::{CriteriaSummary, Recommendation};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Marks the chosen product in a recommendation reply.
pub const PICK_MARKER: &str = "🏆";

#[async_trait]
pub trait Recommender: Send + Sync {
    /// `None` means no recommendation could be produced.
    async fn recommend(&self, criteria: &CriteriaSummary, listing: &str) -> Option<Recommendation>;
}

pub fn build_recommendation_prompt(criteria: &CriteriaSummary, listing: &str) -> String {
    format!(
        r#"You are a friendly shopping assistant.

USER CRITERIA:
{}

PRODUCTS FOUND:
{}

Compare these products against the user's criteria and choose ONE final recommendation.

Rules:
- Answer in English, as short bullet points
- Briefly explain why the chosen product fits best
- Start the line naming your choice with {}
- Do not include code or code blocks
"#,
        criteria.render(),
        listing,
        PICK_MARKER
    )
}

/// Split a reply into its full text and the marked pick line.
pub fn parse_recommendation(reply: &str) -> Result<(String, Option<String>)> {
    let text = reply.trim();
    if text.is_empty() {
        return Err(RefinementError::MalformedResponse(
            "Empty recommendation reply".to_string(),
        ));
    }
    if text.contains("```") {
        return Err(RefinementError::MalformedResponse(
            "Recommendation contains a code block".to_string(),
        ));
    }

    let pick = text
        .lines()
        .find(|line| line.contains(PICK_MARKER))
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
                .trim()
                .to_string()
        });

    Ok((text.to_string(), pick))
}

pub struct FinalRecommender {
    chain: Arc<FallbackChain>,
}

impl FinalRecommender {
    pub fn new(chain: Arc<FallbackChain>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl Recommender for FinalRecommender {
    async fn recommend(&self, criteria: &CriteriaSummary, listing: &str) -> Option<Recommendation> {
        let prompt = build_recommendation_prompt(criteria, listing);

        match self.chain.call_with_fallback(&prompt, parse_recommendation).await {
            Ok(answered) => {
                let (text, pick) = answered.value;
                info!(provider = %answered.provider, has_pick = pick.is_some(), "Recommendation produced");
                Some(Recommendation {
                    text,
                    pick,
                    provider: answered.provider,
                })
            }
            Err(e) => {
                warn!(error = %e, "No recommendation available");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{chain, ScriptedGenerator};
    use crate::models::Provider;

    const LISTING: &str = "1. 📦 Char-Broil Classic\n   💰 Price: $199.99 (1400 DKK)\n\n\
                           2. 📦 Weber Spirit\n   💰 Price: $449.00 (3143 DKK)";

    fn criteria() -> CriteriaSummary {
        CriteriaSummary::new(["- Fuel: gas", "- Budget: 3500 DKK"])
    }

    #[test]
    fn test_prompt_carries_criteria_and_listing() {
        let prompt = build_recommendation_prompt(&criteria(), LISTING);

        assert!(prompt.contains("- Fuel: gas\n- Budget: 3500 DKK"));
        assert!(prompt.contains("2. 📦 Weber Spirit"));
        assert!(prompt.contains("ONE final recommendation"));
        assert!(prompt.contains(PICK_MARKER));
    }

    #[test]
    fn test_pick_line_extracted() {
        let reply = "- Char-Broil is cheapest\n- 🏆 Weber Spirit: best build quality\n- Fits budget";

        let (text, pick) = parse_recommendation(reply).unwrap();

        assert_eq!(text, reply);
        assert_eq!(pick.as_deref(), Some("🏆 Weber Spirit: best build quality"));
    }

    #[test]
    fn test_reply_without_marker_has_no_pick() {
        let (_, pick) = parse_recommendation("Both are fine choices.").unwrap();
        assert_eq!(pick, None);
    }

    #[test]
    fn test_empty_or_code_replies_rejected() {
        assert!(parse_recommendation("  \n ").is_err());
        assert!(parse_recommendation("```json\n{}\n```").is_err());
    }

    #[tokio::test]
    async fn test_primary_recommendation() {
        let primary = ScriptedGenerator::new("mistral", vec![Ok("- 🏆 Weber Spirit\n- Sturdy")]);
        let secondary = ScriptedGenerator::new("openai", vec![]);
        let recommender = FinalRecommender::new(Arc::new(chain(primary, secondary.clone())));

        let rec = recommender.recommend(&criteria(), LISTING).await.unwrap();

        assert_eq!(rec.provider, Provider::Primary);
        assert_eq!(rec.pick.as_deref(), Some("🏆 Weber Spirit"));
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary() {
        let primary = ScriptedGenerator::new("mistral", vec![Ok("```python\nprint()\n```")]);
        let secondary = ScriptedGenerator::new("openai", vec![Ok("🏆 Char-Broil Classic")]);
        let recommender = FinalRecommender::new(Arc::new(chain(primary.clone(), secondary)));

        let rec = recommender.recommend(&criteria(), LISTING).await.unwrap();

        assert_eq!(rec.provider, Provider::Secondary);
        assert_eq!(rec.pick.as_deref(), Some("🏆 Char-Broil Classic"));
        assert_eq!(primary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_total_outage_gives_no_recommendation() {
        let primary = ScriptedGenerator::new("mistral", vec![Err("503")]);
        let secondary = ScriptedGenerator::new("openai", vec![Err("timeout")]);
        let recommender = FinalRecommender::new(Arc::new(chain(primary.clone(), secondary.clone())));

        assert!(recommender.recommend(&criteria(), LISTING).await.is_none());
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 1);
    }
}
