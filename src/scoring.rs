//! Scoring adapter
//!
//! Submits the formatted candidate listing and the user's criteria to an
//! evaluation oracle and normalizes its reply into a fixed eight-dimension
//! score. Nothing raised by the oracle crosses this boundary: failures on
//! both providers become [`Evaluation::Unavailable`].

use crate::error::RefinementError;
use crate::llm::FallbackChain;
use crate::models::CriteriaSummary;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Dimension names in the order the oracle is asked for them.
pub const SCORE_DIMENSIONS: [&str; 8] = [
    "relevance",
    "comparison",
    "explanation",
    "detail",
    "robustness",
    "usability",
    "diversity",
    "price",
];

/// One evaluation of a candidate listing. Each dimension is conceptually
/// 1-5; `None` means the oracle omitted it or sent a non-integer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreCard {
    pub relevance: Option<i64>,
    pub comparison: Option<i64>,
    pub explanation: Option<i64>,
    pub detail: Option<i64>,
    pub robustness: Option<i64>,
    pub usability: Option<i64>,
    pub diversity: Option<i64>,
    pub price: Option<i64>,
    pub feedback: String,
}

impl ScoreCard {
    pub fn dimensions(&self) -> [(&'static str, Option<i64>); 8] {
        [
            ("relevance", self.relevance),
            ("comparison", self.comparison),
            ("explanation", self.explanation),
            ("detail", self.detail),
            ("robustness", self.robustness),
            ("usability", self.usability),
            ("diversity", self.diversity),
            ("price", self.price),
        ]
    }

    /// Mean of the dimensions that are present; 0.0 when none are.
    pub fn mean(&self) -> f64 {
        // Summed as f64: the oracle may send integers large enough to overflow i64.
        let present: Vec<f64> = self
            .dimensions()
            .iter()
            .filter_map(|(_, v)| v.map(|n| n as f64))
            .collect();
        if present.is_empty() {
            return 0.0;
        }
        present.iter().sum::<f64>() / present.len() as f64
    }

    pub fn missing_dimensions(&self) -> Vec<&'static str> {
        self.dimensions()
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let dim = |key: &str| object.get(key).and_then(integer_score);
        Self {
            relevance: dim("relevance"),
            comparison: dim("comparison"),
            explanation: dim("explanation"),
            detail: dim("detail"),
            robustness: dim("robustness"),
            usability: dim("usability"),
            diversity: dim("diversity"),
            price: dim("price"),
            feedback: object
                .get("feedback")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
        }
    }
}

fn integer_score(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
    Scored(ScoreCard),
    Unavailable { reason: String },
}

/// Trait for candidate evaluation (oracle controlled)
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, criteria: &CriteriaSummary, formatted_candidates: &str) -> Evaluation;
}

/// Pull the outermost `{...}` span out of a reply that may carry prose
/// around it, and read it as a score.
pub fn parse_score_reply(reply: &str) -> Result<ScoreCard> {
    let start = reply.find('{');
    let end = reply.rfind('}');

    let span = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => {
            return Err(RefinementError::MalformedResponse(
                "No JSON object found in evaluation reply".to_string(),
            ))
        }
    };

    let value: Value = serde_json::from_str(span).map_err(|e| {
        RefinementError::MalformedResponse(format!("Evaluation JSON did not parse: {}", e))
    })?;

    let object = value.as_object().ok_or_else(|| {
        RefinementError::MalformedResponse("Evaluation JSON is not an object".to_string())
    })?;

    Ok(ScoreCard::from_object(object))
}

pub fn build_evaluation_prompt(criteria: &CriteriaSummary, formatted_candidates: &str) -> String {
    format!(
        r#"You are an evaluation agent. Evaluate the output of a shopping assistant that finds and compares products for a user.

Rate the output on each criterion from 1 (poor) to 5 (excellent):
- Relevance: Do the products match the user's needs and criteria?
- Comparison: Can the products be compared fairly on price, features and store?
- Explanation: Is it clear why these products were selected?
- Detail: Is there enough detail (name, price, store, link) to make a choice?
- Robustness: Does the result cope with ambiguous or incomplete criteria?
- Usability: Is the listing easy to read?
- Diversity: Are there several distinct options rather than one?
- Price: Do the prices fit the user's budget and currency?

User's criteria:
{}

Products found:
{}

Respond ONLY with a valid JSON object in this format:
{{
    "relevance": int,
    "comparison": int,
    "explanation": int,
    "detail": int,
    "robustness": int,
    "usability": int,
    "diversity": int,
    "price": int,
    "feedback": string
}}
"#,
        criteria.render(),
        formatted_candidates
    )
}

/// Evaluator backed by the LLM fallback chain.
pub struct ScoringAdapter {
    chain: Arc<FallbackChain>,
}

impl ScoringAdapter {
    pub fn new(chain: Arc<FallbackChain>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl Evaluator for ScoringAdapter {
    async fn evaluate(&self, criteria: &CriteriaSummary, formatted_candidates: &str) -> Evaluation {
        let prompt = build_evaluation_prompt(criteria, formatted_candidates);

        match self.chain.call_with_fallback(&prompt, parse_score_reply).await {
            Ok(answered) => {
                let card = answered.value;
                info!(
                    provider = %answered.provider,
                    mean = card.mean(),
                    missing = ?card.missing_dimensions(),
                    "Evaluation received"
                );
                Evaluation::Scored(card)
            }
            Err(e) => {
                warn!(error = %e, "Evaluation unavailable on all providers");
                Evaluation::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}
