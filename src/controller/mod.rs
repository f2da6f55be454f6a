//! Refinement controller - drives the search loop
//!
//! BUILD_QUERY → SEARCH → FILTER → FORMAT → SCORE → ACCEPT | RETRY | ABORT
//!
//! Attempt 1 always uses the deterministic query builder. Later attempts
//! refine the query from the previous attempt's feedback. The loop is
//! strictly sequential and always ends within `max_attempts`. A session
//! that returns candidates closes with one recommendation call.

use crate::budget::{filter_within_budget, Budget};
use crate::config::AgentConfig;
use crate::error::RefinementError;
use crate::llm::{ChatCompletionClient, FallbackChain, ProviderSlot};
use crate::models::{
    AttemptRecord, Candidate, CriteriaSummary, OutcomeStatus, RefinementOutcome,
};
use crate::pricing::PriceNormalizer;
use crate::query::{build_search_query, QueryOptimizer, QueryRefiner};
use crate::rate_limiter::RateLimiter;
use crate::recommend::{FinalRecommender, Recommender};
use crate::scoring::{Evaluation, Evaluator, ScoringAdapter};
use crate::search::{ProductSearch, SerpApiSearch};
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod policy;
pub use policy::{AttemptTracker, BestAttempt, Decision};

pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Main controller that coordinates one refinement session at a time
pub struct RefinementController {
    search: Box<dyn ProductSearch>,
    optimizer: Box<dyn QueryOptimizer>,
    evaluator: Box<dyn Evaluator>,
    recommender: Option<Box<dyn Recommender>>,
    pricing: PriceNormalizer,
    max_results: usize,
}

impl RefinementController {
    pub fn new(
        search: Box<dyn ProductSearch>,
        optimizer: Box<dyn QueryOptimizer>,
        evaluator: Box<dyn Evaluator>,
        pricing: PriceNormalizer,
    ) -> Self {
        Self {
            search,
            optimizer,
            evaluator,
            recommender: None,
            pricing,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_recommender(mut self, recommender: Box<dyn Recommender>) -> Self {
        self.recommender = Some(recommender);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Wire live providers from configuration.
    ///
    /// Each LLM provider gets its own limiter, shared by the query refiner
    /// and the scoring adapter so their combined calls respect the quota.
    /// The search backend is limited separately.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let limiter = || {
            Arc::new(RateLimiter::per_seconds(
                config.provider_max_calls,
                config.provider_period_secs,
            ))
        };

        let primary = ChatCompletionClient::mistral(&config.primary.api_key, &config.primary.model)?;
        let secondary =
            ChatCompletionClient::openai(&config.secondary.api_key, &config.secondary.model)?;

        let chain = Arc::new(FallbackChain::new(
            ProviderSlot::new(Arc::new(primary), limiter()),
            ProviderSlot::new(Arc::new(secondary), limiter()),
        ));

        let search = SerpApiSearch::new(&config.serpapi_api_key)?.with_rate_limiter(limiter());

        Ok(Self::new(
            Box::new(search),
            Box::new(QueryRefiner::new(Arc::clone(&chain))),
            Box::new(ScoringAdapter::new(Arc::clone(&chain))),
            PriceNormalizer::usd_dkk(config.usd_to_dkk_rate),
        )
        .with_recommender(Box::new(FinalRecommender::new(chain)))
        .with_max_results(config.max_results))
    }

    pub fn pricing(&self) -> &PriceNormalizer {
        &self.pricing
    }

    /// Run one session.
    ///
    /// Returns `Ok` for acceptance, scoring outage and attempt exhaustion
    /// (check [`RefinementOutcome::status`]). Returns
    /// [`RefinementError::OverconstrainedBudget`] when an attempt's results
    /// are all above the budget; no scoring happens for that attempt.
    pub async fn run_refinement(
        &self,
        product_type: &str,
        criteria: CriteriaSummary,
        budget: &Budget,
        max_attempts: u32,
        threshold: f64,
    ) -> Result<RefinementOutcome> {
        if max_attempts == 0 {
            return Err(RefinementError::InvalidInput(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let session = Session::start();
        let mut criteria = criteria;
        let mut tracker = AttemptTracker::new(max_attempts, threshold);
        let mut records: Vec<AttemptRecord> = Vec::new();
        let mut last_feedback: Option<String> = None;

        info!(
            session_id = %session.id,
            %product_type,
            budget = budget.ceiling,
            currency = %budget.currency,
            max_attempts,
            threshold,
            "Refinement session starting"
        );

        for attempt in 1..=max_attempts {
            // === BUILD_QUERY ===
            let query = match last_feedback.as_deref() {
                Some(feedback) if attempt > 1 => {
                    self.optimizer.refine(product_type, &criteria, feedback).await
                }
                _ => build_search_query(product_type, &criteria),
            };
            info!(attempt, %query, "Attempt starting");

            // === SEARCH ===
            let raw = self.search.search(&query, self.max_results).await;
            debug!(attempt, found = raw.len(), "Search complete");

            // === FILTER ===
            let filtered = filter_within_budget(raw, budget, &self.pricing);
            if filtered.is_empty() {
                warn!(
                    attempt,
                    budget = budget.ceiling,
                    "No products within budget, aborting session"
                );
                return Err(RefinementError::OverconstrainedBudget {
                    ceiling: budget.ceiling,
                    currency: budget.currency.to_string(),
                });
            }

            // === FORMAT ===
            let ranked = self.pricing.sort_by_price(filtered);
            let listing = self.pricing.format_candidates(&ranked);

            // === SCORE ===
            let card = match self.evaluator.evaluate(&criteria, &listing).await {
                Evaluation::Scored(card) => card,
                Evaluation::Unavailable { reason } => {
                    warn!(attempt, %reason, "Scoring unavailable, accepting unscored results");
                    records.push(AttemptRecord {
                        attempt,
                        query,
                        candidate_count: ranked.len(),
                        mean: None,
                        feedback: None,
                    });
                    let best_mean = tracker.best_mean();
                    return Ok(self
                        .conclude(session, &criteria, OutcomeStatus::ScoringUnavailable, ranked, best_mean, records)
                        .await);
                }
            };

            let mean = card.mean();
            let feedback = card.feedback;
            records.push(AttemptRecord {
                attempt,
                query,
                candidate_count: ranked.len(),
                mean: Some(mean),
                feedback: Some(feedback.clone()).filter(|f| !f.is_empty()),
            });

            match tracker.record(attempt, mean, ranked) {
                Decision::Accept => {
                    info!(attempt, mean, "Evaluation satisfactory, accepting");
                    let best = tracker.into_best().map(|b| b.candidates).unwrap_or_default();
                    return Ok(self
                        .conclude(session, &criteria, OutcomeStatus::Accepted, best, Some(mean), records)
                        .await);
                }
                Decision::Retry => {
                    warn!(attempt, mean, threshold, "Score below threshold, retrying with feedback");
                }
                Decision::Exhausted => {
                    warn!(attempt, mean, threshold, "Score below threshold on final attempt");
                }
            }

            criteria.push_feedback(feedback.as_str());
            last_feedback = Some(feedback).filter(|f| !f.trim().is_empty());
        }

        let best_mean = tracker.best_mean();
        let best = tracker.into_best();
        info!(
            best_attempt = best.as_ref().map(|b| b.attempt),
            best_mean,
            "Max attempts reached, using best result"
        );

        Ok(self
            .conclude(
                session,
                &criteria,
                OutcomeStatus::BelowThreshold,
                best.map(|b| b.candidates).unwrap_or_default(),
                best_mean,
                records,
            )
            .await)
    }

    /// Attach the closing recommendation and finish the session.
    async fn conclude(
        &self,
        session: Session,
        criteria: &CriteriaSummary,
        status: OutcomeStatus,
        candidates: Vec<Candidate>,
        best_mean: Option<f64>,
        records: Vec<AttemptRecord>,
    ) -> RefinementOutcome {
        let recommendation = match &self.recommender {
            Some(recommender) if !candidates.is_empty() => {
                let listing = self.pricing.format_candidates(&candidates);
                recommender.recommend(criteria, &listing).await
            }
            _ => None,
        };

        let mut outcome = session.finish(status, candidates, best_mean, records);
        outcome.recommendation = recommendation;
        outcome
    }
}

struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl Session {
    fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn finish(
        self,
        status: OutcomeStatus,
        candidates: Vec<Candidate>,
        best_mean: Option<f64>,
        attempts: Vec<AttemptRecord>,
    ) -> RefinementOutcome {
        info!(
            session_id = %self.id,
            %status,
            attempts = attempts.len(),
            candidates = candidates.len(),
            "Refinement session finished"
        );

        RefinementOutcome {
            session_id: self.id,
            status,
            candidates,
            best_mean,
            attempts,
            recommendation: None,
            started_at: self.started_at,
            execution_time_ms: self.clock.elapsed().as_millis() as u64,
        }
    }
}
