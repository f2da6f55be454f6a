//! Product Refinement Agent
//!
//! Searches for products matching a user's criteria and budget, asks an LLM
//! judge to score each result set, and refines the search query from the
//! judge's feedback until the score is good enough or attempts run out.
//!
//! - Deterministic first query, LLM-refined queries afterwards
//! - Budget stated in display currency, enforced in native currency
//! - Primary/secondary LLM providers with per-provider rate limits
//! - Best-so-far result is returned when no attempt is accepted
//! - One closing recommendation names a single pick
//!
//! REFINEMENT LOOP:
//! BUILD_QUERY → SEARCH → FILTER → FORMAT → SCORE → ACCEPT | RETRY | ABORT

pub mod api;
pub mod budget;
pub mod config;
pub mod controller;
pub mod error;
pub mod llm;
pub mod models;
pub mod pricing;
pub mod query;
pub mod rate_limiter;
pub mod recommend;
pub mod scoring;
pub mod search;

pub use error::{RefinementError, Result};

// Re-export common types
pub use models::*;
pub use budget::Budget;
pub use config::AgentConfig;
pub use controller::RefinementController;
pub use pricing::{Currency, PriceNormalizer};
