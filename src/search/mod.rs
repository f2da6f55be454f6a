//! Product search backends
//!
//! Search never fails from the caller's point of view: transport problems
//! and API-level errors are logged and reported as an empty result.

use crate::models::Candidate;
use async_trait::async_trait;

pub mod serpapi;
pub use serpapi::SerpApiSearch;

/// Trait for an opaque product search backend
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Vec<Candidate>;
}
