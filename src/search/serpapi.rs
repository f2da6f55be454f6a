//! Google Shopping search through SerpAPI

use crate::error::RefinementError;
use crate::models::Candidate;
use crate::rate_limiter::RateLimiter;
use crate::search::ProductSearch;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SERPAPI_URL: &str = "https://serpapi.com/search";
const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

pub struct SerpApiSearch {
    client: Client,
    api_key: String,
    base_url: String,
    limiter: Option<Arc<RateLimiter>>,
}

impl SerpApiSearch {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: SERPAPI_URL.to_string(),
            limiter: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// GET with up to three retries on 429/5xx or transport errors,
    /// backing off 1s, 2s, 4s.
    async fn fetch(&self, query: &str, max_results: usize) -> Result<Value> {
        let num = max_results.to_string();
        let params = [
            ("engine", "google_shopping"),
            ("q", query),
            ("api_key", self.api_key.as_str()),
            ("num", num.as_str()),
        ];

        let mut attempt = 0;
        loop {
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }

            let failure = match self.client.get(&self.base_url).query(&params).send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json::<Value>().await?);
                }
                Ok(response) if Self::is_retryable(response.status()) => {
                    format!("status {}", response.status())
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(RefinementError::Search(format!("{}: {}", status, body)));
                }
                Err(e) => e.to_string(),
            };

            if attempt >= MAX_RETRIES {
                return Err(RefinementError::Search(format!(
                    "giving up after {} retries: {}",
                    MAX_RETRIES, failure
                )));
            }

            let backoff = BACKOFF_BASE * 2u32.pow(attempt);
            warn!(
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                %failure,
                "Product search failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

/// Map a SerpAPI response body to candidates. An `"error"` field means no
/// results.
pub fn parse_shopping_results(data: &Value, max_results: usize) -> Vec<Candidate> {
    if let Some(message) = data.get("error").and_then(Value::as_str) {
        warn!(error = %message, "Search API returned an error");
        return Vec::new();
    }

    let text = |item: &Value, key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };

    data.get("shopping_results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(max_results)
                .map(|item| Candidate {
                    title: text(item, "title"),
                    price: text(item, "price"),
                    store: text(item, "source"),
                    link: ["link", "product_link"]
                        .iter()
                        .filter_map(|key| item.get(*key).and_then(Value::as_str))
                        .find(|l| !l.trim().is_empty())
                        .map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ProductSearch for SerpApiSearch {
    async fn search(&self, query: &str, max_results: usize) -> Vec<Candidate> {
        if self.api_key.is_empty() {
            error!("SERPAPI_API_KEY not configured, search returns no results");
            return Vec::new();
        }

        info!(%query, max_results, "Searching products");

        match self.fetch(query, max_results).await {
            Ok(data) => {
                let candidates = parse_shopping_results(&data, max_results);
                debug!(count = candidates.len(), "Search results parsed");
                candidates
            }
            Err(e) => {
                error!(error = %e, "Product search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_shopping_results() {
        let data = json!({
            "shopping_results": [
                {"title": "Weber Spirit E-210", "price": "$449.00", "source": "Home Depot",
                 "link": "https://example.com/weber"},
                {"title": "Char-Broil Classic", "price": "$199.99", "source": "Walmart",
                 "product_link": "https://example.com/charbroil"},
                {"title": "Nexgrill 4-Burner", "price": "$229.00", "source": "Target"}
            ]
        });

        let candidates = parse_shopping_results(&data, 5);

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].store, "Home Depot");
        assert_eq!(candidates[1].link.as_deref(), Some("https://example.com/charbroil"));
        assert_eq!(candidates[2].link, None);
    }

    #[test]
    fn test_parse_respects_max_results() {
        let data = json!({
            "shopping_results": [
                {"title": "A", "price": "$1"},
                {"title": "B", "price": "$2"},
                {"title": "C", "price": "$3"}
            ]
        });

        let candidates = parse_shopping_results(&data, 2);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].title, "B");
        assert_eq!(candidates[1].store, "");
    }

    #[test]
    fn test_api_error_means_no_results() {
        let data = json!({"error": "Google hasn't returned any results for this query."});
        assert!(parse_shopping_results(&data, 5).is_empty());
        assert!(parse_shopping_results(&json!({}), 5).is_empty());
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(SerpApiSearch::is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(SerpApiSearch::is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!SerpApiSearch::is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_missing_key_returns_empty() {
        let search = SerpApiSearch::new("").unwrap();
        assert!(search.search("laptop", 5).await.is_empty());
    }
}
