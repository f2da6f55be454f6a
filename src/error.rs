//! Error types for the product refinement agent

use thiserror::Error;

/// Result type alias for refinement operations
pub type Result<T> = std::result::Result<T, RefinementError>;

#[derive(Error, Debug)]
pub enum RefinementError {

    // =============================
    // External Collaborators
    // =============================

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Search error: {0}")]
    Search(String),

    // =============================
    // Session Termination
    // =============================

    #[error("No products found within budget ({ceiling} {currency})")]
    OverconstrainedBudget { ceiling: u64, currency: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RefinementError {
    /// True when the session ended because no result fit the budget.
    pub fn is_overconstrained(&self) -> bool {
        matches!(self, RefinementError::OverconstrainedBudget { .. })
    }
}
