//! REST API server for the product refinement agent
//!
//! Exposes one refinement session per request over HTTP

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::budget::{resolve_budget, Budget};
use crate::config::AgentConfig;
use crate::controller::RefinementController;
use crate::error::RefinementError;
use crate::models::CriteriaSummary;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefineRequest {
    pub product_type: String,
    /// Criteria lines, typically `- Label: value` bullets
    #[serde(default)]
    pub criteria: Vec<String>,
    /// Ceiling in display currency; taken from the criteria when absent
    pub budget_display: Option<f64>,
    pub max_attempts: Option<u32>,
    pub threshold: Option<f64>,
}

/// Largest attempt bound a request may ask for
pub const MAX_REQUEST_ATTEMPTS: u32 = 32;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<RefinementController>,
    pub config: Arc<AgentConfig>,
}

fn status_for(error: &RefinementError) -> StatusCode {
    match error {
        RefinementError::OverconstrainedBudget { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RefinementError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(error: RefinementError) -> (StatusCode, Json<ApiResponse>) {
    (status_for(&error), Json(ApiResponse::error(error.to_string())))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Refinement Endpoint
/// =============================

async fn run_refinement(
    State(state): State<ApiState>,
    Json(req): Json<RefineRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(product_type = %req.product_type, criteria = req.criteria.len(), "Received refinement request");

    let product_type = req.product_type.trim();
    if product_type.is_empty() {
        return failure(RefinementError::InvalidInput(
            "product_type must not be empty".to_string(),
        ));
    }

    let pricing = state.controller.pricing();
    let mut criteria = CriteriaSummary::new(
        req.criteria
            .iter()
            .map(|line| line.trim_end())
            .filter(|line| !line.trim().is_empty()),
    );

    let budget = match req.budget_display {
        Some(amount) => Budget::from_display(amount, pricing),
        None => resolve_budget(&mut criteria, pricing, state.config.default_budget_usd),
    };
    let budget = match budget {
        Ok(budget) => budget,
        Err(e) => return failure(e),
    };

    let max_attempts = req.max_attempts.unwrap_or(state.config.max_attempts);
    if max_attempts > MAX_REQUEST_ATTEMPTS {
        return failure(RefinementError::InvalidInput(format!(
            "max_attempts must be at most {}",
            MAX_REQUEST_ATTEMPTS
        )));
    }
    let threshold = req.threshold.unwrap_or(state.config.accept_threshold);

    match state
        .controller
        .run_refinement(product_type, criteria, &budget, max_attempts, threshold)
        .await
    {
        Ok(outcome) => {
            let listing = pricing.format_candidates(&outcome.candidates);
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "status": outcome.status,
                    "listing": listing,
                    "recommendation": outcome.recommendation,
                    "budget": budget,
                    "outcome": outcome,
                }))),
            )
        }
        Err(e) => {
            warn!(error = %e, "Refinement request failed");
            failure(e)
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/refine", post(run_refinement))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
