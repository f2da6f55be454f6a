use product_refinement_agent::{
    api::{start_server, ApiState},
    AgentConfig, RefinementController,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AgentConfig::from_env();

    for (key, value) in [
        ("MISTRAL_API_KEY", &config.primary.api_key),
        ("OPENAI_API_KEY", &config.secondary.api_key),
        ("SERPAPI_API_KEY", &config.serpapi_api_key),
    ] {
        if value.is_empty() {
            warn!("⚠️  {} not set in .env", key);
        }
    }

    info!("🚀 Product Refinement Agent - API Server");
    info!("📍 Port: {}", config.api_port);

    let controller = Arc::new(RefinementController::from_config(&config)?);
    info!("✅ Controller initialized");

    let port = config.api_port;
    let state = ApiState {
        controller,
        config: Arc::new(config),
    };

    info!("📡 Starting API server...");
    start_server(state, port).await?;

    Ok(())
}
