use product_refinement_agent::{
    budget::resolve_budget, AgentConfig, CriteriaSummary, OutcomeStatus, RefinementController,
};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reads a request from the file named by the first argument, or stdin.
/// The first non-empty line is the product type; the rest are criteria.
async fn read_request() -> Result<(String, CriteriaSummary), Box<dyn std::error::Error>> {
    let text = match std::env::args().nth(1) {
        Some(path) => tokio::fs::read_to_string(&path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let mut lines = text.lines().skip_while(|line| line.trim().is_empty());
    let product_type = lines
        .next()
        .map(|line| line.trim().to_string())
        .ok_or("expected a product type on the first line")?;
    let criteria = CriteriaSummary::from_text(&lines.collect::<Vec<_>>().join("\n"));

    Ok((product_type, criteria))
}

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
    let (product_type, mut criteria) = read_request().await?;

    info!(%product_type, criteria = criteria.lines().len(), "Product refinement starting");

    let controller = RefinementController::from_config(&config)?;
    let budget = resolve_budget(&mut criteria, controller.pricing(), config.default_budget_usd)?;

    match controller
        .run_refinement(
            &product_type,
            criteria,
            &budget,
            config.max_attempts,
            config.accept_threshold,
        )
        .await
    {
        Ok(outcome) => {
            println!("\n=== REFINEMENT RESULT ===");
            println!("Session: {}", outcome.session_id);
            println!("Status: {}", outcome.status);
            if let Some(mean) = outcome.best_mean {
                println!("Best score: {:.2}", mean);
            }
            println!("\nAttempts:");
            for record in &outcome.attempts {
                let score = record
                    .mean
                    .map(|m| format!("{:.2}", m))
                    .unwrap_or_else(|| "unscored".to_string());
                println!("  {}: \"{}\" → {} results, {}", record.attempt, record.query, record.candidate_count, score);
            }
            println!("\n{}", controller.pricing().format_candidates(&outcome.candidates));

            if outcome.status == OutcomeStatus::BelowThreshold {
                println!(
                    "\nNo result reached {:.1}; showing the best of {} attempts.",
                    config.accept_threshold,
                    outcome.attempts_used()
                );
            }

            println!("\n=== RECOMMENDATION ===");
            match &outcome.recommendation {
                Some(rec) => println!("{}\n\n(via {} provider)", rec.text, rec.provider),
                None => println!("No recommendation available."),
            }
            Ok(())
        }
        Err(e) if e.is_overconstrained() => {
            eprintln!("{}. Try raising the budget or relaxing the criteria.", e);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Refinement failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
