//! Environment configuration
//!
//! Values come from the process environment (binaries load `.env` first).
//! Missing API keys are tolerated here; the affected provider fails at call
//! time and the fallback chain takes over.

use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub primary: ProviderConfig,
    pub secondary: ProviderConfig,
    pub serpapi_api_key: String,
    /// Upper bound on attempts per session
    pub max_attempts: u32,
    /// Minimum mean score (1-5 scale) for accepting an attempt
    pub accept_threshold: f64,
    /// Candidates requested from the search backend per attempt
    pub max_results: usize,
    /// Calls allowed per provider within `provider_period_secs`
    pub provider_max_calls: usize,
    pub provider_period_secs: f64,
    pub usd_to_dkk_rate: f64,
    /// Native-currency ceiling used when the criteria state no budget
    pub default_budget_usd: u64,
    pub api_port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            primary: ProviderConfig {
                api_key: String::new(),
                model: "mistral-large-latest".to_string(),
            },
            secondary: ProviderConfig {
                api_key: String::new(),
                model: "gpt-4o-mini".to_string(),
            },
            serpapi_api_key: String::new(),
            max_attempts: 8,
            accept_threshold: 4.0,
            max_results: 5,
            provider_max_calls: 20,
            provider_period_secs: 60.0,
            usd_to_dkk_rate: 7.0,
            default_budget_usd: 400,
            api_port: 8080,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            primary: ProviderConfig {
                api_key: env_string("MISTRAL_API_KEY").unwrap_or_default(),
                model: env_string("MISTRAL_MODEL").unwrap_or(defaults.primary.model),
            },
            secondary: ProviderConfig {
                api_key: env_string("OPENAI_API_KEY").unwrap_or_default(),
                model: env_string("OPENAI_MODEL").unwrap_or(defaults.secondary.model),
            },
            serpapi_api_key: env_string("SERPAPI_API_KEY").unwrap_or_default(),
            max_attempts: env_parse("MAX_ATTEMPTS", defaults.max_attempts).max(1),
            accept_threshold: env_parse_amount("ACCEPT_THRESHOLD", defaults.accept_threshold),
            max_results: env_parse("MAX_RESULTS", defaults.max_results),
            provider_max_calls: env_parse("PROVIDER_MAX_CALLS", defaults.provider_max_calls),
            provider_period_secs: env_parse_amount("PROVIDER_PERIOD_SECS", defaults.provider_period_secs),
            usd_to_dkk_rate: env_parse_amount("USD_TO_DKK_RATE", defaults.usd_to_dkk_rate),
            default_budget_usd: env_parse("DEFAULT_BUDGET_USD", defaults.default_budget_usd),
            api_port: env_string("PORT")
                .or_else(|| env_string("API_PORT"))
                .map(|raw| parse_or_default("PORT", &raw, defaults.api_port))
                .unwrap_or(defaults.api_port),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    env_string(key)
        .map(|raw| parse_or_default(key, &raw, default))
        .unwrap_or(default)
}

/// Like [`env_parse`] for amounts that must be finite and non-negative.
fn env_parse_amount(key: &str, default: f64) -> f64 {
    env_string(key)
        .map(|raw| parse_amount_or_default(key, &raw, default))
        .unwrap_or(default)
}

fn parse_amount_or_default(key: &str, raw: &str, default: f64) -> f64 {
    let value = parse_or_default(key, raw, default);
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!(key, value = raw, %default, "Amount must be finite and non-negative, using default");
        default
    }
}

fn parse_or_default<T: FromStr + Copy + std::fmt::Display>(key: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(key, value = raw, %default, "Invalid configuration value, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = AgentConfig::default();
        assert_eq!(config.max_attempts, 8);
        assert_eq!(config.accept_threshold, 4.0);
        assert_eq!(config.provider_max_calls, 20);
        assert_eq!(config.usd_to_dkk_rate, 7.0);
        assert_eq!(config.default_budget_usd, 400);
    }

    #[test]
    fn test_non_finite_amounts_fall_back() {
        assert_eq!(parse_amount_or_default("PROVIDER_PERIOD_SECS", "inf", 60.0), 60.0);
        assert_eq!(parse_amount_or_default("PROVIDER_PERIOD_SECS", "NaN", 60.0), 60.0);
        assert_eq!(parse_amount_or_default("USD_TO_DKK_RATE", "-7", 7.0), 7.0);
        assert_eq!(parse_amount_or_default("PROVIDER_PERIOD_SECS", "30", 60.0), 30.0);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        assert_eq!(parse_or_default("MAX_ATTEMPTS", "eight", 8u32), 8);
        assert_eq!(parse_or_default("MAX_ATTEMPTS", " 3 ", 8u32), 3);
        assert_eq!(parse_or_default("ACCEPT_THRESHOLD", "3.5", 4.0f64), 3.5);
    }
}
