//! Budget derivation and filtering
//!
//! The user states a ceiling in display currency; the search backend quotes
//! in native currency. The native ceiling is computed once per session and
//! always rounded up so the user is never under-budgeted.

use crate::error::RefinementError;
use crate::models::{Candidate, CriteriaSummary};
use crate::pricing::{Currency, PriceNormalizer};
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

lazy_static! {
    static ref BUDGET_AMOUNT: Regex =
        Regex::new(r"(?i)budget[^0-9\n]*(\d[\d,]*)").expect("budget pattern is valid");
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    /// Whole native-currency units.
    pub ceiling: u64,
    pub currency: Currency,
}

impl Budget {
    pub fn native(ceiling: u64, currency: Currency) -> Self {
        Self { ceiling, currency }
    }

    /// Convert a display-currency ceiling to native currency, rounding up.
    pub fn from_display(amount: f64, pricing: &PriceNormalizer) -> Result<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(RefinementError::InvalidInput(format!(
                "Budget must be a non-negative amount, got {}",
                amount
            )));
        }

        let native = pricing
            .convert(amount, pricing.display(), pricing.native())
            .ok_or_else(|| {
                RefinementError::Config(format!(
                    "No exchange rate from {} to {}",
                    pricing.display(),
                    pricing.native()
                ))
            })?;

        Ok(Self::native(native.ceil() as u64, pricing.native()))
    }

    pub fn allows(&self, amount: f64) -> bool {
        amount <= self.ceiling as f64
    }
}

/// First amount following a "budget" mention on the same criteria line.
pub fn extract_display_budget(criteria: &CriteriaSummary) -> Option<f64> {
    criteria.lines().iter().find_map(|line| {
        let digits: String = BUDGET_AMOUNT
            .captures(line)?
            .get(1)?
            .as_str()
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    })
}

/// Budget stated in the criteria, or `default_native` when none is stated.
///
/// When the default is used a plain (non-bullet) note is appended to the
/// criteria so the scorer sees the ceiling without it entering the query.
pub fn resolve_budget(
    criteria: &mut CriteriaSummary,
    pricing: &PriceNormalizer,
    default_native: u64,
) -> Result<Budget> {
    match extract_display_budget(criteria) {
        Some(amount) => {
            let budget = Budget::from_display(amount, pricing)?;
            info!(
                display = amount,
                native = budget.ceiling,
                currency = %budget.currency,
                "Budget derived from criteria"
            );
            Ok(budget)
        }
        None => {
            let budget = Budget::native(default_native, pricing.native());
            criteria.push_line(format!(
                "Budget (default): up to {} {}",
                budget.ceiling, budget.currency
            ));
            info!(native = budget.ceiling, "No budget in criteria, using default");
            Ok(budget)
        }
    }
}

/// Keep candidates within the ceiling. Candidates without a parsable
/// native price pass through.
pub fn filter_within_budget(
    candidates: Vec<Candidate>,
    budget: &Budget,
    pricing: &PriceNormalizer,
) -> Vec<Candidate> {
    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| pricing.native_amount(c).map_or(true, |amount| budget.allows(amount)))
        .collect();

    debug!(
        before,
        after = kept.len(),
        ceiling = budget.ceiling,
        "Budget filter applied"
    );
    kept
}
