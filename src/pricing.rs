//! Currency and price normalization
//!
//! Prices arrive from the search backend as free text. Only prices carrying
//! a recognised currency marker are parsed; everything else is reported as
//! unparsable and never guessed at.

use crate::models::Candidate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Dkk,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Dkk => "DKK",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "USD" => Some(Currency::Usd),
            "DKK" => Some(Currency::Dkk),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Leading symbols that mark a price as parsable, with their currency.
const PRICE_MARKERS: &[(&str, Currency)] = &[("$", Currency::Usd)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Price {
    pub amount: f64,
    pub currency: Currency,
}

/// Parse a currency-marked price such as `"$1,299.00"`.
///
/// Returns `None` for anything without a known marker, including prices
/// quoted in other notations like `"199 kr."`.
pub fn parse_price(text: &str) -> Option<Price> {
    let trimmed = text.trim();

    PRICE_MARKERS.iter().find_map(|(marker, currency)| {
        let digits: String = trimmed
            .strip_prefix(marker)?
            .trim()
            .chars()
            .filter(|c| *c != ',')
            .collect();

        let amount: f64 = digits.parse().ok()?;
        if amount.is_finite() && amount >= 0.0 {
            Some(Price {
                amount,
                currency: *currency,
            })
        } else {
            None
        }
    })
}

/// Fixed exchange-rate table. No live lookups.
#[derive(Debug, Clone, Default)]
pub struct ExchangeRates {
    rates: Vec<(Currency, Currency, f64)>,
}

impl ExchangeRates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `1 from = rate to`. The inverse direction is derived.
    pub fn with_rate(mut self, from: Currency, to: Currency, rate: f64) -> Self {
        self.rates.retain(|(f, t, _)| !(*f == from && *t == to));
        self.rates.push((from, to, rate));
        self
    }

    pub fn convert(&self, amount: f64, from: Currency, to: Currency) -> Option<f64> {
        if from == to {
            return Some(amount);
        }

        self.rates.iter().find_map(|(f, t, rate)| {
            if *f == from && *t == to {
                Some(amount * rate)
            } else if *f == to && *t == from && *rate != 0.0 {
                Some(amount / rate)
            } else {
                None
            }
        })
    }
}

/// Price handling for one session: which currency the backend quotes in,
/// which currency the user thinks in, and the rates between them.
#[derive(Debug, Clone)]
pub struct PriceNormalizer {
    native: Currency,
    display: Currency,
    rates: ExchangeRates,
}

impl PriceNormalizer {
    pub fn new(native: Currency, display: Currency, rates: ExchangeRates) -> Self {
        Self {
            native,
            display,
            rates,
        }
    }

    /// USD-quoting backend with a DKK-speaking user.
    pub fn usd_dkk(usd_to_dkk: f64) -> Self {
        Self::new(
            Currency::Usd,
            Currency::Dkk,
            ExchangeRates::new().with_rate(Currency::Usd, Currency::Dkk, usd_to_dkk),
        )
    }

    pub fn native(&self) -> Currency {
        self.native
    }

    pub fn display(&self) -> Currency {
        self.display
    }

    pub fn convert(&self, amount: f64, from: Currency, to: Currency) -> Option<f64> {
        self.rates.convert(amount, from, to)
    }

    /// The candidate's price in native currency, if it parses as one.
    pub fn native_amount(&self, candidate: &Candidate) -> Option<f64> {
        parse_price(&candidate.price)
            .filter(|p| p.currency == self.native)
            .map(|p| p.amount)
    }

    /// Ascending by native price; unparsable prices last in their original order.
    pub fn sort_by_price(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| {
            match (self.native_amount(a), self.native_amount(b)) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
        candidates
    }

    pub fn format_for_display(&self, candidate: &Candidate) -> String {
        let converted = parse_price(&candidate.price)
            .and_then(|p| {
                if p.currency == self.display {
                    return None;
                }
                self.convert(p.amount, p.currency, self.display)
            })
            .map(|amount| format!(" ({} {})", amount.round() as i64, self.display))
            .unwrap_or_default();

        let link = candidate
            .link
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or("Unavailable");

        format!(
            "📦 {}\n   💰 Price: {}{}\n   🏪 Store: {}\n   🔗 Link: {}\n",
            candidate.title, candidate.price, converted, candidate.store, link
        )
    }

    /// Numbered listing in the order given. This is the text sent for scoring.
    pub fn format_candidates(&self, candidates: &[Candidate]) -> String {
        if candidates.is_empty() {
            return "No products found.".to_string();
        }

        candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, self.format_for_display(c)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
