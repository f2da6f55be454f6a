//! Core data models for the refinement agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Candidate =================
//

/// A single product listing as returned by the search backend.
///
/// Candidates are never mutated after the backend hands them over; the
/// controller only filters and reorders them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub title: String,
    /// Currency-tagged price text, e.g. `"$19.99"`. May be unparsable.
    pub price: String,
    pub store: String,
    /// `None` means the backend had no link for this listing.
    #[serde(default)]
    pub link: Option<String>,
}

impl Candidate {
    pub fn new(
        title: impl Into<String>,
        price: impl Into<String>,
        store: impl Into<String>,
        link: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            price: price.into(),
            store: store.into(),
            link,
        }
    }
}

//
// ================= Criteria =================
//

/// The user's requirements for one session.
///
/// Original criteria lines and feedback notes gathered across attempts are
/// kept apart and only joined when a prompt is rendered. Both lists are
/// append-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CriteriaSummary {
    lines: Vec<String>,
    feedback_notes: Vec<String>,
}

impl CriteriaSummary {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            feedback_notes: Vec::new(),
        }
    }

    /// Split a block of text into criteria lines, dropping blank lines.
    pub fn from_text(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim_end)
                .filter(|line| !line.trim().is_empty()),
        )
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Record feedback from a rejected attempt. Empty feedback is ignored.
    pub fn push_feedback(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !note.trim().is_empty() {
            self.feedback_notes.push(note.trim().to_string());
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn feedback_notes(&self) -> &[String] {
        &self.feedback_notes
    }

    /// Lines formatted as bullet items (`- ...` or `* ...`), marker stripped.
    pub fn bullet_items(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| {
            let trimmed = line.trim_start();
            trimmed
                .strip_prefix('-')
                .or_else(|| trimmed.strip_prefix('*'))
                .map(str::trim)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render the criteria for a prompt: original lines first, then every
    /// feedback note as a `Previous feedback:` paragraph.
    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        for note in &self.feedback_notes {
            text.push_str("\n\nPrevious feedback: ");
            text.push_str(note);
        }
        text
    }
}

impl fmt::Display for CriteriaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

//
// ================= Providers =================
//

/// Position of an LLM provider in the fallback chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Primary,
    Secondary,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provider::Primary => "primary",
            Provider::Secondary => "secondary",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Outcome =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// An attempt reached the acceptance threshold.
    Accepted,
    /// Scoring failed on both providers; the last candidate set is unscored.
    ScoringUnavailable,
    /// Attempts ran out; the best-scoring set is returned.
    BelowThreshold,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Accepted => "accepted",
            OutcomeStatus::ScoringUnavailable => "scoring unavailable",
            OutcomeStatus::BelowThreshold => "below threshold",
        };
        write!(f, "{}", s)
    }
}

/// What happened in one pass through search, filter and score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub query: String,
    pub candidate_count: usize,
    /// `None` when the scorer was unavailable.
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Closing comparison of the returned candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub text: String,
    /// The line marked as the chosen product, if the reply marked one.
    pub pick: Option<String>,
    pub provider: Provider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementOutcome {
    pub session_id: Uuid,
    pub status: OutcomeStatus,
    pub candidates: Vec<Candidate>,
    /// Highest mean seen in the session, if any attempt was scored.
    pub best_mean: Option<f64>,
    pub attempts: Vec<AttemptRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    pub started_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl RefinementOutcome {
    pub fn is_below_threshold(&self) -> bool {
        self.status == OutcomeStatus::BelowThreshold
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullet_items_strip_markers() {
        let criteria = CriteriaSummary::from_text(
            "Summary of your needs:\n- Budget: around 400\n  * Brand: Lenovo\nREADY FOR SEARCH",
        );

        let items: Vec<&str> = criteria.bullet_items().collect();
        assert_eq!(items, vec!["Budget: around 400", "Brand: Lenovo"]);
    }

    #[test]
    fn test_feedback_kept_apart_from_lines() {
        let mut criteria = CriteriaSummary::new(["- Type: gas grill"]);
        criteria.push_feedback("Too few options");
        criteria.push_feedback("   ");

        assert_eq!(criteria.lines(), &["- Type: gas grill".to_string()]);
        assert_eq!(criteria.feedback_notes(), &["Too few options".to_string()]);
        assert_eq!(
            criteria.render(),
            "- Type: gas grill\n\nPrevious feedback: Too few options"
        );
    }

    #[test]
    fn test_outcome_status_serializes_snake_case() {
        let json = serde_json::to_string(&OutcomeStatus::BelowThreshold).unwrap();
        assert_eq!(json, "\"below_threshold\"");
    }
}
