//! Acceptance and best-attempt policy for the refinement loop

use crate::models::Candidate;

/// The highest-scoring attempt so far and the candidates that earned it.
#[derive(Debug, Clone, PartialEq)]
pub struct BestAttempt {
    pub attempt: u32,
    pub mean: f64,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Mean reached the threshold; the current attempt is the result.
    Accept,
    /// Below threshold with attempts left.
    Retry,
    /// Below threshold on the last allowed attempt.
    Exhausted,
}

/// Tracks scored attempts for one session.
///
/// The best mean never decreases, and only a strictly higher mean replaces
/// the held attempt, so ties resolve to the earliest attempt.
#[derive(Debug)]
pub struct AttemptTracker {
    max_attempts: u32,
    threshold: f64,
    best: Option<BestAttempt>,
}

impl AttemptTracker {
    pub fn new(max_attempts: u32, threshold: f64) -> Self {
        Self {
            max_attempts,
            threshold,
            best: None,
        }
    }

    pub fn best(&self) -> Option<&BestAttempt> {
        self.best.as_ref()
    }

    pub fn best_mean(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.mean)
    }

    /// Record a scored attempt and decide what happens next.
    ///
    /// An accepted attempt always becomes the best: every earlier attempt
    /// was below the threshold it just reached.
    pub fn record(&mut self, attempt: u32, mean: f64, candidates: Vec<Candidate>) -> Decision {
        let improves = self.best.as_ref().map_or(true, |b| mean > b.mean);
        if improves {
            self.best = Some(BestAttempt {
                attempt,
                mean,
                candidates,
            });
        }

        if mean >= self.threshold {
            Decision::Accept
        } else if attempt >= self.max_attempts {
            Decision::Exhausted
        } else {
            Decision::Retry
        }
    }

    pub fn into_best(self) -> Option<BestAttempt> {
        self.best
    }
}
