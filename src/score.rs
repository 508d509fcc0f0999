//! Best and average trace scores
use crate::{KeyValueStore, Scalar, load_json, save_json};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key under which scores are persisted
pub const SCORES_KEY: &str = "trace_scores_v1";

/// Aggregated statistics of trace scores (percent)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scores {
    pub best: Scalar,
    pub average: Scalar,
    pub attempts: u64,
}

impl Scores {
    /// Add score, returns updated statistics
    pub fn add(self, score: Scalar) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let attempts = self.attempts + 1;
        Self {
            best: if self.attempts == 0 {
                score
            } else {
                self.best.max(score)
            },
            average: self.average + (score - self.average) / attempts as Scalar,
            attempts,
        }
    }
}

/// Score aggregator persisted in a key-value store
pub struct ScoreBoard {
    store: Box<dyn KeyValueStore>,
    scores: Scores,
}

impl fmt::Debug for ScoreBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScoreBoard").field(&self.scores).finish()
    }
}

impl ScoreBoard {
    /// Load scores from the store, unreadable data starts from scratch
    pub fn load(store: Box<dyn KeyValueStore>) -> Self {
        let scores = load_json(&*store, SCORES_KEY).unwrap_or_default();
        Self { store, scores }
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    /// Record score in percent and persist statistics
    pub fn record(&mut self, score: Scalar) -> Scores {
        self.scores = self.scores.add(score);
        save_json(&mut *self.store, SCORES_KEY, &self.scores);
        self.scores
    }

    pub fn reset(&mut self) {
        self.scores = Scores::default();
        if let Err(error) = self.store.remove(SCORES_KEY) {
            tracing::warn!(%error, "failed to reset scores");
        }
    }
}
