/*!
 * Score-driven decisions.
 *
 * Optimization is the exception: it only runs when the first evaluation falls
 * below the threshold. When both candidates are scored, the optimized one has
 * to be strictly better to replace the initial translation.
 */

use log::debug;

use crate::translation::evaluation::{Evaluation, MAX_SCORE, MIN_SCORE};
use crate::translation::pipeline::state::CandidateRole;

/// Default optimization threshold on the 0-10 scale
pub const DEFAULT_OPTIMIZATION_THRESHOLD: f32 = 9.5;

/// Interprets evaluations for the orchestrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    /// Score at or above which optimization is skipped
    threshold: f32,
}

impl Scorer {
    /// Create a scorer, clamping the threshold to the evaluation scale
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(MIN_SCORE, MAX_SCORE),
        }
    }

    /// Configured optimization threshold
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether the evaluated candidate should be sent to the optimization role
    pub fn decide_optimize(&self, evaluation: &Evaluation) -> bool {
        let optimize = evaluation.score() < self.threshold;
        debug!(
            "Score {:.2} vs threshold {:.2}: {}",
            evaluation.score(),
            self.threshold,
            if optimize { "optimize" } else { "keep" }
        );
        optimize
    }

    /// Pick the winning candidate; ties keep the initial translation
    pub fn select(&self, initial: &Evaluation, optimized: &Evaluation) -> CandidateRole {
        if optimized.score() > initial.score() {
            CandidateRole::Optimized
        } else {
            CandidateRole::Initial
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(DEFAULT_OPTIMIZATION_THRESHOLD)
    }
}
