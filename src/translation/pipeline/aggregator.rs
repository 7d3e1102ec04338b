/*!
 * Result aggregation for a pipeline run.
 *
 * Segments finish out of order; the aggregator slots each outcome back into
 * document order and derives the run summary once every segment reported.
 */

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Stage;
use crate::translation::cache::CacheStats;
use crate::translation::client::ModelMappingEntry;
use crate::translation::document::{Segment, SegmentDocument};
use crate::translation::usage::UsageReport;

use super::orchestrator::PipelineConfig;
use super::state::{CandidateRole, FinalRole, PipelineState};

/// Second-round scores of both candidates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparativeScores {
    pub initial: f32,
    pub optimized: f32,
}

/// Evaluation scores recorded for a segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    /// Mean of the first evaluation
    pub first: Option<f32>,

    /// Comparative round, present only when optimization ran to completion
    pub second: Option<ComparativeScores>,
}

/// Final record for one segment, as written to `<name>_results.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentOutcome {
    pub segment_id: String,
    pub original_text: String,
    pub final_text: String,
    pub final_role: FinalRole,
    pub evaluation_scores: EvaluationScores,

    /// Suggestions from the first evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_text: Option<String>,

    /// Translation-role invocations
    pub attempt_count: u32,
    pub cache_hit: bool,
    pub repaired: bool,
    pub failed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,

    pub cancelled: bool,
}

impl SegmentOutcome {
    /// Build the outcome of a terminal state
    pub fn from_state(segment: &Segment, state: &PipelineState) -> Self {
        let second = match (
            state.evaluations.second.get(&CandidateRole::Initial),
            state.evaluations.second.get(&CandidateRole::Optimized),
        ) {
            (Some(initial), Some(optimized)) => Some(ComparativeScores {
                initial: initial.score(),
                optimized: optimized.score(),
            }),
            _ => None,
        };

        let final_text = state
            .final_candidate
            .as_ref()
            .map(|c| c.text.clone())
            .unwrap_or_else(|| segment.text.clone());

        Self {
            segment_id: segment.id.clone(),
            original_text: segment.text.clone(),
            final_text,
            final_role: state.final_role.unwrap_or(FinalRole::Degraded),
            evaluation_scores: EvaluationScores {
                first: state.evaluations.first.as_ref().map(|e| e.score()),
                second,
            },
            suggestions: state
                .evaluations
                .first
                .as_ref()
                .map(|e| e.suggestions.clone())
                .filter(|s| !s.trim().is_empty()),
            initial_text: state.candidate(CandidateRole::Initial).map(|c| c.text.clone()),
            optimized_text: state.candidate(CandidateRole::Optimized).map(|c| c.text.clone()),
            attempt_count: state.attempt_count,
            cache_hit: state.cache_hit,
            repaired: state.repaired,
            failed: state.failed(),
            failure: state.failure.as_ref().map(|f| f.message.clone()),
            failed_stage: state.failure.as_ref().and_then(|f| f.stage),
            cancelled: state.cancelled,
        }
    }
}

/// Counts over all segments of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub total: usize,
    pub skipped: usize,
    pub cache_hits: usize,
    pub optimized: usize,
    pub repaired: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl PipelineSummary {
    fn add(&mut self, outcome: &SegmentOutcome) {
        self.total += 1;
        match outcome.final_role {
            FinalRole::Skipped => self.skipped += 1,
            FinalRole::Optimized => self.optimized += 1,
            _ => {}
        }
        if outcome.cache_hit {
            self.cache_hits += 1;
        }
        if outcome.repaired {
            self.repaired += 1;
        }
        if outcome.failed {
            self.failed += 1;
        }
        if outcome.cancelled {
            self.cancelled += 1;
        }
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "{} segments: {} skipped, {} from cache, {} optimized, {} repaired, {} failed, {} cancelled",
            self.total,
            self.skipped,
            self.cache_hits,
            self.optimized,
            self.repaired,
            self.failed,
            self.cancelled
        )
    }
}

/// Everything a run produced, in document order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub document: String,
    pub source_language: String,
    pub target_language: String,
    pub outcomes: Vec<SegmentOutcome>,
    pub summary: PipelineSummary,
    pub usage: UsageReport,
    pub cache: CacheStats,

    /// Role alias table for reporting
    pub model_mapping: Vec<ModelMappingEntry>,
    pub duration_ms: u64,
}

impl PipelineReport {
    /// Outcome for a segment id
    pub fn outcome(&self, segment_id: &str) -> Option<&SegmentOutcome> {
        self.outcomes.iter().find(|o| o.segment_id == segment_id)
    }

    /// Final texts in document order
    pub fn final_texts(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.final_text.as_str()).collect()
    }
}

/// Collects outcomes as segments finish
#[derive(Debug)]
pub struct ResultAggregator {
    slots: Vec<Option<SegmentOutcome>>,
}

impl ResultAggregator {
    /// Aggregator for a document of `total` segments
    pub fn new(total: usize) -> Self {
        Self {
            slots: vec![None; total],
        }
    }

    /// Record the outcome of the segment at `index`
    pub fn record(&mut self, index: usize, outcome: SegmentOutcome) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(outcome);
        }
    }

    /// Number of outcomes received
    pub fn completed(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Assemble the report; segments that never reported keep their original text
    pub fn finish(
        self,
        document: &SegmentDocument,
        config: &PipelineConfig,
        usage: UsageReport,
        cache: CacheStats,
        model_mapping: Vec<ModelMappingEntry>,
        duration: Duration,
    ) -> PipelineReport {
        let mut summary = PipelineSummary::default();
        let outcomes: Vec<SegmentOutcome> = self
            .slots
            .into_iter()
            .zip(document.segments.iter())
            .map(|(slot, segment)| {
                slot.unwrap_or_else(|| {
                    let mut state = PipelineState::new(&segment.id);
                    state.cancelled = true;
                    SegmentOutcome::from_state(segment, &state)
                })
            })
            .collect();

        for outcome in &outcomes {
            summary.add(outcome);
        }

        PipelineReport {
            document: document.name.clone(),
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            outcomes,
            summary,
            usage,
            cache,
            model_mapping,
            duration_ms: duration.as_millis() as u64,
        }
    }
}
