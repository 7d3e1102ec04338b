/*!
 * Per-segment pipeline state.
 *
 * A `PipelineState` records where one segment is in the stage sequence, the
 * candidates and evaluations produced so far, and how it terminated. Only
 * the orchestrator mutates it.
 */

use chrono::{DateTime, Utc};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{PipelineError, Stage};
use crate::translation::evaluation::Evaluation;

/// Which role produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateRole {
    Initial,
    Optimized,
}

impl fmt::Display for CandidateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => f.write_str("initial"),
            Self::Optimized => f.write_str("optimized"),
        }
    }
}

/// Where a candidate's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Model,
    Cache,
    /// Untranslated original text passed through
    Original,
}

/// One produced translation for a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Translated text
    pub text: String,

    /// Producing role
    pub role: CandidateRole,

    /// Model call or cache hit
    pub source: CandidateSource,

    /// When the candidate was produced
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    /// Candidate returned by a model call
    pub fn from_model(text: impl Into<String>, role: CandidateRole) -> Self {
        Self {
            text: text.into(),
            role,
            source: CandidateSource::Model,
            created_at: Utc::now(),
        }
    }

    /// Initial candidate served from the translation cache
    pub fn cached(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: CandidateRole::Initial,
            source: CandidateSource::Cache,
            created_at: Utc::now(),
        }
    }

    /// Pass-through of the original text, used for skipped and degraded segments
    pub fn original(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: CandidateRole::Initial,
            source: CandidateSource::Original,
            created_at: Utc::now(),
        }
    }
}

/// States of the per-segment state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Pending,
    Classified,
    Skipped,
    Translating,
    Translated,
    Evaluating1,
    Evaluated1,
    OptimizationSkipped,
    Optimizing,
    Optimized,
    Evaluating2,
    Evaluated2,
    Selected,
    Terminal,
}

impl PipelineStage {
    /// Whether `next` is a legal successor of this state.
    ///
    /// Any non-terminal state may jump to `Terminal` (failure or cancellation).
    pub fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;

        if next == Terminal {
            return self != Terminal;
        }
        matches!(
            (self, next),
            (Pending, Classified)
                | (Classified, Skipped)
                | (Classified, Translating)
                | (Translating, Translated)
                | (Translated, Evaluating1)
                | (Evaluating1, Evaluated1)
                | (Evaluated1, OptimizationSkipped)
                | (Evaluated1, Optimizing)
                | (Optimizing, Optimized)
                | (Optimized, Evaluating2)
                | (Optimized, Selected)
                | (Evaluating2, Evaluated2)
                | (Evaluated2, Selected)
        )
    }
}

/// Role of the final candidate as reported downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalRole {
    /// Simple segment passed through
    Skipped,
    /// Initial candidate served from the cache
    Cache,
    /// Initial model translation
    Initial,
    /// Optimized translation won the comparison
    Optimized,
    /// Nothing usable was produced; original text kept
    Degraded,
}

/// Why a segment is flagged as failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentFailure {
    /// Stage that failed, if a model call was involved
    pub stage: Option<Stage>,

    /// Human-readable cause
    pub message: String,
}

impl From<&PipelineError> for SegmentFailure {
    fn from(error: &PipelineError) -> Self {
        Self {
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

/// Evaluation results by round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTrail {
    /// First-round evaluation of the initial candidate
    pub first: Option<Evaluation>,

    /// Second-round scores keyed by candidate role
    pub second: BTreeMap<CandidateRole, Evaluation>,
}

/// Per-segment finite-state record
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    /// Segment being processed
    pub segment_id: String,

    /// Current state
    pub stage: PipelineStage,

    /// Classifier output
    pub simple: bool,

    /// Translation-role invocations made for this segment
    pub attempt_count: u32,

    /// Candidates produced so far
    pub candidates: BTreeMap<CandidateRole, Candidate>,

    /// Evaluations produced so far
    pub evaluations: EvaluationTrail,

    /// Final candidate, set once terminal
    pub final_candidate: Option<Candidate>,

    /// Reported role of the final candidate
    pub final_role: Option<FinalRole>,

    /// Initial candidate came from the cache
    pub cache_hit: bool,

    /// At least one repair attempt was made
    pub repaired: bool,

    /// Failure flag with cause
    pub failure: Option<SegmentFailure>,

    /// Run was cancelled before this segment completed normally
    pub cancelled: bool,
}

impl PipelineState {
    /// Fresh state for a segment
    pub fn new(segment_id: impl Into<String>) -> Self {
        Self {
            segment_id: segment_id.into(),
            stage: PipelineStage::Pending,
            simple: false,
            attempt_count: 0,
            candidates: BTreeMap::new(),
            evaluations: EvaluationTrail::default(),
            final_candidate: None,
            final_role: None,
            cache_hit: false,
            repaired: false,
            failure: None,
            cancelled: false,
        }
    }

    /// Move to the next state
    pub fn advance(&mut self, next: PipelineStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {:?} -> {:?} for segment {}",
            self.stage,
            next,
            self.segment_id
        );
        trace!("Segment {}: {:?} -> {:?}", self.segment_id, self.stage, next);
        self.stage = next;
    }

    /// Attach a candidate
    pub fn add_candidate(&mut self, candidate: Candidate) {
        self.candidates.insert(candidate.role, candidate);
    }

    /// Candidate for a role, if produced
    pub fn candidate(&self, role: CandidateRole) -> Option<&Candidate> {
        self.candidates.get(&role)
    }

    /// Record a failure, keeping the first one observed
    pub fn fail(&mut self, failure: SegmentFailure) {
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }

    /// Whether the segment is flagged as failed
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Store the final candidate and enter the terminal state
    pub fn finalize(&mut self, candidate: Candidate, role: FinalRole) {
        self.final_candidate = Some(candidate);
        self.final_role = Some(role);
        if self.stage != PipelineStage::Terminal {
            self.advance(PipelineStage::Terminal);
        }
    }

    /// Whether the state machine has finished
    pub fn is_terminal(&self) -> bool {
        self.stage == PipelineStage::Terminal
    }
}
