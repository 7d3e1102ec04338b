/*!
 * Multi-stage translation pipeline.
 *
 * Each segment moves through a finite-state sequence:
 * 1. **Classification**: simple segments skip every model call
 * 2. **Translation**: cache lookup, then the translation role with repair
 * 3. **Evaluation**: the initial candidate is scored on five dimensions
 * 4. **Optimization**: low scores trigger a rewrite and a comparative round
 *
 * - `state`: per-segment state machine and candidates
 * - `orchestrator`: drives segments concurrently through the stages
 * - `aggregator`: collects outcomes into the run report
 */

pub mod aggregator;
pub mod orchestrator;
pub mod state;

pub use aggregator::{PipelineReport, PipelineSummary, ResultAggregator, SegmentOutcome};
pub use orchestrator::{
    CancellationFlag, PipelineConfig, PipelineSession, ProgressCallback, ProgressEvent,
    TranslationPipeline,
};
pub use state::{Candidate, CandidateRole, CandidateSource, FinalRole, PipelineStage, PipelineState};
