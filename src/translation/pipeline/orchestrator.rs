/*!
 * Pipeline orchestrator driving each segment through the stage sequence.
 *
 * Per segment:
 * 1. Classification: simple segments are passed through without model calls
 * 2. Translation: cache lookup, then the translation role with a bounded
 *    repair loop for unchanged output
 * 3. Evaluation: the initial candidate is scored
 * 4. Optimization: only below the threshold, followed by a comparative
 *    evaluation of both candidates and selection of the winner
 *
 * Segments run concurrently; each model call holds a slot in its stage's
 * pool only for the duration of the call. Stage failures degrade the segment
 * and never abort the document.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::errors::{AppError, PipelineError, Stage};
use crate::translation::cache::{CacheKey, TranslationCache};
use crate::translation::classifier::SegmentClassifier;
use crate::translation::client::ModelClients;
use crate::translation::concurrency::StagePools;
use crate::translation::document::{Segment, SegmentDocument};
use crate::translation::evaluation::Evaluation;
use crate::translation::prompts::{PromptBuilder, PromptContext};
use crate::translation::scorer::{Scorer, DEFAULT_OPTIMIZATION_THRESHOLD};

use super::aggregator::{PipelineReport, ResultAggregator, SegmentOutcome};
use super::state::{
    Candidate, CandidateRole, FinalRole, PipelineStage, PipelineState, SegmentFailure,
};

/// Configuration for the translation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Source language ("auto", a name or an ISO code)
    pub source_language: String,

    /// Target language
    pub target_language: String,

    /// Score at or above which optimization is skipped
    pub optimization_threshold: f32,

    /// Extra translation attempts when the output equals the input
    pub repair_retry_limit: u32,

    /// Additional patterns for segments that never need translation
    pub exclusion_patterns: Vec<String>,

    /// Terminology injected into every prompt
    pub glossary: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_language: "auto".to_string(),
            target_language: "Chinese".to_string(),
            optimization_threshold: DEFAULT_OPTIMIZATION_THRESHOLD,
            repair_retry_limit: 2,
            exclusion_patterns: Vec::new(),
            glossary: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline configuration.
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            ..Default::default()
        }
    }

    /// Pipeline configuration from the application configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            optimization_threshold: config.pipeline.optimization_threshold,
            repair_retry_limit: config.pipeline.repair_retry_limit,
            exclusion_patterns: config.pipeline.exclusion_patterns.clone(),
            glossary: None,
        }
    }

    /// Set the optimization threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.optimization_threshold = threshold;
        self
    }

    /// Set the repair retry limit.
    pub fn with_repair_retry_limit(mut self, limit: u32) -> Self {
        self.repair_retry_limit = limit;
        self
    }

    /// Set the glossary text.
    pub fn with_glossary(mut self, glossary: impl Into<String>) -> Self {
        self.glossary = Some(glossary.into());
        self
    }

    /// Add classifier exclusion patterns.
    pub fn with_exclusions(mut self, patterns: Vec<String>) -> Self {
        self.exclusion_patterns = patterns;
        self
    }
}

/// Cooperative, document-level cancellation signal
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared by every segment of a run
#[derive(Debug, Clone, Default)]
pub struct PipelineSession {
    cache: TranslationCache,
}

impl PipelineSession {
    /// Create a session around a cache
    pub fn new(cache: TranslationCache) -> Self {
        Self { cache }
    }

    /// Translation cache of this session
    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }
}

/// Progress notifications emitted while a document runs
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A model-invoking stage finished for one segment
    StageCompleted { segment_id: String, stage: Stage },
    /// A segment reached its terminal state
    SegmentFinished {
        segment_id: String,
        completed: usize,
        total: usize,
    },
}

/// Progress callback
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Drives segments through classification, translation, evaluation,
/// optimization and selection.
pub struct TranslationPipeline {
    config: PipelineConfig,
    classifier: SegmentClassifier,
    clients: ModelClients,
    pools: StagePools,
    scorer: Scorer,
    prompts: PromptBuilder,
    progress: Option<ProgressCallback>,
}

impl TranslationPipeline {
    /// Create a pipeline; fails on invalid exclusion patterns
    pub fn new(config: PipelineConfig, clients: ModelClients, pools: StagePools) -> Result<Self, AppError> {
        let classifier = SegmentClassifier::with_exclusions(&config.exclusion_patterns)
            .map_err(|e| AppError::Config(format!("Invalid exclusion pattern: {}", e)))?;

        let mut context = PromptContext::new(&config.source_language, &config.target_language);
        if let Some(glossary) = &config.glossary {
            context = context.with_glossary(glossary.clone());
        }

        Ok(Self {
            scorer: Scorer::new(config.optimization_threshold),
            prompts: PromptBuilder::new(context),
            classifier,
            clients,
            pools,
            config,
            progress: None,
        })
    }

    /// Register a progress callback
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Role clients used by this pipeline
    pub fn clients(&self) -> &ModelClients {
        &self.clients
    }

    fn notify(&self, event: ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(&event);
        }
    }

    fn stage_done(&self, segment: &Segment, stage: Stage) {
        self.notify(ProgressEvent::StageCompleted {
            segment_id: segment.id.clone(),
            stage,
        });
    }

    /// Run every segment of a document; never fails at the document level
    pub async fn run(
        &self,
        document: &SegmentDocument,
        session: &PipelineSession,
        cancel: &CancellationFlag,
    ) -> PipelineReport {
        let start = Instant::now();
        let usage_before = self.clients.usage().report();
        let total = document.len();
        info!(
            "Processing {} segments of '{}' ({} -> {})",
            total, document.name, self.config.source_language, self.config.target_language
        );

        let mut aggregator = ResultAggregator::new(total);
        let in_flight = self.pools.total_capacity().max(1);

        let mut outcomes = stream::iter(document.segments.iter().enumerate())
            .map(|(index, segment)| async move {
                let state = self.process_segment(segment, session, cancel).await;
                (index, SegmentOutcome::from_state(segment, &state))
            })
            .buffer_unordered(in_flight);

        let mut completed = 0;
        while let Some((index, outcome)) = outcomes.next().await {
            completed += 1;
            self.notify(ProgressEvent::SegmentFinished {
                segment_id: outcome.segment_id.clone(),
                completed,
                total,
            });
            aggregator.record(index, outcome);
        }

        let report = aggregator.finish(
            document,
            &self.config,
            self.clients.usage().report().since(&usage_before),
            session.cache().stats(),
            self.clients.model_mapping(),
            start.elapsed(),
        );
        info!("{}", report.summary.summary());
        report
    }

    /// Drive one segment to its terminal state
    pub async fn process_segment(
        &self,
        segment: &Segment,
        session: &PipelineSession,
        cancel: &CancellationFlag,
    ) -> PipelineState {
        let mut state = PipelineState::new(&segment.id);
        if cancel.is_cancelled() {
            return self.finish_cancelled(segment, state, None);
        }

        // Pending -> Classified
        let classified = self.classifier.classify(segment);
        state.advance(PipelineStage::Classified);
        match classified {
            Ok(simple) => state.simple = simple,
            Err(error) => {
                warn!("{}", error);
                state.fail(SegmentFailure::from(&error));
                state.finalize(Candidate::original(&segment.text), FinalRole::Degraded);
                return state;
            }
        }

        if state.simple {
            debug!("Segment {} is simple, skipping", segment.id);
            state.advance(PipelineStage::Skipped);
            state.finalize(Candidate::original(&segment.text), FinalRole::Skipped);
            return state;
        }

        // Classified -> Translating -> Translated
        state.advance(PipelineStage::Translating);
        let key = CacheKey::new(
            &segment.text,
            &self.config.source_language,
            &self.config.target_language,
        );
        let initial = match session.cache().lookup(&key) {
            Some(cached) => {
                state.cache_hit = true;
                cached
            }
            None => match self.translate_with_repair(segment, &mut state, cancel).await {
                Ok(text) => Candidate::from_model(text, CandidateRole::Initial),
                Err(PipelineError::Cancelled) => return self.finish_cancelled(segment, state, None),
                Err(PipelineError::NoOpTranslation { text, .. }) => {
                    warn!(
                        "Segment {}: translation unchanged after {} attempts, accepting as low confidence",
                        segment.id, state.attempt_count
                    );
                    let candidate = Candidate::from_model(text, CandidateRole::Initial);
                    state.add_candidate(candidate.clone());
                    state.fail(SegmentFailure {
                        stage: Some(Stage::Translation),
                        message: format!(
                            "Translation unchanged after {} attempts",
                            state.attempt_count
                        ),
                    });
                    state.finalize(candidate, FinalRole::Initial);
                    return state;
                }
                Err(error) => {
                    warn!("Segment {}: {}", segment.id, error);
                    state.fail(SegmentFailure::from(&error));
                    state.finalize(Candidate::original(&segment.text), FinalRole::Degraded);
                    return state;
                }
            },
        };
        state.add_candidate(initial.clone());
        state.advance(PipelineStage::Translated);

        // Translated -> Evaluating1 -> Evaluated1
        if cancel.is_cancelled() {
            return self.finish_cancelled(segment, state, Some(initial));
        }
        state.advance(PipelineStage::Evaluating1);
        let first = match self.evaluate_initial(segment, &initial).await {
            Ok(evaluation) => evaluation,
            Err(error) => return self.finish_with_initial_after_error(segment, state, initial, error),
        };
        state.evaluations.first = Some(first.clone());
        state.advance(PipelineStage::Evaluated1);

        if !self.scorer.decide_optimize(&first) {
            state.advance(PipelineStage::OptimizationSkipped);
            return self.finish_with_initial(state, initial, session, &key);
        }

        // Evaluated1 -> Optimizing -> Optimized
        if cancel.is_cancelled() {
            return self.finish_cancelled(segment, state, Some(initial));
        }
        state.advance(PipelineStage::Optimizing);
        let optimized = match self.optimize(segment, &initial, &first.suggestions).await {
            Ok(text) => Candidate::from_model(text, CandidateRole::Optimized),
            Err(PipelineError::NoOpTranslation { .. }) => {
                warn!(
                    "Segment {}: optimizer returned the source text, keeping initial translation",
                    segment.id
                );
                state.advance(PipelineStage::Terminal);
                return self.finish_with_initial(state, initial, session, &key);
            }
            Err(error) => return self.finish_with_initial_after_error(segment, state, initial, error),
        };
        state.add_candidate(optimized.clone());
        state.advance(PipelineStage::Optimized);

        if optimized.text.trim() == initial.text.trim() {
            debug!("Segment {}: optimization made no change, keeping initial", segment.id);
            state.advance(PipelineStage::Selected);
            return self.finish_with_initial(state, initial, session, &key);
        }

        // Optimized -> Evaluating2 -> Evaluated2 -> Selected
        if cancel.is_cancelled() {
            return self.finish_cancelled(segment, state, Some(initial));
        }
        state.advance(PipelineStage::Evaluating2);
        let (initial_eval, optimized_eval) = match self.compare(segment, &initial, &optimized).await {
            Ok(evaluations) => evaluations,
            Err(error) => return self.finish_with_initial_after_error(segment, state, initial, error),
        };
        state.evaluations.second.insert(CandidateRole::Initial, initial_eval.clone());
        state.evaluations.second.insert(CandidateRole::Optimized, optimized_eval.clone());
        state.advance(PipelineStage::Evaluated2);

        let winner = self.scorer.select(&initial_eval, &optimized_eval);
        state.advance(PipelineStage::Selected);
        debug!(
            "Segment {}: initial {:.2} vs optimized {:.2}, {} wins",
            segment.id,
            initial_eval.score(),
            optimized_eval.score(),
            winner
        );

        match winner {
            CandidateRole::Optimized => {
                state.finalize(optimized, FinalRole::Optimized);
                self.store_final(&state, session, key);
                state
            }
            CandidateRole::Initial => self.finish_with_initial(state, initial, session, &key),
        }
    }

    /// Translation with the bounded repair loop for unchanged output
    async fn translate_with_repair(
        &self,
        segment: &Segment,
        state: &mut PipelineState,
        cancel: &CancellationFlag,
    ) -> Result<String, PipelineError> {
        loop {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            state.attempt_count += 1;
            let result = {
                let _permit = self.pools.acquire(Stage::Translation).await?;
                self.clients.translate(segment, &self.prompts).await
            };
            self.stage_done(segment, Stage::Translation);

            match result {
                Err(PipelineError::NoOpTranslation { .. })
                    if state.attempt_count <= self.config.repair_retry_limit =>
                {
                    state.repaired = true;
                    debug!(
                        "Segment {}: unchanged translation, repair attempt {}/{}",
                        segment.id, state.attempt_count, self.config.repair_retry_limit
                    );
                }
                other => return other,
            }
        }
    }

    async fn evaluate_initial(
        &self,
        segment: &Segment,
        initial: &Candidate,
    ) -> Result<Evaluation, PipelineError> {
        let result = {
            let _permit = self.pools.acquire(Stage::Evaluation1).await?;
            self.clients.evaluate(segment, &initial.text, &self.prompts).await
        };
        self.stage_done(segment, Stage::Evaluation1);
        result
    }

    async fn optimize(
        &self,
        segment: &Segment,
        initial: &Candidate,
        suggestions: &str,
    ) -> Result<String, PipelineError> {
        let result = {
            let _permit = self.pools.acquire(Stage::Optimization).await?;
            self.clients
                .optimize(segment, &initial.text, suggestions, &self.prompts)
                .await
        };
        self.stage_done(segment, Stage::Optimization);
        result
    }

    async fn compare(
        &self,
        segment: &Segment,
        initial: &Candidate,
        optimized: &Candidate,
    ) -> Result<(Evaluation, Evaluation), PipelineError> {
        let result = {
            let _permit = self.pools.acquire(Stage::Evaluation2).await?;
            self.clients
                .evaluate_comparative(segment, &initial.text, &optimized.text, &self.prompts)
                .await
        };
        self.stage_done(segment, Stage::Evaluation2);
        result
    }

    fn initial_role(state: &PipelineState) -> FinalRole {
        if state.cache_hit {
            FinalRole::Cache
        } else {
            FinalRole::Initial
        }
    }

    /// Finalize with the initial candidate and write it to the cache
    fn finish_with_initial(
        &self,
        mut state: PipelineState,
        initial: Candidate,
        session: &PipelineSession,
        key: &CacheKey,
    ) -> PipelineState {
        let role = Self::initial_role(&state);
        state.finalize(initial, role);
        self.store_final(&state, session, key.clone());
        state
    }

    /// A later stage failed: keep the initial candidate, flag the failure
    fn finish_with_initial_after_error(
        &self,
        segment: &Segment,
        mut state: PipelineState,
        initial: Candidate,
        error: PipelineError,
    ) -> PipelineState {
        if matches!(error, PipelineError::Cancelled) {
            return self.finish_cancelled(segment, state, Some(initial));
        }

        warn!("Segment {}: {}, keeping initial translation", segment.id, error);
        state.fail(SegmentFailure::from(&error));
        let role = Self::initial_role(&state);
        state.finalize(initial, role);
        state
    }

    /// Cancellation observed: keep the best text available so far
    fn finish_cancelled(
        &self,
        segment: &Segment,
        mut state: PipelineState,
        best: Option<Candidate>,
    ) -> PipelineState {
        debug!("Segment {}: cancelled in {:?}", segment.id, state.stage);
        state.cancelled = true;
        match best {
            Some(candidate) => {
                let role = Self::initial_role(&state);
                state.finalize(candidate, role);
            }
            None => state.finalize(Candidate::original(&segment.text), FinalRole::Degraded),
        }
        state
    }

    /// Cache the final text of a segment that completed without failure
    fn store_final(&self, state: &PipelineState, session: &PipelineSession, key: CacheKey) {
        if state.failed() || state.cancelled {
            return;
        }
        if let Some(candidate) = &state.final_candidate {
            session.cache().store(key, &candidate.text);
        }
    }
}
