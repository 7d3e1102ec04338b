/*!
 * Segment translation with evaluation and optimization.
 *
 * This module contains the translation core. It is split into several submodules:
 *
 * - `document`: Segment and document model
 * - `classifier`: Detection of segments that need no translation
 * - `cache`: Caching of accepted translations
 * - `client`: Role-bound model clients with retries and timeouts
 * - `concurrency`: Per-stage worker pools
 * - `prompts`: Prompt templates and builders
 * - `evaluation`: Evaluation parsing and scoring
 * - `scorer`: Optimization and selection decisions
 * - `placeholders`: Placeholder token cleanup
 * - `usage`: Token accounting per stage
 * - `pipeline`: Per-segment state machine and orchestration
 */

pub use self::cache::TranslationCache;
pub use self::document::{Segment, SegmentDocument};
pub use self::pipeline::{
    CancellationFlag, PipelineConfig, PipelineReport, PipelineSession, TranslationPipeline,
};

pub mod cache;
pub mod classifier;
pub mod client;
pub mod concurrency;
pub mod document;
pub mod evaluation;
pub mod pipeline;
pub mod placeholders;
pub mod prompts;
pub mod scorer;
pub mod usage;
