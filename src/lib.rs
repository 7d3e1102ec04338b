/*!
 * # DocuFluent
 *
 * A Rust library for multi-model document translation with automatic
 * quality evaluation and optimization.
 *
 * ## Features
 *
 * - Three independently configured model roles:
 *   - Translator (A) produces the initial translation
 *   - Evaluator (B) scores it on five dimensions
 *   - Optimizer (C) rewrites low-scoring translations
 * - Comparative re-evaluation and strict selection of the better candidate
 * - Simple-segment detection that skips codes, numbers and placeholders
 * - Bounded repair when a model echoes its input untranslated
 * - Persistent translation cache
 * - Per-stage worker pools and token accounting
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `translation`: The pipeline core:
 *   - `translation::classifier`: Simple-segment detection
 *   - `translation::cache`: Translation cache
 *   - `translation::client`: Role-bound model clients
 *   - `translation::pipeline`: Per-segment state machine and orchestration
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `providers`: Client implementations for various LLM providers:
 *   - `providers::openai`: OpenAI and Azure OpenAI API client
 *   - `providers::anthropic`: Anthropic API client
 *   - `providers::ollama`: Ollama API client
 *   - `providers::mock`: Scripted provider for tests
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, PipelineError, ProviderError};
pub use language_utils::{display_name, is_auto, same_language};
pub use translation::{
    CancellationFlag, PipelineConfig, PipelineReport, PipelineSession, Segment, SegmentDocument,
    TranslationCache, TranslationPipeline,
};
