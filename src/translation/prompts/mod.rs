/*!
 * Prompt engineering for the pipeline roles.
 *
 * This module provides:
 * - Templates for translation, evaluation, comparative evaluation and optimization
 * - The per-run prompt context (language pair, glossary)
 * - Target-language specific rules (decimal separators)
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptBuilder, PromptContext, PromptTemplate};
