/*!
 * Prompt templates for the three pipeline roles.
 *
 * Every prompt is rendered from a template with `{name}` variables plus a
 * numbered rule list. Language-specific number formatting rules and the
 * optional glossary are appended as extra rules so that all roles see the
 * same constraints.
 */

use crate::language_utils;

/// Prompt template with `{name}` variables.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// System prompt for the translation role.
    pub const TRANSLATOR: &'static str = r#"You are a professional translator.
Task: Translate the user's text{source_clause} to {target_language}.
Rules:
{rules}"#;

    /// Single-candidate evaluation prompt.
    pub const EVALUATOR: &'static str = r#"Evaluate the translation provided below.

Context:
- {source_clause}
- The target language is {target_language}.
{glossary_block}
Content to Evaluate:
Original: {original}
Translation: {translation}

Evaluation Dimensions (0-10): Accuracy, Fluency, Consistency, Terminology Accuracy, Completeness.

{evaluation_rules}

Identify the source language first, then provide a score (0-10) for each dimension and suggestions for improvement.

Return JSON format:
{
    "detected_source_lang": "<string>",
    "accuracy": <int>,
    "fluency": <int>,
    "consistency": <int>,
    "terminology": <int>,
    "completeness": <int>,
    "suggestions": "<string>"
}"#;

    /// Comparative evaluation prompt scoring both candidates independently.
    pub const COMPARATIVE_EVALUATOR: &'static str = r#"Evaluate the two translations provided below. Score each translation on its own merits.

Context:
- {source_clause}
- The target language is {target_language}.
{glossary_block}
Content to Evaluate:
Original: {original}
Model A Translation: {initial}
Model C Translation: {optimized}

Evaluation Dimensions (0-10): Accuracy, Fluency, Consistency, Terminology Accuracy, Completeness.

{evaluation_rules}

Identify the source language first, then provide a score (0-10) for each dimension of each translation and suggestions for improvement.

Return JSON format:
{
    "detected_source_lang": "<string>",
    "model_a": {
        "accuracy": <int>,
        "fluency": <int>,
        "consistency": <int>,
        "terminology": <int>,
        "completeness": <int>,
        "suggestions": "<string>"
    },
    "model_c": {
        "accuracy": <int>,
        "fluency": <int>,
        "consistency": <int>,
        "terminology": <int>,
        "completeness": <int>,
        "suggestions": "<string>"
    }
}"#;

    /// System prompt for the optimization role.
    pub const OPTIMIZER: &'static str = r#"You are a translation optimizer.
Task: Improve the translation based on the provided suggestions.
Target Language: {target_language}
Rules:
{rules}"#;

    /// User prompt for the optimization role.
    pub const OPTIMIZER_INPUT: &'static str = r#"Original: {original}
Current Translation: {translation}
Suggestions: {suggestions}"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template, replacing each `{name}` with its value.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        vars.iter().fold(self.template.clone(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
    }
}

/// Language pair and terminology shared by every prompt of a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PromptContext {
    /// Source language as configured ("auto" or a name)
    pub source_language: String,

    /// Target language name
    pub target_language: String,

    /// Terminology constraints, injected verbatim
    pub glossary: Option<String>,
}

impl PromptContext {
    /// Create a context, resolving ISO codes to English language names
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: language_utils::display_name(source_language),
            target_language: language_utils::display_name(target_language),
            glossary: None,
        }
    }

    /// Attach glossary text; blank text is ignored
    pub fn with_glossary(mut self, glossary: impl Into<String>) -> Self {
        let glossary = glossary.into();
        self.glossary = if glossary.trim().is_empty() {
            None
        } else {
            Some(glossary.trim().to_string())
        };
        self
    }

    /// Whether source and target resolve to the same language
    pub fn is_same_language(&self) -> bool {
        language_utils::same_language(&self.source_language, &self.target_language)
    }

    fn source_is_auto(&self) -> bool {
        language_utils::is_auto(&self.source_language)
    }

    /// Rule appended for targets that write decimals with a comma
    fn number_format_rule(&self) -> Option<String> {
        if language_utils::uses_decimal_comma(&self.target_language) {
            Some(
                "Number Formatting: Use comma ',' for decimals (e.g. 0.008 -> 0,008). \
                 CRITICAL: Do NOT change dots '.' in serial numbers, section numbers \
                 (e.g. 1.1, 2.1.3), version numbers, or model codes."
                    .to_string(),
            )
        } else {
            None
        }
    }

    fn glossary_rule(&self) -> Option<String> {
        self.glossary
            .as_ref()
            .map(|g| format!("Terminology: Strictly follow these terms:\n{}", g))
    }

    fn glossary_block(&self) -> String {
        match &self.glossary {
            Some(g) => format!("\nTerminology constraints (Must follow):\n{}\n", g),
            None => String::new(),
        }
    }

    fn evaluation_source_clause(&self) -> String {
        if self.source_is_auto() {
            format!(
                "Identify the source language of the 'Original' text (currently indicated as '{}').",
                self.source_language
            )
        } else {
            format!("The source language is {}.", self.source_language)
        }
    }

    fn evaluation_rules(&self) -> String {
        let number_rule = self
            .number_format_rule()
            .unwrap_or_else(|| "Number Formatting: Keep numbers as in the original.".to_string());
        let target = &self.target_language;

        numbered(&[
            "If the translation is identical to the original:\n   \
             - If the source and target languages are the same (or the content is already in the target language), this is CORRECT. Score 10 for Accuracy.\n   \
             - If the content is a universal code, model number, or technical identifier (e.g., 'MTENTU-JKBG-2505'), this is CORRECT. Score 10 for Accuracy.\n   \
             - If the content SHOULD have been translated but wasn't, it is a FAILURE (Untranslated). Score 0 for Accuracy and Completeness."
                .to_string(),
            "Mixed Content: If the translation contains both translated text and original numbers/symbols, evaluate the quality of the translated parts.".to_string(),
            format!("Wrong Language: If the translation is in a language other than {}, score 0 for Accuracy.", target),
            number_rule,
            "Terminology: If terminology is provided, adhere to it strictly. Failure to do so should result in a low Terminology Accuracy score.".to_string(),
        ])
    }
}

/// Format rules as a `1.`-numbered list
fn numbered(rules: &[String]) -> String {
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {}", i + 1, rule))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the prompts sent by each role.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    context: PromptContext,
}

impl PromptBuilder {
    /// Create a builder for a run's context
    pub fn new(context: PromptContext) -> Self {
        Self { context }
    }

    /// Context the prompts are rendered with
    pub fn context(&self) -> &PromptContext {
        &self.context
    }

    /// System prompt for the translation role
    pub fn translation_system(&self) -> String {
        let ctx = &self.context;
        let target = &ctx.target_language;

        let mut rules = vec![
            "Maintain all formatting.".to_string(),
            "Keep any {{MATH_N}} placeholders unchanged. Do NOT add new ones.".to_string(),
            "Return ONLY the translated text. Do NOT include the original text, explanations, or notes.".to_string(),
            format!("If the text is already in {}, return it as is.", target),
            format!(
                "CRITICAL: The target language is {0}. Do NOT translate to English unless {0} is English.",
                target
            ),
            "Do NOT translate or transliterate alphanumeric codes, model numbers, or technical identifiers (e.g. keep \"STR-1650\", \"RS8-500\" as is).".to_string(),
        ];
        rules.extend(ctx.number_format_rule());
        rules.extend(ctx.glossary_rule());

        let source_clause = if ctx.source_is_auto() {
            String::new()
        } else {
            format!(" from {}", ctx.source_language)
        };

        PromptTemplate::new(PromptTemplate::TRANSLATOR).render(&[
            ("source_clause", &source_clause),
            ("target_language", target),
            ("rules", &numbered(&rules)),
        ])
    }

    /// Evaluation prompt for a single candidate
    pub fn evaluation(&self, original: &str, translation: &str) -> String {
        let ctx = &self.context;
        PromptTemplate::new(PromptTemplate::EVALUATOR).render(&[
            ("source_clause", &ctx.evaluation_source_clause()),
            ("target_language", &ctx.target_language),
            ("glossary_block", &ctx.glossary_block()),
            ("evaluation_rules", &ctx.evaluation_rules()),
            ("original", original),
            ("translation", translation),
        ])
    }

    /// Comparative evaluation prompt for the initial and optimized candidates
    pub fn comparative_evaluation(&self, original: &str, initial: &str, optimized: &str) -> String {
        let ctx = &self.context;
        PromptTemplate::new(PromptTemplate::COMPARATIVE_EVALUATOR).render(&[
            ("source_clause", &ctx.evaluation_source_clause()),
            ("target_language", &ctx.target_language),
            ("glossary_block", &ctx.glossary_block()),
            ("evaluation_rules", &ctx.evaluation_rules()),
            ("original", original),
            ("initial", initial),
            ("optimized", optimized),
        ])
    }

    /// System prompt for the optimization role
    pub fn optimization_system(&self) -> String {
        let ctx = &self.context;
        let target = &ctx.target_language;

        let mut rules = vec![
            "Keep any {{MATH_N}} placeholders unchanged.".to_string(),
            "Return ONLY the optimized translation text. Do NOT return explanations or the original text.".to_string(),
            "If no changes are needed, return the Current Translation exactly.".to_string(),
            format!("CRITICAL: Ensure the result is in {}. Do NOT translate to English.", target),
            "Do NOT translate or transliterate alphanumeric codes, model numbers, or technical identifiers.".to_string(),
        ];
        rules.extend(ctx.number_format_rule());
        rules.extend(ctx.glossary_rule());

        PromptTemplate::new(PromptTemplate::OPTIMIZER).render(&[
            ("target_language", target),
            ("rules", &numbered(&rules)),
        ])
    }

    /// User prompt for the optimization role
    pub fn optimization_input(&self, original: &str, translation: &str, suggestions: &str) -> String {
        PromptTemplate::new(PromptTemplate::OPTIMIZER_INPUT).render(&[
            ("original", original),
            ("translation", translation),
            ("suggestions", suggestions),
        ])
    }
}
