/*!
 * Segment classification.
 *
 * Decides, before any model call, whether a segment carries natural-language
 * content at all. Numbers, punctuation runs, bare placeholders and part/model
 * codes are passed through untranslated.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::PipelineError;
use crate::translation::document::Segment;

/// A segment that is only a protected formula placeholder
static PLACEHOLDER_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{MATH_\d+\}\}$").expect("valid placeholder regex"));

/// Numbers, symbols and punctuation with no letters ("-", "...", "4.1.2", "45%")
static SYMBOLS_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[\d.,%\-+=/()\[\]\s«»"“”'‘’!?;:¿¡*&#@^_~`|\\<>·•°±×÷]+$"#)
        .expect("valid symbol regex")
});

/// Uppercase/digit parts joined by separators ("STR-1650", "RS8-500", "MTENTU-JKBG-2505")
static CODE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9]+(?:[-_/.][A-Z0-9]+)*$").expect("valid code regex")
});

/// Pure, deterministic classifier for segments that need no translation
#[derive(Debug, Clone, Default)]
pub struct SegmentClassifier {
    /// Extra caller-supplied patterns for content that is never translated
    exclusions: Vec<Regex>,
}

impl SegmentClassifier {
    /// Create a classifier with only the built-in rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with additional exclusion patterns
    pub fn with_exclusions(patterns: &[String]) -> Result<Self, regex::Error> {
        let exclusions = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { exclusions })
    }

    /// Classify a segment; `true` means it needs no translation
    pub fn classify(&self, segment: &Segment) -> Result<bool, PipelineError> {
        if let Some(c) = segment
            .text
            .chars()
            .find(|c| c.is_control() && !c.is_whitespace())
        {
            return Err(PipelineError::Classification {
                segment_id: segment.id.clone(),
                reason: format!("contains control character U+{:04X}", c as u32),
            });
        }

        Ok(self.is_simple_text(&segment.text))
    }

    /// Text-level rules shared by `classify`
    pub fn is_simple_text(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return true;
        }
        if PLACEHOLDER_ONLY.is_match(text) || SYMBOLS_ONLY.is_match(text) {
            return true;
        }
        if is_code(text) {
            return true;
        }
        self.exclusions.iter().any(|re| re.is_match(text))
    }
}

/// Whether the text is a code or a list of codes.
///
/// Every token must hold a digit; a word-only token such as "TABLE" or
/// "PANDEMIC" marks a heading or caption that still needs translation.
fn is_code(text: &str) -> bool {
    let mut codes = 0;
    for token in text.split_whitespace() {
        if token.chars().all(|c| matches!(c, '-' | '/' | '|' | ',' | '&' | '+')) {
            continue;
        }
        if !CODE_TOKEN.is_match(token) || !token.chars().any(|c| c.is_ascii_digit()) {
            return false;
        }
        codes += 1;
    }
    codes > 0
}
