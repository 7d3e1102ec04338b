/*!
 * Protected placeholder handling.
 *
 * Formulas are swapped for `{{MATH_N}}` tokens before a segment reaches the
 * pipeline. Models occasionally invent tokens that were never in the source;
 * those are unwrapped back to their bare number so reassembly does not look
 * for a formula that does not exist.
 */

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static MATH_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{MATH_(\d+)\}\}").expect("valid placeholder regex"));

/// Replace every `{{MATH_N}}` not listed in `known` with `N`
pub fn strip_hallucinated(text: &str, known: &[String]) -> String {
    MATH_PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let token = &caps[0];
            if known.iter().any(|k| k == token) {
                token.to_string()
            } else {
                caps[1].to_string()
            }
        })
        .into_owned()
}

/// All placeholder tokens in `text`, in order of appearance
pub fn find_placeholders(text: &str) -> Vec<String> {
    MATH_PLACEHOLDER
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
