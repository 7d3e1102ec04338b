/*!
 * Evaluation results and response parsing.
 *
 * Evaluators answer with JSON, often wrapped in a markdown code fence and
 * sometimes surrounded by prose. All five dimensions must be present and on
 * the 0-10 scale; anything else is a malformed response.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::translation::pipeline::state::CandidateRole;

/// Lowest score on the evaluation scale
pub const MIN_SCORE: f32 = 0.0;

/// Highest score on the evaluation scale
pub const MAX_SCORE: f32 = 10.0;

/// Scored assessment of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f32,
    pub fluency: f32,
    pub consistency: f32,
    pub terminology: f32,
    pub completeness: f32,

    /// Free-text improvement suggestions
    #[serde(default)]
    pub suggestions: String,

    /// Candidate this evaluation scores
    pub candidate: CandidateRole,
}

impl Evaluation {
    /// Evaluation with every dimension at the top of the scale
    pub fn perfect(candidate: CandidateRole) -> Self {
        Self {
            accuracy: MAX_SCORE,
            fluency: MAX_SCORE,
            consistency: MAX_SCORE,
            terminology: MAX_SCORE,
            completeness: MAX_SCORE,
            suggestions: String::new(),
            candidate,
        }
    }

    /// Representative score: arithmetic mean of the five dimensions
    pub fn score(&self) -> f32 {
        (self.accuracy + self.fluency + self.consistency + self.terminology + self.completeness) / 5.0
    }
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    for opener in ["```json", "```markdownjson", "```"] {
        if let Some(start) = text.find(opener) {
            let rest = &text[start + opener.len()..];
            let body = match rest.find("```") {
                Some(end) => &rest[..end],
                None => rest,
            };
            return body.trim();
        }
    }
    text
}

/// Parse the JSON object in a model response
fn parse_object(text: &str) -> Result<Value, String> {
    let body = strip_code_fence(text);
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }

    // Prose around the object: fall back to the outermost braces
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end])
            .map_err(|e| format!("invalid JSON: {}", e)),
        _ => Err("no JSON object in response".to_string()),
    }
}

fn score_field(object: &Value, name: &str) -> Result<f32, String> {
    let value = object
        .get(name)
        .ok_or_else(|| format!("missing dimension '{}'", name))?;

    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("dimension '{}' is not a number: {}", name, value))? as f32;

    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(format!("dimension '{}' out of range: {}", name, score));
    }
    Ok(score)
}

fn evaluation_from_value(object: &Value, candidate: CandidateRole) -> Result<Evaluation, String> {
    if !object.is_object() {
        return Err(format!("expected an object for {} evaluation", candidate));
    }

    let suggestions = match object.get("suggestions") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Ok(Evaluation {
        accuracy: score_field(object, "accuracy")?,
        fluency: score_field(object, "fluency")?,
        consistency: score_field(object, "consistency")?,
        terminology: score_field(object, "terminology")?,
        completeness: score_field(object, "completeness")?,
        suggestions,
        candidate,
    })
}

/// Parse a single-candidate evaluation response
pub fn parse_evaluation(text: &str, candidate: CandidateRole) -> Result<Evaluation, String> {
    let value = parse_object(text)?;
    evaluation_from_value(&value, candidate)
}

/// Parse a comparative response into (initial, optimized) evaluations
pub fn parse_comparative(text: &str) -> Result<(Evaluation, Evaluation), String> {
    let value = parse_object(text)?;
    let initial = value
        .get("model_a")
        .ok_or_else(|| "missing 'model_a' evaluation".to_string())?;
    let optimized = value
        .get("model_c")
        .ok_or_else(|| "missing 'model_c' evaluation".to_string())?;

    Ok((
        evaluation_from_value(initial, CandidateRole::Initial)?,
        evaluation_from_value(optimized, CandidateRole::Optimized)?,
    ))
}
