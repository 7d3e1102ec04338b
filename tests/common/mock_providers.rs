/*!
 * Scripted providers for pipeline scenarios
 *
 * Builds `MockProvider` handlers that answer each stage with a fixed
 * translation, score or rewrite so tests can drive every pipeline branch
 * without network access.
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docufluent::errors::{ProviderError, Stage};
use docufluent::providers::mock::MockProvider;
use docufluent::providers::{GenerationRequest, GenerationResponse, Provider};
use docufluent::translation::pipeline::CancellationFlag;

/// Evaluation JSON with every dimension at `score`
pub fn evaluation_json(score: f32, suggestions: &str) -> String {
    format!(
        r#"{{"accuracy": {s}, "fluency": {s}, "consistency": {s}, "terminology": {s}, "completeness": {s}, "suggestions": "{suggestions}"}}"#,
        s = score,
        suggestions = suggestions
    )
}

/// Comparative evaluation JSON for the initial (A) and optimized (C) candidates
pub fn comparative_json(initial: f32, optimized: f32) -> String {
    format!(
        r#"```json
{{"model_a": {a}, "model_c": {c}}}
```"#,
        a = evaluation_json(initial, "keep"),
        c = evaluation_json(optimized, "better")
    )
}

/// Fixed answers per stage
#[derive(Debug, Clone)]
pub struct Script {
    pub translation: String,
    pub evaluation: f32,
    pub optimization: String,
    pub comparative: (f32, f32),
}

impl Script {
    /// Translation accepted as is
    pub fn accepted(translation: &str, score: f32) -> Self {
        Self {
            translation: translation.to_string(),
            evaluation: score,
            optimization: translation.to_string(),
            comparative: (score, score),
        }
    }

    /// Translation that gets rewritten and compared
    pub fn optimized(translation: &str, score: f32, rewrite: &str, comparative: (f32, f32)) -> Self {
        Self {
            translation: translation.to_string(),
            evaluation: score,
            optimization: rewrite.to_string(),
            comparative,
        }
    }

    /// Mock provider answering every stage from this script
    pub fn provider(self) -> MockProvider {
        MockProvider::with_handler(move |request| {
            Ok(match request.stage {
                Stage::Translation => self.translation.clone(),
                Stage::Evaluation1 => evaluation_json(self.evaluation, "用词可以更自然"),
                Stage::Optimization => self.optimization.clone(),
                Stage::Evaluation2 => comparative_json(self.comparative.0, self.comparative.1),
            })
        })
    }
}

/// Translator that echoes the source `echoes` times before translating
pub fn echoing_translator(echoes: usize, translation: &str, score: f32) -> MockProvider {
    let seen = Arc::new(AtomicUsize::new(0));
    let translation = translation.to_string();
    MockProvider::with_handler(move |request| {
        Ok(match request.stage {
            Stage::Translation => {
                if seen.fetch_add(1, Ordering::SeqCst) < echoes {
                    request.prompt.clone()
                } else {
                    translation.clone()
                }
            }
            Stage::Evaluation1 => evaluation_json(score, ""),
            Stage::Optimization => translation.clone(),
            Stage::Evaluation2 => comparative_json(score, score),
        })
    })
}

/// Provider whose evaluation answers are never valid JSON
pub fn malformed_evaluator(translation: &str) -> MockProvider {
    let translation = translation.to_string();
    MockProvider::with_handler(move |request| match request.stage {
        Stage::Translation | Stage::Optimization => Ok(translation.clone()),
        _ => Ok("I think this translation is quite good overall.".to_string()),
    })
}

/// Provider that rejects every request with an authentication error
pub fn unauthorized() -> MockProvider {
    MockProvider::with_handler(|_| Err(ProviderError::AuthenticationError("invalid API key".to_string())))
}

/// Translator that raises the cancellation flag while its translation is in flight
pub fn cancelling_translator(cancel: CancellationFlag, translation: &str) -> MockProvider {
    let translation = translation.to_string();
    MockProvider::with_handler(move |request| {
        Ok(match request.stage {
            Stage::Translation => {
                cancel.cancel();
                translation.clone()
            }
            Stage::Evaluation1 => evaluation_json(5.0, ""),
            Stage::Optimization => translation.clone(),
            Stage::Evaluation2 => comparative_json(5.0, 9.0),
        })
    })
}

/// Slow provider that records the peak number of simultaneous calls for one stage
#[derive(Debug, Clone)]
pub struct StageConcurrency {
    inner: MockProvider,
    stage: Stage,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl StageConcurrency {
    pub fn new(stage: Stage, delay_ms: u64) -> Self {
        Self {
            inner: MockProvider::slow(delay_ms),
            stage,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Highest number of overlapping calls seen for the tracked stage
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self, stage: Stage) -> usize {
        self.inner.calls(stage)
    }
}

#[async_trait]
impl Provider for StageConcurrency {
    async fn complete(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        if request.stage != self.stage {
            return self.inner.complete(request).await;
        }
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let response = self.inner.complete(request).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        response
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
