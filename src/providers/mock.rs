/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds with stage-appropriate text
 * - `MockProvider::intermittent(n)` - Fails every nth request
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::with_handler(..)` - Scripted responses per request
 *
 * Every request is recorded so tests can assert how often each stage called out.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::{ProviderError, Stage};
use crate::providers::{GenerationRequest, GenerationResponse, Provider};

/// Scripted response generator
pub type ResponseHandler =
    Arc<dyn Fn(&GenerationRequest) -> Result<String, ProviderError> + Send + Sync>;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing pipeline behavior
#[derive(Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    /// Custom response generator (optional)
    handler: Option<ResponseHandler>,
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("behavior", &self.behavior)
            .field("request_count", &self.request_count.load(Ordering::SeqCst))
            .field("scripted", &self.handler.is_some())
            .finish()
    }
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            handler: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that delays every response
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Create a working mock whose responses come from a handler
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        let mut provider = Self::working();
        provider.handler = Some(Arc::new(handler));
        provider
    }

    /// Total number of requests received
    pub fn total_calls(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of requests received for one stage
    pub fn calls(&self, stage: Stage) -> usize {
        self.requests.lock().iter().filter(|r| r.stage == stage).count()
    }

    /// Request counts keyed by stage
    pub fn calls_by_stage(&self) -> HashMap<Stage, usize> {
        let mut counts = HashMap::new();
        for request in self.requests.lock().iter() {
            *counts.entry(request.stage).or_insert(0) += 1;
        }
        counts
    }

    /// Copy of every request received
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Default stage-appropriate response
    fn default_response(request: &GenerationRequest) -> String {
        match request.stage {
            Stage::Translation => format!("[TRANSLATED] {}", request.prompt),
            Stage::Evaluation1 => r#"{"accuracy": 8, "fluency": 9, "consistency": 8, "terminology": 8, "completeness": 9, "suggestions": "不错，但可以更流畅。"}"#.to_string(),
            Stage::Optimization => "Optimized Mock Translation".to_string(),
            Stage::Evaluation2 => r#"{
                "model_a": {"accuracy": 8, "fluency": 8, "consistency": 8, "terminology": 8, "completeness": 8, "suggestions": "Model A suggestion"},
                "model_c": {"accuracy": 9, "fluency": 9, "consistency": 9, "terminology": 9, "completeness": 9, "suggestions": "Model C suggestion"}
            }"#.to_string(),
        }
    }

    fn respond(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        match &self.handler {
            Some(handler) => handler(request),
            None => Ok(Self::default_response(request)),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let text = match self.behavior {
            MockBehavior::Working => self.respond(request)?,

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    return Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    });
                }
                self.respond(request)?
            }

            MockBehavior::Failing => {
                return Err(ProviderError::ApiError {
                    message: "Simulated provider failure".to_string(),
                    status_code: 500,
                });
            }

            MockBehavior::Empty => String::new(),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                self.respond(request)?
            }
        };

        Ok(GenerationResponse {
            prompt_tokens: request.prompt.chars().count() as u64,
            completion_tokens: text.chars().count() as u64,
            text,
        })
    }

    fn name(&self) -> &str {
        "Mock"
    }

    fn model(&self) -> &str {
        "mock"
    }
}
