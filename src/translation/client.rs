/*!
 * Role-bound model clients.
 *
 * A `RoleClient` binds one pipeline role to its own provider and wraps every
 * call with a timeout, bounded retries with exponential backoff, and usage
 * metering. `ModelClients` holds the three roles and turns raw completions
 * into translations, evaluations and optimizations:
 *
 * - translations and optimizations that echo the source text are rejected
 * - evaluation responses that cannot be parsed are re-requested a bounded
 *   number of times
 * - hallucinated `{{MATH_N}}` placeholders are unwrapped
 */

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::{Config, PipelineSettings, Role};
use crate::errors::{PipelineError, ProviderError, Stage};
use crate::providers::{create_provider, GenerationRequest, Provider};
use crate::translation::document::Segment;
use crate::translation::evaluation::{parse_comparative, parse_evaluation, Evaluation};
use crate::translation::pipeline::state::CandidateRole;
use crate::translation::placeholders::strip_hallucinated;
use crate::translation::prompts::PromptBuilder;
use crate::translation::usage::UsageMeter;

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy; delays double from `base_delay` up to 30 seconds
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Policy from pipeline settings
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.retry_count, Duration::from_millis(settings.retry_backoff_ms))
    }

    /// Set the maximum delay between retries
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `retry` (1-based), with up to 10% jitter
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(retry - 1);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_ms = (delay.as_millis() as u64) / 10;
        let jitter = if jitter_ms > 0 {
            rand::rng().random_range(0..=jitter_ms)
        } else {
            0
        };
        delay + Duration::from_millis(jitter)
    }
}

/// One pipeline role bound to its provider
#[derive(Debug, Clone)]
pub struct RoleClient {
    role: Role,
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
    timeout: Duration,
    temperature: f32,
    usage: UsageMeter,
}

impl RoleClient {
    /// Bind a provider to a role
    pub fn new(
        role: Role,
        provider: Arc<dyn Provider>,
        settings: &PipelineSettings,
        usage: UsageMeter,
    ) -> Self {
        Self {
            role,
            provider,
            retry: RetryPolicy::from_settings(settings),
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
            temperature: settings.temperature,
            usage,
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Role this client serves
    pub fn role(&self) -> Role {
        self.role
    }

    /// Provider display name
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Model identifier
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Single call with timeout; empty output counts as a parse failure
    async fn attempt(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let start = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))??;

        if response.text.trim().is_empty() {
            return Err(ProviderError::ParseError(format!(
                "{} returned an empty response",
                self.provider.name()
            )));
        }

        self.usage.record(request.stage, &response, start.elapsed());
        Ok(response.text)
    }

    /// Complete a request, retrying transient provider failures
    pub async fn generate(&self, request: GenerationRequest) -> Result<String, PipelineError> {
        let request = request.temperature(self.temperature);
        let stage = request.stage;
        let mut retry = 0;

        loop {
            match self.attempt(&request).await {
                Ok(text) => {
                    if retry > 0 {
                        debug!("{}: succeeded on retry {}", stage, retry);
                    }
                    return Ok(text);
                }
                Err(error) => {
                    if !error.is_retryable() || retry >= self.retry.max_retries {
                        warn!(
                            "{} ({} {}): giving up after {} attempt(s): {}",
                            stage,
                            self.provider.name(),
                            self.provider.model(),
                            retry + 1,
                            error
                        );
                        return Err(PipelineError::Provider { stage, source: error });
                    }

                    retry += 1;
                    let delay = self.retry.delay_for_retry(retry);
                    warn!(
                        "{}: attempt {} failed ({}), retrying in {:?}",
                        stage, retry, error, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Alias-to-model mapping entry, written as `<name>_model_mapping.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMappingEntry {
    /// Reporting alias (A/B/C)
    pub alias: String,
    /// Role name
    pub role: Role,
    /// Provider display name
    pub provider: String,
    /// Model identifier
    pub model: String,
}

/// The three role clients of a run
#[derive(Debug, Clone)]
pub struct ModelClients {
    translation: RoleClient,
    evaluation: RoleClient,
    optimization: RoleClient,
    malformed_retry_limit: u32,
    usage: UsageMeter,
}

impl ModelClients {
    /// Build one provider per role from configuration
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(config.pipeline.timeout_secs.max(1));
        let translation = create_provider(config.roles.get(Role::Translation), timeout)?;
        let evaluation = create_provider(config.roles.get(Role::Evaluation), timeout)?;
        let optimization = create_provider(config.roles.get(Role::Optimization), timeout)?;
        Ok(Self::from_providers(translation, evaluation, optimization, &config.pipeline))
    }

    /// Bind already constructed providers to the roles
    pub fn from_providers(
        translation: Arc<dyn Provider>,
        evaluation: Arc<dyn Provider>,
        optimization: Arc<dyn Provider>,
        settings: &PipelineSettings,
    ) -> Self {
        let usage = UsageMeter::new();
        Self {
            translation: RoleClient::new(Role::Translation, translation, settings, usage.clone()),
            evaluation: RoleClient::new(Role::Evaluation, evaluation, settings, usage.clone()),
            optimization: RoleClient::new(Role::Optimization, optimization, settings, usage.clone()),
            malformed_retry_limit: settings.malformed_retry_limit,
            usage,
        }
    }

    /// Apply the same retry policy to every role
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.translation = self.translation.with_retry(retry.clone());
        self.evaluation = self.evaluation.with_retry(retry.clone());
        self.optimization = self.optimization.with_retry(retry);
        self
    }

    /// Client for a role
    pub fn client(&self, role: Role) -> &RoleClient {
        match role {
            Role::Translation => &self.translation,
            Role::Evaluation => &self.evaluation,
            Role::Optimization => &self.optimization,
        }
    }

    /// Usage meter shared by all roles
    pub fn usage(&self) -> &UsageMeter {
        &self.usage
    }

    /// Alias table for reporting
    pub fn model_mapping(&self) -> Vec<ModelMappingEntry> {
        Role::ALL
            .iter()
            .map(|role| {
                let client = self.client(*role);
                ModelMappingEntry {
                    alias: role.alias().to_string(),
                    role: *role,
                    provider: client.provider_name().to_string(),
                    model: client.model().to_string(),
                }
            })
            .collect()
    }

    /// Translate a segment
    pub async fn translate(&self, segment: &Segment, prompts: &PromptBuilder) -> Result<String, PipelineError> {
        let request = GenerationRequest::new(Stage::Translation, segment.text.clone())
            .system(prompts.translation_system());
        let text = self.translation.generate(request).await?;
        self.accept_output(Stage::Translation, segment, &text, prompts)
    }

    /// Evaluate one candidate of a segment
    pub async fn evaluate(
        &self,
        segment: &Segment,
        candidate_text: &str,
        prompts: &PromptBuilder,
    ) -> Result<Evaluation, PipelineError> {
        if prompts.context().is_same_language() {
            debug!("Segment {}: same source and target language, evaluation bypassed", segment.id);
            return Ok(Evaluation::perfect(CandidateRole::Initial));
        }

        let prompt = prompts.evaluation(&segment.text, candidate_text);
        self.with_malformed_retry(Stage::Evaluation1, &prompt, |text| {
            parse_evaluation(text, CandidateRole::Initial)
        })
        .await
    }

    /// Score the initial and optimized candidates in one call
    pub async fn evaluate_comparative(
        &self,
        segment: &Segment,
        initial: &str,
        optimized: &str,
        prompts: &PromptBuilder,
    ) -> Result<(Evaluation, Evaluation), PipelineError> {
        let prompt = prompts.comparative_evaluation(&segment.text, initial, optimized);
        self.with_malformed_retry(Stage::Evaluation2, &prompt, parse_comparative)
            .await
    }

    /// Improve the initial candidate using the evaluator's suggestions
    pub async fn optimize(
        &self,
        segment: &Segment,
        initial: &str,
        suggestions: &str,
        prompts: &PromptBuilder,
    ) -> Result<String, PipelineError> {
        let request = GenerationRequest::new(
            Stage::Optimization,
            prompts.optimization_input(&segment.text, initial, suggestions),
        )
        .system(prompts.optimization_system());
        let text = self.optimization.generate(request).await?;
        self.accept_output(Stage::Optimization, segment, &text, prompts)
    }

    /// Clean a translation/optimization output and reject unchanged echoes
    fn accept_output(
        &self,
        stage: Stage,
        segment: &Segment,
        text: &str,
        prompts: &PromptBuilder,
    ) -> Result<String, PipelineError> {
        let text = strip_hallucinated(text.trim(), &segment.placeholders);
        if !prompts.context().is_same_language() && text.trim() == segment.text.trim() {
            return Err(PipelineError::NoOpTranslation { stage, text });
        }
        Ok(text)
    }

    /// Call the evaluation role, re-requesting unparseable responses
    async fn with_malformed_retry<T, F>(
        &self,
        stage: Stage,
        prompt: &str,
        parse: F,
    ) -> Result<T, PipelineError>
    where
        F: Fn(&str) -> Result<T, String>,
    {
        let mut last_error = String::new();
        for attempt in 0..=self.malformed_retry_limit {
            let request = GenerationRequest::new(stage, prompt);
            let text = self.evaluation.generate(request).await?;
            match parse(&text) {
                Ok(parsed) => return Ok(parsed),
                Err(message) => {
                    warn!(
                        "{}: malformed evaluation (attempt {}/{}): {}",
                        stage,
                        attempt + 1,
                        self.malformed_retry_limit + 1,
                        message
                    );
                    last_error = message;
                }
            }
        }

        Err(PipelineError::MalformedResponse {
            stage,
            message: last_error,
        })
    }
}
