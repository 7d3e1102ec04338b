/*!
 * Provider implementations for the model roles.
 *
 * This module contains client implementations for various LLM providers:
 * - OpenAI: OpenAI API, Azure OpenAI deployments and LM Studio (OpenAI-compatible)
 * - Anthropic: Anthropic Messages API
 * - Ollama: Local LLM server
 * - Mock: Scripted provider for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::ModelConfig;
use crate::errors::{ProviderError, Stage};

/// A single prompt sent to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Stage issuing the request, used for logging and by the mock provider
    pub stage: Stage,
    /// Optional system prompt
    pub system_prompt: Option<String>,
    /// User prompt
    pub prompt: String,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Create a request without a system prompt
    pub fn new(stage: Stage, prompt: impl Into<String>) -> Self {
        Self {
            stage,
            system_prompt: None,
            prompt: prompt.into(),
            temperature: None,
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text and token usage returned by a provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResponse {
    /// Generated text, trimmed
    pub text: String,
    /// Prompt tokens reported by the provider
    pub prompt_tokens: u64,
    /// Completion tokens reported by the provider
    pub completion_tokens: u64,
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be bound interchangeably to any pipeline role.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<GenerationResponse, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError>;

    /// Provider name for logs and the model mapping report
    fn name(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;
}

/// Build the provider described by a role's model configuration
pub fn create_provider(
    config: &ModelConfig,
    timeout: Duration,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider: Arc<dyn Provider> = match config {
        ModelConfig::OpenAI { endpoint, model, .. } => Arc::new(openai::OpenAI::new(
            config.api_key(),
            endpoint.clone(),
            model.clone(),
            timeout,
        )?),
        ModelConfig::Azure {
            endpoint,
            api_version,
            model,
            ..
        } => Arc::new(openai::OpenAI::azure(
            config.api_key(),
            endpoint.clone(),
            api_version.clone(),
            model.clone(),
            timeout,
        )?),
        ModelConfig::LMStudio { endpoint, model } => Arc::new(openai::OpenAI::lm_studio(
            endpoint.clone(),
            model.clone(),
            timeout,
        )?),
        ModelConfig::Anthropic { endpoint, model, .. } => Arc::new(anthropic::Anthropic::new(
            config.api_key(),
            endpoint.clone(),
            model.clone(),
            timeout,
        )?),
        ModelConfig::Ollama { endpoint, model } => Arc::new(ollama::Ollama::new(
            endpoint.clone(),
            model.clone(),
            timeout,
        )?),
        ModelConfig::Mock => Arc::new(mock::MockProvider::working()),
    };

    Ok(provider)
}

/// Shared HTTP client construction for the remote providers
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| ProviderError::ConnectionError(format!("Failed to build HTTP client: {}", e)))
}

/// Read an error body and turn a non-success status into a provider error
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    log::error!("{} API error ({}): {}", provider, status, error_text);
    Err(ProviderError::from_status(status.as_u16(), error_text))
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
