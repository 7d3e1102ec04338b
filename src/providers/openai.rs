use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, http_client, GenerationRequest, GenerationResponse, Provider};
use crate::errors::ProviderError;

/// Which flavour of the chat completions API the client talks to
#[derive(Debug, Clone, PartialEq)]
enum Flavour {
    /// api.openai.com or any compatible server using bearer auth
    OpenAI,
    /// Azure deployment addressed by name with an api-version query parameter
    Azure { api_version: String },
    /// LM Studio local server
    LMStudio,
}

/// OpenAI chat completions client, also used for Azure OpenAI and LM Studio
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
    /// Model name, or deployment name for Azure
    model: String,
    flavour: Flavour,
}

/// Chat completions request
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    /// The model to use (ignored by Azure, which routes by deployment)
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,

    /// The messages for the conversation
    messages: Vec<OpenAIMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Chat message format
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize, Default)]
pub struct OpenAIUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// A single completion choice
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
}

/// Chat completions response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

impl OpenAIRequest {
    /// Build the wire request for a generation request
    fn from_generation(model: Option<String>, request: &GenerationRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        });

        Self {
            model,
            messages,
            temperature: request.temperature,
        }
    }
}

impl OpenAI {
    fn build(
        api_key: String,
        endpoint: String,
        model: String,
        flavour: Flavour,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            endpoint,
            model,
            flavour,
        })
    }

    /// Create a client for the OpenAI API or a compatible server
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Self::build(api_key.into(), endpoint.into(), model.into(), Flavour::OpenAI, timeout)
    }

    /// Create a client for an Azure OpenAI deployment
    pub fn azure(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
        deployment: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Self::build(
            api_key.into(),
            endpoint.into(),
            deployment.into(),
            Flavour::Azure {
                api_version: api_version.into(),
            },
            timeout,
        )
    }

    /// Create a client for a local LM Studio server
    pub fn lm_studio(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Self::build(
            "lm-studio".to_string(),
            endpoint.into(),
            model.into(),
            Flavour::LMStudio,
            timeout,
        )
    }

    /// Full URL of the chat completions endpoint
    fn api_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match &self.flavour {
            Flavour::Azure { api_version } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, self.model, api_version
            ),
            Flavour::OpenAI | Flavour::LMStudio => format!("{}/chat/completions", base),
        }
    }

    /// Extract text from a chat completions response
    pub fn extract_text_from_response(response: &OpenAIResponse) -> String {
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

#[async_trait]
impl Provider for OpenAI {
    async fn complete(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let (body, builder) = match &self.flavour {
            Flavour::Azure { .. } => (
                OpenAIRequest::from_generation(None, request),
                self.client.post(self.api_url()).header("api-key", &self.api_key),
            ),
            Flavour::OpenAI | Flavour::LMStudio => (
                OpenAIRequest::from_generation(Some(self.model.clone()), request),
                self.client.post(self.api_url()).bearer_auth(&self.api_key),
            ),
        };

        let response = builder
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = check_status(self.name(), response).await?;

        let parsed = response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("{} response: {}", self.name(), e)))?;

        if parsed.choices.is_empty() {
            return Err(ProviderError::ParseError(format!(
                "{} response contained no choices",
                self.name()
            )));
        }

        let usage = parsed.usage.as_ref();
        Ok(GenerationResponse {
            text: Self::extract_text_from_response(&parsed),
            prompt_tokens: usage.map(|u| u.prompt_tokens).unwrap_or(0),
            completion_tokens: usage.map(|u| u.completion_tokens).unwrap_or(0),
        })
    }

    fn name(&self) -> &str {
        match self.flavour {
            Flavour::OpenAI => "OpenAI",
            Flavour::Azure { .. } => "Azure OpenAI",
            Flavour::LMStudio => "LM Studio",
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
