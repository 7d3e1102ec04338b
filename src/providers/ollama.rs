use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, http_client, GenerationRequest, GenerationResponse, Provider};
use crate::errors::ProviderError;

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    /// Model requests are sent to
    model: String,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant, or tool)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model name to use for generation
    model: String,
    /// Messages of the conversation
    messages: Vec<ChatMessage>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    stream: bool,
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Response message
    pub message: ChatMessage,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl ChatRequest {
    /// Build a non-streaming chat request for a generation request
    fn from_generation(model: &str, request: &GenerationRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        Self {
            model: model.to_string(),
            messages,
            options: request.temperature.map(|temperature| GenerationOptions {
                temperature: Some(temperature),
            }),
            stream: false,
        }
    }
}

impl Ollama {
    /// Create a new Ollama client for the given endpoint
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let endpoint = endpoint.into();

        // Endpoints are accepted with or without a scheme
        let base_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", endpoint.trim_end_matches('/'))
        };

        Ok(Self {
            base_url,
            client: http_client(timeout)?,
            model: model.into(),
        })
    }

    /// Parse a chat response body, tolerating servers that stream despite `stream: false`
    fn parse_chat_body(body: &str) -> Result<ChatResponse, ProviderError> {
        if let Ok(response) = serde_json::from_str::<ChatResponse>(body) {
            return Ok(response);
        }

        // JSONL stream: concatenate message fragments, take counts from the final line
        let mut content = String::new();
        let mut last: Option<ChatResponse> = None;
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<ChatResponse>(line) {
                Ok(chunk) => {
                    content.push_str(&chunk.message.content);
                    last = Some(chunk);
                }
                Err(e) => {
                    error!(
                        "Failed to parse Ollama API response line: {}. Line (first 200 chars): {}",
                        e,
                        line.chars().take(200).collect::<String>()
                    );
                }
            }
        }

        match last {
            Some(mut response) => {
                response.message.content = content;
                Ok(response)
            }
            None => Err(ProviderError::ParseError(
                "Ollama response contained no chat message".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Provider for Ollama {
    async fn complete(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest::from_generation(&self.model, request);

        let response = self.client.post(&url).json(&body).send().await?;
        let response = check_status(self.name(), response).await?;

        let response_text = response.text().await.map_err(|e| {
            ProviderError::ParseError(format!("Failed to get response text from Ollama API: {}", e))
        })?;
        let parsed = Self::parse_chat_body(&response_text)?;

        Ok(GenerationResponse {
            text: parsed.message.content.trim().to_string(),
            prompt_tokens: parsed.prompt_eval_count.unwrap_or(0),
            completion_tokens: parsed.eval_count.unwrap_or(0),
        })
    }

    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
