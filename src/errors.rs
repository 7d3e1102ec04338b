/*!
 * Error types for the docufluent pipeline.
 *
 * Provider and pipeline errors are defined with thiserror; the application
 * edges (config loading, controller, CLI) wrap them in anyhow.
 */

use std::fmt;

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not complete within the configured timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl ProviderError {
    /// Whether another attempt could succeed.
    ///
    /// Bad credentials and client-side request errors will fail the same way
    /// again, everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthenticationError(_) => false,
            Self::ApiError { status_code, .. } => {
                *status_code == 408 || *status_code == 429 || *status_code >= 500
            }
            _ => true,
        }
    }

    /// Map an HTTP error status and body to the matching variant
    pub fn from_status(status_code: u16, message: String) -> Self {
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(0)
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// The model-invoking stages of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Translation,
    #[serde(rename = "evaluation_1")]
    Evaluation1,
    Optimization,
    #[serde(rename = "evaluation_2")]
    Evaluation2,
}

impl Stage {
    /// All model-invoking stages in pipeline order
    pub const ALL: [Stage; 4] = [
        Stage::Translation,
        Stage::Evaluation1,
        Stage::Optimization,
        Stage::Evaluation2,
    ];

    /// Identifier used in configuration and usage reports
    pub fn key(&self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Evaluation1 => "evaluation_1",
            Self::Optimization => "optimization",
            Self::Evaluation2 => "evaluation_2",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Errors raised while driving a single segment through the pipeline.
///
/// None of these abort a document run; the orchestrator records them on the
/// segment's outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Segment input could not be classified
    #[error("Malformed segment '{segment_id}': {reason}")]
    Classification {
        /// Offending segment
        segment_id: String,
        /// Why the text was rejected
        reason: String,
    },

    /// Provider call failed after all retries
    #[error("Provider error during {stage}: {source}")]
    Provider {
        /// Stage that issued the call
        stage: Stage,
        /// Last provider error observed
        #[source]
        source: ProviderError,
    },

    /// Response could not be parsed into the expected structure
    #[error("Malformed response during {stage}: {message}")]
    MalformedResponse {
        /// Stage that issued the call
        stage: Stage,
        /// Parse failure description
        message: String,
    },

    /// Translation came back identical to the untranslated input
    #[error("Model returned the input unchanged during {stage}")]
    NoOpTranslation {
        /// Stage that issued the call
        stage: Stage,
        /// The unchanged text
        text: String,
    },

    /// Document-level cancellation was observed
    #[error("Pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Stage the error originated from, if it came from a model call
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Provider { stage, .. }
            | Self::MalformedResponse { stage, .. }
            | Self::NoOpTranslation { stage, .. } => Some(*stage),
            Self::Classification { .. } | Self::Cancelled => None,
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// The segment input could not be decomposed; nothing was translated
    #[error("Document error: {0}")]
    Document(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_providerError_isRetryable_shouldRejectAuthFailures() {
        assert!(!ProviderError::AuthenticationError("bad key".into()).is_retryable());
        assert!(ProviderError::ConnectionError("reset".into()).is_retryable());
        assert!(ProviderError::Timeout(30).is_retryable());
        assert!(ProviderError::RateLimitExceeded("slow down".into()).is_retryable());
    }

    #[test]
    fn test_providerError_isRetryable_shouldDependOnStatus() {
        let server = ProviderError::ApiError { status_code: 503, message: String::new() };
        let client = ProviderError::ApiError { status_code: 400, message: String::new() };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn test_providerError_fromStatus_shouldClassify() {
        assert!(matches!(
            ProviderError::from_status(401, "no".into()),
            ProviderError::AuthenticationError(_)
        ));
        assert!(matches!(
            ProviderError::from_status(429, "no".into()),
            ProviderError::RateLimitExceeded(_)
        ));
        assert!(matches!(
            ProviderError::from_status(500, "no".into()),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }

    #[test]
    fn test_pipelineError_stage_shouldReportOrigin() {
        let err = PipelineError::MalformedResponse {
            stage: Stage::Evaluation1,
            message: "missing fluency".into(),
        };
        assert_eq!(err.stage(), Some(Stage::Evaluation1));
        assert_eq!(PipelineError::Cancelled.stage(), None);
    }

    #[test]
    fn test_stage_key_shouldMatchConfigNames() {
        let keys: Vec<&str> = Stage::ALL.iter().map(|s| s.key()).collect();
        assert_eq!(keys, vec!["translation", "evaluation_1", "optimization", "evaluation_2"]);
    }
}
