/*!
 * Provider-specific concurrency tuning and per-stage worker pools.
 *
 * Each model-invoking stage gets its own semaphore. Unless configured
 * explicitly, a stage's pool size comes from the profile of the provider
 * serving the role behind that stage.
 */

use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::app_config::{Config, ProviderKind, Role};
use crate::errors::{PipelineError, Stage};

/// Provider-specific concurrency profile with tuned defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    /// Maximum concurrent requests
    pub max_concurrent_requests: usize,
    /// Target requests per minute, informational for hosted APIs
    pub target_rpm: Option<u32>,
}

impl ProviderProfile {
    /// Get the profile for a given provider
    pub fn for_provider(provider: ProviderKind) -> Self {
        match provider {
            ProviderKind::Ollama => Self {
                // Single local model server
                max_concurrent_requests: 8,
                target_rpm: None,
            },
            ProviderKind::LMStudio => Self {
                max_concurrent_requests: 6,
                target_rpm: None,
            },
            ProviderKind::OpenAI | ProviderKind::Azure => Self {
                max_concurrent_requests: 32,
                target_rpm: Some(500),
            },
            ProviderKind::Anthropic => Self {
                max_concurrent_requests: 16,
                target_rpm: Some(50),
            },
            ProviderKind::Mock => Self {
                max_concurrent_requests: 32,
                target_rpm: None,
            },
        }
    }

    /// Get effective concurrent requests, respecting any user override
    pub fn effective_concurrent_requests(&self, user_override: Option<usize>) -> usize {
        user_override.unwrap_or(self.max_concurrent_requests).max(1)
    }
}

/// Role whose model serves a stage
pub fn role_for_stage(stage: Stage) -> Role {
    match stage {
        Stage::Translation => Role::Translation,
        Stage::Evaluation1 | Stage::Evaluation2 => Role::Evaluation,
        Stage::Optimization => Role::Optimization,
    }
}

/// One bounded pool per model-invoking stage
#[derive(Debug, Clone)]
pub struct StagePools {
    translation: Arc<Semaphore>,
    evaluation_1: Arc<Semaphore>,
    optimization: Arc<Semaphore>,
    evaluation_2: Arc<Semaphore>,
    sizes: [usize; 4],
}

impl StagePools {
    /// Build pools with explicit sizes (translation, evaluation_1, optimization, evaluation_2)
    pub fn new(sizes: [usize; 4]) -> Self {
        let sizes = sizes.map(|s| s.max(1));
        Self {
            translation: Arc::new(Semaphore::new(sizes[0])),
            evaluation_1: Arc::new(Semaphore::new(sizes[1])),
            optimization: Arc::new(Semaphore::new(sizes[2])),
            evaluation_2: Arc::new(Semaphore::new(sizes[3])),
            sizes,
        }
    }

    /// Same size for every stage
    pub fn uniform(size: usize) -> Self {
        Self::new([size; 4])
    }

    /// Pool sizes from configuration, falling back to provider profiles
    pub fn from_config(config: &Config) -> Self {
        let size = |stage: Stage| {
            let kind = config.roles.get(role_for_stage(stage)).kind();
            ProviderProfile::for_provider(kind)
                .effective_concurrent_requests(config.concurrency.get(stage))
        };
        Self::new(Stage::ALL.map(size))
    }

    fn semaphore(&self, stage: Stage) -> &Semaphore {
        match stage {
            Stage::Translation => &self.translation,
            Stage::Evaluation1 => &self.evaluation_1,
            Stage::Optimization => &self.optimization,
            Stage::Evaluation2 => &self.evaluation_2,
        }
    }

    /// Wait for a slot in a stage's pool
    pub async fn acquire(&self, stage: Stage) -> Result<SemaphorePermit<'_>, PipelineError> {
        self.semaphore(stage)
            .acquire()
            .await
            .map_err(|_| PipelineError::Cancelled)
    }

    /// Configured size of a stage's pool
    pub fn size(&self, stage: Stage) -> usize {
        self.sizes[Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0)]
    }

    /// Upper bound on segments worth keeping in flight at once
    pub fn total_capacity(&self) -> usize {
        self.sizes.iter().sum()
    }

    /// Free slots in a stage's pool
    pub fn available(&self, stage: Stage) -> usize {
        self.semaphore(stage).available_permits()
    }
}
