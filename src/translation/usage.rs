/*!
 * Token usage accounting per pipeline stage.
 *
 * Every successful model call is metered under the stage that issued it so the
 * usage report can show what translation, both evaluation rounds and
 * optimization cost separately.
 */

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::Stage;
use crate::providers::GenerationResponse;

/// Token counts and request time for one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of prompt tokens
    pub prompt_tokens: u64,

    /// Number of completion tokens
    pub completion_tokens: u64,

    /// Total number of tokens
    pub total_tokens: u64,

    /// Number of successful requests
    pub requests: u64,

    /// Total time spent on API requests, in milliseconds
    pub api_duration_ms: u64,
}

impl TokenUsage {
    /// Add one response's counts
    pub fn add_response(&mut self, response: &GenerationResponse, elapsed: Duration) {
        self.prompt_tokens += response.prompt_tokens;
        self.completion_tokens += response.completion_tokens;
        self.total_tokens += response.prompt_tokens + response.completion_tokens;
        self.requests += 1;
        self.api_duration_ms += elapsed.as_millis() as u64;
    }

    /// Merge another stage's counts into this one
    pub fn merge(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.requests += other.requests;
        self.api_duration_ms += other.api_duration_ms;
    }

    /// Counts recorded after `earlier` was taken
    pub fn since(&self, earlier: &TokenUsage) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens.saturating_sub(earlier.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_sub(earlier.completion_tokens),
            total_tokens: self.total_tokens.saturating_sub(earlier.total_tokens),
            requests: self.requests.saturating_sub(earlier.requests),
            api_duration_ms: self.api_duration_ms.saturating_sub(earlier.api_duration_ms),
        }
    }

    /// Calculate tokens per minute of API time
    pub fn tokens_per_minute(&self) -> f64 {
        let minutes = self.api_duration_ms as f64 / 60_000.0;
        if minutes > 0.0 {
            self.total_tokens as f64 / minutes
        } else {
            0.0
        }
    }
}

/// Usage totals for a run, written as `<name>_usage.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Sum over all stages
    pub total: TokenUsage,

    /// Usage keyed by stage identifier
    pub stages: BTreeMap<String, TokenUsage>,
}

impl UsageReport {
    /// Usage recorded for one stage
    pub fn stage(&self, stage: Stage) -> TokenUsage {
        self.stages.get(stage.key()).copied().unwrap_or_default()
    }

    /// Usage added since an earlier report of the same meter
    pub fn since(&self, earlier: &UsageReport) -> Self {
        let mut report = UsageReport::default();
        for stage in Stage::ALL {
            let usage = self.stage(stage).since(&earlier.stage(stage));
            report.total.merge(&usage);
            report.stages.insert(stage.key().to_string(), usage);
        }
        report
    }

    /// Generate a summary of token usage
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Token Usage Summary:\n\
             Requests: {}\n\
             Prompt tokens: {}\n\
             Completion tokens: {}\n\
             Total tokens: {}\n\
             API request time: {:.2} minutes\n\
             Tokens per minute: {:.2}",
            self.total.requests,
            self.total.prompt_tokens,
            self.total.completion_tokens,
            self.total.total_tokens,
            self.total.api_duration_ms as f64 / 60_000.0,
            self.total.tokens_per_minute()
        )];

        for stage in Stage::ALL {
            let usage = self.stage(stage);
            if usage.requests > 0 {
                lines.push(format!(
                    "  {:<13} {:>4} requests, {:>8} tokens",
                    stage.key(),
                    usage.requests,
                    usage.total_tokens
                ));
            }
        }
        lines.join("\n")
    }
}

/// Shared, thread-safe usage recorder
#[derive(Debug, Clone, Default)]
pub struct UsageMeter {
    stages: Arc<Mutex<HashMap<Stage, TokenUsage>>>,
}

impl UsageMeter {
    /// Create an empty meter
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful call for a stage
    pub fn record(&self, stage: Stage, response: &GenerationResponse, elapsed: Duration) {
        self.stages
            .lock()
            .entry(stage)
            .or_default()
            .add_response(response, elapsed);
    }

    /// Snapshot the recorded usage
    pub fn report(&self) -> UsageReport {
        let stages = self.stages.lock();
        let mut report = UsageReport::default();
        for stage in Stage::ALL {
            let usage = stages.get(&stage).copied().unwrap_or_default();
            report.total.merge(&usage);
            report.stages.insert(stage.key().to_string(), usage);
        }
        report
    }
}
