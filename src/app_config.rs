use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::errors::Stage;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language ("auto", a language name or an ISO code)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language (a language name or an ISO code)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Model bound to each pipeline role
    #[serde(default)]
    pub roles: RoleConfigs,

    /// Worker pool size per model-invoking stage
    #[serde(default)]
    pub concurrency: StageConcurrency,

    /// Thresholds, retry limits and classifier exclusions
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Translation cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Optional terminology file injected into every prompt
    #[serde(default)]
    pub glossary_path: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// The three functional positions in the pipeline
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Translation,
    Evaluation,
    Optimization,
}

impl Role {
    /// All roles in alias order
    pub const ALL: [Role; 3] = [Role::Translation, Role::Evaluation, Role::Optimization];

    /// Reporting alias (A/B/C) used by the external report renderer
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Translation => "A",
            Self::Evaluation => "B",
            Self::Optimization => "C",
        }
    }

    /// Lowercase role name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Evaluation => "evaluation",
            Self::Optimization => "optimization",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Provider kind, used for CLI selection and concurrency profiles
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Azure,
    Anthropic,
    Ollama,
    // OpenAI-compatible local server
    LMStudio,
    Mock,
}

impl ProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Azure => "Azure OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
            Self::LMStudio => "LM Studio",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Azure => "azure".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::Ollama => "ollama".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }

    /// Whether the provider runs on the local machine
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama | Self::LMStudio | Self::Mock)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "azure" => Ok(Self::Azure),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "lmstudio" => Ok(Self::LMStudio),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Model configuration for one role.
///
/// Each provider variant carries exactly the fields it needs; Azure is the only
/// one with an API version and a mandatory endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ModelConfig {
    OpenAI {
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
        #[serde(default = "default_openai_model")]
        model: String,
    },
    Azure {
        #[serde(default)]
        api_key: String,
        endpoint: String,
        #[serde(default = "default_azure_api_version")]
        api_version: String,
        /// Deployment name
        model: String,
    },
    Anthropic {
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_anthropic_endpoint")]
        endpoint: String,
        #[serde(default = "default_anthropic_model")]
        model: String,
    },
    Ollama {
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
    LMStudio {
        #[serde(default = "default_lmstudio_endpoint")]
        endpoint: String,
        #[serde(default = "default_lmstudio_model")]
        model: String,
    },
    Mock,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::for_provider(ProviderKind::default())
    }
}

impl ModelConfig {
    // @param kind: Provider enum
    // @returns: Model config with defaults
    pub fn for_provider(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAI => Self::OpenAI {
                api_key: String::new(),
                endpoint: default_openai_endpoint(),
                model: default_openai_model(),
            },
            ProviderKind::Azure => Self::Azure {
                api_key: String::new(),
                endpoint: String::new(),
                api_version: default_azure_api_version(),
                model: String::new(),
            },
            ProviderKind::Anthropic => Self::Anthropic {
                api_key: String::new(),
                endpoint: default_anthropic_endpoint(),
                model: default_anthropic_model(),
            },
            ProviderKind::Ollama => Self::Ollama {
                endpoint: default_ollama_endpoint(),
                model: default_ollama_model(),
            },
            ProviderKind::LMStudio => Self::LMStudio {
                endpoint: default_lmstudio_endpoint(),
                model: default_lmstudio_model(),
            },
            ProviderKind::Mock => Self::Mock,
        }
    }

    /// Provider kind of this configuration
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAI { .. } => ProviderKind::OpenAI,
            Self::Azure { .. } => ProviderKind::Azure,
            Self::Anthropic { .. } => ProviderKind::Anthropic,
            Self::Ollama { .. } => ProviderKind::Ollama,
            Self::LMStudio { .. } => ProviderKind::LMStudio,
            Self::Mock => ProviderKind::Mock,
        }
    }

    /// Model identifier (deployment name for Azure)
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI { model, .. }
            | Self::Azure { model, .. }
            | Self::Anthropic { model, .. }
            | Self::Ollama { model, .. }
            | Self::LMStudio { model, .. } => model,
            Self::Mock => "mock",
        }
    }

    /// Replace the model identifier
    pub fn set_model(&mut self, new_model: impl Into<String>) {
        match self {
            Self::OpenAI { model, .. }
            | Self::Azure { model, .. }
            | Self::Anthropic { model, .. }
            | Self::Ollama { model, .. }
            | Self::LMStudio { model, .. } => *model = new_model.into(),
            Self::Mock => {}
        }
    }

    /// Endpoint URL, empty for the mock provider
    pub fn endpoint(&self) -> &str {
        match self {
            Self::OpenAI { endpoint, .. }
            | Self::Azure { endpoint, .. }
            | Self::Anthropic { endpoint, .. }
            | Self::Ollama { endpoint, .. }
            | Self::LMStudio { endpoint, .. } => endpoint,
            Self::Mock => "",
        }
    }

    /// API key, falling back to the provider's conventional environment variable
    pub fn api_key(&self) -> String {
        let (configured, env_var) = match self {
            Self::OpenAI { api_key, .. } => (api_key, "OPENAI_API_KEY"),
            Self::Azure { api_key, .. } => (api_key, "AZURE_OPENAI_API_KEY"),
            Self::Anthropic { api_key, .. } => (api_key, "ANTHROPIC_API_KEY"),
            // LM Studio accepts any key
            Self::LMStudio { .. } => return "lm-studio".to_string(),
            Self::Ollama { .. } | Self::Mock => return String::new(),
        };

        if configured.is_empty() {
            std::env::var(env_var).unwrap_or_default()
        } else {
            configured.clone()
        }
    }

    /// Validate the fields required by this provider
    pub fn validate(&self, role: Role) -> Result<()> {
        if let Self::Mock = self {
            return Ok(());
        }

        if self.model().trim().is_empty() {
            return Err(anyhow!("Model identifier is required for the {} role", role));
        }

        let endpoint = self.endpoint();
        if endpoint.trim().is_empty() {
            return Err(anyhow!("Endpoint is required for the {} role", role));
        }
        url::Url::parse(endpoint)
            .with_context(|| format!("Invalid endpoint for the {} role: {}", role, endpoint))?;

        match self {
            Self::OpenAI { .. } | Self::Azure { .. } | Self::Anthropic { .. } => {
                if self.api_key().is_empty() {
                    return Err(anyhow!(
                        "API key is required for the {} role ({} provider)",
                        role,
                        self.kind().display_name()
                    ));
                }
            }
            _ => {}
        }

        if let Self::Azure { api_version, .. } = self {
            if api_version.trim().is_empty() {
                return Err(anyhow!("Azure API version is required for the {} role", role));
            }
        }

        Ok(())
    }
}

/// Model configuration for each role.
///
/// Roles never share a provider implicitly; each is configured on its own.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RoleConfigs {
    #[serde(default)]
    pub translation: ModelConfig,
    #[serde(default)]
    pub evaluation: ModelConfig,
    #[serde(default)]
    pub optimization: ModelConfig,
}

impl RoleConfigs {
    /// Use the same model configuration for every role
    pub fn uniform(config: ModelConfig) -> Self {
        Self {
            translation: config.clone(),
            evaluation: config.clone(),
            optimization: config,
        }
    }

    /// Configuration for a role
    pub fn get(&self, role: Role) -> &ModelConfig {
        match role {
            Role::Translation => &self.translation,
            Role::Evaluation => &self.evaluation,
            Role::Optimization => &self.optimization,
        }
    }

    /// Mutable configuration for a role
    pub fn get_mut(&mut self, role: Role) -> &mut ModelConfig {
        match role {
            Role::Translation => &mut self.translation,
            Role::Evaluation => &mut self.evaluation,
            Role::Optimization => &mut self.optimization,
        }
    }
}

/// Worker pool size for each model-invoking stage.
///
/// Unset values fall back to the provider profile of the role serving the stage.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct StageConcurrency {
    #[serde(default)]
    pub translation: Option<usize>,
    #[serde(default)]
    pub evaluation_1: Option<usize>,
    #[serde(default)]
    pub optimization: Option<usize>,
    #[serde(default)]
    pub evaluation_2: Option<usize>,
}

impl StageConcurrency {
    /// Same pool size for every stage
    pub fn uniform(size: usize) -> Self {
        Self {
            translation: Some(size),
            evaluation_1: Some(size),
            optimization: Some(size),
            evaluation_2: Some(size),
        }
    }

    /// Configured override for a stage
    pub fn get(&self, stage: Stage) -> Option<usize> {
        match stage {
            Stage::Translation => self.translation,
            Stage::Evaluation1 => self.evaluation_1,
            Stage::Optimization => self.optimization,
            Stage::Evaluation2 => self.evaluation_2,
        }
    }
}

/// Pipeline thresholds and retry limits
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Evaluation score at or above which optimization is skipped (0-10 scale)
    #[serde(default = "default_optimization_threshold")]
    pub optimization_threshold: f32,

    /// Extra translation attempts when the model returns the input unchanged
    #[serde(default = "default_repair_retry_limit")]
    pub repair_retry_limit: u32,

    /// Retry count for failed provider requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts when a response cannot be parsed
    #[serde(default = "default_malformed_retry_limit")]
    pub malformed_retry_limit: u32,

    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Additional regexes for segments that never need translation
    #[serde(default)]
    pub exclusion_patterns: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            optimization_threshold: default_optimization_threshold(),
            repair_retry_limit: default_repair_retry_limit(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            malformed_retry_limit: default_malformed_retry_limit(),
            temperature: default_temperature(),
            exclusion_patterns: Vec::new(),
        }
    }
}

/// Translation cache configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    /// Whether the cache is consulted and updated
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Where the cache is persisted between runs
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl CacheConfig {
    /// Persistence path, defaulting to the user cache directory
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            dirs::cache_dir().map(|dir| dir.join("docufluent").join("translation_cache.json"))
        })
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_source_language() -> String {
    "auto".to_string()
}

fn default_target_language() -> String {
    "Chinese".to_string()
}

fn default_optimization_threshold() -> f32 {
    9.5
}

fn default_repair_retry_limit() -> u32 {
    2
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000 // doubled on each retry
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_malformed_retry_limit() -> u32 {
    1
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_azure_api_version() -> String {
    "2023-05-15".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_lmstudio_endpoint() -> String {
    // LM Studio default server (OpenAI compatible) runs on port 1234 under /v1
    "http://localhost:1234/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_lmstudio_model() -> String {
    // Placeholder; users should set to the loaded model name in LM Studio
    "local-model".to_string()
}

impl Config {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.target_language.trim().is_empty() {
            return Err(anyhow!("Target language is required"));
        }
        if crate::language_utils::is_auto(&self.target_language) {
            return Err(anyhow!("Target language cannot be 'auto'"));
        }
        if self.source_language.trim().is_empty() {
            return Err(anyhow!("Source language is required (use 'auto' to detect)"));
        }

        for role in Role::ALL {
            self.roles.get(role).validate(role)?;
        }

        for stage in Stage::ALL {
            if self.concurrency.get(stage) == Some(0) {
                return Err(anyhow!("Concurrency for the {} stage must be at least 1", stage));
            }
        }

        let threshold = self.pipeline.optimization_threshold;
        if !(0.0..=10.0).contains(&threshold) {
            return Err(anyhow!(
                "Optimization threshold must be within 0-10, got {}",
                threshold
            ));
        }

        for pattern in &self.pipeline.exclusion_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid exclusion pattern: {}", pattern))?;
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            roles: RoleConfigs::default(),
            concurrency: StageConcurrency::default(),
            pipeline: PipelineSettings::default(),
            cache: CacheConfig::default(),
            glossary_path: None,
            log_level: LogLevel::default(),
        }
    }
}
