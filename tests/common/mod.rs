/*!
 * Common test utilities for the docufluent test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use docufluent::app_config::PipelineSettings;
use docufluent::providers::Provider;
use docufluent::providers::mock::MockProvider;
use docufluent::translation::client::ModelClients;
use docufluent::translation::concurrency::StagePools;
use docufluent::translation::pipeline::{PipelineConfig, TranslationPipeline};

// Re-export the scripted providers module
pub mod mock_providers;

/// Route library logs to the test harness; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Settings without backoff delays
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        retry_count: 1,
        retry_backoff_ms: 0,
        timeout_secs: 5,
        ..PipelineSettings::default()
    }
}

/// English to Chinese pipeline with one provider for every role
pub fn pipeline_with(provider: &MockProvider) -> TranslationPipeline {
    pipeline_with_config(provider, PipelineConfig::new("English", "Chinese"))
}

/// Pipeline with one provider for every role and a custom configuration
pub fn pipeline_with_config(provider: &MockProvider, config: PipelineConfig) -> TranslationPipeline {
    init_logging();
    let p: Arc<dyn Provider> = Arc::new(provider.clone());
    let clients = ModelClients::from_providers(p.clone(), p.clone(), p, &fast_settings());
    TranslationPipeline::new(config, clients, StagePools::uniform(4))
        .expect("valid pipeline configuration")
}

/// Pipeline with a distinct provider per role
pub fn pipeline_with_roles(
    translation: &MockProvider,
    evaluation: &MockProvider,
    optimization: &MockProvider,
) -> TranslationPipeline {
    let clients = ModelClients::from_providers(
        Arc::new(translation.clone()),
        Arc::new(evaluation.clone()),
        Arc::new(optimization.clone()),
        &fast_settings(),
    );
    TranslationPipeline::new(PipelineConfig::new("English", "Chinese"), clients, StagePools::uniform(4))
        .expect("valid pipeline configuration")
}
