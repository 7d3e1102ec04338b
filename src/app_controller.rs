use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::errors::Stage;
use crate::translation::cache::TranslationCache;
use crate::translation::client::ModelClients;
use crate::translation::concurrency::StagePools;
use crate::translation::document::SegmentDocument;
use crate::translation::pipeline::{
    CancellationFlag, PipelineConfig, PipelineReport, PipelineSession, ProgressEvent,
    TranslationPipeline,
};

// @module: Application controller for document translation

/// Paths of the files written for one document
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFiles {
    pub results: PathBuf,
    pub usage: PathBuf,
    pub model_mapping: PathBuf,
}

impl OutputFiles {
    /// Output paths for a document name inside a directory
    pub fn for_document(output_dir: &Path, name: &str) -> Self {
        Self {
            results: output_dir.join(format!("{}_results.json", name)),
            usage: output_dir.join(format!("{}_usage.json", name)),
            model_mapping: output_dir.join(format!("{}_model_mapping.json", name)),
        }
    }

    /// Whether a previous run already produced results
    pub fn exist(&self) -> bool {
        self.results.exists()
    }
}

/// Progress bars for segments and each model-invoking stage
struct StageProgress {
    segments: ProgressBar,
    stages: Vec<(Stage, ProgressBar)>,
}

impl StageProgress {
    fn new(multi_progress: &MultiProgress, total: usize) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({percent}%) {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        let counter_style = ProgressStyle::default_spinner()
            .template("  {spinner:.blue} {msg:<14} {pos} calls")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let segments = multi_progress.add(ProgressBar::new(total as u64));
        segments.set_style(style);
        segments.set_message("segments");

        let stages = Stage::ALL
            .into_iter()
            .map(|stage| {
                let bar = multi_progress.add(ProgressBar::new_spinner());
                bar.set_style(counter_style.clone());
                bar.set_message(stage.key());
                (stage, bar)
            })
            .collect();

        Self { segments, stages }
    }

    fn update(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageCompleted { stage, .. } => {
                if let Some((_, bar)) = self.stages.iter().find(|(s, _)| s == stage) {
                    bar.inc(1);
                }
            }
            ProgressEvent::SegmentFinished { completed, .. } => {
                self.segments.set_position(*completed as u64);
            }
        }
    }

    fn finish(&self) {
        for (_, bar) in &self.stages {
            bar.finish_and_clear();
        }
        self.segments.finish_and_clear();
    }
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self { config })
    }

    /// Configuration used by this controller
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate one segment file and write the result files next to it
    pub async fn run(
        &self,
        input_file: PathBuf,
        output_dir: PathBuf,
        force_overwrite: bool,
        cancel: CancellationFlag,
    ) -> Result<Option<PipelineReport>> {
        if !input_file.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        // A bad segment file is fatal before any model call
        let document = SegmentDocument::load(&input_file)?;
        let outputs = OutputFiles::for_document(&output_dir, &document.name);
        if outputs.exist() && !force_overwrite {
            warn!("Skipping file, results already exist (use -f to force overwrite)");
            return Ok(None);
        }

        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

        let report = self.translate_document(&document, cancel).await?;
        self.write_outputs(&report, &outputs)?;

        info!("Success: {}", outputs.results.display());
        Ok(Some(report))
    }

    /// Run the pipeline over a document with progress bars and the persistent cache
    pub async fn translate_document(
        &self,
        document: &SegmentDocument,
        cancel: CancellationFlag,
    ) -> Result<PipelineReport> {
        let glossary = self.load_glossary()?;
        let cache = self.load_cache();
        let session = PipelineSession::new(cache);

        let clients = ModelClients::from_config(&self.config).context("Failed to create model clients")?;
        for entry in clients.model_mapping() {
            info!("Model {} ({}): {} - {}", entry.alias, entry.role, entry.provider, entry.model);
        }

        let mut pipeline_config = PipelineConfig::from_config(&self.config);
        if let Some(glossary) = glossary {
            pipeline_config = pipeline_config.with_glossary(glossary);
        }

        let multi_progress = MultiProgress::new();
        let progress = Arc::new(StageProgress::new(&multi_progress, document.len()));
        let callback_progress = Arc::clone(&progress);

        let pipeline = TranslationPipeline::new(pipeline_config, clients, StagePools::from_config(&self.config))?
            .with_progress(Arc::new(move |event: &ProgressEvent| callback_progress.update(event)));

        info!("Translating {} segments, please wait…", document.len());
        let report = pipeline.run(document, &session, &cancel).await;
        progress.finish();

        if report.summary.cancelled > 0 {
            warn!("Run cancelled; {} segments kept their best available text", report.summary.cancelled);
        }
        if report.summary.failed > 0 {
            warn!("{} segments were flagged as failed", report.summary.failed);
        }
        info!("{}", report.usage.summary());
        info!(
            "Translation completed in {}.",
            Self::format_duration(Duration::from_millis(report.duration_ms))
        );

        self.save_cache(session.cache());
        Ok(report)
    }

    fn load_glossary(&self) -> Result<Option<String>> {
        match &self.config.glossary_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read glossary: {}", path.display()))?;
                debug!("Loaded glossary from {}", path.display());
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    fn load_cache(&self) -> TranslationCache {
        let enabled = self.config.cache.enabled;
        match self.config.cache.resolved_path() {
            Some(path) if enabled => TranslationCache::load(&path, enabled).unwrap_or_else(|e| {
                warn!("Ignoring unreadable translation cache: {:#}", e);
                TranslationCache::new(enabled)
            }),
            _ => TranslationCache::new(enabled),
        }
    }

    fn save_cache(&self, cache: &TranslationCache) {
        if !cache.is_enabled() {
            return;
        }
        if let Some(path) = self.config.cache.resolved_path() {
            if let Err(e) = cache.save(&path) {
                warn!("Failed to save translation cache: {:#}", e);
            }
        }
    }

    /// Write results, usage and model mapping files
    pub fn write_outputs(&self, report: &PipelineReport, outputs: &OutputFiles) -> Result<()> {
        Self::write_json(&outputs.results, &report.outcomes)?;
        Self::write_json(&outputs.usage, &report.usage)?;
        Self::write_json(&outputs.model_mapping, &report.model_mapping)?;
        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write output file: {}", path.display()))?;
        Ok(())
    }

    // Format duration in a human-readable format (HH:MM:SS)
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatDuration_shouldPickLargestUnit() {
        assert_eq!(Controller::format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(Controller::format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(Controller::format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_outputFiles_shouldUseDocumentName() {
        let outputs = OutputFiles::for_document(Path::new("/out"), "report");
        assert_eq!(outputs.results, PathBuf::from("/out/report_results.json"));
        assert_eq!(outputs.usage, PathBuf::from("/out/report_usage.json"));
        assert_eq!(outputs.model_mapping, PathBuf::from("/out/report_model_mapping.json"));
    }
}
