// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use docufluent::app_config::{self, Config, ModelConfig, ProviderKind, Role};
use docufluent::app_controller::Controller;
use docufluent::translation::CancellationFlag;

/// CLI Wrapper for ProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    Ollama,
    OpenAI,
    Azure,
    Anthropic,
    LMStudio,
    Mock,
}

impl From<CliProvider> for ProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::Ollama => ProviderKind::Ollama,
            CliProvider::OpenAI => ProviderKind::OpenAI,
            CliProvider::Azure => ProviderKind::Azure,
            CliProvider::Anthropic => ProviderKind::Anthropic,
            CliProvider::LMStudio => ProviderKind::LMStudio,
            CliProvider::Mock => ProviderKind::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a segment file through the evaluation pipeline
    Translate(TranslateArgs),

    /// Generate shell completions for docufluent
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Segment file (.json) or plain-text document to translate
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Directory for the result files (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Force overwrite of existing result files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Provider used for every role
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// Model name used for every role
    #[arg(short, long)]
    model: Option<String>,

    /// Model for the translation role only
    #[arg(long)]
    translation_model: Option<String>,

    /// Model for the evaluation role only
    #[arg(long)]
    evaluation_model: Option<String>,

    /// Model for the optimization role only
    #[arg(long)]
    optimization_model: Option<String>,

    /// Source language ('auto', a name or an ISO code)
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language (a name or an ISO code)
    #[arg(short, long)]
    target_language: Option<String>,

    /// Score at or above which optimization is skipped
    #[arg(long)]
    threshold: Option<f32>,

    /// Terminology file injected into every prompt
    #[arg(short, long)]
    glossary: Option<PathBuf>,

    /// Do not read or update the translation cache
    #[arg(long)]
    no_cache: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// DocuFluent - multi-model document translation with evaluation and optimization
#[derive(Parser, Debug)]
#[command(name = "docufluent")]
#[command(version)]
#[command(about = "Translate document segments with a translate, evaluate, optimize pipeline")]
#[command(long_about = "DocuFluent translates pre-segmented documents with three model roles:
a translator (A), an evaluator (B) and an optimizer (C). Low-scoring translations
are rewritten and the better candidate is kept.

EXAMPLES:
    docufluent translate report.json                      # Translate using default config
    docufluent translate -t zh -f report.json             # Chinese target, overwrite results
    docufluent translate -p ollama -m qwen2.5 report.txt  # One local model for every role
    docufluent translate --evaluation-model gpt-4o report.json
    docufluent completions bash > docufluent.bash         # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logger starts wide open; the effective level is set once config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "docufluent", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
    }
}

/// Load the config file, creating a default one when missing
fn load_or_create_config(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        Config::load(config_path)
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path.display());
        let config = Config::default();
        config.save(config_path)?;
        Ok(config)
    }
}

/// Apply command line overrides on top of the file configuration
fn apply_overrides(config: &mut Config, options: &TranslateArgs) {
    if let Some(provider) = &options.provider {
        config.roles = app_config::RoleConfigs::uniform(ModelConfig::for_provider(provider.clone().into()));
    }

    if let Some(model) = &options.model {
        for role in Role::ALL {
            config.roles.get_mut(role).set_model(model.clone());
        }
    }

    let role_models = [
        (Role::Translation, &options.translation_model),
        (Role::Evaluation, &options.evaluation_model),
        (Role::Optimization, &options.optimization_model),
    ];
    for (role, model) in role_models {
        if let Some(model) = model {
            config.roles.get_mut(role).set_model(model.clone());
        }
    }

    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(threshold) = options.threshold {
        config.pipeline.optimization_threshold = threshold;
    }
    if let Some(glossary) = &options.glossary {
        config.glossary_path = Some(glossary.clone());
    }
    if options.no_cache {
        config.cache.enabled = false;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    let mut config = load_or_create_config(Path::new(&options.config_path))?;
    apply_overrides(&mut config, &options);
    log::set_max_level(level_filter(&config.log_level));

    if !options.input_path.is_file() {
        return Err(anyhow!("Input path does not exist: {:?}", options.input_path));
    }

    let controller = Controller::with_config(config)?;

    // First Ctrl-C cancels cooperatively; segments finish with their best text
    let cancel = CancellationFlag::new();
    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight segments...");
            signal_flag.cancel();
        }
    });

    let output_dir = options.output_dir.clone().unwrap_or_else(|| {
        options
            .input_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()
    });

    if let Some(report) = controller
        .run(options.input_path.clone(), output_dir, options.force_overwrite, cancel)
        .await?
    {
        info!("{}", report.summary.summary());
    }

    Ok(())
}
