use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use phish_guard_core::report::{render_report, OutputFormat};
use phish_guard_core::{
    AiAnalyst, FileIndicatorRepository, IndicatorRepository, IndicatorTable, LlmSettings,
    NoopAnalyst, OpenAiAnalyst, RiskScorer,
};
use tracing_subscriber::EnvFilter;

const SAMPLE_EMAIL: &str = "\
Dear User,

We've noticed unusual activity in your account. Please verify your identity
immediately by clicking the link below and entering your login credentials.

If you don't act within 24 hours, your account will be suspended.

Best regards,
Security Team
";

#[derive(Parser, Debug)]
#[command(
    name = "phish-guard",
    author,
    version,
    about = "Phishing email risk scoring CLI"
)]
struct Cli {
    /// Directory containing an indicator pack (indicators.txt)
    #[arg(long = "indicators-dir", value_name = "DIR", global = true)]
    indicators_dir: Option<PathBuf>,

    /// TOML settings file providing api_key, model, endpoint, proxies
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Score an email body read from FILE (or stdin when omitted)
    Analyze {
        file: Option<PathBuf>,
        /// Emit the full result as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
        /// Skip the model call; the AI half degrades to the neutral fallback
        #[arg(long = "no-ai")]
        no_ai: bool,
    },
    /// Score a built-in sample phishing email
    Demo {
        #[arg(long)]
        json: bool,
        #[arg(long = "no-ai")]
        no_ai: bool,
    },
    /// List the active indicator phrases
    ListIndicators {
        /// Emit indicators as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli
        .command
        .clone()
        .unwrap_or(Commands::ListIndicators { json: false })
    {
        Commands::Analyze { file, json, no_ai } => {
            let content = read_content(file.as_deref())?;
            analyze(&cli, &content, json, no_ai).await?
        }
        Commands::Demo { json, no_ai } => analyze(&cli, SAMPLE_EMAIL, json, no_ai).await?,
        Commands::ListIndicators { json } => {
            list_indicators(cli.indicators_dir.as_deref(), json).await?
        }
    }
    Ok(())
}

async fn analyze(cli: &Cli, content: &str, json: bool, no_ai: bool) -> Result<()> {
    let analyst: Arc<dyn AiAnalyst> = if no_ai {
        Arc::new(NoopAnalyst)
    } else {
        let settings = load_settings(cli.config.as_deref())?;
        Arc::new(OpenAiAnalyst::new(&settings)?)
    };
    let table = load_table(cli.indicators_dir.as_deref()).await?;
    let scorer = RiskScorer::new(&table, analyst)?;

    let result = scorer.analyze(content).await;
    let matches = scorer.indicator_matches(content);
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    print!("{}", render_report(&result, &matches, format)?);
    if json {
        println!();
    }
    Ok(())
}

async fn list_indicators(indicators_dir: Option<&Path>, json: bool) -> Result<()> {
    let table = load_table(indicators_dir).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(table.entries())?);
        return Ok(());
    }

    println!("{} indicator phrase(s) active", table.entries().len());
    for entry in table.entries() {
        println!(
            "- {category:<12} :: \"{phrase}\"",
            category = entry.category,
            phrase = entry.phrase
        );
    }
    Ok(())
}

async fn load_table(indicators_dir: Option<&Path>) -> Result<IndicatorTable> {
    let entries = match indicators_dir {
        Some(dir) => {
            let repo = FileIndicatorRepository::new(dir);
            repo.load_indicators()
                .await
                .with_context(|| format!("failed to load indicators from {}", dir.display()))?
        }
        None => return Ok(IndicatorTable::builtin()),
    };
    Ok(IndicatorTable::new(entries)?)
}

/// Resolve model settings: the file (when given) is layered under
/// PHISH_GUARD_* environment overrides; otherwise the environment alone.
/// Missing credentials abort — the scorer cannot be constructed without them.
fn load_settings(config_path: Option<&Path>) -> Result<LlmSettings> {
    match config_path {
        Some(path) => {
            let settings = config::Config::builder()
                .add_source(config::File::from(path))
                .add_source(config::Environment::with_prefix("PHISH_GUARD"))
                .build()
                .with_context(|| format!("failed to read settings from {}", path.display()))?
                .try_deserialize::<LlmSettings>()
                .context("settings file is missing required fields (api_key)")?;
            Ok(settings)
        }
        None => LlmSettings::from_env(),
    }
}

fn read_content(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read email body from {}", path.display())),
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("failed to read email body from stdin")?;
            Ok(content)
        }
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
