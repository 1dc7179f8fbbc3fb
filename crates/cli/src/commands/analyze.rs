//! The `analyze` command: resolves configuration (the only place the
//! environment is read), runs the detection pipeline and prints or writes
//! the report.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use vmprobe_detector::{Analyzer, DetectorConfig, ProviderConfig};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// JavaScript file to analyze
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Restrict analysis to an inclusive line range, e.g. 100:400
    #[arg(long, value_name = "START:END")]
    pub range: Option<String>,

    #[arg(long, default_value = "gpt-4o")]
    pub model: String,

    /// API key; falls back to the OPENAI_API_KEY environment variable
    #[arg(long)]
    pub openai_api_key: Option<String>,

    /// Custom API endpoint for OpenAI-compatible backends
    #[arg(long)]
    pub base_url: Option<String>,

    /// Token budget per batch sent to the model
    #[arg(long, default_value = "24000")]
    pub max_batch_tokens: usize,

    /// Load settings from a YAML config file instead of flags
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Use the offline mock provider (no network, no key required)
    #[arg(long)]
    pub mock: bool,

    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

pub async fn execute(args: AnalyzeArgs) -> Result<()> {
    let start = Instant::now();

    let config = build_config(&args)?;
    let range = args.range.as_deref().map(parse_range).transpose()?;

    if args.verbose {
        println!("{}", "Starting JSVMP analysis...".bright_blue());
        println!("  File: {}", args.input.display());
        if let Some((s, e)) = range {
            println!("  Range: lines {}-{}", s, e);
        }
    }

    let analyzer = Analyzer::from_config(config)?;
    let outcome = analyzer.analyze_file_range(&args.input, range).await?;

    let rendered = match args.format {
        OutputFormat::Text => outcome.report.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(&outcome.merged)?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    if !outcome.partial_errors.is_empty() {
        eprintln!(
            "\n{}",
            format!(
                "Warning: {} batch(es) failed; the report is incomplete:",
                outcome.partial_errors.len()
            )
            .yellow()
        );
        for error in &outcome.partial_errors {
            eprintln!("  {}", error.yellow());
        }
    }

    if args.verbose {
        println!(
            "\n{} ({:.2}s)",
            "Analysis complete".green().bold(),
            start.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

/// The environment is consulted exactly here; everything downstream works
/// from the explicit config struct.
fn build_config(args: &AnalyzeArgs) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DetectorConfig::default(),
    };

    config.max_tokens_per_batch = args.max_batch_tokens;

    if args.mock {
        config.provider = ProviderConfig::Mock;
    } else if args.config.is_none() {
        config.provider = ProviderConfig::OpenAi {
            model: args.model.clone(),
            api_key: args
                .openai_api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok()),
            base_url: args.base_url.clone(),
        };
    }

    Ok(config)
}

fn parse_range(spec: &str) -> Result<(u32, u32)> {
    let (start, end) = spec
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Invalid range '{}', expected START:END", spec))?;
    Ok((
        start.trim().parse().context("Invalid range start")?,
        end.trim().parse().context("Invalid range end")?,
    ))
}
