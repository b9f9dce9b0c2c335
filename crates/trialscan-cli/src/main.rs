//! trialscan: extract study records from biomedical PDFs and validate them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use trialscan_core::{rule_table, Validator, Verdict};
use trialscan_runtime::providers::{ANTHROPIC_API_KEY_ENV, OPENAI_API_KEY_ENV};
use trialscan_runtime::{ApiCredential, BatchReport, Pipeline, PipelineConfig, ProviderRegistry};

#[derive(Parser)]
#[command(name = "trialscan", author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract records from PDFs, validate them, and write them out
    Extract {
        /// Provider API key (falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Provider type: openai or anthropic
        #[arg(long)]
        provider: Option<String>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// YAML config file
        #[arg(long, short = 'c', env = "TRIALSCAN_CONFIG")]
        config: Option<PathBuf>,

        /// Directory for valid records
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Directory for invalid records
        #[arg(long)]
        invalid_dir: Option<PathBuf>,

        /// Documents extracted at the same time
        #[arg(long)]
        concurrency: Option<usize>,

        /// Write a JSON batch report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// PDF files to process
        #[arg(required = true)]
        pdfs: Vec<PathBuf>,
    },

    /// Validate existing JSON records without calling a model
    Validate {
        /// Print verdicts as JSON
        #[arg(long)]
        json: bool,

        /// JSON record files
        #[arg(required = true)]
        records: Vec<PathBuf>,
    },

    /// Print the rule table
    Rules,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Extract {
            api_key,
            provider,
            model,
            config,
            output_dir,
            invalid_dir,
            concurrency,
            report,
            pdfs,
        } => {
            let mut pipeline_config = match &config {
                Some(path) => PipelineConfig::from_path(path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => PipelineConfig::default(),
            };

            if let Some(provider) = provider {
                pipeline_config.provider = provider;
            }
            if model.is_some() {
                pipeline_config.model = model;
            }
            if let Some(dir) = output_dir {
                pipeline_config.output.valid_dir = dir;
            }
            if let Some(dir) = invalid_dir {
                pipeline_config.output.invalid_dir = dir;
            }
            if let Some(n) = concurrency {
                pipeline_config.concurrency = n;
            }

            let batch = extract(&pipeline_config, api_key.as_deref(), &pdfs).await?;

            println!(
                "{} documents: {} valid, {} invalid, {} failed",
                batch.summary.total, batch.summary.valid, batch.summary.invalid, batch.summary.failed
            );

            if let Some(path) = report {
                let body = serde_json::to_string_pretty(&batch)?;
                std::fs::write(&path, body)
                    .with_context(|| format!("writing report {}", path.display()))?;
                tracing::info!(path = %path.display(), "wrote batch report");
            }

            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate { json, records } => {
            let results: Vec<RecordCheck> = records.iter().map(|p| check_record(p)).collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for result in &results {
                    print_check(result);
                }
            }

            if results.iter().all(RecordCheck::is_valid) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Rules => {
            for rule in rule_table() {
                let phase = format!("{:?}", rule.phase());
                println!("{:<36} {:<9} {}", rule.name(), phase, rule.describe());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn api_key_env(provider: &str) -> &'static str {
    match provider {
        "anthropic" => ANTHROPIC_API_KEY_ENV,
        _ => OPENAI_API_KEY_ENV,
    }
}

async fn extract(
    config: &PipelineConfig,
    api_key: Option<&str>,
    pdfs: &[PathBuf],
) -> Result<BatchReport> {
    let registry = ProviderRegistry::with_defaults();
    let Some(default_model) = registry.default_model(&config.provider) else {
        bail!(
            "unknown provider '{}' (available: {})",
            config.provider,
            registry.available_types().join(", ")
        );
    };

    let env_var = api_key_env(&config.provider);
    let credential = match ApiCredential::from_option_or_env(api_key, env_var, "API key") {
        Ok(credential) => credential,
        Err(_) => bail!("API key not provided: pass --api-key or set {}", env_var),
    };
    tracing::debug!(credential = %credential, "using credential");

    let provider = registry
        .create(
            &config.provider,
            &config.provider_config(Some(credential.expose())),
        )
        .context("creating provider")?;

    let pipeline = Pipeline::from_config(provider, config, default_model);
    let report = pipeline.run(pdfs).await?;
    Ok(report)
}

/// Offline validation result for one record file.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RecordCheck {
    Checked {
        file: PathBuf,
        #[serde(flatten)]
        verdict: Verdict,
    },
    Rejected {
        file: PathBuf,
        error: String,
    },
}

impl RecordCheck {
    fn is_valid(&self) -> bool {
        matches!(self, RecordCheck::Checked { verdict, .. } if verdict.is_valid())
    }
}

fn check_record(path: &Path) -> RecordCheck {
    let file = path.to_path_buf();
    let parsed = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|text| Ok(serde_json::from_str::<serde_json::Value>(&text)?))
        .and_then(|value| Ok(Validator::new().validate_json(&value)?));

    match parsed {
        Ok(verdict) => RecordCheck::Checked { file, verdict },
        Err(e) => RecordCheck::Rejected {
            file,
            error: e.to_string(),
        },
    }
}

fn print_check(result: &RecordCheck) {
    match result {
        RecordCheck::Checked { file, verdict } => {
            let status = if verdict.is_valid() { "valid" } else { "invalid" };
            println!("{}: {}", file.display(), status);
            for violation in verdict.violations() {
                println!("  - {}", violation);
            }
        }
        RecordCheck::Rejected { file, error } => {
            println!("{}: error: {}", file.display(), error);
        }
    }
}
