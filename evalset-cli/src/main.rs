// Copyright 2025 Evalset (https://github.com/evalset/evalset)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Evalset CLI
//!
//! Runs fixed-task-set evals against a model and compares prompt variants.
//! Summaries print to stdout; progress logs go to stderr so report paths
//! stay pipeable.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};

use evalset_core::{merge_system_prompt, Variant};
use evalset_runner::{
    default_compare_report_path, default_run_report_path, load_dataset, read_prompt_file,
    run_comparison, write_report, AnthropicBackend, CompletionBackend, CredentialResolver,
    DatasetSnapshot, EnvCredentials, ExecutorOptions, OpenAiBackend, VariantExecutor,
};

mod sample;
mod summary;

#[derive(Parser, Debug)]
#[command(name = "evalset")]
#[command(version)]
#[command(about = "Run fixed-task-set evals and compare prompt/system variants", long_about = None)]
struct Cli {
    /// Print the full report as JSON instead of the summary block
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a dataset under one prompt variant and write a run report
    Run {
        /// Dataset file (JSON)
        dataset: PathBuf,

        /// System prompt file merged after the dataset's own prompt
        #[arg(long, value_name = "FILE", conflicts_with = "system_text")]
        system_file: Option<PathBuf>,

        /// Literal system prompt text merged after the dataset's own prompt
        #[arg(long, value_name = "TEXT")]
        system_text: Option<String>,

        /// Variant name recorded in the report
        #[arg(long, default_value = "candidate")]
        variant: String,

        /// Evaluate only the first N cases
        #[arg(long, value_name = "N")]
        max_cases: Option<NonZeroUsize>,

        /// Sampling temperature (0 to 2)
        #[arg(long, value_parser = parse_temperature)]
        temperature: Option<f64>,

        /// Model key as provider/id (providers: anthropic, openai)
        #[arg(long, env = "EVALSET_MODEL", value_name = "PROVIDER/ID")]
        model: Option<String>,

        /// Override the provider API base URL
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Maximum in-flight completion requests
        #[arg(long, default_value = "1", value_name = "N")]
        concurrency: NonZeroUsize,

        /// Report path (default: .evalset/reports/run-<dataset>-<variant>-<ts>.json)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Evaluate baseline and candidate prompts over one dataset snapshot
    Compare {
        /// Dataset file (JSON)
        dataset: PathBuf,

        /// Baseline system prompt file
        baseline_system: PathBuf,

        /// Candidate system prompt file
        candidate_system: PathBuf,

        /// Name recorded for the baseline variant
        #[arg(long, default_value = "baseline")]
        baseline_name: String,

        /// Name recorded for the candidate variant
        #[arg(long, default_value = "candidate")]
        candidate_name: String,

        /// Evaluate only the first N cases
        #[arg(long, value_name = "N")]
        max_cases: Option<NonZeroUsize>,

        /// Sampling temperature (0 to 2)
        #[arg(long, value_parser = parse_temperature)]
        temperature: Option<f64>,

        /// Model key as provider/id (providers: anthropic, openai)
        #[arg(long, env = "EVALSET_MODEL", value_name = "PROVIDER/ID")]
        model: Option<String>,

        /// Override the provider API base URL
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Maximum in-flight completion requests
        #[arg(long, default_value = "1", value_name = "N")]
        concurrency: NonZeroUsize,

        /// Report path (default: .evalset/reports/compare-<dataset>-<ts>.json)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Write a starter dataset template
    Init {
        /// Where to write the template
        #[arg(default_value = "demos/fixed-task-set.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("evalset_cli=info,evalset_runner=info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            dataset,
            system_file,
            system_text,
            variant,
            max_cases,
            temperature,
            model,
            base_url,
            concurrency,
            out,
        } => {
            let backend = build_backend(model.as_deref(), base_url.as_deref())?;
            let credential = EnvCredentials.resolve(backend.model())?;

            let loaded = load_dataset(&dataset)?;
            let snapshot = DatasetSnapshot::pin(
                &loaded,
                &dataset.to_string_lossy(),
                max_cases.map(NonZeroUsize::get),
            );

            let base = loaded.dataset.system_prompt.as_deref();
            let (prompt, source) = match (&system_file, &system_text) {
                (Some(path), _) => {
                    let system = read_prompt_file(path)?;
                    (
                        merge_system_prompt(base, Some(&system.text)),
                        format!("dataset.systemPrompt + file:{}", system.path.display()),
                    )
                }
                (None, Some(text)) => (
                    merge_system_prompt(base, Some(text)),
                    "dataset.systemPrompt + --system-text".to_string(),
                ),
                (None, None) => (
                    merge_system_prompt(base, None),
                    "dataset.systemPrompt".to_string(),
                ),
            };
            let variant = Variant::new(variant, prompt, source);

            let options = ExecutorOptions {
                temperature,
                credential: Some(credential),
                concurrency,
            };
            let executor = VariantExecutor::new(backend.as_ref(), options);
            let report = executor.execute(&snapshot, &variant).await;

            let target = out.unwrap_or_else(|| {
                default_run_report_path(&snapshot.dataset_name, &variant.name)
            });
            let report_path = write_report(&target, &report)?;
            tracing::info!(report = %report_path.display(), "run report written");

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", summary::run_summary(&report, &report_path));
            }
        }

        Commands::Compare {
            dataset,
            baseline_system,
            candidate_system,
            baseline_name,
            candidate_name,
            max_cases,
            temperature,
            model,
            base_url,
            concurrency,
            out,
        } => {
            let backend = build_backend(model.as_deref(), base_url.as_deref())?;
            let credential = EnvCredentials.resolve(backend.model())?;

            let loaded = load_dataset(&dataset)?;
            let snapshot = DatasetSnapshot::pin(
                &loaded,
                &dataset.to_string_lossy(),
                max_cases.map(NonZeroUsize::get),
            );

            let base = loaded.dataset.system_prompt.as_deref();
            let baseline_prompt = read_prompt_file(&baseline_system)?;
            let candidate_prompt = read_prompt_file(&candidate_system)?;

            let baseline = Variant::new(
                baseline_name,
                merge_system_prompt(base, Some(&baseline_prompt.text)),
                format!("dataset.systemPrompt + file:{}", baseline_prompt.path.display()),
            );
            let candidate = Variant::new(
                candidate_name,
                merge_system_prompt(base, Some(&candidate_prompt.text)),
                format!("dataset.systemPrompt + file:{}", candidate_prompt.path.display()),
            );

            let options = ExecutorOptions {
                temperature,
                credential: Some(credential),
                concurrency,
            };
            let report =
                run_comparison(backend.as_ref(), &options, &snapshot, &baseline, &candidate)
                    .await;

            let target =
                out.unwrap_or_else(|| default_compare_report_path(&snapshot.dataset_name));
            let report_path = write_report(&target, &report)?;
            tracing::info!(report = %report_path.display(), "compare report written");

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", summary::compare_summary(&report, &report_path));
            }
        }

        Commands::Init { path, force } => {
            let written = sample::write_template(&path, force)?;
            println!("✓ Created dataset template: {}", written.display());
        }
    }

    Ok(())
}

/// Build the completion backend for a `provider/id` model key.
fn build_backend(
    model: Option<&str>,
    base_url: Option<&str>,
) -> Result<Box<dyn CompletionBackend>> {
    let key = model.ok_or_else(|| {
        anyhow!("no active model: pass --model <provider/id> or set EVALSET_MODEL")
    })?;
    let (provider, id) = split_model_key(key)?;

    match provider {
        "anthropic" => {
            let mut backend = AnthropicBackend::new(id);
            if let Some(url) = base_url {
                backend = backend.with_base_url(url);
            }
            Ok(Box::new(backend))
        }
        "openai" => {
            let mut backend = OpenAiBackend::new(id);
            if let Some(url) = base_url {
                backend = backend.with_base_url(url);
            }
            Ok(Box::new(backend))
        }
        other => bail!("unsupported provider '{other}' (expected anthropic or openai)"),
    }
}

fn split_model_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('/') {
        Some((provider, id)) if !provider.is_empty() && !id.is_empty() => Ok((provider, id)),
        _ => bail!("model must look like provider/id, got '{key}'"),
    }
}

fn parse_temperature(value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("not a number: {value}"))?;
    if !(0.0..=2.0).contains(&parsed) {
        return Err(format!("temperature must be between 0 and 2, got {value}"));
    }
    Ok(parsed)
}
