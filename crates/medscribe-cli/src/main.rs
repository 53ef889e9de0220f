//! `medscribe` command-line driver.
//!
//! Reads a clinical note and a saved model response from files (or stdin
//! with `-`), runs the grounding pipeline offline and prints JSON to stdout.
//! Logs go to stderr.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use medscribe_core::schema::RECORD_SCHEMA_JSON;
use medscribe_core::{analyze, segment, validate_record_schema, PipelineConfig, Recoverer};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

/// Notes shorter than this (after trimming) are rejected.
const MIN_NOTE_CHARS: usize = 5;

#[derive(Parser, Debug)]
#[command(
    name = "medscribe",
    version,
    about = "Ground model summaries of clinical notes in the note itself"
)]
struct Cli {
    /// Log pipeline decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a note into numbered evidence sentences
    Segment {
        /// Note file, or `-` for stdin
        note: String,
    },

    /// Recover the structured record from raw model output
    Recover {
        /// Model output file, or `-` for stdin
        output: String,

        #[arg(long)]
        pretty: bool,
    },

    /// Run the full pipeline and print the validated record
    Validate {
        /// Note file, or `-` for stdin
        #[arg(long)]
        note: String,

        /// Model output file, or `-` for stdin
        #[arg(long)]
        output: String,

        /// YAML or JSON pipeline config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the grounding threshold
        #[arg(long)]
        threshold: Option<f64>,

        /// Provider recorded in model_info
        #[arg(long, default_value = "unknown")]
        provider: String,

        /// Model id recorded in model_info
        #[arg(long, default_value = "unknown")]
        model: String,

        #[arg(long)]
        pretty: bool,
    },

    /// Print the JSON Schema of the validated record
    Schema,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Segment { note } => {
            let text = read_input(&note)?;
            print_json(&segment(&text), true)
        }
        Command::Recover { output, pretty } => {
            let raw = read_input(&output)?;
            let candidate = Recoverer::default()
                .recover(&raw)
                .with_context(|| format!("recovery failed for {}", output))?;
            print_json(&candidate, pretty)
        }
        Command::Validate {
            note,
            output,
            config,
            threshold,
            provider,
            model,
            pretty,
        } => {
            check_sources(&note, &output)?;
            let pipeline = load_pipeline(config.as_deref(), threshold)?;

            let note_text = read_input(&note)?;
            let raw = read_input(&output)?;
            let value = run_validate(&note_text, &raw, model_info(&provider, &model), &pipeline)?;
            print_json(&value, pretty)
        }
        Command::Schema => {
            println!("{}", RECORD_SCHEMA_JSON.trim_end());
            Ok(())
        }
    }
}

/// Stdin can feed at most one of the two inputs.
fn check_sources(note: &str, output: &str) -> Result<()> {
    if note == "-" && output == "-" {
        bail!("only one of --note and --output can read from stdin");
    }
    Ok(())
}

/// Load the config file if given; `--threshold` wins over the file.
fn load_pipeline(config: Option<&Path>, threshold: Option<f64>) -> Result<PipelineConfig> {
    let mut pipeline = match config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(threshold) = threshold {
        pipeline = pipeline.with_threshold(threshold);
    }
    pipeline.validate()?;
    Ok(pipeline)
}

/// Ground one model output in one note and return the schema-checked record.
fn run_validate(
    note_text: &str,
    raw: &str,
    model_info: Value,
    pipeline: &PipelineConfig,
) -> Result<Value> {
    if note_text.trim().chars().count() < MIN_NOTE_CHARS {
        bail!("note must be at least {} characters", MIN_NOTE_CHARS);
    }

    let record = analyze(note_text, raw, model_info, pipeline)
        .map_err(|e| {
            tracing::error!(preview = %e.preview, "Model output preview");
            e
        })
        .context("model output could not be recovered")?;

    let value = serde_json::to_value(&record)?;
    if let Err(errors) = validate_record_schema(&value) {
        bail!("validated record violates schema: {}", errors.join("; "));
    }
    Ok(value)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Read a file, or stdin when `source` is `-`.
fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(source).with_context(|| format!("failed to read {}", source))
}

fn model_info(provider: &str, model: &str) -> Value {
    json!({
        "provider": provider,
        "model": model,
        "mode": "offline",
        "received_at": chrono::Utc::now().to_rfc3339(),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}
