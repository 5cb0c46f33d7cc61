//! resume-tailor -- extract resume text and apply proposed edits to a `.docx`.
//!
//! Usage:
//!   resume-tailor extract <DOCX> [--json]
//!   resume-tailor apply <DOCX> --edits <JSON> [--output <DOCX>] [--diff] [--json]

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use resume_tailor::{Document, OutcomeStatus, ReconcileReport, TailorConfig};

#[derive(Parser)]
#[command(name = "resume-tailor")]
#[command(version)]
#[command(about = "Apply proposed text edits to a .docx resume without losing its formatting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resume's visible text, one block per line
    Extract {
        /// Input .docx file
        #[arg(value_name = "DOCX")]
        input: PathBuf,

        /// Print the blocks with their origin as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply an edit batch and save the result as a new document
    Apply {
        /// Input .docx file (never modified)
        #[arg(value_name = "DOCX")]
        input: PathBuf,

        /// Edit batch: an edit list, a section list, or a whole analysis
        #[arg(short, long, value_name = "JSON")]
        edits: PathBuf,

        /// Output file (defaults to the input name plus the suffix)
        #[arg(short, long, value_name = "DOCX")]
        output: Option<PathBuf>,

        /// Suffix inserted before the extension of the default output name
        #[arg(long, env = "RESUME_TAILOR_SUFFIX")]
        suffix: Option<String>,

        /// JSON settings file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print a diff of the extracted text before and after
        #[arg(long)]
        diff: bool,

        /// Print the reconciliation report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Extract { input, json } => extract(&input, json),
        Commands::Apply {
            input,
            edits,
            output,
            suffix,
            config,
            diff,
            json,
        } => {
            let mut settings = match config {
                Some(path) => TailorConfig::load(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => TailorConfig::default(),
            };
            if let Some(suffix) = suffix {
                settings.output_suffix = suffix;
            }
            apply(&input, &edits, output, &settings, diff, json)
        }
    }
}

fn extract(input: &Path, json: bool) -> anyhow::Result<()> {
    let doc = Document::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    if json {
        let blocks = resume_tailor::extract_blocks(&doc);
        println!("{}", serde_json::to_string_pretty(&blocks)?);
    } else {
        println!("{}", resume_tailor::extract(&doc));
    }
    Ok(())
}

fn apply(
    input: &Path,
    edits_path: &Path,
    output: Option<PathBuf>,
    config: &TailorConfig,
    diff: bool,
    json: bool,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(edits_path)
        .with_context(|| format!("failed to read edits {}", edits_path.display()))?;
    let edits = resume_tailor::edits_from_json(&text)
        .with_context(|| format!("failed to parse edits {}", edits_path.display()))?;

    let output = output.unwrap_or_else(|| config.output_path(input));
    let report = resume_tailor::reconcile_to(input, &output, &edits, config)
        .with_context(|| format!("failed to tailor {}", input.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if diff {
        let before = resume_tailor::extract(&Document::open(input)?);
        let after = resume_tailor::extract(&Document::open(&output)?);
        print!("{}", resume_tailor::edit::diff::text_diff(&format!("{before}\n"), &format!("{after}\n")));
    }
    Ok(())
}

fn print_summary(report: &ReconcileReport) {
    for outcome in &report.outcomes {
        let status = match &outcome.status {
            OutcomeStatus::Applied {
                paragraphs,
                cross_run_rebuilds: 0,
            } => format!("applied in {paragraphs} paragraph(s)"),
            OutcomeStatus::Applied {
                paragraphs,
                cross_run_rebuilds,
            } => format!("applied in {paragraphs} paragraph(s), {cross_run_rebuilds} rebuilt"),
            OutcomeStatus::NoMatch { closest: Some(c) } => {
                format!("no match (closest: {:?}, {:.2})", c.text, c.similarity)
            }
            OutcomeStatus::NoMatch { closest: None } => "no match".to_owned(),
            OutcomeStatus::Skipped { reason } => format!("skipped ({reason:?})"),
        };
        println!("[{}] {:?}: {status}", outcome.index, outcome.target_text);
    }
    println!(
        "{}/{} edits applied -> {}",
        report.applied(),
        report.outcomes.len(),
        report.output.display()
    );
}
