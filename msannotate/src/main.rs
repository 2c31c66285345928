//! # msannotate
//!
//! Runs a processing and annotation pipeline over the spectra of a TOML job file and prints
//! the annotated spectra as JSON.
//!
//! ```bash
//! msannotate annotate --job job.toml --pretty -v
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

use msannotate::config::{process_batch, Job};
use msannotate::data::spectrum::Spectrum;

#[derive(Parser)]
#[command(name = "msannotate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process and annotate the spectra of a job file
    Annotate {
        /// Job file with [[spectra]] and [[steps]] tables
        #[arg(short, long, value_name = "FILE")]
        job: PathBuf,

        /// Number of worker threads, overrides the job file
        #[arg(short, long)]
        threads: Option<usize>,

        /// Pretty print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Annotate { job, threads, pretty } => run_annotate(job, threads, pretty),
    }
}

fn run_annotate(path: PathBuf, threads: Option<usize>, pretty: bool) -> Result<()> {
    let content = std::fs::read_to_string(&path).with_context(|| format!("failed to read job file {}", path.display()))?;
    let job = Job::from_toml_str(&content).with_context(|| format!("failed to parse job file {}", path.display()))?;

    let spectra = job.spectra();

    let pipeline = job.pipeline();
    let num_threads = threads.or(job.threads).unwrap_or(4);
    info!("loaded {} of {} spectra from {}", spectra.len(), job.spectra.len(), path.display());

    let mut annotated = Vec::with_capacity(spectra.len());
    for (spectrum, result) in spectra.iter().zip(process_batch(&spectra, &pipeline, num_threads)?) {
        match result {
            Ok(processed) => {
                info!("{}", processed);
                annotated.push(processed);
            }
            Err(e) => warn!("skipping {}: {}", spectrum.identifier(), e),
        }
    }

    let views: Vec<_> = annotated.iter().map(Spectrum::view).collect();
    let json = if pretty { serde_json::to_string_pretty(&views)? } else { serde_json::to_string(&views)? };
    println!("{}", json);
    Ok(())
}
