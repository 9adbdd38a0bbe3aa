//! `toml-compliance` CLI: run a TOML decoder or encoder against the suite.
//!
//! ## Usage
//!
//! ```sh
//! # Check a decoder against every case in ./tests
//! toml-compliance decoder ./my-decoder
//!
//! # Only invalid cases about arrays, with a 2 second limit per subprocess
//! toml-compliance decoder ./my-decoder -m invalid -m array --timeout 2
//!
//! # Pass arguments to the subject after `--`
//! toml-compliance decoder python3 -- decoder.py --strict
//!
//! # Check an encoder, reading its output back with a trusted decoder
//! toml-compliance encoder ./my-encoder --decoder ./reference-decoder
//!
//! # Machine-readable report for a specific suite version
//! toml-compliance decoder ./my-decoder --suite tests --toml-version v1.0.0 --format json
//! ```
//!
//! Exit status: 0 when every selected case passed, 1 when any failed or
//! errored, 2 on configuration errors.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use toml_compliance::loader::{self, DEFAULT_INPUT_EXTENSION};
use toml_compliance::{Executor, Invocation, Kind, MarkerFilter, Report, RunConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "toml-compliance",
    version,
    about = "Run TOML decoders and encoders against the compliance suite"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a decoder (TOML on stdin → typed-value JSON on stdout)
    Decoder {
        /// Decoder to test
        target: PathBuf,
        /// Arguments passed to the decoder (after `--`)
        #[arg(last = true)]
        args: Vec<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Check an encoder (typed-value JSON on stdin → TOML on stdout)
    Encoder {
        /// Encoder to test
        target: PathBuf,
        /// Arguments passed to the encoder (after `--`)
        #[arg(last = true)]
        args: Vec<String>,
        /// Supporting decoder used to read the encoder's output back
        #[arg(long)]
        decoder: PathBuf,
        /// Argument for the supporting decoder (repeatable)
        #[arg(long = "decoder-arg", value_name = "ARG")]
        decoder_args: Vec<String>,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Fixture root containing `valid/` and `invalid/`
    #[arg(long, default_value = "tests")]
    suite: PathBuf,
    /// TOML version subdirectory of the suite to use (e.g. v1.0.0)
    #[arg(long)]
    toml_version: Option<String>,
    /// Only run tests matching MARKER; repeat to require several, separate alternatives with commas
    #[arg(short = 'm', long = "marker", value_name = "MARKER")]
    markers: Vec<String>,
    /// Per-subprocess timeout in seconds
    #[arg(long, default_value = "10", value_parser = parse_timeout)]
    timeout: Duration,
    /// Number of test cases to run concurrently [default: available parallelism]
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Extension of decoder input files
    #[arg(long, default_value = DEFAULT_INPUT_EXTENSION)]
    extension: String,
    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Also list passing tests
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(report) => {
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<Report> {
    let (kind, subject, reference, run) = match cli.command {
        Commands::Decoder { target, args, run } => (
            Kind::Decoder,
            Invocation::new(target).with_args(args),
            None,
            run,
        ),
        Commands::Encoder {
            target,
            args,
            decoder,
            decoder_args,
            run,
        } => (
            Kind::Encoder,
            Invocation::new(target).with_args(args),
            Some(Invocation::new(decoder).with_args(decoder_args)),
            run,
        ),
    };

    subject
        .ensure_executable()
        .with_context(|| format!("Cannot run {kind}"))?;
    let mut config = RunConfig::new(subject).with_timeout(run.timeout);
    if let Some(reference) = reference {
        reference
            .ensure_executable()
            .context("Cannot run supporting decoder")?;
        config = config.with_reference_decoder(reference);
    }
    if let Some(jobs) = run.jobs {
        config = config.with_jobs(jobs);
    }

    let root = loader::suite_root(&run.suite, run.toml_version.as_deref());
    let cases = loader::load_cases(&root, kind, &run.extension)
        .with_context(|| format!("Failed to load test cases from {}", root.display()))?;
    let cases = MarkerFilter::from_args(&run.markers).select(cases);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let executor = Executor::new(config);
    let report = runtime.block_on(async {
        let cancel = executor.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, terminating running subjects");
                cancel.cancel();
            }
        });
        executor.run_all(cases).await
    })?;

    match run.format {
        Format::Text => print!("{}", report.render_text(run.verbose)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report.to_json())?),
    }
    Ok(report)
}

/// Seconds, fractional allowed: `10`, `0.5`.
fn parse_timeout(raw: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("not a number of seconds: '{raw}'"))?;
    if secs <= 0.0 {
        return Err("timeout must be positive".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|err| err.to_string())
}
