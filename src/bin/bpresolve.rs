//! bpresolve command-line front end.
//!
//! Reads a feature vector as JSON, resolves systolic/diastolic estimates
//! against the configured predictor endpoints and prints the report.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bpresolve::{CrossPredictionResolver, FeatureVector, HttpPredictor, ResolveMode, ResolverConfig};

#[derive(Debug, Parser)]
#[command(name = "bpresolve", version, about = "Resolve coupled systolic/diastolic blood pressure predictions")]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Predictor API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Iteration rounds (iterative mode)
    #[arg(long, global = true)]
    rounds: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Print the resolution as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Feature JSON file, or `-` for stdin
    #[arg(short, long)]
    features: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Estimate both values from priors by alternating the predictors
    Iterative(InputArgs),
    /// Predict both values once from measured values
    OneShot {
        #[command(flatten)]
        input: InputArgs,
        /// Measured systolic value
        #[arg(long)]
        systolic: f64,
        /// Measured diastolic value
        #[arg(long)]
        diastolic: f64,
    },
    /// Print the effective configuration
    Config,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BPRESOLVE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ResolverConfig> {
    let mut config = ResolverConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.base_url {
        config.endpoints.base_url = url.clone();
    }
    if let Some(rounds) = cli.rounds {
        config.iteration.rounds = rounds;
    }
    if let Some(secs) = cli.timeout_secs {
        config.endpoints.timeout_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

fn read_features(source: &str) -> Result<FeatureVector> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read features from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read {source}"))?
    };
    let value: serde_json::Value = serde_json::from_str(&text).context("features are not valid JSON")?;
    Ok(FeatureVector::from_json(&value)?)
}

fn resolve(config: &ResolverConfig, input: &InputArgs, mode: ResolveMode, json: bool) -> Result<()> {
    let features = read_features(&input.features)?;
    let resolver = CrossPredictionResolver::new(
        HttpPredictor::systolic(&config.endpoints)?,
        HttpPredictor::diastolic(&config.endpoints)?,
    )
    .with_settings(config.settings()?);

    let resolution = resolver.resolve(&features, mode)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        println!("{resolution}");
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match &cli.command {
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Command::Iterative(input) => resolve(&config, input, ResolveMode::Iterative, cli.json),
        Command::OneShot {
            input,
            systolic,
            diastolic,
        } => resolve(
            &config,
            input,
            ResolveMode::OneShot {
                systolic: *systolic,
                diastolic: *diastolic,
            },
            cli.json,
        ),
    }
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
