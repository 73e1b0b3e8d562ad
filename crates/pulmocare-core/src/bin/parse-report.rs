//! Parse a saved upstream response and print the flagged report as JSON.
//!
//! Reads the response from `--input` or stdin. Logging goes to stderr and is
//! controlled with `RUST_LOG` (default `pulmocare=info`).

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulmocare_core::{ParserConfig, ReportParser};

#[derive(Parser)]
#[command(name = "parse-report")]
#[command(about = "Extract, validate and flag a lab report from a model response")]
struct Cli {
    /// Raw response file (reads stdin when omitted)
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// JSON parser config
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Print single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pulmocare=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ParserConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ParserConfig::default(),
    };

    let raw = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };

    let report = match ReportParser::with_config(&config).parse(&raw) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}: {}", e.kind(), e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let json = if cli.compact {
        serde_json::to_string(&report)?
    } else {
        report.to_json()?
    };
    println!("{}", json);

    Ok(ExitCode::SUCCESS)
}
