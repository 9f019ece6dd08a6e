//! fechou-report - sales dashboard workbook generator
//!
//! Reads `{"proposals": [...]}` from stdin and writes the XLSX dashboard to
//! the given path.

mod exit;
mod output;

use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use fechou_core::{derive_rows, ProposalBatch, Renderer, ReportConfig, SystemClock};
use fechou_render::DashboardRenderer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::exit::ExitCode;

#[derive(Parser)]
#[command(name = "fechou-report")]
#[command(author, version, about = "Sales proposals JSON (stdin) to an XLSX dashboard", long_about = None)]
struct Cli {
    /// Output workbook path
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Report configuration (TOML)
    #[arg(short, long, value_name = "FILE", env = "FECHOU_CONFIG")]
    config: Option<PathBuf>,

    /// Write precomputed values instead of live formulas
    #[arg(long)]
    static_values: bool,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version also land here, on stdout
            let code = if err.use_stderr() {
                ExitCode::Usage
            } else {
                ExitCode::Success
            };
            err.print().ok();
            return code.into();
        }
    };

    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::Success.into(),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::Failure.into()
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ReportConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ReportConfig::default(),
    };

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;
    let batch = ProposalBatch::from_json(&input).context("failed to parse proposals")?;

    let clock = SystemClock;
    let rows = derive_rows(&batch.proposals, &config, &clock);
    info!(proposals = rows.len(), "rows derived");

    let mut renderer = DashboardRenderer::new().with_config(config).clock(&clock);
    if cli.static_values {
        renderer = renderer.static_values();
    }
    let workbook = renderer.render(&rows).context("failed to build workbook")?;

    output::write_atomic(&cli.output, &workbook)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!(path = %cli.output.display(), bytes = workbook.len(), "workbook written");
    Ok(())
}
