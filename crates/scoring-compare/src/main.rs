//! Scoring dump comparator
//!
//! Aligns a client-side and a server-side scoring dump by timestamp and
//! reports fields that drifted beyond tolerance.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sc_compare::report::DEFAULT_REPORT_PATH;
use sc_compare::{ComparisonReport, ToleranceTable, load_dump};

/// Compare client and server scoring dumps
#[derive(Parser, Debug)]
#[command(name = "scoring-compare")]
#[command(author, version, about = "Compare client and server scoring dumps for numeric drift", long_about = None)]
struct Args {
    /// Dump produced by the client
    client_path: PathBuf,

    /// Dump produced by the server
    server_path: PathBuf,

    /// Plain-text report destination
    #[arg(long = "report", default_value = DEFAULT_REPORT_PATH)]
    report: PathBuf,

    /// Also write the full report as JSON
    #[arg(long = "json")]
    json: Option<PathBuf>,

    /// TOML file overriding per-field tolerances
    #[arg(long = "tolerances")]
    tolerances: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    // Usage errors exit with status 2 from clap
    let args = Args::parse();

    init_tracing(args.verbose);

    let tolerances = match &args.tolerances {
        Some(path) => ToleranceTable::load(path)
            .with_context(|| format!("Failed to load tolerances from {}", path.display()))?,
        None => ToleranceTable::default(),
    };
    log_tolerances(&tolerances);

    let client = load_dump(&args.client_path)?;
    let server = load_dump(&args.server_path)?;
    tracing::debug!(
        client = client.len(),
        server = server.len(),
        "loaded dumps"
    );

    let report = ComparisonReport::compare(&client, &server, &tolerances);
    report.print_summary();
    if !report.passed() {
        // Exit status stays 0 on mismatches.
        tracing::warn!(mismatches = report.mismatches, "dumps disagree");
    }

    report
        .write_text(&args.report)
        .with_context(|| format!("Failed to write report to {}", args.report.display()))?;

    if let Some(json_path) = &args.json {
        report
            .write_json(json_path)
            .with_context(|| format!("Failed to write JSON report to {}", json_path.display()))?;
        println!("JSON report saved to {}", json_path.display());
    }

    println!("Report saved to {}", args.report.display());
    Ok(())
}

fn log_tolerances(tolerances: &ToleranceTable) {
    tracing::debug!(fallback = tolerances.fallback(), "tolerance fallback");
    for (field, tolerance) in tolerances.iter() {
        tracing::debug!(field, tolerance, "tolerance");
    }
}

/// Log to stderr so stdout carries only the report.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
