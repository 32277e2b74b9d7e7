use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use holdings_model::Delimiter;
use transposer::transpose;

/// Pivot a normalized holdings file into a wide per-instrument matrix with
/// one market-value and one quantity column per (scheme, month-end) pair.
#[derive(Debug, Parser)]
#[command(
    name = "transposer",
    about = "Transpose normalized holdings into a wide per-instrument table",
    long_about = None
)]
struct Args {
    /// Normalized delimited input file (9-field schema)
    input: PathBuf,

    /// Input field delimiter: "|", "," or "\t"
    #[arg(long = "input-delimiter", default_value = "|")]
    input_delimiter: String,

    /// Output field delimiter: "|", "," or "\t"
    #[arg(long = "output-delimiter", default_value = "|")]
    output_delimiter: String,

    /// Output file path
    #[arg(short = 'o', long = "output", default_value = "mutual_fund_transposed.txt")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let input_delimiter = Delimiter::from_config(&args.input_delimiter)?;
    let output_delimiter = Delimiter::from_config(&args.output_delimiter)?;

    let content = fs::read_to_string(&args.input)
        .with_context(|| format!("Reading {}", args.input.display()))?;

    println!("📖 Transposing {}", args.input.display());
    let transposed = transpose(&content, input_delimiter, output_delimiter)?;

    fs::write(&args.output, &transposed)
        .with_context(|| format!("Writing output file: {}", args.output.display()))?;
    println!(
        "✓ Wrote {} rows to {}",
        transposed.lines().count().saturating_sub(1),
        args.output.display()
    );

    Ok(())
}
