use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use file_appender::append_contents;

/// Concatenate delimited text files, keeping only the first file's header.
#[derive(Debug, Parser)]
#[command(
    name = "file_appender",
    about = "Append delimited text files, dropping later headers",
    long_about = None
)]
struct Args {
    /// Files to append, in order (at least 2)
    files: Vec<PathBuf>,

    /// Output file path
    #[arg(short = 'o', long = "output", default_value = "appended_file.txt")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut contents = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let text =
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        contents.push(text);
    }

    let merged = append_contents(&contents)?;

    fs::write(&args.output, &merged)
        .with_context(|| format!("Writing output file: {}", args.output.display()))?;
    println!(
        "✓ Appended {} files ({} lines) into {}",
        args.files.len(),
        merged.lines().count(),
        args.output.display()
    );

    Ok(())
}
