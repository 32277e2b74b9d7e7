use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use ai_client::{OllamaClient, OllamaClientConfig};
use holdings_extractor::{normalize, output_file_name, reconcile, workbook, ColumnMapping};
use holdings_model::{render_delimited, strip_to_number, Delimiter};
use symbol_map::SymbolMap;

/// Convert a mutual-fund holdings workbook into the normalized delimited
/// text format.
///
/// The column mapping is inferred from the first rows of the sheet by a
/// local Ollama model unless `--mapping` supplies a manual override.
#[derive(Debug, Parser)]
#[command(
    name = "holdings_extractor",
    about = "Normalize a mutual fund holdings sheet into delimited text",
    long_about = None
)]
struct Args {
    /// Path to the workbook (xlsx/xls/ods)
    workbook: PathBuf,

    /// Sheet name, matched case-insensitively
    sheet: String,

    /// Scheme name recorded on every output row (upper-cased)
    scheme_name: String,

    /// Month-end reporting date, YYYY-MM-DD
    month_end: String,

    /// Manual column mapping "ISIN,NAME,VALUE,QTY,START_ROW" (e.g. "C,B,F,E,7");
    /// skips AI inference
    #[arg(short = 'm', long = "mapping")]
    mapping: Option<String>,

    /// Output field delimiter: "|", "," or "\t"
    #[arg(short = 'd', long = "delimiter", default_value = "|")]
    delimiter: String,

    /// ISIN symbol mapping CSV (columns: company, isin, bse, nse)
    #[arg(long = "symbol-file", default_value = "assets/data/ISIN_SYMBOL_MAPPING.csv")]
    symbol_file: PathBuf,

    /// Externally computed reference total; when present and numeric, a
    /// balancing row carrying the difference is appended
    #[arg(long = "reference-total")]
    reference_total: Option<String>,

    /// Output file path (default: {workbook stem}_{sheet}_mod.txt)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    NaiveDate::parse_from_str(&args.month_end, "%Y-%m-%d")
        .with_context(|| format!("Invalid month-end date '{}' (want YYYY-MM-DD)", args.month_end))?;
    let scheme_name = args.scheme_name.to_uppercase();
    let delimiter = Delimiter::from_config(&args.delimiter)?;

    println!("📖 Loading workbook: {}", args.workbook.display());
    let sheet = workbook::load_sheet(&args.workbook, &args.sheet)?;
    println!(
        "✓ Sheet '{}' loaded: {} rows",
        sheet.sheet_name,
        sheet.rows.len()
    );

    let mapping = match &args.mapping {
        Some(value) => parse_manual_mapping(value)?,
        None => infer_mapping(&sheet.rows)?,
    };
    println!(
        "✓ Column mapping: isin={} name={} value={} qty={} data_start_row={}",
        mapping.isin,
        mapping.instrument_name,
        mapping.market_value,
        mapping.quantity,
        mapping.data_start_row
    );

    let symbols = match SymbolMap::load_csv_file(&args.symbol_file) {
        Ok(map) => {
            println!("✓ Loaded {} ISIN symbol mappings", map.len());
            map
        }
        Err(err) => {
            // Degraded mode: exchange fields stay empty, processing continues.
            tracing::warn!(
                "Could not load symbol mapping from {}: {err}",
                args.symbol_file.display()
            );
            println!("⚠ Proceeding without symbol mappings");
            SymbolMap::default()
        }
    };

    let (mut records, totals) = normalize(
        &sheet.rows,
        &mapping,
        &scheme_name,
        &args.month_end,
        &symbols,
    )?;

    println!("\n📊 Summary:");
    println!("✓ Valid records: {}", totals.valid_record_count);
    println!("✓ Total market value: {:.2}", totals.total_market_value);
    println!("✓ Total quantity: {:.2}", totals.total_quantity);

    if let Some(reference) = &args.reference_total {
        let external = strip_to_number(reference).unwrap_or(f64::NAN);
        match reconcile(
            totals.total_market_value,
            external,
            &scheme_name,
            &args.month_end,
        ) {
            Some(balancing) => {
                println!("✓ Balancing difference: {:.2}", balancing.market_value);
                records.push(balancing);
            }
            None => println!("⚠ Reference total '{}' is not numeric; no balancing row", reference),
        }
    }

    let content = render_delimited(&records, delimiter);
    let out_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(output_file_name(&args.workbook, &sheet.sheet_name)));
    fs::write(&out_path, &content)
        .with_context(|| format!("Writing output file: {}", out_path.display()))?;
    println!("✓ Wrote {} rows to {}", records.len(), out_path.display());

    Ok(())
}

/// Parses the manual "C,B,F,E,7" override into a mapping.
fn parse_manual_mapping(value: &str) -> Result<ColumnMapping> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 5 {
        return Err(anyhow!(
            "Mapping must be \"ISIN,NAME,VALUE,QTY,START_ROW\", got '{value}'"
        ));
    }
    let data_start_row: usize = parts[4]
        .parse()
        .with_context(|| format!("Invalid data start row '{}'", parts[4]))?;

    Ok(ColumnMapping {
        isin: parts[0].to_uppercase(),
        instrument_name: parts[1].to_uppercase(),
        market_value: parts[2].to_uppercase(),
        quantity: parts[3].to_uppercase(),
        data_start_row,
    })
}

fn infer_mapping(rows: &[Vec<holdings_extractor::Cell>]) -> Result<ColumnMapping> {
    let config = OllamaClientConfig::from_env();
    let client = OllamaClient::new(config).context("Failed to initialize local Ollama client")?;

    let preview = workbook::rows_preview(workbook::initial_rows(
        rows,
        workbook::DEFAULT_PREVIEW_ROWS,
    ));
    println!("🤖 Inferring sheet structure from the first rows...");
    let analysis = client
        .infer_sheet_structure(&preview)
        .context("Schema inference failed; pass --mapping to override manually")?;

    Ok(ColumnMapping {
        isin: analysis.columns.isin,
        instrument_name: analysis.columns.instrument_name,
        market_value: analysis.columns.market_value,
        quantity: analysis.columns.quantity,
        data_start_row: analysis.data_start_row,
    })
}
