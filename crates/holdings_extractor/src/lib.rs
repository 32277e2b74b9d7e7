pub mod workbook;

use std::path::Path;

use thiserror::Error;

use holdings_model::{coerce_number, HoldingRecord, Totals};
use symbol_map::{SymbolInfo, SymbolMap};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("sheet \"{0}\" not found in workbook")]
    SheetNotFound(String),
    #[error("invalid column letter '{0}' (only A-Z are supported)")]
    InvalidColumn(String),
    #[error("data start row must be 1 or greater")]
    InvalidStartRow,
    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One spreadsheet cell after the RawSheet boundary. Everything downstream
/// of the workbook loader works on this sum type, never on engine-specific
/// cell data.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The cell's string form, as used by the numeric coercion rule and by
    /// text fields. Empty cells render as "".
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format!("{}", n),
            Cell::Empty => String::new(),
        }
    }

    /// Numeric coercion per the record rules: numbers pass through, text is
    /// stripped and parsed, anything else is 0.
    pub fn coerce_number(&self) -> f64 {
        match self {
            Cell::Number(n) => *n,
            Cell::Text(s) => coerce_number(s),
            Cell::Empty => 0.0,
        }
    }
}

/// Where each holding field lives in the sheet, plus the first 1-based row
/// of actual data. Column designators are single letters A-Z; this range
/// limit is inherited from the inference format and is not configurable.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub isin: String,
    pub instrument_name: String,
    pub market_value: String,
    pub quantity: String,
    pub data_start_row: usize,
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    isin: usize,
    instrument_name: usize,
    market_value: usize,
    quantity: usize,
}

impl ColumnMapping {
    fn resolve(&self) -> Result<ColumnIndices, ExtractError> {
        if self.data_start_row < 1 {
            return Err(ExtractError::InvalidStartRow);
        }
        Ok(ColumnIndices {
            isin: column_index(&self.isin)?,
            instrument_name: column_index(&self.instrument_name)?,
            market_value: column_index(&self.market_value)?,
            quantity: column_index(&self.quantity)?,
        })
    }
}

/// Maps a single-letter designator to a zero-based column index (A -> 0).
pub fn column_index(letter: &str) -> Result<usize, ExtractError> {
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Ok(c as usize - 'A' as usize),
        _ => Err(ExtractError::InvalidColumn(letter.to_string())),
    }
}

/// Turns raw sheet rows into canonical holding records plus totals.
///
/// A row is emitted only when its ISIN cell is a string starting with "IN";
/// that is the sole validity predicate. Every other malformed or missing
/// field falls back to an empty string or 0, the row is never rejected for
/// it. An ISIN absent from the symbol map is a data-quality case, not an
/// error: the exchange fields stay empty.
///
/// Output order is strictly the input row order; duplicate ISINs across
/// rows stay separate records.
pub fn normalize(
    sheet: &[Vec<Cell>],
    mapping: &ColumnMapping,
    scheme_name: &str,
    month_end: &str,
    symbols: &SymbolMap,
) -> Result<(Vec<HoldingRecord>, Totals), ExtractError> {
    let idx = mapping.resolve()?;
    let start = mapping.data_start_row - 1;

    let empty_info = SymbolInfo::default();
    let mut records = Vec::new();
    let mut totals = Totals::default();

    for row in sheet.iter().skip(start) {
        let Some(isin) = row.get(idx.isin).and_then(Cell::as_text) else {
            continue;
        };
        if !isin.starts_with("IN") {
            continue;
        }

        let info = symbols.lookup(isin).unwrap_or(&empty_info);

        let market_value = cell_at(row, idx.market_value).coerce_number();
        let quantity = cell_at(row, idx.quantity).coerce_number();

        if !market_value.is_nan() {
            totals.total_market_value += market_value;
        }
        if !quantity.is_nan() {
            totals.total_quantity += quantity;
        }
        totals.valid_record_count += 1;

        records.push(HoldingRecord {
            scheme_name: scheme_name.to_string(),
            month_end: month_end.to_string(),
            isin: isin.to_string(),
            instrument_name: cell_at(row, idx.instrument_name).display(),
            market_value,
            quantity,
            bse_symbol: info.bse_symbol.clone(),
            nse_symbol: info.nse_symbol.clone(),
            company_name_std: info.std_company_name.clone(),
        });
    }

    Ok((records, totals))
}

fn cell_at(row: &[Cell], index: usize) -> &Cell {
    row.get(index).unwrap_or(&Cell::Empty)
}

/// Compares an externally supplied reference total against the computed
/// column sum and produces the balancing row carrying the difference.
///
/// Returns None when the external total is not a finite number, which is
/// the "no reference available" case. The sign convention is
/// external - computed: a positive balancing value means the reference
/// total exceeds what the columns sum to.
pub fn reconcile(
    computed_total: f64,
    external_total: f64,
    scheme_name: &str,
    month_end: &str,
) -> Option<HoldingRecord> {
    if !external_total.is_finite() {
        return None;
    }
    let difference = external_total - computed_total;
    Some(HoldingRecord::balancing(scheme_name, month_end, difference))
}

/// Output file name for a processed workbook: `{stem}_{sheet}_mod.txt`.
pub fn output_file_name(input: &Path, sheet_name: &str) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("holdings");
    format!("{}_{}_mod.txt", stem, sheet_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdings_model::{strip_to_number, BALANCING_ISIN};

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn mapping(start_row: usize) -> ColumnMapping {
        ColumnMapping {
            isin: "A".to_string(),
            instrument_name: "B".to_string(),
            market_value: "C".to_string(),
            quantity: "D".to_string(),
            data_start_row: start_row,
        }
    }

    fn sample_symbols() -> SymbolMap {
        let csv = "Company Name,ISIN,BSE Symbol,NSE Symbol\n\
                   HDFC BANK,INE040A01034,500180,HDFCBANK\n";
        SymbolMap::from_reader(csv.as_bytes()).unwrap()
    }

    fn sample_sheet() -> Vec<Vec<Cell>> {
        vec![
            vec![text("Portfolio disclosure"), Cell::Empty],
            vec![text("ISIN"), text("Name"), text("Value"), text("Qty")],
            vec![
                text("INE040A01034"),
                text("HDFC Bank Ltd"),
                Cell::Number(1520.25),
                Cell::Number(100.0),
            ],
            vec![text("Subtotal"), Cell::Empty, Cell::Number(1520.25)],
            vec![
                text("INE002A01018"),
                text("Reliance Industries"),
                text("₹2,000.75"),
                text("50"),
            ],
        ]
    }

    #[test]
    fn test_normalize_emits_only_isin_rows_in_order() {
        let (records, totals) = normalize(
            &sample_sheet(),
            &mapping(3),
            "ALPHA FUND",
            "2025-03-31",
            &sample_symbols(),
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].isin, "INE040A01034");
        assert_eq!(records[1].isin, "INE002A01018");
        assert_eq!(totals.valid_record_count, 2);
    }

    #[test]
    fn test_normalize_enriches_from_symbol_map() {
        let (records, _) = normalize(
            &sample_sheet(),
            &mapping(3),
            "ALPHA FUND",
            "2025-03-31",
            &sample_symbols(),
        )
        .unwrap();

        assert_eq!(records[0].nse_symbol, "HDFCBANK");
        assert_eq!(records[0].company_name_std, "HDFC BANK");
        // Unmapped ISIN keeps empty defaults; not an error.
        assert_eq!(records[1].nse_symbol, "");
        assert_eq!(records[1].company_name_std, "");
    }

    #[test]
    fn test_normalize_totals_match_record_sum() {
        let (records, totals) = normalize(
            &sample_sheet(),
            &mapping(3),
            "ALPHA FUND",
            "2025-03-31",
            &sample_symbols(),
        )
        .unwrap();

        let sum: f64 = records.iter().map(|r| r.market_value).sum();
        assert!((sum - totals.total_market_value).abs() < 1e-9);
        assert!((totals.total_market_value - 3521.0).abs() < 1e-9);
        assert!((totals.total_quantity - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_respects_start_row() {
        // Starting below the second data row leaves only one record.
        let (records, _) = normalize(
            &sample_sheet(),
            &mapping(4),
            "ALPHA FUND",
            "2025-03-31",
            &sample_symbols(),
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].isin, "INE002A01018");
    }

    #[test]
    fn test_normalize_keeps_duplicate_isins() {
        let sheet = vec![
            vec![text("INE040A01034"), text("HDFC"), Cell::Number(10.0)],
            vec![text("INE040A01034"), text("HDFC"), Cell::Number(20.0)],
        ];
        let (records, totals) = normalize(
            &sheet,
            &mapping(1),
            "ALPHA FUND",
            "2025-03-31",
            &SymbolMap::default(),
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(totals.total_market_value, 30.0);
    }

    #[test]
    fn test_normalize_numeric_isin_cell_does_not_qualify() {
        // Only string cells can qualify; numeric cells never do.
        let sheet = vec![vec![Cell::Number(991234.0), text("x"), Cell::Number(5.0)]];
        let (records, totals) = normalize(
            &sheet,
            &mapping(1),
            "ALPHA FUND",
            "2025-03-31",
            &SymbolMap::default(),
        )
        .unwrap();
        assert!(records.is_empty());
        assert_eq!(totals.valid_record_count, 0);
    }

    #[test]
    fn test_normalize_short_rows_use_defaults() {
        let sheet = vec![vec![text("INE040A01034")]];
        let (records, _) = normalize(
            &sheet,
            &mapping(1),
            "ALPHA FUND",
            "2025-03-31",
            &SymbolMap::default(),
        )
        .unwrap();
        assert_eq!(records[0].instrument_name, "");
        assert_eq!(records[0].market_value, 0.0);
        assert_eq!(records[0].quantity, 0.0);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let sheet = sample_sheet();
        let map = mapping(3);
        let symbols = sample_symbols();
        let first = normalize(&sheet, &map, "ALPHA FUND", "2025-03-31", &symbols).unwrap();
        let second = normalize(&sheet, &map, "ALPHA FUND", "2025-03-31", &symbols).unwrap();
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A").unwrap(), 0);
        assert_eq!(column_index("Z").unwrap(), 25);
        assert!(column_index("a").is_err());
        assert!(column_index("AA").is_err());
        assert!(column_index("").is_err());
    }

    #[test]
    fn test_invalid_start_row_rejected() {
        let err = normalize(
            &[],
            &mapping(0),
            "ALPHA FUND",
            "2025-03-31",
            &SymbolMap::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidStartRow));
    }

    #[test]
    fn test_reconcile_produces_difference_row() {
        let rec = reconcile(100.0, 130.0, "ALPHA FUND", "2025-03-31").unwrap();
        assert_eq!(rec.isin, BALANCING_ISIN);
        assert_eq!(rec.market_value, 30.0);
        assert_eq!(rec.scheme_name, "ALPHA FUND");
    }

    #[test]
    fn test_reconcile_without_reference_total() {
        assert!(reconcile(100.0, f64::NAN, "ALPHA FUND", "2025-03-31").is_none());
        assert!(reconcile(100.0, f64::INFINITY, "ALPHA FUND", "2025-03-31").is_none());
    }

    #[test]
    fn test_reference_total_parsing_feeds_reconcile() {
        // The display text of a reference total goes through the same
        // strip-and-parse rule before reconciliation.
        let external = strip_to_number("1,30,000.00").unwrap_or(f64::NAN);
        let rec = reconcile(100000.0, external, "ALPHA FUND", "2025-03-31").unwrap();
        assert_eq!(rec.market_value, 30000.0);

        let absent = strip_to_number("N/A").unwrap_or(f64::NAN);
        assert!(reconcile(100000.0, absent, "ALPHA FUND", "2025-03-31").is_none());
    }

    #[test]
    fn test_output_file_name() {
        let name = output_file_name(Path::new("/tmp/holdings March.xlsx"), "Sheet1");
        assert_eq!(name, "holdings March_Sheet1_mod.txt");
    }
}
