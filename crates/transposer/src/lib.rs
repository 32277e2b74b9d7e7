use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::warn;

use holdings_model::{format_number, Delimiter};

#[derive(Debug, Error)]
pub enum TransposeError {
    #[error("no (scheme, month-end) pairs found in the input file")]
    EmptyDataset,
    #[error("pivot produced no rows")]
    NoResults,
    #[error("duplicate observation for ISIN {isin} in {scheme} {month_end}")]
    DuplicateObservation {
        isin: String,
        scheme: String,
        month_end: String,
    },
}

/// One parsed line of the normalized 9-field format. Values that fail to
/// parse stay None and surface as empty pivot cells, never as zero.
#[derive(Debug, Clone)]
struct InputRow {
    scheme_name: String,
    month_end: String,
    isin: String,
    instrument_name: String,
    market_value: Option<f64>,
    quantity: Option<f64>,
    bse_symbol: String,
    nse_symbol: String,
    company_name_std: String,
}

/// Instrument-keyed identity of one wide output row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    nse_symbol: String,
    bse_symbol: String,
    company_name_std: String,
    isin: String,
}

/// Pivots a normalized delimited file into a wide per-instrument matrix:
/// one row per distinct (symbols, ISIN) group, two value columns per
/// distinct (scheme, month-end) pair, pairs ordered by scheme then date.
///
/// Stages run strictly in order: load, name resolution, axis discovery,
/// pivot, company-name backfill, sort and emit. Rows with a field count
/// other than 9 are logged and skipped; an empty axis or an empty result
/// set aborts the whole operation. A second observation for the same
/// (group, scheme, date) cell is an error rather than a silent overwrite.
pub fn transpose(
    content: &str,
    input_delimiter: Delimiter,
    output_delimiter: Delimiter,
) -> Result<String, TransposeError> {
    let rows = parse_rows(content, input_delimiter);

    // ISIN -> lexicographically smallest non-empty instrument name. The
    // tie-break is the smallest string, not the first occurrence.
    let mut name_table: BTreeMap<String, String> = BTreeMap::new();
    for row in &rows {
        if row.isin.is_empty() || row.instrument_name.is_empty() {
            continue;
        }
        name_table
            .entry(row.isin.clone())
            .and_modify(|existing| {
                if row.instrument_name < *existing {
                    *existing = row.instrument_name.clone();
                }
            })
            .or_insert_with(|| row.instrument_name.clone());
    }

    // Distinct (scheme, month-end) pairs, sorted by scheme then date. This
    // is the wide schema's column axis.
    let mut axis: Vec<(String, String)> = rows
        .iter()
        .map(|r| (r.scheme_name.clone(), r.month_end.clone()))
        .collect();
    axis.sort();
    axis.dedup();
    if axis.is_empty() {
        return Err(TransposeError::EmptyDataset);
    }

    // Group rows and project one (market value, quantity) cell per axis
    // pair. At most one observation may exist per cell.
    let mut groups: BTreeMap<GroupKey, HashMap<(String, String), (Option<f64>, Option<f64>)>> =
        BTreeMap::new();
    for row in &rows {
        let key = GroupKey {
            nse_symbol: row.nse_symbol.clone(),
            bse_symbol: row.bse_symbol.clone(),
            company_name_std: row.company_name_std.clone(),
            isin: row.isin.clone(),
        };
        let cell_key = (row.scheme_name.clone(), row.month_end.clone());
        let cells = groups.entry(key).or_default();
        if cells.contains_key(&cell_key) {
            return Err(TransposeError::DuplicateObservation {
                isin: row.isin.clone(),
                scheme: row.scheme_name.clone(),
                month_end: row.month_end.clone(),
            });
        }
        cells.insert(cell_key, (row.market_value, row.quantity));
    }

    if groups.is_empty() {
        return Err(TransposeError::NoResults);
    }

    let mut output_rows: Vec<(GroupKey, Vec<String>)> = Vec::with_capacity(groups.len());
    for (key, cells) in groups {
        // Backfill: a blank standardized company name takes the resolved
        // instrument name for the ISIN, when one exists.
        let company = if key.company_name_std.trim().is_empty() {
            name_table
                .get(&key.isin)
                .cloned()
                .unwrap_or_else(|| key.company_name_std.clone())
        } else {
            key.company_name_std.clone()
        };

        let mut fields = vec![
            key.nse_symbol.clone(),
            key.bse_symbol.clone(),
            company,
            key.isin.clone(),
        ];
        for pair in &axis {
            let (market_value, quantity) = cells.get(pair).copied().unwrap_or((None, None));
            fields.push(market_value.map(format_number).unwrap_or_default());
            fields.push(quantity.map(format_number).unwrap_or_default());
        }
        output_rows.push((key, fields));
    }

    // Instruments with an NSE symbol come first, alphabetically; blank-NSE
    // rows follow. Ties keep the deterministic group order.
    output_rows.sort_by(|(a, _), (b, _)| {
        let a_blank = a.nse_symbol.trim().is_empty();
        let b_blank = b.nse_symbol.trim().is_empty();
        a_blank
            .cmp(&b_blank)
            .then_with(|| a.nse_symbol.cmp(&b.nse_symbol))
    });

    let sep = output_delimiter.as_str();
    let mut header: Vec<String> = ["NSE_SYMBOL", "BSE_SYMBOL", "COMPANY_NAME_STD", "ISIN"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for (scheme, month_end) in &axis {
        header.push(format!("{}_{}_MARKET_VALUE", scheme, month_end));
        header.push(format!("{}_{}_QUANTITY", scheme, month_end));
    }

    let mut lines = Vec::with_capacity(output_rows.len() + 1);
    lines.push(header.join(sep));
    for (_, fields) in &output_rows {
        lines.push(fields.join(sep));
    }

    Ok(lines.join("\n"))
}

/// Splits the delimited content into 9-field rows, skipping the header
/// line. Rows with any other field count are logged and dropped.
fn parse_rows(content: &str, delimiter: Delimiter) -> Vec<InputRow> {
    let sep = delimiter.as_char();
    let mut rows = Vec::new();

    for (index, line) in content.trim().lines().enumerate().skip(1) {
        let fields: Vec<String> = line.split(sep).map(clean_field).collect();
        if fields.len() != 9 {
            warn!(
                "Row {} has {} fields instead of 9, skipping",
                index + 1,
                fields.len()
            );
            continue;
        }

        let mut it = fields.into_iter();
        rows.push(InputRow {
            scheme_name: it.next().unwrap_or_default(),
            month_end: it.next().unwrap_or_default(),
            isin: it.next().unwrap_or_default(),
            instrument_name: it.next().unwrap_or_default(),
            market_value: parse_value(&it.next().unwrap_or_default()),
            quantity: parse_value(&it.next().unwrap_or_default()),
            bse_symbol: it.next().unwrap_or_default(),
            nse_symbol: it.next().unwrap_or_default(),
            company_name_std: it.next().unwrap_or_default(),
        });
    }

    rows
}

fn clean_field(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != '\'' && *c != '"').collect()
}

fn parse_value(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok()
}
