use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel ISIN used for the synthetic balancing row appended during
/// reconciliation. Sorts after every real Indian ISIN.
pub const BALANCING_ISIN: &str = "IN9999999999";

/// Instrument label of the balancing row. The `ZZZ!` prefix keeps it at the
/// bottom of name-sorted views.
pub const BALANCING_LABEL: &str = "ZZZ! Cash / Derivatives / Balancing Num";

/// Column order of the normalized delimited file. Fixed 9-field schema,
/// shared by the extractor output and the transposer input.
pub const OUTPUT_FIELDS: [&str; 9] = [
    "SCHEME_NAME",
    "MONTH_END",
    "ISIN",
    "INSTRUMENT_NAME",
    "MARKET_VALUE",
    "QUANTITY",
    "BSE_SYMBOL",
    "NSE_SYMBOL",
    "COMPANY_NAME_STD",
];

#[derive(Debug, Error)]
pub enum DelimiterError {
    #[error("unsupported delimiter {0:?} (use ',', '|' or tab)")]
    Unsupported(String),
}

/// Field separator for the normalized text format.
///
/// Configuration carries tab as the two-character escape `\t`; it is
/// translated to a real tab character here, before any splitting or joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Pipe,
    Comma,
    Tab,
}

impl Delimiter {
    pub fn from_config(value: &str) -> Result<Self, DelimiterError> {
        match value {
            "|" => Ok(Delimiter::Pipe),
            "," => Ok(Delimiter::Comma),
            "\\t" | "\t" => Ok(Delimiter::Tab),
            other => Err(DelimiterError::Unsupported(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Delimiter::Pipe => "|",
            Delimiter::Comma => ",",
            Delimiter::Tab => "\t",
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Delimiter::Pipe => '|',
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
        }
    }
}

/// One normalized fund-holding row. scheme_name and month_end are constants
/// for the whole batch that produced the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub scheme_name: String,
    pub month_end: String,
    pub isin: String,
    pub instrument_name: String,
    pub market_value: f64,
    pub quantity: f64,
    pub bse_symbol: String,
    pub nse_symbol: String,
    pub company_name_std: String,
}

impl HoldingRecord {
    /// The synthetic reconciliation row carrying the unexplained difference
    /// between an externally supplied total and the column sum.
    pub fn balancing(scheme_name: &str, month_end: &str, difference: f64) -> Self {
        Self {
            scheme_name: scheme_name.to_string(),
            month_end: month_end.to_string(),
            isin: BALANCING_ISIN.to_string(),
            instrument_name: BALANCING_LABEL.to_string(),
            market_value: difference,
            quantity: 0.0,
            bse_symbol: String::new(),
            nse_symbol: String::new(),
            company_name_std: String::new(),
        }
    }

    pub fn is_balancing(&self) -> bool {
        self.isin == BALANCING_ISIN
    }
}

/// Aggregates accumulated over emitted records, excluding the balancing row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub total_market_value: f64,
    pub total_quantity: f64,
    pub valid_record_count: usize,
}

/// Reduces a cell's string form to a number: every character other than
/// digits, `.` and `-` is dropped before parsing. `"₹1,234.50"` -> 1234.50.
/// Returns None when nothing parseable remains.
pub fn strip_to_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Coercion rule for record fields: parse failure means 0, never a reject.
pub fn coerce_number(raw: &str) -> f64 {
    strip_to_number(raw).unwrap_or(0.0)
}

/// Renders a value the way it appears in the delimited file. Whole numbers
/// print without a decimal part.
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// Serializes records to the normalized text format: header row first, one
/// row per record, newline-joined.
pub fn render_delimited(records: &[HoldingRecord], delimiter: Delimiter) -> String {
    let sep = delimiter.as_str();
    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(OUTPUT_FIELDS.join(sep));
    for rec in records {
        rows.push(
            [
                rec.scheme_name.as_str(),
                rec.month_end.as_str(),
                rec.isin.as_str(),
                rec.instrument_name.as_str(),
                &format_number(rec.market_value),
                &format_number(rec.quantity),
                rec.bse_symbol.as_str(),
                rec.nse_symbol.as_str(),
                rec.company_name_std.as_str(),
            ]
            .join(sep),
        );
    }
    rows.join("\n")
}
