use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Exchange identifiers and the standardized company name for one ISIN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolInfo {
    pub std_company_name: String,
    pub bse_symbol: String,
    pub nse_symbol: String,
}

/// Static ISIN -> symbol reference data, loaded once per run and shared
/// read-only with the normalizer.
///
/// The source asset is a CSV with columns
/// `[companyName, isin, bseSymbol, nseSymbol]` and a header row. Rows with
/// fewer than 4 fields are skipped silently; an empty map is a valid
/// degraded state when the asset cannot be read at all.
#[derive(Debug, Default)]
pub struct SymbolMap {
    entries: HashMap<String, SymbolInfo>,
}

impl SymbolMap {
    pub fn load_csv_file<P: AsRef<Path>>(path: P) -> Result<Self, MapLoadError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, MapLoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut entries = HashMap::new();
        for result in csv_reader.records() {
            let record = result?;
            if record.len() < 4 {
                continue;
            }

            let isin = record[1].trim().to_string();
            if isin.is_empty() {
                continue;
            }

            entries.insert(
                isin,
                SymbolInfo {
                    std_company_name: clean_field(&record[0], " "),
                    bse_symbol: clean_field(&record[2], ""),
                    nse_symbol: clean_field(&record[3], ""),
                },
            );
        }

        Ok(Self { entries })
    }

    pub fn lookup(&self, isin: &str) -> Option<&SymbolInfo> {
        self.entries.get(isin)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Trims the field and collapses embedded line breaks, which show up in
/// hand-maintained mapping files. Company names keep a space where the
/// break was; symbols drop it entirely.
fn clean_field(raw: &str, line_break_replacement: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.contains('\n') && !trimmed.contains('\r') {
        return trimmed.to_string();
    }
    let mut out = String::with_capacity(trimmed.len());
    let mut in_break = false;
    for c in trimmed.chars() {
        if c == '\r' || c == '\n' {
            if !in_break {
                out.push_str(line_break_replacement);
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Company Name,ISIN,BSE Symbol,NSE Symbol
HDFC BANK,INE040A01034,500180,HDFCBANK
RELIANCE INDUSTRIES,INE002A01018,500325,RELIANCE
short row,INE999X99999
TATA CONSULTANCY SERVICES,INE467B01029,532540,TCS
";

    #[test]
    fn test_loads_and_looks_up() {
        let map = SymbolMap::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(map.len(), 3);

        let info = map.lookup("INE040A01034").unwrap();
        assert_eq!(info.std_company_name, "HDFC BANK");
        assert_eq!(info.bse_symbol, "500180");
        assert_eq!(info.nse_symbol, "HDFCBANK");

        assert!(map.lookup("INE999Z99999").is_none());
    }

    #[test]
    fn test_short_rows_skipped_silently() {
        let map = SymbolMap::from_reader(SAMPLE.as_bytes()).unwrap();
        // The 2-field row must not create an entry.
        assert!(map.lookup("INE999X99999").is_none());
    }

    #[test]
    fn test_embedded_line_breaks_cleaned() {
        let csv = "Company Name,ISIN,BSE Symbol,NSE Symbol\n\"SPLIT\nNAME\",INE123A01016,\"51\n23\",SPLITCO\n";
        let map = SymbolMap::from_reader(csv.as_bytes()).unwrap();
        let info = map.lookup("INE123A01016").unwrap();
        assert_eq!(info.std_company_name, "SPLIT NAME");
        assert_eq!(info.bse_symbol, "5123");
    }

    #[test]
    fn test_empty_input_gives_empty_map() {
        let map = SymbolMap::from_reader("".as_bytes()).unwrap();
        assert!(map.is_empty());
    }
}
