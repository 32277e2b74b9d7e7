use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::{Cell, ExtractError};

/// Number of leading rows handed to the schema-inference collaborator.
pub const DEFAULT_PREVIEW_ROWS: usize = 15;

/// A worksheet converted to the tagged cell representation, together with
/// the actual sheet name as spelled in the workbook.
#[derive(Debug)]
pub struct LoadedSheet {
    pub sheet_name: String,
    pub rows: Vec<Vec<Cell>>,
}

/// Opens a workbook (format auto-detected) and loads one sheet, matched
/// case-insensitively against the requested name. The first sheet in
/// workbook order wins when several names differ only by case.
pub fn load_sheet(path: &Path, sheet_name: &str) -> Result<LoadedSheet, ExtractError> {
    let mut workbook = open_workbook_auto(path)?;

    let requested = sheet_name.to_lowercase();
    let actual_name = workbook
        .sheet_names()
        .iter()
        .find(|name| name.to_lowercase() == requested)
        .cloned()
        .ok_or_else(|| ExtractError::SheetNotFound(sheet_name.to_string()))?;

    let range = workbook.worksheet_range(&actual_name)?;
    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();

    Ok(LoadedSheet {
        sheet_name: actual_name,
        rows,
    })
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

/// The leading slice of the sheet used for schema inference.
pub fn initial_rows(rows: &[Vec<Cell>], limit: usize) -> &[Vec<Cell>] {
    &rows[..rows.len().min(limit)]
}

/// Renders preview rows as the prompt format the inference collaborator
/// expects: a column-letter header, then one numbered line per row with
/// cells separated by ' | '.
pub fn rows_preview(rows: &[Vec<Cell>]) -> String {
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0).min(26);

    let letters: Vec<String> = (0..width)
        .map(|i| ((b'A' + i as u8) as char).to_string())
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format!("   {}", letters.join(" | ")));
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..width)
            .map(|c| row.get(c).map(Cell::display).unwrap_or_default())
            .collect();
        lines.push(format!("{}: {}", i + 1, cells.join(" | ")));
    }
    lines.join("\n")
}
