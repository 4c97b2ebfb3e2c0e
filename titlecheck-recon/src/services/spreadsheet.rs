//! Authority response spreadsheet parsing
//!
//! Fixed 13-column layout, header row then data:
//! CustomerRef, Forename, Surname, CompanyNameSupplied, InputAddress1..5,
//! InputPostcode, AddressMatchResult, TitleNumber, NameMatchResult.
//!
//! An unreadable container (corrupt, or an encrypted message we cannot
//! decrypt) is fatal for the whole pair: no rows can be trusted.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use titlecheck_common::models::{ResponseRow, RowStatus};
use titlecheck_common::{Error, Result};

/// Expected column count per data row
const COLUMN_COUNT: usize = 13;

/// Parse raw spreadsheet bytes into ordered response rows. Blank rows and
/// rows with an empty reference are skipped.
pub fn parse_response_sheet(bytes: &[u8]) -> Result<Vec<ResponseRow>> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| Error::SpreadsheetUnreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::SpreadsheetUnreadable("workbook has no sheets".to_string()))?
        .map_err(|e| Error::SpreadsheetUnreadable(e.to_string()))?;

    let mut rows = Vec::new();
    for cells in range.rows().skip(1) {
        let values: Vec<String> = cells.iter().map(cell_to_string).collect();
        if let Some(row) = row_from_cells(&values) {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Build one response row from cell values, deriving status and match
/// classification. Returns None for blank rows and rows without a reference.
pub fn row_from_cells(cells: &[String]) -> Option<ResponseRow> {
    let cell = |index: usize| -> String {
        cells.get(index).map(|s| s.trim().to_string()).unwrap_or_default()
    };

    let reference = cell(0);
    if reference.is_empty() {
        return None;
    }

    let address_match_result = cell(10);
    let name_match_result = cell(12);
    let (status, match_type) = RowStatus::derive(&address_match_result, &name_match_result);

    Some(ResponseRow {
        reference,
        forename: cell(1),
        surname: cell(2),
        company_name: cell(3),
        address_lines: [cell(4), cell(5), cell(6), cell(7), cell(8)],
        postcode: cell(9),
        address_match_result,
        name_match_result,
        title_number: cell(11),
        status,
        match_type: match_type.to_string(),
    })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            // Reference numbers come back as floats from xls readers
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}
