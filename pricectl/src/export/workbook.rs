use rust_xlsxwriter::Workbook;

use super::columns::{self, Cell};
use crate::errors::Result;
use crate::types::PricingOutcome;

/// Name of the single worksheet in exported workbooks.
pub const SHEET_NAME: &str = "Pricing Results";

/// Serialize outcomes into an `.xlsx` workbook with one named sheet.
pub fn to_xlsx(outcomes: &[PricingOutcome]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in columns::header().iter().enumerate() {
        sheet.write_string(0, col as u16, name)?;
    }

    for (index, outcome) in outcomes.iter().enumerate() {
        let row = (index + 1) as u32;
        for (col, cell) in columns::row(outcome).into_iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(s) => {
                    sheet.write_string(row, col, s)?;
                }
                Cell::Integer(i) => {
                    sheet.write_number(row, col, i)?;
                }
                Cell::Number(n) => {
                    sheet.write_number(row, col, n)?;
                }
                Cell::Empty => {}
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}
