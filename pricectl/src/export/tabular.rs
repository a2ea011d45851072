use super::columns::{self, Cell};
use crate::errors::{Error, Result};
use crate::types::PricingOutcome;

/// Serialize outcomes as comma-separated text with a header row.
pub fn to_csv(outcomes: &[PricingOutcome]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns::header())?;
    for outcome in outcomes {
        writer.write_record(columns::row(outcome).iter().map(Cell::to_text))?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}
