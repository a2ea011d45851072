//! Reads uploaded files into header-keyed rows.

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use super::UploadedFile;
use crate::errors::{Error, Result};

/// Supported upload formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xls,
    Xlsx,
}

impl FileFormat {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "xls" => Some(FileFormat::Xls),
            "xlsx" => Some(FileFormat::Xlsx),
            _ => None,
        }
    }
}

/// One data row as `(header, value)` pairs in column order.
///
/// Rows shorter than the header row only carry the headers they have values for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(cells: Vec<(String, String)>) -> Self {
        Self { cells }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            cells: pairs.into_iter().map(|(h, v)| (h.to_string(), v.to_string())).collect(),
        }
    }

    /// Value under `header`, if that header is present in this row.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.iter().find(|(h, _)| h == header).map(|(_, v)| v.as_str())
    }

    /// Value of the last column of the row.
    pub fn last_value(&self) -> Option<&str> {
        self.cells.last().map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(h, _)| h.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

/// Parse an uploaded file into rows keyed by its first row.
pub fn read_rows(file: &UploadedFile) -> Result<Vec<RawRow>> {
    let format = FileFormat::from_file_name(&file.name).ok_or_else(|| {
        Error::validation(format!(
            "{} has an unsupported file type. Accepted types: csv, xls, xlsx.",
            file.name
        ))
    })?;

    let rows = match format {
        FileFormat::Csv => read_csv(&file.bytes)?,
        FileFormat::Xls | FileFormat::Xlsx => read_workbook(&file.bytes)?,
    };

    tracing::debug!(file_name = %file.name, ?format, rows = rows.len(), "Read upload rows");
    Ok(rows)
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

fn zip_row(headers: &[String], values: impl IntoIterator<Item = String>) -> RawRow {
    RawRow::new(headers.iter().cloned().zip(values).collect())
}

fn read_csv(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| clean_header(&String::from_utf8_lossy(h)))
        .collect();
    if headers.iter().all(String::is_empty) {
        return Ok(Vec::new());
    }

    // Fields are decoded lossily; a stray non-UTF-8 byte only affects its own cell.
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let row = zip_row(&headers, record.iter().map(|v| String::from_utf8_lossy(v).into_owned()));
        if !row.is_blank() {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn read_workbook(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row.iter().map(|c| clean_header(&cell_to_string(c))).collect();

    Ok(sheet_rows
        .map(|cells| zip_row(&headers, cells.iter().map(cell_to_string)))
        .filter(|row| !row.is_blank())
        .collect())
}
