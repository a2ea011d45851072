//! Upload ingestion: accepting files, reading their rows, and normalizing them into canonical
//! [`PricingRequest`](crate::types::PricingRequest)s.
//!
//! The stages run in order:
//!
//! 1. [`accept_files`] rejects unsupported or oversized files before anything is parsed.
//! 2. [`read_rows`] turns an accepted `.csv`, `.xls` or `.xlsx` file into header-keyed rows.
//! 3. [`normalize`] detects the column dialect of each row and keeps only complete requests.

pub mod dialect;
pub mod gate;
pub mod reader;

use std::path::{Path, PathBuf};

use crate::errors::{Error, NO_VALID_ROWS_MESSAGE, Result};
use crate::types::PricingRequest;

pub use dialect::{Dialect, normalize};
pub use gate::{Candidate, UploadPolicy, accept_files};
pub use reader::{FileFormat, RawRow, read_rows};

/// A file selected for upload, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// File name as selected, including its extension
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A file chosen on disk. Only its metadata is known until [`load`](Self::load) reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Final path component
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
}

impl SelectedFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let size = std::fs::metadata(path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            size,
            path: path.to_path_buf(),
        })
    }

    /// Read the file into memory.
    pub fn load(&self) -> Result<UploadedFile> {
        let bytes = std::fs::read(&self.path)?;
        Ok(UploadedFile::new(self.name.clone(), bytes))
    }
}

/// Read and normalize one accepted file.
///
/// Returns [`Error::Validation`] naming the required columns when no row survives
/// normalization; callers must not dispatch in that case.
pub fn load_requests(file: &UploadedFile) -> Result<Vec<PricingRequest>> {
    let rows = read_rows(file)?;
    let requests = normalize(&rows);
    if requests.is_empty() {
        tracing::warn!(file_name = %file.name, rows = rows.len(), "Upload yielded no valid rows");
        return Err(Error::validation(NO_VALID_ROWS_MESSAGE));
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_requests_from_csv() {
        let file = UploadedFile::new(
            "fleet.csv",
            b"region_code,instance_type,operation,operating_system,product_tenancy,qty\n\
              us-east-1,t3.micro,RunInstances,Linux,Shared,2\n\
              eu-west-1,m5.large,RunInstances:0002,Windows,,\n"
                .to_vec(),
        );

        let requests = load_requests(&file).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].qty, 2);
        assert_eq!(requests[1].product_tenancy, "Shared");
        assert_eq!(requests[1].qty, 1);
    }

    #[test]
    fn test_empty_file_names_required_columns() {
        let file = UploadedFile::new("empty.csv", Vec::new());
        let err = load_requests(&file).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(
            err.user_message()
                .contains("region_code, instance_type, operation, operating_system")
        );
    }

    #[test]
    fn test_header_only_file_has_no_valid_rows() {
        let file = UploadedFile::new("headers.csv", b"region_code,instance_type,operation,operating_system\n".to_vec());
        assert!(matches!(load_requests(&file), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_selected_file_reads_metadata_then_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let selected = SelectedFile::from_path(&path).unwrap();
        assert_eq!(selected.name, "inventory.csv");
        assert_eq!(selected.size, 8);

        let file = selected.load().unwrap();
        assert_eq!(file.name, "inventory.csv");
        assert_eq!(file.size(), 8);
    }

    #[test]
    fn test_missing_selected_file_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SelectedFile::from_path(&dir.path().join("gone.csv")).unwrap_err();
        assert!(err.user_message().starts_with("File error"));
    }

    #[test]
    fn test_load_requests_survives_non_utf8_cells() {
        let file = UploadedFile::new(
            "fleet.csv",
            b"region_code,instance_type,operation,operating_system,notes\n\
              us-east-1,t3.micro,RunInstances,Linux,Caf\xE9\n\
              eu-west-1,m5.large,RunInstances,Windows,\n"
                .to_vec(),
        );
        assert_eq!(load_requests(&file).unwrap().len(), 2);
    }
}
