//! File-acceptance gate applied before any parsing.

use super::{SelectedFile, UploadedFile};
use crate::config::UploadConfig;

/// Extensions the reader understands.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["csv", "xls", "xlsx"];

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Limits applied by [`accept_files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_file_size_mb: u64,
    pub allow_multiple: bool,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            allow_multiple: false,
        }
    }
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_file_size_mb: config.max_file_size_mb,
            allow_multiple: config.allow_multiple,
        }
    }
}

/// What the gate needs to know about a file: its name and size.
pub trait Candidate {
    fn name(&self) -> &str;
    fn size(&self) -> u64;
}

impl Candidate for UploadedFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        UploadedFile::size(self)
    }
}

impl Candidate for SelectedFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }
}

fn has_accepted_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ACCEPTED_EXTENSIONS.iter().any(|accepted| ext.eq_ignore_ascii_case(accepted)))
        .unwrap_or(false)
}

/// Split a selection into accepted files and itemized rejection messages.
///
/// A rejected file is never partially accepted. When multiple selection is disabled only the
/// first acceptable file is kept. Only names and sizes are inspected, so files on disk can be
/// checked before their content is read.
pub fn accept_files<F: Candidate>(files: Vec<F>, policy: UploadPolicy) -> (Vec<F>, Vec<String>) {
    let mut accepted = Vec::new();
    let mut errors = Vec::new();

    for file in files {
        if !has_accepted_extension(file.name()) {
            errors.push(format!(
                "{} has an unsupported file type. Accepted types: {}.",
                file.name(),
                ACCEPTED_EXTENSIONS.join(", ")
            ));
            continue;
        }
        if file.size() > policy.max_file_size_mb * BYTES_PER_MB {
            errors.push(format!(
                "{} exceeds the maximum size of {} MB.",
                file.name(),
                policy.max_file_size_mb
            ));
            continue;
        }
        accepted.push(file);
    }

    if !policy.allow_multiple && accepted.len() > 1 {
        accepted.truncate(1);
        errors.push("Only a single file can be uploaded at a time.".to_string());
    }

    if !errors.is_empty() {
        tracing::warn!(accepted = accepted.len(), rejected = errors.len(), "Upload selection had rejections");
    }

    (accepted, errors)
}
