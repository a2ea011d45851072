//! Export audit log.
//!
//! Every export attempt, successful or not, is recorded here newest first. The log is mirrored
//! to a [`StorageSlot`] on every mutation and hydrated from it once at startup. A missing or
//! corrupt entry starts the log empty; persistence failures are logged and never surface to
//! the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StorageSlot;

/// Output target of an export.
///
/// Serialized with the names the persisted log has always used; the descriptive names are
/// accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportKind {
    /// Delimited text file (`.csv`)
    #[serde(rename = "csv", alias = "tabular-file")]
    TabularFile,
    /// Binary spreadsheet workbook (`.xlsx`)
    #[serde(rename = "excel", alias = "spreadsheet-file")]
    SpreadsheetFile,
    /// Spreadsheet created through the remote spreadsheet service
    #[serde(rename = "google-sheets", alias = "remote-spreadsheet")]
    RemoteSpreadsheet,
}

impl ExportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportKind::TabularFile => "csv",
            ExportKind::SpreadsheetFile => "excel",
            ExportKind::RemoteSpreadsheet => "google-sheets",
        }
    }
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Success,
    Failed,
    Pending,
}

/// One audited export attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ExportKind,
    pub timestamp: DateTime<Utc>,
    pub status: ExportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub record_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An export attempt before the log assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExport {
    pub kind: ExportKind,
    pub status: ExportStatus,
    pub file_name: Option<String>,
    pub record_count: usize,
    pub spreadsheet_url: Option<String>,
    pub error: Option<String>,
}

impl NewExport {
    pub fn success(kind: ExportKind, file_name: impl Into<String>, record_count: usize) -> Self {
        Self {
            kind,
            status: ExportStatus::Success,
            file_name: Some(file_name.into()),
            record_count,
            spreadsheet_url: None,
            error: None,
        }
    }

    pub fn failed(kind: ExportKind, file_name: Option<String>, record_count: usize, error: impl Into<String>) -> Self {
        Self {
            kind,
            status: ExportStatus::Failed,
            file_name,
            record_count,
            spreadsheet_url: None,
            error: Some(error.into()),
        }
    }

    pub fn with_spreadsheet_url(mut self, url: impl Into<String>) -> Self {
        self.spreadsheet_url = Some(url.into());
        self
    }
}

/// Partial update applied by [`ExportHistory::update_export`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportPatch {
    pub status: Option<ExportStatus>,
    pub file_name: Option<String>,
    pub record_count: Option<usize>,
    pub spreadsheet_url: Option<String>,
    pub error: Option<String>,
}

impl ExportPatch {
    fn apply(self, record: &mut ExportRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(file_name) = self.file_name {
            record.file_name = Some(file_name);
        }
        if let Some(record_count) = self.record_count {
            record.record_count = record_count;
        }
        if let Some(url) = self.spreadsheet_url {
            record.spreadsheet_url = Some(url);
        }
        if let Some(error) = self.error {
            record.error = Some(error);
        }
    }
}

/// Append-only, persisted log of export attempts (newest first).
#[derive(Clone)]
pub struct ExportHistory {
    records: Arc<RwLock<Vec<ExportRecord>>>,
    slot: Arc<dyn StorageSlot>,
}

impl ExportHistory {
    /// Load the log from `slot`, starting empty if the entry is missing or malformed.
    pub fn hydrate(slot: Arc<dyn StorageSlot>) -> Self {
        let records = match slot.read() {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ExportRecord>>(&raw) {
                Ok(records) => {
                    tracing::debug!(count = records.len(), "Hydrated export history");
                    records
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stored export history is malformed, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load export history, starting empty");
                Vec::new()
            }
        };

        Self {
            records: Arc::new(RwLock::new(records)),
            slot,
        }
    }

    /// Record an export attempt, assigning a fresh id and the current time.
    pub fn add_export(&self, export: NewExport) -> ExportRecord {
        let record = ExportRecord {
            id: Uuid::new_v4(),
            kind: export.kind,
            timestamp: Utc::now(),
            status: export.status,
            file_name: export.file_name,
            record_count: export.record_count,
            spreadsheet_url: export.spreadsheet_url,
            error: export.error,
        };

        tracing::info!(
            export_id = %record.id,
            export_type = %record.kind,
            status = ?record.status,
            record_count = record.record_count,
            "Recorded export attempt"
        );

        let mut records = self.records.write();
        records.insert(0, record.clone());
        self.persist(&records);
        record
    }

    /// Patch the record with `id`. Returns false if no such record exists.
    ///
    /// Only meant for completing an attempt that was recorded as pending.
    pub fn update_export(&self, id: Uuid, patch: ExportPatch) -> bool {
        let mut records = self.records.write();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        patch.apply(record);
        self.persist(&records);
        true
    }

    /// Empty the log, persisting the empty state.
    pub fn clear_history(&self) {
        let mut records = self.records.write();
        records.clear();
        self.persist(&records);
        tracing::info!("Cleared export history");
    }

    /// Snapshot of the log, newest first.
    pub fn history(&self) -> Vec<ExportRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn persist(&self, records: &[ExportRecord]) {
        let serialized = match serde_json::to_string(records) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize export history");
                return;
            }
        };
        if let Err(e) = self.slot.write(&serialized) {
            tracing::warn!(error = %e, "Failed to save export history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileSlot, MemorySlot};

    fn memory_history() -> (ExportHistory, MemorySlot) {
        let slot = MemorySlot::new();
        (ExportHistory::hydrate(Arc::new(slot.clone())), slot)
    }

    #[test]
    fn test_add_export_prepends_and_persists() {
        let (history, slot) = memory_history();

        let first = history.add_export(NewExport::success(ExportKind::TabularFile, "a-export.csv", 3));
        let second = history.add_export(NewExport::failed(
            ExportKind::RemoteSpreadsheet,
            Some("a-export".to_string()),
            3,
            "boom",
        ));

        assert_ne!(first.id, second.id);
        let records = history.history();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, second.id);
        assert_eq!(records[1].id, first.id);

        let stored: Vec<ExportRecord> = serde_json::from_str(&slot.peek().unwrap()).unwrap();
        assert_eq!(stored, records);
    }

    #[test]
    fn test_persisted_shape_uses_camel_case_and_legacy_type_names() {
        let (history, slot) = memory_history();
        history.add_export(NewExport::success(ExportKind::SpreadsheetFile, "x.xlsx", 1));

        let raw: serde_json::Value = serde_json::from_str(&slot.peek().unwrap()).unwrap();
        let entry = &raw[0];
        assert_eq!(entry["type"], "excel");
        assert_eq!(entry["status"], "success");
        assert_eq!(entry["fileName"], "x.xlsx");
        assert_eq!(entry["recordCount"], 1);
        assert!(entry.get("spreadsheetUrl").is_none());
    }

    #[test]
    fn test_descriptive_type_names_are_accepted() {
        let raw = r#"[{"id":"5f0c6a43-3f3a-4c39-9a4c-4ab7f5d5a1a1","type":"remote-spreadsheet","timestamp":"2025-01-01T00:00:00Z","status":"pending","recordCount":4}]"#;
        let history = ExportHistory::hydrate(Arc::new(MemorySlot::with_value(raw)));
        let records = history.history();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ExportKind::RemoteSpreadsheet);
        assert_eq!(records[0].status, ExportStatus::Pending);
    }

    #[test]
    fn test_update_export_applies_patch() {
        let (history, slot) = memory_history();
        let pending = history.add_export(NewExport {
            kind: ExportKind::RemoteSpreadsheet,
            status: ExportStatus::Pending,
            file_name: Some("sheet".to_string()),
            record_count: 2,
            spreadsheet_url: None,
            error: None,
        });

        let updated = history.update_export(
            pending.id,
            ExportPatch {
                status: Some(ExportStatus::Success),
                spreadsheet_url: Some("https://docs.example.com/s/1".to_string()),
                ..Default::default()
            },
        );
        assert!(updated);

        let record = &history.history()[0];
        assert_eq!(record.status, ExportStatus::Success);
        assert_eq!(record.spreadsheet_url.as_deref(), Some("https://docs.example.com/s/1"));
        assert_eq!(record.file_name.as_deref(), Some("sheet"));
        assert!(slot.peek().unwrap().contains("https://docs.example.com/s/1"));

        assert!(!history.update_export(Uuid::new_v4(), ExportPatch::default()));
    }

    #[test]
    fn test_clear_history_persists_empty_state() {
        let (history, slot) = memory_history();
        history.add_export(NewExport::success(ExportKind::TabularFile, "a.csv", 1));
        history.clear_history();

        assert!(history.is_empty());
        assert_eq!(slot.peek().as_deref(), Some("[]"));
    }

    #[test]
    fn test_corrupt_storage_hydrates_empty() {
        let history = ExportHistory::hydrate(Arc::new(MemorySlot::with_value("{not json")));
        assert!(history.is_empty());

        let wrong_shape = ExportHistory::hydrate(Arc::new(MemorySlot::with_value(r#"{"history": []}"#)));
        assert!(wrong_shape.is_empty());
    }

    #[test]
    fn test_history_survives_reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export-history.json");

        let history = ExportHistory::hydrate(Arc::new(FileSlot::new(&path)));
        history.add_export(NewExport::success(ExportKind::TabularFile, "one.csv", 5));
        history.add_export(NewExport::success(ExportKind::SpreadsheetFile, "two.xlsx", 5));

        let reloaded = ExportHistory::hydrate(Arc::new(FileSlot::new(&path)));
        let records = reloaded.history();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_name.as_deref(), Some("two.xlsx"));
        assert_eq!(records[1].file_name.as_deref(), Some("one.csv"));
    }
}
