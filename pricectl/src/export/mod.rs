//! Export engine.
//!
//! Serializes a snapshot of the result store into a delimited file, an `.xlsx` workbook, or a
//! remote spreadsheet. Every call to [`ExportEngine::export`] appends exactly one record to the
//! [`ExportHistory`], whether the export succeeded or failed. Exports always contain the full
//! batch; view filters do not apply.

pub mod columns;
pub mod remote;
pub mod tabular;
pub mod workbook;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde_json::json;

use crate::auth::AuthSession;
use crate::client::PricingClient;
use crate::errors::Result;
use crate::events::EventReporter;
use crate::history::{ExportHistory, ExportKind, ExportRecord, NewExport};
use crate::store::BatchResultSet;

pub use remote::AUTHENTICATION_REQUIRED;

/// Recorded when an export is requested with nothing to export.
pub const NO_RESULTS_MESSAGE: &str = "No results to export";

/// `{base}-export-{YYMMDD-HHMMSS}`, where `base` is the upload name without its extension,
/// or `pricing` when there is none.
pub fn export_file_stem(file_name: &str, now: DateTime<Local>) -> String {
    let base = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "pricing".to_string());
    format!("{base}-export-{}", now.format("%y%m%d-%H%M%S"))
}

impl ExportKind {
    /// Extension of the downloaded file, if the kind produces one.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            ExportKind::TabularFile => Some("csv"),
            ExportKind::SpreadsheetFile => Some("xlsx"),
            ExportKind::RemoteSpreadsheet => None,
        }
    }
}

/// Destination of file exports.
pub trait DownloadSink: Send + Sync {
    /// Store `bytes` under `file_name`, returning where they went.
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes downloads into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Hands a created spreadsheet's URL to the user.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Opener for headless use: announces the URL in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOpener;

impl UrlOpener for LogOpener {
    fn open(&self, url: &str) -> Result<()> {
        tracing::info!(url, "Spreadsheet available");
        Ok(())
    }
}

pub struct ExportEngine<C: PricingClient> {
    client: Arc<C>,
    history: ExportHistory,
    downloads: Arc<dyn DownloadSink>,
    opener: Arc<dyn UrlOpener>,
    events: EventReporter,
    open_spreadsheet: bool,
}

impl<C: PricingClient> ExportEngine<C> {
    pub fn new(client: Arc<C>, history: ExportHistory, downloads: Arc<dyn DownloadSink>) -> Self {
        Self {
            client,
            history,
            downloads,
            opener: Arc::new(LogOpener),
            events: EventReporter::disabled(),
            open_spreadsheet: true,
        }
    }

    pub fn with_opener(mut self, opener: Arc<dyn UrlOpener>, open_spreadsheet: bool) -> Self {
        self.opener = opener;
        self.open_spreadsheet = open_spreadsheet;
        self
    }

    pub fn with_events(mut self, events: EventReporter) -> Self {
        self.events = events;
        self
    }

    pub fn history(&self) -> &ExportHistory {
        &self.history
    }

    /// Export `batch` and record the attempt.
    pub async fn export(&self, kind: ExportKind, batch: &BatchResultSet, session: &AuthSession) -> ExportRecord {
        self.export_at(kind, batch, session, Local::now()).await
    }

    /// [`export`](Self::export) with an explicit timestamp for the file name.
    pub async fn export_at(
        &self,
        kind: ExportKind,
        batch: &BatchResultSet,
        session: &AuthSession,
        now: DateTime<Local>,
    ) -> ExportRecord {
        let record_count = batch.results.len();
        let stem = export_file_stem(&batch.file_name, now);
        let file_name = match kind.extension() {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.clone(),
        };

        let attempt = if record_count == 0 {
            Err(NO_RESULTS_MESSAGE.to_string())
        } else {
            self.run(kind, batch, session, &file_name)
                .await
                .map_err(|e| e.user_message())
        };

        let entry = match attempt {
            Ok(spreadsheet_url) => {
                self.events.export(kind, record_count);
                let entry = NewExport::success(kind, file_name, record_count);
                match spreadsheet_url {
                    Some(url) => entry.with_spreadsheet_url(url),
                    None => entry,
                }
            }
            Err(message) => {
                tracing::error!(export_type = %kind, record_count, error = %message, "Export failed");
                self.events.error(
                    &format!("{}_export_failed", kind.as_str().replace('-', "_")),
                    &message,
                    json!({ "export_type": kind.as_str() }),
                );
                NewExport::failed(kind, Some(file_name), record_count, message)
            }
        };

        self.history.add_export(entry)
    }

    /// Perform the export, returning the remote spreadsheet URL when there is one.
    async fn run(
        &self,
        kind: ExportKind,
        batch: &BatchResultSet,
        session: &AuthSession,
        file_name: &str,
    ) -> Result<Option<String>> {
        match kind {
            ExportKind::TabularFile => {
                let bytes = tabular::to_csv(&batch.results)?;
                let path = self.downloads.save(file_name, &bytes)?;
                tracing::info!(path = %path.display(), records = batch.results.len(), "Wrote CSV export");
                Ok(None)
            }
            ExportKind::SpreadsheetFile => {
                let bytes = workbook::to_xlsx(&batch.results)?;
                let path = self.downloads.save(file_name, &bytes)?;
                tracing::info!(path = %path.display(), records = batch.results.len(), "Wrote workbook export");
                Ok(None)
            }
            ExportKind::RemoteSpreadsheet => {
                let export = remote::export_remote(self.client.as_ref(), &batch.results, session, file_name).await?;
                if self.open_spreadsheet
                    && let Err(e) = self.opener.open(&export.spreadsheet_url)
                {
                    tracing::warn!(url = %export.spreadsheet_url, error = %e, "Failed to open spreadsheet");
                }
                Ok(Some(export.spreadsheet_url))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthUser, OAuthTokens};
    use crate::client::{MockPricingClient, SpreadsheetExport};
    use crate::errors::Error;
    use crate::history::ExportStatus;
    use crate::storage::MemorySlot;
    use crate::types::{PricingFigures, PricingOutcome, PricingRequest};
    use chrono::TimeZone;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingOpener {
        urls: Mutex<Vec<String>>,
    }

    impl UrlOpener for RecordingOpener {
        fn open(&self, url: &str) -> Result<()> {
            self.urls.lock().push(url.to_string());
            Ok(())
        }
    }

    fn batch() -> BatchResultSet {
        BatchResultSet {
            results: vec![
                PricingOutcome {
                    input: PricingRequest::new("us-east-1", "t3.micro", "RunInstances", "Linux"),
                    results: Some(PricingFigures {
                        on_demand_hourly_rate: 0.0104,
                        ..Default::default()
                    }),
                    errors: vec![],
                },
                PricingOutcome {
                    input: PricingRequest::new("eu-west-1", "m5.large", "RunInstances:0002", "Windows"),
                    results: None,
                    errors: vec!["not found".to_string()],
                },
            ],
            file_name: "fleet.csv".to_string(),
            loading: false,
            error: None,
        }
    }

    fn session() -> AuthSession {
        AuthSession::authenticated(
            AuthUser {
                id: "1".to_string(),
                email: "ops@example.com".to_string(),
                display_name: None,
                photo_url: None,
                domain: None,
            },
            OAuthTokens {
                access_token: "ya29.token".to_string(),
                expires_at: i64::MAX,
                refresh_token: None,
                scope: None,
                token_type: None,
            },
        )
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 2).unwrap()
    }

    struct Harness {
        engine: ExportEngine<MockPricingClient>,
        mock: MockPricingClient,
        opener: Arc<RecordingOpener>,
        dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let mock = MockPricingClient::new();
        let dir = tempfile::tempdir().unwrap();
        let opener = Arc::new(RecordingOpener::default());
        let engine = ExportEngine::new(
            Arc::new(mock.clone()),
            ExportHistory::hydrate(Arc::new(MemorySlot::new())),
            Arc::new(DirectorySink::new(dir.path())),
        )
        .with_opener(opener.clone(), true);
        Harness {
            engine,
            mock,
            opener,
            dir,
        }
    }

    #[test]
    fn test_file_stem_convention() {
        assert_eq!(export_file_stem("fleet.csv", fixed_now()), "fleet-export-250307-090502");
        assert_eq!(export_file_stem("inventory.v2.xlsx", fixed_now()), "inventory.v2-export-250307-090502");
        assert_eq!(export_file_stem("", fixed_now()), "pricing-export-250307-090502");
    }

    #[tokio::test]
    async fn test_csv_export_writes_file_and_records_success() {
        let h = harness();
        let record = h
            .engine
            .export_at(ExportKind::TabularFile, &batch(), &AuthSession::unauthenticated(), fixed_now())
            .await;

        assert_eq!(record.status, ExportStatus::Success);
        assert_eq!(record.kind, ExportKind::TabularFile);
        assert_eq!(record.record_count, 2);
        assert_eq!(record.file_name.as_deref(), Some("fleet-export-250307-090502.csv"));

        let written = std::fs::read_to_string(h.dir.path().join("fleet-export-250307-090502.csv")).unwrap();
        assert_eq!(written.lines().count(), 3);
        assert_eq!(h.engine.history().len(), 1);
        assert_eq!(h.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_xlsx_export_writes_workbook() {
        let h = harness();
        let record = h
            .engine
            .export_at(ExportKind::SpreadsheetFile, &batch(), &AuthSession::unauthenticated(), fixed_now())
            .await;

        assert_eq!(record.status, ExportStatus::Success);
        let path = h.dir.path().join("fleet-export-250307-090502.xlsx");
        assert!(std::fs::metadata(path).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_remote_export_records_url_and_opens_it() {
        let h = harness();
        h.mock.add_export_response(Ok(SpreadsheetExport {
            spreadsheet_id: "abc".to_string(),
            spreadsheet_url: "https://docs.google.com/spreadsheets/d/abc".to_string(),
            status: "success".to_string(),
        }));

        let record = h
            .engine
            .export_at(ExportKind::RemoteSpreadsheet, &batch(), &session(), fixed_now())
            .await;

        assert_eq!(record.status, ExportStatus::Success);
        assert_eq!(record.file_name.as_deref(), Some("fleet-export-250307-090502"));
        assert_eq!(
            record.spreadsheet_url.as_deref(),
            Some("https://docs.google.com/spreadsheets/d/abc")
        );
        assert_eq!(
            *h.opener.urls.lock(),
            vec!["https://docs.google.com/spreadsheets/d/abc".to_string()]
        );
        assert_eq!(h.mock.get_calls()[0].body["pricing_results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unauthenticated_remote_export_is_audited_without_calls() {
        let h = harness();
        let record = h
            .engine
            .export(ExportKind::RemoteSpreadsheet, &batch(), &AuthSession::unauthenticated())
            .await;

        assert_eq!(record.status, ExportStatus::Failed);
        assert_eq!(record.error.as_deref(), Some(AUTHENTICATION_REQUIRED));
        assert_eq!(h.mock.call_count(), 0);
        assert!(
            h.engine
                .history()
                .history()
                .iter()
                .all(|r| r.status != ExportStatus::Success)
        );
        assert!(h.opener.urls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_audited() {
        let h = harness();
        h.mock.add_export_response(Err(Error::Service {
            status: Some(500),
            message: "Export failed: quota exceeded".to_string(),
        }));

        let record = h
            .engine
            .export(ExportKind::RemoteSpreadsheet, &batch(), &session())
            .await;

        assert_eq!(record.status, ExportStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("Export failed: quota exceeded"));
        assert_eq!(record.spreadsheet_url, None);
    }

    #[tokio::test]
    async fn test_every_export_appends_exactly_one_record() {
        let h = harness();
        let empty = BatchResultSet::default();

        h.engine.export(ExportKind::TabularFile, &batch(), &session()).await;
        h.engine.export(ExportKind::TabularFile, &empty, &session()).await;
        h.engine.export(ExportKind::RemoteSpreadsheet, &batch(), &AuthSession::unauthenticated()).await;

        let history = h.engine.history().history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].status, ExportStatus::Failed);
        assert_eq!(history[1].error.as_deref(), Some(NO_RESULTS_MESSAGE));
        assert_eq!(history[1].record_count, 0);
    }

    #[tokio::test]
    async fn test_unwritable_output_is_audited() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let engine = ExportEngine::new(
            Arc::new(MockPricingClient::new()),
            ExportHistory::hydrate(Arc::new(MemorySlot::new())),
            Arc::new(DirectorySink::new(&blocker)),
        );
        let record = engine.export(ExportKind::TabularFile, &batch(), &session()).await;
        assert_eq!(record.status, ExportStatus::Failed);
        assert!(record.error.unwrap().starts_with("File error"));
    }
}
