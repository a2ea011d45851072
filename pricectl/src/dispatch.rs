//! Batch dispatch of normalized requests to the pricing service.
//!
//! A [`Dispatcher`] drives one upload from file to published results. It always leaves the
//! [`ResultStore`] in one of two terminal states: the full outcome list of the batch, or an
//! empty list paired with a top-level error. Either way navigation moves to the results view.
//!
//! Only one guarded submission runs at a time; a second one fails with [`Error::Busy`]. The
//! store itself has no mutual exclusion, so unguarded [`Dispatcher::dispatch`] calls that
//! overlap are last-write-wins for the results. The loading flag and status message stay set
//! until the last overlapping call returns. Cancelling a spawned submission does not interrupt the
//! service call; its late result is just not published.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::PricingClient;
use crate::errors::{Error, NO_VALID_ROWS_MESSAGE, Result};
use crate::events::EventReporter;
use crate::ingest::{self, UploadedFile};
use crate::store::ResultStore;
use crate::types::PricingRequest;

/// Status message shown while a batch is in flight.
pub const BUSY_MESSAGE: &str = "Pricing instances, please wait...";

/// Screen the pipeline wants shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Upload,
    Results,
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Outcomes for every request were published
    Priced { records: usize, errors: usize },
    /// Nothing was dispatched; the message was published as the top-level error
    InvalidInput { message: String },
    /// The service call failed; the message was published as the top-level error
    ServiceFailed { message: String },
    /// The submission was cancelled and its result dropped
    Ignored,
}

impl DispatchOutcome {
    pub fn error_message(&self) -> Option<&str> {
        match self {
            DispatchOutcome::InvalidInput { message } | DispatchOutcome::ServiceFailed { message } => Some(message.as_str()),
            _ => None,
        }
    }
}

/// Releases the busy flag when dropped.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// A submission running in the background.
pub struct DispatchHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<DispatchOutcome>,
}

impl DispatchHandle {
    /// Drop the result when it arrives. The service call itself keeps running.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub async fn join(self) -> Result<DispatchOutcome> {
        self.task
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("Dispatch task failed: {e}")))
    }
}

pub struct Dispatcher<C: PricingClient> {
    client: Arc<C>,
    store: ResultStore,
    events: EventReporter,
    busy: Arc<AtomicBool>,
    /// Service calls currently awaiting a response, guarded or not
    in_flight: AtomicUsize,
    view: watch::Sender<View>,
    status: watch::Sender<Option<String>>,
}

impl<C: PricingClient> Dispatcher<C> {
    pub fn new(client: Arc<C>, store: ResultStore) -> Self {
        let (view, _) = watch::channel(View::Upload);
        let (status, _) = watch::channel(None);
        Self {
            client,
            store,
            events: EventReporter::disabled(),
            busy: Arc::new(AtomicBool::new(false)),
            in_flight: AtomicUsize::new(0),
            view,
            status,
        }
    }

    pub fn with_events(mut self, events: EventReporter) -> Self {
        self.events = events;
        self
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Whether a guarded submission is in flight. Uploads should be disabled while true.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn status_message(&self) -> Option<String> {
        self.status.borrow().clone()
    }

    pub fn view(&self) -> View {
        *self.view.borrow()
    }

    pub fn navigate(&self, view: View) {
        self.view.send_replace(view);
    }

    fn claim(&self) -> Result<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::Busy)?;
        Ok(BusyGuard {
            flag: Arc::clone(&self.busy),
        })
    }

    /// Ingest, normalize and price one uploaded file, publishing the result.
    pub async fn submit(&self, file: UploadedFile) -> Result<DispatchOutcome> {
        let guard = self.claim()?;
        let outcome = self.process(file, &AtomicBool::new(false)).await;
        drop(guard);
        Ok(outcome)
    }

    /// Like [`submit`](Self::submit) but runs on a background task.
    pub fn spawn(self: &Arc<Self>, file: UploadedFile) -> Result<DispatchHandle>
    where
        C: 'static,
    {
        let guard = self.claim()?;
        let cancelled = Arc::new(AtomicBool::new(false));
        let this = Arc::clone(self);
        let flag = Arc::clone(&cancelled);
        let task = tokio::spawn(async move {
            let outcome = this.process(file, &flag).await;
            drop(guard);
            outcome
        });
        Ok(DispatchHandle { cancelled, task })
    }

    async fn process(&self, file: UploadedFile, cancelled: &AtomicBool) -> DispatchOutcome {
        tracing::info!(file_name = %file.name, size = file.size(), "Processing upload");
        match ingest::load_requests(&file) {
            Ok(requests) => {
                self.events.bulk_upload(1, requests.len());
                self.run_batch(&file.name, requests, cancelled).await
            }
            Err(e) => {
                let message = e.user_message();
                self.events.error("bulk_upload_invalid", &message, json!({ "file_name": file.name }));
                self.publish_failure(&file.name, message.clone());
                DispatchOutcome::InvalidInput { message }
            }
        }
    }

    /// Price already-normalized requests. Not guarded by the busy flag.
    pub async fn dispatch(&self, file_name: &str, requests: Vec<PricingRequest>) -> DispatchOutcome {
        if requests.is_empty() {
            let message = NO_VALID_ROWS_MESSAGE.to_string();
            self.publish_failure(file_name, message.clone());
            return DispatchOutcome::InvalidInput { message };
        }
        self.run_batch(file_name, requests, &AtomicBool::new(false)).await
    }

    fn publish_failure(&self, file_name: &str, message: String) {
        self.store.set_file_name(file_name);
        self.store.set_results(Vec::new(), Some(message));
        self.navigate(View::Results);
    }

    async fn run_batch(&self, file_name: &str, requests: Vec<PricingRequest>, cancelled: &AtomicBool) -> DispatchOutcome {
        let record_count = requests.len();
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.status.send_replace(Some(BUSY_MESSAGE.to_string()));
        self.store.set_loading(true);

        let started = Instant::now();
        let result = self
            .client
            .price_instances(&requests)
            .await
            .and_then(|outcomes| {
                if outcomes.len() == record_count {
                    Ok(outcomes)
                } else {
                    Err(Error::Service {
                        status: None,
                        message: format!(
                            "Pricing service returned {} results for {} instances",
                            outcomes.len(),
                            record_count
                        ),
                    })
                }
            });

        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.status.send_replace(None);
            self.store.set_loading(false);
        }

        if cancelled.load(Ordering::SeqCst) {
            tracing::info!(file_name, record_count, "Dispatch cancelled, dropping late result");
            return DispatchOutcome::Ignored;
        }

        let outcome = match result {
            Ok(outcomes) => {
                let errors = outcomes.iter().map(|o| o.errors.len()).sum();
                for outcome in &outcomes {
                    if let Some(figures) = &outcome.results {
                        let unbalanced = figures.unbalanced_partial_upfronts();
                        if unbalanced > 0 {
                            tracing::warn!(
                                instance_type = %outcome.input.instance_type,
                                region = %outcome.input.region_code,
                                unbalanced,
                                "Partial upfront totals do not match fee plus plan cost"
                            );
                        }
                    }
                }
                tracing::info!(
                    file_name,
                    record_count,
                    errors,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Batch priced"
                );
                self.store.set_file_name(file_name);
                self.store.set_results(outcomes, None);
                DispatchOutcome::Priced {
                    records: record_count,
                    errors,
                }
            }
            Err(e) => {
                let message = e.user_message();
                tracing::error!(file_name, record_count, error = %e, "Batch pricing failed");
                self.events.error(
                    "bulk_upload_failed",
                    &message,
                    json!({ "record_count": record_count }),
                );
                self.store.set_file_name(file_name);
                self.store.set_results(Vec::new(), Some(message.clone()));
                DispatchOutcome::ServiceFailed { message }
            }
        };

        self.navigate(View::Results);
        outcome
    }
}
