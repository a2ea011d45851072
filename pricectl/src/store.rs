//! Shared result state.
//!
//! [`ResultStore`] owns the last batch and the current view filter. Both values are replaced
//! wholesale and change notification is delivered over `tokio::sync::watch` channels, so any
//! number of observers can follow the store without polling it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::filter::{ResultFilter, ResultView, apply};
use crate::types::PricingOutcome;

/// Contents of the result store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResultSet {
    pub results: Vec<PricingOutcome>,
    /// Name of the originating upload, empty for manually entered data
    pub file_name: String,
    pub loading: bool,
    /// Whole-batch failure; supersedes the per-row view when set
    pub error: Option<String>,
}

/// What a consumer of the store should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Error,
    Loading,
    /// Nothing priced yet
    Welcome,
    Results,
}

impl BatchResultSet {
    pub fn status(&self) -> ResultStatus {
        if self.error.is_some() {
            ResultStatus::Error
        } else if self.loading {
            ResultStatus::Loading
        } else if self.results.is_empty() {
            ResultStatus::Welcome
        } else {
            ResultStatus::Results
        }
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            instances: self.results.len(),
            errors: self.results.iter().map(|r| r.errors.len()).sum(),
        }
    }
}

/// Instance and error counts over a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSummary {
    pub instances: usize,
    pub errors: usize,
}

impl fmt::Display for ResultSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        write!(
            f,
            "{} instance{} priced, with {} error{}.",
            self.instances,
            plural(self.instances),
            self.errors,
            plural(self.errors)
        )
    }
}

/// A consistent copy of the store taken at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub batch: BatchResultSet,
    pub filter: ResultFilter,
}

impl StoreSnapshot {
    pub fn filtered(&self) -> Vec<ResultView<'_>> {
        apply(&self.filter, &self.batch.results)
    }

    pub fn summary(&self) -> ResultSummary {
        self.batch.summary()
    }
}

/// Process-wide result state, cheap to clone and share between pipeline stages.
#[derive(Clone)]
pub struct ResultStore {
    batch: Arc<watch::Sender<BatchResultSet>>,
    filter: Arc<watch::Sender<ResultFilter>>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        let (batch, _) = watch::channel(BatchResultSet::default());
        let (filter, _) = watch::channel(ResultFilter::default());
        Self {
            batch: Arc::new(batch),
            filter: Arc::new(filter),
        }
    }

    pub fn batch(&self) -> BatchResultSet {
        self.batch.borrow().clone()
    }

    pub fn filter(&self) -> ResultFilter {
        self.filter.borrow().clone()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            batch: self.batch(),
            filter: self.filter(),
        }
    }

    /// Replace the results and top-level error, keeping the file name and loading flag.
    pub fn set_results(&self, results: Vec<PricingOutcome>, error: Option<String>) {
        self.batch.send_modify(|batch| {
            batch.results = results;
            batch.error = error;
        });
    }

    pub fn set_file_name(&self, file_name: impl Into<String>) {
        let file_name = file_name.into();
        self.batch.send_modify(|batch| batch.file_name = file_name);
    }

    pub fn set_loading(&self, loading: bool) {
        self.batch.send_if_modified(|batch| {
            let changed = batch.loading != loading;
            batch.loading = loading;
            changed
        });
    }

    /// Return to the welcome state.
    pub fn clear(&self) {
        self.set_results(Vec::new(), None);
    }

    pub fn set_filter(&self, filter: ResultFilter) {
        self.filter.send_replace(filter);
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchResultSet> {
        self.batch.subscribe()
    }

    pub fn subscribe_filter(&self) -> watch::Receiver<ResultFilter> {
        self.filter.subscribe()
    }
}
