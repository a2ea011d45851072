//! Fire-and-forget usage events.
//!
//! Events are posted to the pricing service's telemetry endpoint from a background task.
//! Reporting never blocks the pipeline and a failed report is only logged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::PricingClient;
use crate::history::ExportKind;

/// One usage event as sent to the telemetry endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub event_type: String,
    pub event_data: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub session_id: String,
}

impl UsageEvent {
    pub fn new(event_type: impl Into<String>, event_data: Value, session_id: String) -> Self {
        Self {
            event_type: event_type.into(),
            event_data,
            timestamp: Utc::now(),
            user_id: None,
            session_id,
        }
    }
}

/// Session identifier of the form `session_<epoch ms>_<random>`.
pub fn new_session_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// Sends usage events in the background, or drops them when disabled.
#[derive(Clone)]
pub struct EventReporter {
    sink: Option<Arc<dyn PricingClient>>,
    session_id: String,
    user_id: Option<String>,
}

impl EventReporter {
    pub fn new(sink: Arc<dyn PricingClient>) -> Self {
        Self {
            sink: Some(sink),
            session_id: new_session_id(),
            user_id: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            sink: None,
            session_id: new_session_id(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Report an event. Returns the spawned task, if one was started.
    ///
    /// Nothing is sent when reporting is disabled or no Tokio runtime is running.
    pub fn track(&self, event_type: &str, event_data: Value) -> Option<tokio::task::JoinHandle<()>> {
        let sink = self.sink.clone()?;
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!(event_type, "No runtime available, dropping usage event");
                return None;
            }
        };

        let mut event = UsageEvent::new(event_type, event_data, self.session_id.clone());
        event.user_id = self.user_id.clone();

        Some(handle.spawn(async move {
            if let Err(e) = sink.send_event(&event).await {
                tracing::warn!(event_type = %event.event_type, error = %e, "Failed to send usage event");
            }
        }))
    }

    pub fn bulk_upload(&self, file_count: usize, total_records: usize) -> Option<tokio::task::JoinHandle<()>> {
        self.track(
            "bulk_upload",
            json!({ "file_count": file_count, "total_records": total_records }),
        )
    }

    pub fn export(&self, kind: ExportKind, record_count: usize) -> Option<tokio::task::JoinHandle<()>> {
        self.track(
            "export",
            json!({ "export_type": kind.as_str(), "record_count": record_count }),
        )
    }

    /// Report an error, merging `context` object fields into the event data.
    pub fn error(&self, error_type: &str, error_message: &str, context: Value) -> Option<tokio::task::JoinHandle<()>> {
        let mut data = json!({ "error_type": error_type, "error_message": error_message });
        if let (Some(data), Value::Object(context)) = (data.as_object_mut(), context) {
            data.extend(context);
        }
        self.track("error", data)
    }
}
