use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use super::{PricingClient, SpreadsheetExport, endpoints};
use crate::errors::{Error, Result};
use crate::events::UsageEvent;
use crate::types::{PricingOutcome, PricingRequest};

/// Mock pricing client for tests.
///
/// Responses are queued per endpoint path and returned in FIFO order. Every call is recorded,
/// including ones with no queued response, which fail.
///
/// # Example
/// ```ignore
/// let mock = MockPricingClient::new();
/// mock.add_batch_response(Ok(vec![outcome]));
/// let outcomes = mock.price_instances(&requests).await?;
/// assert_eq!(mock.call_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MockPricingClient {
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<serde_json::Value>>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    delay: Option<Duration>,
}

/// Record of a call made to the mock client.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub path: String,
    pub body: serde_json::Value,
    pub access_token: Option<String>,
}

impl MockPricingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, to hold a call in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a raw response for an endpoint path.
    pub fn add_response(&self, path: &str, response: Result<serde_json::Value>) {
        self.responses
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn add_batch_response(&self, response: Result<Vec<PricingOutcome>>) {
        self.add_response(endpoints::PRICE_INSTANCES, response.and_then(|r| Ok(serde_json::to_value(r)?)));
    }

    pub fn add_single_response(&self, response: Result<PricingOutcome>) {
        self.add_response(endpoints::PRICE_INSTANCE, response.and_then(|r| Ok(serde_json::to_value(r)?)));
    }

    pub fn add_export_response(&self, response: Result<SpreadsheetExport>) {
        self.add_response(endpoints::EXPORT_SPREADSHEET, response.and_then(|r| Ok(serde_json::to_value(r)?)));
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Calls made to one endpoint path.
    pub fn calls_to(&self, path: &str) -> Vec<MockCall> {
        self.calls.lock().iter().filter(|c| c.path == path).cloned().collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn respond<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        access_token: Option<&str>,
    ) -> Result<T> {
        self.calls.lock().push(MockCall {
            path: path.to_string(),
            body,
            access_token: access_token.map(str::to_string),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.lock().get_mut(path).and_then(VecDeque::pop_front);
        match response {
            Some(Ok(value)) => Ok(serde_json::from_value(value)?),
            Some(Err(e)) => Err(e),
            None => Err(Error::Other(anyhow::anyhow!("No mock response configured for {path}"))),
        }
    }
}

#[async_trait]
impl PricingClient for MockPricingClient {
    async fn price_instances(&self, requests: &[PricingRequest]) -> Result<Vec<PricingOutcome>> {
        self.respond(endpoints::PRICE_INSTANCES, serde_json::to_value(requests)?, None)
            .await
    }

    async fn price_instance(&self, request: &PricingRequest) -> Result<PricingOutcome> {
        self.respond(endpoints::PRICE_INSTANCE, serde_json::to_value(request)?, None)
            .await
    }

    async fn export_to_spreadsheet(
        &self,
        outcomes: &[PricingOutcome],
        access_token: &str,
        title: Option<&str>,
    ) -> Result<SpreadsheetExport> {
        let body = serde_json::json!({
            "pricing_results": outcomes,
            "spreadsheet_title": title,
        });
        self.respond(endpoints::EXPORT_SPREADSHEET, body, Some(access_token))
            .await
    }

    async fn send_event(&self, event: &UsageEvent) -> Result<()> {
        let _: serde_json::Value = self
            .respond(endpoints::TELEMETRY, serde_json::to_value(event)?, None)
            .await?;
        Ok(())
    }
}
