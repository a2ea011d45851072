use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::{BulkPricingResponse, PricingClient, SpreadsheetExport, SpreadsheetRequest, endpoints, service_error};
use crate::config::PricingApiConfig;
use crate::errors::Result;
use crate::events::UsageEvent;
use crate::types::{PricingOutcome, PricingRequest};

/// Production client talking JSON over HTTP to the pricing service.
#[derive(Clone)]
pub struct HttpPricingClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPricingClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &PricingApiConfig) -> Result<Self> {
        Self::new(config.url.clone(), config.timeout)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!(url = %url, "Sending pricing service request");

        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "Pricing service request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            let body = response.text().await.unwrap_or_default();
            let err = service_error(status.as_u16(), reason, &body);
            tracing::warn!(url = %url, status = status.as_u16(), error = %err, "Pricing service returned an error");
            return Err(err);
        }

        let text = response.text().await?;
        tracing::trace!(url = %url, response_len = text.len(), "Pricing service responded");
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl PricingClient for HttpPricingClient {
    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    async fn price_instances(&self, requests: &[PricingRequest]) -> Result<Vec<PricingOutcome>> {
        let response: BulkPricingResponse = self.post_json(endpoints::PRICE_INSTANCES, requests).await?;
        tracing::info!(outcomes = response.instances.len(), "Batch priced");
        Ok(response.instances)
    }

    #[tracing::instrument(skip(self, request), fields(region = %request.region_code, instance_type = %request.instance_type))]
    async fn price_instance(&self, request: &PricingRequest) -> Result<PricingOutcome> {
        self.post_json(endpoints::PRICE_INSTANCE, request).await
    }

    #[tracing::instrument(skip(self, outcomes, access_token), fields(count = outcomes.len()))]
    async fn export_to_spreadsheet(
        &self,
        outcomes: &[PricingOutcome],
        access_token: &str,
        title: Option<&str>,
    ) -> Result<SpreadsheetExport> {
        let body = SpreadsheetRequest {
            pricing_results: outcomes,
            access_token,
            spreadsheet_title: title,
        };
        let export: SpreadsheetExport = self.post_json(endpoints::EXPORT_SPREADSHEET, &body).await?;
        tracing::info!(spreadsheet_id = %export.spreadsheet_id, "Remote spreadsheet created");
        Ok(export)
    }

    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    async fn send_event(&self, event: &UsageEvent) -> Result<()> {
        let _: serde_json::Value = self.post_json(endpoints::TELEMETRY, event).await?;
        Ok(())
    }
}
