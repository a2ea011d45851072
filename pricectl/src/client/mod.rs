//! Pricing service client abstraction.
//!
//! The pricing service prices instance descriptors in bulk or one at a time, creates remote
//! spreadsheets from result sets, and accepts usage events. [`PricingClient`] abstracts those
//! calls so the pipeline can run against [`HttpPricingClient`] in production and
//! [`MockPricingClient`] in tests.

mod http;
mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::events::UsageEvent;
use crate::types::{PricingOutcome, PricingRequest};

pub use http::HttpPricingClient;
pub use mock::{MockCall, MockPricingClient};

/// Endpoint paths on the pricing service.
pub mod endpoints {
    pub const PRICE_INSTANCES: &str = "/price-instances";
    pub const PRICE_INSTANCE: &str = "/price-instance";
    pub const EXPORT_SPREADSHEET: &str = "/export-to-google-sheets";
    pub const TELEMETRY: &str = "/telemetry";
}

/// Result of creating a remote spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetExport {
    pub spreadsheet_id: String,
    pub spreadsheet_url: String,
    pub status: String,
}

/// Body of a bulk pricing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BulkPricingResponse {
    pub instances: Vec<PricingOutcome>,
}

/// Body of a remote spreadsheet request.
#[derive(Debug, Serialize)]
pub(crate) struct SpreadsheetRequest<'a> {
    pub pricing_results: &'a [PricingOutcome],
    pub access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_title: Option<&'a str>,
}

/// Calls the pipeline makes against the pricing service.
#[async_trait]
pub trait PricingClient: Send + Sync {
    /// Price a batch. The response has one outcome per request, in request order.
    async fn price_instances(&self, requests: &[PricingRequest]) -> Result<Vec<PricingOutcome>>;

    /// Price a single ad-hoc request.
    async fn price_instance(&self, request: &PricingRequest) -> Result<PricingOutcome>;

    /// Create a remote spreadsheet holding `outcomes`, authorized by `access_token`.
    ///
    /// The service names the spreadsheet "EC2 Pricing Results" when `title` is `None`.
    async fn export_to_spreadsheet(
        &self,
        outcomes: &[PricingOutcome],
        access_token: &str,
        title: Option<&str>,
    ) -> Result<SpreadsheetExport>;

    /// Record a usage event.
    async fn send_event(&self, event: &UsageEvent) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ValidationIssue {
    #[serde(default)]
    loc: Vec<serde_json::Value>,
    msg: String,
}

/// Build a [`Error::Service`] from a failed response.
///
/// A JSON `detail` string is used verbatim and a `detail` list of validation issues is rendered
/// as `loc.path: msg` items joined by `; `. Anything else falls back to `HTTP <status>: <reason>`.
pub(crate) fn service_error(status: u16, reason: &str, body: &str) -> Error {
    let fallback = format!("HTTP {status}: {reason}");
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());

    let message = match detail {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s,
        Some(list @ serde_json::Value::Array(_)) => match serde_json::from_value::<Vec<ValidationIssue>>(list) {
            Ok(issues) => issues
                .iter()
                .map(|issue| {
                    let loc = issue
                        .loc
                        .iter()
                        .map(|part| match part {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".");
                    format!("{loc}: {}", issue.msg)
                })
                .collect::<Vec<_>>()
                .join("; "),
            Err(_) => fallback,
        },
        _ => fallback,
    };

    Error::Service {
        status: Some(status),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string_is_used_verbatim() {
        let err = service_error(500, "Internal Server Error", r#"{"detail": "Error pricing instance: boom"}"#);
        assert_eq!(err.user_message(), "Error pricing instance: boom");
        assert!(matches!(err, Error::Service { status: Some(500), .. }));
    }

    #[test]
    fn test_detail_list_is_itemized() {
        let body = r#"{"detail": [
            {"loc": ["body", 0, "region_code"], "msg": "field required", "type": "value_error.missing"},
            {"loc": ["body", 1, "qty"], "msg": "value is not a valid integer", "type": "type_error.integer"}
        ]}"#;
        let err = service_error(422, "Unprocessable Entity", body);
        assert_eq!(
            err.user_message(),
            "body.0.region_code: field required; body.1.qty: value is not a valid integer"
        );
    }

    #[test]
    fn test_unparseable_body_falls_back_to_status() {
        let err = service_error(502, "Bad Gateway", "<html>upstream down</html>");
        assert_eq!(err.user_message(), "HTTP 502: Bad Gateway");

        let err = service_error(404, "Not Found", r#"{"message": "nope"}"#);
        assert_eq!(err.user_message(), "HTTP 404: Not Found");
    }
}
