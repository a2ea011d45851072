use crate::auth::AuthSession;
use crate::client::{PricingClient, SpreadsheetExport};
use crate::errors::{Error, Result};
use crate::types::PricingOutcome;

/// Message recorded when a remote export is attempted without a usable token.
pub const AUTHENTICATION_REQUIRED: &str =
    "Authentication required: connect a Google account to export to Google Sheets.";

/// Create a remote spreadsheet from `outcomes`.
///
/// Refused with [`Error::Unauthenticated`] before any network call when the session has no
/// valid bearer token.
pub async fn export_remote<C: PricingClient + ?Sized>(
    client: &C,
    outcomes: &[PricingOutcome],
    session: &AuthSession,
    title: &str,
) -> Result<SpreadsheetExport> {
    let Some(token) = session.bearer_token() else {
        tracing::warn!("Remote spreadsheet export refused, no valid bearer token");
        return Err(Error::Unauthenticated {
            message: Some(AUTHENTICATION_REQUIRED.to_string()),
        });
    };
    client.export_to_spreadsheet(outcomes, token, Some(title)).await
}
