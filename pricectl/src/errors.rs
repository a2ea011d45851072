use thiserror::Error as ThisError;

/// Message shown when an upload yields no row with all required fields.
pub const NO_VALID_ROWS_MESSAGE: &str = "No valid data found in the uploaded file. Please check the CSV format and ensure it has the required columns: region_code, instance_type, operation, operating_system";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Rejected input: unsupported file, oversize file, no valid rows
    #[error("{}", messages.join("; "))]
    Validation { messages: Vec<String> },

    /// The pricing or spreadsheet service failed or returned an error response
    #[error("{message}")]
    Service { status: Option<u16>, message: String },

    /// An operation needing a bearer token was attempted without one
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// A pricing batch is already in flight
    #[error("A pricing batch is already in flight")]
    Busy,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Reading an uploaded `.xls`/`.xlsx` workbook failed
    #[error(transparent)]
    Workbook(#[from] calamine::Error),

    /// Writing an `.xlsx` export failed
    #[error(transparent)]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            messages: vec![message.into()],
        }
    }

    /// Returns the message surfaced to the user, in the results banner or an export record.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { messages } => messages.join("; "),
            Error::Service { message, .. } => message.clone(),
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Busy => "Pricing instances, please wait...".to_string(),
            Error::Io(e) => format!("File error: {e}"),
            Error::Json(e) => format!("Malformed response: {e}"),
            Error::Csv(e) => format!("Could not parse CSV: {e}"),
            Error::Workbook(e) => format!("Could not read workbook: {e}"),
            Error::WorkbookWrite(e) => format!("Could not write workbook: {e}"),
            Error::Http(e) => e.to_string(),
            Error::Other(e) => e.to_string(),
        }
    }
}

/// Type alias for pipeline operation results
pub type Result<T> = std::result::Result<T, Error>;
