//! Error type shared by the Stripe client, the exporter and startup code.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Error reported by the Stripe API; carries Stripe's own message.
    #[error("{0}")]
    Stripe(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Spreadsheet export failed: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
