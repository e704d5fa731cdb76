//! Defines the custom error types for the email-auditor application.

use thiserror::Error;

/// The primary error type for the email analysis process.
#[derive(Error, Debug)]
pub(crate) enum AppError {
    /// Error making HTTP requests via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// Indicates required input was missing (e.g., empty HTML content).
    #[error("Missing Input: {0}")]
    MissingInput(String),

    /// The text-analysis service credentials were not configured.
    #[error("Analysis API key is not configured (set OPENAI_API_KEY)")]
    MissingApiKey,

    /// The text-analysis service failed or returned an unusable response.
    #[error("Text Analysis Error: {0}")]
    Analysis(String),
}

pub(crate) type Result<T> = std::result::Result<T, AppError>;
