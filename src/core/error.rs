//! Error types shared across the library.
//!
//! Only faults that must stop a whole request live here. Per-candidate
//! rejections, exhausted attempts and per-item send failures are normal,
//! reportable outcomes and are carried as data in the model types instead
//! (see `core::models`).

use thiserror::Error;

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the discovery and dispatch engines.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure while constructing shared resources (HTTP client etc.).
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Caller did not supply enough input to proceed.
    #[error("Insufficient input: {0}")]
    InsufficientInput(String),

    /// A domain could not be extracted from the given website/domain string.
    #[error("Domain extraction failed: {0}")]
    DomainExtraction(String),

    /// URL parsing failed.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The verification or search service was unreachable or returned a
    /// non-success response. Callers catch this per candidate/query.
    #[error("Transport fault: {0}")]
    Transport(String),

    /// A bulk batch violated a precondition (size, duplicate recipient or
    /// duplicate client id). Rejected before any send attempt.
    #[error("Batch rejected: {0}")]
    BatchRejected(String),

    /// The mail API credential is revoked or expired. The caller must
    /// invalidate its stored credential and prompt the user to reconnect.
    #[error("Mail credential expired or revoked: {0}")]
    CredentialExpired(String),

    /// A MIME message could not be built for a send item.
    #[error("Mail message error: {0}")]
    Mail(String),

    /// The step-reporting channel was closed before a terminal event.
    #[error("Stream error: {0}")]
    Stream(String),

    /// The caller aborted the run. The stream still emits a final closing
    /// event before shutting down.
    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    /// HTTP status the out-of-scope transport layer should map this error to.
    ///
    /// Everything that is a per-item or per-candidate outcome never reaches
    /// this function; only batch-wide and request-wide faults do.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::BatchRejected(_) | AppError::InsufficientInput(_) => 400,
            AppError::CredentialExpired(_) => 403,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_rejection_maps_to_400() {
        assert_eq!(
            AppError::BatchRejected("duplicate recipient".into()).http_status(),
            400
        );
        assert_eq!(AppError::InsufficientInput("no name".into()).http_status(), 400);
    }

    #[test]
    fn credential_expiry_maps_to_403() {
        assert_eq!(
            AppError::CredentialExpired("invalid_grant".into()).http_status(),
            403
        );
    }

    #[test]
    fn everything_else_maps_to_500() {
        assert_eq!(AppError::Transport("timeout".into()).http_status(), 500);
        assert_eq!(AppError::Config("bad".into()).http_status(), 500);
    }
}
