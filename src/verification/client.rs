//! HTTP client for the external email-validation service.
//!
//! One outbound call per address, no retries of its own. Transport failures
//! surface as `AppError::Transport` and are caught per-candidate by callers:
//! a single bad candidate must never abort a whole sweep.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::VerificationVerdict;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Verifies a single email address.
///
/// Implemented over HTTP in production; tests substitute scripted fakes.
#[async_trait]
pub trait EmailVerifier: Send + Sync {
    async fn verify(&self, email: &str) -> Result<VerificationVerdict>;
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: String,
}

/// Production verifier backed by the configured validation endpoint.
#[derive(Clone)]
pub struct HttpVerifier {
    http_client: Arc<Client>,
    api_url: String,
    api_key: Option<String>,
}

impl HttpVerifier {
    pub fn new(config: &Config, http_client: Arc<Client>) -> Self {
        Self {
            http_client,
            api_url: config.verification_api_url.clone(),
            api_key: config.verification_api_key.clone(),
        }
    }

    /// Maps the service's status string to a verdict. Unrecognized statuses
    /// are `Unknown`, which callers treat as rejection (fail-closed).
    fn map_status(status: &str) -> VerificationVerdict {
        match status.trim().to_lowercase().as_str() {
            "valid" => VerificationVerdict::Valid,
            "catch_all" | "catch-all" | "accept_all" => VerificationVerdict::CatchAll,
            "invalid" => VerificationVerdict::Invalid,
            other => {
                tracing::debug!(target: "verify_api", "Unrecognized verification status '{}'", other);
                VerificationVerdict::Unknown
            }
        }
    }
}

#[async_trait]
impl EmailVerifier for HttpVerifier {
    async fn verify(&self, email: &str) -> Result<VerificationVerdict> {
        tracing::debug!(target: "verify_api", "Verifying <{}> via {}", email, self.api_url);

        let mut request = self
            .http_client
            .post(&self.api_url)
            .json(&VerifyRequest { email });
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(target: "verify_api", "Verification request for <{}> failed: {}", email, e);
            AppError::Transport(format!("Verification request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: "verify_api", "Verification service returned {} for <{}>", status, email);
            return Err(AppError::Transport(format!(
                "Verification service returned {}",
                status
            )));
        }

        let body: VerifyResponse = response.json().await.map_err(|e| {
            AppError::Transport(format!("Failed to parse verification response: {}", e))
        })?;

        let verdict = Self::map_status(&body.status);
        tracing::info!(target: "verify_api", "Verdict for <{}>: {:?} (service said '{}')", email, verdict, body.status);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_statuses() {
        assert_eq!(HttpVerifier::map_status("valid"), VerificationVerdict::Valid);
        assert_eq!(
            HttpVerifier::map_status("catch_all"),
            VerificationVerdict::CatchAll
        );
        assert_eq!(
            HttpVerifier::map_status("catch-all"),
            VerificationVerdict::CatchAll
        );
        assert_eq!(
            HttpVerifier::map_status("accept_all"),
            VerificationVerdict::CatchAll
        );
        assert_eq!(
            HttpVerifier::map_status("invalid"),
            VerificationVerdict::Invalid
        );
    }

    #[test]
    fn unrecognized_statuses_fail_closed() {
        assert_eq!(
            HttpVerifier::map_status("risky"),
            VerificationVerdict::Unknown
        );
        assert_eq!(HttpVerifier::map_status(""), VerificationVerdict::Unknown);
        assert_eq!(
            HttpVerifier::map_status("deliverable?"),
            VerificationVerdict::Unknown
        );
    }

    #[test]
    fn status_mapping_is_case_and_whitespace_insensitive() {
        assert_eq!(
            HttpVerifier::map_status("  VALID "),
            VerificationVerdict::Valid
        );
    }
}
