//! Utility functions for handling domain names and URLs.

use crate::core::error::{AppError, Result};
use url::Url;

/// Extracts the base domain name (e.g., "example.com") from a given URL or domain string.
///
/// Handles common variations:
/// - Adds `https://` scheme if missing.
/// - Parses the URL and extracts the host.
/// - Removes the common `www.` prefix.
/// - Converts to lowercase.
///
/// The caller-facing layer already strips `www.` and lowercases its input,
/// but this helper re-normalizes defensively so the discovery components
/// never depend on upstream hygiene.
///
/// Returns `Err(AppError::DomainExtraction)` if the input is empty or a host
/// cannot be parsed.
pub(crate) fn normalize_domain(website_url_or_domain: &str) -> Result<String> {
    let trimmed_input = website_url_or_domain.trim();
    if trimmed_input.is_empty() {
        tracing::warn!("Received empty input for domain extraction.");
        return Err(AppError::DomainExtraction(
            "Input string is empty".to_string(),
        ));
    }

    tracing::debug!("Attempting to extract domain from input: {}", trimmed_input);

    let url_str_with_scheme = if !trimmed_input.contains("://") {
        format!("https://{}", trimmed_input)
    } else {
        trimmed_input.to_string()
    };

    let url = match Url::parse(&url_str_with_scheme) {
        Ok(parsed_url) => parsed_url,
        Err(e) => {
            if !trimmed_input.contains('/')
                && trimmed_input.contains('.')
                && !trimmed_input.starts_with('.')
                && !trimmed_input.ends_with('.')
            {
                tracing::warn!(
                    "Input '{}' failed URL parsing but looks like a domain, attempting direct use.",
                    trimmed_input
                );
                let host = trimmed_input.strip_prefix("www.").unwrap_or(trimmed_input);
                return Ok(host.to_lowercase());
            }
            return Err(AppError::UrlParse(e));
        }
    };

    let host = url.host_str().ok_or_else(|| {
        tracing::warn!("Could not extract host component from parsed URL: {}", url);
        AppError::DomainExtraction(format!("Could not extract host from parsed URL: {}", url))
    })?;

    let domain = host.strip_prefix("www.").unwrap_or(host);
    let final_domain = domain.to_lowercase();

    if !final_domain.contains('.') || final_domain.starts_with('.') || final_domain.ends_with('.') {
        tracing::error!("Extracted domain '{}' appears invalid.", final_domain);
        return Err(AppError::DomainExtraction(format!(
            "Extracted domain appears invalid: {}",
            final_domain
        )));
    }

    Ok(final_domain)
}
