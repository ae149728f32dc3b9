//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile};
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Returns the parsed `ConfigFile` content.
/// Internal to the builder logic.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    tracing::debug!("Attempting to parse TOML from: {}", file_path);
    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

/// Applies settings from a parsed `ConfigFile` onto a mutable `Config` instance.
/// Internal helper for the builder. This merges settings.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    // Network
    if let Some(timeout) = file_config.network.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref user_agent) = file_config.network.user_agent {
        config.user_agent = user_agent.clone();
    }
    if let Some(min_sleep) = file_config.network.min_sleep {
        config.sleep_between_requests.0 = min_sleep;
    }
    if let Some(max_sleep) = file_config.network.max_sleep {
        config.sleep_between_requests.1 = max_sleep;
    }

    // Verification service
    if let Some(ref url) = file_config.verification.api_url {
        config.verification_api_url = url.clone();
    }
    if let Some(ref key) = file_config.verification.api_key {
        if !key.trim().is_empty() {
            config.verification_api_key = Some(key.trim().to_string());
        }
    }

    // Web search service
    if let Some(ref url) = file_config.search.api_url {
        config.search_api_url = url.clone();
    }
    if let Some(ref key) = file_config.search.api_key {
        if !key.trim().is_empty() {
            config.search_api_key = Some(key.trim().to_string());
        }
    }
    if let Some(max) = file_config.search.max_results {
        config.search_max_results = max;
    }

    // Mail API
    if let Some(ref url) = file_config.mail.api_url {
        config.mail_api_url = url.clone();
    }
    if let Some(ref sender) = file_config.mail.sender_email {
        config.mail_sender_email = sender.clone();
    }
    if let Some(ref token) = file_config.mail.access_token {
        if !token.trim().is_empty() {
            config.mail_access_token = Some(token.trim().to_string());
        }
    }

    // Dispatch
    if let Some(size) = file_config.dispatch.max_batch_size {
        config.max_batch_size = size;
    }
    if let Some(concurrency) = file_config.dispatch.send_concurrency {
        config.send_concurrency = concurrency;
    }
    if let Some(concurrency) = file_config.dispatch.draft_concurrency {
        config.draft_concurrency = concurrency;
    }
    if let Some(attempts) = file_config.dispatch.max_send_attempts {
        config.max_send_attempts = attempts;
    }
    if let Some(ref backoff) = file_config.dispatch.send_backoff_ms {
        if !backoff.is_empty() {
            config.send_backoff_ms = backoff.clone();
        }
    }
}
