//! Contains validation logic for the final Config struct.

use super::{Config, MAX_BATCH_SIZE};
use crate::core::error::{AppError, Result};

/// Validates the configuration settings after loading and potential overrides.
/// Mutates the config to clamp values or set defaults where applicable and logical.
/// Internal helper for the builder's `build` method.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.sleep_between_requests.0 < 0.0 || config.sleep_between_requests.1 < 0.0 {
        return Err(AppError::Config(
            "Sleep durations cannot be negative.".to_string(),
        ));
    }
    if config.sleep_between_requests.0 > config.sleep_between_requests.1 {
        tracing::warn!(
            "Min sleep ({:.2}s) > Max sleep ({:.2}s). Setting max sleep = min sleep.",
            config.sleep_between_requests.0,
            config.sleep_between_requests.1
        );
        config.sleep_between_requests.1 = config.sleep_between_requests.0;
    }

    if config.verification_api_url.trim().is_empty() {
        return Err(AppError::Config(
            "Verification API URL cannot be empty.".to_string(),
        ));
    }
    if config.search_api_url.trim().is_empty() {
        return Err(AppError::Config("Search API URL cannot be empty.".to_string()));
    }
    if config.search_max_results == 0 {
        tracing::warn!("Search max results was set to 0. Setting to 1.");
        config.search_max_results = 1;
    }

    if !config.mail_sender_email.contains('@') || !config.mail_sender_email.contains('.') {
        return Err(AppError::Config(format!(
            "Invalid mail sender email format: {}",
            config.mail_sender_email
        )));
    }

    if config.max_batch_size == 0 {
        tracing::warn!("Max batch size was set to 0. Setting to 1.");
        config.max_batch_size = 1;
    }
    if config.max_batch_size > MAX_BATCH_SIZE {
        tracing::warn!(
            "Max batch size ({}) exceeds the hard limit of {}. Clamping.",
            config.max_batch_size,
            MAX_BATCH_SIZE
        );
        config.max_batch_size = MAX_BATCH_SIZE;
    }
    if config.send_concurrency == 0 {
        tracing::warn!("Send concurrency was set to 0. Setting to 1.");
        config.send_concurrency = 1;
    }
    if config.draft_concurrency == 0 {
        tracing::warn!("Draft concurrency was set to 0. Setting to 1.");
        config.draft_concurrency = 1;
    }
    if config.max_send_attempts == 0 {
        tracing::warn!("Max send attempts was set to 0. Setting to 1.");
        config.max_send_attempts = 1;
    }
    if config.send_backoff_ms.len() + 1 < config.max_send_attempts as usize {
        return Err(AppError::Config(format!(
            "Backoff schedule has {} entries but {} send attempts need {}.",
            config.send_backoff_ms.len(),
            config.max_send_attempts,
            config.max_send_attempts - 1
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_zero_concurrency_and_oversized_batch() {
        let mut config = Config {
            send_concurrency: 0,
            max_batch_size: 100,
            ..Config::default()
        };
        validate_config(&mut config).unwrap();
        assert_eq!(config.send_concurrency, 1);
        assert_eq!(config.max_batch_size, MAX_BATCH_SIZE);
    }

    #[test]
    fn rejects_bad_sender_email() {
        let mut config = Config {
            mail_sender_email: "not-an-email".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&mut config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn rejects_short_backoff_schedule() {
        let mut config = Config {
            max_send_attempts: 3,
            send_backoff_ms: vec![300],
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&mut config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn swapped_sleep_bounds_are_normalized() {
        let mut config = Config {
            sleep_between_requests: (2.0, 0.5),
            ..Config::default()
        };
        validate_config(&mut config).unwrap();
        assert_eq!(config.sleep_between_requests, (2.0, 2.0));
    }
}
