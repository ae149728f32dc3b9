//! Provides the `ConfigBuilder` for fluent configuration construction.

use super::loading::{apply_file_config, load_config_file};
use super::validation::validate_config;
use super::{Config, ConfigFile};
use crate::core::error::{AppError, Result};
use std::path::Path;
use std::time::Duration;

/// Builder pattern for creating `Config` instances fluently.
///
/// This is the primary way users should create a `Config` object.
/// It handles loading from files, applying overrides, and validation.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    config_file_path: Option<String>,
    overrides: ConfigFile,
}

impl ConfigBuilder {
    /// Creates a new builder with default configuration values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify an optional configuration file path to load.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.overrides.network.request_timeout = Some(duration.as_secs());
        self
    }
    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.overrides.network.user_agent = Some(value.into());
        self
    }
    pub fn sleep_between_requests(mut self, min: f32, max: f32) -> Self {
        self.overrides.network.min_sleep = Some(min);
        self.overrides.network.max_sleep = Some(max);
        self
    }
    pub fn verification_api_url(mut self, value: impl Into<String>) -> Self {
        self.overrides.verification.api_url = Some(value.into());
        self
    }
    pub fn verification_api_key(mut self, value: impl Into<String>) -> Self {
        self.overrides.verification.api_key = Some(value.into());
        self
    }
    pub fn search_api_url(mut self, value: impl Into<String>) -> Self {
        self.overrides.search.api_url = Some(value.into());
        self
    }
    pub fn search_api_key(mut self, value: impl Into<String>) -> Self {
        self.overrides.search.api_key = Some(value.into());
        self
    }
    pub fn search_max_results(mut self, value: usize) -> Self {
        self.overrides.search.max_results = Some(value);
        self
    }
    pub fn mail_api_url(mut self, value: impl Into<String>) -> Self {
        self.overrides.mail.api_url = Some(value.into());
        self
    }
    pub fn mail_sender_email(mut self, value: impl Into<String>) -> Self {
        self.overrides.mail.sender_email = Some(value.into());
        self
    }
    pub fn mail_access_token(mut self, value: impl Into<String>) -> Self {
        self.overrides.mail.access_token = Some(value.into());
        self
    }
    pub fn max_batch_size(mut self, value: usize) -> Self {
        self.overrides.dispatch.max_batch_size = Some(value);
        self
    }
    pub fn send_concurrency(mut self, value: usize) -> Self {
        self.overrides.dispatch.send_concurrency = Some(value);
        self
    }
    pub fn draft_concurrency(mut self, value: usize) -> Self {
        self.overrides.dispatch.draft_concurrency = Some(value);
        self
    }
    pub fn max_send_attempts(mut self, value: u32) -> Self {
        self.overrides.dispatch.max_send_attempts = Some(value);
        self
    }
    pub fn send_backoff_ms(mut self, schedule: Vec<u64>) -> Self {
        self.overrides.dispatch.send_backoff_ms = Some(schedule);
        self
    }

    /// Builds the final `Config` object, applying defaults, file settings, overrides, and validation.
    pub fn build(mut self) -> Result<Config> {
        let mut loaded_path: Option<String> = None;

        if let Some(ref path) = self.config_file_path {
            match load_config_file(path) {
                Ok(file_config) => {
                    apply_file_config(&mut self.config, &file_config);
                    loaded_path = Some(path.clone());
                    tracing::info!("Loaded base configuration from specified file: {}", path);
                }
                Err(e) => {
                    tracing::error!("Failed to load specified config file '{}': {}", path, e);
                    return Err(AppError::Config(format!(
                        "Failed to load specified configuration file '{}': {}",
                        path, e
                    )));
                }
            }
        } else {
            tracing::debug!("No config file specified, checking default locations.");
            for path_str in ["./mailscout.toml", "./config.toml"] {
                if Path::new(path_str).exists() {
                    tracing::debug!("Found potential default config file: {}", path_str);
                    match load_config_file(path_str) {
                        Ok(file_config) => {
                            apply_file_config(&mut self.config, &file_config);
                            loaded_path = Some(path_str.to_string());
                            tracing::info!(
                                "Loaded base configuration from default location: {}",
                                path_str
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to load or parse default config '{}': {}",
                                path_str,
                                e
                            );
                        }
                    }
                }
            }
            if loaded_path.is_none() {
                tracing::info!("No configuration file found. Using default values and overrides.");
            }
        }

        apply_file_config(&mut self.config, &self.overrides);
        self.config.loaded_config_path = loaded_path;
        validate_config(&mut self.config)?;

        tracing::debug!("Final configuration built successfully.");
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_apply_over_defaults() {
        let config = ConfigBuilder::new()
            .send_concurrency(5)
            .verification_api_key("vk-1")
            .mail_sender_email("outreach@acme.com")
            .build()
            .unwrap();
        assert_eq!(config.send_concurrency, 5);
        assert_eq!(config.verification_api_key.as_deref(), Some("vk-1"));
        assert_eq!(config.mail_sender_email, "outreach@acme.com");
    }

    #[test]
    fn builder_overrides_beat_file_values() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "[dispatch]\nsend_concurrency = 7\n").unwrap();

        let config = ConfigBuilder::new()
            .config_file(file.path().to_str().unwrap())
            .send_concurrency(2)
            .build()
            .unwrap();
        assert_eq!(config.send_concurrency, 2);
    }

    #[test]
    fn missing_explicit_config_file_fails_build() {
        let result = ConfigBuilder::new().config_file("/no/such/file.toml").build();
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
