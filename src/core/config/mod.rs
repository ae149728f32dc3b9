//! Configuration for the discovery and dispatch engines.
//!
//! `Config` is the fully resolved runtime configuration. It is built through
//! [`ConfigBuilder`], which layers defaults, an optional TOML file and
//! programmatic overrides, then validates the result. Components receive a
//! plain `Config` (or `Arc<Config>`) explicitly; nothing reads ambient
//! environment state at call time.

mod builder;
mod loading;
mod validation;

pub use builder::ConfigBuilder;

use crate::core::error::Result;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

/// Default cap on bulk batch size. Hard product limit, not tunable upward.
pub const MAX_BATCH_SIZE: usize = 25;

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Network
    pub request_timeout: Duration,
    pub user_agent: String,
    /// (min, max) seconds slept between consecutive research queries.
    pub sleep_between_requests: (f32, f32),

    // Verification service
    pub verification_api_url: String,
    pub verification_api_key: Option<String>,

    // Web search service
    pub search_api_url: String,
    pub search_api_key: Option<String>,
    pub search_max_results: usize,

    // Mail API
    pub mail_api_url: String,
    pub mail_sender_email: String,
    pub mail_access_token: Option<String>,

    // Dispatch
    pub max_batch_size: usize,
    pub send_concurrency: usize,
    pub draft_concurrency: usize,
    pub max_send_attempts: u32,
    pub send_backoff_ms: Vec<u64>,

    /// Compiled address format check applied to every generated or scraped
    /// candidate before verification.
    pub email_regex: Regex,

    pub loaded_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: format!("mailscout/{}", env!("CARGO_PKG_VERSION")),
            sleep_between_requests: (0.1, 0.5),
            verification_api_url: "https://api.emailvalidation.example/v1/verify".to_string(),
            verification_api_key: None,
            search_api_url: "https://api.tavily.com/search".to_string(),
            search_api_key: None,
            search_max_results: 5,
            mail_api_url: "https://gmail.googleapis.com/gmail/v1/users/me/messages/send"
                .to_string(),
            mail_sender_email: "me@example.com".to_string(),
            mail_access_token: None,
            max_batch_size: MAX_BATCH_SIZE,
            send_concurrency: 2,
            draft_concurrency: 3,
            max_send_attempts: 3,
            send_backoff_ms: vec![300, 900],
            email_regex: Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._%+'-]*@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
                .expect("static email regex must compile"),
            loaded_config_path: None,
        }
    }
}

/// Returns a random politeness delay within the configured range.
pub(crate) fn get_random_sleep_duration(config: &Config) -> Duration {
    let (min, max) = config.sleep_between_requests;
    let secs = if max > min {
        rand::thread_rng().gen_range(min..max)
    } else {
        min
    };
    Duration::from_secs_f32(secs.max(0.0))
}

/// Raw shape of a TOML configuration file. All sections and fields are
/// optional; present values override defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub verification: VerificationSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub mail: MailSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkSettings {
    pub request_timeout: Option<u64>,
    pub user_agent: Option<String>,
    pub min_sleep: Option<f32>,
    pub max_sleep: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerificationSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailSettings {
    pub api_url: Option<String>,
    pub sender_email: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchSettings {
    pub max_batch_size: Option<usize>,
    pub send_concurrency: Option<usize>,
    pub draft_concurrency: Option<usize>,
    pub max_send_attempts: Option<u32>,
    pub send_backoff_ms: Option<Vec<u64>>,
}
