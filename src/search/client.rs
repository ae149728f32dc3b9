//! HTTP client for the external web search API.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One search hit: the page snippet is what the research fallback scans for
/// addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Performs one web search for a query string.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

/// Production searcher backed by a Tavily-style JSON search endpoint.
#[derive(Clone)]
pub struct HttpSearcher {
    http_client: Arc<Client>,
    api_url: String,
    api_key: Option<String>,
    max_results: usize,
}

impl HttpSearcher {
    pub fn new(config: &Config, http_client: Arc<Client>) -> Self {
        Self {
            http_client,
            api_url: config.search_api_url.clone(),
            api_key: config.search_api_key.clone(),
            max_results: config.search_max_results,
        }
    }
}

#[async_trait]
impl WebSearcher for HttpSearcher {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        tracing::debug!(target: "search_api", "Searching: {}", query);

        let request = SearchRequest {
            query,
            api_key: self.api_key.as_deref(),
            max_results: self.max_results,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(target: "search_api", "Search API error {} for '{}': {}", status, query, body);
            return Err(AppError::Transport(format!(
                "Search API returned {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to parse search response: {}", e)))?;

        tracing::debug!(target: "search_api", "Search for '{}' returned {} results", query, parsed.results.len());
        Ok(parsed.results)
    }
}
