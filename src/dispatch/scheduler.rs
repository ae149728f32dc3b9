//! Bulk dispatch scheduler: drives up to 25 independent sends through a
//! fixed-size worker pool with per-item retries.
//!
//! Workers claim items from a shared atomic cursor, so no item is processed
//! twice and every item is eventually claimed. Item failures never abort the
//! batch or touch sibling items; only batch preconditions and a dead mail
//! credential reject the batch as a whole, and both are checked before any
//! send attempt.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{BulkSendItem, BulkSendResult, DispatchReport, DispatchSummary};
use crate::dispatch::mailer::{ApiMailer, MailTransport, SendOutcome};
use crate::dispatch::retry::{backoff_after, is_retryable};

use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::sleep;

/// Schedules one batch at a time. Cheap to clone; the transport is shared.
#[derive(Clone)]
pub struct DispatchScheduler {
    config: Arc<Config>,
    transport: Arc<dyn MailTransport>,
}

impl DispatchScheduler {
    /// Builds a scheduler with the production mail API transport.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http_client = Arc::new(
            Client::builder()
                .user_agent(&config.user_agent)
                .timeout(config.request_timeout)
                .build()
                .map_err(|e| {
                    AppError::Initialization(format!("Failed to build HTTP client: {}", e))
                })?,
        );
        let transport = Arc::new(ApiMailer::new(&config, http_client));
        Ok(Self::with_transport(config, transport))
    }

    /// Builds a scheduler over an explicit transport. Tests use this to
    /// substitute scripted fakes.
    pub fn with_transport(config: Arc<Config>, transport: Arc<dyn MailTransport>) -> Self {
        Self { config, transport }
    }

    /// Worker-pool width for the send path: `min(send_concurrency, items)`.
    pub fn send_worker_count(&self, item_count: usize) -> usize {
        self.config.send_concurrency.min(item_count).max(1)
    }

    /// Worker-pool width the draft-generation caller should use:
    /// `min(draft_concurrency, items)`.
    pub fn draft_worker_count(&self, item_count: usize) -> usize {
        self.config.draft_concurrency.min(item_count).max(1)
    }

    /// Dispatches a whole batch and returns one result per input item plus
    /// the aggregate summary. Results carry the caller's `client_id`; their
    /// order is not significant.
    pub async fn dispatch(&self, items: Vec<BulkSendItem>) -> Result<DispatchReport> {
        validate_batch(&items, self.config.max_batch_size)?;

        // No per-item send can succeed without a live credential, so refuse
        // the whole batch up front rather than failing 25 items one by one.
        self.transport.check_credential().await?;

        let total = items.len();
        let workers = self.send_worker_count(total);
        tracing::info!(target: "dispatch_task", "Dispatching {} items across {} workers", total, workers);

        let items = Arc::new(items);
        let cursor = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));

        let mut tasks = FuturesUnordered::new();
        for worker_id in 0..workers {
            let items = Arc::clone(&items);
            let cursor = Arc::clone(&cursor);
            let results = Arc::clone(&results);
            let transport = Arc::clone(&self.transport);
            let config = Arc::clone(&self.config);

            tasks.push(tokio::spawn(async move {
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= items.len() {
                        break;
                    }
                    let item = &items[index];
                    tracing::debug!(target: "dispatch_task",
                        "Worker {} claimed item {} (<{}>)", worker_id, index, item.to);
                    let result = send_with_retries(transport.as_ref(), &config, item).await;
                    results.lock().expect("results lock poisoned").push(result);
                }
            }));
        }

        while let Some(join_result) = tasks.next().await {
            if let Err(e) = join_result {
                tracing::error!(target: "dispatch_task", "A dispatch worker failed to join: {}", e);
            }
        }

        let results = Arc::try_unwrap(results)
            .map_err(|_| AppError::Initialization("dispatch workers still hold results".into()))?
            .into_inner()
            .expect("results lock poisoned");

        let sent = results.iter().filter(|r| r.success).count();
        let summary = DispatchSummary {
            total,
            sent,
            failed: total - sent,
        };
        tracing::info!(target: "dispatch_task",
            "Batch finished: {} sent, {} failed of {}", summary.sent, summary.failed, summary.total);

        Ok(DispatchReport { summary, results })
    }
}

/// Batch-wide preconditions, checked before any dispatch work.
fn validate_batch(items: &[BulkSendItem], max_batch_size: usize) -> Result<()> {
    if items.is_empty() {
        return Err(AppError::BatchRejected("batch is empty".to_string()));
    }
    if items.len() > max_batch_size {
        return Err(AppError::BatchRejected(format!(
            "batch has {} items, limit is {}",
            items.len(),
            max_batch_size
        )));
    }

    let mut recipients = HashSet::new();
    let mut client_ids = HashSet::new();
    for item in items {
        if !recipients.insert(item.to.trim().to_lowercase()) {
            return Err(AppError::BatchRejected(format!(
                "duplicate recipient: {}",
                item.to
            )));
        }
        if !client_ids.insert(item.client_id.as_str()) {
            return Err(AppError::BatchRejected(format!(
                "duplicate client id: {}",
                item.client_id
            )));
        }
    }
    Ok(())
}

/// Runs one item to its terminal state: up to `max_send_attempts` tries,
/// retrying only the declared statuses with the fixed backoff schedule.
async fn send_with_retries(
    transport: &dyn MailTransport,
    config: &Config,
    item: &BulkSendItem,
) -> BulkSendResult {
    let max_attempts = config.max_send_attempts;

    for attempt in 1..=max_attempts {
        match transport.send(item).await {
            Ok(SendOutcome::Sent { message_id }) => {
                return BulkSendResult {
                    client_id: item.client_id.clone(),
                    to: item.to.clone(),
                    success: true,
                    attempts: attempt,
                    message_id: (!message_id.is_empty()).then_some(message_id),
                    error: None,
                    status_code: None,
                };
            }
            Ok(SendOutcome::Failed {
                status_code,
                message,
            }) => {
                let retryable = status_code.map(is_retryable).unwrap_or(false);
                if retryable && attempt < max_attempts {
                    if let Some(delay) = backoff_after(attempt, &config.send_backoff_ms) {
                        tracing::debug!(target: "dispatch_task",
                            "<{}> attempt {}/{} got {:?}, backing off {:?}",
                            item.to, attempt, max_attempts, status_code, delay);
                        sleep(delay).await;
                        continue;
                    }
                }
                tracing::warn!(target: "dispatch_task",
                    "<{}> failed on attempt {}/{}: {} ({:?})",
                    item.to, attempt, max_attempts, message, status_code);
                return BulkSendResult {
                    client_id: item.client_id.clone(),
                    to: item.to.clone(),
                    success: false,
                    attempts: attempt,
                    message_id: None,
                    error: Some(message),
                    status_code,
                };
            }
            Err(e) => {
                // Faults during a send (bad MIME, credential revoked
                // mid-batch) are terminal for this item only.
                tracing::error!(target: "dispatch_task",
                    "<{}> errored on attempt {}/{}: {}", item.to, attempt, max_attempts, e);
                return BulkSendResult {
                    client_id: item.client_id.clone(),
                    to: item.to.clone(),
                    success: false,
                    attempts: attempt,
                    message_id: None,
                    error: Some(e.to_string()),
                    status_code: None,
                };
            }
        }
    }

    // max_send_attempts >= 1 is validated, so the loop always returns above;
    // this arm satisfies the compiler for attempts == 0 configs.
    BulkSendResult {
        client_id: item.client_id.clone(),
        to: item.to.clone(),
        success: false,
        attempts: 0,
        message_id: None,
        error: Some("no send attempts configured".to_string()),
        status_code: None,
    }
}
