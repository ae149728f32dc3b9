//! Email discovery and bulk dispatch engine.
//!
//! Given a person's name and a company domain, the discovery engine finds a
//! plausible, verified email address in at most four rounds: one sweep over
//! common address patterns, then up to three web-research fallback attempts.
//! Progress is reported over a bounded event stream suitable for SSE, ending
//! in exactly one terminal event.
//!
//! The dispatch side takes batches of up to 25 prepared messages and sends
//! them through the mail API with a small worker pool, a declared retry
//! table for transient statuses, and per-item failure isolation.
//!
//! ```no_run
//! use mailscout_core::{discover_email, ConfigBuilder, DiscoveryRequest, Person};
//! use std::sync::Arc;
//!
//! # async fn example() -> mailscout_core::Result<()> {
//! let config = Arc::new(ConfigBuilder::new().build()?);
//! let request = DiscoveryRequest {
//!     person: Person::new("Jane Doe"),
//!     company: "Acme".to_string(),
//!     domain: "acme.com".to_string(),
//!     known_pattern: None,
//! };
//! let report = discover_email(config, &request).await?;
//! println!("{:?}", report.result);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod discovery;
pub mod dispatch;
pub mod search;
pub mod utils;
pub mod verification;

pub use crate::core::config::{Config, ConfigBuilder, MAX_BATCH_SIZE};
pub use crate::core::engine::{DiscoveryEngine, DiscoveryRequest, MAX_TOTAL_ROUNDS};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    Attachment, BulkSendItem, BulkSendResult, CandidateAddress, DiscoveryMethod, DiscoveryReport,
    DiscoveryResult, DispatchReport, DispatchSummary, Person, Step, StepStatus, StreamEvent,
    VerificationVerdict,
};
pub use crate::core::stream::{event_channel, sse_frame, StepReporter, EVENT_CHANNEL_CAPACITY};
pub use crate::dispatch::{DispatchScheduler, MailTransport, SendOutcome};
pub use crate::search::{HttpSearcher, SearchResult, WebSearcher};
pub use crate::verification::{EmailVerifier, HttpVerifier};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs discovery without a live stream consumer: events are drained and
/// discarded, and only the final report is returned.
pub async fn discover_email(
    config: Arc<Config>,
    request: &DiscoveryRequest,
) -> Result<DiscoveryReport> {
    let engine = DiscoveryEngine::new(config)?;
    let (tx, mut rx) = event_channel();
    let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

    let reporter = StepReporter::new(tx, "cli");
    let outcome = engine
        .run_streaming(request, reporter, CancellationToken::new())
        .await;
    drain.await.ok();
    outcome
}

/// Runs discovery while forwarding every stream event to `on_event`. The
/// callback sees the full protocol: paired step events, then one terminal
/// `done` or `error` event.
pub async fn discover_email_streaming<F>(
    config: Arc<Config>,
    request: &DiscoveryRequest,
    conversation_id: &str,
    cancel: CancellationToken,
    mut on_event: F,
) -> Result<DiscoveryReport>
where
    F: FnMut(StreamEvent) + Send + 'static,
{
    let engine = DiscoveryEngine::new(config)?;
    let (tx, mut rx) = event_channel();
    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            on_event(event);
        }
    });

    let reporter = StepReporter::new(tx, conversation_id);
    let outcome = engine.run_streaming(request, reporter, cancel).await;
    forward.await.ok();
    outcome
}

/// Dispatches one batch of prepared messages and returns per-item results.
pub async fn dispatch_batch(
    config: Arc<Config>,
    items: Vec<BulkSendItem>,
) -> Result<DispatchReport> {
    DispatchScheduler::new(config)?.dispatch(items).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discover_email_surfaces_input_errors() {
        let config = Arc::new(ConfigBuilder::new().build().unwrap());
        let request = DiscoveryRequest {
            person: Person::new(""),
            company: "Acme".to_string(),
            domain: "acme.com".to_string(),
            known_pattern: None,
        };
        let err = discover_email(config, &request).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientInput(_)));
    }

    #[tokio::test]
    async fn streaming_helper_forwards_terminal_event() {
        use std::sync::Mutex;

        let config = Arc::new(ConfigBuilder::new().build().unwrap());
        let request = DiscoveryRequest {
            person: Person::new(""),
            company: "Acme".to_string(),
            domain: "acme.com".to_string(),
            known_pattern: None,
        };
        let seen: Arc<Mutex<Vec<StreamEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let outcome = discover_email_streaming(
            config,
            &request,
            "conv-1",
            CancellationToken::new(),
            move |event| sink.lock().unwrap().push(event),
        )
        .await;

        assert!(outcome.is_err());
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }
}
