//! Email discovery state machine.
//!
//! Sequences the pattern sweep and up to three research rounds:
//! `Start -> PatternMatch -> Research(1) -> Research(2) -> Research(3) -> Done`.
//! Rounds run strictly in order, never concurrently, and the machine
//! performs at most [`MAX_TOTAL_ROUNDS`] rounds before terminating. The cap
//! is a cost and latency control: total external verification calls are
//! bounded by the candidate count plus three rounds of research candidates.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{
    AttemptOutcome, DiscoveryAttempt, DiscoveryMethod, DiscoveryReport, DiscoveryResult, Person,
};
use crate::core::stream::StepReporter;
use crate::discovery::finder::sweep_candidates;
use crate::discovery::patterns::{generate_candidates, NameParts};
use crate::discovery::research::{
    run_research_attempt, ResearchOutcome, ResearchTarget, MAX_RESEARCH_ATTEMPTS,
};
use crate::search::{HttpSearcher, WebSearcher};
use crate::verification::{EmailVerifier, HttpVerifier};

use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// One pattern sweep plus up to three research rounds.
pub const MAX_TOTAL_ROUNDS: usize = 1 + MAX_RESEARCH_ATTEMPTS as usize;

/// Input for one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub person: Person,
    pub company: String,
    pub domain: String,
    /// An address already observed at this organization, used to seed the
    /// candidate order.
    pub known_pattern: Option<String>,
}

/// The engine orchestrating discovery runs. Cheap to clone; the HTTP client
/// and collaborators are shared.
#[derive(Clone)]
pub struct DiscoveryEngine {
    config: Arc<Config>,
    verifier: Arc<dyn EmailVerifier>,
    searcher: Arc<dyn WebSearcher>,
}

impl DiscoveryEngine {
    /// Builds an engine with production HTTP collaborators.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        tracing::debug!("Initializing DiscoveryEngine components...");
        let http_client = Arc::new(
            Client::builder()
                .user_agent(&config.user_agent)
                .timeout(config.request_timeout)
                .build()
                .map_err(|e| {
                    AppError::Initialization(format!("Failed to build HTTP client: {}", e))
                })?,
        );
        let verifier = Arc::new(HttpVerifier::new(&config, Arc::clone(&http_client)));
        let searcher = Arc::new(HttpSearcher::new(&config, http_client));
        tracing::info!("DiscoveryEngine initialized successfully.");
        Ok(Self::with_collaborators(config, verifier, searcher))
    }

    /// Builds an engine over explicit collaborators. Tests use this to
    /// substitute scripted fakes.
    pub fn with_collaborators(
        config: Arc<Config>,
        verifier: Arc<dyn EmailVerifier>,
        searcher: Arc<dyn WebSearcher>,
    ) -> Self {
        Self {
            config,
            verifier,
            searcher,
        }
    }

    /// Runs discovery to completion, reporting each round through `reporter`.
    ///
    /// The returned report carries the terminal result plus the full attempt
    /// trail. The caller is responsible for emitting the terminal stream
    /// event (see [`DiscoveryEngine::run_streaming`]).
    pub async fn run(
        &self,
        request: &DiscoveryRequest,
        reporter: &mut StepReporter,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryReport> {
        let task_label = format!("{}@{}", request.person.name, request.domain);
        tracing::info!(target: "discovery_task", "[{}] Starting email discovery", task_label);
        let start_time = Instant::now();

        let parts = NameParts::from_full_name(&request.person.name).ok_or_else(|| {
            AppError::InsufficientInput(format!(
                "No usable name parts in '{}'",
                request.person.name
            ))
        })?;
        let domain = crate::utils::domain::normalize_domain(&request.domain)?;

        let mut attempts: Vec<DiscoveryAttempt> = Vec::with_capacity(MAX_TOTAL_ROUNDS);
        let mut rounds = 0usize;

        // Round 1: pattern sweep.
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        rounds += 1;
        let step = reporter.begin_step("Checking common address patterns").await?;
        let candidates = generate_candidates(
            &self.config,
            &request.person.name,
            &domain,
            request.known_pattern.as_deref(),
        );
        let hit = sweep_candidates(self.verifier.as_ref(), &candidates, &task_label, cancel).await;
        reporter.finish_step(step).await?;

        if let Some(hit) = hit {
            attempts.push(DiscoveryAttempt {
                kind: DiscoveryMethod::Pattern,
                attempt_number: 0,
                queries: Vec::new(),
                outcome: AttemptOutcome::Success {
                    email: hit.email.clone(),
                    verdict: hit.verdict,
                },
            });
            tracing::info!(target: "discovery_task",
                "[{}] Discovery finished in {:.2?} via pattern '{}'", task_label, start_time.elapsed(), hit.pattern);
            return Ok(DiscoveryReport {
                result: DiscoveryResult::Success {
                    email: hit.email,
                    verification_status: hit.verdict.as_status().to_string(),
                    method: DiscoveryMethod::Pattern,
                },
                attempts,
            });
        }
        // A cancelled sweep ends as a miss; do not record it as a genuine
        // all-candidates rejection.
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        attempts.push(DiscoveryAttempt {
            kind: DiscoveryMethod::Pattern,
            attempt_number: 0,
            queries: Vec::new(),
            outcome: AttemptOutcome::Failure {
                reason: format!("all {} candidates rejected", candidates.len()),
            },
        });

        // Rounds 2-4: research fallback, strictly in order.
        let target = ResearchTarget {
            name: request.person.name.clone(),
            first: parts.first.clone(),
            last: parts.last.clone(),
            first_initial: parts.first_initial.clone(),
            company: request.company.clone(),
            domain: domain.clone(),
        };
        let mut previous_queries: HashSet<String> = HashSet::new();

        for attempt_number in 1..=MAX_RESEARCH_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            if rounds >= MAX_TOTAL_ROUNDS {
                // Unreachable with the fixed sequence above; the hard cap
                // stays enforced in code rather than by convention.
                break;
            }
            rounds += 1;

            let step = reporter
                .begin_step(format!("Researching the web (attempt {})", attempt_number))
                .await?;
            let outcome = run_research_attempt(
                &self.config,
                self.searcher.as_ref(),
                self.verifier.as_ref(),
                &target,
                attempt_number,
                &previous_queries,
                cancel,
            )
            .await;
            reporter.finish_step(step).await?;

            match outcome {
                ResearchOutcome::Hit {
                    email,
                    verdict,
                    queries,
                } => {
                    attempts.push(DiscoveryAttempt {
                        kind: DiscoveryMethod::Research,
                        attempt_number,
                        queries,
                        outcome: AttemptOutcome::Success {
                            email: email.clone(),
                            verdict,
                        },
                    });
                    tracing::info!(target: "discovery_task",
                        "[{}] Discovery finished in {:.2?} via research attempt {}",
                        task_label, start_time.elapsed(), attempt_number);
                    return Ok(DiscoveryReport {
                        result: DiscoveryResult::Success {
                            email,
                            verification_status: verdict.as_status().to_string(),
                            method: DiscoveryMethod::Research,
                        },
                        attempts,
                    });
                }
                ResearchOutcome::Miss { reason, queries } => {
                    previous_queries.extend(queries.iter().cloned());
                    attempts.push(DiscoveryAttempt {
                        kind: DiscoveryMethod::Research,
                        attempt_number,
                        queries,
                        outcome: AttemptOutcome::Failure { reason },
                    });
                }
            }
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
        }

        tracing::info!(target: "discovery_task",
            "[{}] Discovery exhausted all {} rounds in {:.2?}", task_label, rounds, start_time.elapsed());
        Ok(DiscoveryReport {
            result: DiscoveryResult::Failure {
                attempts_exhausted: true,
            },
            attempts,
        })
    }

    /// Runs discovery and drives the stream protocol to completion: step
    /// events during the run, then exactly one terminal event. The stream is
    /// closed in every path, including faults and cancellation.
    pub async fn run_streaming(
        &self,
        request: &DiscoveryRequest,
        mut reporter: StepReporter,
        cancel: CancellationToken,
    ) -> Result<DiscoveryReport> {
        match self.run(request, &mut reporter, &cancel).await {
            Ok(report) => {
                reporter.done(report.result.clone()).await?;
                Ok(report)
            }
            Err(AppError::Cancelled) => {
                tracing::info!(target: "discovery_task", "Discovery cancelled by caller");
                reporter.error("cancelled").await.ok();
                Err(AppError::Cancelled)
            }
            Err(e) => {
                tracing::error!(target: "discovery_task", "Discovery failed: {}", e);
                reporter.error(e.to_string()).await.ok();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigBuilder;
    use crate::core::models::{StepStatus, StreamEvent, VerificationVerdict};
    use crate::core::stream::event_channel;
    use crate::search::SearchResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedVerifier {
        accept: Option<&'static str>,
        verdict: VerificationVerdict,
        calls: AtomicUsize,
    }

    impl FixedVerifier {
        fn accepting(email: &'static str, verdict: VerificationVerdict) -> Self {
            Self {
                accept: Some(email),
                verdict,
                calls: AtomicUsize::new(0),
            }
        }

        fn rejecting() -> Self {
            Self {
                accept: None,
                verdict: VerificationVerdict::Invalid,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmailVerifier for FixedVerifier {
        async fn verify(&self, email: &str) -> Result<VerificationVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.accept == Some(email) {
                Ok(self.verdict)
            } else {
                Ok(VerificationVerdict::Invalid)
            }
        }
    }

    struct FixedSearcher {
        content: String,
        calls: AtomicUsize,
    }

    impl FixedSearcher {
        fn new(content: &str) -> Self {
            Self {
                content: content.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WebSearcher for FixedSearcher {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SearchResult {
                title: "page".into(),
                url: "https://example.com".into(),
                content: self.content.clone(),
            }])
        }
    }

    fn engine(
        verifier: Arc<FixedVerifier>,
        searcher: Arc<FixedSearcher>,
    ) -> DiscoveryEngine {
        let config = Arc::new(
            ConfigBuilder::new()
                .sleep_between_requests(0.0, 0.0)
                .build()
                .unwrap(),
        );
        DiscoveryEngine::with_collaborators(config, verifier, searcher)
    }

    fn request() -> DiscoveryRequest {
        DiscoveryRequest {
            person: Person::new("Jane Doe"),
            company: "Acme".into(),
            domain: "acme.com".into(),
            known_pattern: None,
        }
    }

    async fn drain(mut rx: tokio::sync::mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn pattern_hit_skips_research_entirely() {
        let verifier = Arc::new(FixedVerifier::accepting(
            "jane.doe@acme.com",
            VerificationVerdict::Valid,
        ));
        let searcher = Arc::new(FixedSearcher::new(""));
        let engine = engine(Arc::clone(&verifier), Arc::clone(&searcher));

        let (tx, rx) = event_channel();
        let reporter = StepReporter::new(tx, "conv-1");
        let report = engine
            .run_streaming(&request(), reporter, CancellationToken::new())
            .await
            .unwrap();

        match &report.result {
            DiscoveryResult::Success {
                email,
                verification_status,
                method,
            } => {
                assert_eq!(email, "jane.doe@acme.com");
                assert_eq!(verification_status, "verified");
                assert_eq!(*method, DiscoveryMethod::Pattern);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 0);
        // First candidate is first.last, so exactly one verification call.
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
        drop(engine);
        let events = drain(rx).await;
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn exhaustion_records_exactly_four_rounds_and_terminates() {
        let verifier = Arc::new(FixedVerifier::rejecting());
        let searcher = Arc::new(FixedSearcher::new("no addresses here"));
        let engine = engine(Arc::clone(&verifier), Arc::clone(&searcher));

        let (tx, rx) = event_channel();
        let reporter = StepReporter::new(tx, "conv-2");
        let report = engine
            .run_streaming(&request(), reporter, CancellationToken::new())
            .await
            .unwrap();

        match &report.result {
            DiscoveryResult::Failure { attempts_exhausted } => assert!(attempts_exhausted),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(report.attempts.len(), MAX_TOTAL_ROUNDS);
        assert_eq!(report.attempts[0].kind, DiscoveryMethod::Pattern);
        for (i, attempt) in report.attempts[1..].iter().enumerate() {
            assert_eq!(attempt.kind, DiscoveryMethod::Research);
            assert_eq!(attempt.attempt_number as usize, i + 1);
        }
        // 3 research rounds x 3/3/2 templates = 8 searches.
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 8);
        let events = drain(rx).await;
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn research_attempts_share_no_queries() {
        let verifier = Arc::new(FixedVerifier::rejecting());
        let searcher = Arc::new(FixedSearcher::new(""));
        let engine = engine(verifier, Arc::clone(&searcher));

        let (tx, _rx) = event_channel();
        let mut reporter = StepReporter::new(tx, "conv-3");
        let report = engine
            .run(&request(), &mut reporter, &CancellationToken::new())
            .await
            .unwrap();

        let mut all_queries = Vec::new();
        for attempt in &report.attempts {
            all_queries.extend(attempt.queries.iter().cloned());
        }
        let unique: HashSet<&String> = all_queries.iter().collect();
        assert_eq!(unique.len(), all_queries.len());
    }

    #[tokio::test]
    async fn research_hit_stops_later_attempts() {
        let verifier = Arc::new(FixedVerifier::accepting(
            "jdoe@acme.com",
            VerificationVerdict::CatchAll,
        ));
        // The scraped address never appears as a generated pattern hit
        // because the verifier only accepts jdoe and the sweep tries it too.
        let searcher = Arc::new(FixedSearcher::new("reach jdoe@acme.com for a quote"));
        let config = Arc::new(
            ConfigBuilder::new()
                .sleep_between_requests(0.0, 0.0)
                .build()
                .unwrap(),
        );
        let engine = DiscoveryEngine::with_collaborators(config, Arc::clone(&verifier) as _, searcher);

        // jdoe@acme.com is also a pattern candidate, so the sweep finds it.
        let (tx, _rx) = event_channel();
        let mut reporter = StepReporter::new(tx, "conv-4");
        let report = engine
            .run(&request(), &mut reporter, &CancellationToken::new())
            .await
            .unwrap();
        match &report.result {
            DiscoveryResult::Success {
                verification_status,
                method,
                ..
            } => {
                assert_eq!(verification_status, "possible");
                assert_eq!(*method, DiscoveryMethod::Pattern);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn every_step_pairs_running_then_done_before_terminal() {
        let verifier = Arc::new(FixedVerifier::rejecting());
        let searcher = Arc::new(FixedSearcher::new(""));
        let engine = engine(verifier, searcher);

        let (tx, rx) = event_channel();
        let reporter = StepReporter::new(tx, "conv-5");
        engine
            .run_streaming(&request(), reporter, CancellationToken::new())
            .await
            .unwrap();

        let events = drain(rx).await;
        let mut open: HashSet<u64> = HashSet::new();
        let mut seen_terminal = false;
        for ev in &events {
            assert!(!seen_terminal, "no events allowed after terminal");
            match ev {
                StreamEvent::Step { step } => match step.status {
                    StepStatus::Running => assert!(open.insert(step.id), "id reused"),
                    StepStatus::Done => assert!(open.remove(&step.id), "done without running"),
                },
                _ => seen_terminal = true,
            }
        }
        assert!(seen_terminal);
        assert!(open.is_empty(), "steps left running at terminal");
    }

    #[tokio::test]
    async fn cancellation_emits_terminal_error_and_stops_calls() {
        let verifier = Arc::new(FixedVerifier::rejecting());
        let searcher = Arc::new(FixedSearcher::new(""));
        let engine = engine(Arc::clone(&verifier), Arc::clone(&searcher));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, rx) = event_channel();
        let reporter = StepReporter::new(tx, "conv-6");
        let result = engine.run_streaming(&request(), reporter, cancel).await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 0);
        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Error { error, .. } => assert_eq!(error, "cancelled"),
            other => panic!("expected error event, got {:?}", other),
        }
    }

    /// Verifier that cancels the shared token during its first call.
    struct CancellingVerifier {
        cancel: CancellationToken,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmailVerifier for CancellingVerifier {
        async fn verify(&self, _email: &str) -> Result<VerificationVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cancel.cancel();
            Ok(VerificationVerdict::Invalid)
        }
    }

    #[tokio::test]
    async fn cancellation_mid_sweep_issues_no_further_calls() {
        let cancel = CancellationToken::new();
        let verifier = Arc::new(CancellingVerifier {
            cancel: cancel.clone(),
            calls: AtomicUsize::new(0),
        });
        let searcher = Arc::new(FixedSearcher::new("reach jane.doe@acme.com"));
        let config = Arc::new(
            ConfigBuilder::new()
                .sleep_between_requests(0.0, 0.0)
                .build()
                .unwrap(),
        );
        let engine = DiscoveryEngine::with_collaborators(
            config,
            Arc::clone(&verifier) as _,
            Arc::clone(&searcher) as _,
        );

        let (tx, rx) = event_channel();
        let reporter = StepReporter::new(tx, "conv-8");
        let result = engine.run_streaming(&request(), reporter, cancel).await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        // The call that signalled the cancel is the only one; the remaining
        // six pattern candidates and all research rounds are skipped.
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 0);
        let events = drain(rx).await;
        match events.last() {
            Some(StreamEvent::Error { error, .. }) => assert_eq!(error, "cancelled"),
            other => panic!("expected terminal error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unusable_name_surfaces_as_stream_error() {
        let verifier = Arc::new(FixedVerifier::rejecting());
        let searcher = Arc::new(FixedSearcher::new(""));
        let engine = engine(verifier, searcher);

        let mut bad = request();
        bad.person = Person::new("   ");
        let (tx, rx) = event_channel();
        let reporter = StepReporter::new(tx, "conv-7");
        let result = engine
            .run_streaming(&bad, reporter, CancellationToken::new())
            .await;

        assert!(matches!(result, Err(AppError::InsufficientInput(_))));
        let events = drain(rx).await;
        assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
    }
}
