//! Pattern finder: tries generated candidates against the verification
//! service in order, stopping at the first acceptable verdict.

use crate::core::models::{CandidateAddress, VerificationVerdict};
use crate::verification::EmailVerifier;

use tokio_util::sync::CancellationToken;

/// A candidate accepted by the verification service.
#[derive(Debug, Clone)]
pub(crate) struct SweepHit {
    pub email: String,
    pub verdict: VerificationVerdict,
    pub pattern: String,
}

/// Sweeps `candidates` front to back, issuing at most one verification call
/// per candidate. Stops immediately on the first `Valid` or `CatchAll`
/// verdict; no calls are made after a hit.
///
/// A transport fault or an `Invalid`/`Unknown` verdict counts as rejection
/// for that one candidate and is not retried. Returns `None` when every
/// candidate is rejected. The token is checked before every call, so a
/// cancellation arriving mid-sweep stops the remaining verifications.
pub(crate) async fn sweep_candidates(
    verifier: &dyn EmailVerifier,
    candidates: &[CandidateAddress],
    task_label: &str,
    cancel: &CancellationToken,
) -> Option<SweepHit> {
    let total = candidates.len();
    tracing::info!(target: "discovery_task", "[{}] Starting pattern sweep over {} candidates", task_label, total);

    for (index, candidate) in candidates.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(target: "discovery_task",
                "[{}] Cancelled after {} of {} candidates, stopping sweep.", task_label, index, total);
            return None;
        }
        let candidate_label = format!("[{}:{}/{}] {}", task_label, index + 1, total, candidate.email);

        match verifier.verify(&candidate.email).await {
            Ok(verdict) if verdict.is_acceptable() => {
                tracing::info!(target: "discovery_task",
                    "{} Accepted ({:?}), skipping {} remaining candidates.",
                    candidate_label, verdict, total - (index + 1));
                return Some(SweepHit {
                    email: candidate.email.clone(),
                    verdict,
                    pattern: candidate.pattern.clone(),
                });
            }
            Ok(verdict) => {
                tracing::debug!(target: "discovery_task", "{} Rejected ({:?}).", candidate_label, verdict);
            }
            Err(e) => {
                // Fail-closed: a transport fault rejects this candidate only.
                tracing::warn!(target: "discovery_task", "{} Verification errored, treating as rejection: {}", candidate_label, e);
            }
        }
    }

    tracing::info!(target: "discovery_task", "[{}] Pattern sweep exhausted all {} candidates.", task_label, total);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{AppError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted verifier: pops one response per call and counts calls.
    pub(crate) struct ScriptedVerifier {
        responses: Mutex<Vec<Result<VerificationVerdict>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedVerifier {
        pub(crate) fn new(mut responses: Vec<Result<VerificationVerdict>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmailVerifier for ScriptedVerifier {
        async fn verify(&self, _email: &str) -> Result<VerificationVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(VerificationVerdict::Invalid))
        }
    }

    fn candidates(emails: &[&str]) -> Vec<CandidateAddress> {
        emails
            .iter()
            .map(|e| CandidateAddress {
                email: e.to_string(),
                pattern: "first.last".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn stops_at_first_valid_verdict() {
        let verifier = ScriptedVerifier::new(vec![
            Ok(VerificationVerdict::Invalid),
            Ok(VerificationVerdict::Valid),
            Ok(VerificationVerdict::Valid),
        ]);
        let cands = candidates(&["a@x.com", "b@x.com", "c@x.com"]);

        let hit = sweep_candidates(&verifier, &cands, "test", &CancellationToken::new()).await.unwrap();
        assert_eq!(hit.email, "b@x.com");
        assert_eq!(hit.verdict, VerificationVerdict::Valid);
        // No calls after the accepted candidate.
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn catch_all_is_acceptable() {
        let verifier = ScriptedVerifier::new(vec![Ok(VerificationVerdict::CatchAll)]);
        let cands = candidates(&["a@x.com"]);
        let hit = sweep_candidates(&verifier, &cands, "test", &CancellationToken::new()).await.unwrap();
        assert_eq!(hit.verdict, VerificationVerdict::CatchAll);
    }

    #[tokio::test]
    async fn transport_fault_rejects_only_that_candidate() {
        let verifier = ScriptedVerifier::new(vec![
            Err(AppError::Transport("boom".into())),
            Ok(VerificationVerdict::Valid),
        ]);
        let cands = candidates(&["a@x.com", "b@x.com"]);
        let hit = sweep_candidates(&verifier, &cands, "test", &CancellationToken::new()).await.unwrap();
        assert_eq!(hit.email, "b@x.com");
    }

    #[tokio::test]
    async fn never_exceeds_one_call_per_candidate() {
        let verifier = ScriptedVerifier::new(vec![
            Ok(VerificationVerdict::Invalid),
            Ok(VerificationVerdict::Unknown),
            Err(AppError::Transport("down".into())),
        ]);
        let cands = candidates(&["a@x.com", "b@x.com", "c@x.com"]);
        assert!(sweep_candidates(&verifier, &cands, "test", &CancellationToken::new()).await.is_none());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 3);
    }

    /// Verifier that cancels the shared token during its first call.
    struct CancellingVerifier {
        cancel: CancellationToken,
        pub calls: AtomicUsize,
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
    async fn cancellation_mid_sweep_stops_remaining_calls() {
        let cancel = CancellationToken::new();
        let verifier = CancellingVerifier {
            cancel: cancel.clone(),
            calls: AtomicUsize::new(0),
        };
        let cands = candidates(&["a@x.com", "b@x.com", "c@x.com", "d@x.com"]);

        assert!(sweep_candidates(&verifier, &cands, "test", &cancel).await.is_none());
        // The call that signalled the cancel is the last one issued.
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_candidate_list_makes_no_calls() {
        let verifier = ScriptedVerifier::new(vec![]);
        assert!(sweep_candidates(&verifier, &[], "test", &CancellationToken::new()).await.is_none());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }
}
