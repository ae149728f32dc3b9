//! Research fallback: bounded web-search-and-extract rounds used when the
//! pattern sweep finds nothing.
//!
//! Each attempt has its own fixed query template set. Queries already issued
//! by earlier attempts are filtered out before any I/O, so a buggy caller
//! retrying a round can never turn this into an unbounded loop.

use crate::core::config::{get_random_sleep_duration, Config};
use crate::core::models::VerificationVerdict;
use crate::search::WebSearcher;
use crate::verification::EmailVerifier;

use regex::Regex;
use std::collections::HashSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Hard ceiling on research rounds, enforced here independently of the
/// state machine.
pub(crate) const MAX_RESEARCH_ATTEMPTS: u8 = 3;

/// Who and where the research rounds are looking for.
#[derive(Debug, Clone)]
pub(crate) struct ResearchTarget {
    pub name: String,
    pub first: String,
    pub last: String,
    pub first_initial: String,
    pub company: String,
    pub domain: String,
}

/// Outcome of one research round. `queries` lists exactly the new queries
/// this round issued, for the caller to fold into `previous_queries`.
#[derive(Debug, Clone)]
pub(crate) enum ResearchOutcome {
    Hit {
        email: String,
        verdict: VerificationVerdict,
        queries: Vec<String>,
    },
    Miss {
        reason: String,
        queries: Vec<String>,
    },
}

/// Builds the fixed query template set for one attempt number.
///
/// Attempt 1 combines name, company and domain; attempt 2 goes domain-scoped
/// and LinkedIn-flavored; attempt 3 broadens with OR-combined queries.
fn attempt_queries(target: &ResearchTarget, attempt_number: u8) -> Vec<String> {
    let ResearchTarget {
        name,
        first,
        last,
        first_initial,
        company,
        domain,
    } = target;
    match attempt_number {
        1 => vec![
            format!("\"{}\" {} email", name, company),
            format!("\"{}\" \"{}\" email address", name, domain),
            format!("\"{}\" {} contact email", name, company),
        ],
        2 => vec![
            format!("\"{}\" email site:{}", name, domain),
            format!("\"{}\" {} linkedin email", name, company),
            format!("\"{}\" \"{}.{}\" email", domain, first, last),
        ],
        3 => vec![
            format!("\"{}\" (\"{}\" OR \"{}\") (email OR contact)", name, company, domain),
            format!(
                "(\"{} {}\" OR \"{}{}\") \"@{}\"",
                first, last, first_initial, last, domain
            ),
        ],
        _ => Vec::new(),
    }
}

/// Extracts addresses on `domain` from page text, keeping only local parts
/// that contain the person's first name, last name, or `<f>last`.
///
/// The substring heuristic over- and under-matches occasionally; it is kept
/// as-is rather than second-guessed.
fn extract_candidates(target: &ResearchTarget, text: &str) -> Vec<String> {
    let pattern = format!(
        r"(?i)\b[a-z0-9][a-z0-9._%+'-]*@{}\b",
        regex::escape(&target.domain)
    );
    let scan_regex = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::error!(target: "research_task", "Failed to build scan regex for {}: {}", target.domain, e);
            return Vec::new();
        }
    };

    let flast = format!("{}{}", target.first_initial, target.last);
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for found in scan_regex.find_iter(text) {
        let email = found.as_str().to_lowercase();
        let local = email.split('@').next().unwrap_or("");
        let matches_name = (target.first.len() > 1 && local.contains(&target.first))
            || (target.last.len() > 1 && local.contains(&target.last))
            || local.contains(&flast);
        if matches_name && seen.insert(email.clone()) {
            candidates.push(email);
        }
    }
    candidates
}

/// Runs one research round.
///
/// Attempt numbers above [`MAX_RESEARCH_ATTEMPTS`] and rounds whose whole
/// template set was already used both fail immediately with zero network
/// calls. Otherwise each new query is searched, scanned and its surviving
/// candidates verified; the first acceptable verdict wins. The token is
/// checked before every search and every verification, so a cancellation
/// arriving mid-round stops the remaining calls.
pub(crate) async fn run_research_attempt(
    config: &Config,
    searcher: &dyn WebSearcher,
    verifier: &dyn EmailVerifier,
    target: &ResearchTarget,
    attempt_number: u8,
    previous_queries: &HashSet<String>,
    cancel: &CancellationToken,
) -> ResearchOutcome {
    let task_label = format!("{}@{} research#{}", target.name, target.domain, attempt_number);

    if attempt_number == 0 || attempt_number > MAX_RESEARCH_ATTEMPTS {
        tracing::warn!(target: "research_task", "[{}] Attempt number out of range, refusing.", task_label);
        return ResearchOutcome::Miss {
            reason: "max attempts reached".to_string(),
            queries: Vec::new(),
        };
    }

    let new_queries: Vec<String> = attempt_queries(target, attempt_number)
        .into_iter()
        .filter(|q| !previous_queries.contains(q))
        .collect();

    if new_queries.is_empty() {
        tracing::warn!(target: "research_task", "[{}] No new queries remain, refusing to repeat earlier searches.", task_label);
        return ResearchOutcome::Miss {
            reason: "no new queries".to_string(),
            queries: Vec::new(),
        };
    }

    tracing::info!(target: "research_task", "[{}] Running {} new queries", task_label, new_queries.len());

    let mut verified_rejects = 0usize;
    // Only queries actually handed to the searcher; the attempt trail and
    // previous_queries must never claim searches that a hit or a cancel
    // short-circuited away.
    let mut issued_queries: Vec<String> = Vec::with_capacity(new_queries.len());
    for (index, query) in new_queries.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(target: "research_task", "[{}] Cancelled before query {}/{}, stopping round.", task_label, index + 1, new_queries.len());
            return ResearchOutcome::Miss {
                reason: "cancelled".to_string(),
                queries: issued_queries,
            };
        }
        tracing::debug!(target: "research_task", "[{}] Query {}/{}: {}", task_label, index + 1, new_queries.len(), query);
        issued_queries.push(query.clone());

        let results = match searcher.search(query).await {
            Ok(r) => r,
            Err(e) => {
                // Fail-closed per query: a search outage skips this query only.
                tracing::warn!(target: "research_task", "[{}] Search failed, skipping query: {}", task_label, e);
                continue;
            }
        };

        let page_text: String = results
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let candidates = extract_candidates(target, &page_text);
        tracing::debug!(target: "research_task", "[{}] Extracted {} candidates from {} results", task_label, candidates.len(), results.len());

        for email in &candidates {
            if cancel.is_cancelled() {
                tracing::info!(target: "research_task", "[{}] Cancelled mid-round, stopping verifications.", task_label);
                return ResearchOutcome::Miss {
                    reason: "cancelled".to_string(),
                    queries: issued_queries,
                };
            }
            if !config.email_regex.is_match(email) {
                tracing::trace!(target: "research_task", "[{}] Skipping malformed scrape: {}", task_label, email);
                continue;
            }
            match verifier.verify(email).await {
                Ok(verdict) if verdict.is_acceptable() => {
                    tracing::info!(target: "research_task", "[{}] Accepted {} ({:?})", task_label, email, verdict);
                    return ResearchOutcome::Hit {
                        email: email.clone(),
                        verdict,
                        queries: issued_queries,
                    };
                }
                Ok(verdict) => {
                    verified_rejects += 1;
                    tracing::debug!(target: "research_task", "[{}] Rejected {} ({:?})", task_label, email, verdict);
                }
                Err(e) => {
                    verified_rejects += 1;
                    tracing::warn!(target: "research_task", "[{}] Verification errored for {}, treating as rejection: {}", task_label, email, e);
                }
            }
        }

        if index + 1 < new_queries.len() {
            sleep(get_random_sleep_duration(config)).await;
        }
    }

    tracing::info!(target: "research_task", "[{}] Round exhausted ({} candidates rejected).", task_label, verified_rejects);
    ResearchOutcome::Miss {
        reason: format!(
            "no verified address found ({} candidates rejected)",
            verified_rejects
        ),
        queries: issued_queries,
    }
}
