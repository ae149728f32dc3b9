//! Generates candidate email addresses for a person at a domain.
//!
//! Pure and deterministic: the same inputs always produce the same ordered
//! candidate list, which the pattern finder tries front to back.

use crate::core::config::Config;
use crate::core::models::CandidateAddress;
use crate::utils::domain::normalize_domain;

/// Removes most non-alphanumeric characters, whitespace, and converts to lowercase.
/// Designed to create usable parts for email local-part generation.
fn sanitize_name_part(part: &str) -> String {
    part.trim()
        .replace(
            |c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'),
            "",
        )
        .to_lowercase()
}

/// Name parts extracted from a full name: first token, last token, first initial.
#[derive(Debug, Clone)]
pub(crate) struct NameParts {
    pub first: String,
    pub last: String,
    pub first_initial: String,
}

impl NameParts {
    /// Splits `name` on whitespace and sanitizes the first and last tokens.
    /// Returns `None` when no usable parts remain.
    pub(crate) fn from_full_name(name: &str) -> Option<Self> {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        let (first_raw, last_raw) = match tokens.as_slice() {
            [] => return None,
            [only] => (*only, *only),
            [first, .., last] => (*first, *last),
        };
        let first = sanitize_name_part(first_raw);
        let last = sanitize_name_part(last_raw);
        if first.is_empty() || last.is_empty() {
            return None;
        }
        let first_initial = first.chars().next()?.to_string();
        Some(Self {
            first,
            last,
            first_initial,
        })
    }
}

/// Generates the ordered candidate list for a person at a domain.
///
/// Priority order (earlier = tried first): `first.last`, `last`, `firstlast`,
/// `first_last`, `<f>last`, `first`, `first-last`. When a `known_pattern`
/// email is supplied, the candidate derived from its separator style is
/// prepended. Candidates that fail the configured address regex are dropped.
///
/// No network I/O. Returns an empty vector when the name or domain is unusable.
pub(crate) fn generate_candidates(
    config: &Config,
    name: &str,
    domain: &str,
    known_pattern: Option<&str>,
) -> Vec<CandidateAddress> {
    tracing::debug!("Generating candidates for '{}' @ '{}'", name, domain);

    let Some(parts) = NameParts::from_full_name(name) else {
        tracing::warn!("Cannot generate candidates: no usable name parts in '{}'", name);
        return Vec::new();
    };
    let domain = match normalize_domain(domain) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!("Cannot generate candidates: invalid domain '{}': {}", domain, e);
            return Vec::new();
        }
    };

    let NameParts {
        first,
        last,
        first_initial,
    } = &parts;

    let mut ordered: Vec<(String, String)> = Vec::with_capacity(8);

    if let Some(known) = known_pattern {
        if let Some(local) = derive_known_local_part(known, &parts) {
            ordered.push(("known_pattern".to_string(), local));
        } else {
            tracing::debug!("Ignoring unusable known pattern '{}'", known);
        }
    }

    ordered.push(("first.last".to_string(), format!("{}.{}", first, last)));
    ordered.push(("last".to_string(), last.clone()));
    ordered.push(("firstlast".to_string(), format!("{}{}", first, last)));
    ordered.push(("first_last".to_string(), format!("{}_{}", first, last)));
    ordered.push(("flast".to_string(), format!("{}{}", first_initial, last)));
    ordered.push(("first".to_string(), first.clone()));
    ordered.push(("first-last".to_string(), format!("{}-{}", first, last)));

    let mut seen = std::collections::HashSet::new();
    let candidates: Vec<CandidateAddress> = ordered
        .into_iter()
        .filter_map(|(pattern, local)| {
            let email = format!("{}@{}", local, domain);
            if !config.email_regex.is_match(&email) {
                tracing::trace!("Generated candidate failed regex validation: {}", email);
                return None;
            }
            if !seen.insert(email.clone()) {
                return None;
            }
            Some(CandidateAddress { email, pattern })
        })
        .collect();

    tracing::debug!(
        "Generated {} candidates for '{}' @ '{}'",
        candidates.len(),
        name,
        domain
    );
    candidates
}

/// Derives this person's local part in the style of an address observed for
/// someone else at the same organization.
///
/// The observed address only reveals its separator, so the mapping is by
/// separator style: `.` means `first.last`, `_` means `first_last`, `-`
/// means `first-last`. An unbroken local part maps to `firstlast` unless it
/// is six characters or fewer, which reads as an initial plus a short
/// surname (`<f>last`). The threshold is fixed so the mapping depends only
/// on the observed address, never on the target person's name.
const FLAST_STYLE_MAX_LEN: usize = 6;

fn derive_known_local_part(known_email: &str, parts: &NameParts) -> Option<String> {
    let local = known_email.split('@').next()?.trim().to_lowercase();
    if local.is_empty() {
        return None;
    }

    let derived = if local.contains('.') {
        format!("{}.{}", parts.first, parts.last)
    } else if local.contains('_') {
        format!("{}_{}", parts.first, parts.last)
    } else if local.contains('-') {
        format!("{}-{}", parts.first, parts.last)
    } else if local.chars().count() <= FLAST_STYLE_MAX_LEN {
        format!("{}{}", parts.first_initial, parts.last)
    } else {
        format!("{}{}", parts.first, parts.last)
    };
    Some(derived)
}
