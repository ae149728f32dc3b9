//! Request-scoped data types for discovery and dispatch.
//!
//! Nothing in this module outlives a single request: entities are created
//! when a discovery or dispatch call begins and discarded when it returns.

use serde::{Deserialize, Serialize};

/// The person an email address is being discovered for. Immutable input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
        }
    }
}

/// A generated email address plus the pattern that produced it.
///
/// Never persisted; exists only within one discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAddress {
    pub email: String,
    pub pattern: String,
}

/// Tri-state verdict from the external validation service, plus `Unknown`
/// for any status string this crate does not recognize (fail-closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationVerdict {
    Valid,
    CatchAll,
    Invalid,
    Unknown,
}

impl VerificationVerdict {
    /// Whether this verdict is acceptable for a discovery success.
    pub fn is_acceptable(self) -> bool {
        matches!(self, VerificationVerdict::Valid | VerificationVerdict::CatchAll)
    }

    /// Result status string for an acceptable verdict.
    pub fn as_status(self) -> &'static str {
        match self {
            VerificationVerdict::Valid => "verified",
            VerificationVerdict::CatchAll => "possible",
            VerificationVerdict::Invalid => "invalid",
            VerificationVerdict::Unknown => "unknown",
        }
    }
}

/// Which strategy produced a discovery outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    Pattern,
    Research,
}

/// Outcome of one discovery round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AttemptOutcome {
    Success {
        email: String,
        verdict: VerificationVerdict,
    },
    Failure {
        reason: String,
    },
}

/// One round of the discovery state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryAttempt {
    pub kind: DiscoveryMethod,
    /// 1-3 for research rounds; 0 for the pattern sweep.
    pub attempt_number: u8,
    /// Queries issued during this round (research only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<String>,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Terminal value of the discovery state machine.
///
/// At most one `Success` is ever produced per run; once produced, no
/// further rounds execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum DiscoveryResult {
    Success {
        email: String,
        verification_status: String,
        method: DiscoveryMethod,
    },
    Failure {
        attempts_exhausted: bool,
    },
}

impl DiscoveryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DiscoveryResult::Success { .. })
    }
}

/// Full record of one discovery run: the terminal result plus the trail of
/// rounds that led to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub result: DiscoveryResult,
    pub attempts: Vec<DiscoveryAttempt>,
}

/// UI-facing projection of a discovery round.
///
/// Identity is the monotonically increasing `id` assigned at creation,
/// never reused within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: u64,
    pub label: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Done,
}

/// One event on the step-reporting stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StreamEvent {
    Step {
        step: Step,
    },
    Done {
        done: bool,
        result: DiscoveryResult,
        conversation_id: String,
    },
    Error {
        error: String,
        conversation_id: String,
    },
}

impl StreamEvent {
    /// Whether this event closes the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// An attachment on an outgoing message. `data` is the raw bytes, base64 on
/// the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// One ready-to-send message in a dispatch batch.
///
/// `client_id` is the caller's correlation key back to its UI state and
/// must be unique within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSendItem {
    pub client_id: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// When true, `body` is sanitized and sent as HTML.
    #[serde(default)]
    pub html: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Terminal outcome for one dispatched item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSendResult {
    pub client_id: String,
    pub to: String,
    pub success: bool,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Aggregate counts for a dispatched batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Full response for one dispatch invocation: the summary plus exactly one
/// result per input item (order not significant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
    pub summary: DispatchSummary,
    pub results: Vec<BulkSendResult>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
