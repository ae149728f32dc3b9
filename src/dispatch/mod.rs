//! Bulk mail dispatch: MIME assembly, the mail API transport, and the
//! retrying worker-pool scheduler.

pub mod mailer;
pub mod retry;
pub mod scheduler;

pub use mailer::{ApiMailer, MailTransport, SendOutcome};
pub use retry::{backoff_after, is_retryable, RETRYABLE_STATUSES};
pub use scheduler::DispatchScheduler;
