//! Mail API client: builds MIME messages and performs single pre-authorized
//! send calls.
//!
//! Token lifecycle is owned by the caller; this module only checks that a
//! credential is present before a batch and recognizes `invalid_grant`-class
//! rejections so the caller knows to drop its stored credential.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::BulkSendItem;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, MultiPart, SinglePart};
use lettre::Message;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

/// Outcome of one send attempt. Retry decisions belong to the scheduler.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Sent {
        message_id: String,
    },
    Failed {
        status_code: Option<u16>,
        message: String,
    },
}

/// Pre-authorized send call per attempt, plus the pre-batch credential check.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Fails with `AppError::CredentialExpired` when no usable credential is
    /// available; the scheduler aborts the whole batch on that.
    async fn check_credential(&self) -> Result<()>;

    /// Performs exactly one send attempt for one item.
    async fn send(&self, item: &BulkSendItem) -> Result<SendOutcome>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Production transport: raw MIME over the configured mail API with a
/// Bearer token.
#[derive(Clone)]
pub struct ApiMailer {
    http_client: Arc<Client>,
    api_url: String,
    sender_email: String,
    access_token: Option<String>,
}

impl ApiMailer {
    pub fn new(config: &Config, http_client: Arc<Client>) -> Self {
        Self {
            http_client,
            api_url: config.mail_api_url.clone(),
            sender_email: config.mail_sender_email.clone(),
            access_token: config.mail_access_token.clone(),
        }
    }

    /// Builds the RFC 5322 message for one item and returns it
    /// base64url-encoded, the shape the mail API's `raw` field expects.
    pub(crate) fn build_raw_message(&self, item: &BulkSendItem) -> Result<String> {
        let from = self
            .sender_email
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid sender address: {}", e)))?;
        let to = item
            .to
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid recipient '{}': {}", item.to, e)))?;

        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(&item.subject);

        let body_part = if item.html {
            SinglePart::html(sanitize_html(&item.body))
        } else {
            SinglePart::plain(item.body.clone())
        };

        let message = if item.attachments.is_empty() {
            builder
                .multipart(MultiPart::mixed().singlepart(body_part))
                .map_err(|e| AppError::Mail(format!("Failed to build message: {}", e)))?
        } else {
            let mut multipart = MultiPart::mixed().singlepart(body_part);
            for attachment in &item.attachments {
                let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                    AppError::Mail(format!(
                        "Invalid attachment content type '{}': {}",
                        attachment.content_type, e
                    ))
                })?;
                multipart = multipart.singlepart(
                    MimeAttachment::new(attachment.filename.clone())
                        .body(attachment.data.clone(), content_type),
                );
            }
            builder
                .multipart(multipart)
                .map_err(|e| AppError::Mail(format!("Failed to build message: {}", e)))?
        };

        Ok(URL_SAFE_NO_PAD.encode(message.formatted()))
    }
}

/// Whether an error body looks like a revoked or expired grant rather than
/// a transient auth hiccup.
fn is_credential_error(status: u16, body: &str) -> bool {
    let body_lower = body.to_lowercase();
    (status == 401 || status == 403)
        && (body_lower.contains("invalid_grant")
            || body_lower.contains("invalid credentials")
            || body_lower.contains("token has been expired or revoked"))
}

/// Strips active content from an HTML body: script/style blocks, inline
/// event handlers and `javascript:` URLs. Everything else passes through.
pub(crate) fn sanitize_html(html: &str) -> String {
    // Compiled per call; bodies are small and sends are infrequent.
    let script = Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("static regex");
    let style = Regex::new(r"(?is)<style\b[^>]*>.*?</style>").expect("static regex");
    let handlers = Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
        .expect("static regex");
    let js_urls = Regex::new(r#"(?i)(href|src)\s*=\s*("javascript:[^"]*"|'javascript:[^']*')"#)
        .expect("static regex");

    let out = script.replace_all(html, "");
    let out = style.replace_all(&out, "");
    let out = handlers.replace_all(&out, "");
    js_urls.replace_all(&out, "").into_owned()
}

#[async_trait]
impl MailTransport for ApiMailer {
    async fn check_credential(&self) -> Result<()> {
        match self.access_token {
            Some(ref token) if !token.trim().is_empty() => Ok(()),
            _ => Err(AppError::CredentialExpired(
                "no mail credential configured; reconnect the mail account".to_string(),
            )),
        }
    }

    async fn send(&self, item: &BulkSendItem) -> Result<SendOutcome> {
        let token = self.access_token.as_deref().ok_or_else(|| {
            AppError::CredentialExpired("no mail credential configured".to_string())
        })?;

        let raw = self.build_raw_message(item)?;

        tracing::debug!(target: "dispatch_task", "Sending <{}> via {}", item.to, self.api_url);
        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "dispatch_task", "Send request for <{}> failed: {}", item.to, e);
                return Ok(SendOutcome::Failed {
                    status_code: None,
                    message: format!("Request failed: {}", e),
                });
            }
        };

        let status = response.status();
        if status.is_success() {
            let message_id = match response.json::<SendResponse>().await {
                Ok(parsed) => parsed.id,
                Err(_) => String::new(),
            };
            tracing::info!(target: "dispatch_task", "Sent <{}> (message id: {})", item.to, message_id);
            return Ok(SendOutcome::Sent { message_id });
        }

        let body = response.text().await.unwrap_or_default();
        if is_credential_error(status.as_u16(), &body) {
            tracing::error!(target: "dispatch_task", "Mail credential rejected ({}): {}", status, body);
            return Err(AppError::CredentialExpired(format!(
                "mail API rejected the credential ({})",
                status
            )));
        }

        tracing::warn!(target: "dispatch_task", "Send for <{}> returned {}: {}", item.to, status, body);
        Ok(SendOutcome::Failed {
            status_code: Some(status.as_u16()),
            message: format!("Mail API returned {}", status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigBuilder;
    use crate::core::models::Attachment;

    fn mailer() -> ApiMailer {
        let config = ConfigBuilder::new()
            .mail_sender_email("outreach@acme.com")
            .mail_access_token("tok-1")
            .build()
            .unwrap();
        ApiMailer::new(&config, Arc::new(Client::new()))
    }

    fn item() -> BulkSendItem {
        BulkSendItem {
            client_id: "c1".into(),
            to: "jane.doe@acme.com".into(),
            subject: "Quick question — partnership".into(),
            body: "Hi Jane,\n\nShort note.".into(),
            html: false,
            attachments: vec![],
        }
    }

    #[test]
    fn builds_base64url_mime_with_subject_and_recipient() {
        let raw = mailer().build_raw_message(&item()).unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(raw).unwrap();
        let text = String::from_utf8_lossy(&decoded);
        assert!(text.contains("To: jane.doe@acme.com"));
        assert!(text.contains("From: outreach@acme.com"));
        // Non-ASCII subject must be encoded, so the header line exists either
        // verbatim or RFC 2047 encoded.
        assert!(text.contains("Subject: "));
    }

    #[test]
    fn attachments_become_mime_parts() {
        let mut it = item();
        it.attachments.push(Attachment {
            filename: "deck.pdf".into(),
            content_type: "application/pdf".into(),
            data: vec![0x25, 0x50, 0x44, 0x46],
        });
        let raw = mailer().build_raw_message(&it).unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(raw).unwrap();
        let text = String::from_utf8_lossy(&decoded);
        assert!(text.contains("application/pdf"));
        assert!(text.contains("deck.pdf"));
    }

    #[test]
    fn invalid_recipient_is_a_mail_error() {
        let mut it = item();
        it.to = "not-an-address".into();
        assert!(matches!(
            mailer().build_raw_message(&it),
            Err(AppError::Mail(_))
        ));
    }

    #[test]
    fn invalid_attachment_content_type_is_a_mail_error() {
        let mut it = item();
        it.attachments.push(Attachment {
            filename: "x".into(),
            content_type: "not a type".into(),
            data: vec![],
        });
        assert!(matches!(
            mailer().build_raw_message(&it),
            Err(AppError::Mail(_))
        ));
    }

    #[test]
    fn sanitizer_strips_active_content() {
        let html = r#"<p onclick="steal()">Hi</p><script>alert(1)</script>
            <style>p{color:red}</style><a href="javascript:evil()">x</a>"#;
        let clean = sanitize_html(html);
        assert!(!clean.to_lowercase().contains("<script"));
        assert!(!clean.to_lowercase().contains("<style"));
        assert!(!clean.to_lowercase().contains("onclick"));
        assert!(!clean.to_lowercase().contains("javascript:"));
        assert!(clean.contains("<p"));
        assert!(clean.contains("Hi"));
    }

    #[test]
    fn credential_error_detection_requires_auth_status() {
        assert!(is_credential_error(401, r#"{"error":"invalid_grant"}"#));
        assert!(is_credential_error(403, "Token has been expired or revoked"));
        assert!(!is_credential_error(500, "invalid_grant"));
        assert!(!is_credential_error(401, "rate limited"));
    }

    #[tokio::test]
    async fn missing_token_fails_credential_check() {
        let config = ConfigBuilder::new()
            .mail_sender_email("outreach@acme.com")
            .build()
            .unwrap();
        let mailer = ApiMailer::new(&config, Arc::new(Client::new()));
        assert!(matches!(
            mailer.check_credential().await,
            Err(AppError::CredentialExpired(_))
        ));
    }
}
