//! Transactional email sink.
//!
//! Delivery is fire-and-forget: callers hand a message to the sink and move
//! on. A failed send is logged and never propagated — the OTP or account
//! operation that triggered it has already been persisted and the code is
//! independently resendable.

use std::sync::Arc;

/// A single outbound message.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Fire-and-forget notification sink.
pub trait Mailer: Send + Sync {
    fn send(&self, mail: OutboundEmail);
}

pub type SharedMailer = Arc<dyn Mailer>;

/// Logs outbound mail instead of sending it. Default when no provider is
/// configured; also the test double.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: OutboundEmail) {
        tracing::info!(to = %mail.to, subject = %mail.subject, "email (log-only delivery)");
    }
}

/// Posts messages to a transactional email provider webhook.
pub struct WebhookMailer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    from: String,
}

impl WebhookMailer {
    pub fn new(url: String, api_key: Option<String>, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            from,
        }
    }
}

impl Mailer for WebhookMailer {
    fn send(&self, mail: OutboundEmail) {
        let client = self.client.clone();
        let url = self.url.clone();
        let api_key = self.api_key.clone();
        let payload = serde_json::json!({
            "from": self.from,
            "to": mail.to,
            "subject": mail.subject,
            "text": mail.body,
        });

        tokio::spawn(async move {
            let mut request = client.post(&url).json(&payload);
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(to = %payload["to"], "email dispatched");
                }
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "email provider rejected message");
                }
                Err(e) => {
                    tracing::warn!("email delivery failed: {e}");
                }
            }
        });
    }
}

// ── Message templates ─────────────────────────────────────────────────────────

pub fn verification_email(to: &str, code: &str, expiry_minutes: u32) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Verify your Sitecrew email".to_string(),
        body: format!(
            "Your Sitecrew verification code is {code}. \
             It expires in {expiry_minutes} minutes. \
             If you did not sign up, you can ignore this email."
        ),
    }
}

pub fn password_reset_email(to: &str, code: &str, expiry_minutes: u32) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Reset your Sitecrew password".to_string(),
        body: format!(
            "Your password reset code is {code}. \
             It expires in {expiry_minutes} minutes. \
             If you did not request a reset, you can ignore this email."
        ),
    }
}

pub fn welcome_email(to: &str, first_name: &str, company_name: &str) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Welcome to Sitecrew".to_string(),
        body: format!(
            "Hi {first_name}, your company {company_name} is set up and your \
             30-day trial has started. Head to your dashboard to add sites and crew."
        ),
    }
}

pub fn password_changed_email(to: &str) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Your Sitecrew password was changed".to_string(),
        body: "Your password was just changed and all other sessions were signed out. \
               If this wasn't you, reset your password immediately."
            .to_string(),
    }
}
