//! # Transactional Email
//!
//! Grantees sends one email today: the welcome message after signup. The
//! [`Mailer`] trait keeps the provider swappable; [`ResendMailer`] talks
//! to the Resend HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{WELCOME_EMAIL_FROM, WELCOME_EMAIL_SUBJECT};

pub mod resend;

pub use resend::ResendMailer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    /// No API key is configured, so nothing can be sent.
    #[error("RESEND_API_KEY is not configured")]
    NotConfigured,

    #[error("Invalid recipient address")]
    InvalidRecipient,

    /// The provider answered with an error status.
    #[error("{0}")]
    Rejected(String),

    #[error("email transport error: {0}")]
    Transport(String),
}

/// An outgoing message, in the shape the Resend API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends `message` and returns the provider's response body.
    async fn send(&self, message: &EmailMessage) -> Result<serde_json::Value, EmailError>;
}

/// The post-signup welcome email.
pub fn welcome_email(to: &str) -> Result<EmailMessage, EmailError> {
    let to = to.trim();
    if !to.contains('@') {
        return Err(EmailError::InvalidRecipient);
    }
    Ok(EmailMessage {
        from: WELCOME_EMAIL_FROM.to_string(),
        to: vec![to.to_string()],
        subject: WELCOME_EMAIL_SUBJECT.to_string(),
        html: WELCOME_HTML.to_string(),
    })
}

const WELCOME_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #1a1a2e; margin: 0; padding: 0; background-color: #f4f4f5;">
  <div style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
    <div style="background: linear-gradient(135deg, #10b981 0%, #0d9488 100%); border-radius: 16px 16px 0 0; padding: 40px 30px; text-align: center;">
      <h1 style="color: white; margin: 0; font-size: 28px; font-weight: 700;">Account Created Successfully! 🎉</h1>
    </div>
    <div style="background: white; border-radius: 0 0 16px 16px; padding: 40px 30px;">
      <h2 style="color: #1a1a2e; margin: 0 0 16px 0; font-size: 22px;">Welcome to Grantees</h2>
      <p style="color: #64748b; margin: 0 0 24px 0;">
        You've just joined the smartest way to discover grants, travel funding, hackathons, and programs for Web3 builders.
      </p>
      <div style="background: #f8fafc; border-radius: 12px; padding: 24px; margin: 24px 0;">
        <h3 style="color: #1a1a2e; margin: 0 0 12px 0; font-size: 16px;">What's next?</h3>
        <ul style="color: #64748b; margin: 0; padding-left: 20px;">
          <li style="margin-bottom: 8px;">Complete your builder profile</li>
          <li style="margin-bottom: 8px;">Get personalized grant matches</li>
          <li style="margin-bottom: 8px;">Track deadlines and applications</li>
        </ul>
      </div>
      <p style="color: #94a3b8; font-size: 14px; margin: 32px 0 0 0;">Questions? Reply to this email or join our community.</p>
    </div>
    <div style="text-align: center; padding: 24px; color: #94a3b8; font-size: 12px;">
      <p style="margin: 0;">Grantees. Built for builders.</p>
    </div>
  </div>
</body>
</html>
"#;
