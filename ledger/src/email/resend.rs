//! Resend HTTP API client.

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::{error, info};

use super::{EmailError, EmailMessage, Mailer};
use crate::config::{OUTBOUND_HTTP_TIMEOUT, RESEND_API_BASE};

/// Fallback error text when the provider's body carries no `message`.
const DEFAULT_FAILURE: &str = "Failed to send email";

#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: Client,
    api_base: String,
    api_key: String,
}

impl ResendMailer {
    /// A client for the public Resend endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, EmailError> {
        Self::with_base(RESEND_API_BASE, api_key)
    }

    /// A client for a custom endpoint (tests, proxies).
    pub fn with_base(api_base: impl Into<String>, api_key: impl Into<String>) -> Result<Self, EmailError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EmailError::NotConfigured);
        }
        let client = Client::builder()
            .timeout(OUTBOUND_HTTP_TIMEOUT)
            .build()
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn emails_url(&self) -> String {
        format!("{}/emails", self.api_base)
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<serde_json::Value, EmailError> {
        info!(to = ?message.to, subject = %message.subject, "sending email");

        let response = self
            .client
            .post(self.emails_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(message)
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);

        if !status.is_success() {
            error!(%status, body = %body, "email provider rejected message");
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or(DEFAULT_FAILURE)
                .to_string();
            return Err(EmailError::Rejected(message));
        }

        info!(%status, "email sent");
        Ok(body)
    }
}
