//! Outbound email transport
//!
//! Transports report per-message outcomes as data (`DeliveryReceipt`), never
//! as `Err`: one bad recipient must not abort a batch.

use async_trait::async_trait;
use outreach_common::config::EmailConfig;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("outreach-campaigns/", env!("CARGO_PKG_VERSION"));

/// Message handed to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Outcome of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryReceipt {
    pub fn delivered() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Transport construction errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Anything that can deliver a rendered email
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &'static str;

    /// Deliver one message
    async fn send(&self, email: &OutboundEmail) -> DeliveryReceipt;
}

/// Transport used when no provider credentials are configured
pub struct UnconfiguredTransport;

#[async_trait]
impl EmailTransport for UnconfiguredTransport {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn send(&self, email: &OutboundEmail) -> DeliveryReceipt {
        tracing::error!(recipient = %email.to, "Cannot send email - transport not configured");
        DeliveryReceipt::failed("Email service not configured")
    }
}

/// HTTP transport speaking the SendGrid v3 `mail/send` JSON format
pub struct HttpEmailTransport {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

/// Provider error body: `{ "errors": [{ "message": "..." }] }`
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    errors: Vec<ProviderErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorItem {
    message: String,
}

impl HttpEmailTransport {
    pub fn new(config: &EmailConfig, api_key: impl Into<String>) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            api_key: api_key.into(),
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }

    fn payload(&self, email: &OutboundEmail) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.from_email, "name": self.from_name },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": html_to_text(&email.html) },
                { "type": "text/html", "value": email.html },
            ],
        })
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, email: &OutboundEmail) -> DeliveryReceipt {
        tracing::debug!(recipient = %email.to, subject = %email.subject, "Dispatching email");

        let response = match self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(email))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(recipient = %email.to, error = %e, "Email dispatch failed");
                return DeliveryReceipt::failed(e.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            tracing::debug!(recipient = %email.to, status = status.as_u16(), "Email accepted");
            return DeliveryReceipt::delivered();
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ProviderErrorBody>(&body)
            .ok()
            .map(|parsed| {
                parsed
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|joined| !joined.is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        tracing::warn!(
            recipient = %email.to,
            status = status.as_u16(),
            error = %detail,
            "Email rejected by provider"
        );
        DeliveryReceipt::failed(detail)
    }
}

/// Pick a transport for the given settings
///
/// Missing credentials are not fatal: the service starts and every send
/// fails with "Email service not configured".
pub fn build_transport(config: &EmailConfig) -> Result<Arc<dyn EmailTransport>, TransportError> {
    match config.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => Ok(Arc::new(HttpEmailTransport::new(config, key)?)),
        None => {
            tracing::warn!("Email API key not set - emails will not be sent");
            Ok(Arc::new(UnconfiguredTransport))
        }
    }
}

/// Plain-text alternative: decoded text nodes, one non-blank line each
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text: String = document.root_element().text().collect();
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
