pub mod gmail;
pub mod mock;
pub mod resend;
pub mod retry;

use crate::models::{EmailResult, EmailTemplate, ProviderConfig};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

pub use gmail::GmailProvider;
pub use mock::MockProvider;
pub use resend::ResendProvider;
pub use retry::RetryProvider;

/// Normalized failure categories. Every backend-specific failure shape
/// maps onto one of these so callers never need backend knowledge.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Sending quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

/// One concrete email-delivery backend.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Stable identifier used in logs, results and selection config.
    fn name(&self) -> &str;

    /// Lower values are preferred when more than one provider is healthy.
    fn priority(&self) -> u8;

    /// Deliver one email. Transport failures are normalized into the
    /// returned result; this call must not panic.
    async fn send_email(&self, to: &str, template: &EmailTemplate) -> EmailResult;

    /// Cheap, side-effect-free probe. Internal failures resolve to `false`.
    async fn is_healthy(&self) -> bool;

    fn config(&self) -> ProviderConfig;

    /// Send a labeled diagnostic email so operational checks are
    /// distinguishable from production mail in any inbox or log.
    async fn test_delivery(&self, to: &str) -> EmailResult {
        let template = diagnostic_template(self.name());
        self.send_email(to, &template).await
    }
}

pub(crate) fn diagnostic_template(provider: &str) -> EmailTemplate {
    let stamp = Utc::now().to_rfc3339();
    EmailTemplate {
        subject: format!("[diagnostic] Delivery check via {}", provider),
        html: format!(
            "<p>Delivery check via <strong>{}</strong> at {}. Safe to ignore.</p>",
            provider, stamp
        ),
        text: format!("Delivery check via {} at {}. Safe to ignore.", provider, stamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_test_delivery_sends_labeled_template() {
        let provider = MockProvider::new("mock", 1);

        let result = provider.test_delivery("ops@example.com").await;
        assert!(result.success);

        let (to, template) = provider.last_message().expect("mock captured the send");
        assert_eq!(to, "ops@example.com");
        assert!(template.subject.starts_with("[diagnostic]"));
    }
}
