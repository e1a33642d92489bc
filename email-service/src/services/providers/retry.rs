use super::EmailProvider;
use crate::models::{EmailResult, EmailTemplate, ProviderConfig};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Retry decorator around a provider. Wired in at startup only when
/// EMAIL_RETRY_ATTEMPTS is above zero; nothing retries implicitly.
pub struct RetryProvider {
    inner: Arc<dyn EmailProvider>,
    attempts: u32,
    base_delay: Duration,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn EmailProvider>, attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            attempts,
            base_delay,
        }
    }

    /// Exponential backoff with jitter: base * 2^attempt plus up to
    /// half the base delay of random slack.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempt.min(16));
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(exp.saturating_add(jitter))
    }
}

#[async_trait]
impl EmailProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn priority(&self) -> u8 {
        self.inner.priority()
    }

    async fn send_email(&self, to: &str, template: &EmailTemplate) -> EmailResult {
        let mut result = self.inner.send_email(to, template).await;

        let mut attempt = 0;
        while !result.success && attempt < self.attempts {
            let delay = self.backoff_delay(attempt);
            tracing::warn!(
                provider = %self.inner.name(),
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Retrying failed send"
            );
            tokio::time::sleep(delay).await;
            result = self.inner.send_email(to, template).await;
            attempt += 1;
        }

        result
    }

    async fn is_healthy(&self) -> bool {
        self.inner.is_healthy().await
    }

    fn config(&self) -> ProviderConfig {
        self.inner.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockProvider;

    fn template() -> EmailTemplate {
        EmailTemplate {
            subject: "Hello".to_string(),
            html: "<p>Hello</p>".to_string(),
            text: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let inner = Arc::new(MockProvider::new("flaky", 1));
        inner.fail_next(2);

        let provider = RetryProvider::new(inner.clone(), 3, Duration::from_millis(1));
        let result = provider.send_email("a@example.com", &template()).await;

        assert!(result.success);
        assert_eq!(inner.send_count(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_configured_attempts() {
        let inner = Arc::new(MockProvider::new("down", 1));
        inner.fail_next(u64::MAX);

        let provider = RetryProvider::new(inner.clone(), 2, Duration::from_millis(1));
        let result = provider.send_email("a@example.com", &template()).await;

        assert!(!result.success);
        // One initial attempt plus two retries.
        assert_eq!(inner.send_count(), 3);
    }

    #[tokio::test]
    async fn does_not_retry_successful_sends() {
        let inner = Arc::new(MockProvider::new("steady", 1));

        let provider = RetryProvider::new(inner.clone(), 5, Duration::from_millis(1));
        let result = provider.send_email("a@example.com", &template()).await;

        assert!(result.success);
        assert_eq!(inner.send_count(), 1);
    }
}
