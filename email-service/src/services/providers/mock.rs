use super::EmailProvider;
use crate::models::{EmailResult, EmailTemplate, ProviderConfig, RateLimitConfig};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// In-memory provider. Substituted for disabled transports so the
/// selection config keeps working in development, and used across the
/// test suite.
pub struct MockProvider {
    name: String,
    priority: u8,
    healthy: AtomicBool,
    fail_remaining: AtomicU64,
    fail_recipient: Mutex<Option<String>>,
    send_count: AtomicU64,
    last_message: Mutex<Option<(String, EmailTemplate)>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            priority,
            healthy: AtomicBool::new(true),
            fail_remaining: AtomicU64::new(0),
            fail_recipient: Mutex::new(None),
            send_count: AtomicU64::new(0),
            last_message: Mutex::new(None),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Fail the next `n` sends, then recover.
    pub fn fail_next(&self, n: u64) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Fail every send addressed to `to`.
    pub fn fail_recipient(&self, to: impl Into<String>) {
        *self.fail_recipient.lock().unwrap() = Some(to.into());
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn last_message(&self) -> Option<(String, EmailTemplate)> {
        self.last_message.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn send_email(&self, to: &str, template: &EmailTemplate) -> EmailResult {
        let count = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_message.lock().unwrap() = Some((to.to_string(), template.clone()));

        let rejected = self
            .fail_recipient
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|blocked| blocked == to);
        if rejected {
            return EmailResult::failed(&self.name, format!("Invalid recipient: {}", to));
        }

        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
        {
            return EmailResult::failed(&self.name, "Send error: simulated failure");
        }

        tracing::info!(
            to = %to,
            subject = %template.subject,
            "[MOCK] Email would be sent"
        );

        EmailResult::delivered(&self.name, Some(format!("mock-{}-{}", self.name, count)))
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig {
            enabled: true,
            timeout_ms: 1_000,
            rate_limit: RateLimitConfig {
                requests: 1_000,
                window_secs: 60,
            },
        }
    }
}
