use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rendered email content. Passed through to the transport unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Normalized outcome of one send attempt.
///
/// Providers never let a transport failure escape; every attempt ends
/// up here, tagged with the provider that actually served it ("none"
/// when nothing was attempted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailResult {
    pub success: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailResult {
    pub fn delivered(provider: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            success: true,
            provider: provider.into(),
            message_id,
            error: None,
        }
    }

    pub fn failed(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider: provider.into(),
            message_id: None,
            error: Some(error.into()),
        }
    }

    pub fn no_provider() -> Self {
        Self::failed("none", "No email providers available")
    }

    /// Re-tag with the provider the registry actually dispatched to.
    pub fn tagged(mut self, provider: &str) -> Self {
        self.provider = provider.to_string();
        self
    }
}

/// Aggregated outcome of a multi-recipient send.
#[derive(Debug, Clone, Serialize)]
pub struct EmailBatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<EmailResult>,
}

impl EmailBatchResult {
    pub fn from_results(results: Vec<EmailResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

/// Declared throughput limit of a provider. The registry never
/// enforces this; enforcement is the provider's own business.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_secs: u64,
}

/// Static provider configuration surfaced through status output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
    pub rate_limit: RateLimitConfig,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_result_counts_partial_failure() {
        let results = vec![
            EmailResult::delivered("resend", Some("id-1".to_string())),
            EmailResult::failed("gmail", "Connection error: refused"),
            EmailResult::delivered("resend", Some("id-2".to_string())),
        ];

        let batch = EmailBatchResult::from_results(results);
        assert_eq!(batch.total, 3);
        assert_eq!(batch.successful, 2);
        assert_eq!(batch.failed, 1);
    }

    #[test]
    fn no_provider_result_is_tagged_none() {
        let result = EmailResult::no_provider();
        assert!(!result.success);
        assert_eq!(result.provider, "none");
        assert_eq!(result.error.as_deref(), Some("No email providers available"));
    }
}
