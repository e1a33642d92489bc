use super::{EmailProvider, ProviderError};
use crate::config::GmailConfig;
use crate::models::{EmailResult, EmailTemplate, ProviderConfig, RateLimitConfig};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;

const GMAIL_RELAY: &str = "smtp.gmail.com";

pub struct GmailProvider {
    config: GmailConfig,
    timeout: Duration,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl GmailProvider {
    pub const NAME: &'static str = "gmail";

    pub fn new(config: GmailConfig, timeout: Duration) -> Result<Self, ProviderError> {
        if config.enabled && (config.user.is_empty() || config.app_password.is_empty()) {
            return Err(ProviderError::Configuration(
                "GMAIL_USER and GMAIL_APP_PASSWORD are required when the Gmail provider is enabled"
                    .to_string(),
            ));
        }

        let creds = Credentials::new(config.user.clone(), config.app_password.clone());

        // Gmail enforces strict per-account throughput; keep the pool bounded.
        let pool = PoolConfig::new().max_size(config.max_connections);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(GMAIL_RELAY)
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create SMTP relay: {}", e))
            })?
            .credentials(creds)
            .timeout(Some(timeout))
            .pool_config(pool)
            .build();

        Ok(Self {
            config,
            timeout,
            transport,
        })
    }

    async fn dispatch(
        &self,
        to: &str,
        template: &EmailTemplate,
    ) -> Result<Option<String>, ProviderError> {
        let from_mailbox: Mailbox = format!("{} <{}>", self.config.from_name, self.config.user)
            .parse()
            .map_err(|e| ProviderError::Configuration(format!("Invalid from address: {}", e)))?;

        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| ProviderError::InvalidRecipient(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&template.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(template.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(template.html.clone()),
                    ),
            )
            .map_err(|e| ProviderError::SendFailed(format!("Failed to build message: {}", e)))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(classify_smtp_error)?;

        let message_id = response.message().next().map(|s| s.to_string());
        Ok(message_id)
    }
}

fn classify_smtp_error(err: lettre::transport::smtp::Error) -> ProviderError {
    let detail = err.to_string();

    if err.is_timeout() {
        return ProviderError::Timeout(format!("Gmail SMTP timed out: {}", detail));
    }

    if err.is_permanent() {
        let lowered = detail.to_lowercase();
        if lowered.contains("username and password not accepted") || lowered.contains("535") {
            return ProviderError::Authentication(format!(
                "Gmail rejected the app password: {}",
                detail
            ));
        }
        if lowered.contains("quota") || lowered.contains("limit exceeded") {
            return ProviderError::QuotaExceeded(format!(
                "Gmail daily sending quota exceeded: {}",
                detail
            ));
        }
        return ProviderError::SendFailed(format!("Gmail rejected the message: {}", detail));
    }

    if err.is_transient() {
        return ProviderError::RateLimited(format!("Gmail deferred the message: {}", detail));
    }

    ProviderError::Connection(format!("Gmail SMTP connection failed: {}", detail))
}

#[async_trait]
impl EmailProvider for GmailProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        2
    }

    async fn send_email(&self, to: &str, template: &EmailTemplate) -> EmailResult {
        match self.dispatch(to, template).await {
            Ok(message_id) => {
                tracing::info!(to = %to, "Email sent via Gmail SMTP");
                EmailResult::delivered(Self::NAME, message_id)
            }
            Err(e) => {
                tracing::warn!(to = %to, error = %e, "Gmail delivery failed");
                EmailResult::failed(Self::NAME, e.to_string())
            }
        }
    }

    async fn is_healthy(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.transport.test_connection().await.unwrap_or(false)
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig {
            enabled: self.config.enabled,
            timeout_ms: self.timeout.as_millis() as u64,
            rate_limit: RateLimitConfig {
                requests: self.config.per_minute,
                window_secs: 60,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, user: &str, app_password: &str) -> GmailConfig {
        GmailConfig {
            user: user.to_string(),
            app_password: app_password.to_string(),
            from_name: "Studio Tempo".to_string(),
            enabled,
            max_connections: 3,
            max_messages: 100,
            per_minute: 30,
        }
    }

    #[test]
    fn enabled_without_credentials_fails_construction() {
        let result = GmailProvider::new(config(true, "studio@gmail.com", ""), Duration::from_secs(5));
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }

    #[tokio::test]
    async fn rate_limit_reflects_configured_per_minute_cap() {
        let provider = GmailProvider::new(
            config(true, "studio@gmail.com", "app-password"),
            Duration::from_secs(5),
        )
        .expect("provider should construct");

        let config = provider.config();
        assert_eq!(config.rate_limit.requests, 30);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(provider.priority(), 2);
    }
}
