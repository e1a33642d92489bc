use super::{EmailProvider, ProviderError};
use crate::config::ResendConfig;
use crate::models::{EmailResult, EmailTemplate, ProviderConfig, RateLimitConfig};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const RESEND_DOMAINS_URL: &str = "https://api.resend.com/domains";

pub struct ResendProvider {
    config: ResendConfig,
    timeout: Duration,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendErrorBody {
    #[serde(default)]
    message: String,
}

impl ResendProvider {
    pub const NAME: &'static str = "resend";

    pub fn new(config: ResendConfig, timeout: Duration) -> Result<Self, ProviderError> {
        if config.enabled && config.api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "RESEND_API_KEY is required when the Resend provider is enabled".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            config,
            timeout,
            client,
        })
    }

    async fn dispatch(&self, to: &str, template: &EmailTemplate) -> Result<String, ProviderError> {
        let request = ResendRequest {
            from: format!("{} <{}>", self.config.from_name, self.config.from_email),
            to: [to],
            subject: &template.subject,
            html: &template.html,
            text: &template.text,
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let body: ResendResponse = response.json().await.map_err(|e| {
                ProviderError::SendFailed(format!("Failed to parse Resend response: {}", e))
            })?;
            return Ok(body.id);
        }

        let message = response
            .json::<ResendErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::Authentication(format!("Resend rejected the API key: {}", message))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                ProviderError::RateLimited(format!("Resend rate limit hit: {}", message))
            }
            StatusCode::UNPROCESSABLE_ENTITY => ProviderError::InvalidRecipient(format!(
                "Resend rejected the recipient: {}",
                message
            )),
            _ => ProviderError::SendFailed(format!("Resend returned {}: {}", status, message)),
        })
    }
}

fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(format!("Resend request timed out: {}", err))
    } else if err.is_connect() {
        ProviderError::Connection(format!("Failed to reach Resend: {}", err))
    } else {
        ProviderError::SendFailed(format!("Resend request failed: {}", err))
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        1
    }

    async fn send_email(&self, to: &str, template: &EmailTemplate) -> EmailResult {
        match self.dispatch(to, template).await {
            Ok(id) => {
                tracing::info!(to = %to, message_id = %id, "Email sent via Resend");
                EmailResult::delivered(Self::NAME, Some(id))
            }
            Err(e) => {
                tracing::warn!(to = %to, error = %e, "Resend delivery failed");
                EmailResult::failed(Self::NAME, e.to_string())
            }
        }
    }

    async fn is_healthy(&self) -> bool {
        if !self.config.enabled {
            return false;
        }

        // List-domains is the cheapest authenticated call Resend offers.
        match self
            .client
            .get(RESEND_DOMAINS_URL)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Resend health probe failed");
                false
            }
        }
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig {
            enabled: self.config.enabled,
            timeout_ms: self.timeout.as_millis() as u64,
            // Resend allows two requests per second per API key.
            rate_limit: RateLimitConfig {
                requests: 2,
                window_secs: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, api_key: &str) -> ResendConfig {
        ResendConfig {
            api_key: api_key.to_string(),
            from_email: "noreply@example.com".to_string(),
            from_name: "Studio Tempo".to_string(),
            enabled,
        }
    }

    #[test]
    fn enabled_without_api_key_fails_construction() {
        let result = ResendProvider::new(config(true, ""), Duration::from_secs(5));
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }

    #[test]
    fn disabled_without_api_key_constructs() {
        let provider = ResendProvider::new(config(false, ""), Duration::from_secs(5))
            .expect("disabled provider should construct");
        assert_eq!(provider.name(), "resend");
        assert_eq!(provider.priority(), 1);
        assert!(!provider.config().enabled);
    }
}
