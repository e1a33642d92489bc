use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EmailServiceConfig {
    pub common: core_config::Config,
    pub delivery: DeliveryConfig,
    pub resend: ResendConfig,
    pub gmail: GmailConfig,
    pub studio: StudioConfig,
}

/// Selection and dispatch tunables for the provider registry.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// "resend", "gmail" or "auto".
    pub provider: String,
    pub fallback_enabled: bool,
    pub fallback_provider: Option<String>,
    pub health_check_interval_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendConfig {
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailConfig {
    pub user: String,
    pub app_password: String,
    pub from_name: String,
    pub enabled: bool,
    pub max_connections: u32,
    pub max_messages: u32,
    pub per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudioConfig {
    pub name: String,
    pub admin_email: String,
}

impl EmailServiceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(EmailServiceConfig {
            common: common_config,
            delivery: DeliveryConfig {
                provider: get_env("EMAIL_PROVIDER", Some("auto"), is_prod)?.to_lowercase(),
                fallback_enabled: get_env("EMAIL_FALLBACK_ENABLED", Some("true"), is_prod)?
                    .parse()
                    .unwrap_or(true),
                fallback_provider: env::var("EMAIL_FALLBACK_PROVIDER")
                    .ok()
                    .map(|v| v.to_lowercase()),
                health_check_interval_ms: get_env(
                    "EMAIL_HEALTH_CHECK_INTERVAL",
                    Some("60000"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(60_000),
                retry_attempts: get_env("EMAIL_RETRY_ATTEMPTS", Some("0"), is_prod)?
                    .parse()
                    .unwrap_or(0),
                retry_delay_ms: get_env("EMAIL_RETRY_DELAY", Some("500"), is_prod)?
                    .parse()
                    .unwrap_or(500),
                timeout_ms: get_env("EMAIL_TIMEOUT", Some("10000"), is_prod)?
                    .parse()
                    .unwrap_or(10_000),
            },
            resend: ResendConfig {
                api_key: get_env("RESEND_API_KEY", Some(""), is_prod)?,
                from_email: get_env("RESEND_FROM_EMAIL", Some("noreply@example.com"), is_prod)?,
                from_name: get_env("RESEND_FROM_NAME", Some("Studio Tempo"), is_prod)?,
                enabled: env::var("RESEND_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            gmail: GmailConfig {
                user: get_env("GMAIL_USER", Some(""), is_prod)?,
                app_password: get_env("GMAIL_APP_PASSWORD", Some(""), is_prod)?,
                from_name: get_env("GMAIL_FROM_NAME", Some("Studio Tempo"), is_prod)?,
                enabled: env::var("GMAIL_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                max_connections: get_env("GMAIL_MAX_CONNECTIONS", Some("3"), is_prod)?
                    .parse()
                    .unwrap_or(3),
                max_messages: get_env("GMAIL_MAX_MESSAGES", Some("100"), is_prod)?
                    .parse()
                    .unwrap_or(100),
                per_minute: get_env("GMAIL_PER_MINUTE", Some("30"), is_prod)?
                    .parse()
                    .unwrap_or(30),
            },
            studio: StudioConfig {
                name: get_env("STUDIO_NAME", Some("Studio Tempo"), is_prod)?,
                admin_email: get_env("STUDIO_ADMIN_EMAIL", Some("frontdesk@example.com"), is_prod)?,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
