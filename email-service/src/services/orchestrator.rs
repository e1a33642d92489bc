use crate::models::{EmailBatchResult, EmailResult, EmailTemplate, TrialSignup};
use crate::services::metrics::record_email;
use crate::services::registry::{ProviderRegistry, RegistryStatus, UnknownProvider};
use crate::services::templates::{RenderError, TemplateRenderer};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of the signup notification pair. Both legs always present;
/// either may have failed independently.
#[derive(Debug, Clone, Serialize)]
pub struct SignupNotifications {
    pub user: EmailResult,
    pub admin: EmailResult,
}

impl SignupNotifications {
    pub fn success_count(&self) -> usize {
        usize::from(self.user.success) + usize::from(self.admin.success)
    }

    pub fn total(&self) -> usize {
        2
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub healthy: bool,
    pub status: RegistryStatus,
}

/// Maps one business event to the concrete sends it requires and
/// aggregates results without single-point failure. Constructed once
/// at startup and handed to handlers by reference.
pub struct EmailService {
    registry: Arc<ProviderRegistry>,
    renderer: Arc<dyn TemplateRenderer>,
    admin_email: String,
}

impl EmailService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        renderer: Arc<dyn TemplateRenderer>,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            renderer,
            admin_email: admin_email.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Send the confirmation and admin alert for one signup. The legs
    /// run concurrently and neither can cancel or mask the other; a
    /// rendering failure becomes a failed leg, not an error.
    pub async fn send_signup_notifications(&self, signup: &TrialSignup) -> SignupNotifications {
        let confirmation = self.renderer.render_confirmation(signup);
        let alert = self.renderer.render_admin_alert(signup);

        let user_leg = self.send_rendered(&signup.contact.email, confirmation);
        let admin_leg = self.send_rendered(&self.admin_email, alert);

        let (user, admin) = tokio::join!(user_leg, admin_leg);

        record_email("user", if user.success { "sent" } else { "failed" });
        record_email("admin", if admin.success { "sent" } else { "failed" });

        let outcome = SignupNotifications { user, admin };
        tracing::info!(
            signup_id = %signup.signup_id,
            user_provider = %outcome.user.provider,
            admin_provider = %outcome.admin.provider,
            delivered = outcome.success_count(),
            total = outcome.total(),
            "Signup notifications dispatched"
        );
        outcome
    }

    async fn send_rendered(
        &self,
        to: &str,
        template: Result<EmailTemplate, RenderError>,
    ) -> EmailResult {
        match template {
            Ok(template) => self.registry.send_email(to, &template).await,
            Err(e) => {
                tracing::error!(to = %to, error = %e, "Template failed to render");
                EmailResult::failed("none", e.to_string())
            }
        }
    }

    /// Fan one template out to many recipients concurrently.
    pub async fn send_batch(
        &self,
        recipients: &[String],
        template: &EmailTemplate,
    ) -> EmailBatchResult {
        let sends = recipients
            .iter()
            .map(|to| self.registry.send_email(to, template));
        let results = futures::future::join_all(sends).await;
        EmailBatchResult::from_results(results)
    }

    /// Readiness view: healthy iff at least one provider is healthy.
    pub async fn health(&self) -> ServiceHealth {
        self.registry.refresh_health(false).await;
        let status = self.registry.status().await;
        ServiceHealth {
            healthy: status.healthy > 0,
            status,
        }
    }

    /// Runtime administrative switch of the primary provider.
    pub async fn switch_primary_provider(
        &self,
        name: &str,
    ) -> Result<(String, String), UnknownProvider> {
        let (previous, current) = self.registry.switch_primary(name).await?;
        tracing::info!(
            previous = %previous,
            current = %current,
            "Primary email provider switched"
        );
        Ok((previous, current))
    }

    /// Run a diagnostic delivery against a named provider, or whichever
    /// provider the current strategy resolves.
    pub async fn test_delivery(&self, provider: Option<&str>, to: &str) -> EmailResult {
        let target = match provider {
            Some(name) => match self.registry.provider(name).await {
                Some(instance) => instance,
                None => {
                    return EmailResult::failed("none", format!("Unknown provider: {}", name));
                }
            },
            None => match self.registry.select_provider().await {
                Some(instance) => instance,
                None => return EmailResult::no_provider(),
            },
        };

        target.test_delivery(to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrialSignupRequest;
    use crate::services::providers::MockProvider;
    use crate::services::registry::SelectionStrategy;
    use crate::services::templates::StudioTemplates;
    use std::time::Duration;

    const ADMIN: &str = "frontdesk@example.com";

    fn signup() -> TrialSignup {
        let request: TrialSignupRequest = serde_json::from_value(serde_json::json!({
            "first_name": "Mina",
            "last_name": "Okafor",
            "email": "mina@example.com",
            "style": "bachata",
            "experience": "intermediate"
        }))
        .expect("valid request");
        TrialSignup::from_request(request, None, None)
    }

    async fn service_with(mock: Arc<MockProvider>) -> EmailService {
        let registry = Arc::new(ProviderRegistry::new(
            SelectionStrategy::Auto,
            Duration::from_millis(0),
        ));
        registry.register(mock).await;
        EmailService::new(
            registry,
            Arc::new(StudioTemplates::new("Studio Tempo")),
            ADMIN,
        )
    }

    /// Renderer whose admin template always fails.
    struct BrokenAdminRenderer(StudioTemplates);

    impl TemplateRenderer for BrokenAdminRenderer {
        fn render_confirmation(&self, signup: &TrialSignup) -> Result<EmailTemplate, RenderError> {
            self.0.render_confirmation(signup)
        }

        fn render_admin_alert(&self, _signup: &TrialSignup) -> Result<EmailTemplate, RenderError> {
            Err(RenderError::Failed("admin layout missing".to_string()))
        }
    }

    #[tokio::test]
    async fn both_legs_delivered_on_the_happy_path() {
        let mock = Arc::new(MockProvider::new("resend", 1));
        let service = service_with(mock.clone()).await;

        let outcome = service.send_signup_notifications(&signup()).await;

        assert!(outcome.user.success);
        assert!(outcome.admin.success);
        assert_eq!(outcome.success_count(), 2);
        assert_eq!(mock.send_count(), 2);
    }

    #[tokio::test]
    async fn failing_admin_leg_does_not_mask_the_user_leg() {
        let mock = Arc::new(MockProvider::new("resend", 1));
        mock.fail_recipient(ADMIN);
        let service = service_with(mock).await;

        let outcome = service.send_signup_notifications(&signup()).await;

        assert!(outcome.user.success);
        assert!(!outcome.admin.success);
        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.admin.provider, "resend");
    }

    #[tokio::test]
    async fn render_failure_becomes_a_failed_leg_without_a_send() {
        let registry = Arc::new(ProviderRegistry::new(
            SelectionStrategy::Auto,
            Duration::from_millis(0),
        ));
        let mock = Arc::new(MockProvider::new("resend", 1));
        registry.register(mock.clone()).await;

        let service = EmailService::new(
            registry,
            Arc::new(BrokenAdminRenderer(StudioTemplates::new("Studio Tempo"))),
            ADMIN,
        );

        let outcome = service.send_signup_notifications(&signup()).await;

        assert!(outcome.user.success);
        assert!(!outcome.admin.success);
        assert_eq!(outcome.admin.provider, "none");
        // Only the user leg reached the transport.
        assert_eq!(mock.send_count(), 1);
    }

    #[tokio::test]
    async fn batch_send_aggregates_partial_failure() {
        let mock = Arc::new(MockProvider::new("resend", 1));
        mock.fail_recipient("bad@example.com");
        let service = service_with(mock).await;

        let template = EmailTemplate {
            subject: "Schedule update".to_string(),
            html: "<p>New schedule</p>".to_string(),
            text: "New schedule".to_string(),
        };
        let recipients = vec![
            "a@example.com".to_string(),
            "bad@example.com".to_string(),
            "c@example.com".to_string(),
        ];

        let batch = service.send_batch(&recipients, &template).await;
        assert_eq!(batch.total, 3);
        assert_eq!(batch.successful, 2);
        assert_eq!(batch.failed, 1);
    }

    #[tokio::test]
    async fn health_reflects_provider_state() {
        let mock = Arc::new(MockProvider::new("resend", 1));
        let service = service_with(mock.clone()).await;

        assert!(service.health().await.healthy);

        mock.set_healthy(false);
        service.registry().refresh_health(true).await;
        assert!(!service.health().await.healthy);
    }

    #[tokio::test]
    async fn test_delivery_reports_unknown_provider() {
        let service = service_with(Arc::new(MockProvider::new("resend", 1))).await;

        let result = service.test_delivery(Some("sendgrid"), "ops@example.com").await;
        assert!(!result.success);
        assert_eq!(result.provider, "none");

        let result = service.test_delivery(Some("resend"), "ops@example.com").await;
        assert!(result.success);
        assert_eq!(result.provider, "resend");
    }
}
