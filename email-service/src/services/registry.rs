use crate::models::{EmailResult, EmailTemplate, ProviderConfig};
use crate::services::metrics::record_provider_call;
use crate::services::providers::EmailProvider;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// How the registry resolves which provider serves a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Healthiest registered provider, lowest priority value first.
    Auto,
    /// The named provider, healthy or not: an unhealthy primary still
    /// gets the attempt so the failure is attributable, never silent.
    Primary { name: String },
    /// The named primary when healthy, else the fallback when healthy,
    /// else the primary anyway.
    PrimaryWithFallback { primary: String, fallback: String },
}

impl SelectionStrategy {
    pub fn from_settings(primary: &str, fallback_enabled: bool, fallback: Option<&str>) -> Self {
        if primary.eq_ignore_ascii_case("auto") {
            return SelectionStrategy::Auto;
        }
        match fallback {
            Some(fb) if fallback_enabled && fb != primary => {
                SelectionStrategy::PrimaryWithFallback {
                    primary: primary.to_string(),
                    fallback: fb.to_string(),
                }
            }
            _ => SelectionStrategy::Primary {
                name: primary.to_string(),
            },
        }
    }

    pub fn primary_name(&self) -> &str {
        match self {
            SelectionStrategy::Auto => "auto",
            SelectionStrategy::Primary { name } => name,
            SelectionStrategy::PrimaryWithFallback { primary, .. } => primary,
        }
    }

    pub fn fallback_name(&self) -> Option<&str> {
        match self {
            SelectionStrategy::PrimaryWithFallback { fallback, .. } => Some(fallback),
            _ => None,
        }
    }

    fn with_primary(&self, name: &str) -> SelectionStrategy {
        match self {
            SelectionStrategy::PrimaryWithFallback { fallback, .. } if fallback != name => {
                SelectionStrategy::PrimaryWithFallback {
                    primary: name.to_string(),
                    fallback: fallback.clone(),
                }
            }
            _ => SelectionStrategy::Primary {
                name: name.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

struct RegisteredProvider {
    priority: u8,
    instance: Arc<dyn EmailProvider>,
}

#[derive(Default)]
struct HealthState {
    healthy: HashSet<String>,
    checked_at: Option<DateTime<Utc>>,
    last_refresh: Option<Instant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub priority: u8,
    pub healthy: bool,
    pub config: ProviderConfig,
}

/// Snapshot for the status endpoint and readiness probe.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub total: usize,
    pub healthy: usize,
    pub primary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    pub providers: Vec<ProviderStatus>,
}

/// Holds all registered providers, the healthy-set cache and the live
/// selection strategy. Registration and health refreshes serialize on
/// the write locks; reads stay concurrent.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, RegisteredProvider>>,
    health: RwLock<HealthState>,
    strategy: RwLock<SelectionStrategy>,
    refresh_interval: Duration,
}

impl ProviderRegistry {
    pub fn new(strategy: SelectionStrategy, refresh_interval: Duration) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            health: RwLock::new(HealthState::default()),
            strategy: RwLock::new(strategy),
            refresh_interval,
        }
    }

    /// Register (or replace) a provider under its name and probe it
    /// immediately. Only the new provider's health entry is touched.
    pub async fn register(&self, provider: Arc<dyn EmailProvider>) {
        let name = provider.name().to_string();
        let priority = provider.priority();

        {
            let mut providers = self.providers.write().await;
            let replaced = providers
                .insert(
                    name.clone(),
                    RegisteredProvider {
                        priority,
                        instance: provider.clone(),
                    },
                )
                .is_some();
            if replaced {
                tracing::info!(provider = %name, "Replacing registered provider");
            }
        }

        let healthy = probe(provider).await;
        {
            let mut health = self.health.write().await;
            if healthy {
                health.healthy.insert(name.clone());
            } else {
                health.healthy.remove(&name);
            }
        }

        tracing::info!(provider = %name, priority, healthy, "Provider registered");
    }

    pub async fn provider(&self, name: &str) -> Option<Arc<dyn EmailProvider>> {
        self.providers
            .read()
            .await
            .get(name)
            .map(|p| p.instance.clone())
    }

    /// Resolve the provider the current strategy would dispatch to.
    pub async fn select_provider(&self) -> Option<Arc<dyn EmailProvider>> {
        let strategy = self.strategy.read().await.clone();
        let providers = self.providers.read().await;
        let healthy = self.health.read().await.healthy.clone();

        match strategy {
            SelectionStrategy::Auto => providers
                .values()
                .filter(|p| healthy.contains(p.instance.name()))
                .min_by_key(|p| p.priority)
                .map(|p| p.instance.clone()),
            SelectionStrategy::Primary { name } => {
                providers.get(&name).map(|p| p.instance.clone())
            }
            SelectionStrategy::PrimaryWithFallback { primary, fallback } => {
                match providers.get(&primary) {
                    Some(p) if healthy.contains(primary.as_str()) => Some(p.instance.clone()),
                    unhealthy_primary => {
                        let substitute = providers
                            .get(&fallback)
                            .filter(|_| healthy.contains(fallback.as_str()));
                        match substitute {
                            Some(sub) => {
                                tracing::warn!(
                                    primary = %primary,
                                    fallback = %fallback,
                                    "Primary provider unhealthy; substituting fallback"
                                );
                                Some(sub.instance.clone())
                            }
                            None => unhealthy_primary.map(|p| p.instance.clone()),
                        }
                    }
                }
            }
        }
    }

    /// Healthiest registered provider under Auto ordering, regardless
    /// of the configured strategy.
    pub async fn healthiest_provider(&self) -> Option<Arc<dyn EmailProvider>> {
        let providers = self.providers.read().await;
        let health = self.health.read().await;
        providers
            .values()
            .filter(|p| health.healthy.contains(p.instance.name()))
            .min_by_key(|p| p.priority)
            .map(|p| p.instance.clone())
    }

    /// Dispatch one send through the configured strategy. Never errors:
    /// every outcome is an `EmailResult` tagged with the provider used.
    pub async fn send_email(&self, to: &str, template: &EmailTemplate) -> EmailResult {
        let Some(provider) = self.select_provider().await else {
            tracing::error!(to = %to, "No email providers available");
            record_provider_call("none", "failure");
            return EmailResult::no_provider();
        };

        let name = provider.name().to_string();
        let task_to = to.to_string();
        let task_template = template.clone();
        let handle =
            tokio::spawn(async move { provider.send_email(&task_to, &task_template).await });

        let result = match handle.await {
            Ok(result) => result.tagged(&name),
            Err(e) => {
                tracing::error!(provider = %name, error = %e, "Provider send task failed");
                EmailResult::failed(&name, format!("Provider task failed: {}", e))
            }
        };

        record_provider_call(&name, if result.success { "success" } else { "failure" });
        result
    }

    /// Probe every registered provider concurrently and replace the
    /// healthy set with the results of this round. A failing or
    /// panicking probe marks only its own provider unhealthy.
    pub async fn refresh_health(&self, force: bool) {
        if !force {
            let health = self.health.read().await;
            if let Some(last) = health.last_refresh {
                if last.elapsed() < self.refresh_interval {
                    return;
                }
            }
        }

        let snapshot: Vec<(String, Arc<dyn EmailProvider>)> = {
            let providers = self.providers.read().await;
            providers
                .iter()
                .map(|(name, p)| (name.clone(), p.instance.clone()))
                .collect()
        };

        let probes = snapshot.into_iter().map(|(name, instance)| async move {
            let healthy = probe(instance).await;
            (name, healthy)
        });
        let results = futures::future::join_all(probes).await;

        let mut healthy = HashSet::new();
        for (name, ok) in results {
            tracing::debug!(provider = %name, healthy = ok, "Health probe finished");
            if ok {
                healthy.insert(name);
            }
        }

        let mut health = self.health.write().await;
        health.healthy = healthy;
        health.checked_at = Some(Utc::now());
        health.last_refresh = Some(Instant::now());
    }

    /// Per-provider status, sorted ascending by priority.
    pub async fn available_providers(&self) -> Vec<ProviderStatus> {
        let providers = self.providers.read().await;
        let health = self.health.read().await;

        let mut statuses: Vec<ProviderStatus> = providers
            .iter()
            .map(|(name, p)| ProviderStatus {
                name: name.clone(),
                priority: p.priority,
                healthy: health.healthy.contains(name),
                config: p.instance.config(),
            })
            .collect();
        statuses.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));
        statuses
    }

    pub async fn status(&self) -> RegistryStatus {
        let providers = self.available_providers().await;
        let strategy = self.strategy.read().await;
        let last_checked = self.health.read().await.checked_at;

        RegistryStatus {
            total: providers.len(),
            healthy: providers.iter().filter(|p| p.healthy).count(),
            primary: strategy.primary_name().to_string(),
            fallback: strategy.fallback_name().map(str::to_string),
            last_checked,
            providers,
        }
    }

    pub async fn strategy(&self) -> SelectionStrategy {
        self.strategy.read().await.clone()
    }

    /// Point the live strategy at a new primary. Returns the previous
    /// and new primary names for audit logging.
    pub async fn switch_primary(&self, name: &str) -> Result<(String, String), UnknownProvider> {
        if !self.providers.read().await.contains_key(name) {
            return Err(UnknownProvider(name.to_string()));
        }

        let mut strategy = self.strategy.write().await;
        let previous = strategy.primary_name().to_string();
        *strategy = strategy.with_primary(name);
        Ok((previous, name.to_string()))
    }
}

/// Run a probe in its own task so a panicking provider can only mark
/// itself unhealthy.
async fn probe(provider: Arc<dyn EmailProvider>) -> bool {
    let name = provider.name().to_string();
    match tokio::spawn(async move { provider.is_healthy().await }).await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!(provider = %name, error = %e, "Health probe task failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateLimitConfig;
    use crate::services::providers::MockProvider;
    use async_trait::async_trait;

    fn template() -> EmailTemplate {
        EmailTemplate {
            subject: "Trial class".to_string(),
            html: "<p>See you soon</p>".to_string(),
            text: "See you soon".to_string(),
        }
    }

    fn registry(strategy: SelectionStrategy) -> ProviderRegistry {
        ProviderRegistry::new(strategy, Duration::from_millis(0))
    }

    /// Provider whose health probe panics. Used to prove one bad probe
    /// cannot poison a refresh round.
    struct PanickingProbe;

    #[async_trait]
    impl crate::services::providers::EmailProvider for PanickingProbe {
        fn name(&self) -> &str {
            "broken"
        }

        fn priority(&self) -> u8 {
            1
        }

        async fn send_email(&self, _to: &str, _template: &EmailTemplate) -> EmailResult {
            EmailResult::failed("broken", "Send error: unreachable")
        }

        async fn is_healthy(&self) -> bool {
            panic!("probe blew up");
        }

        fn config(&self) -> ProviderConfig {
            ProviderConfig {
                enabled: true,
                timeout_ms: 1_000,
                rate_limit: RateLimitConfig {
                    requests: 1,
                    window_secs: 1,
                },
            }
        }
    }

    #[tokio::test]
    async fn available_providers_sorted_by_priority() {
        let registry = registry(SelectionStrategy::Auto);
        registry.register(Arc::new(MockProvider::new("gmail", 2))).await;
        registry.register(Arc::new(MockProvider::new("resend", 1))).await;

        let providers = registry.available_providers().await;
        let names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["resend", "gmail"]);
    }

    #[tokio::test]
    async fn dispatch_without_providers_returns_none_tag() {
        let registry = registry(SelectionStrategy::Auto);

        let result = registry.send_email("a@example.com", &template()).await;
        assert!(!result.success);
        assert_eq!(result.provider, "none");
    }

    #[tokio::test]
    async fn healthy_primary_is_selected() {
        let registry = registry(SelectionStrategy::from_settings("resend", true, Some("gmail")));
        let resend = Arc::new(MockProvider::new("resend", 1));
        let gmail = Arc::new(MockProvider::new("gmail", 2));
        gmail.set_healthy(false);
        registry.register(resend).await;
        registry.register(gmail).await;

        let result = registry.send_email("a@example.com", &template()).await;
        assert!(result.success);
        assert_eq!(result.provider, "resend");
    }

    #[tokio::test]
    async fn fallback_substitution_is_observable() {
        let registry = registry(SelectionStrategy::from_settings("resend", true, Some("gmail")));
        let resend = Arc::new(MockProvider::new("resend", 1));
        resend.set_healthy(false);
        registry.register(resend).await;
        registry.register(Arc::new(MockProvider::new("gmail", 2))).await;

        let result = registry.send_email("a@example.com", &template()).await;
        assert!(result.success);
        assert_eq!(result.provider, "gmail");
    }

    #[tokio::test]
    async fn unhealthy_primary_without_fallback_still_gets_the_attempt() {
        let registry = registry(SelectionStrategy::from_settings("resend", false, None));
        let resend = Arc::new(MockProvider::new("resend", 1));
        resend.set_healthy(false);
        resend.fail_next(u64::MAX);
        registry.register(resend.clone()).await;

        let result = registry.send_email("a@example.com", &template()).await;
        assert!(!result.success);
        // Attributable failure from the named primary, not a silent "none".
        assert_eq!(result.provider, "resend");
        assert_eq!(resend.send_count(), 1);
    }

    #[tokio::test]
    async fn auto_selects_the_healthy_provider_despite_priority() {
        let registry = registry(SelectionStrategy::Auto);
        let resend = Arc::new(MockProvider::new("resend", 1));
        resend.set_healthy(false);
        registry.register(resend).await;
        registry.register(Arc::new(MockProvider::new("gmail", 2))).await;

        let result = registry.send_email("a@example.com", &template()).await;
        assert_eq!(result.provider, "gmail");
    }

    #[tokio::test]
    async fn healthiest_provider_follows_probe_results() {
        let registry = registry(SelectionStrategy::Auto);
        let resend = Arc::new(MockProvider::new("resend", 1));
        let gmail = Arc::new(MockProvider::new("gmail", 2));
        registry.register(resend.clone()).await;
        registry.register(gmail).await;

        let healthiest = registry.healthiest_provider().await.expect("both healthy");
        assert_eq!(healthiest.name(), "resend");

        resend.set_healthy(false);
        registry.refresh_health(true).await;

        let healthiest = registry.healthiest_provider().await.expect("gmail healthy");
        assert_eq!(healthiest.name(), "gmail");
    }

    #[tokio::test]
    async fn panicking_probe_marks_only_itself_unhealthy() {
        let registry = registry(SelectionStrategy::Auto);
        registry.register(Arc::new(PanickingProbe)).await;
        registry.register(Arc::new(MockProvider::new("gmail", 2))).await;

        registry.refresh_health(true).await;

        let status = registry.status().await;
        assert_eq!(status.total, 2);
        assert_eq!(status.healthy, 1);
        let healthy: Vec<&str> = status
            .providers
            .iter()
            .filter(|p| p.healthy)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(healthy, vec!["gmail"]);
    }

    #[tokio::test]
    async fn reregistering_a_name_replaces_the_entry() {
        let registry = registry(SelectionStrategy::Auto);
        let first = Arc::new(MockProvider::new("resend", 1));
        let second = Arc::new(MockProvider::new("resend", 1));
        registry.register(first.clone()).await;
        registry.register(second.clone()).await;

        registry.send_email("a@example.com", &template()).await;
        assert_eq!(first.send_count(), 0);
        assert_eq!(second.send_count(), 1);
        assert_eq!(registry.status().await.total, 1);
    }

    #[tokio::test]
    async fn switch_primary_validates_and_reports_previous() {
        let registry = registry(SelectionStrategy::from_settings("resend", true, Some("gmail")));
        registry.register(Arc::new(MockProvider::new("resend", 1))).await;
        registry.register(Arc::new(MockProvider::new("gmail", 2))).await;

        assert!(registry.switch_primary("sendgrid").await.is_err());

        let (previous, current) = registry
            .switch_primary("gmail")
            .await
            .expect("gmail is registered");
        assert_eq!(previous, "resend");
        assert_eq!(current, "gmail");
        assert_eq!(registry.strategy().await.primary_name(), "gmail");
    }

    #[tokio::test]
    async fn template_reaches_the_transport_unchanged() {
        let registry = registry(SelectionStrategy::Auto);
        let mock = Arc::new(MockProvider::new("resend", 1));
        registry.register(mock.clone()).await;

        let template = template();
        registry.send_email("a@example.com", &template).await;

        let (_, delivered) = mock.last_message().expect("mock captured the send");
        assert_eq!(delivered, template);
    }
}
