//! Application startup and lifecycle management.
//!
//! Wires the provider registry from configuration (real transports
//! when enabled, mocks otherwise), starts the background health
//! refresh, and serves the HTTP API.

use crate::config::EmailServiceConfig;
use crate::handlers;
use crate::services::metrics::get_metrics;
use crate::services::orchestrator::EmailService;
use crate::services::providers::{
    EmailProvider, GmailProvider, MockProvider, ResendProvider, RetryProvider,
};
use crate::services::registry::{ProviderRegistry, SelectionStrategy};
use crate::services::templates::StudioTemplates;
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: EmailServiceConfig,
    pub registry: Arc<ProviderRegistry>,
    pub email_service: Arc<EmailService>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: EmailServiceConfig) -> Result<Self, AppError> {
        let strategy = SelectionStrategy::from_settings(
            &config.delivery.provider,
            config.delivery.fallback_enabled,
            config.delivery.fallback_provider.as_deref(),
        );
        let registry = Arc::new(ProviderRegistry::new(
            strategy,
            config.delivery.health_check_interval(),
        ));

        let resend: Arc<dyn EmailProvider> = if config.resend.enabled {
            let provider = ResendProvider::new(config.resend.clone(), config.delivery.timeout())
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            tracing::info!("Resend provider initialized");
            Arc::new(provider)
        } else {
            tracing::info!("Resend provider disabled, registering mock");
            Arc::new(MockProvider::new(ResendProvider::NAME, 1))
        };

        let gmail: Arc<dyn EmailProvider> = if config.gmail.enabled {
            let provider = GmailProvider::new(config.gmail.clone(), config.delivery.timeout())
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            tracing::info!("Gmail SMTP provider initialized");
            Arc::new(provider)
        } else {
            tracing::info!("Gmail provider disabled, registering mock");
            Arc::new(MockProvider::new(GmailProvider::NAME, 2))
        };

        let mut providers = vec![resend, gmail];
        if config.delivery.retry_attempts > 0 {
            providers = providers
                .into_iter()
                .map(|p| {
                    Arc::new(RetryProvider::new(
                        p,
                        config.delivery.retry_attempts,
                        config.delivery.retry_delay(),
                    )) as Arc<dyn EmailProvider>
                })
                .collect();
            tracing::info!(
                attempts = config.delivery.retry_attempts,
                "Retry decorator enabled for all providers"
            );
        }

        for provider in providers {
            registry.register(provider).await;
        }

        let renderer = Arc::new(StudioTemplates::new(config.studio.name.clone()));
        let email_service = Arc::new(EmailService::new(
            registry.clone(),
            renderer,
            config.studio.admin_email.clone(),
        ));

        // Keep the healthy-set cache warm in the background. A zero
        // interval would panic in tokio; clamp to one second.
        {
            let registry = registry.clone();
            let interval = config
                .delivery
                .health_check_interval()
                .max(std::time::Duration::from_secs(1));
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // The first tick fires immediately; registration already probed.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    registry.refresh_health(true).await;
                }
            });
        }

        // Bind listener (port 0 = random port for testing)
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Email service listening on port {}", port);

        let state = AppState {
            config,
            registry,
            email_service,
        };

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(metrics_endpoint))
            .route("/api/signup", post(handlers::trial_signup))
            .route("/api/email/status", get(handlers::email_status))
            .route("/api/email/provider", post(handlers::switch_provider))
            .route("/api/email/test", post(handlers::test_delivery))
            // The marketing site posts the signup from the browser.
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = Self::router(self.state);
        axum::serve(self.listener, router).await
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
