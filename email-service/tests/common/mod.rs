use email_service::config::{
    DeliveryConfig, EmailServiceConfig, GmailConfig, ResendConfig, StudioConfig,
};
use email_service::startup::Application;
use service_core::config::Config as CoreConfig;

pub struct TestApp {
    pub address: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn the app with a config tweak applied before build.
    pub async fn spawn_with(tweak: impl FnOnce(&mut EmailServiceConfig)) -> Self {
        // Use random port for testing (port 0); both transports
        // disabled so mocks serve the sends.
        let mut config = EmailServiceConfig {
            common: CoreConfig { port: 0 },
            delivery: DeliveryConfig {
                provider: "auto".to_string(),
                fallback_enabled: true,
                fallback_provider: Some("gmail".to_string()),
                health_check_interval_ms: 60_000,
                retry_attempts: 0,
                retry_delay_ms: 10,
                timeout_ms: 1_000,
            },
            resend: ResendConfig {
                api_key: String::new(),
                from_email: "test@example.com".to_string(),
                from_name: "Test Studio".to_string(),
                enabled: false, // Use mock
            },
            gmail: GmailConfig {
                user: String::new(),
                app_password: String::new(),
                from_name: "Test Studio".to_string(),
                enabled: false, // Use mock
                max_connections: 1,
                max_messages: 10,
                per_minute: 10,
            },
            studio: StudioConfig {
                name: "Test Studio".to_string(),
                admin_email: "frontdesk@example.com".to_string(),
            },
        };
        tweak(&mut config);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp { address }
    }
}
