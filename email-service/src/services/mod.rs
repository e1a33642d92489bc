pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod templates;

pub use metrics::{get_metrics, init_metrics, record_email, record_provider_call};
pub use orchestrator::{EmailService, ServiceHealth, SignupNotifications};
pub use providers::{
    EmailProvider, GmailProvider, MockProvider, ProviderError, ResendProvider, RetryProvider,
};
pub use registry::{
    ProviderRegistry, ProviderStatus, RegistryStatus, SelectionStrategy, UnknownProvider,
};
pub use templates::{RenderError, StudioTemplates, TemplateRenderer};
