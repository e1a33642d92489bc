pub mod admin;
pub mod health;
pub mod signup;
pub mod status;

pub use admin::{switch_provider, test_delivery};
pub use health::{health_check, readiness_check};
pub use signup::trial_signup;
pub use status::email_status;
