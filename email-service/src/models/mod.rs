pub mod email;
pub mod signup;

pub use email::{EmailBatchResult, EmailResult, EmailTemplate, ProviderConfig, RateLimitConfig};
pub use signup::{
    ClassSelection, Contact, DanceStyle, ExperienceLevel, SignupMetadata, TrialSignup,
    TrialSignupRequest,
};
