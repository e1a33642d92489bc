use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DanceStyle {
    Salsa,
    Bachata,
    HipHop,
    Ballet,
    Contemporary,
    Jazz,
}

impl std::fmt::Display for DanceStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DanceStyle::Salsa => write!(f, "Salsa"),
            DanceStyle::Bachata => write!(f, "Bachata"),
            DanceStyle::HipHop => write!(f, "Hip Hop"),
            DanceStyle::Ballet => write!(f, "Ballet"),
            DanceStyle::Contemporary => write!(f, "Contemporary"),
            DanceStyle::Jazz => write!(f, "Jazz"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl std::fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperienceLevel::Beginner => write!(f, "beginner"),
            ExperienceLevel::Intermediate => write!(f, "intermediate"),
            ExperienceLevel::Advanced => write!(f, "advanced"),
        }
    }
}

/// Inbound trial-signup payload. Unknown styles and levels are
/// rejected at deserialization; everything else here.
#[derive(Debug, Deserialize, Validate)]
pub struct TrialSignupRequest {
    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1-50 characters"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 7, max = 20, message = "Phone number must be 7-20 characters"))]
    pub phone: Option<String>,
    pub style: DanceStyle,
    pub experience: ExperienceLevel,
    #[validate(length(max = 5, message = "At most 5 goals"))]
    #[serde(default)]
    pub goals: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSelection {
    pub style: DanceStyle,
    pub experience: ExperienceLevel,
    pub goals: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupMetadata {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// The business event: one trial-class signup. Built once per inbound
/// request and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct TrialSignup {
    pub signup_id: String,
    pub contact: Contact,
    pub class: ClassSelection,
    pub metadata: SignupMetadata,
}

impl TrialSignup {
    pub fn from_request(
        request: TrialSignupRequest,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Self {
        Self {
            signup_id: uuid::Uuid::new_v4().to_string(),
            contact: Contact {
                first_name: request.first_name,
                last_name: request.last_name,
                email: request.email,
                phone: request.phone,
            },
            class: ClassSelection {
                style: request.style,
                experience: request.experience,
                goals: request.goals,
            },
            metadata: SignupMetadata {
                timestamp: Utc::now(),
                user_agent,
                ip_address,
            },
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.contact.first_name, self.contact.last_name)
    }
}
