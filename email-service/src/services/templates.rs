use crate::models::{EmailTemplate, TrialSignup};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template rendering failed: {0}")]
    Failed(String),
}

/// Renders the notification pair from a signup event. Pure; failures
/// surface as `RenderError` and are handled at the orchestration
/// boundary.
pub trait TemplateRenderer: Send + Sync {
    fn render_confirmation(&self, signup: &TrialSignup) -> Result<EmailTemplate, RenderError>;
    fn render_admin_alert(&self, signup: &TrialSignup) -> Result<EmailTemplate, RenderError>;
}

pub struct StudioTemplates {
    studio_name: String,
}

impl StudioTemplates {
    pub fn new(studio_name: impl Into<String>) -> Self {
        Self {
            studio_name: studio_name.into(),
        }
    }
}

impl TemplateRenderer for StudioTemplates {
    fn render_confirmation(&self, signup: &TrialSignup) -> Result<EmailTemplate, RenderError> {
        let style = signup.class.style;
        let subject = format!(
            "Your trial {} class at {}",
            style, self.studio_name
        );

        let html = format!(
            "<h1>See you on the dance floor, {first}!</h1>\
             <p>Your trial <strong>{style}</strong> class ({level} level) at {studio} is booked.</p>\
             <p>We'll reach out shortly to confirm your time slot. Wear comfortable clothes and \
             bring a water bottle.</p>\
             <p>— The {studio} team</p>",
            first = signup.contact.first_name,
            style = style,
            level = signup.class.experience,
            studio = self.studio_name,
        );

        let text = format!(
            "See you on the dance floor, {first}!\n\n\
             Your trial {style} class ({level} level) at {studio} is booked.\n\
             We'll reach out shortly to confirm your time slot. Wear comfortable clothes and \
             bring a water bottle.\n\n\
             — The {studio} team",
            first = signup.contact.first_name,
            style = style,
            level = signup.class.experience,
            studio = self.studio_name,
        );

        Ok(EmailTemplate {
            subject,
            html,
            text,
        })
    }

    fn render_admin_alert(&self, signup: &TrialSignup) -> Result<EmailTemplate, RenderError> {
        let subject = format!(
            "New trial signup: {} ({})",
            signup.full_name(),
            signup.class.style
        );

        let phone = signup.contact.phone.as_deref().unwrap_or("not provided");
        let goals = if signup.class.goals.is_empty() {
            "none listed".to_string()
        } else {
            signup.class.goals.join("; ")
        };

        let html = format!(
            "<h2>New trial-class signup</h2>\
             <ul>\
             <li>Name: {name}</li>\
             <li>Email: {email}</li>\
             <li>Phone: {phone}</li>\
             <li>Class: {style} ({level})</li>\
             <li>Goals: {goals}</li>\
             <li>Signed up: {timestamp}</li>\
             </ul>",
            name = signup.full_name(),
            email = signup.contact.email,
            phone = phone,
            style = signup.class.style,
            level = signup.class.experience,
            goals = goals,
            timestamp = signup.metadata.timestamp.to_rfc3339(),
        );

        let text = format!(
            "New trial-class signup\n\n\
             Name: {name}\n\
             Email: {email}\n\
             Phone: {phone}\n\
             Class: {style} ({level})\n\
             Goals: {goals}\n\
             Signed up: {timestamp}",
            name = signup.full_name(),
            email = signup.contact.email,
            phone = phone,
            style = signup.class.style,
            level = signup.class.experience,
            goals = goals,
            timestamp = signup.metadata.timestamp.to_rfc3339(),
        );

        Ok(EmailTemplate {
            subject,
            html,
            text,
        })
    }
}
