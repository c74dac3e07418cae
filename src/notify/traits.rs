//! The outbound notification seam.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for notification sends.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// No sender is configured
    #[error("Notifications are disabled")]
    Disabled,

    /// Recipient has no usable address
    #[error("{0} has no email address")]
    MissingEmail(String),

    /// Recipient has no code to put in a reminder
    #[error("{0} has no access code")]
    MissingCode(String),

    /// Transport failed before the service answered
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with a failure status
    #[error("Send rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Which email a notification renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// "Today is your day", carries the recipient's code
    Reminder,
    /// "Someone posted", sent once per author
    NewReflection,
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Reminder => write!(f, "reminder"),
            Template::NewReflection => write!(f, "new_reflection"),
        }
    }
}

/// One email to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: Template,
    /// Template parameters; always includes `to_name` and `to_email`
    pub fields: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(template: Template, to_name: &str, to_email: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("to_name".to_string(), to_name.to_string());
        fields.insert("to_email".to_string(), to_email.to_string());
        Self { template, fields }
    }

    pub fn reminder(to_name: &str, to_email: &str, access_code: &str, site_url: &str) -> Self {
        Self::new(Template::Reminder, to_name, to_email)
            .with_field("access_code", access_code)
            .with_field("website_url", site_url)
    }

    pub fn new_reflection(to_name: &str, to_email: &str, author: &str, site_url: &str) -> Self {
        Self::new(Template::NewReflection, to_name, to_email)
            .with_field("author_name", author)
            .with_field("website_url", site_url)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn recipient(&self) -> &str {
        self.field("to_email").unwrap_or_default()
    }
}

/// A fire-and-forget email sender.
///
/// One call is one attempt. Implementations do not retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name for logs.
    fn id(&self) -> &str;

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Used when no sender is configured; every send fails with
/// [`NotifyError::Disabled`].
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    fn id(&self) -> &str {
        "disabled"
    }

    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reminder_fields() {
        let n = Notification::reminder("Ana", "ana@example.com", "ana0305-abc123", "https://club.example");
        assert_eq!(n.template, Template::Reminder);
        assert_eq!(n.recipient(), "ana@example.com");
        assert_eq!(n.field("to_name"), Some("Ana"));
        assert_eq!(n.field("access_code"), Some("ana0305-abc123"));
        assert_eq!(n.field("website_url"), Some("https://club.example"));
    }

    #[test]
    fn test_new_reflection_fields() {
        let n = Notification::new_reflection("Bo", "bo@example.com", "Ana", "https://club.example");
        assert_eq!(n.template, Template::NewReflection);
        assert_eq!(n.field("author_name"), Some("Ana"));
        assert_eq!(n.field("access_code"), None);
    }

    #[tokio::test]
    async fn test_disabled_notifier() {
        let n = Notification::new(Template::Reminder, "Ana", "ana@example.com");
        assert!(matches!(DisabledNotifier.send(&n).await, Err(NotifyError::Disabled)));
    }
}
