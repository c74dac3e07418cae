//! EmailJS REST sender.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::traits::*;

pub const DEFAULT_BASE_URL: &str = "https://api.emailjs.com";

/// Settings for [`EmailJsNotifier`].
#[derive(Debug, Clone)]
pub struct EmailJsConfig {
    pub base_url: String,
    pub service_id: String,
    /// Public key, sent as `user_id`
    pub public_key: String,
    /// Private key, sent as `accessToken` when set
    pub private_key: Option<String>,
    pub reminder_template: String,
    pub new_reflection_template: String,
    pub timeout: Duration,
}

impl Default for EmailJsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            service_id: String::new(),
            public_key: String::new(),
            private_key: None,
            reminder_template: "birthday_reminder".to_string(),
            new_reflection_template: "new_reflection".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Sends through `POST {base_url}/api/v1.0/email/send`.
pub struct EmailJsNotifier {
    client: Client,
    config: EmailJsConfig,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: &'a std::collections::BTreeMap<String, String>,
}

impl EmailJsNotifier {
    pub fn new(config: EmailJsConfig) -> Result<Self, NotifyError> {
        if config.service_id.is_empty() || config.public_key.is_empty() {
            return Err(NotifyError::Config(
                "EmailJS needs a service id and a public key".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn send_url(&self) -> String {
        format!(
            "{}/api/v1.0/email/send",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn template_id(&self, template: Template) -> &str {
        match template {
            Template::Reminder => &self.config.reminder_template,
            Template::NewReflection => &self.config.new_reflection_template,
        }
    }
}

#[async_trait]
impl Notifier for EmailJsNotifier {
    fn id(&self) -> &str {
        "emailjs"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = SendRequest {
            service_id: &self.config.service_id,
            template_id: self.template_id(notification.template),
            user_id: &self.config.public_key,
            access_token: self.config.private_key.as_deref(),
            template_params: &notification.fields,
        };

        debug!(
            template = body.template_id,
            to = notification.recipient(),
            "Sending EmailJS request"
        );

        let response = self
            .client
            .post(self.send_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
