//! Turns policy decisions into sends and logs every outcome.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use super::traits::*;
use crate::model::Participant;

/// Counts from one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    pub sent: usize,
    pub failed: usize,
}

/// Builds notifications for participants and hands them to a [`Notifier`].
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    site_url: String,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, site_url: impl Into<String>) -> Self {
        Self {
            notifier,
            site_url: site_url.into(),
        }
    }

    pub fn notifier_id(&self) -> &str {
        self.notifier.id()
    }

    /// Send `participant` their anniversary reminder with the code they
    /// already hold.
    pub async fn send_reminder(&self, participant: &Participant) -> Result<(), NotifyError> {
        let email = participant
            .email_address()
            .ok_or_else(|| NotifyError::MissingEmail(participant.name.clone()))?;
        let code = participant
            .access_code()
            .ok_or_else(|| NotifyError::MissingCode(participant.name.clone()))?;

        let notification = Notification::reminder(&participant.name, email, &code, &self.site_url);
        match self.notifier.send(&notification).await {
            Ok(()) => {
                info!(name = %participant.name, "Anniversary reminder sent");
                Ok(())
            }
            Err(e) => {
                warn!(name = %participant.name, error = %e, "Anniversary reminder failed");
                Err(e)
            }
        }
    }

    /// Tell each recipient that `author` posted. Sends run concurrently, once
    /// each; failures are logged and counted.
    pub async fn fan_out(&self, author: &str, recipients: &[Participant]) -> FanOutReport {
        let sends = recipients.iter().filter_map(|recipient| {
            let email = recipient.email_address()?;
            let notification =
                Notification::new_reflection(&recipient.name, email, author, &self.site_url);
            let notifier = Arc::clone(&self.notifier);
            let name = recipient.name.clone();
            Some(async move { (name, notifier.send(&notification).await) })
        });

        let mut report = FanOutReport::default();
        for (name, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(author, recipient = %name, error = %e, "New reflection notice failed");
                    report.failed += 1;
                }
            }
        }

        info!(author, sent = report.sent, failed = report.failed, "Fan-out finished");
        report
    }
}
