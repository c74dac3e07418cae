//! Recording notifier for tests and dev mode.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use super::traits::*;

/// Records every notification it is handed.
///
/// Can be switched to fail, either for everyone or for one address.
pub struct MockNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
    failing_for: Mutex<Option<String>>,
    call_count: AtomicU32,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            failing_for: Mutex::new(None),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn with_failing(self, failing: bool) -> Self {
        self.set_failing(failing);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only sends addressed to `email`.
    pub fn fail_for(&self, email: impl Into<String>) {
        if let Ok(mut target) = self.failing_for.lock() {
            *target = Some(email.into());
        }
    }

    /// Successfully delivered notifications, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, email: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.recipient() == email)
            .collect()
    }

    /// Attempts, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }

    fn should_fail(&self, notification: &Notification) -> bool {
        if self.failing.load(Ordering::SeqCst) {
            return true;
        }
        self.failing_for
            .lock()
            .map(|target| target.as_deref() == Some(notification.recipient()))
            .unwrap_or(false)
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn id(&self) -> &str {
        "mock"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail(notification) {
            return Err(NotifyError::Rejected {
                status: 503,
                body: "Mock notifier failing".to_string(),
            });
        }

        info!(
            template = %notification.template,
            to = notification.recipient(),
            "Mock notification sent"
        );
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}
