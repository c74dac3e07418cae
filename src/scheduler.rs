//! Periodic reminder check
//!
//! Runs once immediately, then on every tick. The day is the unit that
//! matters, so an hourly interval is plenty.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::club::Club;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct ReminderScheduler {
    club: Arc<Club>,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(club: Arc<Club>, interval: Duration) -> Self {
        Self { club, interval }
    }

    /// Run until `shutdown` flips to true or its sender goes away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Reminder scheduler started");

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let run = self.club.check_reminders().await;
                    debug!(due = run.due, sent = run.sent, failed = run.failed, "Scheduled reminder check");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reminder scheduler stopped");
    }
}
