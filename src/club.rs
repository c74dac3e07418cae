//! The club: every operation a viewer or the scheduler can invoke
//!
//! [`Club`] gates each call on the caller's [`Session`], applies the change
//! through the [`SyncLayer`], and kicks off notifications. Notification
//! failures are logged and never fail the call that triggered them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::calendar::Calendar;
use crate::error::{ClubError, Result};
use crate::model::Participant;
use crate::notify::{policy, Dispatcher, FanOutReport, Notifier};
use crate::reflections;
use crate::registry::Registry;
use crate::session::{AccessControl, Role, Session, SessionCache};
use crate::store::DocumentStore;
use crate::sync::{ClubEvent, Committed, LoadState, SyncLayer};
use crate::timeline::{self, TimelineEntry};

const LOGOUT_CAPACITY: usize = 32;

/// Construction settings for [`Club`]
#[derive(Debug, Clone)]
pub struct ClubSettings {
    pub admin_secret: String,
    /// Link put in every email
    pub site_url: String,
    pub calendar: Calendar,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub token: Uuid,
    pub role: Role,
    pub session: Session,
}

#[derive(Debug)]
pub struct ReflectionSaved {
    pub first_post: bool,
    pub edit_count: u32,
    pub warning: Option<&'static str>,
    /// Running fan-out, present only for a first post
    pub fan_out: Option<JoinHandle<FanOutReport>>,
}

/// The write view for the current participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyReflection {
    pub name: String,
    pub content: Option<String>,
    pub edit_count: u32,
    pub overthinking: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionView {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessCodeEntry {
    pub name: String,
    pub code: String,
}

/// What an administrator is shown after a roster save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSaved {
    pub codes: Vec<AccessCodeEntry>,
    pub missing_emails: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

impl RosterSaved {
    fn new(registry: &Registry, warning: Option<&'static str>) -> Self {
        let missing_emails = registry.missing_emails();
        Self {
            codes: registry
                .codes()
                .into_iter()
                .map(|(name, code)| AccessCodeEntry { name, code })
                .collect(),
            missing_emails,
            notice: (missing_emails > 0).then(|| {
                format!("{missing_emails} people missing emails - they won't get notifications")
            }),
            warning,
        }
    }
}

/// One row of the reminder ledger view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub name: String,
    pub anniversary: String,
    pub has_email: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub due_today: bool,
}

/// Counts from one reminder check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderRun {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct Club {
    sync: Arc<SyncLayer>,
    access: AccessControl,
    calendar: Calendar,
    dispatcher: Dispatcher,
    sessions: SessionCache,
    /// One reminder check at a time in this process
    reminders: Mutex<()>,
    /// Tokens cleared by logout
    logouts: broadcast::Sender<Uuid>,
}

impl Club {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        settings: ClubSettings,
    ) -> Self {
        Self {
            sync: Arc::new(SyncLayer::new(store)),
            access: AccessControl::new(settings.admin_secret),
            calendar: settings.calendar,
            dispatcher: Dispatcher::new(notifier, settings.site_url),
            sessions: SessionCache::default(),
            reminders: Mutex::new(()),
            logouts: broadcast::channel(LOGOUT_CAPACITY).0,
        }
    }

    pub async fn load(&self) -> LoadState {
        self.sync.load().await
    }

    pub fn sync(&self) -> Arc<SyncLayer> {
        Arc::clone(&self.sync)
    }

    pub fn events(&self) -> broadcast::Receiver<ClubEvent> {
        self.sync.events()
    }

    /// Replace the session cache with one whose logins last `ttl`.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.sessions = SessionCache::new(ttl);
        self
    }

    pub fn notifier_id(&self) -> &str {
        self.dispatcher.notifier_id()
    }

    // ---- sessions ----

    pub async fn login(&self, code: &str) -> Result<LoginOutcome> {
        let session = self
            .sync
            .read(|doc| self.access.authenticate(code, &doc.participants, &self.calendar))
            .await?;

        let token = self.sessions.store(&session).map_err(|e| {
            error!(error = %e, "Failed to record session");
            ClubError::NotAuthenticated
        })?;

        Ok(LoginOutcome {
            token,
            role: session.role(),
            session,
        })
    }

    pub fn logout(&self, token: &Uuid) -> bool {
        let cleared = self.sessions.clear(token);
        debug!(cleared, "Logout");
        if cleared {
            // Nobody listening is fine
            let _ = self.logouts.send(*token);
        }
        cleared
    }

    /// Tokens as they are logged out, for open event streams.
    pub fn logouts(&self) -> broadcast::Receiver<Uuid> {
        self.logouts.subscribe()
    }

    /// The session behind `token`, or anonymous.
    pub async fn session(&self, token: &Uuid) -> Session {
        self.sync
            .read(|doc| self.sessions.restore(token, &doc.participants, &self.calendar))
            .await
            .unwrap_or_default()
    }

    // ---- reflections ----

    pub async fn timeline(&self, session: &Session) -> Result<Vec<TimelineEntry>> {
        session.require_authenticated()?;
        let today = self.calendar.today();
        Ok(self
            .sync
            .read(|doc| timeline::build(doc, session, today))
            .await)
    }

    pub async fn my_reflection(&self, session: &Session) -> Result<MyReflection> {
        let name = session.require_participant()?;
        Ok(self
            .sync
            .read(|doc| MyReflection {
                name: name.to_string(),
                content: reflections::get(doc, name).map(str::to_string),
                edit_count: reflections::edit_count(doc, name),
                overthinking: reflections::is_overthinking(doc, name)
                    .then(|| reflections::overthinking_message(name)),
            })
            .await)
    }

    /// Read one reflection. Owners always can; everyone else only once the
    /// owner's anniversary has passed.
    pub async fn read_reflection(&self, session: &Session, name: &str) -> Result<ReflectionView> {
        session.require_authenticated()?;
        let today = self.calendar.today();
        self.sync
            .read(|doc| {
                if !timeline::can_read(doc, session, name, today) {
                    return Err(match doc.participant(name) {
                        Some(_) => ClubError::Forbidden,
                        None => ClubError::NotFound(name.to_string()),
                    });
                }
                let content = reflections::get(doc, name)
                    .ok_or_else(|| ClubError::NotFound(format!("reflection for {name}")))?;
                Ok(ReflectionView {
                    name: name.to_string(),
                    content: content.to_string(),
                })
            })
            .await
    }

    /// Save the session participant's reflection. A first post starts the
    /// fan-out in the background.
    pub async fn save_reflection(&self, session: &Session, text: &str) -> Result<ReflectionSaved> {
        let owner = session.require_participant()?;
        let committed = self
            .sync
            .commit(|doc| reflections::save(doc, owner, text))
            .await?;
        let warning = committed.warning();
        let outcome = committed.value;

        info!(
            name = owner,
            first_post = outcome.first_post,
            edit_count = outcome.edit_count,
            "Reflection saved"
        );

        let fan_out = if outcome.first_post {
            Some(self.spawn_fan_out(owner).await)
        } else {
            None
        };

        Ok(ReflectionSaved {
            first_post: outcome.first_post,
            edit_count: outcome.edit_count,
            warning,
            fan_out,
        })
    }

    async fn spawn_fan_out(&self, author: &str) -> JoinHandle<FanOutReport> {
        let today = self.calendar.today();
        let recipients: Vec<Participant> = self
            .sync
            .read(|doc| {
                policy::fan_out_recipients(author, &doc.participants, today)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .await;

        let dispatcher = self.dispatcher.clone();
        let author = author.to_string();
        tokio::spawn(async move { dispatcher.fan_out(&author, &recipients).await })
    }

    pub async fn delete_reflection(&self, session: &Session, name: &str) -> Result<Committed<()>> {
        session.require_admin()?;
        let committed = self
            .sync
            .commit(|doc| reflections::delete(doc, name))
            .await?;
        info!(name, "Reflection deleted");
        Ok(committed)
    }

    pub async fn delete_all_reflections(&self, session: &Session) -> Result<Committed<usize>> {
        session.require_admin()?;
        let committed = self
            .sync
            .commit(|doc| Ok(reflections::delete_all(doc)))
            .await?;
        info!(removed = committed.value, "All reflections deleted");
        Ok(committed)
    }

    // ---- roster ----

    /// The roster as an editable draft, never empty.
    pub async fn roster(&self, session: &Session) -> Result<Registry> {
        session.require_admin()?;
        let mut registry = Registry::new(self.sync.read(|doc| doc.participants.clone()).await);
        if registry.is_empty() {
            registry.add(Participant::blank());
        }
        Ok(registry)
    }

    /// Validate `draft` and make it the roster.
    ///
    /// Rows that arrive without a secret keep the one already stored under
    /// their name; everyone else gets a new one.
    pub async fn save_roster(&self, session: &Session, draft: Registry) -> Result<RosterSaved> {
        session.require_admin()?;
        let committed = self
            .sync
            .commit(|doc| {
                let mut draft = draft;
                draft.adopt_secrets(&doc.participants);
                draft.prepare_for_save()?;
                doc.participants = draft.participants().to_vec();
                Ok(draft)
            })
            .await?;

        info!(participants = committed.value.len(), "Roster saved");
        Ok(RosterSaved::new(&committed.value, committed.warning()))
    }

    /// Append one participant to the stored roster.
    pub async fn add_participant(
        &self,
        session: &Session,
        participant: Participant,
    ) -> Result<RosterSaved> {
        session.require_admin()?;
        if participant.name.trim().is_empty() || participant.anniversary.trim().is_empty() {
            return Err(ClubError::IncompleteParticipant);
        }

        let committed = self
            .sync
            .commit(|doc| {
                let mut draft = Registry::new(doc.participants.clone());
                draft.add(participant);
                draft.prepare_for_save()?;
                doc.participants = draft.participants().to_vec();
                Ok(draft)
            })
            .await?;

        info!(participants = committed.value.len(), "Participant added");
        Ok(RosterSaved::new(&committed.value, committed.warning()))
    }

    /// Remove the participant at `index`. Their reflection and counters stay
    /// under their name. The last remaining participant can't be removed.
    pub async fn remove_participant(
        &self,
        session: &Session,
        index: usize,
    ) -> Result<Committed<Participant>> {
        session.require_admin()?;
        let committed = self
            .sync
            .commit(|doc| {
                let mut draft = Registry::new(doc.participants.clone());
                let removed = draft.remove(index)?;
                draft.prune();
                if draft.is_empty() {
                    return Err(ClubError::EmptyRoster);
                }
                doc.participants = draft.into_participants();
                Ok(removed)
            })
            .await?;

        info!(name = %committed.value.name, index, "Participant removed");
        Ok(committed)
    }

    // ---- reminder ledger ----

    pub async fn ledger(&self, session: &Session) -> Result<Vec<LedgerEntry>> {
        session.require_admin()?;
        Ok(self
            .sync
            .read(|doc| {
                doc.participants
                    .iter()
                    .map(|p| LedgerEntry {
                        name: p.name.clone(),
                        anniversary: p.anniversary.clone(),
                        has_email: p.email_address().is_some(),
                        sent_at: doc.emails_sent.get(&p.name).copied(),
                        due_today: self.calendar.is_today(&p.anniversary),
                    })
                    .collect()
            })
            .await)
    }

    /// Record `name`'s reminder as sent without sending it.
    pub async fn mark_sent(&self, session: &Session, name: &str) -> Result<Committed<DateTime<Utc>>> {
        session.require_admin()?;
        let committed = self
            .sync
            .commit(|doc| {
                if doc.participant(name).is_none() {
                    return Err(ClubError::NotFound(name.to_string()));
                }
                let now = Utc::now();
                doc.emails_sent.insert(name.to_string(), now);
                Ok(now)
            })
            .await?;
        info!(name, "Reminder marked as sent");
        Ok(committed)
    }

    /// Forget that `name`'s reminder went out, so the next check sends it
    /// again if it is still their day.
    pub async fn clear_sent(&self, session: &Session, name: &str) -> Result<Committed<()>> {
        session.require_admin()?;
        let committed = self
            .sync
            .commit(|doc| match doc.emails_sent.remove(name) {
                Some(_) => Ok(()),
                None => Err(ClubError::NotFound(format!("ledger entry for {name}"))),
            })
            .await?;
        info!(name, "Reminder ledger entry cleared");
        Ok(committed)
    }

    /// Send every due reminder once.
    ///
    /// A participant is written to the ledger only after their send
    /// succeeds, so a failure is retried by the next check.
    pub async fn check_reminders(&self) -> ReminderRun {
        let _serial = self.reminders.lock().await;
        let today = self.calendar.today();

        let due: Vec<Participant> = self
            .sync
            .read(|doc| {
                policy::due_reminders(&doc.participants, &doc.emails_sent, today)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .await;

        let mut run = ReminderRun {
            due: due.len(),
            ..Default::default()
        };

        for participant in &due {
            if self.dispatcher.send_reminder(participant).await.is_err() {
                run.failed += 1;
                continue;
            }
            run.sent += 1;

            let name = participant.name.clone();
            let marked = self
                .sync
                .commit(|doc| {
                    doc.emails_sent.entry(name).or_insert_with(Utc::now);
                    Ok(())
                })
                .await;
            if let Err(e) = marked {
                warn!(name = %participant.name, error = %e, "Failed to mark reminder as sent");
            }
        }

        if run.due > 0 {
            info!(today = %today, due = run.due, sent = run.sent, failed = run.failed, "Reminder check finished");
        } else {
            debug!(today = %today, "No reminders due");
        }
        run
    }
}
