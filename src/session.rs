//! Authentication, roles and the session cache
//!
//! A session moves from anonymous to either participant or administrator,
//! and back to anonymous on logout. There are no other states.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::access_code;
use crate::calendar::Calendar;
use crate::error::{ClubError, Result};
use crate::model::Participant;

/// What a session is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Anonymous,
    /// Reads unlocked reflections and writes their own
    Participant,
    /// Roster, deletions and the reminder ledger
    Administrator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Anonymous => write!(f, "anonymous"),
            Role::Participant => write!(f, "participant"),
            Role::Administrator => write!(f, "administrator"),
        }
    }
}

/// One viewer's login state. Never part of the shared document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Participant name; names are the join key everywhere
    pub current_user: Option<String>,
    pub is_admin: bool,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn participant(name: impl Into<String>) -> Self {
        Self {
            current_user: Some(name.into()),
            is_admin: false,
        }
    }

    pub fn administrator() -> Self {
        Self {
            current_user: None,
            is_admin: true,
        }
    }

    pub fn role(&self) -> Role {
        if self.is_admin {
            Role::Administrator
        } else if self.current_user.is_some() {
            Role::Participant
        } else {
            Role::Anonymous
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.role() != Role::Anonymous
    }

    pub fn require_authenticated(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ClubError::NotAuthenticated)
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        match self.role() {
            Role::Administrator => Ok(()),
            Role::Participant => Err(ClubError::Forbidden),
            Role::Anonymous => Err(ClubError::NotAuthenticated),
        }
    }

    /// The participant this session writes as.
    pub fn require_participant(&self) -> Result<&str> {
        match (&self.current_user, self.is_admin) {
            (Some(name), false) => Ok(name),
            _ => Err(ClubError::NotAuthenticated),
        }
    }

    pub fn is_user(&self, name: &str) -> bool {
        !self.is_admin && self.current_user.as_deref() == Some(name)
    }
}

/// Decides which session a submitted code opens
pub struct AccessControl {
    admin_secret: String,
}

impl AccessControl {
    pub fn new(admin_secret: impl Into<String>) -> Self {
        Self {
            admin_secret: admin_secret.into(),
        }
    }

    /// Match `submitted` against the administrative secret, then against each
    /// participant's code, ignoring case and whitespace.
    ///
    /// A recognized participant whose anniversary hasn't come yet gets
    /// [`ClubError::NotYetEligible`] rather than a session.
    pub fn authenticate(
        &self,
        submitted: &str,
        participants: &[Participant],
        calendar: &Calendar,
    ) -> Result<Session> {
        if access_code::matches(submitted, &self.admin_secret) {
            info!(role = %Role::Administrator, "Login succeeded");
            return Ok(Session::administrator());
        }

        let participant = participants
            .iter()
            .find(|p| {
                p.access_code()
                    .is_some_and(|code| access_code::matches(submitted, &code))
            })
            .ok_or_else(|| {
                debug!("Login code not recognized");
                ClubError::NotRecognized
            })?;

        if !calendar.has_passed(&participant.anniversary) {
            info!(name = %participant.name, "Login before anniversary, asked to come back");
            return Err(ClubError::NotYetEligible {
                name: participant.name.clone(),
                anniversary: participant.anniversary.clone(),
                today: calendar.today().to_string(),
            });
        }

        info!(name = %participant.name, role = %Role::Participant, "Login succeeded");
        Ok(Session::participant(participant.name.clone()))
    }
}

/// How long a login lasts when nothing else is configured
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum time between sweeps of expired records
const CLEANUP_INTERVAL_SECS: i64 = 300;

struct SessionRecord {
    /// Serialized [`Session`]
    record: String,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Token-keyed cache of serialized sessions with expiration
///
/// Records go away on logout, on expiry, or once the session no longer
/// passes the checks it passed at login.
pub struct SessionCache {
    records: DashMap<Uuid, SessionRecord>,
    ttl: Duration,
    /// Unix seconds of the last sweep
    last_cleanup: AtomicI64,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
            last_cleanup: AtomicI64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `session` and return the token that restores it.
    pub fn store(&self, session: &Session) -> std::result::Result<Uuid, serde_json::Error> {
        let record = serde_json::to_string(session)?;
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.maybe_cleanup(now);

        let token = Uuid::new_v4();
        self.records.insert(token, SessionRecord { record, expires_at });
        Ok(token)
    }

    /// Rebuild the session behind `token`.
    ///
    /// Expired records are dropped. So is a participant session whose
    /// participant has left the roster or whose anniversary is no longer
    /// behind them.
    pub fn restore(
        &self,
        token: &Uuid,
        participants: &[Participant],
        calendar: &Calendar,
    ) -> Option<Session> {
        let record = {
            let entry = self.records.get(token)?;
            if entry.is_expired(Utc::now()) {
                drop(entry);
                debug!("Session expired");
                self.records.remove(token);
                return None;
            }
            entry.record.clone()
        };

        let session: Session = match serde_json::from_str(&record) {
            Ok(session) => session,
            Err(e) => {
                debug!(error = %e, "Discarding unreadable session record");
                self.records.remove(token);
                return None;
            }
        };

        if let (Some(name), false) = (session.current_user.as_deref(), session.is_admin) {
            let Some(participant) = participants.iter().find(|p| p.name == name) else {
                debug!(name, "Session participant no longer on roster");
                self.records.remove(token);
                return None;
            };
            if !calendar.has_passed(&participant.anniversary) {
                info!(name, anniversary = %participant.anniversary, "Session participant not yet eligible, dropping session");
                self.records.remove(token);
                return None;
            }
        }

        Some(session)
    }

    pub fn clear(&self, token: &Uuid) -> bool {
        self.records.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sweep at most once per [`CLEANUP_INTERVAL_SECS`].
    fn maybe_cleanup(&self, now: DateTime<Utc>) {
        let now_secs = now.timestamp();
        let last = self.last_cleanup.load(Ordering::Relaxed);
        if now_secs - last < CLEANUP_INTERVAL_SECS {
            return;
        }

        if self
            .last_cleanup
            .compare_exchange(last, now_secs, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            self.cleanup();
        }
    }

    /// Drop every expired record. Returns how many went.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let count = before.saturating_sub(self.records.len());

        if count > 0 {
            info!("Cleaned up {} expired sessions", count);
        }
        count
    }
}
