//! The shared document and its participants
//!
//! One [`SharedDocument`] is the unit of persistence and synchronization.
//! Everything is keyed by participant name, so renaming a participant
//! orphans their reflection, counters and ledger entry.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::access_code;

/// Current on-the-wire schema version
///
/// - 0: unversioned documents (`friends`, `birthday`, `password`,
///   `randomSuffix`, empty strings for missing values, no `emailsSent`)
/// - 1: renamed fields, absent values omitted, sent ledger
pub const SCHEMA_VERSION: u32 = 1;

/// One member of the club
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default)]
    pub name: String,

    /// `DD/MM`, no year
    #[serde(default, alias = "birthday")]
    pub anniversary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, alias = "password", skip_serializing_if = "Option::is_none")]
    pub access_secret: Option<String>,

    #[serde(default, alias = "randomSuffix", skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl Participant {
    pub fn new(name: impl Into<String>, anniversary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            anniversary: anniversary.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// An empty row for the roster editor.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Email address, if one is set and not blank.
    pub fn email_address(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    pub fn has_secret(&self) -> bool {
        self.access_secret.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// The code this participant logs in with.
    ///
    /// Records written before secrets were stored have their code rebuilt
    /// from the stored suffix. A record with neither has no code at all;
    /// a suffix is never invented here.
    pub fn access_code(&self) -> Option<String> {
        if let Some(secret) = self.access_secret.as_deref().filter(|s| !s.is_empty()) {
            return Some(secret.to_string());
        }
        self.suffix
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|suffix| access_code::generate(&self.name, &self.anniversary, Some(suffix)))
    }

    fn clear_blank_fields(&mut self) {
        for field in [&mut self.email, &mut self.access_secret, &mut self.suffix] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
    }
}

/// The whole shared state, written and synchronized as a single value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDocument {
    #[serde(default)]
    pub schema_version: u32,

    #[serde(default, alias = "friends")]
    pub participants: Vec<Participant>,

    #[serde(default)]
    pub reflections: BTreeMap<String, String>,

    #[serde(default)]
    pub edit_counts: BTreeMap<String, u32>,

    #[serde(default)]
    pub has_posted_first: BTreeMap<String, bool>,

    /// When each participant's anniversary reminder went out
    #[serde(default)]
    pub emails_sent: BTreeMap<String, DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for SharedDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            participants: Vec::new(),
            reflections: BTreeMap::new(),
            edit_counts: BTreeMap::new(),
            has_posted_first: BTreeMap::new(),
            emails_sent: BTreeMap::new(),
            last_updated: None,
        }
    }
}

impl SharedDocument {
    /// Decode a stored document, upgrading older schemas.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut doc: SharedDocument = serde_json::from_slice(bytes)?;
        doc.migrate();
        Ok(doc)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Bring an older document up to [`SCHEMA_VERSION`].
    pub fn migrate(&mut self) {
        if self.schema_version >= SCHEMA_VERSION {
            return;
        }
        debug!(from = self.schema_version, to = SCHEMA_VERSION, "Migrating shared document");

        if self.schema_version == 0 {
            for participant in &mut self.participants {
                participant.clear_blank_fields();
            }
        }

        self.schema_version = SCHEMA_VERSION;
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }
}
