//! Participant roster editing and save validation

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::access_code;
use crate::calendar::{normalize, DayMonth};
use crate::error::{ClubError, Result};
use crate::model::Participant;

/// An editable roster
///
/// Administrators edit a draft copy; only [`Registry::prepare_for_save`]
/// decides what reaches the shared document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    participants: Vec<Participant>,
}

impl Registry {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self { participants }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn into_participants(self) -> Vec<Participant> {
        self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Append a row and return its index.
    pub fn add(&mut self, participant: Participant) -> usize {
        self.participants.push(participant);
        self.participants.len() - 1
    }

    /// Remove the row at `index`. Removing the last row leaves a blank
    /// placeholder so there is always something to edit.
    pub fn remove(&mut self, index: usize) -> Result<Participant> {
        if index >= self.participants.len() {
            return Err(ClubError::InvalidIndex(index));
        }
        let removed = self.participants.remove(index);
        if self.participants.is_empty() {
            self.participants.push(Participant::blank());
        }
        Ok(removed)
    }

    /// Zero-pad every anniversary.
    pub fn normalize(&mut self) {
        for participant in &mut self.participants {
            participant.anniversary = normalize(&participant.anniversary);
        }
    }

    /// Order by (month, day). Ties keep their existing order; unparseable
    /// anniversaries go last.
    pub fn sort(&mut self) {
        self.participants.sort_by_key(|p| {
            DayMonth::parse(&normalize(&p.anniversary))
                .map(|d| (d.month, d.day))
                .unwrap_or((u32::MAX, u32::MAX))
        });
    }

    /// Give every participant without a stored secret one, keeping any suffix
    /// they already have. Never touches an existing secret. Returns how many
    /// secrets were created.
    pub fn ensure_secrets(&mut self) -> usize {
        let mut created = 0;
        for participant in &mut self.participants {
            if participant.has_secret() {
                continue;
            }
            let suffix = match participant.suffix.as_deref().filter(|s| !s.is_empty()) {
                Some(existing) => existing.to_string(),
                None => access_code::random_suffix(access_code::SUFFIX_LENGTH),
            };
            participant.access_secret = Some(access_code::generate(
                &participant.name,
                &participant.anniversary,
                Some(&suffix),
            ));
            participant.suffix = Some(suffix);
            created += 1;
        }
        created
    }

    /// Carry stored secrets over to draft rows that arrive without one,
    /// matching by name. Returns how many were carried.
    pub fn adopt_secrets(&mut self, stored: &[Participant]) -> usize {
        let mut adopted = 0;
        for participant in self.participants.iter_mut().filter(|p| !p.has_secret()) {
            if let Some(existing) = stored
                .iter()
                .find(|s| s.name == participant.name && s.has_secret())
            {
                participant.access_secret = existing.access_secret.clone();
                participant.suffix = existing.suffix.clone();
                adopted += 1;
            }
        }
        adopted
    }

    /// Drop rows missing a name or anniversary. Returns how many went.
    pub fn prune(&mut self) -> usize {
        let before = self.participants.len();
        self.participants
            .retain(|p| !p.name.trim().is_empty() && !p.anniversary.trim().is_empty());
        before - self.participants.len()
    }

    /// Validate and finish the draft for persisting.
    ///
    /// Incomplete rows are dropped silently. If nothing is left the draft
    /// gets a blank placeholder back and [`ClubError::EmptyRoster`] is
    /// returned. Otherwise secrets are filled in before anniversaries are
    /// normalized, so codes rebuilt from legacy suffixes still match what
    /// was handed out.
    pub fn prepare_for_save(&mut self) -> Result<()> {
        let dropped = self.prune();
        if self.participants.is_empty() {
            self.participants.push(Participant::blank());
            return Err(ClubError::EmptyRoster);
        }

        for participant in &mut self.participants {
            if participant.email_address().is_none() {
                participant.email = None;
            }
        }

        let created = self.ensure_secrets();
        self.normalize();
        self.sort();

        debug!(
            participants = self.participants.len(),
            dropped, created, "Roster prepared for save"
        );
        Ok(())
    }

    pub fn missing_emails(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.email_address().is_none())
            .count()
    }

    /// `(name, code)` for everyone who has a code.
    pub fn codes(&self) -> Vec<(String, String)> {
        self.participants
            .iter()
            .filter_map(|p| p.access_code().map(|code| (p.name.clone(), code)))
            .collect()
    }
}

impl From<Vec<Participant>> for Registry {
    fn from(participants: Vec<Participant>) -> Self {
        Self::new(participants)
    }
}
