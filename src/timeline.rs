//! What each viewer sees on the timeline
//!
//! Visibility is worked out here on every read from content presence and the
//! anniversary gate. It is never stored.

use serde::Serialize;

use crate::calendar::{has_passed, normalize, DayMonth};
use crate::model::SharedDocument;
use crate::session::Session;

/// Longest preview, in characters
pub const PREVIEW_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryState {
    /// The viewer's own entry, unlocked, nothing written yet
    YourTurn,
    /// The viewer's own entry with content
    Editable { preview: String },
    /// Someone else's unlocked content
    Readable { preview: String },
    /// Someone else is unlocked but hasn't posted
    Waiting,
    /// Anniversary still ahead; content stays hidden even if written
    Locked { unlocks: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub name: String,
    pub anniversary: String,
    pub is_you: bool,
    #[serde(flatten)]
    pub state: EntryState,
}

/// One entry per participant, in roster order.
pub fn build(doc: &SharedDocument, session: &Session, today: DayMonth) -> Vec<TimelineEntry> {
    doc.participants
        .iter()
        .map(|participant| {
            let is_you = session.is_user(&participant.name);
            let passed = has_passed(&normalize(&participant.anniversary), today);
            let content = doc.reflections.get(&participant.name);

            let state = match (is_you, content, passed) {
                (true, Some(text), _) => EntryState::Editable {
                    preview: preview(text),
                },
                (true, None, true) => EntryState::YourTurn,
                (false, Some(text), true) => EntryState::Readable {
                    preview: preview(text),
                },
                (false, None, true) => EntryState::Waiting,
                (_, _, false) => EntryState::Locked {
                    unlocks: participant.anniversary.clone(),
                },
            };

            TimelineEntry {
                name: participant.name.clone(),
                anniversary: participant.anniversary.clone(),
                is_you,
                state,
            }
        })
        .collect()
}

/// Whether `viewer` may read `owner`'s reflection as of `today`.
pub fn can_read(doc: &SharedDocument, session: &Session, owner: &str, today: DayMonth) -> bool {
    if session.is_user(owner) {
        return true;
    }
    if !session.is_authenticated() {
        return false;
    }
    doc.participant(owner)
        .is_some_and(|p| has_passed(&normalize(&p.anniversary), today))
}

pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}
