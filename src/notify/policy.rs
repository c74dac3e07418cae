//! Who gets emailed, and when
//!
//! Pure decisions over the roster, the sent ledger and today's date. The
//! ledger is the only deduplication there is: a name present in it never
//! gets another reminder until an administrator clears the entry.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::calendar::{has_passed, normalize, DayMonth};
use crate::model::Participant;

/// Participants whose anniversary is today, who have an email, and who have
/// no ledger entry.
pub fn due_reminders<'a>(
    participants: &'a [Participant],
    ledger: &BTreeMap<String, DateTime<Utc>>,
    today: DayMonth,
) -> Vec<&'a Participant> {
    let today = today.to_string();
    participants
        .iter()
        .filter(|p| normalize(&p.anniversary) == today)
        .filter(|p| p.email_address().is_some())
        .filter(|p| !ledger.contains_key(&p.name))
        .collect()
}

/// Everyone except `author` who has already unlocked and has an email.
pub fn fan_out_recipients<'a>(
    author: &str,
    participants: &'a [Participant],
    today: DayMonth,
) -> Vec<&'a Participant> {
    participants
        .iter()
        .filter(|p| p.name != author)
        .filter(|p| has_passed(&normalize(&p.anniversary), today))
        .filter(|p| p.email_address().is_some())
        .collect()
}
