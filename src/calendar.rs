//! Year-less calendar arithmetic in one fixed timezone
//!
//! Anniversaries are stored as `DD/MM` strings without a year, so every date
//! recurs annually. "Today" is computed in the club's configured timezone,
//! never the viewer's, so all participants agree on which entries are open.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A calendar day with no year component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayMonth {
    pub day: u32,
    pub month: u32,
}

impl DayMonth {
    pub fn new(day: u32, month: u32) -> Self {
        Self { day, month }
    }

    /// Parse a `D/M` or `DD/MM` string.
    ///
    /// Returns `None` unless there are exactly two numeric halves. Ranges are
    /// not checked: `31/02` parses and compares by its raw numbers.
    pub fn parse(date: &str) -> Option<Self> {
        let (day, month) = date.trim().split_once('/')?;
        if month.contains('/') {
            return None;
        }
        Some(Self {
            day: day.trim().parse().ok()?,
            month: month.trim().parse().ok()?,
        })
    }
}

impl Ord for DayMonth {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.month, self.day).cmp(&(other.month, other.day))
    }
}

impl PartialOrd for DayMonth {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DayMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.day, self.month)
    }
}

/// Zero-pad both halves of a `D/M` string.
///
/// Input without exactly one `/` comes back unchanged; rejecting malformed
/// dates is left to whoever displays them.
pub fn normalize(date: &str) -> String {
    match date.split_once('/') {
        Some((day, month)) if !month.contains('/') => format!("{day:0>2}/{month:0>2}"),
        _ => date.to_string(),
    }
}

/// Whether `anniversary` has occurred this cycle as of `today`, inclusive of
/// the day itself. Unparseable anniversaries never pass.
pub fn has_passed(anniversary: &str, today: DayMonth) -> bool {
    DayMonth::parse(anniversary).is_some_and(|date| date <= today)
}

/// Source of "today" for the whole club
#[derive(Debug, Clone)]
pub struct Calendar {
    zone: Tz,
    pinned: Option<DayMonth>,
}

impl Calendar {
    pub fn new(zone: Tz) -> Self {
        Self { zone, pinned: None }
    }

    /// A calendar frozen on one day.
    pub fn pinned(today: DayMonth) -> Self {
        Self {
            zone: Tz::UTC,
            pinned: Some(today),
        }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn today(&self) -> DayMonth {
        if let Some(today) = self.pinned {
            return today;
        }
        let now = Utc::now().with_timezone(&self.zone);
        DayMonth::new(now.day(), now.month())
    }

    pub fn has_passed(&self, anniversary: &str) -> bool {
        has_passed(&normalize(anniversary), self.today())
    }

    /// Whether today is exactly `anniversary`.
    pub fn is_today(&self, anniversary: &str) -> bool {
        normalize(anniversary) == self.today().to_string()
    }
}
