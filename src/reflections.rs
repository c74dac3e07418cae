//! Reflection content plus its per-participant counters
//!
//! These functions only keep the three maps consistent. Who may call them,
//! and who may read the result, is decided by the session layer.

use serde::Serialize;

use crate::error::{ClubError, Result};
use crate::model::SharedDocument;

/// Edit count at which the writer gets a gentle nudge
pub const OVERTHINKING_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    /// True only for the owner's very first save; drives fan-out
    pub first_post: bool,
    pub edit_count: u32,
}

/// Store `text` as `owner`'s reflection.
pub fn save(doc: &mut SharedDocument, owner: &str, text: &str) -> Result<SaveOutcome> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ClubError::EmptyReflection);
    }
    if owner.is_empty() {
        return Err(ClubError::NotAuthenticated);
    }

    let first_post = !doc.has_posted_first.get(owner).copied().unwrap_or(false);

    doc.reflections.insert(owner.to_string(), text.to_string());

    let count = doc.edit_counts.entry(owner.to_string()).or_insert(0);
    *count += 1;
    let edit_count = *count;

    if first_post {
        doc.has_posted_first.insert(owner.to_string(), true);
    }

    Ok(SaveOutcome {
        first_post,
        edit_count,
    })
}

/// Remove `name`'s reflection and counters. Nothing changes when there is
/// no reflection to remove.
pub fn delete(doc: &mut SharedDocument, name: &str) -> Result<()> {
    if doc.reflections.remove(name).is_none() {
        return Err(ClubError::NotFound(format!("reflection for {name}")));
    }
    doc.edit_counts.remove(name);
    doc.has_posted_first.remove(name);
    Ok(())
}

/// Clear every reflection and counter. Returns how many reflections went.
pub fn delete_all(doc: &mut SharedDocument) -> usize {
    let removed = doc.reflections.len();
    doc.reflections.clear();
    doc.edit_counts.clear();
    doc.has_posted_first.clear();
    removed
}

pub fn get<'a>(doc: &'a SharedDocument, name: &str) -> Option<&'a str> {
    doc.reflections.get(name).map(String::as_str)
}

pub fn edit_count(doc: &SharedDocument, name: &str) -> u32 {
    doc.edit_counts.get(name).copied().unwrap_or(0)
}

pub fn is_overthinking(doc: &SharedDocument, name: &str) -> bool {
    edit_count(doc, name) >= OVERTHINKING_THRESHOLD
}

pub fn overthinking_message(name: &str) -> String {
    format!("overthinking detected. it's fine, it doesn't need to be perfect {name}")
}
