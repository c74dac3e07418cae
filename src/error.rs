//! Error types for receipts

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Outcomes that abort an operation without side effects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClubError {
    #[error("write something first!")]
    EmptyReflection,

    #[error("add at least one person!")]
    EmptyRoster,

    #[error("a name and a birthday are both needed")]
    IncompleteParticipant,

    #[error("No participant at index {0}")]
    InvalidIndex(usize),

    #[error("something went wrong. try logging in again.")]
    NotAuthenticated,

    #[error("Administrator access required")]
    Forbidden,

    /// Deliberately silent about whether the name exists
    #[error("nope. that code isn't one of ours.")]
    NotRecognized,

    #[error("hey {name}! come back on your birthday ({anniversary}). it's {today} right now. see you soon")]
    NotYetEligible {
        name: String,
        anniversary: String,
        today: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ClubError>;

impl ClubError {
    pub fn status(&self) -> StatusCode {
        match self {
            ClubError::EmptyReflection
            | ClubError::EmptyRoster
            | ClubError::IncompleteParticipant
            | ClubError::InvalidIndex(_) => StatusCode::BAD_REQUEST,
            ClubError::NotAuthenticated | ClubError::NotRecognized => StatusCode::UNAUTHORIZED,
            ClubError::Forbidden | ClubError::NotYetEligible { .. } => StatusCode::FORBIDDEN,
            ClubError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ClubError::EmptyReflection => "empty_reflection",
            ClubError::EmptyRoster => "empty_roster",
            ClubError::IncompleteParticipant => "incomplete_participant",
            ClubError::InvalidIndex(_) => "invalid_index",
            ClubError::NotAuthenticated => "not_authenticated",
            ClubError::Forbidden => "forbidden",
            ClubError::NotRecognized => "not_recognized",
            ClubError::NotYetEligible { .. } => "not_yet_eligible",
            ClubError::NotFound(_) => "not_found",
        }
    }
}

impl IntoResponse for ClubError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });

        if let ClubError::NotYetEligible {
            name,
            anniversary,
            today,
        } = &self
        {
            body["name"] = json!(name);
            body["anniversary"] = json!(anniversary);
            body["today"] = json!(today);
        }

        (self.status(), Json(body)).into_response()
    }
}
