//! HTTP handlers
//!
//! Thin JSON wrappers over [`Club`]. Domain errors render through
//! `ClubError`'s `IntoResponse`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use chrono::{DateTime, Utc};
use futures::{future, stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tracing::debug;

use super::auth::Viewer;
use crate::club::{Club, LedgerEntry, LoginOutcome, MyReflection, ReflectionView, RosterSaved};
use crate::error::{ClubError, Result};
use crate::model::Participant;
use crate::registry::Registry;
use crate::session::{Role, Session};
use crate::sync::ClubEvent;
use crate::timeline::TimelineEntry;

type ClubState = State<Arc<Club>>;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    "OK"
}

// === Sessions ===

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub code: String,
}

/// POST /api/login
pub async fn login(State(club): ClubState, Json(req): Json<LoginRequest>) -> Result<Json<LoginOutcome>> {
    club.login(&req.code).await.map(Json)
}

/// POST /api/logout
pub async fn logout(State(club): ClubState, viewer: Viewer) -> StatusCode {
    if let Some(token) = viewer.token {
        club.logout(&token);
    }
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub role: Role,
    #[serde(flatten)]
    pub session: Session,
}

/// GET /api/session
pub async fn session(viewer: Viewer) -> Json<SessionResponse> {
    Json(SessionResponse {
        role: viewer.session.role(),
        session: viewer.session,
    })
}

// === Reflections ===

/// GET /api/timeline
pub async fn timeline(State(club): ClubState, viewer: Viewer) -> Result<Json<Vec<TimelineEntry>>> {
    club.timeline(&viewer.session).await.map(Json)
}

/// GET /api/reflections/:name
pub async fn read_reflection(
    State(club): ClubState,
    viewer: Viewer,
    Path(name): Path<String>,
) -> Result<Json<ReflectionView>> {
    club.read_reflection(&viewer.session, &name).await.map(Json)
}

/// GET /api/me/reflection
pub async fn my_reflection(State(club): ClubState, viewer: Viewer) -> Result<Json<MyReflection>> {
    club.my_reflection(&viewer.session).await.map(Json)
}

#[derive(Debug, Deserialize)]
pub struct SaveReflectionRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReflectionResponse {
    pub message: &'static str,
    pub first_post: bool,
    pub edit_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

/// PUT /api/me/reflection
pub async fn save_reflection(
    State(club): ClubState,
    viewer: Viewer,
    Json(req): Json<SaveReflectionRequest>,
) -> Result<Json<SaveReflectionResponse>> {
    let saved = club.save_reflection(&viewer.session, &req.text).await?;
    // Fan-out keeps running after the response
    drop(saved.fan_out);

    Ok(Json(SaveReflectionResponse {
        message: "locked in. nice work.",
        first_post: saved.first_post,
        edit_count: saved.edit_count,
        warning: saved.warning,
    }))
}

/// Body for admin mutations that only report success
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Done<T> {
    #[serde(flatten)]
    pub result: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: String,
}

/// DELETE /api/reflections/:name
pub async fn delete_reflection(
    State(club): ClubState,
    viewer: Viewer,
    Path(name): Path<String>,
) -> Result<Json<Done<Deleted>>> {
    let committed = club.delete_reflection(&viewer.session, &name).await?;
    Ok(Json(Done {
        warning: committed.warning(),
        result: Deleted { deleted: name },
    }))
}

#[derive(Debug, Serialize)]
pub struct Cleared {
    pub removed: usize,
}

/// DELETE /api/reflections
pub async fn delete_all_reflections(State(club): ClubState, viewer: Viewer) -> Result<Json<Done<Cleared>>> {
    let committed = club.delete_all_reflections(&viewer.session).await?;
    Ok(Json(Done {
        warning: committed.warning(),
        result: Cleared {
            removed: committed.value,
        },
    }))
}

// === Roster ===

/// GET /api/roster
pub async fn get_roster(State(club): ClubState, viewer: Viewer) -> Result<Json<Registry>> {
    club.roster(&viewer.session).await.map(Json)
}

/// PUT /api/roster
pub async fn put_roster(
    State(club): ClubState,
    viewer: Viewer,
    Json(draft): Json<Registry>,
) -> Result<Json<RosterSaved>> {
    club.save_roster(&viewer.session, draft).await.map(Json)
}

/// POST /api/roster/participants
pub async fn add_participant(
    State(club): ClubState,
    viewer: Viewer,
    Json(participant): Json<Participant>,
) -> Result<(StatusCode, Json<RosterSaved>)> {
    let saved = club.add_participant(&viewer.session, participant).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: Participant,
}

/// DELETE /api/roster/participants/:index
pub async fn remove_participant(
    State(club): ClubState,
    viewer: Viewer,
    Path(index): Path<usize>,
) -> Result<Json<Done<Removed>>> {
    let committed = club.remove_participant(&viewer.session, index).await?;
    Ok(Json(Done {
        warning: committed.warning(),
        result: Removed {
            removed: committed.value,
        },
    }))
}

// === Reminder ledger ===

/// GET /api/ledger
pub async fn ledger(State(club): ClubState, viewer: Viewer) -> Result<Json<Vec<LedgerEntry>>> {
    club.ledger(&viewer.session).await.map(Json)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marked {
    pub name: String,
    pub sent_at: DateTime<Utc>,
}

/// PUT /api/ledger/:name
pub async fn mark_sent(
    State(club): ClubState,
    viewer: Viewer,
    Path(name): Path<String>,
) -> Result<Json<Done<Marked>>> {
    let committed = club.mark_sent(&viewer.session, &name).await?;
    Ok(Json(Done {
        warning: committed.warning(),
        result: Marked {
            name,
            sent_at: committed.value,
        },
    }))
}

/// DELETE /api/ledger/:name
pub async fn clear_sent(
    State(club): ClubState,
    viewer: Viewer,
    Path(name): Path<String>,
) -> Result<Json<Done<Deleted>>> {
    let committed = club.clear_sent(&viewer.session, &name).await?;
    Ok(Json(Done {
        warning: committed.warning(),
        result: Deleted { deleted: name },
    }))
}

// === Events ===

/// How often an open event stream re-checks its session
const SESSION_RECHECK: Duration = Duration::from_secs(15);

enum Feed {
    Update(ClubEvent),
    Recheck,
}

/// GET /api/events
///
/// One `updated` event per applied remote change. The stream ends once the
/// caller's session does: on logout right away, otherwise at the next
/// recheck.
pub async fn events(
    State(club): ClubState,
    viewer: Viewer,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    viewer.session.require_authenticated()?;
    let token = viewer.token.ok_or(ClubError::NotAuthenticated)?;
    debug!(role = %viewer.session.role(), "Event stream opened");

    let updates = BroadcastStream::new(club.events())
        .filter_map(|event| future::ready(event.ok().map(Feed::Update)));
    let logouts = BroadcastStream::new(club.logouts()).filter_map(move |cleared| {
        future::ready(matches!(cleared, Ok(cleared) if cleared == token).then_some(Feed::Recheck))
    });
    let ticks = IntervalStream::new(tokio::time::interval(SESSION_RECHECK)).map(|_| Feed::Recheck);

    let stream = stream::select(updates, stream::select(logouts, ticks))
        .take_while(move |_| {
            let club = Arc::clone(&club);
            async move {
                let alive = club.session(&token).await.is_authenticated();
                if !alive {
                    debug!("Event stream closed, session ended");
                }
                alive
            }
        })
        .filter_map(|feed| {
            future::ready(match feed {
                Feed::Update(event) => Event::default()
                    .event("updated")
                    .json_data(&event)
                    .ok()
                    .map(Ok),
                Feed::Recheck => None,
            })
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
