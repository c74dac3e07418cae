//! HTTP surface
//!
//! JSON API over the club, a server-sent event stream for remote updates,
//! and optionally a static directory for the view layer. Sessions travel as
//! `Authorization: Bearer <token>`.

pub mod auth;
pub mod routes;

use std::path::Path;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::services::ServeDir;

use crate::club::Club;

/// Create the application router
pub fn create_router(club: Arc<Club>, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/health", get(routes::health))
        // Sessions
        .route("/api/login", post(routes::login))
        .route("/api/logout", post(routes::logout))
        .route("/api/session", get(routes::session))
        // Reflections
        .route("/api/timeline", get(routes::timeline))
        .route(
            "/api/me/reflection",
            get(routes::my_reflection).put(routes::save_reflection),
        )
        .route("/api/reflections", delete(routes::delete_all_reflections))
        .route(
            "/api/reflections/:name",
            get(routes::read_reflection).delete(routes::delete_reflection),
        )
        // Roster
        .route("/api/roster", get(routes::get_roster).put(routes::put_roster))
        .route("/api/roster/participants", post(routes::add_participant))
        .route(
            "/api/roster/participants/:index",
            delete(routes::remove_participant),
        )
        // Reminder ledger
        .route("/api/ledger", get(routes::ledger))
        .route(
            "/api/ledger/:name",
            put(routes::mark_sent).delete(routes::clear_sent),
        )
        .route("/api/events", get(routes::events))
        .with_state(club);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}
