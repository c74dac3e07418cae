//! receipts - birthday-gated reflections for a small circle of friends
//!
//! Each participant gets an access code. On or after their birthday the code
//! lets them write a reflection, and read everyone else's whose birthday has
//! also passed. A single administrative secret manages the roster.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  server     axum JSON API + SSE                          │
//! ├──────────────────────────────────────────────────────────┤
//! │  club       session-gated operations                     │
//! │  scheduler  hourly reminder check                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  session    codes → roles      timeline   visibility     │
//! │  registry   roster             reflections content       │
//! │  notify     who/when + sender  calendar   "today"        │
//! ├──────────────────────────────────────────────────────────┤
//! │  sync       local mirror, whole-document writes          │
//! │  store      NATS key-value bucket | in-memory            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything shared lives in one [`model::SharedDocument`]. Writes replace
//! the whole document, so concurrent writers from different processes
//! overwrite each other; the last write wins.

pub mod access_code;
pub mod calendar;
pub mod club;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod reflections;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod store;
pub mod sync;
pub mod timeline;

pub use calendar::{Calendar, DayMonth};
pub use club::{Club, ClubSettings};
pub use config::Args;
pub use error::{ClubError, Result};
pub use model::{Participant, SharedDocument};
pub use registry::Registry;
pub use session::{Role, Session};
