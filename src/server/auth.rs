//! Session lookup for incoming requests

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::club::Club;
use crate::session::Session;

/// The caller's token and the session it restores to
///
/// Missing, malformed or unknown tokens all give an anonymous session.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub token: Option<Uuid>,
    pub session: Session,
}

/// Parse `Bearer <uuid>`.
pub fn parse_bearer(header: Option<&str>) -> Option<Uuid> {
    let token = header?.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

#[async_trait]
impl FromRequestParts<Arc<Club>> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, club: &Arc<Club>) -> Result<Self, Self::Rejection> {
        let token = parse_bearer(
            parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
        );

        let session = match &token {
            Some(token) => club.session(token).await,
            None => Session::anonymous(),
        };

        Ok(Self { token, session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        let token = Uuid::new_v4();
        assert_eq!(parse_bearer(Some(&format!("Bearer {token}"))), Some(token));
        assert_eq!(parse_bearer(Some("Bearer not-a-uuid")), None);
        assert_eq!(parse_bearer(Some(&format!("Basic {token}"))), None);
        assert_eq!(parse_bearer(None), None);
    }
}
