use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use tracing::{debug, warn};

use crate::auth::Claims;
use crate::model::{Owned, User};

use super::error::ApiError;
use super::state::AppState;

pub const SESSION_COOKIE: &str = "token";

/// Verified session claims for the requesting user.
///
/// Extracted once per request from the `token` cookie and handed to the
/// handler as an immutable value; a missing, expired, or tampered token
/// short-circuits with 401 before any business logic runs.
#[derive(Debug, Clone)]
pub struct Session(pub Claims);

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| {
                warn!("request without session cookie");
                ApiError::Unauthorized
            })?;

        let claims = state.tokens.verify(&token).map_err(|error| {
            warn!(error = %error, "session token rejected");
            ApiError::Unauthorized
        })?;
        debug!(email = %claims.email, "session verified");
        Ok(Session(claims))
    }
}

/// Look up the active user record behind a verified session.
pub async fn resolve_actor(state: &AppState, session: &Session) -> Result<User, ApiError> {
    state
        .store
        .find_user_by_email(&session.0.email)
        .await?
        .ok_or(ApiError::UserNotFound)
}

/// Allow the operation only when the actor owns the resource.
pub fn authorize<R: Owned>(actor: &User, resource: &R) -> Result<(), ApiError> {
    if resource.owner() == actor.id {
        Ok(())
    } else {
        warn!(actor = %actor.id, owner = %resource.owner(), "ownership check failed");
        Err(ApiError::Unauthorized)
    }
}

/// User records may only be modified by their own session.
pub fn ensure_self(session: &Session, target: &User) -> Result<(), ApiError> {
    if session.0.email == target.email {
        Ok(())
    } else {
        warn!(target = %target.id, "session does not match target user");
        Err(ApiError::Unauthorized)
    }
}
