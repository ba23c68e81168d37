use crate::{
    AppState,
    api::models::users::{CurrentUser, UserStatus},
    auth::session,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
    types::abbrev_uuid,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Pull the token out of `Authorization: Bearer <token>`
fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(Error::Unauthenticated { message: None })?;

    let value = header.to_str().map_err(|_| Error::Unauthenticated {
        message: Some("Invalid authorization header".to_string()),
    })?;

    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(Error::Unauthenticated {
            message: Some("Expected a bearer token".to_string()),
        })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(parts)?;
        let claims = session::verify_session_token(token, &state.config)?;

        // Reload so role changes and deactivation take effect before the token expires
        let mut conn = state.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
        let user = Users::new(&mut conn).get_by_id(claims.sub).await?.ok_or_else(|| {
            trace!(user_id = %abbrev_uuid(&claims.sub), "Token subject no longer exists");
            Error::Unauthenticated {
                message: Some("Could not validate credentials".to_string()),
            }
        })?;

        if user.status != UserStatus::Active {
            debug!(user_id = %abbrev_uuid(&user.id), status = ?user.status, "Rejecting token for inactive account");
            return Err(Error::Unauthenticated {
                message: Some("Account is not active".to_string()),
            });
        }

        Ok(CurrentUser::from(user))
    }
}
