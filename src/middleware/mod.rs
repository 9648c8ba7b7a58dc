use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::User;

/// The authenticated caller, resolved from a bearer token. Handlers that
/// take this extractor are private routes.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = BookingError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(BookingError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(BookingError::Unauthorized)?;

        let user_id = state
            .identity
            .verify(token)
            .map_err(|_| BookingError::Unauthorized)?;

        // The token may outlive the account; re-check the user exists.
        let user = User::find_by_id(user_id, &state.db.pool)
            .await?
            .ok_or(BookingError::Unauthorized)?;

        Ok(AuthUser {
            user_id: user.id,
            name: user.name,
            email: user.email,
        })
    }
}
