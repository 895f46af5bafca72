use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;
use crate::users::{jwt::JwtKeys, repo::User};

/// Bearer-auth gate: resolves the request's credential to a full `User`
/// before any protected handler runs. All failures reject the request
/// here; downstream code only ever sees an authenticated owner.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::InvalidToken("Missing Authorization header"))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(ApiError::InvalidToken("Invalid auth scheme"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::InvalidToken("Invalid or expired token")
        })?;

        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or(ApiError::InvalidToken("Invalid or expired token"))?;

        // Revocation-by-mismatch: a superseded or cleared token still
        // carries a valid signature but no longer equals the stored one.
        if user.session_token.as_deref() != Some(token) {
            warn!(user_id = %user.id, "bearer token does not match stored session");
            return Err(ApiError::InvalidToken("Invalid or expired token"));
        }

        Ok(AuthUser(user))
    }
}
