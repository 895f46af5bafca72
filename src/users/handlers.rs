use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    state::AppState,
    users::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, PublicUser,
            ResendVerificationRequest, SignupRequest, SignupResponse,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::User,
        validate,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/current", get(current))
        .route("/verify", post(resend_verification))
        .route("/verify/:token", get(confirm_verification))
}

/// A taken email is a conflict regardless of what else is wrong with the
/// payload, so it takes precedence over validation.
fn precheck_signup(payload: &SignupRequest, email_taken: bool) -> Result<(), ApiError> {
    if email_taken {
        return Err(ApiError::EmailInUse);
    }
    validate::validate_email(&payload.email)?;
    validate::validate_password(&payload.password)?;
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let email_taken = User::find_by_email(&state.db, &payload.email)
        .await?
        .is_some();
    if let Err(e) = precheck_signup(&payload, email_taken) {
        warn!(email = %payload.email, error = %e, "signup rejected");
        return Err(e);
    }

    let hash = hash_password(&payload.password)?;
    let verification_token = Uuid::new_v4().to_string();
    let subscription = payload.subscription.unwrap_or_default();
    let user = User::create(
        &state.db,
        &payload.email,
        &hash,
        subscription,
        &verification_token,
    )
    .await?;
    info!(user_id = %user.id, email = %user.email, "user registered");

    // The account is already reserved at this point; a dispatch failure
    // is surfaced but does not roll the record back.
    state
        .mailer
        .send_verification(&user.email, &user.verification_token)
        .await
        .map_err(ApiError::Dispatch)?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            subscription: user.subscription,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::NotFound
        })?;

    // Credential validity is checked before verification status so a
    // wrong password never leaks whether the account is verified.
    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    if !user.verify {
        warn!(user_id = %user.id, "login before verification");
        return Err(ApiError::NotVerified);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user)?;
    User::set_session_token(&state.db, user.id, Some(&token)).await?;
    info!(user_id = %user.id, email = %user.email, "user logged in");

    Ok(Json(LoginResponse {
        token,
        user: PublicUser {
            email: user.email,
            subscription: user.subscription,
        },
    }))
}

/// Identity was already resolved by the bearer gate; no extra store hit.
#[instrument(skip(user))]
pub async fn current(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(PublicUser {
        email: user.email,
        subscription: user.subscription,
    })
}

#[instrument(skip(state, user))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, ApiError> {
    let cleared = User::set_session_token(&state.db, user.id, None)
        .await
        .map_err(|e| {
            warn!(user_id = %user.id, error = %e, "logout store update failed");
            ApiError::InvalidToken("Not authorized")
        })?;
    if cleared == 0 {
        return Err(ApiError::InvalidToken("Not authorized"));
    }
    info!(user_id = %user.id, "user logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::NotFound)?;

    if user.verify {
        return Err(ApiError::AlreadyVerified);
    }

    // The existing token is re-sent as-is; it is not rotated.
    state
        .mailer
        .send_verification(&user.email, &user.verification_token)
        .await
        .map_err(ApiError::Dispatch)?;
    info!(user_id = %user.id, "verification email re-sent");

    Ok(Json(MessageResponse {
        message: "Verification email sent".into(),
    }))
}

#[instrument(skip(state, token))]
pub async fn confirm_verification(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::confirm_verification(&state.db, &token)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(user_id = %user.id, "email verified");

    Ok(Json(MessageResponse {
        message: "Verification successful".into(),
    }))
}
