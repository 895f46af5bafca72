use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;

/// Subscription tier of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "subscription_tier", rename_all = "lowercase")]
pub enum Subscription {
    #[default]
    Starter,
    Pro,
    Business,
}

/// User record in the database.
///
/// `verification_token` is non-empty exactly while `verify` is false.
/// `session_token` holds the literal last-issued JWT; any earlier token is
/// rejected by the bearer gate once superseded or cleared.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub verify: bool,
    #[serde(skip_serializing)]
    pub verification_token: String,
    pub subscription: Subscription,
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
    pub avatar_url: String,
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str = "id, email, password_hash, verify, verification_token, \
     subscription, session_token, avatar_url, created_at";

impl User {
    /// Insert a new, unverified user. An insert racing a duplicate email
    /// surfaces as `EmailInUse` via the unique index.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        subscription: Subscription,
        verification_token: &str,
    ) -> Result<User, ApiError> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, subscription, verification_token) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(password_hash)
            .bind(subscription)
            .bind(verification_token)
            .fetch_one(db)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                    ApiError::EmailInUse
                }
                _ => ApiError::Internal(e.into()),
            })
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Flip `verify` and clear the token in one statement. Returns None for
    /// an unknown token, which also covers an already-consumed one: once
    /// cleared, the same token is indistinguishable from never having
    /// existed. That is the intended terminal state.
    pub async fn confirm_verification(db: &PgPool, token: &str) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET verify = TRUE, verification_token = '' \
             WHERE verification_token = $1 AND verification_token <> '' \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Set (login) or clear (logout) the stored session token. Concurrent
    /// writers resolve last-writer-wins; returns the number of rows touched.
    pub async fn set_session_token(
        db: &PgPool,
        id: Uuid,
        token: Option<&str>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query("UPDATE users SET session_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Point the record at a newly published avatar. Zero rows means the
    /// user vanished between the gate and the link step.
    pub async fn set_avatar_url(db: &PgPool, id: Uuid, url: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("UPDATE users SET avatar_url = $2 WHERE id = $1")
            .bind(id)
            .bind(url)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
