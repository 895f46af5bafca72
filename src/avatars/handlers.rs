use axum::{extract::Multipart, extract::State, Json};
use serde::Serialize;
use tracing::instrument;

use crate::{
    error::ApiError,
    state::AppState,
    users::extractors::AuthUser,
};

use super::pipeline::{self, RawUpload};

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    #[serde(rename = "avatarURL")]
    pub avatar_url: String,
}

/// PATCH /users/avatars — multipart field named `avatar`, one file.
#[instrument(skip(state, user, multipart))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<AvatarResponse>, ApiError> {
    let mut upload: Option<RawUpload> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.to_string()))?
    {
        if field.name() == Some("avatar") {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
            upload = Some(RawUpload {
                bytes,
                content_type,
            });
            break;
        }
    }

    let upload = upload.ok_or_else(|| ApiError::InvalidUpload("avatar file is required".into()))?;
    let avatar_url = pipeline::ingest(&state, user.id, upload).await?;

    Ok(Json(AvatarResponse { avatar_url }))
}
