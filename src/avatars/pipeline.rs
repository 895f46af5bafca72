use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use image::{imageops::FilterType, ImageFormat, ImageReader};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::AvatarStorage;
use crate::users::repo::User;

pub const MAX_AVATAR_BYTES: usize = 1024 * 1024;
pub const AVATAR_SIDE: u32 = 250;

/// A single multipart file field as received from the client.
pub struct RawUpload {
    pub bytes: Bytes,
    pub content_type: String,
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Upload filter: runs before any file I/O.
fn validate(upload: &RawUpload) -> Result<&'static str, ApiError> {
    let ext = ext_from_mime(&upload.content_type).ok_or_else(|| {
        ApiError::InvalidUpload(format!(
            "unsupported content type: {}",
            upload.content_type
        ))
    })?;
    if upload.bytes.is_empty() {
        return Err(ApiError::InvalidUpload("empty upload".into()));
    }
    if upload.bytes.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::InvalidUpload("avatar exceeds the 1 MiB limit".into()));
    }
    Ok(ext)
}

/// Decode, crop-resize to a fixed square and re-encode as JPEG, rewriting
/// the staged file in place. Image work is CPU-bound, so it runs off the
/// async runtime.
async fn normalize(staged: &Path) -> anyhow::Result<()> {
    let path = staged.to_path_buf();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let img = ImageReader::open(&path)
            .context("open staged upload")?
            .with_guessed_format()
            .context("sniff image format")?
            .decode()
            .context("decode image")?;
        let resized = img.resize_to_fill(AVATAR_SIDE, AVATAR_SIDE, FilterType::Triangle);
        resized
            .to_rgb8()
            .save_with_format(&path, ImageFormat::Jpeg)
            .context("re-encode avatar as jpeg")?;
        Ok(())
    })
    .await??;
    Ok(())
}

/// Validate → stage → normalize. Returns the staged, normalized file;
/// nothing in the public area has been touched yet.
async fn prepare(
    storage: &AvatarStorage,
    user_id: Uuid,
    upload: RawUpload,
) -> Result<PathBuf, ApiError> {
    let ext = validate(&upload)?;

    let staged = storage.stage(user_id, ext, &upload.bytes).await?;
    debug!(user_id = %user_id, path = %staged.display(), "upload staged");

    if let Err(e) = normalize(&staged).await {
        storage.discard(&staged).await;
        return Err(ApiError::Internal(e));
    }
    Ok(staged)
}

/// Full pipeline: prepare → link → publish. The store row is pointed at
/// the new URL before the rename, so a failed link (the user vanished in
/// a concurrent deletion) aborts with the prior avatar file still in
/// place. The rename is the atomic commit.
#[instrument(skip(state, upload))]
pub async fn ingest(
    state: &AppState,
    user_id: Uuid,
    upload: RawUpload,
) -> Result<String, ApiError> {
    let staged = prepare(&state.avatars, user_id, upload).await?;

    let url = state.avatars.public_url(user_id);
    match User::set_avatar_url(&state.db, user_id, &url).await {
        Ok(0) => {
            state.avatars.discard(&staged).await;
            return Err(ApiError::NotFound);
        }
        Ok(_) => {}
        Err(e) => {
            state.avatars.discard(&staged).await;
            return Err(ApiError::Internal(e));
        }
    }

    let url = state.avatars.publish(&staged, user_id).await?;
    debug!(user_id = %user_id, url = %url, "avatar published");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let img = RgbImage::from_pixel(width, height, image::Rgb([120, 30, 200]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    fn storage(dir: &tempfile::TempDir) -> AvatarStorage {
        AvatarStorage::new(
            dir.path().join("tmp"),
            dir.path().join("public"),
            "/avatars",
        )
        .unwrap()
    }

    #[test]
    fn validate_rejects_non_image_content_types() {
        let upload = RawUpload {
            bytes: Bytes::from_static(b"plain text"),
            content_type: "text/plain".into(),
        };
        assert!(matches!(
            validate(&upload),
            Err(ApiError::InvalidUpload(_))
        ));
    }

    #[test]
    fn validate_rejects_oversize_uploads() {
        let upload = RawUpload {
            bytes: Bytes::from(vec![0u8; 2 * 1024 * 1024]),
            content_type: "image/jpeg".into(),
        };
        assert!(matches!(
            validate(&upload),
            Err(ApiError::InvalidUpload(_))
        ));
    }

    #[test]
    fn validate_maps_mime_to_extension() {
        let upload = RawUpload {
            bytes: png_bytes(4, 4),
            content_type: "image/png".into(),
        };
        assert_eq!(validate(&upload).unwrap(), "png");
    }

    #[tokio::test]
    async fn prepare_then_publish_yields_a_250_square_jpeg() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);
        let user_id = Uuid::new_v4();

        let upload = RawUpload {
            bytes: png_bytes(300, 200),
            content_type: "image/png".into(),
        };
        let staged = prepare(&storage, user_id, upload).await.unwrap();
        let url = storage.publish(&staged, user_id).await.unwrap();
        assert_eq!(url, format!("/avatars/{}.jpg", user_id));

        let published = image::open(storage.public_path(user_id)).unwrap();
        assert_eq!(published.width(), AVATAR_SIDE);
        assert_eq!(published.height(), AVATAR_SIDE);
    }

    #[tokio::test]
    async fn publishing_again_replaces_the_prior_avatar() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);
        let user_id = Uuid::new_v4();

        for (w, h) in [(300, 200), (500, 500)] {
            let upload = RawUpload {
                bytes: png_bytes(w, h),
                content_type: "image/png".into(),
            };
            let staged = prepare(&storage, user_id, upload).await.unwrap();
            storage.publish(&staged, user_id).await.unwrap();
        }

        let published = image::open(storage.public_path(user_id)).unwrap();
        assert_eq!(published.width(), AVATAR_SIDE);
    }

    #[tokio::test]
    async fn prepare_never_touches_the_prior_avatar() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);
        let user_id = Uuid::new_v4();

        let first = RawUpload {
            bytes: png_bytes(300, 200),
            content_type: "image/png".into(),
        };
        let staged = prepare(&storage, user_id, first).await.unwrap();
        storage.publish(&staged, user_id).await.unwrap();
        let before = std::fs::read(storage.public_path(user_id)).unwrap();

        // A pipeline aborted after prepare (e.g. the link step failing)
        // must leave the published file exactly as it was.
        let second = RawUpload {
            bytes: png_bytes(500, 500),
            content_type: "image/png".into(),
        };
        let pending = prepare(&storage, user_id, second).await.unwrap();
        let after = std::fs::read(storage.public_path(user_id)).unwrap();
        assert_eq!(before, after);

        storage.discard(&pending).await;
        assert_eq!(std::fs::read(storage.public_path(user_id)).unwrap(), before);
    }

    #[tokio::test]
    async fn undecodable_upload_leaves_both_areas_untouched() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);
        let user_id = Uuid::new_v4();

        let upload = RawUpload {
            bytes: Bytes::from_static(b"not actually a png"),
            content_type: "image/png".into(),
        };
        let err = prepare(&storage, user_id, upload).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(!storage.public_path(user_id).exists());
        assert!(!storage.staged_path(user_id, "png").exists());
    }
}
