use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::warn;
use uuid::Uuid;

/// Filesystem layout for avatar uploads.
///
/// Raw uploads land in a staging directory keyed by user id (one pending
/// upload per user; same-user collisions overwrite). The publish step
/// renames the staged file into the public directory, which is atomic on
/// the same filesystem, so readers of a user's avatar URL never observe a
/// half-written file.
pub struct AvatarStorage {
    tmp_dir: PathBuf,
    public_dir: PathBuf,
    public_base: String,
}

impl AvatarStorage {
    pub fn new(
        tmp_dir: impl Into<PathBuf>,
        public_dir: impl Into<PathBuf>,
        public_base: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let tmp_dir = tmp_dir.into();
        let public_dir = public_dir.into();
        std::fs::create_dir_all(&tmp_dir).context("create avatar tmp dir")?;
        std::fs::create_dir_all(&public_dir).context("create avatar public dir")?;
        Ok(Self {
            tmp_dir,
            public_dir,
            public_base: public_base.into(),
        })
    }

    pub fn staged_path(&self, user_id: Uuid, ext: &str) -> PathBuf {
        self.tmp_dir.join(format!("{}.{}", user_id, ext))
    }

    pub fn public_path(&self, user_id: Uuid) -> PathBuf {
        self.public_dir.join(format!("{}.jpg", user_id))
    }

    pub fn public_url(&self, user_id: Uuid) -> String {
        format!("{}/{}.jpg", self.public_base, user_id)
    }

    /// Write the raw upload into the staging area.
    pub async fn stage(&self, user_id: Uuid, ext: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.staged_path(user_id, ext);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("stage upload {}", path.display()))?;
        Ok(path)
    }

    /// Atomically move a staged file into the public area, replacing any
    /// prior avatar for this user.
    pub async fn publish(&self, staged: &Path, user_id: Uuid) -> anyhow::Result<String> {
        let target = self.public_path(user_id);
        tokio::fs::rename(staged, &target)
            .await
            .with_context(|| format!("publish avatar {}", target.display()))?;
        Ok(self.public_url(user_id))
    }

    /// Best-effort removal of a staged file after a failed pipeline step.
    pub async fn discard(&self, staged: &Path) {
        if let Err(e) = tokio::fs::remove_file(staged).await {
            warn!(path = %staged.display(), error = %e, "failed to discard staged upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn storage(dir: &tempfile::TempDir) -> AvatarStorage {
        AvatarStorage::new(
            dir.path().join("tmp"),
            dir.path().join("public"),
            "/avatars",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn stage_then_publish_moves_the_file() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);
        let user_id = Uuid::new_v4();

        let staged = storage.stage(user_id, "png", b"raw bytes").await.unwrap();
        assert!(staged.exists());

        let url = storage.publish(&staged, user_id).await.unwrap();
        assert_eq!(url, format!("/avatars/{}.jpg", user_id));
        assert!(!staged.exists());
        assert!(storage.public_path(user_id).exists());
    }

    #[tokio::test]
    async fn publish_replaces_a_prior_avatar() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);
        let user_id = Uuid::new_v4();

        let first = storage.stage(user_id, "jpg", b"first").await.unwrap();
        storage.publish(&first, user_id).await.unwrap();

        let second = storage.stage(user_id, "jpg", b"second").await.unwrap();
        storage.publish(&second, user_id).await.unwrap();

        let contents = std::fs::read(storage.public_path(user_id)).unwrap();
        assert_eq!(contents, b"second");
    }

    #[tokio::test]
    async fn staging_twice_overwrites_the_pending_upload() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);
        let user_id = Uuid::new_v4();

        storage.stage(user_id, "png", b"old").await.unwrap();
        let staged = storage.stage(user_id, "png", b"new").await.unwrap();
        assert_eq!(std::fs::read(staged).unwrap(), b"new");
    }
}
