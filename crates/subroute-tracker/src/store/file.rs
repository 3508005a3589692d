use crate::error::PersistenceError;
use crate::ports::RecoveryStore;
use async_trait::async_trait;
use std::path::PathBuf;
use subroute_core::{RecoverySnapshot, UserId};
use tokio::io::AsyncWriteExt;

/// One JSON recovery snapshot per user under a base directory.
#[derive(Debug, Clone)]
pub struct FileRecoveryStore {
    base_path: PathBuf,
}

impl FileRecoveryStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub(crate) fn snapshot_path(&self, user: &UserId) -> Result<PathBuf, PersistenceError> {
        validate_file_id(user.as_str())?;
        Ok(self.base_path.join(format!("{}.json", user.as_str())))
    }
}

/// Reject ids that would escape the base directory or break the file name.
pub(crate) fn validate_file_id(id: &str) -> Result<(), PersistenceError> {
    if id.is_empty() {
        return Err(PersistenceError::InvalidId("user id cannot be empty".to_string()));
    }
    if id.contains('/') || id.contains('\\') || id.contains("..") || id.contains('\0') {
        return Err(PersistenceError::InvalidId(format!(
            "user id contains invalid characters: {id:?}"
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(PersistenceError::InvalidId(format!(
            "user id contains control characters: {id:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl RecoveryStore for FileRecoveryStore {
    async fn load(&self, user: &UserId) -> Result<Option<RecoverySnapshot>, PersistenceError> {
        let path = self.snapshot_path(user)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write via a temp file and rename, so a crash never leaves a torn file.
    async fn save(
        &self,
        user: &UserId,
        snapshot: &RecoverySnapshot,
    ) -> Result<(), PersistenceError> {
        let path = self.snapshot_path(user)?;
        tokio::fs::create_dir_all(&self.base_path).await?;

        let content = serde_json::to_string_pretty(snapshot)?;
        let tmp_path = self
            .base_path
            .join(format!(".{}.{}.tmp", user.as_str(), ulid::Ulid::new()));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}
