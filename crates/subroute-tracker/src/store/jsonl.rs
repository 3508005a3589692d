use super::file::validate_file_id;
use crate::error::PersistenceError;
use crate::ports::TripLogStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use subroute_core::{CompletedTripLog, LogId, StopId, UserId};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only trip logs, one `<user>.jsonl` file per user.
///
/// Saving a log whose id is already in the file is a no-op, so callers can
/// retry a save that may or may not have landed.
#[derive(Debug)]
pub struct JsonLinesTripLogStore {
    base_path: PathBuf,
    vehicle_label: Option<String>,
    /// Ids already on disk, loaded on first write per user
    seen: Mutex<HashMap<UserId, HashSet<LogId>>>,
}

impl JsonLinesTripLogStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            vehicle_label: None,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Report `label` as every user's default vehicle
    #[must_use]
    pub fn with_vehicle_label(mut self, label: impl Into<String>) -> Self {
        self.vehicle_label = Some(label.into());
        self
    }

    pub fn log_path(&self, user: &UserId) -> Result<PathBuf, PersistenceError> {
        validate_file_id(user.as_str())?;
        Ok(self.base_path.join(format!("{}.jsonl", user.as_str())))
    }

    /// All logs saved for `user`, in file order
    pub async fn logs(&self, user: &UserId) -> Result<Vec<CompletedTripLog>, PersistenceError> {
        read_trip_logs(self.log_path(user)?).await
    }
}

/// Read a JSON-lines trip-log file. A missing file has no logs.
pub async fn read_trip_logs(path: impl AsRef<Path>) -> Result<Vec<CompletedTripLog>, PersistenceError> {
    let content = match tokio::fs::read_to_string(path.as_ref()).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(PersistenceError::from))
        .collect()
}

#[async_trait]
impl TripLogStore for JsonLinesTripLogStore {
    async fn save_trip_log(
        &self,
        user: &UserId,
        log: &CompletedTripLog,
    ) -> Result<(), PersistenceError> {
        let path = self.log_path(user)?;
        let mut seen = self.seen.lock().await;
        if !seen.contains_key(user) {
            let ids = read_trip_logs(&path).await?.into_iter().map(|l| l.id).collect();
            seen.insert(user.clone(), ids);
        }
        let ids = seen.entry(user.clone()).or_default();
        if ids.contains(&log.id) {
            tracing::debug!(log_id = %log.id, "trip log already stored");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.base_path).await?;
        let mut line = serde_json::to_string(log)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;

        ids.insert(log.id);
        Ok(())
    }

    async fn default_vehicle_label(
        &self,
        _user: &UserId,
    ) -> Result<Option<String>, PersistenceError> {
        Ok(self.vehicle_label.clone())
    }

    async fn logged_stops(&self, user: &UserId) -> Result<HashMap<StopId, LogId>, PersistenceError> {
        Ok(self
            .logs(user)
            .await?
            .into_iter()
            .map(|log| (log.stop_id, log.id))
            .collect())
    }
}
