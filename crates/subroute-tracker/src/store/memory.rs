use crate::error::PersistenceError;
use crate::ports::{RecoveryStore, TripLogStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use subroute_core::{CompletedTripLog, LogId, RecoverySnapshot, StopId, UserId};

/// In-memory trip-log storage for tests and the simulator.
#[derive(Debug, Default)]
pub struct MemoryTripLogStore {
    logs: Mutex<HashMap<UserId, Vec<CompletedTripLog>>>,
    vehicles: Mutex<HashMap<UserId, String>>,
}

impl MemoryTripLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user's default vehicle label
    pub fn set_vehicle_label(&self, user: &UserId, label: impl Into<String>) {
        self.vehicles.lock().insert(user.clone(), label.into());
    }

    /// Saved logs for `user`, in save order
    pub fn logs(&self, user: &UserId) -> Vec<CompletedTripLog> {
        self.logs.lock().get(user).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.logs.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TripLogStore for MemoryTripLogStore {
    async fn save_trip_log(
        &self,
        user: &UserId,
        log: &CompletedTripLog,
    ) -> Result<(), PersistenceError> {
        let mut logs = self.logs.lock();
        let entries = logs.entry(user.clone()).or_default();
        if !entries.iter().any(|existing| existing.id == log.id) {
            entries.push(log.clone());
        }
        Ok(())
    }

    async fn default_vehicle_label(
        &self,
        user: &UserId,
    ) -> Result<Option<String>, PersistenceError> {
        Ok(self.vehicles.lock().get(user).cloned())
    }

    async fn logged_stops(&self, user: &UserId) -> Result<HashMap<StopId, LogId>, PersistenceError> {
        Ok(self
            .logs(user)
            .into_iter()
            .map(|log| (log.stop_id, log.id))
            .collect())
    }
}

/// In-memory recovery storage.
///
/// Snapshots are held as JSON text, so loading exercises the same
/// serialization path as the file-backed store.
#[derive(Debug, Default)]
pub struct MemoryRecoveryStore {
    snapshots: Mutex<HashMap<UserId, String>>,
    saves: Mutex<usize>,
}

impl MemoryRecoveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    /// Raw stored JSON for `user`
    pub fn raw(&self, user: &UserId) -> Option<String> {
        self.snapshots.lock().get(user).cloned()
    }

    /// Store raw JSON, bypassing serialization
    pub fn put_raw(&self, user: &UserId, json: impl Into<String>) {
        self.snapshots.lock().insert(user.clone(), json.into());
    }
}

#[async_trait]
impl RecoveryStore for MemoryRecoveryStore {
    async fn load(&self, user: &UserId) -> Result<Option<RecoverySnapshot>, PersistenceError> {
        let Some(json) = self.raw(user) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn save(
        &self,
        user: &UserId,
        snapshot: &RecoverySnapshot,
    ) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(snapshot)?;
        self.snapshots.lock().insert(user.clone(), json);
        *self.saves.lock() += 1;
        Ok(())
    }
}
