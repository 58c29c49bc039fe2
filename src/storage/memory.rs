//! In-process storage, used when no state file is wanted.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::StateSnapshot;
use crate::storage::StateStore;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Mutex<StateSnapshot>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: StateSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    /// Copy of the last saved snapshot.
    pub fn snapshot(&self) -> StateSnapshot {
        match self.snapshot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStorage {
    async fn load(&self) -> Result<StateSnapshot> {
        Ok(self.snapshot())
    }

    async fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        let mut guard = match self.snapshot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = snapshot.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObservationState;

    #[tokio::test]
    async fn test_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.load().await.unwrap().sources.is_empty());

        let mut snapshot = StateSnapshot::default();
        snapshot
            .sources
            .insert("news".into(), ObservationState::baseline("ff"));
        storage.save(&snapshot).await.unwrap();
        assert_eq!(storage.load().await.unwrap().fingerprint("news"), Some("ff"));
    }
}
