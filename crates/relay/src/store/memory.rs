//! In-process store, used by tests and `--ephemeral` runs.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Cursor, CursorStore, DeliveryRecord, HistoryStore, SettingsStore};
use crate::error::StoreError;
use crate::settings::{Settings, SettingsPatch};

#[derive(Debug, Default)]
struct MemoryState {
    cursor: Option<Cursor>,
    settings: Option<Settings>,
    history: Vec<DeliveryRecord>,
}

/// Store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    default_settings: Settings,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(default_settings: Settings) -> Self {
        Self {
            default_settings,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Preload a cursor.
    #[must_use]
    pub fn with_cursor(self, cursor: Cursor) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                cursor: Some(cursor),
                ..MemoryState::default()
            }),
            ..self
        }
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn read_cursor(&self) -> Result<Cursor, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.cursor.get_or_insert_with(Cursor::default).clone())
    }

    async fn write_cursor(&self, cursor: &Cursor) -> Result<(), StoreError> {
        self.state.lock().await.cursor = Some(cursor.clone());
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn read_settings(&self) -> Result<Settings, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .settings
            .get_or_insert_with(|| self.default_settings.clone())
            .clone())
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StoreError> {
        let mut state = self.state.lock().await;
        let current = state
            .settings
            .get_or_insert_with(|| self.default_settings.clone());
        let next = patch.apply_to(current)?;
        *current = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append_delivery(&self, record: &DeliveryRecord) -> Result<(), StoreError> {
        self.state.lock().await.history.push(record.clone());
        Ok(())
    }

    async fn recent_deliveries(&self, limit: usize) -> Result<Vec<DeliveryRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.history.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_defaults() {
        let store = MemoryStore::new(Settings::with_poll_interval(2));
        assert!(store.read_cursor().await.unwrap().is_first_run());
        assert_eq!(store.read_settings().await.unwrap().poll_interval_minutes, 2);
    }

    #[tokio::test]
    async fn test_update_is_atomic_on_validation_failure() {
        let store = MemoryStore::default();
        let patch = SettingsPatch {
            ignore_replies: Some(false),
            ignore_keywords: Some(vec![String::new()]),
            ..Default::default()
        };
        assert!(store.update_settings(patch).await.is_err());
        assert!(store.read_settings().await.unwrap().ignore_replies);
    }
}
