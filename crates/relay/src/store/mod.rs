//! Persistent relay state.
//!
//! Three records are kept:
//!
//! - the cursor: URI of the last post the relay has finished with
//! - the settings singleton, editable at runtime
//! - an append-only delivery history, for observability only
//!
//! ```text
//! data/
//! ├── cursor.json     # single record, replaced atomically
//! ├── settings.json   # single record, replaced atomically
//! └── history.jsonl   # one delivery record per line, append-only
//! ```
//!
//! The cursor has exactly one writer (the sync engine, which never runs two
//! passes at once), so stores only need single-record atomicity.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::settings::{Settings, SettingsPatch};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Bookmark of the last processed post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// `None` until the first pass has picked a starting point.
    #[serde(rename = "lastProcessedPostUri", alias = "lastProcessedUri")]
    pub last_processed_uri: Option<String>,
    /// When the cursor last moved.
    #[serde(rename = "lastProcessedAt")]
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl Cursor {
    /// A cursor pointing at `uri`, stamped now.
    #[must_use]
    pub fn at(uri: impl Into<String>) -> Self {
        Self {
            last_processed_uri: Some(uri.into()),
            last_processed_at: Some(Utc::now()),
        }
    }

    /// Whether no post has ever been processed.
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.last_processed_uri.is_none()
    }
}

/// One successful delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub post_uri: String,
    pub post_url: String,
    pub delivered_at: DateTime<Utc>,
}

/// Storage for the cursor singleton.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Read the cursor, creating an empty one on first access.
    async fn read_cursor(&self) -> Result<Cursor, StoreError>;

    /// Replace the cursor.
    async fn write_cursor(&self, cursor: &Cursor) -> Result<(), StoreError>;
}

/// Storage for the settings singleton.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the settings, creating defaults on first access.
    async fn read_settings(&self) -> Result<Settings, StoreError>;

    /// Validate and apply `patch` as one read-modify-write.
    async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StoreError>;
}

/// Append-only delivery history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_delivery(&self, record: &DeliveryRecord) -> Result<(), StoreError>;

    /// Up to `limit` most recent records, newest first.
    async fn recent_deliveries(&self, limit: usize) -> Result<Vec<DeliveryRecord>, StoreError>;
}

/// Everything the relay persists.
pub trait StateStore: CursorStore + SettingsStore + HistoryStore {}

impl<T: CursorStore + SettingsStore + HistoryStore> StateStore for T {}
