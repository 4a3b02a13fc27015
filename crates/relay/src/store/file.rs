//! JSON-file store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::SeekFrom;

use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Cursor, CursorStore, DeliveryRecord, HistoryStore, SettingsStore};
use crate::error::StoreError;
use crate::settings::{Settings, SettingsPatch};

const CURSOR_FILE: &str = "cursor.json";
const SETTINGS_FILE: &str = "settings.json";
const HISTORY_FILE: &str = "history.jsonl";

/// Read size when scanning history backwards.
const TAIL_CHUNK_BYTES: u64 = 8 * 1024;

/// Store backed by files in a data directory.
pub struct FileStore {
    root_dir: PathBuf,
    default_settings: Settings,
    /// Serializes read-modify-write sequences within the process.
    lock: Mutex<()>,
}

impl FileStore {
    /// Create a store rooted at `root_dir`. Settings created on first access
    /// start from `default_settings`.
    pub fn new(root_dir: impl Into<PathBuf>, default_settings: Settings) -> Self {
        Self {
            root_dir: root_dir.into(),
            default_settings,
            lock: Mutex::new(()),
        }
    }

    /// Data directory.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path(&self, file_name: &str) -> PathBuf {
        self.root_dir.join(file_name)
    }

    /// Write JSON atomically (write to temp, then rename).
    async fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path(file_name);
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read JSON, returning `None` if the file does not exist.
    async fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<Option<T>, StoreError> {
        match tokio::fs::read(self.path(file_name)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a singleton record, creating it from `default` when missing.
    async fn read_or_create<T>(&self, file_name: &str, default: impl FnOnce() -> T) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(value) = self.read_json(file_name).await? {
            return Ok(value);
        }

        let value = default();
        self.write_json(file_name, &value).await?;
        info!(file = file_name, dir = %self.root_dir.display(), "Created default record");
        Ok(value)
    }
}

#[async_trait]
impl CursorStore for FileStore {
    async fn read_cursor(&self) -> Result<Cursor, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_or_create(CURSOR_FILE, Cursor::default).await
    }

    async fn write_cursor(&self, cursor: &Cursor) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write_json(CURSOR_FILE, cursor).await?;
        debug!(uri = ?cursor.last_processed_uri, "Cursor saved");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileStore {
    async fn read_settings(&self) -> Result<Settings, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_or_create(SETTINGS_FILE, || self.default_settings.clone())
            .await
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StoreError> {
        let _guard = self.lock.lock().await;
        let current = self
            .read_or_create(SETTINGS_FILE, || self.default_settings.clone())
            .await?;
        let next = patch.apply_to(&current)?;
        self.write_json(SETTINGS_FILE, &next).await?;
        Ok(next)
    }
}

#[async_trait]
impl HistoryStore for FileStore {
    async fn append_delivery(&self, record: &DeliveryRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(HISTORY_FILE))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn recent_deliveries(&self, limit: usize) -> Result<Vec<DeliveryRecord>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let _guard = self.lock.lock().await;
        let mut file = match tokio::fs::File::open(self.path(HISTORY_FILE)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let tail = read_tail(&mut file, limit).await?;

        let mut records = Vec::with_capacity(limit.min(64));
        for line in tail
            .split(|b| *b == b'\n')
            .rev()
            .filter(|l| !l.iter().all(u8::is_ascii_whitespace))
        {
            if records.len() >= limit {
                break;
            }
            match serde_json::from_slice::<DeliveryRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "Skipping malformed history line"),
            }
        }
        Ok(records)
    }
}

/// Read backwards from the end of `file` until at least `lines` whole lines
/// are buffered or the start of the file is reached. A leading partial line
/// is dropped.
async fn read_tail(file: &mut tokio::fs::File, lines: usize) -> std::io::Result<Vec<u8>> {
    let mut pos = file.seek(SeekFrom::End(0)).await?;
    let mut buf = Vec::new();
    let mut newlines = 0;

    while pos > 0 {
        let step = pos.min(TAIL_CHUNK_BYTES);
        pos -= step;
        file.seek(SeekFrom::Start(pos)).await?;

        let mut chunk = Vec::new();
        (&mut *file).take(step).read_to_end(&mut chunk).await?;
        newlines += chunk.iter().filter(|b| **b == b'\n').count();
        chunk.extend_from_slice(&buf);
        buf = chunk;

        // The newline closing the oldest wanted line must be preceded by one
        // more, so the line is known to be whole.
        if newlines > lines {
            break;
        }
    }

    if pos > 0 {
        if let Some(start) = buf.iter().position(|b| *b == b'\n') {
            buf.drain(..=start);
        }
    }
    Ok(buf)
}
