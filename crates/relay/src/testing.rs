//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use notify::{ChannelError, Message, NotifyChannel};
use tokio::sync::{oneshot, Notify};

use crate::delivery::Deliverer;
use crate::error::{SourceError, StoreError};
use crate::pipeline::{SyncConfig, SyncEngine};
use crate::post::{Author, Post};
use crate::settings::{Settings, SettingsPatch};
use crate::source::PostSource;
use crate::store::{
    Cursor, CursorStore, DeliveryRecord, HistoryStore, MemoryStore, SettingsStore, StateStore,
};

pub const ACTOR: &str = "me.bsky.social";

/// URI of the test post with record key `rkey`.
pub fn uri(rkey: &str) -> String {
    format!("at://did:plc:me/app.bsky.feed.post/{rkey}")
}

/// A plain post whose text is `post {rkey}`. Later keys sort as newer.
pub fn post(rkey: &str) -> Post {
    let minutes = rkey.bytes().map(i64::from).sum::<i64>();
    Post::new(
        uri(rkey),
        Author::new(ACTOR),
        format!("post {rkey}"),
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
    )
}

/// A newest-first page from record keys.
pub fn page(rkeys: &[&str]) -> Vec<Post> {
    rkeys.iter().map(|k| post(k)).collect()
}

/// Settings that let every post through.
pub fn permissive_settings() -> Settings {
    Settings {
        ignore_replies: false,
        ignore_reposts: false,
        ..Settings::default()
    }
}

/// Source that serves a fixed page and can be told to fail or stall.
#[derive(Default)]
pub struct FakeSource {
    page: Mutex<Vec<Post>>,
    failures: AtomicUsize,
    fetches: AtomicUsize,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    entered: Notify,
}

impl FakeSource {
    pub fn with_page(page: Vec<Post>) -> Self {
        let source = Self::default();
        source.set_page(page);
        source
    }

    pub fn set_page(&self, page: Vec<Post>) {
        *self.page.lock().unwrap() = page;
    }

    /// Make the next `n` fetches fail with a transport-style error.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Stall the next fetch until the returned sender fires (or drops).
    pub fn hold_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Wait until a fetch has started.
    pub async fn wait_for_fetch(&self) {
        self.entered.notified().await;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostSource for FakeSource {
    async fn authenticate(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn fetch_recent_posts(&self, _actor: &str, limit: u32) -> Result<Vec<Post>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(SourceError::Api {
                status: 502,
                error: "UpstreamFailure".to_string(),
                message: "bad gateway".to_string(),
            });
        }

        let page = self.page.lock().unwrap();
        Ok(page.iter().take(limit as usize).cloned().collect())
    }
}

/// Channel that records what it was asked to send.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Message>>,
    attempts: AtomicUsize,
    failing: Vec<String>,
}

impl RecordingChannel {
    /// A channel that rejects the posts with the given record keys.
    pub fn failing_on(rkeys: &[&str]) -> Self {
        Self {
            failing: rkeys.iter().map(|k| format!("/post/{k}")).collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Post links of successfully sent messages, in send order.
    pub fn sent_rkeys(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|m| m.content.rsplit('/').next().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl NotifyChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn initialize(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn send(&self, message: &Message) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|f| message.content.ends_with(f)) {
            return Err(ChannelError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Memory store whose writes can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_cursor_writes: AtomicBool,
    pub fail_history: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    fn io_error() -> StoreError {
        StoreError::Io(std::io::Error::other("disk full"))
    }
}

#[async_trait]
impl CursorStore for FlakyStore {
    async fn read_cursor(&self) -> Result<Cursor, StoreError> {
        self.inner.read_cursor().await
    }

    async fn write_cursor(&self, cursor: &Cursor) -> Result<(), StoreError> {
        if self.fail_cursor_writes.load(Ordering::SeqCst) {
            return Err(Self::io_error());
        }
        self.inner.write_cursor(cursor).await
    }
}

#[async_trait]
impl SettingsStore for FlakyStore {
    async fn read_settings(&self) -> Result<Settings, StoreError> {
        self.inner.read_settings().await
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StoreError> {
        self.inner.update_settings(patch).await
    }
}

#[async_trait]
impl HistoryStore for FlakyStore {
    async fn append_delivery(&self, record: &DeliveryRecord) -> Result<(), StoreError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(Self::io_error());
        }
        self.inner.append_delivery(record).await
    }

    async fn recent_deliveries(&self, limit: usize) -> Result<Vec<DeliveryRecord>, StoreError> {
        self.inner.recent_deliveries(limit).await
    }
}

/// Wiring for one engine under test.
pub struct Harness {
    pub source: Arc<FakeSource>,
    pub channel: Arc<RecordingChannel>,
    pub store: Arc<dyn StateStore>,
    pub engine: Arc<SyncEngine>,
}

impl Harness {
    pub fn new(source: FakeSource, channel: RecordingChannel, store: Arc<dyn StateStore>) -> Self {
        let source = Arc::new(source);
        let channel = Arc::new(channel);
        let engine = Arc::new(SyncEngine::new(
            SyncConfig {
                actor: ACTOR.to_string(),
                fetch_limit: 10,
            },
            source.clone(),
            Deliverer::new(channel.clone()),
            store.clone(),
        ));
        Self {
            source,
            channel,
            store,
            engine,
        }
    }

    /// Steady-state harness: cursor at `cursor_rkey`, all filters off.
    pub fn steady(page_rkeys: &[&str], cursor_rkey: &str) -> Self {
        let store = MemoryStore::new(permissive_settings()).with_cursor(Cursor::at(uri(cursor_rkey)));
        Self::new(
            FakeSource::with_page(page(page_rkeys)),
            RecordingChannel::default(),
            Arc::new(store),
        )
    }

    pub async fn cursor_uri(&self) -> Option<String> {
        self.store.read_cursor().await.unwrap().last_processed_uri
    }

    pub async fn history_uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self
            .store
            .recent_deliveries(100)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.post_uri)
            .collect();
        uris.reverse();
        uris
    }
}
