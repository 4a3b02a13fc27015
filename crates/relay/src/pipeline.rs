//! Sync engine - one fetch, filter, deliver, commit pass.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::delivery::{Deliverer, DeliveryOutcome};
use crate::error::{StoreError, SyncError};
use crate::filter::select_candidates;
use crate::post::Post;
use crate::settings::Settings;
use crate::source::PostSource;
use crate::store::{Cursor, DeliveryRecord, StateStore};

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Account whose feed is mirrored.
    pub actor: String,
    /// Posts requested per fetch.
    pub fetch_limit: u32,
}

/// Result of a single pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    /// Posts returned by the source.
    pub fetched: usize,
    /// Posts left after the cursor and filters.
    pub candidates: usize,
    /// Posts sent to the destination.
    pub delivered: usize,
    /// Posts whose delivery failed (and were skipped).
    pub failed: usize,
    /// Cursor commits that could not be persisted.
    pub cursor_write_failures: usize,
    /// The cursor was empty at pass start; nothing was delivered.
    pub first_run: bool,
    /// Persisted cursor after the pass.
    pub cursor: Option<String>,
}

/// Runs sync passes against a source, a destination and a store.
pub struct SyncEngine {
    config: SyncConfig,
    source: Arc<dyn PostSource>,
    deliverer: Deliverer,
    store: Arc<dyn StateStore>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn PostSource>,
        deliverer: Deliverer,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            config,
            source,
            deliverer,
            store,
        }
    }

    /// The store this engine commits to.
    pub fn store(&self) -> Arc<dyn StateStore> {
        self.store.clone()
    }

    /// Current settings from the store.
    pub async fn settings(&self) -> Result<Settings, StoreError> {
        self.store.read_settings().await
    }

    /// Run one pass.
    ///
    /// The cursor and settings are read once up front and used for the whole
    /// pass. A fetch failure aborts the pass before anything is delivered.
    /// After that, each post's delivery is followed by a cursor commit
    /// whether or not the delivery succeeded, so a crash mid-batch resumes at
    /// the next post.
    pub async fn run_pass(&self) -> Result<PassReport, SyncError> {
        tracing::info!(actor = %self.config.actor, "Checking for new posts");

        let cursor = self.store.read_cursor().await?;
        let settings = self.store.read_settings().await?;

        let page = self
            .source
            .fetch_recent_posts(&self.config.actor, self.config.fetch_limit)
            .await?;

        let mut report = PassReport {
            fetched: page.len(),
            first_run: cursor.is_first_run(),
            cursor: cursor.last_processed_uri.clone(),
            ..PassReport::default()
        };

        let candidates = select_candidates(&page, &cursor, &settings);
        report.candidates = candidates.len();

        let Some(newest) = candidates.last() else {
            tracing::info!(fetched = report.fetched, "No new posts");
            return Ok(report);
        };

        if report.first_run {
            // Start from "now": the backlog is never announced.
            tracing::info!(
                uri = %newest.uri,
                skipped = candidates.len(),
                "First run, marking newest post as processed without delivering"
            );
            self.store.write_cursor(&Cursor::at(&newest.uri)).await?;
            report.cursor = Some(newest.uri.clone());
            return Ok(report);
        }

        tracing::info!(count = candidates.len(), "Delivering new posts");

        for post in &candidates {
            match self.deliverer.deliver(post).await {
                DeliveryOutcome::Delivered => {
                    report.delivered += 1;
                    self.record_delivery(post).await;
                }
                DeliveryOutcome::Failed { reason } => {
                    report.failed += 1;
                    tracing::warn!(uri = %post.uri, %reason, "Skipping undeliverable post");
                }
            }

            match self.store.write_cursor(&Cursor::at(&post.uri)).await {
                Ok(()) => report.cursor = Some(post.uri.clone()),
                Err(e) => {
                    report.cursor_write_failures += 1;
                    tracing::error!(
                        uri = %post.uri,
                        error = %e,
                        "Failed to persist cursor; post may be redelivered after a restart"
                    );
                }
            }
        }

        tracing::info!(
            fetched = report.fetched,
            candidates = report.candidates,
            delivered = report.delivered,
            failed = report.failed,
            "Pass complete"
        );
        Ok(report)
    }

    async fn record_delivery(&self, post: &Post) {
        let record = DeliveryRecord {
            post_uri: post.uri.clone(),
            post_url: post.web_url(),
            delivered_at: Utc::now(),
        };
        if let Err(e) = self.store.append_delivery(&record).await {
            tracing::warn!(uri = %post.uri, error = %e, "Failed to record delivery");
        }
    }
}
