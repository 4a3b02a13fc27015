//! Relay crate for mirroring a Bluesky account into a Discord channel.
//!
//! This crate provides:
//! - Bluesky author-feed polling over XRPC
//! - Cursor-based change detection with first-run suppression
//! - Reply, repost and keyword filtering
//! - One Discord message per new post, committed post by post
//! - A single-flight scheduler and an admin HTTP API

pub mod bluesky;
pub mod changelog;
pub mod config;
pub mod delivery;
pub mod error;
pub mod filter;
pub mod format;
pub mod pipeline;
pub mod post;
pub mod scheduler;
pub mod server;
pub mod settings;
pub mod source;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export main types
pub use bluesky::BlueskyClient;
pub use delivery::{Deliverer, DeliveryOutcome};
pub use error::{SourceError, StoreError, SyncError};
pub use pipeline::{PassReport, SyncConfig, SyncEngine};
pub use post::{Author, Post};
pub use scheduler::{Scheduler, SchedulerHandle, TriggerOutcome};
pub use settings::{Settings, SettingsPatch};
pub use source::PostSource;
pub use store::{Cursor, DeliveryRecord, FileStore, MemoryStore, StateStore};
