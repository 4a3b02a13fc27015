//! Bluesky source.
//!
//! Logs in with an app password and reads the account's author feed over
//! XRPC.

mod client;
mod types;

pub use client::{BlueskyClient, DEFAULT_SERVICE};
