//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it. Credentials are only ever read, never logged.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use notify::DISCORD_API_BASE;

use crate::bluesky::DEFAULT_SERVICE;
use crate::settings::{DEFAULT_POLL_INTERVAL_MINUTES, MAX_POLL_INTERVAL_MINUTES};

/// Relay - mirror new Bluesky posts into a Discord channel.
#[derive(Debug, Parser)]
#[command(name = "relay")]
#[command(about = "Mirror new Bluesky posts into a Discord channel")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum Commands {
    /// Run the scheduler and admin API until interrupted (default)
    Run,

    /// Run a single pass and print its report
    Once,
}

/// Runtime configuration.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Bluesky handle or email used to log in
    #[arg(long, env = "BLUESKY_IDENTIFIER")]
    pub bluesky_identifier: String,

    /// Bluesky app password
    #[arg(long, env = "BLUESKY_APP_PASSWORD", hide_env_values = true)]
    pub bluesky_app_password: String,

    /// Bluesky service URL
    #[arg(long, env = "BLUESKY_SERVICE", default_value = DEFAULT_SERVICE)]
    pub bluesky_service: String,

    /// Account to mirror (defaults to the login identifier)
    #[arg(long, env = "BLUESKY_ACTOR")]
    pub bluesky_actor: Option<String>,

    /// Posts requested per fetch
    #[arg(long, env = "FETCH_LIMIT", default_value = "10", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub fetch_limit: u32,

    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: String,

    /// Destination Discord channel id
    #[arg(long, env = "DISCORD_CHANNEL_ID")]
    pub discord_channel_id: String,

    /// Discord REST base URL
    #[arg(long, env = "DISCORD_API_BASE", default_value = DISCORD_API_BASE)]
    pub discord_api_base: String,

    /// Poll interval used until settings are first written
    #[arg(long, env = "POLL_INTERVAL_MINUTES", default_value_t = DEFAULT_POLL_INTERVAL_MINUTES, value_parser = clap::value_parser!(u64).range(1..=MAX_POLL_INTERVAL_MINUTES))]
    pub poll_interval_minutes: u64,

    /// Directory holding cursor, settings and history
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Keep state in memory only (nothing survives a restart)
    #[arg(long, env = "EPHEMERAL_STATE")]
    pub ephemeral: bool,

    /// Admin API port
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Bearer token required by the admin API
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Timeout for outbound HTTP requests, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "30")]
    pub http_timeout_secs: u64,
}

impl Config {
    /// Account whose feed is mirrored.
    pub fn actor(&self) -> &str {
        self.bluesky_actor
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(&self.bluesky_identifier)
    }

    /// Admin token, treating an empty value as unset.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Shared HTTP client for both services.
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .user_agent(concat!("relay/", env!("CARGO_PKG_VERSION")))
            .build()
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set. `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "relay=debug,notify=debug,info"
    } else {
        "relay=info,notify=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
