//! Relay CLI - mirror new Bluesky posts into a Discord channel.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use notify::{DiscordChannel, NotifyChannel};
use tokio_util::sync::CancellationToken;

use relay::config::{init_tracing, Cli, Commands, Config};
use relay::server::{run_server, AppState};
use relay::{
    BlueskyClient, Deliverer, FileStore, MemoryStore, PostSource, Scheduler, Settings,
    StateStore, SyncConfig, SyncEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // A .env file only fills variables that are not already set.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read .env file"),
    }

    let config = cli.config;
    let engine = Arc::new(boot(&config).await?);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Once => {
            let report = engine.run_pass().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Run => serve(&config, engine).await,
    }
}

/// Connect to both services and open the store. Any failure here is fatal.
async fn boot(config: &Config) -> Result<SyncEngine> {
    let http = config
        .http_client()
        .context("Failed to build HTTP client")?;

    let source = BlueskyClient::new(&config.bluesky_identifier, &config.bluesky_app_password)
        .with_service(&config.bluesky_service)
        .with_client(http.clone());
    source
        .authenticate()
        .await
        .context("Failed to log in to Bluesky")?;

    let channel = DiscordChannel::new(&config.discord_token, &config.discord_channel_id)
        .with_api_base(&config.discord_api_base)
        .with_client(http);
    channel
        .initialize()
        .await
        .with_context(|| format!("Discord channel {} is not usable", config.discord_channel_id))?;

    let default_settings = Settings::with_poll_interval(config.poll_interval_minutes);
    let store: Arc<dyn StateStore> = if config.ephemeral {
        tracing::warn!("Using in-memory state; cursor will not survive a restart");
        Arc::new(MemoryStore::new(default_settings))
    } else {
        tracing::info!(data_dir = %config.data_dir.display(), "Using file state");
        Arc::new(FileStore::new(&config.data_dir, default_settings))
    };

    Ok(SyncEngine::new(
        SyncConfig {
            actor: config.actor().to_string(),
            fetch_limit: config.fetch_limit,
        },
        Arc::new(source),
        Deliverer::new(Arc::new(channel)),
        store,
    ))
}

async fn serve(config: &Config, engine: Arc<SyncEngine>) -> Result<()> {
    if config.admin_token().is_none() {
        tracing::warn!("ADMIN_TOKEN is not set; the admin API is unauthenticated");
    }

    let (scheduler, handle) = Scheduler::new(engine.clone());
    let state = AppState {
        store: engine.store(),
        scheduler: handle,
        admin_token: config.admin_token().map(Arc::from),
    };

    let shutdown = CancellationToken::new();
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));
    let mut server_task = tokio::spawn(run_server(state, config.port, shutdown.clone()));

    let server_result = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested");
            shutdown.cancel();
            server_task.await
        }
        result = &mut server_task => {
            tracing::error!("Admin API exited unexpectedly");
            shutdown.cancel();
            result
        }
    };

    scheduler_task.await.context("Scheduler task panicked")?;
    server_result.context("Admin API task panicked")??;
    tracing::info!("Relay stopped");
    Ok(())
}
