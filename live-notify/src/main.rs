mod cli;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use live_notify::config::AppConfig;
use live_notify::credentials::{AuthProvider, TwitchCredentialSource};
use live_notify::domain::StreamStatus;
use live_notify::logging::{init_logging, start_retention_cleanup};
use live_notify::monitor::{
    HelixStatusSource, JsonFileStateStore, NotificationKind, RetryingFetcher, StateStore,
};
use live_notify::notification::{DiscordChannel, Notifier};
use live_notify::scheduler::{Clock, PollScheduler, SystemClock};
use live_notify::utils::http_client::build_client;

use crate::cli::Args;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let _log_guard = init_logging(args.verbose || args.debug_api, args.log_dir.as_deref())?;

    let config = AppConfig::load(&args.config)?;
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = build_client(Duration::from_secs(config.advanced.request_timeout_secs))?;
    let engine = config.engine_config();
    let templates = config.templates();
    let style = config.style_options()?;

    let notifier = Arc::new(DiscordChannel::new(
        config.discord.clone(),
        client.clone(),
        engine.channel.clone(),
        clock.clone(),
    ));

    if args.test {
        info!("Sending test notification");
        let status = synthetic_status(&engine.channel, clock.now());
        let kind = NotificationKind::WentLive;
        notifier
            .send(&kind, &status, templates.for_kind(&kind), &style)
            .await
            .context("test notification failed")?;
        info!("Test notification sent");
        return Ok(());
    }

    let credentials = Arc::new(
        TwitchCredentialSource::new(client.clone(), clock.clone()).with_debug_api(args.debug_api),
    );
    let auth = Arc::new(AuthProvider::new(
        config.twitch.client_id.clone(),
        config.twitch.client_secret.clone(),
        credentials,
        clock.clone(),
    ));
    let source = Arc::new(
        HelixStatusSource::new(client, config.twitch.client_id.clone())
            .with_debug_api(args.debug_api),
    );
    let fetcher = RetryingFetcher::new(source, auth, clock.clone(), config.advanced.retry.clone())
        .with_probe(config.advanced.reachability_probe);

    let store = Arc::new(JsonFileStateStore::new(&config.advanced.state_file));
    let state = store
        .load()
        .await
        .context("failed to load engine state")?
        .unwrap_or_default();

    let cancel = CancellationToken::new();
    if let Some(dir) = args.log_dir.as_deref() {
        start_retention_cleanup(dir, cancel.clone());
    }
    spawn_shutdown_listener(cancel.clone());

    info!(
        channel = %engine.channel,
        state_file = %config.advanced.state_file.display(),
        silent_mode = engine.silent_mode,
        "Starting monitor"
    );

    let mut scheduler = PollScheduler::new(engine, fetcher, store, notifier, clock, state)
        .with_templates(templates)
        .with_style(style);
    scheduler.run(cancel).await?;

    info!("Notifier stopped");
    Ok(())
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });
}

/// Status used by `--test`.
fn synthetic_status(channel: &str, now: DateTime<Utc>) -> StreamStatus {
    let login = channel.to_lowercase();
    StreamStatus::live()
        .title("Test Stream Title")
        .game("Test Game")
        .viewers(42)
        .started_at(now)
        .thumbnail(format!(
            "https://static-cdn.jtvnw.net/previews-ttv/live_user_{}-1280x720.jpg",
            login
        ))
        .user(login, channel)
        .language("en")
        .build()
}
