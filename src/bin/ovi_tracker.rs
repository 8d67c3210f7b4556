use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use ovi_tracker::api::NhlClient;
use ovi_tracker::config::{AppConfig, CONFIG_PATH, Secrets};
use ovi_tracker::discord::{GUILD_MESSAGES, Gateway, GatewayConfig, MESSAGE_CONTENT, RestClient};
use ovi_tracker::notifier::ImageNotifier;
use ovi_tracker::tracker::{Tracker, loop_outcome};

#[derive(Parser)]
#[command(name = "ovi-tracker", about = "Announce Ovechkin goals to a Discord channel")]
struct Args {
    /// Path to the TOML config file. Without it, config.toml is read if
    /// present and defaults apply otherwise.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = AppConfig::resolve(args.config.as_deref())?;
    info!(
        "Loaded config (file: {})",
        args.config
            .as_deref()
            .unwrap_or(Path::new(CONFIG_PATH))
            .display()
    );
    let secrets = Secrets::from_env()?;

    let tracker_cfg = &config.tracker;
    info!(
        "Tracking player {} ({}) on {} — poll={}s",
        tracker_cfg.player_id,
        tracker_cfg.player_name,
        tracker_cfg.team,
        tracker_cfg.poll_interval_secs,
    );

    let nhl = NhlClient::new(
        &tracker_cfg.nhl_api_base,
        &tracker_cfg.team,
        tracker_cfg.player_id,
        tracker_cfg.request_timeout(),
    )?;
    let rest = RestClient::new(&config.discord.api_base, &secrets.token)?;
    let notifier = ImageNotifier::new(rest, &secrets.channel_id, &config.discord.image_path);

    info!("Connecting to Discord gateway...");
    let gateway = Gateway::connect(GatewayConfig {
        url: config.discord.gateway_url.clone(),
        token: secrets.token.clone(),
        intents: GUILD_MESSAGES | MESSAGE_CONTENT,
    })
    .await
    .context("error opening Discord connection")?;

    info!("Bot is now running. Press Ctrl+C to exit.");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let tracker = Tracker::new(nhl, gateway.handle(), notifier, tracker_cfg.settings());
    let mut poller = tokio::spawn(tracker.run(async move {
        let _ = stop_rx.await;
    }));

    let outcome = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            let _ = stop_tx.send(());
            loop_outcome((&mut poller).await)
        }
        result = &mut poller => loop_outcome(result),
    };

    gateway.shutdown().await;
    outcome
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
