//! Binary entry point: wires config, store, and the X API adapters into
//! the ingestion loop, then supervises the loop until shutdown.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use refbot::config::Config;
use refbot::ingest::{wait_or_shutdown, IngestLoop, LoopOptions};
use refbot::registry::postgres::PgStore;
use refbot::registry::Registry;
use refbot::x_api::{XApiClient, XFeed, XTransport};

/// Referral-code reply bot for a watched conversation thread.
#[derive(Parser, Debug)]
#[command(name = "refbot", version, about)]
struct Cli {
    /// Override the poll interval in seconds.
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Validate configuration and database connectivity, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(secs) = cli.poll_interval {
        config.poll_interval = std::time::Duration::from_secs(secs);
    }

    let store = PgStore::connect(&config.database_url)
        .await
        .context("failed to connect to postgres")?;
    store.migrate().await.context("failed to apply migrations")?;
    info!("database ready");

    if cli.check {
        info!("configuration and database check passed");
        return Ok(());
    }

    let client = XApiClient::new(config.bearer_token.clone());
    let registry = Registry::with_max_attempts(store, config.max_registration_retries);
    let options = LoopOptions {
        bot_user_id: config.bot_user_id.clone(),
        referral_base_url: config.referral_base_url.clone(),
        poll_interval: config.poll_interval,
    };
    let mut ingest = IngestLoop::new(
        XFeed::new(client.clone(), &config.conversation_id, config.page_size),
        XTransport::new(client),
        registry,
        options,
    );

    let (shutdown_tx, mut shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // A fatal feed error ends the loop instance; restart it after a fixed
    // delay. The loop keeps its cursor across restarts, so no message is
    // processed twice.
    loop {
        match ingest.run(shutdown.clone()).await {
            Ok(()) => break,
            Err(feed_error) => {
                error!(
                    "ingestion stopped: {feed_error}; restarting in {}s",
                    config.restart_delay.as_secs()
                );
                if wait_or_shutdown(config.restart_delay, &mut shutdown).await {
                    break;
                }
            }
        }
    }

    info!("refbot exiting");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .compact()
        .init();
}
