//! Lootbridge - game event correlation and webhook delivery
//!
//! A headless companion that follows the game client's chat and loot feed,
//! assembles kills, drops and milestones into events, and delivers them to
//! a webhook endpoint with retries.

mod bridge;
mod cache;
mod common;
mod config;
mod correlator;
mod delivery;
mod game;
mod parser;
mod router;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backon::BackoffBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use bridge::{ChannelBundle, Orchestrator};
use cache::KillCountCache;
use config::{env::get_config_path, load_and_validate};
use correlator::EventCorrelator;
use delivery::{failure_summary, DeliveryService, HttpTransport};
use game::{ConfigItemCatalog, ConfiguredScreenshots, FeedSource, GameSession, SessionEnd};

/// Create an exponential backoff iterator for reopening the feed.
/// 1s initial, 1min max, factor 2, with jitter, unlimited retries.
fn feed_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(60))
        .with_factor(2.0)
        .with_jitter()
        .without_max_times()
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Lootbridge v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Player: {}", config.player);
    info!("  Destinations: {}", config.destinations.len());
    info!("  Feed: {}", config.feed.as_deref().unwrap_or("stdin"));

    let channels = ChannelBundle::new();

    // ============================================================
    // Delivery worker
    // ============================================================
    let transport = HttpTransport::new(&config.endpoint)?;
    let delivery = Arc::new(DeliveryService::new(transport, config.delivery.clone()));
    let delivery_task = tokio::spawn(Arc::clone(&delivery).run(channels.delivery.stop_rx));

    // ============================================================
    // Orchestrator: router -> payload -> delivery
    // ============================================================
    let screenshots = ConfiguredScreenshots::from_path(config.screenshots.path.as_deref());
    let orchestrator = Orchestrator::from_config(&config, screenshots, Arc::clone(&delivery));
    let orchestrator_task = tokio::spawn(orchestrator.run(channels.pipeline));

    // ============================================================
    // Game session with feed reconnection
    // ============================================================
    let cache = Arc::new(KillCountCache::from_config(&config.cache));
    let correlator = EventCorrelator::new(
        config.player.clone(),
        config.correlation.clone(),
        cache,
        channels.session.events_tx,
    );
    let catalog = ConfigItemCatalog::new(&config.items);
    if catalog.is_empty() {
        warn!("No item prices configured, drop values will be 0");
    } else {
        info!("  Priced items: {}", catalog.len());
    }
    let session = GameSession::new(
        correlator.clone(),
        catalog,
        config.correlation.tick_interval(),
    );
    let source = FeedSource::from_config(config.feed.as_deref());
    let mut session_task = tokio::spawn(run_session(
        session,
        source,
        channels.session.shutdown_rx,
    ));

    // ============================================================
    // Wait for a signal or for the feed to end
    // ============================================================
    let signalled = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - flushing pending events...");
            true
        }
        _ = &mut session_task => false,
    };

    channels.control.shutdown();
    if signalled {
        match tokio::time::timeout(Duration::from_secs(5), session_task).await {
            Ok(Ok(())) => info!("Game session stopped"),
            Ok(Err(e)) => warn!("Game session task panicked: {}", e),
            Err(_) => warn!("Game session did not stop in time"),
        }
    }

    info!(pending = correlator.pending_count(), "Flushing pending correlations");
    correlator.flush_all();
    drop(correlator);

    match tokio::time::timeout(Duration::from_secs(10), orchestrator_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Orchestrator task panicked: {}", e),
        Err(_) => warn!("Orchestrator did not stop in time"),
    }

    channels.control.stop_delivery();
    if let Err(e) = delivery_task.await {
        warn!("Delivery task panicked: {}", e);
    }

    for (category, count) in failure_summary(delivery.failures()) {
        info!(?category, count, "Delivery failures this run");
    }
    let remaining = delivery.queue_len();
    if remaining > 0 {
        warn!(remaining, "Exiting with undelivered notifications in the retry queue");
    }

    info!("Exiting...");
    Ok(())
}

/// Run the session, reopening the feed with backoff whenever it fails.
async fn run_session(
    session: GameSession<ConfigItemCatalog>,
    source: FeedSource,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = feed_backoff();

    loop {
        if *shutdown_rx.borrow() {
            info!("Shutdown signal detected, stopping feed loop");
            break;
        }

        match source.open().await {
            Ok(mut feed) => {
                backoff = feed_backoff(); // Reset backoff once the feed is open

                match session.run(&mut feed, &mut shutdown_rx).await {
                    Ok(SessionEnd::Shutdown) => break,
                    Ok(SessionEnd::FeedEnded) if source.is_finite() => break,
                    Ok(SessionEnd::FeedEnded) => info!("Game feed ended"),
                    Err(e) => error!("Game feed error: {}", e),
                }
            }
            Err(e) => {
                error!("Failed to open game feed: {}", e);
            }
        }

        let delay = backoff.next().unwrap_or(Duration::from_secs(60));
        info!("Reopening feed in {:.1} seconds...", delay.as_secs_f64());

        // Wait for delay OR shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(delay) => {},
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received during backoff");
                    break;
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
