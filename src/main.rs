//! Tidebot - bar-driven trading bot
//!
//! Wires the pipeline together: config, decision log, state store, broker,
//! strategy, decision engine, simulated feed and the reconciliation loop,
//! all under one shared shutdown signal.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use tidebot::alpaca::AlpacaBroker;
use tidebot::broker::Broker;
use tidebot::config::{Config, RunMode};
use tidebot::decision_log::DecisionLog;
use tidebot::engine::DecisionEngine;
use tidebot::feed::SimulatedFeed;
use tidebot::reconciler;
use tidebot::state::StateStore;
use tidebot::strategy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config_path = std::env::args().nth(1);
    let cfg = Config::load(config_path.as_deref())?;

    let run_id = generate_run_id();
    info!(run_id = %run_id, mode = ?cfg.mode, symbol = %cfg.symbol, strategy = %cfg.strategy, "starting tidebot");

    let decisions = Arc::new(DecisionLog::open(&cfg.decisions_path, &run_id)?);

    let store = Arc::new(StateStore::new());
    match store.load(&cfg.checkpoint_path).await {
        Ok(()) => info!(path = %cfg.checkpoint_path, "checkpoint restored"),
        Err(_) => info!(path = %cfg.checkpoint_path, "no checkpoint, starting fresh"),
    }

    let broker: Arc<dyn Broker> =
        Arc::new(AlpacaBroker::new(&cfg.broker_base_url, &cfg.api_key, &cfg.api_secret)?);
    let strategy = strategy::from_name(&cfg.strategy, cfg.max_qty)?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(());
            }
        });
    }

    if cfg.mode == RunMode::Paper {
        tokio::spawn(reconciler::reconcile_loop(
            Arc::clone(&broker),
            Arc::clone(&store),
            cfg.symbol.clone(),
            cfg.reconcile_interval(),
            shutdown_tx.subscribe(),
        ));
    }

    let (bar_tx, mut bar_rx) = mpsc::channel(64);
    let feed = SimulatedFeed::new(&cfg.symbol, cfg.feed_interval());
    tokio::spawn(feed.run(bar_tx, shutdown_tx.subscribe()));

    let mut engine = DecisionEngine::new(
        cfg.clone(),
        strategy,
        Arc::clone(&broker),
        Arc::clone(&store),
        Arc::clone(&decisions),
    );

    let mut shutdown = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            bar = bar_rx.recv() => match bar {
                Some(bar) => engine.on_bar(&bar).await,
                None => {
                    warn!("bar feed ended");
                    break;
                }
            }
        }
    }

    if let Err(e) = store.save(&cfg.checkpoint_path).await {
        error!(error = %e, "failed to save checkpoint");
    }
    if let Err(e) = decisions.close() {
        error!(error = %e, "failed to close decision log");
    }

    info!("tidebot shutdown complete");
    Ok(())
}

/// Run identifier: sortable timestamp plus a short random suffix
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", timestamp, &suffix[..8])
}
