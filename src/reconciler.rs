//! Periodic reconciliation against the broker's authoritative state

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{info, warn};

use crate::broker::{Broker, BrokerError};
use crate::state::{OpenOrder, Position, StateStore};

/// Poll the broker on a fixed cadence until the shutdown signal fires,
/// overwriting local belief with broker truth. A pending fetch is aborted
/// when shutdown arrives mid-pass.
pub async fn reconcile_loop(
    broker: Arc<dyn Broker>,
    store: Arc<StateStore>,
    symbol: String,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("reconciliation loop stopping");
                return;
            }
            _ = ticker.tick() => {}
        }
        tokio::select! {
            _ = shutdown.recv() => {
                info!("reconciliation loop stopping");
                return;
            }
            _ = reconcile_once(broker.as_ref(), &store, &symbol) => {}
        }
    }
}

/// One reconciliation pass. The three fetches fail independently; a failure
/// in one never blocks the others.
pub async fn reconcile_once(broker: &dyn Broker, store: &StateStore, symbol: &str) {
    match broker.open_orders().await {
        Ok(orders) => {
            // Broker state fully supersedes local belief: replace, not merge.
            let open_orders: HashMap<String, OpenOrder> = orders
                .into_iter()
                .map(|order| {
                    (
                        order.client_order_id.clone(),
                        OpenOrder {
                            client_order_id: order.client_order_id,
                            order_id: order.id,
                            status: order.status,
                        },
                    )
                })
                .collect();
            store.set_open_orders(open_orders);
        }
        Err(e) => warn!(error = %e, "reconcile open orders failed"),
    }

    match broker.position(symbol).await {
        Ok(position) => store.update_position(Position {
            qty: position.qty,
            avg_entry: position.avg_entry,
        }),
        Err(BrokerError::PositionNotFound) => {
            // Flat book at the broker, not an error
            store.update_position(Position::default());
        }
        Err(e) => warn!(error = %e, "reconcile position failed"),
    }

    match broker.account().await {
        Ok(account) => {
            info!(equity = %account.equity, buying_power = %account.buying_power, "account");
        }
        Err(e) => warn!(error = %e, "reconcile account failed"),
    }
}
