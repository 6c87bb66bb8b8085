//! Market data delivery - a simulated random-walk feed over a bar channel

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::info;

use crate::market::Bar;

/// Generates a random-walk close price on a fixed cadence and pushes bars
/// into the channel until the shutdown signal fires. Stands in for a live
/// websocket transport, which is out of scope for this bot.
pub struct SimulatedFeed {
    symbol: String,
    period: Duration,
    price: Decimal,
}

impl SimulatedFeed {
    pub fn new(symbol: &str, period: Duration) -> Self {
        Self {
            symbol: symbol.to_string(),
            period,
            price: Decimal::from(100),
        }
    }

    pub fn with_start_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    /// Run until cancelled. Closing the sender ends the consumer's loop.
    pub async fn run(mut self, bars: mpsc::Sender<Bar>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.period);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("simulated feed stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            // Step up to +-50 cents, floored at 1.00
            let step_cents: i64 = rand::thread_rng().gen_range(-50..=50);
            self.price = (self.price + Decimal::new(step_cents, 2)).max(Decimal::ONE);

            let bar = Bar {
                symbol: self.symbol.clone(),
                timestamp: Utc::now(),
                close: self.price,
            };
            if bars.send(bar).await.is_err() {
                // Consumer went away; nothing left to feed
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_stops_on_shutdown() {
        let (bar_tx, mut bar_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let feed = SimulatedFeed::new("FAKEPACA", Duration::from_millis(1));
        let handle = tokio::spawn(feed.run(bar_tx, shutdown_rx));

        // A few bars arrive, then shutdown ends the stream
        let first = bar_rx.recv().await.expect("bar");
        assert_eq!(first.symbol, "FAKEPACA");
        assert!(first.close > Decimal::ZERO);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        // Sender dropped: channel drains then closes
        while bar_rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn test_price_stays_positive() {
        let (bar_tx, mut bar_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let feed = SimulatedFeed::new("FAKEPACA", Duration::from_millis(1))
            .with_start_price(Decimal::ONE);
        let handle = tokio::spawn(feed.run(bar_tx, shutdown_rx));

        for _ in 0..20 {
            let bar = bar_rx.recv().await.expect("bar");
            assert!(bar.close >= Decimal::ONE);
        }
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
