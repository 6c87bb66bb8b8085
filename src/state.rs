//! Local world state - position, open orders, timestamps - with snapshot persistence

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Current holdings. Positive qty = long; the bot never goes short.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub qty: i64,
    pub avg_entry: Decimal,
}

/// One order the bot believes is live at the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub client_order_id: String,
    pub order_id: String,
    pub status: String,
}

/// The complete persisted state - the sole unit of durability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub position: Position,
    /// Keyed by client order ID. Always a valid map, never absent.
    #[serde(default)]
    pub open_orders: HashMap<String, OpenOrder>,
    #[serde(default)]
    pub last_trade_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_bar_time: Option<DateTime<Utc>>,
}

/// Concurrency-safe holder of the bot's believed world state.
///
/// Shared between the bar-consumption path and the reconciliation loop.
/// Reads never block other reads; every mutation is exclusive. Constructed
/// explicitly and passed around so tests can run independent instances.
pub struct StateStore {
    inner: RwLock<Snapshot>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Snapshot::default()),
        }
    }

    /// Deep copy of the current state. The open-orders map is cloned, so a
    /// returned snapshot never observes later mutation of the store.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().expect("state lock poisoned").clone()
    }

    pub fn update_position(&self, position: Position) {
        let mut guard = self.inner.write().expect("state lock poisoned");
        let old_qty = guard.position.qty;
        if old_qty != position.qty {
            info!(
                old_qty,
                new_qty = position.qty,
                avg_entry = %position.avg_entry,
                "position updated"
            );
        }
        guard.position = position;
    }

    /// Replace the entire open-orders mapping in one atomic operation
    pub fn set_open_orders(&self, orders: HashMap<String, OpenOrder>) {
        let mut guard = self.inner.write().expect("state lock poisoned");
        let old_count = guard.open_orders.len();
        if old_count != orders.len() {
            info!(old_count, new_count = orders.len(), "open orders updated");
        }
        guard.open_orders = orders;
    }

    pub fn set_last_trade_time(&self, t: DateTime<Utc>) {
        self.inner
            .write()
            .expect("state lock poisoned")
            .last_trade_time = Some(t);
    }

    pub fn set_last_bar_time(&self, t: DateTime<Utc>) {
        self.inner
            .write()
            .expect("state lock poisoned")
            .last_bar_time = Some(t);
    }

    /// Serialize the current snapshot to `path`, overwriting any prior file
    pub async fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        let data = serde_json::to_vec_pretty(&snapshot).context("serialize state snapshot")?;
        tokio::fs::write(path, data)
            .await
            .with_context(|| format!("write state snapshot to {}", path.display()))?;
        info!(
            path = %path.display(),
            position_qty = snapshot.position.qty,
            open_orders = snapshot.open_orders.len(),
            "state saved"
        );
        Ok(())
    }

    /// Replace in-memory state with a persisted snapshot. A failed load leaves
    /// the store at its prior state.
    pub async fn load(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("read state snapshot from {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_slice(&data).context("parse state snapshot")?;
        info!(
            path = %path.display(),
            position_qty = snapshot.position.qty,
            open_orders = snapshot.open_orders.len(),
            "state loaded"
        );
        *self.inner.write().expect("state lock poisoned") = snapshot;
        Ok(())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_order(id: &str) -> OpenOrder {
        OpenOrder {
            client_order_id: id.to_string(),
            order_id: format!("broker-{id}"),
            status: "accepted".to_string(),
        }
    }

    #[test]
    fn test_snapshots_are_isolated() {
        let store = StateStore::new();
        let mut orders = HashMap::new();
        orders.insert("a".to_string(), open_order("a"));
        store.set_open_orders(orders);

        let before = store.snapshot();
        store.set_open_orders(HashMap::new());

        // The earlier snapshot must not observe the replacement
        assert_eq!(before.open_orders.len(), 1);
        assert!(store.snapshot().open_orders.is_empty());
    }

    #[test]
    fn test_position_update() {
        let store = StateStore::new();
        store.update_position(Position {
            qty: 3,
            avg_entry: Decimal::from(101),
        });

        let snap = store.snapshot();
        assert_eq!(snap.position.qty, 3);
        assert_eq!(snap.position.avg_entry, Decimal::from(101));
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        let store = StateStore::new();
        store.update_position(Position {
            qty: 2,
            avg_entry: "100.5".parse().unwrap(),
        });
        let mut orders = HashMap::new();
        orders.insert("run-1".to_string(), open_order("run-1"));
        store.set_open_orders(orders);
        store.set_last_trade_time(Utc::now());
        store.set_last_bar_time(Utc::now());
        store.save(&path).await.unwrap();

        let restored = StateStore::new();
        restored.load(&path).await.unwrap();

        let a = store.snapshot();
        let b = restored.snapshot();
        assert_eq!(a.position, b.position);
        assert_eq!(a.open_orders, b.open_orders);
        assert_eq!(a.last_trade_time, b.last_trade_time);
        assert_eq!(a.last_bar_time, b.last_bar_time);
    }

    #[tokio::test]
    async fn test_load_defaults_missing_open_orders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        tokio::fs::write(&path, r#"{"position":{"qty":1,"avg_entry":"50"}}"#)
            .await
            .unwrap();

        let store = StateStore::new();
        store.load(&path).await.unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.position.qty, 1);
        assert!(snap.open_orders.is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_prior_state() {
        let store = StateStore::new();
        store.update_position(Position {
            qty: 5,
            avg_entry: Decimal::from(10),
        });

        let result = store.load("/nonexistent/checkpoint.json").await;
        assert!(result.is_err());
        assert_eq!(store.snapshot().position.qty, 5);
    }
}
