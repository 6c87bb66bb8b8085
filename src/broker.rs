//! Broker seam - the contract any order-routing backend must expose

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Side of an order, derived from the approved intent's action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A fully specified order ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub qty: i64,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub client_order_id: String,
    pub extended_hours: bool,
    /// Attached only for limit orders
    pub limit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
}

/// The broker's handle for a submitted or live order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRef {
    pub id: String,
    pub client_order_id: String,
    pub status: String,
}

/// Authoritative position as reported by the broker
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerPosition {
    pub symbol: String,
    pub qty: i64,
    pub avg_entry: Decimal,
}

/// Account figures fetched for observability only
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub equity: Decimal,
    pub buying_power: Decimal,
}

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker tracks no position for the symbol - a flat book, not a fault
    #[error("no position for symbol")]
    PositionNotFound,
    #[error("broker api error: {status} {message}")]
    Api { status: u16, message: String },
    #[error("broker transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("broker response parse error: {0}")]
    Parse(String),
}

/// Order routing and account queries. In-flight calls are cancelled by
/// dropping the future, so shutdown can race any of these with a select.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn place_order(&self, req: &OrderRequest) -> Result<OrderRef, BrokerError>;

    async fn open_orders(&self) -> Result<Vec<OrderRef>, BrokerError>;

    /// Current position for `symbol`. A flat book yields
    /// `BrokerError::PositionNotFound`, which callers treat as qty 0.
    async fn position(&self, symbol: &str) -> Result<BrokerPosition, BrokerError>;

    async fn account(&self) -> Result<Account, BrokerError>;
}
