//! Tidebot Library
//!
//! Bar-driven trading pipeline: rolling market stats, a pluggable strategy,
//! a risk gate, order submission with an audit trail, and periodic
//! reconciliation against the broker.

pub mod alpaca;
pub mod broker;
pub mod config;
pub mod decision_log;
pub mod engine;
pub mod feed;
pub mod market;
pub mod reconciler;
pub mod risk;
pub mod state;
pub mod strategy;

// Re-export main types for convenience
pub use broker::{Broker, BrokerError, OrderRef, OrderRequest, OrderSide};
pub use config::{Config, RunMode};
pub use decision_log::{DecisionLog, DecisionRecord, DecisionResult};
pub use engine::DecisionEngine;
pub use market::{Bar, RollingStats, StatsError};
pub use risk::{ApprovedIntent, RejectReason, RiskContext, RiskGate};
pub use state::{OpenOrder, Position, Snapshot, StateStore};
pub use strategy::{Action, MarketView, Strategy, TradeIntent};
