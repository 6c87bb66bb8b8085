//! Decision engine - drives one bar from ingestion to order submission

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::broker::{Broker, OrderRequest, OrderSide, OrderType, TimeInForce};
use crate::config::{Config, RunMode};
use crate::decision_log::{DecisionLog, DecisionRecord, DecisionResult};
use crate::market::{Bar, RollingStats};
use crate::risk::{RiskContext, RiskGate};
use crate::state::{OpenOrder, StateStore};
use crate::strategy::{Action, MarketView, Strategy, TradeIntent};

/// Order construction failures - configuration problems, never retried
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderBuildError {
    #[error("unsupported order type: {0}")]
    UnsupportedOrderType(String),
    #[error("unsupported time in force: {0}")]
    UnsupportedTimeInForce(String),
}

/// Strictly increasing client order IDs, scoped to one run.
///
/// Atomic increment: two submissions can never collide or repeat even under
/// concurrent invocation.
pub struct OrderIdSequence {
    run_id: String,
    seq: AtomicU64,
}

impl OrderIdSequence {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.run_id, seq)
    }
}

/// Orchestrates the per-bar pipeline: rolling stats, strategy, risk gate,
/// order submission, state update, audit record. Bars are handled serially;
/// the engine owns its buffer and strategy.
pub struct DecisionEngine {
    cfg: Config,
    strategy: Box<dyn Strategy>,
    gate: RiskGate,
    broker: Arc<dyn Broker>,
    state: Arc<StateStore>,
    decisions: Arc<DecisionLog>,
    stats: RollingStats,
    order_ids: OrderIdSequence,
}

impl DecisionEngine {
    pub fn new(
        cfg: Config,
        strategy: Box<dyn Strategy>,
        broker: Arc<dyn Broker>,
        state: Arc<StateStore>,
        decisions: Arc<DecisionLog>,
    ) -> Self {
        let stats = RollingStats::new(cfg.bars_window);
        let order_ids = OrderIdSequence::new(decisions.run_id());
        Self {
            cfg,
            strategy,
            gate: RiskGate,
            broker,
            state,
            decisions,
            stats,
            order_ids,
        }
    }

    /// Handle one bar end to end. Always emits exactly one decision record.
    pub async fn on_bar(&mut self, bar: &Bar) {
        debug!(symbol = %bar.symbol, close = %bar.close, time = %bar.timestamp, "bar received");
        self.stats.add(bar.close);
        self.state.set_last_bar_time(bar.timestamp);

        // Warm-up fallback: until the window fills, the raw close stands in
        // for the SMA. Degraded mode, not a failure.
        let sma = match self.stats.sma(self.cfg.sma_window) {
            Ok(sma) => sma,
            Err(_) => {
                debug!(close = %bar.close, "insufficient history, using close as SMA");
                bar.close
            }
        };

        let snapshot = self.state.snapshot();
        let intent = self.strategy.decide(&MarketView {
            timestamp: bar.timestamp,
            close: bar.close,
            sma,
            position_qty: snapshot.position.qty,
        });

        let risk_ctx = RiskContext {
            now: Utc::now(),
            price: bar.close,
            position_qty: snapshot.position.qty,
            open_order_count: snapshot.open_orders.len(),
            last_trade_time: snapshot.last_trade_time,
            max_qty: self.cfg.max_qty,
            max_notional: self.cfg.max_notional,
            cooldown: self.cfg.cooldown(),
            kill_switch: self.cfg.kill_switch,
            extended_hours: self.cfg.extended_hours,
            order_type: self.cfg.order_type.clone(),
            time_in_force: self.cfg.time_in_force.clone(),
        };

        let mut record = DecisionRecord {
            run_id: self.decisions.run_id().to_string(),
            timestamp: Utc::now(),
            bar_time: bar.timestamp,
            symbol: bar.symbol.clone(),
            close: bar.close,
            sma,
            intent: intent.action,
            intent_qty: intent.qty,
            reason: intent.reason.clone(),
            result: DecisionResult::Hold,
            approval_reason: None,
            reject_reason: None,
            order_id: None,
            client_order_id: None,
        };

        let approved = match self.gate.evaluate(&intent, &risk_ctx) {
            Ok(approved) => approved,
            Err(reject) => {
                record.result = DecisionResult::Rejected;
                record.reject_reason = Some(reject.to_string());
                self.decisions.append(&record);
                info!(close = %bar.close, sma = %sma, intent = ?intent.action, reject = %reject, "bar rejected");
                return;
            }
        };

        if intent.action == Action::Hold {
            record.result = DecisionResult::Hold;
            record.approval_reason = Some(approved.reason);
            self.decisions.append(&record);
            info!(close = %bar.close, sma = %sma, "bar hold");
            return;
        }

        if self.cfg.mode == RunMode::Stream {
            record.result = DecisionResult::DryRun;
            record.approval_reason = Some(approved.reason);
            self.decisions.append(&record);
            info!(close = %bar.close, sma = %sma, intent = ?intent.action, "dry run");
            return;
        }

        let order = match self.build_order(&bar.symbol, bar.close, &approved.intent) {
            Ok(order) => order,
            Err(e) => {
                record.result = DecisionResult::OrderBuildFailed;
                record.reject_reason = Some(e.to_string());
                self.decisions.append(&record);
                warn!(intent = ?intent.action, error = %e, "order build failed");
                return;
            }
        };

        let order_ref = match self.broker.place_order(&order).await {
            Ok(order_ref) => order_ref,
            Err(e) => {
                record.result = DecisionResult::OrderFailed;
                record.reject_reason = Some(e.to_string());
                self.decisions.append(&record);
                warn!(intent = ?intent.action, error = %e, "order submission failed");
                return;
            }
        };

        record.result = DecisionResult::OrderSubmitted;
        record.order_id = Some(order_ref.id.clone());
        record.client_order_id = Some(order_ref.client_order_id.clone());
        record.approval_reason = Some(approved.reason);
        self.decisions.append(&record);
        info!(
            symbol = %bar.symbol,
            side = ?intent.action,
            qty = intent.qty,
            order_id = %order_ref.id,
            client_order_id = %order_ref.client_order_id,
            "order submitted"
        );

        self.state.set_last_trade_time(Utc::now());
        // Merge against the latest snapshot, not the one taken before the
        // strategy ran, so a reconciliation pass that landed in between is
        // not clobbered.
        let mut open_orders = self.state.snapshot().open_orders;
        open_orders.insert(
            order_ref.client_order_id.clone(),
            OpenOrder {
                client_order_id: order_ref.client_order_id,
                order_id: order_ref.id,
                status: order_ref.status,
            },
        );
        self.state.set_open_orders(open_orders);
    }

    fn build_order(
        &self,
        symbol: &str,
        price: Decimal,
        intent: &TradeIntent,
    ) -> Result<OrderRequest, OrderBuildError> {
        let order_type = parse_order_type(&self.cfg.order_type)?;
        let time_in_force = parse_time_in_force(&self.cfg.time_in_force)?;
        let side = if intent.action == Action::Sell {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };

        Ok(OrderRequest {
            symbol: symbol.to_string(),
            qty: intent.qty,
            side,
            order_type,
            time_in_force,
            client_order_id: self.order_ids.next(),
            extended_hours: self.cfg.extended_hours,
            limit_price: (order_type == OrderType::Limit).then_some(price),
        })
    }
}

fn parse_order_type(value: &str) -> Result<OrderType, OrderBuildError> {
    match value {
        "market" => Ok(OrderType::Market),
        "limit" => Ok(OrderType::Limit),
        other => Err(OrderBuildError::UnsupportedOrderType(other.to_string())),
    }
}

fn parse_time_in_force(value: &str) -> Result<TimeInForce, OrderBuildError> {
    match value {
        "day" => Ok(TimeInForce::Day),
        other => Err(OrderBuildError::UnsupportedTimeInForce(other.to_string())),
    }
}
