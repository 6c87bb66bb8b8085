//! Risk gate - stateless rule evaluation between strategy intent and order submission

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::strategy::{Action, TradeIntent};

/// Everything the gate needs to judge one intent. Built fresh per bar from
/// the state snapshot and live configuration; never persisted.
#[derive(Debug, Clone)]
pub struct RiskContext {
    pub now: DateTime<Utc>,
    pub price: Decimal,
    pub position_qty: i64,
    pub open_order_count: usize,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub max_qty: i64,
    pub max_notional: Decimal,
    pub cooldown: Duration,
    pub kill_switch: bool,
    pub extended_hours: bool,
    pub order_type: String,
    pub time_in_force: String,
}

/// An intent that passed the gate, with its approval reason
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedIntent {
    pub intent: TradeIntent,
    pub reason: String,
}

/// Named rejection outcomes. Each `Display` form is a stable tag that
/// downstream log analysis aggregates by; never reword these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("kill_switch_enabled")]
    KillSwitchEnabled,
    #[error("open_order_exists")]
    OpenOrderExists,
    #[error("cooldown_active")]
    CooldownActive,
    #[error("invalid_quantity")]
    InvalidQuantity,
    #[error("max_position_exceeded")]
    MaxPositionExceeded,
    #[error("no_position_to_sell")]
    NoPositionToSell,
    #[error("max_notional_exceeded")]
    MaxNotionalExceeded,
    #[error("extended_hours_requires_limit_day")]
    ExtendedHoursRequiresLimitDay,
}

/// Stateless rule evaluator. First failing rule wins, in a fixed order;
/// a Hold intent is approved unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskGate;

impl RiskGate {
    pub fn evaluate(
        &self,
        intent: &TradeIntent,
        ctx: &RiskContext,
    ) -> Result<ApprovedIntent, RejectReason> {
        if intent.action == Action::Hold {
            return Ok(ApprovedIntent {
                intent: intent.clone(),
                reason: "hold".to_string(),
            });
        }

        let notional = ctx.price * Decimal::from(intent.qty);
        info!(
            intent = ?intent.action,
            qty = intent.qty,
            position = ctx.position_qty,
            price = %ctx.price,
            notional = %notional,
            "risk evaluation"
        );

        if ctx.kill_switch {
            info!(reason = "kill_switch_enabled", "risk rejected");
            return Err(RejectReason::KillSwitchEnabled);
        }
        if ctx.open_order_count > 0 {
            info!(
                reason = "open_order_exists",
                count = ctx.open_order_count,
                "risk rejected"
            );
            return Err(RejectReason::OpenOrderExists);
        }
        if let Some(last) = ctx.last_trade_time {
            let elapsed = (ctx.now - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < ctx.cooldown {
                info!(
                    reason = "cooldown_active",
                    remaining_secs = (ctx.cooldown - elapsed).as_secs(),
                    "risk rejected"
                );
                return Err(RejectReason::CooldownActive);
            }
        }
        if intent.qty <= 0 {
            info!(reason = "invalid_quantity", qty = intent.qty, "risk rejected");
            return Err(RejectReason::InvalidQuantity);
        }
        if intent.action == Action::Buy && intent.qty + ctx.position_qty > ctx.max_qty {
            info!(
                reason = "max_position_exceeded",
                new_qty = intent.qty + ctx.position_qty,
                max = ctx.max_qty,
                "risk rejected"
            );
            return Err(RejectReason::MaxPositionExceeded);
        }
        if intent.action == Action::Sell && ctx.position_qty <= 0 {
            info!(reason = "no_position_to_sell", "risk rejected");
            return Err(RejectReason::NoPositionToSell);
        }
        if notional > ctx.max_notional {
            info!(
                reason = "max_notional_exceeded",
                notional = %notional,
                max = %ctx.max_notional,
                "risk rejected"
            );
            return Err(RejectReason::MaxNotionalExceeded);
        }
        if ctx.extended_hours && (ctx.order_type != "limit" || ctx.time_in_force != "day") {
            info!(
                reason = "extended_hours_requires_limit_day",
                "risk rejected"
            );
            return Err(RejectReason::ExtendedHoursRequiresLimitDay);
        }

        info!(intent = ?intent.action, qty = intent.qty, reason = %intent.reason, "risk approved");
        Ok(ApprovedIntent {
            intent: intent.clone(),
            reason: "approved".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy(qty: i64) -> TradeIntent {
        TradeIntent {
            action: Action::Buy,
            qty,
            reason: "test".to_string(),
        }
    }

    fn sell(qty: i64) -> TradeIntent {
        TradeIntent {
            action: Action::Sell,
            qty,
            reason: "test".to_string(),
        }
    }

    fn ctx() -> RiskContext {
        RiskContext {
            now: Utc::now(),
            price: Decimal::from(100),
            position_qty: 0,
            open_order_count: 0,
            last_trade_time: None,
            max_qty: 5,
            max_notional: Decimal::from(1000),
            cooldown: Duration::from_secs(60),
            kill_switch: false,
            extended_hours: false,
            order_type: "market".to_string(),
            time_in_force: "day".to_string(),
        }
    }

    #[test]
    fn test_approves_valid_buy() {
        let approved = RiskGate.evaluate(&buy(1), &ctx()).unwrap();
        assert_eq!(approved.reason, "approved");
        assert_eq!(approved.intent.qty, 1);
    }

    #[test]
    fn test_hold_bypasses_all_rules() {
        let mut context = ctx();
        context.kill_switch = true;
        context.open_order_count = 3;

        let approved = RiskGate
            .evaluate(&TradeIntent::hold("no_signal"), &context)
            .unwrap();
        assert_eq!(approved.reason, "hold");
    }

    #[test]
    fn test_kill_switch_takes_precedence() {
        let mut context = ctx();
        context.kill_switch = true;
        context.open_order_count = 1;
        context.last_trade_time = Some(context.now);

        assert_eq!(
            RiskGate.evaluate(&buy(1), &context),
            Err(RejectReason::KillSwitchEnabled)
        );
    }

    #[test]
    fn test_rejects_open_order() {
        let mut context = ctx();
        context.open_order_count = 1;
        assert_eq!(
            RiskGate.evaluate(&buy(1), &context),
            Err(RejectReason::OpenOrderExists)
        );
    }

    #[test]
    fn test_rejects_cooldown() {
        let mut context = ctx();
        context.last_trade_time = Some(context.now - chrono::Duration::seconds(30));
        assert_eq!(
            RiskGate.evaluate(&buy(1), &context),
            Err(RejectReason::CooldownActive)
        );
    }

    #[test]
    fn test_cooldown_expired_allows_trade() {
        let mut context = ctx();
        context.last_trade_time = Some(context.now - chrono::Duration::seconds(90));
        assert!(RiskGate.evaluate(&buy(1), &context).is_ok());
    }

    #[test]
    fn test_rejects_invalid_quantity() {
        assert_eq!(
            RiskGate.evaluate(&buy(0), &ctx()),
            Err(RejectReason::InvalidQuantity)
        );
    }

    #[test]
    fn test_rejects_max_position() {
        let mut context = ctx();
        context.position_qty = 5;
        assert_eq!(
            RiskGate.evaluate(&buy(1), &context),
            Err(RejectReason::MaxPositionExceeded)
        );
    }

    #[test]
    fn test_rejects_sell_without_position() {
        assert_eq!(
            RiskGate.evaluate(&sell(1), &ctx()),
            Err(RejectReason::NoPositionToSell)
        );
    }

    #[test]
    fn test_rejects_max_notional() {
        let mut context = ctx();
        context.max_notional = Decimal::from(150);
        // 2 * 100 = 200 > 150
        assert_eq!(
            RiskGate.evaluate(&buy(2), &context),
            Err(RejectReason::MaxNotionalExceeded)
        );
    }

    #[test]
    fn test_rejects_extended_hours_without_limit_day() {
        let mut context = ctx();
        context.extended_hours = true;
        context.order_type = "market".to_string();
        assert_eq!(
            RiskGate.evaluate(&buy(1), &context),
            Err(RejectReason::ExtendedHoursRequiresLimitDay)
        );

        context.order_type = "limit".to_string();
        assert!(RiskGate.evaluate(&buy(1), &context).is_ok());
    }

    #[test]
    fn test_deterministic_rule_order() {
        // Quantity check fires before position and notional checks
        let mut context = ctx();
        context.position_qty = 5;
        context.max_notional = Decimal::ZERO;
        assert_eq!(
            RiskGate.evaluate(&buy(0), &context),
            Err(RejectReason::InvalidQuantity)
        );

        // Same inputs, same outcome
        assert_eq!(
            RiskGate.evaluate(&buy(0), &context),
            RiskGate.evaluate(&buy(0), &context)
        );
    }
}
