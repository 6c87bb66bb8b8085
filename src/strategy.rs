//! Strategy seam - the decision contract plus the rule-based variants

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Proposed direction for one bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Hold,
    Buy,
    Sell,
}

/// What the engine shares with a strategy: nothing beyond the bar, the SMA
/// and the current position size.
#[derive(Debug, Clone)]
pub struct MarketView {
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
    pub sma: Decimal,
    pub position_qty: i64,
}

/// A strategy's proposal before risk approval. Ephemeral - consumed
/// immediately by the risk gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeIntent {
    pub action: Action,
    pub qty: i64,
    pub reason: String,
}

impl TradeIntent {
    pub fn hold(reason: &str) -> Self {
        Self {
            action: Action::Hold,
            qty: 0,
            reason: reason.to_string(),
        }
    }
}

/// Pure decision function over a market view.
///
/// `&mut self` because several variants carry internal counters; the engine
/// owns its strategy and handles bars serially, so no locking is needed.
/// An LLM-backed agent would plug in at this same seam.
pub trait Strategy: Send {
    fn decide(&mut self, view: &MarketView) -> TradeIntent;
}

/// Buy when flat and the close crosses above the SMA, sell the whole
/// position when it drops back below.
pub struct SmaCross {
    pub max_qty: i64,
}

impl Strategy for SmaCross {
    fn decide(&mut self, view: &MarketView) -> TradeIntent {
        if view.position_qty == 0 && view.close > view.sma {
            return TradeIntent {
                action: Action::Buy,
                qty: self.max_qty.min(1),
                reason: "close_above_sma".to_string(),
            };
        }
        if view.position_qty > 0 && view.close < view.sma {
            return TradeIntent {
                action: Action::Sell,
                qty: view.position_qty,
                reason: "close_below_sma".to_string(),
            };
        }
        TradeIntent::hold("no_signal")
    }
}

/// Bollinger-style reversion: buy dips below the lower band, sell above the
/// upper band, stop out below the SMA.
pub struct MeanReversion {
    pub max_qty: i64,
    /// Band width around the SMA, e.g. 0.015 for 1.5%
    pub band_pct: Decimal,
}

impl MeanReversion {
    /// Multiplier applied to the SMA for the stop-loss exit, 0.995
    fn stop_pct() -> Decimal {
        Decimal::new(995, 3)
    }

    pub fn new(max_qty: i64) -> Self {
        Self {
            max_qty,
            band_pct: Decimal::new(15, 3),
        }
    }
}

impl Strategy for MeanReversion {
    fn decide(&mut self, view: &MarketView) -> TradeIntent {
        if view.sma == Decimal::ZERO {
            return TradeIntent::hold("insufficient_data");
        }

        let lower = view.sma * (Decimal::ONE - self.band_pct);
        let upper = view.sma * (Decimal::ONE + self.band_pct);

        if view.position_qty == 0 && view.close < lower {
            return TradeIntent {
                action: Action::Buy,
                qty: self.max_qty,
                reason: "price_below_lower_band".to_string(),
            };
        }
        if view.position_qty > 0 && view.close > upper {
            return TradeIntent {
                action: Action::Sell,
                qty: view.position_qty,
                reason: "price_above_upper_band".to_string(),
            };
        }

        // Reversion failed: exit if price sinks 0.5% below the mean
        let stop = view.sma * Self::stop_pct();
        if view.position_qty > 0 && view.close < stop {
            return TradeIntent {
                action: Action::Sell,
                qty: view.position_qty,
                reason: "stop_loss_below_sma".to_string(),
            };
        }

        TradeIntent::hold("within_bands")
    }
}

/// Cycles buy/hold/flip every bar. Stress-tests the order path; never use
/// outside dry runs.
pub struct RandomNoise {
    pub max_qty: i64,
    tick: u64,
}

impl RandomNoise {
    pub fn new(max_qty: i64) -> Self {
        Self { max_qty, tick: 0 }
    }
}

impl Strategy for RandomNoise {
    fn decide(&mut self, view: &MarketView) -> TradeIntent {
        self.tick += 1;
        match self.tick % 3 {
            0 => {
                if view.position_qty == 0 {
                    TradeIntent {
                        action: Action::Buy,
                        qty: self.max_qty,
                        reason: "random_buy".to_string(),
                    }
                } else {
                    TradeIntent {
                        action: Action::Sell,
                        qty: view.position_qty,
                        reason: "random_sell".to_string(),
                    }
                }
            }
            1 => TradeIntent::hold("random_hold"),
            _ => {
                if view.position_qty > 0 {
                    TradeIntent {
                        action: Action::Sell,
                        qty: view.position_qty,
                        reason: "random_flip_sell".to_string(),
                    }
                } else {
                    TradeIntent {
                        action: Action::Buy,
                        qty: self.max_qty,
                        reason: "random_flip_buy".to_string(),
                    }
                }
            }
        }
    }
}

/// Build a strategy from its config name
pub fn from_name(name: &str, max_qty: i64) -> anyhow::Result<Box<dyn Strategy>> {
    match name {
        "sma_cross" => Ok(Box::new(SmaCross { max_qty })),
        "mean_reversion" => Ok(Box::new(MeanReversion::new(max_qty))),
        "random_noise" => Ok(Box::new(RandomNoise::new(max_qty))),
        other => Err(anyhow::anyhow!("unknown strategy: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(close: i64, sma: i64, position_qty: i64) -> MarketView {
        MarketView {
            timestamp: Utc::now(),
            close: Decimal::from(close),
            sma: Decimal::from(sma),
            position_qty,
        }
    }

    #[test]
    fn test_sma_cross_buys_above_and_sells_below() {
        let mut strategy = SmaCross { max_qty: 5 };

        let buy = strategy.decide(&view(101, 100, 0));
        assert_eq!(buy.action, Action::Buy);
        assert_eq!(buy.qty, 1);
        assert_eq!(buy.reason, "close_above_sma");

        let sell = strategy.decide(&view(99, 100, 3));
        assert_eq!(sell.action, Action::Sell);
        assert_eq!(sell.qty, 3);

        let hold = strategy.decide(&view(101, 100, 3));
        assert_eq!(hold.action, Action::Hold);
    }

    #[test]
    fn test_mean_reversion_band_entries() {
        let mut strategy = MeanReversion::new(2);

        // 1.5% below a 100 SMA -> below the lower band
        let buy = strategy.decide(&view(98, 100, 0));
        assert_eq!(buy.action, Action::Buy);
        assert_eq!(buy.reason, "price_below_lower_band");

        let sell = strategy.decide(&view(102, 100, 2));
        assert_eq!(sell.action, Action::Sell);
        assert_eq!(sell.reason, "price_above_upper_band");

        // Inside the band but below the stop threshold
        let stop = strategy.decide(&view(99, 100, 2));
        assert_eq!(stop.action, Action::Sell);
        assert_eq!(stop.reason, "stop_loss_below_sma");

        let hold = strategy.decide(&view(100, 100, 2));
        assert_eq!(hold.action, Action::Hold);
        assert_eq!(hold.reason, "within_bands");
    }

    #[test]
    fn test_mean_reversion_waits_for_data() {
        let mut strategy = MeanReversion::new(2);
        let hold = strategy.decide(&view(100, 0, 0));
        assert_eq!(hold.action, Action::Hold);
        assert_eq!(hold.reason, "insufficient_data");
    }

    #[test]
    fn test_unknown_strategy_name() {
        assert!(from_name("martingale", 1).is_err());
        assert!(from_name("sma_cross", 1).is_ok());
    }
}
