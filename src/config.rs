//! Bot configuration - optional JSON file layered with environment overrides

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the bot runs: `stream` replays/simulates bars and never touches the
/// broker; `paper` submits real orders to the paper trading API.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Stream,
    Paper,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub symbol: String,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Capacity of the rolling close-price buffer
    #[serde(default = "default_bars_window")]
    pub bars_window: usize,
    #[serde(default = "default_sma_window")]
    pub sma_window: usize,
    #[serde(default = "default_max_qty")]
    pub max_qty: i64,
    #[serde(default = "default_max_notional")]
    pub max_notional: Decimal,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    /// When on, no non-hold intent is ever approved
    #[serde(default)]
    pub kill_switch: bool,
    #[serde(default)]
    pub extended_hours: bool,
    #[serde(default = "default_order_type")]
    pub order_type: String,
    #[serde(default = "default_time_in_force")]
    pub time_in_force: String,
    #[serde(default = "default_decisions_path")]
    pub decisions_path: String,
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,
    #[serde(default = "default_broker_base_url")]
    pub broker_base_url: String,
    /// Credentials come from APCA_API_KEY_ID / APCA_API_SECRET_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Cadence of the simulated feed
    #[serde(default = "default_feed_interval_ms")]
    pub feed_interval_ms: u64,
}

fn default_strategy() -> String {
    "sma_cross".to_string()
}
fn default_bars_window() -> usize {
    50
}
fn default_sma_window() -> usize {
    20
}
fn default_max_qty() -> i64 {
    1
}
fn default_max_notional() -> Decimal {
    Decimal::from(200)
}
fn default_cooldown_secs() -> u64 {
    120
}
fn default_reconcile_interval_secs() -> u64 {
    10
}
fn default_order_type() -> String {
    "market".to_string()
}
fn default_time_in_force() -> String {
    "day".to_string()
}
fn default_decisions_path() -> String {
    "decisions.ndjson".to_string()
}
fn default_checkpoint_path() -> String {
    "checkpoint.json".to_string()
}
fn default_broker_base_url() -> String {
    "https://paper-api.alpaca.markets".to_string()
}
fn default_feed_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults deserialize")
    }
}

impl Config {
    /// Load from an optional JSON file plus `TIDEBOT_`-prefixed environment
    /// variables; broker credentials come from the conventional `APCA_` vars.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        match path {
            Some(p) => builder = builder.add_source(config::File::with_name(p)),
            None => {
                builder = builder.add_source(config::File::with_name("config").required(false))
            }
        }
        builder = builder.add_source(
            config::Environment::with_prefix("TIDEBOT").try_parsing(true),
        );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        if let Ok(key) = std::env::var("APCA_API_KEY_ID") {
            if !key.is_empty() {
                cfg.api_key = key;
            }
        }
        if let Ok(secret) = std::env::var("APCA_API_SECRET_KEY") {
            if !secret.is_empty() {
                cfg.api_secret = secret;
            }
        }

        if cfg.symbol.is_empty() {
            cfg.symbol = match cfg.mode {
                RunMode::Stream => "FAKEPACA".to_string(),
                RunMode::Paper => "AAPL".to_string(),
            };
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sma_window <= 1 {
            anyhow::bail!("sma_window must be > 1");
        }
        if self.bars_window < self.sma_window {
            anyhow::bail!("bars_window must be >= sma_window");
        }
        if self.max_qty <= 0 {
            anyhow::bail!("max_qty must be > 0");
        }
        if self.max_notional <= Decimal::ZERO {
            anyhow::bail!("max_notional must be > 0");
        }
        if self.reconcile_interval_secs == 0 {
            anyhow::bail!("reconcile_interval_secs must be > 0");
        }
        if self.mode == RunMode::Paper && (self.api_key.is_empty() || self.api_secret.is_empty()) {
            anyhow::bail!("APCA_API_KEY_ID and APCA_API_SECRET_KEY are required in paper mode");
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_millis(self.feed_interval_ms)
    }
}
