//! Market data types and rolling close-price statistics

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One close-price sample from the market data feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    /// Bar close time
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
}

/// Errors from rolling statistics queries
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("window must be positive and no larger than capacity")]
    InvalidWindow,
    #[error("not enough data for SMA")]
    InsufficientData,
}

/// Fixed-capacity circular buffer of recent close prices.
///
/// Oldest entries are overwritten once capacity is reached; the buffer never
/// reallocates after construction. Not independently thread-safe - the engine
/// handles bars serially and owns its buffer.
pub struct RollingStats {
    values: Vec<Decimal>,
    capacity: usize,
    index: usize,
    filled: bool,
}

impl RollingStats {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![Decimal::ZERO; capacity],
            capacity,
            index: 0,
            filled: false,
        }
    }

    /// Record one close price, overwriting the oldest entry when full
    pub fn add(&mut self, price: Decimal) {
        self.values[self.index] = price;
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        if self.filled {
            self.capacity
        } else {
            self.index
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples in chronological order, oldest first
    pub fn values(&self) -> Vec<Decimal> {
        let mut out = Vec::with_capacity(self.len());
        if self.filled {
            out.extend_from_slice(&self.values[self.index..]);
        }
        out.extend_from_slice(&self.values[..self.index]);
        out
    }

    /// Arithmetic mean of the most recent `window` samples.
    ///
    /// Insufficient history is an explicit error, never a partial average;
    /// the caller decides the fallback policy.
    pub fn sma(&self, window: usize) -> Result<Decimal, StatsError> {
        if window == 0 || window > self.capacity {
            return Err(StatsError::InvalidWindow);
        }
        let values = self.values();
        if values.len() < window {
            return Err(StatsError::InsufficientData);
        }
        let start = values.len() - window;
        let sum: Decimal = values[start..].iter().copied().sum();
        Ok(sum / Decimal::from(window as u64))
    }
}
