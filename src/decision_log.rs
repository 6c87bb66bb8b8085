//! Append-only decision audit trail, one NDJSON record per bar

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::strategy::Action;

/// Terminal outcome of one bar's pass through the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionResult {
    Rejected,
    Hold,
    DryRun,
    OrderBuildFailed,
    OrderFailed,
    OrderSubmitted,
}

/// One audit line. Immutable once appended; append order is the logical
/// order of decisions within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub bar_time: DateTime<Utc>,
    pub symbol: String,
    pub close: Decimal,
    pub sma: Decimal,
    pub intent: Action,
    pub intent_qty: i64,
    pub reason: String,
    pub result: DecisionResult,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approval_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reject_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_order_id: Option<String>,
}

/// Durable decision log. Every append writes one self-delimited line and
/// flushes before returning. Losing a single audit line must never block
/// trading, so write failures are logged and swallowed.
pub struct DecisionLog {
    run_id: String,
    writer: Mutex<BufWriter<File>>,
}

impl DecisionLog {
    pub fn open(path: impl AsRef<Path>, run_id: &str) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            run_id: run_id.to_string(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn append(&self, record: &DecisionRecord) {
        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "failed to serialize decision");
                return;
            }
        };

        let mut writer = self.writer.lock().expect("decision log lock poisoned");
        if let Err(e) = writer
            .write_all(&payload)
            .and_then(|_| writer.write_all(b"\n"))
        {
            error!(error = %e, "failed to write decision");
            return;
        }
        if let Err(e) = writer.flush() {
            error!(error = %e, "failed to flush decision log");
        }
    }

    /// Final flush at shutdown. The file handle is released on drop.
    pub fn close(&self) -> anyhow::Result<()> {
        self.writer
            .lock()
            .expect("decision log lock poisoned")
            .flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(run_id: &str, result: DecisionResult) -> DecisionRecord {
        DecisionRecord {
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            bar_time: Utc::now(),
            symbol: "AAPL".to_string(),
            close: Decimal::from(101),
            sma: Decimal::from(100),
            intent: Action::Buy,
            intent_qty: 1,
            reason: "close_above_sma".to_string(),
            result,
            approval_reason: None,
            reject_reason: None,
            order_id: None,
            client_order_id: None,
        }
    }

    #[test]
    fn test_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.ndjson");

        let log = DecisionLog::open(&path, "run-1").unwrap();
        log.append(&record("run-1", DecisionResult::Hold));
        log.append(&record("run-1", DecisionResult::OrderSubmitted));
        log.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: DecisionRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.result, DecisionResult::Hold);
        let second: DecisionRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.result, DecisionResult::OrderSubmitted);
    }

    #[test]
    fn test_result_tags_are_snake_case() {
        let json = serde_json::to_string(&DecisionResult::OrderBuildFailed).unwrap();
        assert_eq!(json, r#""order_build_failed""#);
        let json = serde_json::to_string(&DecisionResult::DryRun).unwrap();
        assert_eq!(json, r#""dry_run""#);
    }

    #[test]
    fn test_optional_fields_omitted_when_none() {
        let line = serde_json::to_string(&record("run-1", DecisionResult::Hold)).unwrap();
        assert!(!line.contains("order_id"));
        assert!(!line.contains("reject_reason"));
    }

    #[test]
    fn test_append_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.ndjson");

        {
            let log = DecisionLog::open(&path, "run-1").unwrap();
            log.append(&record("run-1", DecisionResult::Hold));
            log.close().unwrap();
        }
        {
            let log = DecisionLog::open(&path, "run-2").unwrap();
            log.append(&record("run-2", DecisionResult::Hold));
            log.close().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
