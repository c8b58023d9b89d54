//! Append-only CSV trade log.
//!
//! Mirrors the in-memory trade record audit trail to disk, one row per
//! fill. Rows are flattened by hand: the resulting-position snapshot is
//! reduced to its side and remaining quantity.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::domain::trading::types::TradeRecord;

pub struct TradeLogWriter {
    path: PathBuf,
}

impl TradeLogWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn append(&self, record: &TradeRecord) -> Result<()> {
        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open trade log {}", self.path.display()))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if write_header {
            writer.write_record([
                "fill_id",
                "timestamp",
                "direction",
                "quantity",
                "price",
                "realized_pnl_delta",
                "position_side",
                "position_quantity",
            ])?;
        }

        let row = [
            record.fill_id.clone(),
            record.timestamp.to_rfc3339(),
            record.direction.to_string(),
            record.quantity.to_string(),
            record.price.to_string(),
            record.realized_pnl_delta.to_string(),
            record.resulting_position.side.to_string(),
            record.resulting_position.quantity.to_string(),
        ];
        writer.write_record(&row)?;
        writer.flush().context("failed to flush trade log")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::position::Position;
    use crate::domain::trading::types::OrderSide;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn record(fill_id: &str) -> TradeRecord {
        TradeRecord {
            fill_id: fill_id.to_string(),
            direction: OrderSide::Buy,
            quantity: 10,
            price: dec!(100),
            timestamp: Utc::now(),
            resulting_position: Position::flat("NSE_INDEX|Nifty Bank"),
            realized_pnl_delta: dec!(-50),
        }
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = std::env::temp_dir().join(format!("tradesentry-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("trades.csv");
        let _ = std::fs::remove_file(&path);

        let writer = TradeLogWriter::new(&path);
        writer.append(&record("f1")).unwrap();
        writer.append(&record("f2")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("fill_id,"));
        assert!(lines[1].contains("f1"));
        assert!(lines[2].contains("f2"));

        let _ = std::fs::remove_file(&path);
    }
}
