//! CSV report adapter implementing ReportPort.
//!
//! Writes `equity.csv` (one row per bar) and `trades.csv` (one row per fill)
//! into the output directory, creating it if needed.

use std::fs;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::MeridianError;
use crate::ports::report_port::ReportPort;

pub const EQUITY_FILE: &str = "equity.csv";
pub const TRADES_FILE: &str = "trades.csv";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn csv_error(path: &Path, e: csv::Error) -> MeridianError {
    MeridianError::Data {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn write_equity(result: &BacktestResult, path: &Path) -> Result<(), MeridianError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    wtr.write_record(["timestamp", "equity"])
        .map_err(|e| csv_error(path, e))?;
    for point in &result.equity_curve {
        wtr.write_record([
            point.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.6}", point.equity),
        ])
        .map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_trades(result: &BacktestResult, path: &Path) -> Result<(), MeridianError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    wtr.write_record([
        "timestamp",
        "symbol",
        "side",
        "quantity",
        "price",
        "cost",
        "revenue",
        "realized_pnl",
    ])
    .map_err(|e| csv_error(path, e))?;
    for trade in &result.trades {
        wtr.write_record([
            trade.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            trade.symbol.clone(),
            trade.side.to_string(),
            format!("{}", trade.quantity),
            format!("{:.6}", trade.price),
            format!("{:.6}", trade.cost),
            format!("{:.6}", trade.revenue),
            trade
                .realized_pnl
                .map(|pnl| format!("{:.6}", pnl))
                .unwrap_or_default(),
        ])
        .map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), MeridianError> {
        fs::create_dir_all(output_dir)?;
        write_equity(result, &output_dir.join(EQUITY_FILE))?;
        write_trades(result, &output_dir.join(TRADES_FILE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::run_backtest;
    use crate::domain::ledger::Positions;
    use crate::domain::ohlcv::{PriceBar, PriceTable};
    use crate::domain::strategy::Action;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_result() -> BacktestResult {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = [10.0, 12.0, 11.0]
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        let table = PriceTable::new(bars).unwrap();
        let strategy = |_: &PriceBar, positions: &Positions, _: f64, history: &[PriceBar]| {
            match (history.len(), positions.is_empty()) {
                (1, true) => Action::Buy {
                    symbol: "X".into(),
                    quantity: 1.0,
                },
                (2, false) => Action::Sell {
                    symbol: "X".into(),
                    quantity: 1.0,
                },
                _ => Action::None,
            }
        };
        run_backtest(&strategy, &table, 100.0).unwrap()
    }

    #[test]
    fn writes_equity_and_trades() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("report");
        CsvReportAdapter::new().write(&sample_result(), &out).unwrap();

        let equity = fs::read_to_string(out.join(EQUITY_FILE)).unwrap();
        let lines: Vec<&str> = equity.lines().collect();
        assert_eq!(lines[0], "timestamp,equity");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "2024-01-01 00:00:00,100.000000");
        assert_eq!(lines[2], "2024-01-02 00:00:00,102.000000");

        let trades = fs::read_to_string(out.join(TRADES_FILE)).unwrap();
        let lines: Vec<&str> = trades.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp,symbol,side,quantity,price,cost,revenue,realized_pnl"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2024-01-01 00:00:00,X,buy,1,"));
        assert!(lines[1].ends_with(","));
        assert!(lines[2].ends_with(",2.000000"));
    }
}
