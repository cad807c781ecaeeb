#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use meridian::domain::error::MeridianError;
pub use meridian::domain::ohlcv::{PriceBar, PriceTable};
use meridian::ports::data_port::DataPort;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct MockDataPort {
    pub tables: HashMap<PathBuf, PriceTable>,
    pub errors: HashMap<PathBuf, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_table(mut self, path: &str, table: PriceTable) -> Self {
        self.tables.insert(PathBuf::from(path), table);
        self
    }

    pub fn with_error(mut self, path: &str, reason: &str) -> Self {
        self.errors.insert(PathBuf::from(path), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_prices(&self, path: &Path) -> Result<PriceTable, MeridianError> {
        if let Some(reason) = self.errors.get(path) {
            return Err(MeridianError::Data {
                reason: reason.clone(),
            });
        }
        self.tables.get(path).cloned().ok_or_else(|| MeridianError::Data {
            reason: format!("no table at {}", path.display()),
        })
    }
}

pub fn day(offset: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(offset)
}

pub fn make_bar(offset: i64, close: f64) -> PriceBar {
    PriceBar {
        timestamp: day(offset),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 10_000.0,
    }
}

/// One bar per day starting 2024-01-01.
pub fn make_table(closes: &[f64]) -> PriceTable {
    PriceTable::new(
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(i as i64, c))
            .collect(),
    )
    .unwrap()
}

/// A drifting oscillation that produces several SMA crossovers.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.25).sin() * 8.0 + i as f64 * 0.05)
        .collect()
}

pub fn write_temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn prices_csv(closes: &[f64]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for (i, &c) in closes.iter().enumerate() {
        out.push_str(&format!(
            "{},{},{},{},{},1000\n",
            day(i as i64).format("%Y-%m-%d"),
            c,
            c * 1.01,
            c * 0.99,
            c
        ));
    }
    out
}
