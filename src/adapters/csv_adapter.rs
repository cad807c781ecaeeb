//! CSV file data adapter.
//!
//! Expects a header row naming `timestamp` (or `date`), `open`, `high`,
//! `low`, `close` and `volume`, in any order and case.

use crate::domain::error::MeridianError;
use crate::domain::ohlcv::{PriceBar, PriceTable};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::io::Read;
use std::path::Path;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Parse CSV text from any reader into a validated price table.
    pub fn parse_prices<R: Read>(&self, reader: R) -> Result<PriceTable, MeridianError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().map_err(|e| MeridianError::Data {
            reason: format!("CSV header error: {}", e),
        })?;
        let columns = Columns::locate(headers)?;

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| MeridianError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            bars.push(columns.bar(&record, row + 1)?);
        }

        PriceTable::new(bars)
    }
}

impl DataPort for CsvAdapter {
    fn load_prices(&self, path: &Path) -> Result<PriceTable, MeridianError> {
        let content = fs::read_to_string(path).map_err(|e| MeridianError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        self.parse_prices(content.as_bytes())
    }
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, MeridianError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
                .ok_or_else(|| MeridianError::Data {
                    reason: format!("missing {} column", names[0]),
                })
        };
        Ok(Columns {
            timestamp: find(&["timestamp", "date"])?,
            open: find(&["open"])?,
            high: find(&["high"])?,
            low: find(&["low"])?,
            close: find(&["close"])?,
            volume: find(&["volume"])?,
        })
    }

    fn bar(&self, record: &csv::StringRecord, row: usize) -> Result<PriceBar, MeridianError> {
        let raw = record.get(self.timestamp).ok_or_else(|| MeridianError::Data {
            reason: format!("row {}: missing timestamp", row),
        })?;
        Ok(PriceBar {
            timestamp: parse_timestamp(raw).ok_or_else(|| MeridianError::Data {
                reason: format!(
                    "row {}: invalid timestamp {:?}, expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS",
                    row, raw
                ),
            })?,
            open: number(record, self.open, "open", row)?,
            high: number(record, self.high, "high", row)?,
            low: number(record, self.low, "low", row)?,
            close: number(record, self.close, "close", row)?,
            volume: number(record, self.volume, "volume", row)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()?
                .and_hms_opt(0, 0, 0)
        })
}

fn number(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    row: usize,
) -> Result<f64, MeridianError> {
    let raw = record.get(index).ok_or_else(|| MeridianError::Data {
        reason: format!("row {}: missing {} value", row, name),
    })?;
    let value: f64 = raw.parse().map_err(|e| MeridianError::Data {
        reason: format!("row {}: invalid {} value {:?}: {}", row, name, raw, e),
    })?;
    if !value.is_finite() {
        return Err(MeridianError::Data {
            reason: format!("row {}: {} must be finite", row, name),
        });
    }
    Ok(value)
}
