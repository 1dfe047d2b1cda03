//! CSV historical candle source.
//!
//! One file per symbol and interval, named `{symbol}_{interval}.csv`, with a
//! header row and columns `timestamp,open,high,low,close,volume`. Timestamps
//! are epoch seconds. Rows are returned in file order; a row with a
//! non-finite or non-positive price, or a high/low that does not bracket
//! the open and close, fails the whole load.

use crate::domain::candle::Candle;
use crate::domain::error::ConfluenceError;
use crate::ports::candle_source::CandleSource;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvCandleSource {
    base_path: PathBuf,
}

impl CsvCandleSource {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }
}

fn field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<T, ConfluenceError>
where
    T::Err: std::fmt::Display,
{
    record
        .get(index)
        .ok_or_else(|| ConfluenceError::DataSource {
            reason: format!("line {}: missing {} column", line, name),
        })?
        .trim()
        .parse()
        .map_err(|e| ConfluenceError::DataSource {
            reason: format!("line {}: invalid {} value: {}", line, name, e),
        })
}

impl CandleSource for CsvCandleSource {
    fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, ConfluenceError> {
        let path = self.csv_path(symbol, interval);
        let content = fs::read_to_string(&path).map_err(|e| ConfluenceError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for (row, result) in rdr.records().enumerate() {
            let line = row + 2;
            let record = result.map_err(|e| ConfluenceError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let secs: i64 = field(&record, 0, "timestamp", line)?;
            let candle = Candle::from_epoch_seconds(
                secs,
                field(&record, 1, "open", line)?,
                field(&record, 2, "high", line)?,
                field(&record, 3, "low", line)?,
                field(&record, 4, "close", line)?,
                field(&record, 5, "volume", line)?,
            )
            .ok_or_else(|| ConfluenceError::DataSource {
                reason: format!("line {}: timestamp {} out of range", line, secs),
            })?;
            if !candle.is_well_formed() {
                return Err(ConfluenceError::DataSource {
                    reason: format!(
                        "line {}: malformed candle (open {}, high {}, low {}, close {}, volume {})",
                        line, candle.open, candle.high, candle.low, candle.close, candle.volume
                    ),
                });
            }

            if start.is_some_and(|s| candle.timestamp < s) || end.is_some_and(|e| candle.timestamp > e) {
                continue;
            }
            candles.push(candle);
        }

        Ok(candles)
    }

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, ConfluenceError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ConfluenceError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", interval);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| ConfluenceError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
