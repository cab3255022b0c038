//! `date,price` CSV input.
//!
//! Each file holds one asset: a header row, then one observation per line with an
//! ISO `YYYY-MM-DD` date and a positive price. Rows may appear in any date order;
//! duplicate dates are rejected.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::core::{QuantError, Result};
use crate::market::series::PriceSeries;
use crate::market::universe::{AlignmentPolicy, AssetUniverse};

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    price: f64,
}

/// Parses a price series from any reader; `source` labels errors.
pub fn read_price_csv<R: Read>(reader: R, asset: &str, source: &str) -> Result<PriceSeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut observations = Vec::new();
    for (line, row) in rdr.deserialize::<PriceRow>().enumerate() {
        let row = row.map_err(|err| QuantError::Csv {
            path: source.to_string(),
            message: format!("record {}: {err}", line + 1),
        })?;
        observations.push((row.date, row.price));
    }
    debug!(asset, source, rows = observations.len(), "read price csv");
    PriceSeries::from_unordered(asset, observations)
}

/// Loads a `date,price` CSV file as the series named `asset`.
pub fn load_price_csv(path: impl AsRef<Path>, asset: &str) -> Result<PriceSeries> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let file = File::open(path).map_err(|err| QuantError::Io {
        path: label.clone(),
        message: err.to_string(),
    })?;
    read_price_csv(file, asset, &label)
}

/// Loads one CSV per `(asset, path)` pair and aligns them under `policy`.
pub fn load_universe_csv(
    files: &[(String, PathBuf)],
    policy: AlignmentPolicy,
) -> Result<AssetUniverse> {
    let series = files
        .iter()
        .map(|(asset, path)| load_price_csv(path, asset))
        .collect::<Result<Vec<_>>>()?;
    AssetUniverse::from_prices(series, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_unordered_rows_with_whitespace() {
        let data = "date,price\n2024-01-03, 102.5\n2024-01-01,100\n2024-01-02 ,101.0\n";
        let s = read_price_csv(data.as_bytes(), "SPY", "inline").unwrap();
        assert_eq!(s.name(), "SPY");
        assert_eq!(s.prices(), &[100.0, 101.0, 102.5]);
    }

    #[test]
    fn malformed_date_is_a_csv_error() {
        let data = "date,price\n01/02/2024,100\n";
        let err = read_price_csv(data.as_bytes(), "SPY", "inline").unwrap_err();
        assert!(matches!(err, QuantError::Csv { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_price_csv("/definitely/not/here.csv", "X").unwrap_err();
        assert!(matches!(err, QuantError::Io { .. }));
    }
}
