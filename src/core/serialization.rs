//! JSON and CSV output for analytics records.
//!
//! Every public result type (`PriceResult`, `RiskReport`, `PortfolioWeights`,
//! `FrontierPoint`, `StressResult`) derives `serde::Serialize`, so JSON goes through
//! [`to_json_pretty`]. Frontier sweeps and weight vectors also have flat CSV
//! writers with one column per asset.
//!
//! # Examples
//! ```rust
//! use sierra::core::{from_json, to_json_pretty, AnalyticsConfig};
//!
//! let cfg = AnalyticsConfig::default().with_confidence(0.99);
//! let json = to_json_pretty(&cfg).expect("json serialization");
//! let decoded: AnalyticsConfig = from_json(&json).expect("json deserialization");
//! assert_eq!(decoded, cfg);
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::error::{QuantError, Result};
use crate::portfolio::{FrontierPoint, PortfolioWeights};

/// Serializes a value to pretty-printed JSON.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|err| QuantError::Io {
        path: "<json>".to_string(),
        message: err.to_string(),
    })
}

/// Deserializes a value from JSON text.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|err| QuantError::invalid("json", err.to_string()))
}

fn csv_error(label: &str, err: csv::Error) -> QuantError {
    QuantError::Csv {
        path: label.to_string(),
        message: err.to_string(),
    }
}

/// Writes frontier points as CSV: the point statistics followed by one weight column
/// per asset, in the order of the first point's weights.
pub fn write_frontier_csv<W: Write>(writer: W, points: &[FrontierPoint]) -> Result<()> {
    let label = "<frontier>";
    let mut out = csv::Writer::from_writer(writer);
    let assets: Vec<&str> = points
        .first()
        .map(|p| p.weights.names().iter().map(String::as_str).collect())
        .unwrap_or_default();

    let mut header = vec![
        "target_return",
        "expected_return",
        "risk",
        "sharpe",
        "value_at_risk",
    ];
    header.extend(assets.iter().copied());
    out.write_record(&header)
        .map_err(|err| csv_error(label, err))?;

    for point in points {
        if point.weights.names().len() != assets.len() {
            return Err(QuantError::invalid(
                "points",
                "all frontier points must share the same asset set",
            ));
        }
        let mut record = vec![
            point.target_return.to_string(),
            point.expected_return.to_string(),
            point.risk.to_string(),
            point.sharpe.to_string(),
            point.value_at_risk.to_string(),
        ];
        record.extend(point.weights.values().iter().map(f64::to_string));
        out.write_record(&record)
            .map_err(|err| csv_error(label, err))?;
    }
    out.flush().map_err(|err| QuantError::Io {
        path: label.to_string(),
        message: err.to_string(),
    })
}

/// Writes `asset,weight` rows.
pub fn write_weights_csv<W: Write>(writer: W, weights: &PortfolioWeights) -> Result<()> {
    let label = "<weights>";
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["asset", "weight"])
        .map_err(|err| csv_error(label, err))?;
    for (name, weight) in weights.iter() {
        out.write_record([name, weight.to_string().as_str()])
            .map_err(|err| csv_error(label, err))?;
    }
    out.flush().map_err(|err| QuantError::Io {
        path: label.to_string(),
        message: err.to_string(),
    })
}

/// [`write_frontier_csv`] into a newly created file.
pub fn write_frontier_csv_file(path: impl AsRef<Path>, points: &[FrontierPoint]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|err| QuantError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    write_frontier_csv(file, points)
}
