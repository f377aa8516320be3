use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the data layer: malformed bars and absent volatility
/// inputs.
///
/// A `DataError` aborts the evaluation date it occurred on; no weights are
/// produced from a corrupted universe.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("invalid bar for {symbol} on {date}: {reason}")]
    InvalidBar {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("missing or non-positive volatility for {symbol}")]
    InvalidVolatility { symbol: String },
}

/// Violations of the model's structural invariants: percentiles out of
/// range, sides that overlap.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("percentile {value} for {symbol} is outside [0, 100]")]
    PercentileOutOfRange { symbol: String, value: Decimal },

    #[error("long and short selections overlap on {date}: {symbols:?}")]
    OverlappingSelection {
        date: NaiveDate,
        symbols: Vec<String>,
    },

    #[error("blend weights sum to {0}, expected 1")]
    BlendWeightSum(Decimal),
}
