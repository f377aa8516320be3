use chrono::NaiveDate;
use core_types::DataError;
use strategies::StrategyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Strategy evaluation failed: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Data error during simulation: {0}")]
    Data(#[from] DataError),

    #[error("Historical data for the requested range is empty.")]
    DataUnavailable,

    #[error(
        "lookahead violation: return dated {return_date} applied to weights decided {weight_date}"
    )]
    Lookahead {
        weight_date: NaiveDate,
        return_date: NaiveDate,
    },
}
