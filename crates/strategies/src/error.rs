use core_types::{DataError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Data error during evaluation: {0}")]
    Data(#[from] DataError),

    #[error("Validation error during evaluation: {0}")]
    Validation(#[from] ValidationError),

    #[error("Factor model failed for {symbol}: {reason}")]
    Model { symbol: String, reason: String },
}
