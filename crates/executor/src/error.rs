use api_client::error::ApiError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Exchange API failure: {0}")]
    Api(#[from] ApiError),

    #[error("Computed price {price} for {symbol} is not positive; instruction dropped")]
    NonPositivePrice { symbol: String, price: Decimal },

    #[error("Instruction routed to the wrong executor: {0}")]
    AlgorithmMismatch(String),
}
