use api_client::error::ApiError;
use blender::BlendError;
use risk::RiskError;
use rust_decimal::Decimal;
use strategies::StrategyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Exchange API failure: {0}")]
    Api(#[from] ApiError),

    #[error("Strategy evaluation failed: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Strategy blending failed: {0}")]
    Blend(#[from] BlendError),

    #[error("Risk configuration rejected: {0}")]
    Risk(#[from] RiskError),

    #[error("Account equity {0} is not positive; refusing to trade")]
    NonPositiveEquity(Decimal),
}
