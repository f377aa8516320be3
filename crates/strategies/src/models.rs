use crate::error::StrategyError;
use chrono::NaiveDate;
use core_types::MarketBar;
use rust_decimal::prelude::*;
use std::collections::BTreeMap;

/// The pluggable scoring function.
///
/// A model maps a trailing history window (oldest bar first) to a single
/// raw value; higher is "more of the factor". Direction (whether the top
/// of the ranking is bought or sold) is strategy configuration, not a
/// property of the model, so one model serves both momentum and
/// mean-reversion books.
pub trait FactorModel: Send + Sync {
    fn name(&self) -> &str;

    /// Scores one symbol's window. The scorer guarantees the window has
    /// exactly the configured length and belongs to a single symbol.
    fn score(&self, window: &[MarketBar]) -> Result<Decimal, StrategyError>;
}

/// The reference model: total close-to-close return over the window.
pub struct TrailingReturn;

impl FactorModel for TrailingReturn {
    fn name(&self) -> &str {
        "trailing_return"
    }

    fn score(&self, window: &[MarketBar]) -> Result<Decimal, StrategyError> {
        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            return Err(StrategyError::Model {
                symbol: String::new(),
                reason: "empty window".to_string(),
            });
        };
        if first.close.is_zero() {
            return Err(StrategyError::Model {
                symbol: first.symbol.clone(),
                reason: format!("zero close on {}", first.date),
            });
        }
        Ok(last.close / first.close - Decimal::ONE)
    }
}

/// Annualized close-to-close volatility over a window of daily bars.
///
/// Used to feed the risk-parity weighting when no external volatility map
/// is supplied. The standard deviation is computed in `f64`, an accepted
/// precision trade-off for indicator math, and converted back to
/// `Decimal`.
pub fn realized_volatility(window: &[MarketBar]) -> Option<Decimal> {
    if window.len() < 3 {
        return None;
    }
    let closes: Vec<f64> = window.iter().filter_map(|b| b.close.to_f64()).collect();
    if closes.len() != window.len() || closes.iter().any(|c| *c <= 0.0) {
        return None;
    }
    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    let annualized = variance.sqrt() * 252_f64.sqrt();
    Decimal::from_f64(annualized).filter(|v| *v > Decimal::ZERO)
}

/// Per-symbol annualized volatility over the trailing `window` bars up to
/// and including `date`. Symbols without enough usable history are simply
/// absent; the weighting layer decides whether that matters.
pub fn trailing_volatilities(
    panel: &BTreeMap<String, Vec<MarketBar>>,
    date: NaiveDate,
    window: usize,
) -> BTreeMap<String, Decimal> {
    panel
        .iter()
        .filter_map(|(symbol, series)| {
            let trailing: Vec<MarketBar> =
                series.iter().filter(|b| b.date <= date).cloned().collect();
            let start = trailing.len().checked_sub(window)?;
            realized_volatility(&trailing[start..]).map(|vol| (symbol.clone(), vol))
        })
        .collect()
}
