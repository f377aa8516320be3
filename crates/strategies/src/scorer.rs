use crate::error::StrategyError;
use crate::models::FactorModel;
use crate::universe::UniverseFilter;
use chrono::NaiveDate;
use core_types::{FactorScore, MarketBar, ValidationError};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Scores the filtered universe at one evaluation date.
///
/// Each admitted symbol's trailing `window` bars (up to and including
/// `date`, never beyond it) are handed to the model; the raw values are
/// then ranked and percentile-normalized across the universe. Symbols
/// lacking a full window are excluded rather than scored as NaN. Ties in
/// the raw value break by symbol lexical order, so the ranking is a pure
/// function of its inputs.
pub fn score_universe(
    date: NaiveDate,
    panel: &BTreeMap<String, Vec<MarketBar>>,
    window: usize,
    filter: &UniverseFilter,
    model: &dyn FactorModel,
) -> Result<Vec<FactorScore>, StrategyError> {
    let mut raw: Vec<(String, Decimal)> = Vec::new();

    for (symbol, series) in panel {
        let trailing: Vec<MarketBar> = series
            .iter()
            .filter(|bar| bar.date <= date)
            .cloned()
            .collect();
        if trailing.len() < window {
            tracing::debug!(
                symbol,
                %date,
                have = trailing.len(),
                need = window,
                "excluded from scoring: window not yet full"
            );
            continue;
        }
        let tail = &trailing[trailing.len() - window..];
        if !filter.admits(symbol, date, tail) {
            continue;
        }
        let value = model.score(tail).map_err(|e| match e {
            StrategyError::Model { reason, .. } => StrategyError::Model {
                symbol: symbol.clone(),
                reason,
            },
            other => other,
        })?;
        raw.push((symbol.clone(), value));
    }

    // Deterministic ranking: ascending by value, ties by symbol.
    raw.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));

    let n = raw.len();
    let scores = raw
        .into_iter()
        .enumerate()
        .map(|(rank, (symbol, raw_value))| {
            let percentile = if n <= 1 {
                Decimal::ONE_HUNDRED
            } else {
                Decimal::from(rank as u64) * Decimal::ONE_HUNDRED / Decimal::from((n - 1) as u64)
            };
            if percentile < Decimal::ZERO || percentile > Decimal::ONE_HUNDRED {
                return Err(StrategyError::Validation(
                    ValidationError::PercentileOutOfRange {
                        symbol,
                        value: percentile,
                    },
                ));
            }
            Ok(FactorScore {
                symbol,
                date,
                raw_value,
                percentile,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(%date, universe = scores.len(), model = model.name(), "scored universe");
    Ok(scores)
}
