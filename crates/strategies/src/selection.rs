use crate::error::StrategyError;
use configuration::StrategyConfig;
use core_types::{FactorScore, ValidationError};
use std::collections::BTreeSet;

/// The two selection sets for one evaluation date.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub long: Vec<FactorScore>,
    pub short: Vec<FactorScore>,
}

/// Turns a ranked universe into long/short selection sets.
///
/// There is exactly one routine for both directions. The upper tail
/// (percentile >= `short_pct`) and lower tail (percentile <= `long_pct`)
/// are cut once; `Momentum` buys the upper tail and sells the lower,
/// `MeanReversion` is the literal swap of the two sets. This is what
/// prevents the long/short logic of the two directions from silently
/// diverging: there is no second branch to get wrong.
///
/// Each side is truncated to `max_positions`, keeping the most extreme
/// percentiles. A symbol landing in both sets is a `ValidationError`,
/// never a silently resolved condition.
pub fn select(scores: &[FactorScore], cfg: &StrategyConfig) -> Result<Selection, StrategyError> {
    let mut upper: Vec<FactorScore> = scores
        .iter()
        .filter(|s| s.percentile >= cfg.short_pct)
        .cloned()
        .collect();
    let mut lower: Vec<FactorScore> = scores
        .iter()
        .filter(|s| s.percentile <= cfg.long_pct)
        .cloned()
        .collect();

    // Most extreme first, ties by symbol for determinism.
    upper.sort_by(|a, b| (b.percentile, &a.symbol).cmp(&(a.percentile, &b.symbol)));
    lower.sort_by(|a, b| (a.percentile, &a.symbol).cmp(&(b.percentile, &b.symbol)));
    upper.truncate(cfg.max_positions);
    lower.truncate(cfg.max_positions);

    let (long, short) = if cfg.direction.is_inverted() {
        (lower, upper)
    } else {
        (upper, lower)
    };

    let long_symbols: BTreeSet<&str> = long.iter().map(|s| s.symbol.as_str()).collect();
    let overlap: Vec<String> = short
        .iter()
        .filter(|s| long_symbols.contains(s.symbol.as_str()))
        .map(|s| s.symbol.clone())
        .collect();
    if !overlap.is_empty() {
        let date = long
            .first()
            .or(short.first())
            .map(|s| s.date)
            .unwrap_or_default();
        return Err(StrategyError::Validation(
            ValidationError::OverlappingSelection {
                date,
                symbols: overlap,
            },
        ));
    }

    tracing::debug!(
        strategy = %cfg.name,
        long = long.len(),
        short = short.len(),
        "selected universe tails"
    );
    Ok(Selection { long, short })
}
