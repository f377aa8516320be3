use crate::error::StrategyError;
use core_types::{DataError, FactorScore, Position, Side, WeightingMethod};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Turns one side's selection set into normalized position weights.
///
/// `Equal` hands every candidate `alloc / n`. `RiskParity` weights each
/// candidate by the inverse of its externally supplied volatility,
/// normalized within the side. Either way the side is renormalized so its
/// absolute weights sum exactly to the configured allocation.
///
/// Degenerate cases are explicit: an empty side returns no positions and
/// leaves the allocation unallocated (logged, never redistributed
/// silently); a single candidate receives the whole side.
pub fn calculate_weights(
    selected: &[FactorScore],
    side: Side,
    alloc: Decimal,
    method: WeightingMethod,
    volatilities: &BTreeMap<String, Decimal>,
) -> Result<Vec<Position>, StrategyError> {
    if selected.is_empty() {
        tracing::warn!(
            ?side,
            %alloc,
            "no eligible candidates; side allocation left unallocated"
        );
        return Ok(Vec::new());
    }
    if alloc.is_zero() {
        return Ok(Vec::new());
    }

    let raw: Vec<(String, Decimal)> = match method {
        WeightingMethod::Equal => selected
            .iter()
            .map(|s| (s.symbol.clone(), Decimal::ONE))
            .collect(),
        WeightingMethod::RiskParity => selected
            .iter()
            .map(|s| {
                let vol = volatilities
                    .get(&s.symbol)
                    .copied()
                    .filter(|v| *v > Decimal::ZERO)
                    .ok_or_else(|| DataError::InvalidVolatility {
                        symbol: s.symbol.clone(),
                    })?;
                Ok((s.symbol.clone(), Decimal::ONE / vol))
            })
            .collect::<Result<_, DataError>>()?,
    };

    let total: Decimal = raw.iter().map(|(_, w)| *w).sum();
    let positions = raw
        .into_iter()
        .map(|(symbol, w)| Position {
            symbol,
            weight: alloc * w / total,
            side,
        })
        .collect();
    Ok(positions)
}
