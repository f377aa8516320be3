//! # Meridian Strategy Blender
//!
//! Combines several strategies' target books into one consolidated
//! portfolio using externally supplied blend fractions. A symbol held by
//! two strategies nets to a single combined exposure, the multi-strategy
//! analogue of the universe deduplication rule, and it runs through the
//! same `net_by_symbol` accumulation primitive.

use core_types::{net_by_symbol, Position, Side, ValidationError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use thiserror::Error;

/// Net exposures smaller than this are dropped from the blended book.
const DUST_EPSILON: Decimal = dec!(0.000001);

#[derive(Error, Debug)]
pub enum BlendError {
    #[error("Blend validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Strategy '{0}' has positions but no blend weight")]
    MissingBlendWeight(String),
}

/// Scales each strategy's book by its blend fraction and nets the result
/// per symbol.
///
/// Blend fractions are computed externally (e.g. proportional to trailing
/// risk-adjusted return) and must sum to 1; anything else is a
/// `ValidationError`, not a silent renormalization. Net exposures that
/// cancel to dust are dropped with a log line.
pub fn blend(
    strategy_positions: &BTreeMap<String, Vec<Position>>,
    blend_weights: &BTreeMap<String, Decimal>,
) -> Result<Vec<Position>, BlendError> {
    let total: Decimal = blend_weights.values().copied().sum();
    if (total - Decimal::ONE).abs() > DUST_EPSILON {
        return Err(ValidationError::BlendWeightSum(total).into());
    }

    let mut scaled: Vec<(String, Decimal)> = Vec::new();
    for (strategy, positions) in strategy_positions {
        let fraction = blend_weights
            .get(strategy)
            .copied()
            .ok_or_else(|| BlendError::MissingBlendWeight(strategy.clone()))?;
        for p in positions {
            scaled.push((p.symbol.clone(), p.signed_weight() * fraction));
        }
    }

    let netted = net_by_symbol(scaled);
    let mut book: Vec<Position> = Vec::with_capacity(netted.len());
    for (symbol, weight) in netted {
        if weight.abs() <= DUST_EPSILON {
            tracing::info!(%symbol, %weight, "blended exposure netted to dust; dropping");
            continue;
        }
        let side = if weight > Decimal::ZERO {
            Side::Long
        } else {
            Side::Short
        };
        book.push(Position {
            symbol,
            weight: weight.abs(),
            side,
        });
    }
    Ok(book)
}
