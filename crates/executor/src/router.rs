use core_types::{ExecutionAlgorithm, OrderInstruction, OrderSide};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Diffs target weights against current holdings into order instructions.
pub struct ExecutionRouter {
    /// Weight deltas worth less than this are dust and never traded.
    min_notional: Decimal,
}

impl ExecutionRouter {
    pub fn new(min_notional: Decimal) -> Self {
        Self { min_notional }
    }

    /// Produces one instruction per symbol whose target differs from its
    /// current weight by more than the dust threshold.
    ///
    /// Both maps hold signed weights. `equity` converts weight deltas to
    /// notional; `prices` supplies the reference price per symbol. A
    /// symbol without a price cannot be sized and is skipped with a
    /// warning, never silently.
    pub fn diff(
        &self,
        target: &BTreeMap<String, Decimal>,
        current: &BTreeMap<String, Decimal>,
        equity: Decimal,
        prices: &BTreeMap<String, Decimal>,
        algorithm: &ExecutionAlgorithm,
    ) -> Vec<OrderInstruction> {
        let symbols: BTreeSet<&String> = target.keys().chain(current.keys()).collect();
        let mut instructions = Vec::new();

        for symbol in symbols {
            let want = target.get(symbol).copied().unwrap_or(Decimal::ZERO);
            let have = current.get(symbol).copied().unwrap_or(Decimal::ZERO);
            let delta = want - have;
            let notional = (delta * equity).abs();
            if notional < self.min_notional {
                if !delta.is_zero() {
                    tracing::debug!(%symbol, %notional, "delta below minimum notional; dropped as dust");
                }
                continue;
            }
            let Some(&price) = prices.get(symbol) else {
                tracing::warn!(%symbol, "no reference price; cannot size order, skipping");
                continue;
            };
            if price <= Decimal::ZERO {
                tracing::warn!(%symbol, %price, "non-positive reference price; skipping");
                continue;
            }
            instructions.push(OrderInstruction {
                instruction_id: Uuid::new_v4(),
                symbol: symbol.clone(),
                side: if delta > Decimal::ZERO {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                },
                target_price: price,
                quantity: notional / price,
                algorithm: *algorithm,
            });
        }

        tracing::info!(
            instructions = instructions.len(),
            "routed rebalance diff into order instructions"
        );
        instructions
    }
}
