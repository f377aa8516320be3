use crate::enums::{ExecutionAlgorithm, FillStatus, OrderSide, Side};
use crate::error::DataError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A single daily OHLCV bar for one symbol. Owned by the data layer and
/// immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl MarketBar {
    /// Validates the bar's internal consistency.
    ///
    /// The high must be at least the greatest of open, close and low; a
    /// bar violating this is refused at ingest rather than poisoning a
    /// later ranking.
    pub fn validate(&self) -> Result<(), DataError> {
        let ceiling = self.open.max(self.close).max(self.low);
        if self.high < ceiling {
            return Err(DataError::InvalidBar {
                symbol: self.symbol.clone(),
                date: self.date,
                reason: format!("high {} below max(open, close, low) {}", self.high, ceiling),
            });
        }
        if self.volume.is_sign_negative() {
            return Err(DataError::InvalidBar {
                symbol: self.symbol.clone(),
                date: self.date,
                reason: format!("negative volume {}", self.volume),
            });
        }
        Ok(())
    }
}

/// The output of scoring one symbol on one evaluation date.
///
/// `percentile` is the symbol's rank within the filtered universe at that
/// date, normalized to [0, 100]. Scores are recomputed fresh on every
/// rebalance date and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub symbol: String,
    pub date: NaiveDate,
    pub raw_value: Decimal,
    pub percentile: Decimal,
}

/// One entry in a strategy's target book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub weight: Decimal,
    pub side: Side,
}

impl Position {
    /// The signed weight of this position: negative for shorts.
    pub fn signed_weight(&self) -> Decimal {
        match self.side {
            Side::Long => self.weight,
            Side::Short => -self.weight,
        }
    }
}

/// A daily snapshot of the simulated portfolio. Append-only: the
/// simulator produces exactly one per day and never revises history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub date: NaiveDate,
    pub value: Decimal,
    /// Signed weight per symbol in effect on this date.
    pub weights_in_effect: BTreeMap<String, Decimal>,
    pub gross_exposure: Decimal,
    pub net_exposure: Decimal,
}

impl PortfolioState {
    /// Builds a snapshot from a signed weight map, deriving exposures.
    pub fn from_weights(
        date: NaiveDate,
        value: Decimal,
        weights: BTreeMap<String, Decimal>,
    ) -> Self {
        let gross_exposure: Decimal = weights.values().map(|w| w.abs()).sum();
        let net_exposure: Decimal = weights.values().copied().sum();
        Self {
            date,
            value,
            weights_in_effect: weights,
            gross_exposure,
            net_exposure,
        }
    }
}

/// A single unit of work for an order executor.
///
/// Instructions are immutable: if the router decides a different price or
/// quantity is needed, it creates a new instruction rather than editing
/// one that may already be in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInstruction {
    pub instruction_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    /// Reference price at routing time, used for notional accounting.
    pub target_price: Decimal,
    pub quantity: Decimal,
    pub algorithm: ExecutionAlgorithm,
}

/// The receipt an executor hands back once an instruction is retired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub instruction_id: Uuid,
    pub symbol: String,
    pub requested_qty: Decimal,
    pub filled_qty: Decimal,
    /// Volume-weighted average fill price; `None` when nothing filled.
    pub avg_price: Option<Decimal>,
    pub status: FillStatus,
}
